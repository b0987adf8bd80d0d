//! medius command-line interface
//!
//! Reads an LP file, runs the In-The-Middle solver in `solve` or
//! `optimize` mode, prints the solution file to stdout or a chosen path,
//! and exits 0 exactly when a feasible assignment was found. Fatal parse,
//! definition, and solver failures exit nonzero.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use medius::{
    write_solution, ConstraintOrder, FloatType, InitPolicy, ObserverKind, PreprocessorKind,
    Progress, ProgressFn, SolverParameters, SolverResult,
};

#[derive(Parser)]
#[command(name = "medius")]
#[command(version)]
#[command(about = "In-The-Middle solver for pseudo-Boolean linear programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find one feasible assignment.
    Solve(RunArgs),
    /// Search for the best assignment with parallel restarts.
    Optimize(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum InitPolicyArg {
    PessimisticSolve,
    OptimisticSolve,
    #[default]
    Bastert,
    Cycle,
    CrossoverCycle,
}

impl From<InitPolicyArg> for InitPolicy {
    fn from(arg: InitPolicyArg) -> Self {
        match arg {
            InitPolicyArg::PessimisticSolve => InitPolicy::PessimisticSolve,
            InitPolicyArg::OptimisticSolve => InitPolicy::OptimisticSolve,
            InitPolicyArg::Bastert => InitPolicy::Bastert,
            InitPolicyArg::Cycle => InitPolicy::Cycle,
            InitPolicyArg::CrossoverCycle => InitPolicy::CrossoverCycle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum OrderArg {
    #[default]
    None,
    Reversing,
    RandomSorting,
    InfeasibilityDecr,
    InfeasibilityIncr,
    LagrangianDecr,
    LagrangianIncr,
    PiSignChange,
}

impl From<OrderArg> for ConstraintOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::None => ConstraintOrder::None,
            OrderArg::Reversing => ConstraintOrder::Reversing,
            OrderArg::RandomSorting => ConstraintOrder::RandomSorting,
            OrderArg::InfeasibilityDecr => ConstraintOrder::InfeasibilityDecr,
            OrderArg::InfeasibilityIncr => ConstraintOrder::InfeasibilityIncr,
            OrderArg::LagrangianDecr => ConstraintOrder::LagrangianDecr,
            OrderArg::LagrangianIncr => ConstraintOrder::LagrangianIncr,
            OrderArg::PiSignChange => ConstraintOrder::PiSignChange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum FloatTypeArg {
    F32,
    #[default]
    F64,
    /// Accepted for compatibility; maps to f64.
    LongDouble,
}

impl From<FloatTypeArg> for FloatType {
    fn from(arg: FloatTypeArg) -> Self {
        match arg {
            FloatTypeArg::F32 => FloatType::F32,
            FloatTypeArg::F64 | FloatTypeArg::LongDouble => FloatType::F64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum PreprocessorArg {
    None,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ObserverArg {
    #[default]
    None,
    File,
    Pnm,
}

#[derive(Args)]
struct RunArgs {
    /// LP file to read.
    file: PathBuf,

    /// Write the solution file here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Outer iteration limit; negative means unlimited, zero returns the
    /// initial assignment.
    #[arg(long, default_value_t = 1000)]
    limit: i64,

    /// Wall-clock limit in seconds; values below 0.0001 disable it.
    #[arg(long, default_value_t = -1.0)]
    time_limit: f64,

    /// Preference decay per row visit.
    #[arg(long, default_value_t = 0.5)]
    theta: f64,

    /// Base preference update; negative derives it from the costs.
    #[arg(long, default_value_t = -1.0)]
    delta: f64,

    /// Initial kappa.
    #[arg(long, default_value_t = 0.0)]
    kappa_min: f64,

    /// Kappa increment scale.
    #[arg(long, default_value_t = 1e-3)]
    kappa_step: f64,

    /// Kappa ceiling.
    #[arg(long, default_value_t = 0.6)]
    kappa_max: f64,

    /// Exponent of the infeasibility ratio in the kappa schedule.
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,

    /// Warmup iterations before kappa grows.
    #[arg(long, default_value_t = 500)]
    w: i64,

    /// Initial assignment policy.
    #[arg(long, value_enum, default_value_t)]
    init_policy: InitPolicyArg,

    /// Bernoulli mutation probability on the initial assignment.
    #[arg(long, default_value_t = 0.5)]
    init_random: f64,

    /// Constraint visit order.
    #[arg(long, value_enum, default_value_t)]
    order: OrderArg,

    /// Working floating-point type.
    #[arg(long, value_enum, default_value_t)]
    float_type: FloatTypeArg,

    /// Outer pushes once feasible; non-positive disables pushing.
    #[arg(long, default_value_t = 100)]
    pushes_limit: i64,

    /// Kappa scale of amplified pushes.
    #[arg(long, default_value_t = 0.9)]
    pushing_k_factor: f64,

    /// Objective amplifier of amplified pushes.
    #[arg(long, default_value_t = 5.0)]
    pushing_objective_amplifier: f64,

    /// Plain passes after each amplified push.
    #[arg(long, default_value_t = 20)]
    pushing_iteration_limit: i64,

    /// Worker threads in optimize mode; zero picks the machine
    /// parallelism.
    #[arg(long, default_value_t = 1)]
    thread: usize,

    /// Master seed; omitted draws one from the entropy source.
    #[arg(long)]
    seed: Option<u64>,

    /// Preprocessor selection.
    #[arg(long, value_enum, default_value_t)]
    preprocessor: PreprocessorArg,

    /// Observation hook.
    #[arg(long, value_enum, default_value_t)]
    observer: ObserverArg,

    /// Verbose per-row tracing of the engine.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Logging verbosity, 0 (quiet) to 7 (trace).
    #[arg(long, default_value_t = 3)]
    verbose_level: u8,
}

impl RunArgs {
    fn parameters(&self) -> SolverParameters {
        SolverParameters {
            limit: self.limit,
            time_limit: self.time_limit,
            theta: self.theta,
            delta: self.delta,
            kappa_min: self.kappa_min,
            kappa_step: self.kappa_step,
            kappa_max: self.kappa_max,
            alpha: self.alpha,
            w: self.w,
            init_policy: self.init_policy.into(),
            init_random: self.init_random,
            order: self.order.into(),
            float_type: self.float_type.into(),
            pushes_limit: self.pushes_limit,
            pushing_k_factor: self.pushing_k_factor,
            pushing_objective_amplifier: self.pushing_objective_amplifier,
            pushing_iteration_limit: self.pushing_iteration_limit,
            thread: self.thread,
            seed: self.seed,
            preprocessor: match self.preprocessor {
                PreprocessorArg::None => PreprocessorKind::None,
                PreprocessorArg::All => PreprocessorKind::All,
            },
            observer: match self.observer {
                ObserverArg::None => ObserverKind::None,
                ObserverArg::File => ObserverKind::File,
                ObserverArg::Pnm => ObserverKind::Pnm,
            },
            debug: self.debug,
            verbose_level: self.verbose_level,
        }
    }
}

fn install_logging(verbose_level: u8, debug: bool) {
    let level = match (verbose_level, debug) {
        (_, true) | (7.., _) => Level::TRACE,
        (0..=1, _) => Level::ERROR,
        (2, _) => Level::WARN,
        (3..=4, _) => Level::INFO,
        (5..=6, _) => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        warn!("logging already installed");
    }
}

fn run(args: &RunArgs, optimizing: bool) -> anyhow::Result<SolverResult> {
    let params = args.parameters();
    let raw = medius::read_problem(&args.file)
        .with_context(|| format!("cannot read problem `{}`", args.file.display()))?;

    info!(
        file = %args.file.display(),
        variables = raw.vars.len(),
        constraints = raw.nb_constraints(),
        "problem loaded"
    );

    let report = |p: Progress| {
        info!(
            remaining = p.remaining,
            value = p.value,
            loop_index = p.loop_index,
            duration = p.duration,
            "best updated"
        );
    };
    let report: &ProgressFn = &report;

    let result = if optimizing {
        medius::optimize(&params, &raw, Some(report))?
    } else {
        medius::solve(&params, &raw)?
    };

    info!(
        status = result.status.tag(),
        remaining = result.remaining_constraints,
        duration = result.duration,
        "finished"
    );

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create `{}`", path.display()))?;
            write_solution(BufWriter::new(file), &result)?;
        }
        None => {
            let stdout = io::stdout();
            write_solution(stdout.lock(), &result)?;
            stdout.lock().flush()?;
        }
    }

    Ok(result)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (args, optimizing) = match &cli.command {
        Commands::Solve(args) => (args, false),
        Commands::Optimize(args) => (args, true),
    };

    install_logging(args.verbose_level, args.debug);
    run(args, optimizing)?;

    Ok(())
}
