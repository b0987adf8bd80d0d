//! Solver parameters
//!
//! One plain block of tunables owned by the caller and treated as immutable
//! for the duration of a solve. Negative or zero sentinel values keep the
//! original conventions: a negative `delta` asks the cost model to derive
//! one, a non-positive `limit` or a `time_limit` below 0.0001 s means
//! unlimited, non-positive pushing limits disable the pushing phase.

/// Policy used to seed the initial assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPolicy {
    /// Drive every constraint to its lower bound.
    PessimisticSolve,
    /// Drive every constraint to its upper bound.
    OptimisticSolve,
    /// Greedy by objective coefficient sign.
    #[default]
    Bastert,
    /// Alias of `Bastert` inside a single solve; the optimizer driver varies
    /// seeds between restarts.
    Cycle,
    /// Alias of `Bastert` inside a single solve.
    CrossoverCycle,
}

/// Order in which constraints are visited on each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintOrder {
    /// Natural order.
    #[default]
    None,
    /// Alternate direction on each pass.
    Reversing,
    /// Fresh permutation on each pass.
    RandomSorting,
    /// Most violated first.
    InfeasibilityDecr,
    /// Least violated first.
    InfeasibilityIncr,
    /// Largest `|pi|` first.
    LagrangianDecr,
    /// Smallest `|pi|` first.
    LagrangianIncr,
    /// Constraints whose multiplier changed sign on the previous pass first.
    PiSignChange,
}

/// Working floating-point type of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatType {
    /// Single precision.
    F32,
    /// Double precision.
    #[default]
    F64,
}

/// Preprocessor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreprocessorKind {
    /// Validate and convert only.
    None,
    /// Run forced-assignment propagation to a fixed point.
    #[default]
    All,
}

/// Observation hook selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObserverKind {
    /// No observation.
    #[default]
    None,
    /// Text dump of pi and P per iteration.
    File,
    /// PNM images of pi and P per iteration.
    Pnm,
}

/// The full parameter block.
#[derive(Debug, Clone)]
pub struct SolverParameters {
    /// Outer iteration limit; non-positive means unlimited.
    pub limit: i64,
    /// Wall-clock limit in seconds; below 0.0001 means unlimited.
    pub time_limit: f64,
    /// Preference decay per row visit, in `(0, 1]`.
    pub theta: f64,
    /// Base preference update magnitude; negative derives it from the costs.
    pub delta: f64,
    /// Initial kappa.
    pub kappa_min: f64,
    /// Kappa increment scale.
    pub kappa_step: f64,
    /// Kappa ceiling; crossing it terminates the solve.
    pub kappa_max: f64,
    /// Exponent of the infeasibility ratio in the kappa schedule.
    pub alpha: f64,
    /// Warmup iterations before kappa starts growing.
    pub w: i64,
    /// Initial assignment policy.
    pub init_policy: InitPolicy,
    /// Per-bit Bernoulli mutation probability applied to the initial
    /// assignment.
    pub init_random: f64,
    /// Constraint visit order.
    pub order: ConstraintOrder,
    /// Working float type.
    pub float_type: FloatType,
    /// Number of outer pushes once feasible; non-positive disables pushing.
    pub pushes_limit: i64,
    /// Kappa scale applied during amplified pushes.
    pub pushing_k_factor: f64,
    /// Objective amplifier added to reduced costs during amplified pushes.
    pub pushing_objective_amplifier: f64,
    /// Plain passes after each amplified push; non-positive disables
    /// pushing.
    pub pushing_iteration_limit: i64,
    /// Worker count for the optimizer driver; zero picks the machine
    /// parallelism.
    pub thread: usize,
    /// Master seed; `None` draws one from the entropy source.
    pub seed: Option<u64>,
    /// Preprocessor selection.
    pub preprocessor: PreprocessorKind,
    /// Observer selection.
    pub observer: ObserverKind,
    /// Verbose per-row tracing of the engine.
    pub debug: bool,
    /// Logging verbosity, 0 (quiet) to 7 (trace).
    pub verbose_level: u8,
}

impl Default for SolverParameters {
    fn default() -> Self {
        SolverParameters {
            limit: 1000,
            time_limit: -1.0,
            theta: 0.5,
            delta: -1.0,
            kappa_min: 0.0,
            kappa_step: 1e-3,
            kappa_max: 0.6,
            alpha: 1.0,
            w: 500,
            init_policy: InitPolicy::default(),
            init_random: 0.5,
            order: ConstraintOrder::default(),
            float_type: FloatType::default(),
            pushes_limit: 100,
            pushing_k_factor: 0.9,
            pushing_objective_amplifier: 5.0,
            pushing_iteration_limit: 20,
            thread: 1,
            seed: None,
            preprocessor: PreprocessorKind::default(),
            observer: ObserverKind::default(),
            debug: false,
            verbose_level: 3,
        }
    }
}

impl SolverParameters {
    /// Effective iteration limit: negative means unlimited, zero runs no
    /// iteration and hands the initial assignment back.
    pub fn effective_limit(&self) -> i64 {
        if self.limit < 0 {
            i64::MAX
        } else {
            self.limit
        }
    }

    /// Effective time limit with the disabled sentinel resolved.
    pub fn effective_time_limit(&self) -> f64 {
        if self.time_limit < 0.0001 {
            f64::INFINITY
        } else {
            self.time_limit
        }
    }

    /// Effective push count; zero when pushing is disabled.
    pub fn effective_pushes_limit(&self) -> i64 {
        if self.pushes_limit <= 0 || self.pushing_iteration_limit <= 0 {
            0
        } else {
            self.pushes_limit
        }
    }
}
