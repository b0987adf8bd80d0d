//! Medius ITM - the In-The-Middle iterative engine
//!
//! Solves and optimizes preprocessed pseudo-Boolean problems by driving a
//! 0/1 assignment toward feasibility with per-constraint Lagrangian
//! multipliers and per-coefficient preference scores, then toward
//! optimality with the pushing phase.
//!
//! The entry points are [`solve`] (one seeded solver run) and [`optimize`]
//! (multi-start parallel workers with best-result aggregation). Both
//! consume a validated [`medius_core::Problem`]; parsing and preprocessing
//! live in the neighbouring crates.
//!
//! Internally the engine monomorphizes over the working float type (f32 or
//! f64), the optimization direction, and the cost model (linear or
//! quadratic); the coefficient regime of each constraint row (0/1, ±1,
//! general integers) is dispatched at runtime inside the local update.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bit_array;
pub mod cost;
mod exhaustive;
pub mod float;
mod init;
mod knapsack;
pub mod matrix;
pub mod mode;
pub mod observer;
pub mod order;
pub mod pnm;
mod run;
pub mod solver;

mod optimize;

use std::time::Instant;

use medius_core::{
    make_merged_constraints, Error, FloatType, MergedConstraint, ObjectiveSense, Problem,
    Solution, SolverError, SolverParameters, SolverResult, Status, VariableType,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub use bit_array::BitArray;
pub use cost::{objective_value, CostModel, LinearCost, QuadraticCost};
pub use float::SolverFloat;
pub use matrix::SparseMatrix;
pub use mode::{Maximize, Minimize, Mode};
pub use observer::Observer;
pub use optimize::{Progress, ProgressFn};
pub use solver::ItmSolver;

use optimize::optimize_problem;
use run::{run_solver, RunOutcome};

/// Solve a problem once with a single seeded solver run.
///
/// # Errors
///
/// [`SolverError::NoSolverAvailable`] for non-binary variables, merge
/// failures, and the 32-bit index bound.
pub fn solve(params: &SolverParameters, pb: &Problem) -> Result<SolverResult, Error> {
    dispatch(params, pb, None, false)
}

/// Optimize a problem with parallel multi-start workers.
///
/// # Errors
///
/// [`SolverError::NoSolverAvailable`] for non-binary variables, merge
/// failures, and the 32-bit index bound.
pub fn optimize(
    params: &SolverParameters,
    pb: &Problem,
    progress: Option<&ProgressFn>,
) -> Result<SolverResult, Error> {
    dispatch(params, pb, progress, true)
}

fn dispatch(
    params: &SolverParameters,
    pb: &Problem,
    progress: Option<&ProgressFn>,
    optimizing: bool,
) -> Result<SolverResult, Error> {
    if pb.vars.values.iter().any(|v| v.kind != VariableType::Binary) {
        return Err(SolverError::NoSolverAvailable.into());
    }

    if pb.vars.is_empty() {
        return Ok(trivial_result(pb));
    }

    let constraints = make_merged_constraints(pb)?;
    let seed = params.seed.unwrap_or_else(rand::random);
    let n = pb.vars.len();
    let linear = pb.objective.qelements.is_empty();

    match (params.float_type, pb.sense, linear) {
        (FloatType::F32, ObjectiveSense::Minimize, true) => {
            let costs = LinearCost::<f32>::new(&pb.objective, n);
            run_typed::<f32, Minimize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F32, ObjectiveSense::Minimize, false) => {
            let costs = QuadraticCost::<f32>::new(&pb.objective, n);
            run_typed::<f32, Minimize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F32, ObjectiveSense::Maximize, true) => {
            let costs = LinearCost::<f32>::new(&pb.objective, n);
            run_typed::<f32, Maximize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F32, ObjectiveSense::Maximize, false) => {
            let costs = QuadraticCost::<f32>::new(&pb.objective, n);
            run_typed::<f32, Maximize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F64, ObjectiveSense::Minimize, true) => {
            let costs = LinearCost::<f64>::new(&pb.objective, n);
            run_typed::<f64, Minimize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F64, ObjectiveSense::Minimize, false) => {
            let costs = QuadraticCost::<f64>::new(&pb.objective, n);
            run_typed::<f64, Minimize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F64, ObjectiveSense::Maximize, true) => {
            let costs = LinearCost::<f64>::new(&pb.objective, n);
            run_typed::<f64, Maximize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
        (FloatType::F64, ObjectiveSense::Maximize, false) => {
            let costs = QuadraticCost::<f64>::new(&pb.objective, n);
            run_typed::<f64, Maximize, _>(params, pb, &constraints, &costs, seed, progress, optimizing)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_typed<F, M, C>(
    params: &SolverParameters,
    pb: &Problem,
    constraints: &[MergedConstraint],
    costs: &C,
    seed: u64,
    progress: Option<&ProgressFn>,
    optimizing: bool,
) -> Result<SolverResult, Error>
where
    F: SolverFloat,
    M: Mode,
    C: CostModel<F>,
{
    let n = pb.vars.len();
    let start = Instant::now();

    let outcome = if optimizing {
        optimize_problem::<F, M, C>(
            params,
            constraints,
            n,
            &pb.objective,
            costs,
            seed,
            progress,
        )?
    } else {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        run_solver::<F, M, C, _>(
            params,
            constraints,
            n,
            &pb.objective,
            costs,
            params.observer,
            &mut rng,
            start,
            progress,
        )?
    };

    Ok(package(pb, constraints.len(), outcome))
}

fn package(pb: &Problem, m: usize, outcome: RunOutcome) -> SolverResult {
    let RunOutcome { best, status } = outcome;

    let mut result = SolverResult {
        status,
        solutions: Vec::new(),
        variable_names: pb.vars.names.clone(),
        affected: pb.affected.clone(),
        variables: pb.vars.len(),
        constraints: m,
        remaining_constraints: if best.remaining == usize::MAX {
            m
        } else {
            best.remaining
        },
        loop_index: best.loop_index,
        duration: best.duration,
        problem_type: Some(pb.problem_type),
    };

    if best.remaining != usize::MAX {
        let value = if best.remaining == 0 {
            best.value
        } else {
            objective_value(&pb.objective, &best.x)
        };
        result.solutions.push(Solution {
            variables: best.x.to_vec(),
            value,
        });
    }

    result
}

/// Every variable was fixed by the preprocessor: the solution is empty and
/// the objective collapsed into its constant.
fn trivial_result(pb: &Problem) -> SolverResult {
    SolverResult {
        status: Status::Success,
        solutions: vec![Solution {
            variables: Vec::new(),
            value: pb.objective.constant,
        }],
        variable_names: Vec::new(),
        affected: pb.affected.clone(),
        variables: 0,
        constraints: 0,
        remaining_constraints: 0,
        loop_index: 0,
        duration: 0.0,
        problem_type: Some(pb.problem_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medius_core::{
        unpreprocess, Constraint, FunctionElement, ObjectiveElement, ObjectiveFunction,
        RawProblem, VariableValue, Variables,
    };

    fn binary_problem(
        names: &[&str],
        objective: &[f64],
        sense: ObjectiveSense,
        greater: Vec<(Vec<(i32, u32)>, i32)>,
        less: Vec<(Vec<(i32, u32)>, i32)>,
        equal: Vec<(Vec<(i32, u32)>, i32)>,
    ) -> Problem {
        let make = |list: Vec<(Vec<(i32, u32)>, i32)>| {
            list.into_iter()
                .enumerate()
                .map(|(id, (elements, value))| Constraint {
                    label: format!("c{id}"),
                    id,
                    elements: elements
                        .into_iter()
                        .map(|(factor, variable)| FunctionElement { factor, variable })
                        .collect(),
                    value,
                })
                .collect::<Vec<_>>()
        };

        let raw = RawProblem {
            sense,
            objective: ObjectiveFunction {
                elements: objective
                    .iter()
                    .enumerate()
                    .map(|(i, &factor)| ObjectiveElement {
                        factor,
                        variable: i as u32,
                    })
                    .collect(),
                qelements: Vec::new(),
                constant: 0.0,
            },
            vars: Variables {
                names: names.iter().map(|s| s.to_string()).collect(),
                values: vec![
                    VariableValue {
                        min: 0,
                        max: 1,
                        kind: VariableType::Binary,
                    };
                    names.len()
                ],
            },
            equal_constraints: make(equal),
            greater_constraints: make(greater),
            less_constraints: make(less),
        };

        unpreprocess(&raw).unwrap()
    }

    fn params(seed: u64) -> SolverParameters {
        SolverParameters {
            seed: Some(seed),
            limit: 1000,
            ..Default::default()
        }
    }

    /// Minimize x1 + x2 subject to x1 + x2 >= 1: value 1, one bit set.
    #[test]
    fn covering_pair_costs_one() {
        let pb = binary_problem(
            &["x1", "x2"],
            &[1.0, 1.0],
            ObjectiveSense::Minimize,
            vec![(vec![(1, 0), (1, 1)], 1)],
            vec![],
            vec![],
        );

        let result = solve(&params(1), &pb).unwrap();
        assert_eq!(result.status, Status::Success);
        let best = result.best().unwrap();
        assert_eq!(best.value, 1.0);
        assert_eq!(best.variables.iter().filter(|&&b| b).count(), 1);
    }

    /// Maximize 3 x1 + 2 x2 + 4 x3 subject to x1 + x2 + x3 <= 2: value 7.
    #[test]
    fn packing_takes_the_two_best_items() {
        let pb = binary_problem(
            &["x1", "x2", "x3"],
            &[3.0, 2.0, 4.0],
            ObjectiveSense::Maximize,
            vec![],
            vec![(vec![(1, 0), (1, 1), (1, 2)], 2)],
            vec![],
        );

        let result = solve(&params(1), &pb).unwrap();
        assert_eq!(result.status, Status::Success);
        let best = result.best().unwrap();
        assert_eq!(best.value, 7.0);
        assert_eq!(best.variables, vec![true, false, true]);
    }

    /// Minimize x1 + x2 + x3 with x1+x2 >= 1 and x2+x3 >= 1: x2 covers
    /// both.
    #[test]
    fn shared_variable_covers_both_rows() {
        let pb = binary_problem(
            &["x1", "x2", "x3"],
            &[1.0, 1.0, 1.0],
            ObjectiveSense::Minimize,
            vec![(vec![(1, 0), (1, 1)], 1), (vec![(1, 1), (1, 2)], 1)],
            vec![],
            vec![],
        );

        let result = solve(&params(1), &pb).unwrap();
        assert_eq!(result.status, Status::Success);
        let best = result.best().unwrap();
        assert_eq!(best.value, 1.0);
        assert_eq!(best.variables, vec![false, true, false]);
    }

    /// The 101 regime: -x1 - x2 + x3 + x4 + x5 = 2 with unit minimize
    /// costs keeps the negatives at zero and sets exactly two positives.
    #[test]
    fn negated_equality_lands_on_its_bound() {
        let pb = binary_problem(
            &["x1", "x2", "x3", "x4", "x5"],
            &[1.0, 1.0, 1.0, 1.0, 1.0],
            ObjectiveSense::Minimize,
            vec![],
            vec![],
            vec![(vec![(-1, 0), (-1, 1), (1, 2), (1, 3), (1, 4)], 2)],
        );

        let result = solve(&params(1), &pb).unwrap();
        assert_eq!(result.status, Status::Success);
        let best = result.best().unwrap();

        let lhs: i32 = [(0, -1), (1, -1), (2, 1), (3, 1), (4, 1)]
            .iter()
            .map(|&(i, f): &(usize, i32)| if best.variables[i] { f } else { 0 })
            .sum();
        assert_eq!(lhs, 2);
        assert_eq!(best.value, 2.0);
    }

    /// A zero limit hands back the deterministic initial assignment and
    /// its violation count.
    #[test]
    fn zero_limit_echoes_the_initial_assignment() {
        let pb = binary_problem(
            &["x1", "x2"],
            &[1.0, 1.0],
            ObjectiveSense::Minimize,
            vec![(vec![(1, 0), (1, 1)], 1)],
            vec![],
            vec![],
        );

        let mut p = params(1);
        p.limit = 0;
        p.pushes_limit = 0;
        p.init_random = 0.0;

        let result = solve(&p, &pb).unwrap();
        // Bastert under minimize with positive costs starts all-zero,
        // violating the covering row.
        assert_eq!(result.status, Status::LimitReached);
        assert_eq!(result.remaining_constraints, 1);
        assert_eq!(result.best().unwrap().variables, vec![false, false]);
    }

    /// No constraints at all: immediate success with the policy-driven x.
    #[test]
    fn empty_constraint_list_succeeds() {
        let mut pb = binary_problem(
            &["x1"],
            &[1.0],
            ObjectiveSense::Minimize,
            vec![(vec![(1, 0)], 0)],
            vec![],
            vec![],
        );
        pb.greater_constraints.clear();

        let result = solve(&params(1), &pb).unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.remaining_constraints, 0);
    }

    /// Real variables cannot be solved.
    #[test]
    fn non_binary_variables_are_rejected() {
        let mut pb = binary_problem(
            &["x1"],
            &[1.0],
            ObjectiveSense::Minimize,
            vec![(vec![(1, 0)], 1)],
            vec![],
            vec![],
        );
        pb.vars.values[0].kind = VariableType::Real;

        assert!(matches!(
            solve(&params(1), &pb),
            Err(Error::Solver(SolverError::NoSolverAvailable))
        ));
    }

    /// Multi-start optimization agrees with the single solve on a small
    /// instance and reports progress from the driver.
    #[test]
    fn optimize_aggregates_worker_results() {
        let pb = binary_problem(
            &["x1", "x2", "x3"],
            &[3.0, 2.0, 4.0],
            ObjectiveSense::Maximize,
            vec![],
            vec![(vec![(1, 0), (1, 1), (1, 2)], 2)],
            vec![],
        );

        let mut p = params(1);
        p.thread = 2;
        p.time_limit = 2.0;
        p.limit = 200;

        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        let reports = Arc::new(AtomicUsize::new(0));
        let reports_cb = Arc::clone(&reports);
        let callback = move |_: Progress| {
            reports_cb.fetch_add(1, Ordering::Relaxed);
        };
        let callback: &ProgressFn = &callback;

        let result = optimize(&p, &pb, Some(callback)).unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.best().unwrap().value, 7.0);
        assert!(reports.load(Ordering::Relaxed) >= 1);
    }

    /// Determinism per seed: two identical solves agree bit for bit.
    #[test]
    fn fixed_seed_reproduces_the_solve() {
        let pb = binary_problem(
            &["x1", "x2", "x3"],
            &[1.0, 1.0, 1.0],
            ObjectiveSense::Minimize,
            vec![(vec![(1, 0), (1, 1)], 1), (vec![(1, 1), (1, 2)], 1)],
            vec![],
            vec![],
        );

        let a = solve(&params(7), &pb).unwrap();
        let b = solve(&params(7), &pb).unwrap();
        assert_eq!(a.status, b.status);
        assert_eq!(a.best().map(|s| &s.variables), b.best().map(|s| &s.variables));
        assert_eq!(a.best().map(|s| s.value), b.best().map(|s| s.value));
    }
}
