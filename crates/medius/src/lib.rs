//! Medius - In-The-Middle heuristic solving of pseudo-Boolean programs
//!
//! The public face of the solver: read an LP file, pick a parameter block,
//! and call [`solve`] for one seeded run or [`optimize`] for parallel
//! multi-start optimization. The preprocessor runs according to
//! [`SolverParameters::preprocessor`]; variables it pins are carried back
//! into the result so the reported assignment always covers the original
//! variable set.
//!
//! ```no_run
//! let text = std::fs::read_to_string("model.lp").unwrap();
//! let problem = medius::parse_problem(&text).unwrap();
//! let params = medius::SolverParameters::default();
//! let result = medius::solve(&params, &problem).unwrap();
//! if result.is_success() {
//!     println!("objective: {}", result.best().unwrap().value);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::io;
use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;

pub use medius_core::{
    affect, preprocess, split, unpreprocess, AffectedVariables, Constraint, ConstraintOrder,
    FloatType, FunctionElement, InitPolicy, ObjectiveElement, ObjectiveFunction, ObjectiveSense,
    ObserverKind, PreprocessorKind, Problem, ProblemError, ProblemType, QuadraticElement,
    RawProblem, Solution, SolverError, SolverParameters, SolverResult, Status, VariableType,
    VariableValue, Variables,
};
pub use medius_frontend::{parse as parse_problem, write_problem, write_solution, ParseError};
pub use medius_itm::{Progress, ProgressFn};

/// Any failure between reading an LP file and finishing a solve.
#[derive(Debug, Error)]
pub enum Error {
    /// LP text could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Problem-definition or solver failure.
    #[error(transparent)]
    Core(#[from] medius_core::Error),

    /// File system failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read and parse an LP file.
///
/// # Errors
///
/// I/O failures and [`ParseError`].
pub fn read_problem(path: &Path) -> Result<RawProblem, Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_problem(&text)?)
}

/// Apply the configured preprocessor to a raw problem.
///
/// # Errors
///
/// Problem-definition errors from validation, unrealisable constraints
/// from propagation.
pub fn prepare(params: &SolverParameters, raw: &RawProblem) -> Result<Problem, Error> {
    let pb = match params.preprocessor {
        PreprocessorKind::All => preprocess(raw)?,
        PreprocessorKind::None => unpreprocess(raw)?,
    };
    Ok(pb)
}

/// Preprocess and solve with one seeded solver run.
///
/// # Errors
///
/// Definition and solver failures; limit terminations are statuses on the
/// result, not errors.
pub fn solve(params: &SolverParameters, raw: &RawProblem) -> Result<SolverResult, Error> {
    let pb = prepare(params, raw)?;
    Ok(medius_itm::solve(params, &pb)?)
}

/// Preprocess and optimize with parallel multi-start workers.
///
/// # Errors
///
/// Definition and solver failures; limit terminations are statuses on the
/// result, not errors.
pub fn optimize(
    params: &SolverParameters,
    raw: &RawProblem,
    progress: Option<&ProgressFn>,
) -> Result<SolverResult, Error> {
    let pb = prepare(params, raw)?;
    Ok(medius_itm::optimize(params, &pb, progress)?)
}

/// Evaluate a result against the original raw problem: every constraint
/// must hold under the full assignment (preprocessor-affected variables
/// included).
pub fn is_valid_solution(raw: &RawProblem, result: &SolverResult) -> bool {
    let Some(assignment) = full_assignment_by_index(raw, result) else {
        return false;
    };

    let holds = |cst: &Constraint, test: fn(i64, i64) -> bool| {
        let sum: i64 = cst
            .elements
            .iter()
            .map(|e| {
                if assignment[e.variable as usize] {
                    i64::from(e.factor)
                } else {
                    0
                }
            })
            .sum();
        test(sum, i64::from(cst.value))
    };

    raw.equal_constraints.iter().all(|c| holds(c, |s, v| s == v))
        && raw.greater_constraints.iter().all(|c| holds(c, |s, v| s >= v))
        && raw.less_constraints.iter().all(|c| holds(c, |s, v| s <= v))
}

/// Objective value of a result over the original raw problem.
pub fn compute_solution(raw: &RawProblem, result: &SolverResult) -> Option<f64> {
    let assignment = full_assignment_by_index(raw, result)?;

    let mut value = raw.objective.constant;
    for elem in &raw.objective.elements {
        if assignment[elem.variable as usize] {
            value += elem.factor;
        }
    }
    for q in &raw.objective.qelements {
        if assignment[q.variable_a as usize] && assignment[q.variable_b as usize] {
            value += q.factor;
        }
    }
    Some(value)
}

/// Rebuild the assignment over the raw problem's variable indices from the
/// result's named assignment.
fn full_assignment_by_index(raw: &RawProblem, result: &SolverResult) -> Option<Vec<bool>> {
    if result.best().is_none() {
        return None;
    }

    let by_name: FxHashMap<&str, bool> = result.full_assignment().into_iter().collect();
    let mut assignment = Vec::with_capacity(raw.vars.len());
    for name in &raw.vars.names {
        assignment.push(*by_name.get(name.as_str())?);
    }
    Some(assignment)
}
