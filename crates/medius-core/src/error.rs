//! Error taxonomy for problem definition and solving
//!
//! Parse errors live in `medius-frontend`; everything downstream of a parsed
//! problem is covered here. Solver limit conditions (iteration, time, kappa)
//! are statuses on the result, not errors.

use thiserror::Error;

/// Problem-definition failures: the parsed problem cannot be solved as
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemError {
    /// The problem declares no variable.
    #[error("problem without variables")]
    EmptyVariables,

    /// The objective function has no term.
    #[error("problem without objective function")]
    EmptyObjective,

    /// A declared variable appears in no constraint and not in the
    /// objective.
    #[error("variable `{0}` is never used")]
    VariableNotUsed(String),

    /// A variable carries an inconsistent or out-of-domain bound.
    #[error("bad bound for variable `{0}`")]
    BadBound(String),

    /// Two constraints over the same elements have an empty bound
    /// intersection.
    #[error("duplicated constraint `{0}` with incompatible right-hand sides")]
    ConflictingConstraints(String),
}

/// Solver failures: the problem is well defined but cannot be handled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    /// Variables are not all binary, no kernel applies.
    #[error("no solver available for this problem")]
    NoSolverAvailable,

    /// The preprocessor proved a constraint unsatisfiable.
    #[error("unrealisable constraint `{0}`")]
    UnrealisableConstraint(String),

    /// Variable or nonzero counts exceed the engine's 32-bit index bound.
    #[error("problem too large: variable or element count exceeds the 32-bit bound")]
    NumericCastOverflow,
}

/// Any core-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Problem-definition failure.
    #[error(transparent)]
    Problem(#[from] ProblemError),

    /// Solver failure.
    #[error(transparent)]
    Solver(#[from] SolverError),
}
