//! Medius core - data model for pseudo-Boolean linear programs
//!
//! This crate holds everything the In-The-Middle engine consumes but does
//! not compute: the raw and validated problem representations, the
//! constraint merger that canonicalizes the three relational constraint
//! lists into two-sided bounded forms, the propagation preprocessor, the
//! solver parameter block, and the result/report types handed back to
//! callers.
//!
//! The engine itself lives in `medius-itm`; the LP text format lives in
//! `medius-frontend`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod merge;
pub mod preprocess;
pub mod problem;
pub mod result;

pub use context::{
    ConstraintOrder, FloatType, InitPolicy, ObserverKind, PreprocessorKind, SolverParameters,
};
pub use error::{Error, ProblemError, SolverError};
pub use merge::{make_merged_constraints, MergedConstraint};
pub use preprocess::{affect, preprocess, split, unpreprocess};
pub use problem::{
    AffectedVariables, Constraint, FunctionElement, ObjectiveElement, ObjectiveFunction,
    ObjectiveSense, Problem, ProblemType, QuadraticElement, RawProblem, VariableType,
    VariableValue, Variables,
};
pub use result::{Solution, SolverResult, Status};
