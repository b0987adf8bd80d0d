//! Problem representation
//!
//! A [`RawProblem`] is what the LP parser produces: an objective, a variable
//! table, and three constraint lists keyed by relational operator. A
//! [`Problem`] is a validated raw problem extended with the variables the
//! preprocessor has already pinned and a classification of the coefficient
//! regime, which selects the per-row kernel in the engine.

use crate::error::{Error, ProblemError};

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableType {
    /// Continuous variable (unsupported by the engine, rejected at solve).
    #[default]
    Real,
    /// 0/1 variable.
    Binary,
    /// General integer variable (unsupported by the engine).
    General,
}

/// Bounds and type of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableValue {
    /// Lower bound.
    pub min: i32,
    /// Upper bound.
    pub max: i32,
    /// Declared type.
    pub kind: VariableType,
}

impl Default for VariableValue {
    fn default() -> Self {
        VariableValue {
            min: 0,
            max: i32::MAX,
            kind: VariableType::Real,
        }
    }
}

/// The variable table: parallel name and value vectors.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    /// Variable names, indexed by variable id.
    pub names: Vec<String>,
    /// Bounds and types, indexed by variable id.
    pub values: Vec<VariableValue>,
}

impl Variables {
    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no variable is declared.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One `factor * variable` term of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionElement {
    /// Integer coefficient, never zero in canonical form.
    pub factor: i32,
    /// Variable id.
    pub variable: u32,
}

/// One `factor * variable` term of the objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveElement {
    /// Floating-point coefficient.
    pub factor: f64,
    /// Variable id.
    pub variable: u32,
}

/// One `factor * variable_a * variable_b` term of a quadratic objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticElement {
    /// Floating-point coefficient.
    pub factor: f64,
    /// First variable id.
    pub variable_a: u32,
    /// Second variable id.
    pub variable_b: u32,
}

/// Linear (plus optional quadratic) objective with a constant offset.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveFunction {
    /// Linear terms.
    pub elements: Vec<ObjectiveElement>,
    /// Quadratic terms, empty for linear objectives.
    pub qelements: Vec<QuadraticElement>,
    /// Constant offset added to every objective value.
    pub constant: f64,
}

impl ObjectiveFunction {
    /// True when the objective has no linear and no quadratic term.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.qelements.is_empty()
    }
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveSense {
    /// Minimize the objective.
    #[default]
    Minimize,
    /// Maximize the objective.
    Maximize,
}

/// One relational constraint as parsed: `sum elements OP value` where the
/// operator is given by the list the constraint is stored in.
#[derive(Debug, Clone, Default)]
pub struct Constraint {
    /// Label, `ctN` by default.
    pub label: String,
    /// Position in the original constraint stream.
    pub id: usize,
    /// Left-hand side terms.
    pub elements: Vec<FunctionElement>,
    /// Right-hand side integer.
    pub value: i32,
}

/// A problem as produced by the LP parser, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawProblem {
    /// Optimization direction.
    pub sense: ObjectiveSense,
    /// Objective function.
    pub objective: ObjectiveFunction,
    /// Variable table.
    pub vars: Variables,
    /// `=` constraints.
    pub equal_constraints: Vec<Constraint>,
    /// `>=` constraints.
    pub greater_constraints: Vec<Constraint>,
    /// `<=` constraints.
    pub less_constraints: Vec<Constraint>,
}

impl RawProblem {
    /// Total number of constraints across the three lists.
    pub fn nb_constraints(&self) -> usize {
        self.equal_constraints.len() + self.greater_constraints.len() + self.less_constraints.len()
    }
}

/// Variables fixed by the preprocessor, reported back in results so callers
/// can reconstruct a full assignment over the original variable set.
#[derive(Debug, Clone, Default)]
pub struct AffectedVariables {
    /// Names of the fixed variables.
    pub names: Vec<String>,
    /// Fixed values, parallel to `names`.
    pub values: Vec<bool>,
}

impl AffectedVariables {
    /// Record one fixed variable.
    pub fn push(&mut self, name: String, value: bool) {
        self.names.push(name);
        self.values.push(value);
    }

    /// Number of fixed variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the preprocessor fixed nothing.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Classification of a problem by coefficient regime and constraint shape.
///
/// The tag is written into the solution file header and selects the
/// specialized selection procedures inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    /// Equalities only, every factor is `+1`.
    Equalities01,
    /// Equalities only, every factor is `+1` or `-1`.
    Equalities101,
    /// Equalities only, at least one `|factor| > 1`.
    EqualitiesZ,
    /// At least one inequality, every factor is `+1`.
    Inequalities01,
    /// At least one inequality, every factor is `+1` or `-1`.
    Inequalities101,
    /// At least one inequality, at least one `|factor| > 1`.
    InequalitiesZ,
}

impl ProblemType {
    /// Short tag used in solution file headers.
    pub fn tag(self) -> &'static str {
        match self {
            ProblemType::Equalities01 => "equalities-01",
            ProblemType::Equalities101 => "equalities-101",
            ProblemType::EqualitiesZ => "equalities-Z",
            ProblemType::Inequalities01 => "inequalities-01",
            ProblemType::Inequalities101 => "inequalities-101",
            ProblemType::InequalitiesZ => "inequalities-Z",
        }
    }
}

/// A validated problem, ready for merging and solving.
#[derive(Debug, Clone)]
pub struct Problem {
    /// Optimization direction.
    pub sense: ObjectiveSense,
    /// Objective over the remaining (non-affected) variables.
    pub objective: ObjectiveFunction,
    /// Remaining variables.
    pub vars: Variables,
    /// `=` constraints over remaining variables.
    pub equal_constraints: Vec<Constraint>,
    /// `>=` constraints over remaining variables.
    pub greater_constraints: Vec<Constraint>,
    /// `<=` constraints over remaining variables.
    pub less_constraints: Vec<Constraint>,
    /// Variables already pinned by the preprocessor.
    pub affected: AffectedVariables,
    /// Coefficient regime and constraint shape.
    pub problem_type: ProblemType,
}

impl Problem {
    /// Total number of constraints across the three lists.
    pub fn nb_constraints(&self) -> usize {
        self.equal_constraints.len() + self.greater_constraints.len() + self.less_constraints.len()
    }

    /// Iterate over the three constraint lists in order.
    pub fn all_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.equal_constraints
            .iter()
            .chain(self.greater_constraints.iter())
            .chain(self.less_constraints.iter())
    }

    /// Recompute the problem-type tag from the current constraint lists.
    pub fn classify(&mut self) {
        self.problem_type = classify(
            &self.equal_constraints,
            &self.greater_constraints,
            &self.less_constraints,
        );
    }
}

/// Compute the problem type from the three constraint lists.
pub(crate) fn classify(
    equal: &[Constraint],
    greater: &[Constraint],
    less: &[Constraint],
) -> ProblemType {
    let mut coefficient = 0;
    for cst in equal.iter().chain(greater).chain(less) {
        for elem in &cst.elements {
            if elem.factor < -1 || elem.factor > 1 {
                coefficient = 2;
            } else if elem.factor == -1 && coefficient < 1 {
                coefficient = 1;
            }
        }
    }

    let equalities_only = greater.is_empty() && less.is_empty();
    match (equalities_only, coefficient) {
        (true, 0) => ProblemType::Equalities01,
        (true, 1) => ProblemType::Equalities101,
        (true, _) => ProblemType::EqualitiesZ,
        (false, 0) => ProblemType::Inequalities01,
        (false, 1) => ProblemType::Inequalities101,
        (false, _) => ProblemType::InequalitiesZ,
    }
}

/// Validate a raw problem: non-empty variable table and objective, every
/// variable used somewhere, bounds consistent with declared types.
pub(crate) fn validate(pb: &RawProblem) -> Result<(), Error> {
    if pb.vars.is_empty() {
        return Err(ProblemError::EmptyVariables.into());
    }

    if pb.objective.is_empty() {
        return Err(ProblemError::EmptyObjective.into());
    }

    let mut used = vec![false; pb.vars.len()];
    for elem in &pb.objective.elements {
        used[elem.variable as usize] = true;
    }
    for elem in &pb.objective.qelements {
        used[elem.variable_a as usize] = true;
        used[elem.variable_b as usize] = true;
    }
    for cst in pb
        .equal_constraints
        .iter()
        .chain(&pb.greater_constraints)
        .chain(&pb.less_constraints)
    {
        for elem in &cst.elements {
            used[elem.variable as usize] = true;
        }
    }

    if let Some(i) = used.iter().position(|u| !u) {
        return Err(ProblemError::VariableNotUsed(pb.vars.names[i].clone()).into());
    }

    for (i, value) in pb.vars.values.iter().enumerate() {
        let bad = match value.kind {
            VariableType::Binary => {
                value.min > value.max || value.min < 0 || (value.max > 1 && value.max != i32::MAX)
            }
            _ => value.min > value.max,
        };
        if bad {
            return Err(ProblemError::BadBound(pb.vars.names[i].clone()).into());
        }
    }

    Ok(())
}
