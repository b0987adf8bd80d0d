//! Forced-assignment preprocessor
//!
//! A constraint becomes decisive when exactly one of its variables is still
//! free: the remaining variable's value is then determined (or the
//! constraint is trivially satisfied, or unsatisfiable). Affecting a
//! variable can make further constraints decisive, so propagation runs a
//! LIFO worklist guarded by an already-enqueued set until a fixed point.
//!
//! [`affect`] and [`split`] expose one propagation step from a chosen
//! variable; [`preprocess`] runs the whole fixed point starting from
//! bound-pinned variables and decisive single-element constraints.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::error::{Error, SolverError};
use crate::problem::{
    classify, AffectedVariables, Constraint, ObjectiveElement, ObjectiveFunction, Problem,
    RawProblem, VariableType, Variables,
};

/// Relational test applied by each constraint list.
#[derive(Debug, Clone, Copy)]
enum Relation {
    Equal,
    Greater,
    Less,
}

impl Relation {
    fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Relation::Equal => lhs == rhs,
            Relation::Greater => lhs >= rhs,
            Relation::Less => lhs <= rhs,
        }
    }
}

/// For one variable, the constraints of each list it appears in.
#[derive(Debug, Default, Clone)]
struct VariableAccess {
    in_equal: Vec<usize>,
    in_greater: Vec<usize>,
    in_less: Vec<usize>,
}

/// LIFO worklist with an ever-enqueued guard preventing re-entry.
struct Lifo {
    data: Vec<(u32, bool)>,
    enqueued: FxHashSet<u32>,
}

impl Lifo {
    fn new(variable: u32, value: bool) -> Self {
        let mut enqueued = FxHashSet::default();
        enqueued.insert(variable);
        Lifo {
            data: vec![(variable, value)],
            enqueued,
        }
    }

    fn push(&mut self, variable: u32, value: bool) -> bool {
        if !self.enqueued.insert(variable) {
            return false;
        }
        self.data.push((variable, value));
        true
    }

    fn pop(&mut self) -> Option<(u32, bool)> {
        self.data.pop()
    }
}

struct Preprocessor<'a> {
    pb: &'a Problem,
    access: Vec<VariableAccess>,
    affected: FxHashMap<u32, bool>,
    equal_counts: Vec<usize>,
    greater_counts: Vec<usize>,
    less_counts: Vec<usize>,
}

impl<'a> Preprocessor<'a> {
    fn new(pb: &'a Problem) -> Self {
        let mut access = vec![VariableAccess::default(); pb.vars.len()];

        for (i, cst) in pb.equal_constraints.iter().enumerate() {
            for elem in &cst.elements {
                access[elem.variable as usize].in_equal.push(i);
            }
        }
        for (i, cst) in pb.greater_constraints.iter().enumerate() {
            for elem in &cst.elements {
                access[elem.variable as usize].in_greater.push(i);
            }
        }
        for (i, cst) in pb.less_constraints.iter().enumerate() {
            for elem in &cst.elements {
                access[elem.variable as usize].in_less.push(i);
            }
        }

        Preprocessor {
            pb,
            access,
            affected: FxHashMap::default(),
            equal_counts: pb.equal_constraints.iter().map(|c| c.elements.len()).collect(),
            greater_counts: pb
                .greater_constraints
                .iter()
                .map(|c| c.elements.len())
                .collect(),
            less_counts: pb.less_constraints.iter().map(|c| c.elements.len()).collect(),
        }
    }

    fn run(&mut self, variable: u32, value: bool) -> Result<Problem, Error> {
        self.affect_variable(variable, value)?;
        self.make_problem()
    }

    /// Reduce a decisive constraint to its single free variable and decide
    /// that variable's value. `Ok(None)` means both values satisfy the
    /// constraint, which therefore disappears.
    fn reduce_forced(
        &self,
        cst: &Constraint,
        relation: Relation,
    ) -> Result<Option<(u32, bool)>, Error> {
        let mut residual = i64::from(cst.value);
        let mut remaining: Option<(i32, u32)> = None;

        for elem in &cst.elements {
            match self.affected.get(&elem.variable) {
                Some(&value) => residual -= i64::from(elem.factor) * i64::from(value),
                None => {
                    debug_assert!(remaining.is_none(), "constraint not decisive");
                    remaining = Some((elem.factor, elem.variable));
                }
            }
        }

        let Some((factor, variable)) = remaining else {
            // Every variable already pinned: just check the row.
            if relation.holds(0, residual) {
                return Ok(None);
            }
            return Err(SolverError::UnrealisableConstraint(cst.label.clone()).into());
        };

        let ok_0 = relation.holds(0, residual);
        let ok_1 = relation.holds(i64::from(factor), residual);

        match (ok_0, ok_1) {
            (true, true) => Ok(None),
            (true, false) => Ok(Some((variable, false))),
            (false, true) => Ok(Some((variable, true))),
            (false, false) => {
                Err(SolverError::UnrealisableConstraint(cst.label.clone()).into())
            }
        }
    }

    fn affect_variable(&mut self, variable: u32, value: bool) -> Result<(), Error> {
        self.affected.insert(variable, value);
        let mut lifo = Lifo::new(variable, value);

        while let Some((variable, value)) = lifo.pop() {
            info!(
                variable = self.pb.vars.names[variable as usize].as_str(),
                value, "variable assigned"
            );

            let access = self.access[variable as usize].clone();
            self.visit_list(&access.in_equal, Relation::Equal, &mut lifo)?;
            self.visit_list(&access.in_greater, Relation::Greater, &mut lifo)?;
            self.visit_list(&access.in_less, Relation::Less, &mut lifo)?;
        }

        Ok(())
    }

    fn visit_list(
        &mut self,
        constraints: &[usize],
        relation: Relation,
        lifo: &mut Lifo,
    ) -> Result<(), Error> {
        for &ci in constraints {
            let count = match relation {
                Relation::Equal => &mut self.equal_counts[ci],
                Relation::Greater => &mut self.greater_counts[ci],
                Relation::Less => &mut self.less_counts[ci],
            };
            if *count == 0 {
                continue;
            }
            *count -= 1;
            if *count != 1 {
                continue;
            }
            *count = 0;

            let cst = match relation {
                Relation::Equal => &self.pb.equal_constraints[ci],
                Relation::Greater => &self.pb.greater_constraints[ci],
                Relation::Less => &self.pb.less_constraints[ci],
            };
            debug!(constraint = cst.label.as_str(), "decisive constraint removed");

            if let Some((variable, value)) = self.reduce_forced(cst, relation)? {
                match self.affected.get(&variable) {
                    Some(&previous) if previous != value => {
                        return Err(
                            SolverError::UnrealisableConstraint(cst.label.clone()).into()
                        );
                    }
                    Some(_) => {}
                    None => {
                        self.affected.insert(variable, value);
                        lifo.push(variable, value);
                    }
                }
            }
        }

        Ok(())
    }

    /// Emit the reduced problem: affected variables substituted everywhere,
    /// remaining variables reindexed densely.
    fn make_problem(&self) -> Result<Problem, Error> {
        let pb = self.pb;

        // Old index -> new index for surviving variables.
        let mut remap = vec![u32::MAX; pb.vars.len()];
        let mut vars = Variables::default();
        let mut affected = pb.affected.clone();

        for i in 0..pb.vars.len() {
            match self.affected.get(&(i as u32)) {
                Some(&value) => affected.push(pb.vars.names[i].clone(), value),
                None => {
                    remap[i] = vars.names.len() as u32;
                    vars.names.push(pb.vars.names[i].clone());
                    vars.values.push(pb.vars.values[i]);
                }
            }
        }

        let equal_constraints =
            self.copy_constraints(&pb.equal_constraints, &self.equal_counts, &remap);
        let greater_constraints =
            self.copy_constraints(&pb.greater_constraints, &self.greater_counts, &remap);
        let less_constraints =
            self.copy_constraints(&pb.less_constraints, &self.less_counts, &remap);

        let objective = self.copy_objective(&remap);
        let problem_type = classify(&equal_constraints, &greater_constraints, &less_constraints);

        Ok(Problem {
            sense: pb.sense,
            objective,
            vars,
            equal_constraints,
            greater_constraints,
            less_constraints,
            affected,
            problem_type,
        })
    }

    fn copy_constraints(
        &self,
        constraints: &[Constraint],
        counts: &[usize],
        remap: &[u32],
    ) -> Vec<Constraint> {
        let mut out = Vec::new();

        for (i, cst) in constraints.iter().enumerate() {
            // Reduced constraints are gone; one remaining free variable is
            // undecidable but useless (x <= 1 style), drop it too.
            if counts[i] <= 1 {
                continue;
            }

            let mut copy = Constraint {
                label: cst.label.clone(),
                id: cst.id,
                elements: Vec::with_capacity(counts[i]),
                value: cst.value,
            };

            for elem in &cst.elements {
                match self.affected.get(&elem.variable) {
                    Some(&true) => copy.value -= elem.factor,
                    Some(&false) => {}
                    None => copy.elements.push(crate::problem::FunctionElement {
                        factor: elem.factor,
                        variable: remap[elem.variable as usize],
                    }),
                }
            }

            out.push(copy);
        }

        out
    }

    fn copy_objective(&self, remap: &[u32]) -> ObjectiveFunction {
        let pb = self.pb;
        let mut objective = ObjectiveFunction {
            elements: Vec::with_capacity(pb.objective.elements.len()),
            qelements: Vec::new(),
            constant: pb.objective.constant,
        };

        for elem in &pb.objective.elements {
            match self.affected.get(&elem.variable) {
                Some(&value) => objective.constant += elem.factor * f64::from(u8::from(value)),
                None => objective.elements.push(ObjectiveElement {
                    factor: elem.factor,
                    variable: remap[elem.variable as usize],
                }),
            }
        }

        for q in &pb.objective.qelements {
            let a = self.affected.get(&q.variable_a).copied();
            let b = self.affected.get(&q.variable_b).copied();
            match (a, b) {
                (Some(va), Some(vb)) => {
                    objective.constant +=
                        q.factor * f64::from(u8::from(va)) * f64::from(u8::from(vb));
                }
                (Some(true), None) => objective.elements.push(ObjectiveElement {
                    factor: q.factor,
                    variable: remap[q.variable_b as usize],
                }),
                (None, Some(true)) => objective.elements.push(ObjectiveElement {
                    factor: q.factor,
                    variable: remap[q.variable_a as usize],
                }),
                (Some(false), None) | (None, Some(false)) => {}
                (None, None) => objective.qelements.push(crate::problem::QuadraticElement {
                    factor: q.factor,
                    variable_a: remap[q.variable_a as usize],
                    variable_b: remap[q.variable_b as usize],
                }),
            }
        }

        objective
    }
}

/// Affect one variable and propagate the consequences, returning the
/// reduced problem.
///
/// # Errors
///
/// [`SolverError::UnrealisableConstraint`] when propagation reaches a
/// contradiction.
pub fn affect(pb: &Problem, variable: u32, value: bool) -> Result<Problem, Error> {
    debug_assert!((variable as usize) < pb.vars.len());
    Preprocessor::new(pb).run(variable, value)
}

/// Split the problem on one variable: the reduced problems for the `true`
/// and `false` branch, in that order.
///
/// # Errors
///
/// [`SolverError::UnrealisableConstraint`] when either branch reaches a
/// contradiction.
pub fn split(pb: &Problem, variable: u32) -> Result<(Problem, Problem), Error> {
    Ok((affect(pb, variable, true)?, affect(pb, variable, false)?))
}

/// Validate a raw problem and convert it without any propagation.
///
/// # Errors
///
/// Problem-definition errors from validation.
pub fn unpreprocess(raw: &RawProblem) -> Result<Problem, Error> {
    crate::problem::validate(raw)?;

    let mut pb = Problem {
        sense: raw.sense,
        objective: raw.objective.clone(),
        vars: raw.vars.clone(),
        equal_constraints: raw.equal_constraints.clone(),
        greater_constraints: raw.greater_constraints.clone(),
        less_constraints: raw.less_constraints.clone(),
        affected: AffectedVariables::default(),
        problem_type: crate::problem::ProblemType::Inequalities01,
    };

    for (i, cst) in pb
        .equal_constraints
        .iter_mut()
        .chain(pb.greater_constraints.iter_mut())
        .chain(pb.less_constraints.iter_mut())
        .enumerate()
    {
        if cst.label.is_empty() {
            cst.label = format!("ct{i}");
        }
    }

    pb.classify();
    Ok(pb)
}

/// Validate a raw problem and run forced-assignment propagation to a fixed
/// point: bound-pinned binary variables and decisive single-element
/// constraints seed the worklist; trivial single-element constraints are
/// removed.
///
/// # Errors
///
/// Problem-definition errors from validation, and
/// [`SolverError::UnrealisableConstraint`] on contradiction.
pub fn preprocess(raw: &RawProblem) -> Result<Problem, Error> {
    let mut pb = unpreprocess(raw)?;

    loop {
        let Some((variable, value)) = find_forced(&pb)? else {
            break;
        };
        pb = affect(&pb, variable, value)?;
    }

    drop_trivial_singles(&mut pb);
    pb.classify();

    info!(
        variables = pb.vars.len(),
        affected = pb.affected.len(),
        constraints = pb.nb_constraints(),
        "preprocessing finished"
    );

    Ok(pb)
}

/// Find one variable whose value is already forced, either by its declared
/// bounds or by a decisive single-element constraint.
fn find_forced(pb: &Problem) -> Result<Option<(u32, bool)>, Error> {
    for (i, value) in pb.vars.values.iter().enumerate() {
        if value.kind == VariableType::Binary && value.min == value.max {
            return Ok(Some((i as u32, value.min == 1)));
        }
    }

    let lists = [
        (Relation::Equal, &pb.equal_constraints),
        (Relation::Greater, &pb.greater_constraints),
        (Relation::Less, &pb.less_constraints),
    ];

    for (relation, list) in lists {
        for cst in list.iter() {
            let [elem] = cst.elements.as_slice() else {
                continue;
            };
            let rhs = i64::from(cst.value);
            let ok_0 = relation.holds(0, rhs);
            let ok_1 = relation.holds(i64::from(elem.factor), rhs);
            match (ok_0, ok_1) {
                (true, true) => {}
                (true, false) => return Ok(Some((elem.variable, false))),
                (false, true) => return Ok(Some((elem.variable, true))),
                (false, false) => {
                    return Err(SolverError::UnrealisableConstraint(cst.label.clone()).into())
                }
            }
        }
    }

    Ok(None)
}

/// Remove single-element constraints satisfied by both values.
fn drop_trivial_singles(pb: &mut Problem) {
    pb.equal_constraints.retain(|c| c.elements.len() != 1);
    pb.greater_constraints.retain(|c| c.elements.len() != 1);
    pb.less_constraints.retain(|c| c.elements.len() != 1);
}
