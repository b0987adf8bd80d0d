//! Constraint merger
//!
//! Canonicalizes the three relational constraint lists into a single list of
//! two-sided `[min, max]` bounded forms. Constraints sharing the same
//! canonical element set are merged by intersecting their bounds, and
//! infinite sides are replaced by the tightest trivial bound derived from
//! the coefficient signs, so every merged constraint leaves here with both
//! bounds finite.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Error, ProblemError, SolverError};
use crate::problem::{Constraint, FunctionElement, Problem};

/// A canonical constraint with finite two-sided bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConstraint {
    /// Elements sorted by variable id, duplicate columns summed, zero
    /// factors removed.
    pub elements: Vec<FunctionElement>,
    /// Lower bound on `sum factor * x`.
    pub min: i32,
    /// Upper bound on `sum factor * x`.
    pub max: i32,
    /// Id of the first original constraint folded into this one.
    pub index: usize,
    /// Label of the first original constraint folded into this one.
    pub label: String,
}

impl MergedConstraint {
    /// True when the bounds pin the row to a single value.
    pub fn is_equality(&self) -> bool {
        self.min == self.max
    }
}

/// Relational shape of a source constraint list.
#[derive(Debug, Clone, Copy)]
enum Op {
    Equal,
    Greater,
    Less,
}

struct PendingConstraint {
    elements: Vec<FunctionElement>,
    min: i64,
    max: i64,
    index: usize,
    label: String,
    merged: bool,
    is_equality: bool,
}

/// Merge the three constraint lists of `pb` into canonical bounded form.
///
/// # Errors
///
/// [`ProblemError::ConflictingConstraints`] when duplicated constraints
/// intersect to an empty bound interval,
/// [`SolverError::UnrealisableConstraint`] when a single constraint cannot
/// be satisfied by any 0/1 assignment, and
/// [`SolverError::NumericCastOverflow`] when summed duplicate coefficients
/// leave the 32-bit range.
pub fn make_merged_constraints(pb: &Problem) -> Result<Vec<MergedConstraint>, Error> {
    let mut out: Vec<PendingConstraint> = Vec::with_capacity(pb.nb_constraints());
    let mut seen: FxHashMap<Vec<FunctionElement>, usize> = FxHashMap::default();

    let lists = [
        (Op::Equal, &pb.equal_constraints),
        (Op::Greater, &pb.greater_constraints),
        (Op::Less, &pb.less_constraints),
    ];

    for (op, list) in lists {
        for cst in list.iter() {
            push_constraint(&mut out, &mut seen, op, cst)?;
        }
    }

    debug!(
        raw = pb.nb_constraints(),
        merged = out.len(),
        "constraints merged"
    );

    out.into_iter()
        .filter_map(|pending| finalize(pending).transpose())
        .collect()
}

fn push_constraint(
    out: &mut Vec<PendingConstraint>,
    seen: &mut FxHashMap<Vec<FunctionElement>, usize>,
    op: Op,
    cst: &Constraint,
) -> Result<(), Error> {
    let elements = canonicalize(cst)?;
    let value = i64::from(cst.value);
    let (min, max) = match op {
        Op::Equal => (value, value),
        Op::Greater => (value, i64::MAX),
        Op::Less => (i64::MIN, value),
    };

    match seen.get(&elements) {
        Some(&at) => {
            let slot = &mut out[at];
            slot.min = slot.min.max(min);
            slot.max = slot.max.min(max);
            slot.merged = true;
            slot.is_equality = slot.is_equality || matches!(op, Op::Equal);
            if slot.min > slot.max {
                return Err(ProblemError::ConflictingConstraints(slot.label.clone()).into());
            }
        }
        None => {
            seen.insert(elements.clone(), out.len());
            out.push(PendingConstraint {
                elements,
                min,
                max,
                index: cst.id,
                label: cst.label.clone(),
                merged: false,
                is_equality: matches!(op, Op::Equal),
            });
        }
    }

    Ok(())
}

/// Sum duplicate columns, drop zero factors, sort by variable id.
fn canonicalize(cst: &Constraint) -> Result<Vec<FunctionElement>, Error> {
    let mut factors: FxHashMap<u32, i64> = FxHashMap::default();
    for elem in &cst.elements {
        *factors.entry(elem.variable).or_insert(0) += i64::from(elem.factor);
    }

    let mut elements = Vec::with_capacity(factors.len());
    for (variable, factor) in factors {
        if factor == 0 {
            continue;
        }
        let factor = i32::try_from(factor).map_err(|_| SolverError::NumericCastOverflow)?;
        elements.push(FunctionElement { factor, variable });
    }
    elements.sort_unstable_by_key(|e| e.variable);

    Ok(elements)
}

/// Clamp infinite sides to the coefficient-sign bounds and check
/// satisfiability of the resulting interval.
fn finalize(pending: PendingConstraint) -> Result<Option<MergedConstraint>, Error> {
    let PendingConstraint {
        elements,
        min,
        max,
        index,
        label,
        merged,
        is_equality,
    } = pending;

    let sum_neg: i64 = elements
        .iter()
        .map(|e| i64::from(e.factor.min(0)))
        .sum();
    let sum_pos: i64 = elements
        .iter()
        .map(|e| i64::from(e.factor.max(0)))
        .sum();

    if elements.is_empty() {
        // Everything cancelled; the constraint reads `0 in [min, max]`.
        if min <= 0 && 0 <= max {
            return Ok(None);
        }
        return Err(SolverError::UnrealisableConstraint(label).into());
    }

    // A pinned row keeps its exact value; an interval row is tightened to
    // the reachable sum range.
    let (min, max) = if is_equality && min == max {
        if min < sum_neg || max > sum_pos {
            return Err(SolverError::UnrealisableConstraint(label).into());
        }
        (min, max)
    } else {
        let min = min.max(sum_neg);
        let max = max.min(sum_pos);
        if min > max {
            if merged {
                return Err(ProblemError::ConflictingConstraints(label).into());
            }
            return Err(SolverError::UnrealisableConstraint(label).into());
        }
        (min, max)
    };

    Ok(Some(MergedConstraint {
        elements,
        min: min as i32,
        max: max as i32,
        index,
        label,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        classify, ObjectiveFunction, ObjectiveSense, Variables, AffectedVariables,
    };

    fn elem(factor: i32, variable: u32) -> FunctionElement {
        FunctionElement { factor, variable }
    }

    fn cst(label: &str, id: usize, elements: Vec<FunctionElement>, value: i32) -> Constraint {
        Constraint {
            label: label.to_string(),
            id,
            elements,
            value,
        }
    }

    fn problem(
        equal: Vec<Constraint>,
        greater: Vec<Constraint>,
        less: Vec<Constraint>,
    ) -> Problem {
        let problem_type = classify(&equal, &greater, &less);
        Problem {
            sense: ObjectiveSense::Minimize,
            objective: ObjectiveFunction::default(),
            vars: Variables::default(),
            equal_constraints: equal,
            greater_constraints: greater,
            less_constraints: less,
            affected: AffectedVariables::default(),
            problem_type,
        }
    }

    #[test]
    fn greater_and_less_get_finite_bounds() {
        let pb = problem(
            vec![],
            vec![cst("g", 0, vec![elem(1, 0), elem(1, 1)], 1)],
            vec![cst("l", 1, vec![elem(1, 2), elem(1, 3)], 1)],
        );

        let merged = make_merged_constraints(&pb).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].min, merged[0].max), (1, 2));
        assert_eq!((merged[1].min, merged[1].max), (0, 1));
    }

    #[test]
    fn duplicates_intersect_bounds() {
        let pb = problem(
            vec![],
            vec![cst("a", 0, vec![elem(1, 0), elem(1, 1)], 1)],
            vec![cst("b", 1, vec![elem(1, 1), elem(1, 0)], 1)],
        );

        let merged = make_merged_constraints(&pb).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].min, merged[0].max), (1, 1));
        assert_eq!(merged[0].label, "a");
    }

    #[test]
    fn conflicting_duplicates_fail() {
        let pb = problem(
            vec![
                cst("a", 0, vec![elem(1, 0), elem(1, 1)], 1),
                cst("b", 1, vec![elem(1, 0), elem(1, 1)], 2),
            ],
            vec![],
            vec![],
        );

        assert!(matches!(
            make_merged_constraints(&pb),
            Err(Error::Problem(ProblemError::ConflictingConstraints(_)))
        ));
    }

    #[test]
    fn unreachable_equality_fails() {
        let pb = problem(
            vec![cst("a", 0, vec![elem(1, 0), elem(1, 1)], 3)],
            vec![],
            vec![],
        );

        assert!(matches!(
            make_merged_constraints(&pb),
            Err(Error::Solver(SolverError::UnrealisableConstraint(_)))
        ));
    }

    #[test]
    fn duplicate_columns_are_summed() {
        let pb = problem(
            vec![],
            vec![],
            vec![cst("a", 0, vec![elem(1, 0), elem(2, 0), elem(-1, 1)], 2)],
        );

        let merged = make_merged_constraints(&pb).unwrap();
        assert_eq!(merged[0].elements, vec![elem(3, 0), elem(-1, 1)]);
        assert_eq!((merged[0].min, merged[0].max), (-1, 2));
    }

    #[test]
    fn cancelled_elements_drop_satisfied_constraint() {
        let pb = problem(
            vec![],
            vec![],
            vec![cst("a", 0, vec![elem(1, 0), elem(-1, 0)], 2)],
        );

        let merged = make_merged_constraints(&pb).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn negative_factors_widen_the_low_side() {
        let pb = problem(
            vec![],
            vec![cst("a", 0, vec![elem(-1, 0), elem(-1, 1), elem(1, 2)], -1)],
            vec![],
        );

        let merged = make_merged_constraints(&pb).unwrap();
        assert_eq!((merged[0].min, merged[0].max), (-1, 1));
    }
}
