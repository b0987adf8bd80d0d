//! Property tests over random covering instances.

use medius::{
    is_valid_solution, solve, Constraint, FunctionElement, ObjectiveElement, ObjectiveFunction,
    ObjectiveSense, RawProblem, SolverParameters, Status, VariableType, VariableValue, Variables,
};
use proptest::prelude::*;

/// A random covering problem: every constraint asks for at least one
/// variable of a nonempty subset, so the all-ones assignment always
/// satisfies it.
fn raw_covering(n: usize, subsets: &[Vec<usize>]) -> RawProblem {
    RawProblem {
        sense: ObjectiveSense::Minimize,
        objective: ObjectiveFunction {
            elements: (0..n)
                .map(|i| ObjectiveElement {
                    factor: 1.0,
                    variable: i as u32,
                })
                .collect(),
            qelements: Vec::new(),
            constant: 0.0,
        },
        vars: Variables {
            names: (0..n).map(|i| format!("x{i}")).collect(),
            values: vec![
                VariableValue {
                    min: 0,
                    max: 1,
                    kind: VariableType::Binary,
                };
                n
            ],
        },
        equal_constraints: Vec::new(),
        greater_constraints: subsets
            .iter()
            .enumerate()
            .map(|(id, subset)| Constraint {
                label: format!("ct{id}"),
                id,
                elements: subset
                    .iter()
                    .map(|&variable| FunctionElement {
                        factor: 1,
                        variable: variable as u32,
                    })
                    .collect(),
                value: 1,
            })
            .collect(),
        less_constraints: Vec::new(),
    }
}

fn covering_strategy() -> impl Strategy<Value = (usize, Vec<Vec<usize>>)> {
    (2usize..=5).prop_flat_map(|n| {
        let subset = proptest::collection::hash_set(0..n, 1..=n)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>());
        proptest::collection::vec(subset, 1..=4).prop_map(move |subsets| (n, subsets))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whenever the solver claims success, the reported assignment really
    /// satisfies every original constraint.
    #[test]
    fn success_implies_feasibility((n, subsets) in covering_strategy(), seed in 0u64..32) {
        let raw = raw_covering(n, &subsets);
        let params = SolverParameters {
            seed: Some(seed),
            limit: 500,
            ..Default::default()
        };

        let result = solve(&params, &raw).unwrap();
        if result.status == Status::Success {
            prop_assert!(is_valid_solution(&raw, &result));
        }

        // Covering instances are always satisfiable and small, so the
        // solver is expected to find a cover.
        prop_assert_eq!(result.status, Status::Success);
    }
}
