//! Initial assignment policies
//!
//! The initial 0/1 vector is seeded by policy, then every bit is flipped
//! independently with probability `init_random`. The cycling policies
//! behave as the greedy cost-sign policy within a single solve; the
//! optimizer driver differentiates restarts through its per-worker seeds.

use medius_core::{InitPolicy, MergedConstraint};
use rand::Rng;

use crate::bit_array::BitArray;
use crate::cost::CostModel;
use crate::float::SolverFloat;
use crate::mode::Mode;

/// Seed `x` by policy and apply the Bernoulli mutation.
pub(crate) fn init_assignment<F, M, C, R>(
    x: &mut BitArray,
    constraints: &[MergedConstraint],
    costs: &C,
    policy: InitPolicy,
    init_random: f64,
    rng: &mut R,
) where
    F: SolverFloat,
    M: Mode,
    C: CostModel<F>,
    R: Rng,
{
    match policy {
        InitPolicy::PessimisticSolve => presolve_sweep(x, constraints, false),
        InitPolicy::OptimisticSolve => presolve_sweep(x, constraints, true),
        InitPolicy::Bastert | InitPolicy::Cycle | InitPolicy::CrossoverCycle => {
            for j in 0..x.len() {
                let bit = M::bastert_bit(costs.cost(j as u32, x));
                x.assign(j, bit);
            }
        }
    }

    let p = init_random.clamp(0.0, 1.0);
    if p > 0.0 {
        for j in 0..x.len() {
            if rng.gen_bool(p) {
                x.invert(j);
            }
        }
    }
}

/// Drive every constraint toward one of its bounds, in constraint order;
/// later constraints overwrite earlier decisions.
fn presolve_sweep(x: &mut BitArray, constraints: &[MergedConstraint], optimistic: bool) {
    for cst in constraints {
        let target = i64::from(if optimistic { cst.max } else { cst.min });
        let mut sum = 0i64;

        for elem in &cst.elements {
            let j = elem.variable as usize;
            let gain = i64::from(elem.factor);
            let toward_target = if gain > 0 { sum < target } else { sum > target };
            if toward_target {
                x.set(j);
                sum += gain;
            } else {
                x.unset(j);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::LinearCost;
    use crate::mode::{Maximize, Minimize};
    use medius_core::FunctionElement;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn merged(elements: Vec<(i32, u32)>, min: i32, max: i32) -> MergedConstraint {
        MergedConstraint {
            elements: elements
                .into_iter()
                .map(|(factor, variable)| FunctionElement { factor, variable })
                .collect(),
            min,
            max,
            index: 0,
            label: "ct0".to_string(),
        }
    }

    #[test]
    fn bastert_follows_cost_signs() {
        let costs = LinearCost::from_values(vec![-1.0f64, 2.0, 0.0]);
        let mut x = BitArray::new(3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        init_assignment::<f64, Minimize, _, _>(
            &mut x,
            &[],
            &costs,
            InitPolicy::Bastert,
            0.0,
            &mut rng,
        );
        assert_eq!(x.to_vec(), vec![true, false, false]);

        init_assignment::<f64, Maximize, _, _>(
            &mut x,
            &[],
            &costs,
            InitPolicy::Bastert,
            0.0,
            &mut rng,
        );
        assert_eq!(x.to_vec(), vec![false, true, false]);
    }

    #[test]
    fn zero_init_random_is_deterministic() {
        let costs = LinearCost::from_values(vec![-1.0f64, 2.0]);
        let mut a = BitArray::new(2);
        let mut b = BitArray::new(2);
        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);

        init_assignment::<f64, Minimize, _, _>(
            &mut a,
            &[],
            &costs,
            InitPolicy::Bastert,
            0.0,
            &mut rng_a,
        );
        init_assignment::<f64, Minimize, _, _>(
            &mut b,
            &[],
            &costs,
            InitPolicy::Bastert,
            0.0,
            &mut rng_b,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn presolve_sweeps_toward_the_chosen_bound() {
        let constraints = vec![merged(vec![(1, 0), (1, 1), (1, 2)], 1, 3)];
        let costs = LinearCost::from_values(vec![0.0f64; 3]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut low = BitArray::new(3);
        init_assignment::<f64, Minimize, _, _>(
            &mut low,
            &constraints,
            &costs,
            InitPolicy::PessimisticSolve,
            0.0,
            &mut rng,
        );
        assert_eq!(low.to_vec().iter().filter(|&&b| b).count(), 1);

        let mut high = BitArray::new(3);
        init_assignment::<f64, Minimize, _, _>(
            &mut high,
            &constraints,
            &costs,
            InitPolicy::OptimisticSolve,
            0.0,
            &mut rng,
        );
        assert_eq!(high.to_vec().iter().filter(|&&b| b).count(), 3);
    }

    #[test]
    fn mutation_flips_bits() {
        let costs = LinearCost::from_values(vec![1.0f64; 64]);
        let mut x = BitArray::new(64);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        init_assignment::<f64, Minimize, _, _>(
            &mut x,
            &[],
            &costs,
            InitPolicy::Bastert,
            1.0,
            &mut rng,
        );
        // Probability one: every bit flipped from the all-zero baseline.
        assert!(x.to_vec().iter().all(|&b| b));
    }
}
