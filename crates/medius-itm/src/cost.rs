//! Cost models and normalization
//!
//! The engine reads per-variable costs through a small trait with a single
//! callback, so the inner loops stay generic over the linear and quadratic
//! variants. Quadratic terms are linearized on the fly against the current
//! assignment.
//!
//! Costs handed to the engine are normalized: scaled by the L-infinity norm
//! into a stable numeric range, then tied values (equal cost, equal sign)
//! are separated with a small jitter drawn from the solve's seeded RNG. The
//! jitter is bounded by the gap to the next distinct cost, so the relative
//! order of non-tied pairs never changes. Without it the selection kernels
//! can enter deterministic tie cycles.

use medius_core::ObjectiveFunction;
use rand::Rng;

use crate::bit_array::BitArray;
use crate::float::SolverFloat;

/// Per-variable cost read by the reduced-cost computation.
pub trait CostModel<F: SolverFloat>: Send + Sync {
    /// Cost of setting `variable` under the current assignment `x`.
    fn cost(&self, variable: u32, x: &BitArray) -> F;

    /// Smallest nonzero `|cost|`, infinity when every cost is zero.
    fn min_nonzero(&self) -> F;

    /// A normalized copy of this model; see the module documentation.
    fn normalized<R: Rng>(&self, rng: &mut R) -> Self
    where
        Self: Sized;
}

/// Linear objective costs.
#[derive(Debug, Clone)]
pub struct LinearCost<F> {
    costs: Vec<F>,
}

impl<F: SolverFloat> LinearCost<F> {
    /// Accumulate the linear objective over `n` variables.
    pub fn new(objective: &ObjectiveFunction, n: usize) -> Self {
        let mut costs = vec![F::zero(); n];
        for elem in &objective.elements {
            costs[elem.variable as usize] += F::from_f64(elem.factor);
        }
        LinearCost { costs }
    }

    #[cfg(test)]
    pub(crate) fn from_values(costs: Vec<F>) -> Self {
        LinearCost { costs }
    }

    #[cfg(test)]
    pub(crate) fn values(&self) -> &[F] {
        &self.costs
    }
}

impl<F: SolverFloat> CostModel<F> for LinearCost<F> {
    #[inline]
    fn cost(&self, variable: u32, _x: &BitArray) -> F {
        self.costs[variable as usize]
    }

    fn min_nonzero(&self) -> F {
        min_nonzero(&self.costs)
    }

    fn normalized<R: Rng>(&self, rng: &mut R) -> Self {
        let mut costs = self.costs.clone();
        let norm = linf(&costs);
        if norm > F::zero() {
            for c in &mut costs {
                *c = *c / norm;
            }
        }
        jitter_ties(&mut costs, rng);
        LinearCost { costs }
    }
}

/// Quadratic objective costs: a linear part plus, for each variable, the
/// pair terms it participates in.
#[derive(Debug, Clone)]
pub struct QuadraticCost<F> {
    linear: Vec<F>,
    pairs: Vec<Vec<(u32, F)>>,
}

impl<F: SolverFloat> QuadraticCost<F> {
    /// Accumulate a quadratic objective over `n` variables.
    pub fn new(objective: &ObjectiveFunction, n: usize) -> Self {
        let mut linear = vec![F::zero(); n];
        for elem in &objective.elements {
            linear[elem.variable as usize] += F::from_f64(elem.factor);
        }

        let mut pairs = vec![Vec::new(); n];
        for q in &objective.qelements {
            let factor = F::from_f64(q.factor);
            pairs[q.variable_a as usize].push((q.variable_b, factor));
            pairs[q.variable_b as usize].push((q.variable_a, factor));
        }

        QuadraticCost { linear, pairs }
    }
}

impl<F: SolverFloat> CostModel<F> for QuadraticCost<F> {
    fn cost(&self, variable: u32, x: &BitArray) -> F {
        let mut value = self.linear[variable as usize];
        for &(other, factor) in &self.pairs[variable as usize] {
            if x.get(other as usize) {
                value += factor;
            }
        }
        value
    }

    fn min_nonzero(&self) -> F {
        min_nonzero(&self.linear)
    }

    fn normalized<R: Rng>(&self, rng: &mut R) -> Self {
        let mut linear = self.linear.clone();
        let mut pairs = self.pairs.clone();

        let mut norm = linf(&linear);
        for row in &pairs {
            for &(_, factor) in row {
                norm = norm.max(factor.abs());
            }
        }

        if norm > F::zero() {
            for c in &mut linear {
                *c = *c / norm;
            }
            for row in &mut pairs {
                for (_, factor) in row {
                    *factor = *factor / norm;
                }
            }
        }

        jitter_ties(&mut linear, rng);
        QuadraticCost { linear, pairs }
    }
}

/// Objective value of an assignment over the original (unnormalized)
/// objective, constant included.
pub fn objective_value(objective: &ObjectiveFunction, x: &BitArray) -> f64 {
    let mut value = objective.constant;
    for elem in &objective.elements {
        if x.get(elem.variable as usize) {
            value += elem.factor;
        }
    }
    for q in &objective.qelements {
        if x.get(q.variable_a as usize) && x.get(q.variable_b as usize) {
            value += q.factor;
        }
    }
    value
}

/// Derive the base preference update magnitude when the caller left it
/// unset: the smallest normalized cost step scaled by the preference decay.
pub fn compute_delta<F: SolverFloat>(min_nonzero: F, theta: F) -> F {
    let delta = (F::one() - theta) * min_nonzero;
    if delta.is_finite() && delta > F::zero() {
        delta
    } else {
        F::from_f64(1e-2)
    }
}

fn linf<F: SolverFloat>(costs: &[F]) -> F {
    costs.iter().fold(F::zero(), |acc, c| acc.max(c.abs()))
}

fn min_nonzero<F: SolverFloat>(costs: &[F]) -> F {
    costs.iter().fold(F::infinity(), |acc, c| {
        if *c == F::zero() {
            acc
        } else {
            acc.min(c.abs())
        }
    })
}

/// Separate runs of equal cost with a jitter bounded by the gap to the
/// next distinct value.
fn jitter_ties<F: SolverFloat, R: Rng>(costs: &mut [F], rng: &mut R) {
    let mut order: Vec<usize> = (0..costs.len()).collect();
    order.sort_by(|&a, &b| {
        costs[a]
            .partial_cmp(&costs[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && costs[order[j]] == costs[order[i]] {
            j += 1;
        }
        if j - i > 1 {
            let gap = if j < order.len() {
                costs[order[j]] - costs[order[i]]
            } else {
                F::one()
            };
            for &id in &order[i..j] {
                costs[id] += gap * F::from_f64(rng.gen_range(0.0..0.5));
            }
        }
        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medius_core::{ObjectiveElement, QuadraticElement};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn objective(factors: &[f64]) -> ObjectiveFunction {
        ObjectiveFunction {
            elements: factors
                .iter()
                .enumerate()
                .map(|(i, &factor)| ObjectiveElement {
                    factor,
                    variable: i as u32,
                })
                .collect(),
            qelements: Vec::new(),
            constant: 0.0,
        }
    }

    #[test]
    fn normalization_breaks_ties_but_keeps_order() {
        let cost = LinearCost::<f64>::new(&objective(&[2.0, 2.0, 2.0, 4.0, 1.0]), 5);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let norm = cost.normalized(&mut rng);
        let v = norm.values();

        // Tied values become distinct.
        assert!(v[0] != v[1] && v[1] != v[2] && v[0] != v[2]);
        // Non-tied pairs keep their relative order.
        for &tied in &v[0..3] {
            assert!(v[4] < tied && tied < v[3]);
        }
    }

    #[test]
    fn normalization_scales_into_unit_range() {
        let cost = LinearCost::<f64>::new(&objective(&[-8.0, 2.0, 4.0]), 3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let norm = cost.normalized(&mut rng);
        assert!(norm.values().iter().all(|c| c.abs() <= 1.0));
        assert_eq!(norm.values()[0], -1.0);
    }

    #[test]
    fn quadratic_cost_linearizes_against_x() {
        let objective = ObjectiveFunction {
            elements: vec![ObjectiveElement {
                factor: 1.0,
                variable: 0,
            }],
            qelements: vec![QuadraticElement {
                factor: 2.0,
                variable_a: 0,
                variable_b: 1,
            }],
            constant: 0.0,
        };
        let cost = QuadraticCost::<f64>::new(&objective, 2);

        let mut x = BitArray::new(2);
        assert_eq!(cost.cost(0, &x), 1.0);
        x.set(1);
        assert_eq!(cost.cost(0, &x), 3.0);
        assert_eq!(cost.cost(1, &x), 2.0);
    }

    #[test]
    fn objective_value_includes_constant_and_pairs() {
        let objective = ObjectiveFunction {
            elements: vec![ObjectiveElement {
                factor: 3.0,
                variable: 0,
            }],
            qelements: vec![QuadraticElement {
                factor: 5.0,
                variable_a: 0,
                variable_b: 1,
            }],
            constant: 1.0,
        };

        let mut x = BitArray::new(2);
        assert_eq!(objective_value(&objective, &x), 1.0);
        x.set(0);
        assert_eq!(objective_value(&objective, &x), 4.0);
        x.set(1);
        assert_eq!(objective_value(&objective, &x), 9.0);
    }

    #[test]
    fn delta_derivation_scales_with_theta() {
        assert_eq!(compute_delta(0.5f64, 0.5), 0.25);
        // Degenerate costs fall back to a small constant.
        assert_eq!(compute_delta(f64::INFINITY, 0.5), 1e-2);
    }
}
