//! Optimization mode tags
//!
//! `Minimize` and `Maximize` are zero-sized types threaded through the
//! engine so the inner loops monomorphize over the optimization direction,
//! mirroring the float-type split. The mode decides the reduced-cost sort
//! direction, the early-stop test of the inequality scan, which bound an
//! inequality row is driven toward, and what counts as a better objective.

use std::cmp::Ordering;

use medius_core::ObjectiveSense;
use rand::Rng;

use crate::float::SolverFloat;

/// Optimization direction tag.
pub trait Mode: Copy + Default + Send + Sync + 'static {
    /// The equivalent runtime sense.
    const SENSE: ObjectiveSense;

    /// Strictly-better comparison for objective values.
    fn is_better(candidate: f64, incumbent: f64) -> bool;

    /// The objective value no solution can be worse than.
    fn worst() -> f64;

    /// Sort order for reduced costs: the preferred entries come first.
    fn compare<F: SolverFloat>(a: F, b: F) -> Ordering;

    /// Early-stop test of the inequality scan: true when the reduced cost's
    /// sign says no further entry should be set. Exact zeros are resolved
    /// by a coin flip so tie cycles cannot lock the walk.
    fn stop_iterating<F: SolverFloat, R: Rng>(value: F, rng: &mut R) -> bool;

    /// Which bound an inequality row is driven toward.
    fn init_bound(min: i32, max: i32) -> i32;

    /// Initial bit for a variable under the greedy cost-sign policy.
    fn bastert_bit<F: SolverFloat>(cost: F) -> bool;
}

/// Minimization tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Minimize;

/// Maximization tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Maximize;

impl Mode for Minimize {
    const SENSE: ObjectiveSense = ObjectiveSense::Minimize;

    #[inline]
    fn is_better(candidate: f64, incumbent: f64) -> bool {
        candidate < incumbent
    }

    #[inline]
    fn worst() -> f64 {
        f64::INFINITY
    }

    #[inline]
    fn compare<F: SolverFloat>(a: F, b: F) -> Ordering {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }

    #[inline]
    fn stop_iterating<F: SolverFloat, R: Rng>(value: F, rng: &mut R) -> bool {
        if value == F::zero() {
            return rng.gen_bool(0.5);
        }
        value > F::zero()
    }

    #[inline]
    fn init_bound(min: i32, _max: i32) -> i32 {
        min
    }

    #[inline]
    fn bastert_bit<F: SolverFloat>(cost: F) -> bool {
        cost < F::zero()
    }
}

impl Mode for Maximize {
    const SENSE: ObjectiveSense = ObjectiveSense::Maximize;

    #[inline]
    fn is_better(candidate: f64, incumbent: f64) -> bool {
        candidate > incumbent
    }

    #[inline]
    fn worst() -> f64 {
        f64::NEG_INFINITY
    }

    #[inline]
    fn compare<F: SolverFloat>(a: F, b: F) -> Ordering {
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    }

    #[inline]
    fn stop_iterating<F: SolverFloat, R: Rng>(value: F, rng: &mut R) -> bool {
        if value == F::zero() {
            return rng.gen_bool(0.5);
        }
        value < F::zero()
    }

    #[inline]
    fn init_bound(_min: i32, max: i32) -> i32 {
        max
    }

    #[inline]
    fn bastert_bit<F: SolverFloat>(cost: F) -> bool {
        cost > F::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn minimize_prefers_small_values() {
        assert!(Minimize::is_better(1.0, 2.0));
        assert!(!Minimize::is_better(2.0, 1.0));
        assert_eq!(Minimize::compare(1.0f64, 2.0), Ordering::Less);
        assert_eq!(Minimize::init_bound(1, 3), 1);
    }

    #[test]
    fn maximize_prefers_large_values() {
        assert!(Maximize::is_better(2.0, 1.0));
        assert_eq!(Maximize::compare(1.0f64, 2.0), Ordering::Greater);
        assert_eq!(Maximize::init_bound(1, 3), 3);
    }

    #[test]
    fn stop_iterating_follows_the_sign() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(Minimize::stop_iterating(1.0f64, &mut rng));
        assert!(!Minimize::stop_iterating(-1.0f64, &mut rng));
        assert!(Maximize::stop_iterating(-1.0f64, &mut rng));
        assert!(!Maximize::stop_iterating(1.0f64, &mut rng));
    }
}
