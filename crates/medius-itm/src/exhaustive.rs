//! Exhaustive subset search for narrow integer-coefficient rows
//!
//! Rows of at most 32 elements are solved exactly by a depth-first
//! enumeration over the subset lattice, pruned by precomputed suffix weight
//! sums (the reachable subset-sum envelope). A node budget guards against
//! adversarial rows; when it runs out the row falls back to the knapsack
//! DP, which is polynomial.

use crate::float::SolverFloat;
use crate::knapsack::{knapsack_dp_select, partition_chosen};
use crate::mode::Mode;
use crate::solver::RcData;

/// Widest row handled by the exhaustive search.
pub(crate) const EXHAUSTIVE_MAX: usize = 32;

const NODE_BUDGET: usize = 1 << 20;

struct Search<'a, F> {
    r: &'a [RcData<F>],
    suffix: Vec<i64>,
    bmin: i64,
    bmax: i64,
    nodes: usize,
    best: Option<(F, u64)>,
}

impl<F: SolverFloat> Search<'_, F> {
    fn weight(&self, i: usize) -> i64 {
        i64::from(self.r[i].factor.unsigned_abs())
    }

    fn dfs<M: Mode>(&mut self, i: usize, sum: i64, value: F, mask: u64) -> bool {
        if self.nodes == 0 {
            return false;
        }
        self.nodes -= 1;

        if sum > self.bmax || sum + self.suffix[i] < self.bmin {
            return true;
        }

        if i == self.r.len() {
            if sum >= self.bmin {
                let replace = match self.best {
                    None => true,
                    Some((incumbent, _)) => {
                        M::compare(value, incumbent) == std::cmp::Ordering::Less
                    }
                };
                if replace {
                    self.best = Some((value, mask));
                }
            }
            return true;
        }

        self.dfs::<M>(i + 1, sum + self.weight(i), value + self.r[i].value, mask | (1 << i))
            && self.dfs::<M>(i + 1, sum, value, mask)
    }
}

/// Select a subset of `r` whose weights sum into `[bmin, bmax]`, optimizing
/// the total reduced cost in the mode's direction by exhaustive search.
/// The chosen entries are moved to the front of `r` (stable) and the
/// selection boundary is returned; `-1` selects nothing.
pub(crate) fn exhaustive_select<F: SolverFloat, M: Mode>(
    r: &mut [RcData<F>],
    bmin: i32,
    bmax: i32,
) -> isize {
    debug_assert!(r.len() <= EXHAUSTIVE_MAX);
    debug_assert!(0 <= bmin && bmin <= bmax);

    let mut suffix = vec![0i64; r.len() + 1];
    for i in (0..r.len()).rev() {
        suffix[i] = suffix[i + 1] + i64::from(r[i].factor.unsigned_abs());
    }

    let mut search = Search {
        r,
        suffix,
        bmin: i64::from(bmin),
        bmax: i64::from(bmax),
        nodes: NODE_BUDGET,
        best: None,
    };

    if !search.dfs::<M>(0, 0, F::zero(), 0) {
        return knapsack_dp_select::<F, M>(r, bmin, bmax);
    }

    let Some((_, mask)) = search.best else {
        return -1;
    };

    let chosen: Vec<bool> = (0..r.len()).map(|i| mask >> i & 1 == 1).collect();
    partition_chosen(r, &chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Maximize, Minimize};

    fn rc(value: f64, id: u32, factor: i32) -> RcData<f64> {
        RcData { value, id, factor }
    }

    #[test]
    fn finds_the_unique_exact_subset() {
        let mut r = vec![rc(0.3, 0, 2), rc(0.1, 1, 3), rc(0.2, 2, 4)];
        let selected = exhaustive_select::<f64, Minimize>(&mut r, 7, 7);
        assert_eq!(selected, 1);
        let mut ids: Vec<u32> = r[..2].iter().map(|x| x.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn prefers_the_mode_best_among_feasible_subsets() {
        // Subsets of weight 2: {0}, {1}.
        let mut r = vec![rc(0.9, 0, 2), rc(-0.4, 1, 2)];
        assert_eq!(exhaustive_select::<f64, Minimize>(&mut r, 2, 2), 0);
        assert_eq!(r[0].id, 1);

        let mut r = vec![rc(0.9, 0, 2), rc(-0.4, 1, 2)];
        assert_eq!(exhaustive_select::<f64, Maximize>(&mut r, 2, 2), 0);
        assert_eq!(r[0].id, 0);
    }

    #[test]
    fn empty_row_window_selects_nothing() {
        let mut r = vec![rc(0.5, 0, 3)];
        assert_eq!(exhaustive_select::<f64, Minimize>(&mut r, 1, 2), -1);
    }

    #[test]
    fn negative_values_are_worth_selecting_under_minimize() {
        let mut r = vec![rc(-0.5, 0, 2), rc(-0.1, 1, 3), rc(0.4, 2, 5)];
        // Window [0, 5]: best minimize subset is {0, 1} with value -0.6.
        let selected = exhaustive_select::<f64, Minimize>(&mut r, 0, 5);
        assert_eq!(selected, 1);
        let mut ids: Vec<u32> = r[..2].iter().map(|x| x.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
    }
}
