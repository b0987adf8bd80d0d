//! Knapsack DP fallback for integer-coefficient rows
//!
//! When the greedy prefix scan cannot land the row sum inside its bounds,
//! an exact dynamic program over the integer bound axis decides which
//! entries to set. The value table is sized once per row to `bmax + 1`
//! cells; weights are the absolute row factors (the negation trick has
//! already made every effective factor positive).

use crate::float::SolverFloat;
use crate::mode::Mode;
use crate::solver::RcData;

/// Select a subset of `r` whose weights sum into `[bmin, bmax]`, optimizing
/// the total reduced cost in the mode's direction. The chosen entries are
/// moved to the front of `r` (stable) and the selection boundary is
/// returned; `-1` selects nothing, also when no subset fits the bounds.
pub(crate) fn knapsack_dp_select<F: SolverFloat, M: Mode>(
    r: &mut [RcData<F>],
    bmin: i32,
    bmax: i32,
) -> isize {
    debug_assert!(0 <= bmin && bmin <= bmax);

    let cap = bmax as usize;
    let r_size = r.len();

    // best[s] = best total reduced cost over subsets of weight exactly s.
    let mut best: Vec<Option<F>> = vec![None; cap + 1];
    best[0] = Some(F::zero());

    // take[i][s] records whether item i is part of the best subset of
    // weight s after processing items 0..=i.
    let mut take = vec![false; r_size * (cap + 1)];

    for (i, item) in r.iter().enumerate() {
        let w = item.factor.unsigned_abs() as usize;
        if w > cap {
            continue;
        }
        for s in (w..=cap).rev() {
            let Some(from) = best[s - w] else {
                continue;
            };
            let candidate = from + item.value;
            let improves = match best[s] {
                None => true,
                Some(current) => M::compare(candidate, current) == std::cmp::Ordering::Less,
            };
            if improves {
                best[s] = Some(candidate);
                take[i * (cap + 1) + s] = true;
            }
        }
    }

    // Pick the mode-best reachable sum inside the bounds.
    let mut target: Option<(usize, F)> = None;
    for s in (bmin as usize)..=cap {
        if let Some(value) = best[s] {
            let replace = match target {
                None => true,
                Some((_, incumbent)) => M::compare(value, incumbent) == std::cmp::Ordering::Less,
            };
            if replace {
                target = Some((s, value));
            }
        }
    }

    let Some((mut s, _)) = target else {
        return -1;
    };

    // Walk the take table backwards to recover the subset.
    let mut chosen = vec![false; r_size];
    for i in (0..r_size).rev() {
        if s == 0 {
            break;
        }
        if take[i * (cap + 1) + s] {
            chosen[i] = true;
            s -= r[i].factor.unsigned_abs() as usize;
        }
    }
    debug_assert_eq!(s, 0);

    partition_chosen(r, &chosen)
}

/// Stable-partition `r` so chosen entries form a prefix; returns
/// `count - 1`.
pub(crate) fn partition_chosen<F: SolverFloat>(r: &mut [RcData<F>], chosen: &[bool]) -> isize {
    let mut ordered: Vec<RcData<F>> = Vec::with_capacity(r.len());
    let mut count = 0usize;
    for (i, item) in r.iter().enumerate() {
        if chosen[i] {
            ordered.push(*item);
            count += 1;
        }
    }
    for (i, item) in r.iter().enumerate() {
        if !chosen[i] {
            ordered.push(*item);
        }
    }
    r.copy_from_slice(&ordered);

    count as isize - 1
}
