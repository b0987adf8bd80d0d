//! Constraint visit order strategies
//!
//! Each pass visits every constraint once; the strategy decides in which
//! sequence. Strategies keep at most one pass of history: the previous
//! pass's violation magnitudes, duals, or pi sign-change flags.

use medius_core::ConstraintOrder;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;

use crate::bit_array::BitArray;
use crate::cost::CostModel;
use crate::float::SolverFloat;
use crate::mode::Mode;
use crate::solver::ItmSolver;

/// Produces the constraint visit sequence and drives one full pass.
#[derive(Debug, Clone)]
pub struct ComputeOrder {
    kind: ConstraintOrder,
    order: Vec<u32>,
    violations: Vec<i64>,
    sign_changed: Vec<bool>,
}

impl ComputeOrder {
    /// Strategy for `m` constraints.
    pub fn new(kind: ConstraintOrder, m: usize) -> Self {
        ComputeOrder {
            kind,
            order: (0..m as u32).collect(),
            violations: Vec::new(),
            sign_changed: vec![false; m],
        }
    }

    /// Reset the history kept between passes.
    pub fn init(&mut self) {
        let m = self.sign_changed.len();
        self.order.clear();
        self.order.extend(0..m as u32);
        self.violations.clear();
        self.sign_changed.fill(false);
    }

    /// Run one plain pass; returns the number of violated constraints.
    pub fn run<F: SolverFloat, M: Mode, C: CostModel<F>, R: Rng>(
        &mut self,
        solver: &mut ItmSolver<F, M, C>,
        x: &mut BitArray,
        rng: &mut R,
        kappa: F,
        delta: F,
        theta: F,
    ) -> usize {
        self.run_pass(solver, x, rng, kappa, delta, theta, F::zero())
    }

    /// Run one objective-amplified pass; returns the number of violated
    /// constraints.
    #[allow(clippy::too_many_arguments)]
    pub fn push_and_run<F: SolverFloat, M: Mode, C: CostModel<F>, R: Rng>(
        &mut self,
        solver: &mut ItmSolver<F, M, C>,
        x: &mut BitArray,
        rng: &mut R,
        kappa: F,
        delta: F,
        theta: F,
        objective_amplifier: F,
    ) -> usize {
        self.run_pass(solver, x, rng, kappa, delta, theta, objective_amplifier)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_pass<F: SolverFloat, M: Mode, C: CostModel<F>, R: Rng>(
        &mut self,
        solver: &mut ItmSolver<F, M, C>,
        x: &mut BitArray,
        rng: &mut R,
        kappa: F,
        delta: F,
        theta: F,
        objective_amplifier: F,
    ) -> usize {
        self.prepare(&solver.pi, rng);

        for idx in 0..self.order.len() {
            let k = self.order[idx] as usize;
            let changed = solver.update_row(k, x, kappa, delta, theta, objective_amplifier, rng);
            self.sign_changed[k] = changed;
        }

        solver.compute_violations(x, &mut self.violations)
    }

    /// Reorder the visit sequence from the previous pass's history.
    fn prepare<F: SolverFloat, R: Rng>(&mut self, pi: &[F], rng: &mut R) {
        match self.kind {
            ConstraintOrder::None => {}
            ConstraintOrder::Reversing => self.order.reverse(),
            ConstraintOrder::RandomSorting => self.order.shuffle(rng),
            ConstraintOrder::InfeasibilityDecr => {
                if !self.violations.is_empty() {
                    let violations = &self.violations;
                    self.order
                        .sort_by_key(|&k| std::cmp::Reverse(violations[k as usize]));
                }
            }
            ConstraintOrder::InfeasibilityIncr => {
                if !self.violations.is_empty() {
                    let violations = &self.violations;
                    self.order.sort_by_key(|&k| violations[k as usize]);
                }
            }
            ConstraintOrder::LagrangianDecr => {
                self.order.sort_by(|&a, &b| {
                    pi[b as usize]
                        .abs()
                        .partial_cmp(&pi[a as usize].abs())
                        .unwrap_or(Ordering::Equal)
                });
            }
            ConstraintOrder::LagrangianIncr => {
                self.order.sort_by(|&a, &b| {
                    pi[a as usize]
                        .abs()
                        .partial_cmp(&pi[b as usize].abs())
                        .unwrap_or(Ordering::Equal)
                });
            }
            ConstraintOrder::PiSignChange => {
                let sign_changed = &self.sign_changed;
                self.order.sort_by_key(|&k| !sign_changed[k as usize]);
            }
        }
    }

    /// The visit sequence the next pass would use, for inspection.
    #[cfg(test)]
    fn sequence(&self) -> &[u32] {
        &self.order
    }
}
