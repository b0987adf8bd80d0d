//! Outer solver loop
//!
//! One full solve: seed the assignment, sweep constraints pass after pass
//! with the adaptive kappa schedule, and once feasible switch to the
//! pushing phase, which alternates objective-amplified passes with plain
//! passes to improve the objective while staying feasible. The best record
//! only ever improves: strictly fewer violated constraints, or, once
//! feasible, a strictly better objective in the mode's direction.

use std::time::Instant;

use medius_core::{
    Error, MergedConstraint, ObjectiveFunction, ObserverKind, SolverParameters, Status,
};
use rand::Rng;
use tracing::{debug, info};

use crate::bit_array::BitArray;
use crate::cost::{compute_delta, objective_value, CostModel};
use crate::float::SolverFloat;
use crate::init::init_assignment;
use crate::mode::Mode;
use crate::observer::Observer;
use crate::optimize::{Progress, ProgressFn};
use crate::order::ComputeOrder;
use crate::solver::ItmSolver;

/// Best assignment seen by one solver run.
#[derive(Debug, Clone)]
pub(crate) struct RawBest {
    pub x: BitArray,
    pub remaining: usize,
    pub value: f64,
    pub loop_index: i64,
    pub duration: f64,
}

/// Outcome of one solver run.
#[derive(Debug, Clone)]
pub(crate) struct RunOutcome {
    pub best: RawBest,
    pub status: Status,
}

/// Run the full outer loop once with the given RNG.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_solver<F, M, C, R>(
    params: &SolverParameters,
    constraints: &[MergedConstraint],
    n: usize,
    objective: &ObjectiveFunction,
    original_costs: &C,
    observer_kind: ObserverKind,
    rng: &mut R,
    start: Instant,
    progress: Option<&ProgressFn>,
) -> Result<RunOutcome, Error>
where
    F: SolverFloat,
    M: Mode,
    C: CostModel<F>,
    R: Rng,
{
    let norm_costs = original_costs.normalized(rng);
    let mut solver = ItmSolver::<F, M, C>::new(constraints, n, &norm_costs)?;
    let m = solver.m;

    let theta = F::from_f64(params.theta);
    let delta = if params.delta < 0.0 {
        compute_delta(norm_costs.min_nonzero(), theta)
    } else {
        F::from_f64(params.delta)
    };
    let kappa_step = F::from_f64(params.kappa_step);
    let kappa_max = F::from_f64(params.kappa_max);
    let alpha = F::from_f64(params.alpha);
    let pushing_k_factor = F::from_f64(params.pushing_k_factor);
    let objective_amplifier = F::from_f64(params.pushing_objective_amplifier);

    // A negative limit means unlimited; an explicit zero asks for the
    // initial assignment back, untouched.
    let limit = params.effective_limit();
    let time_limit = params.effective_time_limit();
    let pushes_limit = params.effective_pushes_limit();

    debug!(m, n, %delta, %theta, "solver run starts");

    let mut x = BitArray::new(n);
    init_assignment::<F, M, C, R>(
        &mut x,
        constraints,
        original_costs,
        params.init_policy,
        params.init_random,
        rng,
    );

    let mut order = ComputeOrder::new(params.order, m);
    order.init();

    let observer_frames = usize::try_from(limit).unwrap_or(usize::MAX).min(1 << 20);
    let mut observer = Observer::new(observer_kind, "img", m, n, observer_frames);

    let mut best = RawBest {
        x: x.clone(),
        remaining: usize::MAX,
        value: M::worst(),
        loop_index: 0,
        duration: 0.0,
    };
    let mut kappa = F::from_f64(params.kappa_min);
    let mut status = Status::LimitReached;

    // Seed the record with the initial assignment so a zero limit hands it
    // back verbatim together with its violation count.
    let mut scratch = Vec::new();
    let init_remaining = solver.compute_violations(&x, &mut scratch);
    store_remaining(&mut best, &x, init_remaining, 0, start, progress);
    let mut start_push = init_remaining == 0;
    if start_push {
        store_value::<M>(&mut best, &x, objective_value(objective, &x), 0, start, progress);
    }

    if !start_push {
        let mut i: i64 = 0;
        while i != limit {
            let remaining = order.run(&mut solver, &mut x, rng, kappa, delta, theta);
            observer.make_observation(&solver.ap, &solver.p, &solver.pi);

            if remaining == 0 {
                store_value::<M>(
                    &mut best,
                    &x,
                    objective_value(objective, &x),
                    i,
                    start,
                    progress,
                );
                start_push = true;
                break;
            }

            if remaining < best.remaining {
                store_remaining(&mut best, &x, remaining, i, start, progress);
            }

            if i > params.w {
                let ratio = F::from_f64(remaining as f64 / m as f64);
                kappa += kappa_step * ratio.powf(alpha);
            }

            if kappa > kappa_max {
                status = Status::KappaMaxReached;
                break;
            }

            if start.elapsed().as_secs_f64() > time_limit {
                status = Status::TimeLimitReached;
                break;
            }

            i += 1;
        }
    }

    if start_push {
        info!(loops = best.loop_index, value = best.value, "feasible, pushing");

        'pushes: for push in 0..pushes_limit {
            let remaining = order.push_and_run(
                &mut solver,
                &mut x,
                rng,
                pushing_k_factor * kappa,
                delta,
                theta,
                objective_amplifier,
            );

            if remaining == 0 {
                store_value::<M>(
                    &mut best,
                    &x,
                    objective_value(objective, &x),
                    -push * params.pushing_iteration_limit - 1,
                    start,
                    progress,
                );
            }

            if start.elapsed().as_secs_f64() > time_limit {
                break;
            }

            for iter in 0..params.pushing_iteration_limit {
                let remaining = order.run(&mut solver, &mut x, rng, kappa, delta, theta);

                if remaining == 0 {
                    store_value::<M>(
                        &mut best,
                        &x,
                        objective_value(objective, &x),
                        -push * params.pushing_iteration_limit - iter - 1,
                        start,
                        progress,
                    );
                    break;
                }

                if iter > params.w {
                    let ratio = F::from_f64(remaining as f64 / m as f64);
                    kappa += kappa_step * ratio.powf(alpha);
                }

                if kappa > kappa_max {
                    break 'pushes;
                }

                if start.elapsed().as_secs_f64() > time_limit {
                    break 'pushes;
                }
            }
        }
    }

    if best.remaining == 0 {
        status = Status::Success;
    }

    debug!(
        status = status.tag(),
        remaining = best.remaining,
        value = best.value,
        "solver run ends"
    );

    Ok(RunOutcome { best, status })
}

fn store_remaining(
    best: &mut RawBest,
    x: &BitArray,
    remaining: usize,
    loop_index: i64,
    start: Instant,
    progress: Option<&ProgressFn>,
) {
    if remaining < best.remaining {
        best.x = x.clone();
        best.remaining = remaining;
        best.loop_index = loop_index;
        best.duration = start.elapsed().as_secs_f64();

        if let Some(progress) = progress {
            progress(Progress {
                remaining,
                value: 0.0,
                loop_index,
                duration: best.duration,
            });
        }
    }
}

fn store_value<M: Mode>(
    best: &mut RawBest,
    x: &BitArray,
    value: f64,
    loop_index: i64,
    start: Instant,
    progress: Option<&ProgressFn>,
) {
    if best.remaining != 0 || M::is_better(value, best.value) {
        best.x = x.clone();
        best.remaining = 0;
        best.value = value;
        best.loop_index = loop_index;
        best.duration = start.elapsed().as_secs_f64();

        if let Some(progress) = progress {
            progress(Progress {
                remaining: 0,
                value,
                loop_index,
                duration: best.duration,
            });
        }
    }
}
