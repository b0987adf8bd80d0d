//! Multi-start optimizer driver
//!
//! Spawns one OS thread per worker, each running complete solver rounds
//! with its own RNG seeded from the master seed. Workers only share the
//! read-only merged problem and cost model; the single global-best slot
//! sits behind a mutex and is written on strict improvement only. The
//! caller's progress callback runs on the driver thread, never on a
//! worker. Cancellation is cooperative through the wall-clock deadline.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use medius_core::{
    Error, MergedConstraint, ObjectiveFunction, ObserverKind, SolverParameters, Status,
};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::cost::CostModel;
use crate::float::SolverFloat;
use crate::mode::Mode;
use crate::run::{run_solver, RawBest, RunOutcome};
use crate::solver::check_index_limits;

/// One progress report handed to the caller's callback.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Violated constraints under the reported assignment.
    pub remaining: usize,
    /// Objective value, meaningful when `remaining` is zero.
    pub value: f64,
    /// Outer loop index of the report; negative indices are pushing
    /// passes.
    pub loop_index: i64,
    /// Seconds elapsed since the solve started.
    pub duration: f64,
}

/// Progress callback type.
pub type ProgressFn = dyn Fn(Progress) + Send + Sync;

/// Run `params.thread` independent solver workers and aggregate their best.
pub(crate) fn optimize_problem<F, M, C>(
    params: &SolverParameters,
    constraints: &[MergedConstraint],
    n: usize,
    objective: &ObjectiveFunction,
    original_costs: &C,
    master_seed: u64,
    progress: Option<&ProgressFn>,
) -> Result<RunOutcome, Error>
where
    F: SolverFloat,
    M: Mode,
    C: CostModel<F>,
{
    check_index_limits(constraints, n)?;

    let workers = if params.thread == 0 {
        thread::available_parallelism().map_or(1, |p| p.get())
    } else {
        params.thread
    };

    let start = Instant::now();
    let time_limit = params.effective_time_limit();

    info!(workers, seed = master_seed, "optimization starts");

    let shared: Mutex<Option<(RawBest, Status)>> = Mutex::new(None);
    let generation = AtomicU64::new(0);
    let done = AtomicUsize::new(0);

    thread::scope(|scope| {
        let shared = &shared;
        let generation = &generation;
        let done = &done;

        for w in 0..workers {
            let mut rng = ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(w as u64));

            scope.spawn(move || {
                loop {
                    let outcome = run_solver::<F, M, C, _>(
                        params,
                        constraints,
                        n,
                        objective,
                        original_costs,
                        ObserverKind::None,
                        &mut rng,
                        start,
                        None,
                    );

                    let Ok(outcome) = outcome else {
                        break;
                    };

                    let mut guard = shared.lock();
                    let better = match guard.as_ref() {
                        None => true,
                        Some((incumbent, _)) => improves::<M>(&outcome.best, incumbent),
                    };
                    if better {
                        debug!(
                            worker = w,
                            remaining = outcome.best.remaining,
                            value = outcome.best.value,
                            "global best updated"
                        );
                        *guard = Some((outcome.best, outcome.status));
                        generation.fetch_add(1, Ordering::Release);
                    }
                    drop(guard);

                    // Without a deadline a worker contributes exactly one
                    // round; with one it restarts until time runs out.
                    if !time_limit.is_finite()
                        || start.elapsed().as_secs_f64() > time_limit
                    {
                        break;
                    }
                }

                done.fetch_add(1, Ordering::Release);
            });
        }

        // Driver-side reporting: workers never call the user's callback.
        let report = |reported: &mut u64| {
            let current = generation.load(Ordering::Acquire);
            if current != *reported {
                *reported = current;
                if let Some(progress) = progress {
                    if let Some((best, _)) = shared.lock().as_ref() {
                        progress(Progress {
                            remaining: best.remaining,
                            value: best.value,
                            loop_index: best.loop_index,
                            duration: best.duration,
                        });
                    }
                }
            }
        };

        let mut reported = 0u64;
        while done.load(Ordering::Acquire) < workers {
            thread::sleep(Duration::from_millis(20));
            report(&mut reported);
        }
        report(&mut reported);
    });

    let (best, status) = shared.into_inner().unwrap_or_else(|| {
        (
            RawBest {
                x: crate::bit_array::BitArray::new(n),
                remaining: usize::MAX,
                value: M::worst(),
                loop_index: 0,
                duration: start.elapsed().as_secs_f64(),
            },
            Status::InternalError,
        )
    });

    info!(
        status = status.tag(),
        remaining = best.remaining,
        value = best.value,
        "optimization ends"
    );

    Ok(RunOutcome { best, status })
}

/// Strict improvement over the incumbent: fewer violated constraints, or a
/// strictly better objective once both are feasible.
fn improves<M: Mode>(candidate: &RawBest, incumbent: &RawBest) -> bool {
    if candidate.remaining != incumbent.remaining {
        return candidate.remaining < incumbent.remaining;
    }
    candidate.remaining == 0 && M::is_better(candidate.value, incumbent.value)
}
