//! DBF ≤ SBF feasibility testing for a single component.
//!
//! The test asks: can the component's task set — WCETs scaled onto the
//! bound core, child supply servers included — always meet its deadlines on
//! the supply guaranteed by a BDR interface (α, Δ)?
//!
//! # Verdicts
//! Schedulability under a finite horizon is a three-way answer, not a bool:
//!
//! * [`Verdict::Schedulable`] — demand ≤ supply at every critical instant
//!   up to the exact test horizon.
//! * [`Verdict::Unschedulable`] — a concrete violation was found (or the
//!   utilization necessary condition Σu > α already fails).
//! * [`Verdict::Inconclusive`] — the exact horizon (hyperperiod or safety
//!   bound) exceeds [`HORIZON_CAP`]; no violation was found up to the cap,
//!   but the tail was not examined.  Callers surface this once per
//!   component and otherwise treat it as a pass.
//!
//! # Horizons
//! * EDF: the smaller of the task-set hyperperiod and the safety bound
//!   `10 · max_deadline · (1 + max_period)`, capped at [`HORIZON_CAP`].
//!   Check points are the absolute deadlines within (0, L].
//! * FPS: per-task time-demand analysis — task i passes iff its level-i
//!   workload fits the supply at *some* point in
//!   `{k·Tⱼ | j ≤ i, 0 < k·Tⱼ ≤ Dᵢ} ∪ {Dᵢ}`.
//!
//! Demand is evaluated right-continuously (immediately after the deadline
//! epoch) and infeasibility decisions use strict `>`, so borderline-feasible
//! systems are not rejected by floating-point noise.

use tracing::debug;

use crate::hyperperiod::hyperperiod;
use crate::model::{Component, Discipline};

use super::kernel::{dbf_edf, dbf_fps, sbf_bdr, AnalysisTask, EPS};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Upper bound on any feasibility-test horizon, in model time units.
///
/// A test that would need to look further runs to the cap and reports
/// [`Verdict::Inconclusive`] instead of running unbounded.
pub const HORIZON_CAP: f64 = 1e5;

// ── Verdict ───────────────────────────────────────────────────────────────────

/// Outcome of a feasibility test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Demand never exceeds supply within the exact horizon.
    Schedulable,
    /// Demand exceeds supply at some check point (or Σu > α).
    Unschedulable,
    /// No violation up to the cap, but the exact horizon lies beyond it.
    Inconclusive { cap: f64 },
}

impl Verdict {
    /// `true` unless a concrete violation was found.  An inconclusive
    /// verdict passes — the caller decides how loudly to report it.
    pub fn passed(&self) -> bool {
        !matches!(self, Verdict::Unschedulable)
    }

    /// `true` for [`Verdict::Inconclusive`].
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Verdict::Inconclusive { .. })
    }
}

// ── Public entry points ───────────────────────────────────────────────────────

/// Test whether `component` is schedulable under interface (α, Δ) on a core
/// with the given performance factor.
///
/// Own-task WCETs are scaled by 1/p here — the only place performance
/// enters analysis.  `child_supply` carries the periodic supply servers of
/// already-synthesized children, which are wall-clock values and enter
/// unscaled.
pub fn is_schedulable(
    component: &Component,
    child_supply: &[AnalysisTask],
    alpha: f64,
    delta: f64,
    performance_factor: f64,
) -> Verdict {
    let mut tasks: Vec<AnalysisTask> = component
        .tasks
        .iter()
        .map(|t| AnalysisTask::from_task(t, performance_factor))
        .collect();
    tasks.extend_from_slice(child_supply);
    check_demand(component.discipline, &tasks, alpha, delta)
}

/// Core of the feasibility test over an already-assembled demand set.
pub fn check_demand(
    discipline: Discipline,
    tasks: &[AnalysisTask],
    alpha: f64,
    delta: f64,
) -> Verdict {
    if tasks.is_empty() {
        return Verdict::Schedulable;
    }

    // Necessary condition: total utilization cannot exceed the availability
    // factor, whatever the delay bound.
    let total_u: f64 = tasks.iter().map(AnalysisTask::utilization).sum();
    if total_u > alpha + EPS {
        debug!(total_u, alpha, "utilization exceeds availability factor");
        return Verdict::Unschedulable;
    }

    match discipline {
        Discipline::Edf => check_edf(tasks, alpha, delta),
        Discipline::Fps => check_fps(tasks, alpha, delta),
    }
}

// ── EDF ───────────────────────────────────────────────────────────────────────

fn check_edf(tasks: &[AnalysisTask], alpha: f64, delta: f64) -> Verdict {
    let max_deadline = fold_max(tasks.iter().map(|t| t.deadline));
    let max_period = fold_max(tasks.iter().map(|t| t.period));
    let safety = 10.0 * max_deadline * (1.0 + max_period);

    let periods: Vec<f64> = tasks.iter().map(|t| t.period).collect();
    // Non-integral or overflowing periods have no usable hyperperiod; the
    // safety bound takes over.
    let required = match hyperperiod(&periods) {
        Ok(h) => h.min(safety),
        Err(_) => safety,
    };

    let capped = required > HORIZON_CAP;
    let horizon = if capped { HORIZON_CAP } else { required };

    for t in edf_check_points(tasks, horizon) {
        let demand = dbf_edf(tasks, t);
        let supply = sbf_bdr(alpha, delta, t);
        if demand > supply + EPS {
            debug!(t, demand, supply, "EDF demand exceeds supply");
            return Verdict::Unschedulable;
        }
    }

    if capped {
        Verdict::Inconclusive { cap: HORIZON_CAP }
    } else {
        Verdict::Schedulable
    }
}

/// Absolute deadlines within (0, horizon], ascending and deduplicated —
/// the critical instants of the EDF demand curve.
fn edf_check_points(tasks: &[AnalysisTask], horizon: f64) -> Vec<f64> {
    let mut points = Vec::new();
    for task in tasks {
        let mut t = task.deadline;
        while t <= horizon + EPS {
            points.push(t);
            t += task.period;
        }
    }
    points.sort_by(|a, b| a.total_cmp(b));
    points.dedup_by(|a, b| (*a - *b).abs() < EPS);
    points
}

// ── FPS ───────────────────────────────────────────────────────────────────────

fn check_fps(tasks: &[AnalysisTask], alpha: f64, delta: f64) -> Verdict {
    // Decreasing priority, deterministic id tiebreak.
    let mut sorted: Vec<&AnalysisTask> = tasks.iter().collect();
    sorted.sort_by(|a, b| (a.priority, &a.id).cmp(&(b.priority, &b.id)));
    let sorted: Vec<AnalysisTask> = sorted.into_iter().cloned().collect();

    let mut any_capped = false;
    for i in 0..sorted.len() {
        let deadline = sorted[i].deadline;
        let capped = deadline > HORIZON_CAP;
        let bound = if capped { HORIZON_CAP } else { deadline };

        let points = fps_check_points(&sorted[..=i], bound);
        let fits = points.iter().any(|&t| {
            dbf_fps(&sorted, t, i) <= sbf_bdr(alpha, delta, t) + EPS
        });

        if !fits {
            if capped {
                // The workload might still fit between the cap and the
                // deadline — unverifiable at this horizon.
                any_capped = true;
            } else {
                debug!(task = %sorted[i].id, deadline, "no idle point before the deadline");
                return Verdict::Unschedulable;
            }
        }
    }

    if any_capped {
        Verdict::Inconclusive { cap: HORIZON_CAP }
    } else {
        Verdict::Schedulable
    }
}

/// Time-demand analysis points for a level-i busy period: every release of
/// a task at priority ≥ the level, plus the level's own deadline.
fn fps_check_points(level: &[AnalysisTask], bound: f64) -> Vec<f64> {
    let mut points = Vec::new();
    for task in level {
        let mut t = task.period;
        while t <= bound + EPS {
            points.push(t);
            t += task.period;
        }
    }
    points.push(bound);
    points.sort_by(|a, b| a.total_cmp(b));
    points.dedup_by(|a, b| (*a - *b).abs() < EPS);
    points
}

fn fold_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, f64::max)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
