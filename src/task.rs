/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core task data structures for the hierarchical scheduling analyzer.
//!
//! A [`Task`] is the unit of demand in both halves of the pipeline:
//!
//! ```text
//! ingestion ──► Task ──┬──► analysis (DBF, interface synthesis)
//!                      └──► simulation (job arrivals, deadlines)
//! ```
//!
//! # Ownership model
//! Tasks are **owned** by the component that schedules them; a task belongs
//! to exactly one component for its whole lifetime.  Analysis and simulation
//! both borrow the model — neither ever clones the task set.
//!
//! # Arrival shapes
//! Periodic and sporadic tasks differ only in how successive arrivals are
//! spaced.  Instead of dispatching on a type field, the variant is a tagged
//! enum and every piece of variant-specific math lives in
//! [`ArrivalKind::period_or_mit`] and [`Task::next_arrival`].  Analysis
//! treats a sporadic task as periodic with T = MIT (the worst case); the
//! simulator releases sporadic jobs exactly MIT apart, which keeps runs
//! deterministic.

// ── Arrival model ─────────────────────────────────────────────────────────────

/// How successive jobs of a task are released.
///
/// Carrying the typed enum through the whole pipeline (instead of a raw
/// `"periodic"` / `"sporadic"` string plus two nullable number fields) makes
/// it impossible to build a periodic task without a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrivalKind {
    /// Job k arrives at exactly `k * period`.
    Periodic { period: f64 },

    /// Successive arrivals are separated by at least `min_inter_arrival`.
    ///
    /// For analysis this is the worst case (densest legal arrival pattern);
    /// the simulator realizes exactly that pattern.
    Sporadic { min_inter_arrival: f64 },
}

impl ArrivalKind {
    /// The period (periodic) or minimum inter-arrival time (sporadic).
    ///
    /// Every demand-bound computation uses this single accessor, so the
    /// periodic-as-worst-case treatment of sporadic tasks lives in one place.
    pub fn period_or_mit(&self) -> f64 {
        match self {
            ArrivalKind::Periodic { period } => *period,
            ArrivalKind::Sporadic { min_inter_arrival } => *min_inter_arrival,
        }
    }

    /// Returns `true` for the sporadic variant.
    pub fn is_sporadic(&self) -> bool {
        matches!(self, ArrivalKind::Sporadic { .. })
    }
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// A periodic or sporadic real-time task.
///
/// All times share one unit (the model's time unit); the worst-case execution
/// time is a *reference* value measured on a core with performance factor 1.
/// The actual wall-clock demand on a core with factor `p` is `wcet / p` — see
/// [`Task::scaled_wcet`], the only place performance scaling enters analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Stable identifier, unique among all tasks in the model.
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Best-case execution time.  Optional; carried for reporting only, the
    /// analysis is driven entirely by the worst case.
    pub bcet: Option<f64>,

    /// Worst-case execution time on the reference core (must be > 0).
    pub wcet: f64,

    /// Relative deadline (must be > 0).  A job arriving at `a` is due at
    /// `a + deadline`.
    pub deadline: f64,

    /// Fixed priority — lower number means higher priority.  Only consulted
    /// by FPS components; `None` sorts after every explicit priority.
    pub priority: Option<i32>,

    /// Release pattern of successive jobs.
    pub arrival: ArrivalKind,
}

impl Task {
    /// The period (periodic) or minimum inter-arrival time (sporadic).
    pub fn period_or_mit(&self) -> f64 {
        self.arrival.period_or_mit()
    }

    /// Arrival time of the job following one released at `t`.
    pub fn next_arrival(&self, t: f64) -> f64 {
        t + self.arrival.period_or_mit()
    }

    /// CPU utilization fraction `wcet / period`.
    ///
    /// Returns `0.0` when the period is zero to avoid division by zero (a
    /// zero period is rejected by model validation, but the accessor stays
    /// total).
    pub fn utilization(&self) -> f64 {
        let t = self.period_or_mit();
        if t <= 0.0 {
            0.0
        } else {
            self.wcet / t
        }
    }

    /// Wall-clock execution time on a core with the given performance factor.
    pub fn scaled_wcet(&self, performance_factor: f64) -> f64 {
        self.wcet / performance_factor
    }

    /// Priority used for FPS ordering: explicit value, or `i32::MAX` for
    /// tasks without one (they sort after every prioritized task).
    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(i32::MAX)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
