/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Demand and supply bound functions for compositional schedulability.
//!
//! # Theory
//! A component receives CPU time through a **Bounded-Delay Resource** (BDR)
//! interface (α, Δ): in any interval of length t it is guaranteed at least
//!
//! `sbf(t) = α · (t − Δ)` for `t > Δ`, and `0` otherwise.
//!
//! Its workload generates demand bounded by a **Demand Bound Function**:
//! under EDF (Baruah) the demand of task i with WCET Cᵢ, deadline Dᵢ and
//! period Tᵢ within `[0, t]` is
//!
//! `dbf_i(t) = max(0, ⌊(t − Dᵢ)/Tᵢ⌋ + 1) · Cᵢ`
//!
//! and under fixed priorities the level-i workload at t is
//!
//! `w_i(t) = Cᵢ + Σ_{j<i} ⌈t/Tⱼ⌉ · Cⱼ`.
//!
//! The component is schedulable when demand never exceeds supply (see
//! [`super::feasibility`]).  The **Half-Half** transformation (Shin & Lee)
//! realizes a BDR interface as a periodic server: `P = 2Δ`, `Q = α·P` —
//! half the period of budget, which bounds the longest starvation gap by Δ.
//!
//! # Numerical discipline
//! All functions operate on `f64` with absolute tolerance [`EPS`].  The DBF
//! is right-continuous: at an exact deadline epoch the arriving job's demand
//! is already counted.  Feasibility decisions use strict `>` so borderline
//! systems are not rejected by floating-point noise.

// ── Constants ─────────────────────────────────────────────────────────────────

/// Absolute tolerance for floating-point comparisons in the kernel.
pub const EPS: f64 = 1e-9;

/// Server period used when Half-Half degenerates (Δ = 0 with α < 1).
///
/// A zero-latency throttled interface has no finite Shin & Lee period; a
/// unit-period server with budget α·P preserves the availability factor.
pub const UNIT_SERVER_PERIOD: f64 = 1.0;

// ── AnalysisTask ──────────────────────────────────────────────────────────────

/// A task as the schedulability kernel sees it: WCET already scaled to
/// wall-clock time, sporadic tasks already folded to periodic (T = MIT),
/// priority already made total.
///
/// Built from model tasks via [`AnalysisTask::from_task`] and from child
/// supply tasks via [`AnalysisTask::supply`] — the two demand sources a
/// parent component aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTask {
    pub id: String,
    /// Wall-clock worst-case execution time (reference WCET / p).
    pub wcet: f64,
    /// Period, or minimum inter-arrival time for sporadic tasks.
    pub period: f64,
    /// Relative deadline.
    pub deadline: f64,
    /// Total priority order (lower = higher; `i32::MAX` when unspecified).
    pub priority: i32,
}

impl AnalysisTask {
    /// Scale a model task onto a core with the given performance factor.
    ///
    /// This is the only place performance enters analysis.
    pub fn from_task(task: &crate::task::Task, performance_factor: f64) -> Self {
        Self {
            id: task.id.clone(),
            wcet: task.scaled_wcet(performance_factor),
            period: task.period_or_mit(),
            deadline: task.deadline,
            priority: task.effective_priority(),
        }
    }

    /// Demand a child component's periodic supply server places on its
    /// parent: budget Q every P, due by the end of each period.
    ///
    /// Supply servers run at the highest priority so an FPS parent serves
    /// child supply promptly.
    pub fn supply(component_id: &str, budget: f64, period: f64) -> Self {
        Self {
            id: format!("{component_id}.supply"),
            wcet: budget,
            period,
            deadline: period,
            priority: i32::MIN,
        }
    }

    /// Utilization fraction `wcet / period` (0 for a degenerate period).
    pub fn utilization(&self) -> f64 {
        if self.period <= 0.0 {
            0.0
        } else {
            self.wcet / self.period
        }
    }
}

// ── Supply bound ──────────────────────────────────────────────────────────────

/// Bounded-Delay Resource supply bound: least supply guaranteed in any
/// interval of length `t` under interface (α, Δ).
pub fn sbf_bdr(alpha: f64, delta: f64, t: f64) -> f64 {
    if t <= delta {
        0.0
    } else {
        alpha * (t - delta)
    }
}

// ── Demand bounds ─────────────────────────────────────────────────────────────

/// Aggregate EDF processor demand of `tasks` in `[0, t]` (Baruah).
///
/// Right-continuous: a job whose absolute deadline equals `t` (within
/// [`EPS`]) contributes fully.
pub fn dbf_edf(tasks: &[AnalysisTask], t: f64) -> f64 {
    let mut demand = 0.0;
    for task in tasks {
        if t + EPS < task.deadline {
            continue;
        }
        let jobs = ((t - task.deadline + EPS) / task.period).floor() + 1.0;
        demand += jobs * task.wcet;
    }
    demand
}

/// Level-i fixed-priority workload at `t`: task i's own WCET plus the
/// interference of every higher-priority task.
///
/// `tasks` must be sorted in decreasing priority (ascending priority
/// number); `i` indexes into that order.
pub fn dbf_fps(tasks: &[AnalysisTask], t: f64, i: usize) -> f64 {
    let mut demand = tasks[i].wcet;
    for task in &tasks[..i] {
        let releases = ((t - EPS) / task.period).ceil().max(0.0);
        demand += releases * task.wcet;
    }
    demand
}

// ── Half-Half ─────────────────────────────────────────────────────────────────

/// Shin & Lee Half-Half transformation: realize a BDR interface (α, Δ) as a
/// periodic supply server (Q, P) with `P = 2Δ`, `Q = α·P`.
///
/// Δ = 0 has no finite Shin & Lee period.  With α ≈ 1 the server is the
/// whole core ([`is_dedicated`] on the result returns `true`, and no supply
/// windows are generated); with α < 1 a unit-period server preserves the
/// availability factor so a throttled zero-latency interface still throttles.
pub fn half_half(alpha: f64, delta: f64) -> (f64, f64) {
    if delta > EPS {
        let period = 2.0 * delta;
        (alpha * period, period)
    } else {
        (alpha * UNIT_SERVER_PERIOD, UNIT_SERVER_PERIOD)
    }
}

/// Returns `true` when a server (Q, P) supplies the whole timeline — its
/// budget covers its period, so window generation would be a no-op.
pub fn is_dedicated(budget: f64, period: f64) -> bool {
    budget + EPS >= period
}

// ── Tests ─────────────────────────────────────────────────────────────────────
