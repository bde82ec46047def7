/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Wire-ready result types for analysis and simulation runs.
//!
//! Internal state (component trees, job arenas) never crosses the API
//! boundary; these types are what the host receives, and they serialize to
//! the camelCase JSON contract verbatim.  Timestamps are epoch
//! milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Milliseconds since the Unix epoch, saturating to 0 for a pre-epoch
/// clock.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

// ── Analysis results ──────────────────────────────────────────────────────────

/// One component's synthesized (or validated) BDR interface.
///
/// `supply_budget` / `supply_period` are the Half-Half server realizing the
/// interface; roots have no parent to supply and omit them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInterface {
    pub component_id: String,
    pub alpha: f64,
    pub delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply_period: Option<f64>,
    /// The feasibility horizon exceeded the implementation cap; the
    /// interface passed every examined point but the tail is unverified.
    #[serde(skip_serializing_if = "is_false")]
    pub inconclusive: bool,
}

/// Outcome of an interface-synthesis run over the whole model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    /// `true` iff every component received a feasible interface.
    pub is_schedulable: bool,
    /// One record per component, children before parents.
    pub component_interfaces: Vec<ComponentInterface>,
    pub timestamp: u64,
}

// ── Simulation results ────────────────────────────────────────────────────────

/// Per-task response-time statistics over one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub task_id: String,
    /// Mean response time of completed jobs (0 when none completed).
    pub avg: f64,
    /// Maximum response time of completed jobs.
    pub max: f64,
    pub missed_deadlines: u64,
}

/// Per-component CPU accounting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentUtilization {
    pub component_id: String,
    /// Executed time divided by the simulated horizon.
    pub utilization: f64,
    /// The availability factor α the component was granted.
    pub allocated_utilization: f64,
}

/// One contiguous execution slice of a job.
///
/// A preempted job emits several records sharing `task_id` and
/// `instance_id`; `missed_deadline` reflects the job's status as of
/// `end_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSlice {
    pub task_id: String,
    pub component_id: String,
    pub instance_id: u64,
    pub arrival_time: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub deadline: f64,
    pub missed_deadline: bool,
}

/// Outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResults {
    pub task_response_times: Vec<TaskResponse>,
    pub component_utilizations: Vec<ComponentUtilization>,
    /// Simulated horizon, or the last processed time when truncated.
    pub simulation_time: f64,
    pub timestamp: u64,
    /// `true` when the run was cancelled cooperatively; all accumulators
    /// cover only `[0, simulation_time]`.
    #[serde(skip_serializing_if = "is_false")]
    pub truncated: bool,
    /// Ordered execution trace, byte-identical across identical runs.
    pub execution_logs: Vec<ExecutionSlice>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_interface_serializes_camel_case() {
        let iface = ComponentInterface {
            component_id: "child".into(),
            alpha: 0.4,
            delta: 50.0,
            supply_budget: Some(40.0),
            supply_period: Some(100.0),
            inconclusive: false,
        };
        let json = serde_json::to_value(&iface).unwrap();
        assert_eq!(json["componentId"], "child");
        assert_eq!(json["supplyBudget"], 40.0);
        assert_eq!(json["supplyPeriod"], 100.0);
        assert!(
            json.get("inconclusive").is_none(),
            "false flag must be omitted"
        );
    }

    #[test]
    fn root_interface_omits_supply_fields() {
        let iface = ComponentInterface {
            component_id: "core-1-root".into(),
            alpha: 1.0,
            delta: 0.0,
            supply_budget: None,
            supply_period: None,
            inconclusive: false,
        };
        let json = serde_json::to_value(&iface).unwrap();
        assert!(json.get("supplyBudget").is_none());
        assert!(json.get("supplyPeriod").is_none());
    }

    #[test]
    fn simulation_results_serialize_expected_keys() {
        let results = SimulationResults {
            task_response_times: vec![TaskResponse {
                task_id: "t1".into(),
                avg: 2.0,
                max: 4.0,
                missed_deadlines: 0,
            }],
            component_utilizations: vec![ComponentUtilization {
                component_id: "c".into(),
                utilization: 0.6,
                allocated_utilization: 1.0,
            }],
            simulation_time: 100.0,
            timestamp: 1,
            truncated: false,
            execution_logs: vec![],
        };
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["taskResponseTimes"][0]["taskId"], "t1");
        assert_eq!(json["taskResponseTimes"][0]["missedDeadlines"], 0);
        assert_eq!(json["componentUtilizations"][0]["allocatedUtilization"], 1.0);
        assert_eq!(json["simulationTime"], 100.0);
        assert!(json.get("truncated").is_none());
    }

    #[test]
    fn execution_slice_serializes_all_fields() {
        let slice = ExecutionSlice {
            task_id: "t1".into(),
            component_id: "c".into(),
            instance_id: 3,
            arrival_time: 30.0,
            start_time: 30.0,
            end_time: 32.0,
            deadline: 40.0,
            missed_deadline: false,
        };
        let json = serde_json::to_value(&slice).unwrap();
        assert_eq!(json["instanceId"], 3);
        assert_eq!(json["startTime"], 30.0);
        assert_eq!(json["endTime"], 32.0);
        assert_eq!(json["missedDeadline"], false);
    }

    #[test]
    fn epoch_millis_is_monotonic_enough() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(b >= a);
        assert!(a > 1_500_000_000_000, "clock should be past 2017");
    }
}
