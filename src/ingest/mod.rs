//! System model ingestion from the authoritative JSON contract.
//!
//! The expected JSON structure (camelCase) is:
//!
//! ```json
//! {
//!   "cores": [{ "id": "1", "name": "Core 1", "performanceFactor": 1.0 }],
//!   "rootComponents": [{
//!     "id": "core-1-root", "name": "Vision", "schedulingAlgorithm": "EDF",
//!     "tasks": [{ "id": "t1", "name": "Lane detect", "type": "periodic",
//!                 "wcet": 2, "period": 5, "deadline": 5 }],
//!     "childComponents": []
//!   }]
//! }
//! ```
//!
//! Ingestion is deliberately lenient: it checks the structure — presence of
//! the `cores` / `rootComponents` arrays and of the fields the typed model
//! cannot exist without (`period` on periodic, `minimumInterArrivalTime` on
//! sporadic, a known scheduling algorithm) — and leaves every range check
//! to [`SystemModel::validate`], which the synthesizer and simulator run
//! before any computation.

pub mod csv;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::model::{Component, Discipline, ModelError, SystemModel};
use crate::task::{ArrivalKind, Task};

// ── Private JSON deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the JSON file layout.
///
/// Kept private — callers work with [`SystemModel`] instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelFile {
    cores: Vec<CoreEntry>,
    root_components: Vec<ComponentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreEntry {
    id: String,
    name: Option<String>,
    #[serde(default = "default_performance_factor")]
    performance_factor: f64,
}

/// Serde default for `performanceFactor`: the reference core.
fn default_performance_factor() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentEntry {
    id: String,
    name: Option<String>,
    scheduling_algorithm: String,
    alpha: Option<f64>,
    delta: Option<f64>,
    #[serde(default)]
    tasks: Vec<TaskEntry>,
    #[serde(default)]
    child_components: Vec<ComponentEntry>,
    core_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskEntry {
    id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    bcet: Option<f64>,
    wcet: f64,
    deadline: f64,
    priority: Option<i32>,
    period: Option<f64>,
    minimum_inter_arrival_time: Option<f64>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse a system model from JSON text.
pub fn from_json_str(text: &str) -> Result<SystemModel> {
    let file: ModelFile =
        serde_json::from_str(text).context("failed to parse system model JSON")?;

    let cores = file
        .cores
        .into_iter()
        .map(|c| crate::model::Core {
            name: c.name.unwrap_or_else(|| c.id.clone()),
            id: c.id,
            performance_factor: c.performance_factor,
        })
        .collect();

    let roots = file
        .root_components
        .into_iter()
        .map(convert_component)
        .collect::<std::result::Result<Vec<_>, ModelError>>()?;

    let model = SystemModel { cores, roots };
    info!(
        core_count = model.cores.len(),
        root_count = model.roots.len(),
        "system model ingested"
    );
    Ok(model)
}

/// Parse a system model from a JSON file on disk.
pub fn load_from_file(path: &Path) -> Result<SystemModel> {
    info!("Loading system model from: {}", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open model file: {}", path.display()))?;
    from_json_str(&content)
        .with_context(|| format!("invalid system model in: {}", path.display()))
}

// ── Conversion ────────────────────────────────────────────────────────────────

fn convert_component(entry: ComponentEntry) -> std::result::Result<Component, ModelError> {
    let discipline = match entry.scheduling_algorithm.as_str() {
        "EDF" => Discipline::Edf,
        "FPS" => Discipline::Fps,
        other => {
            return Err(ModelError::InvalidModel {
                entity: format!("component '{}'", entry.id),
                reason: format!("unknown scheduling algorithm '{other}' (valid: EDF, FPS)"),
            })
        }
    };

    let tasks = entry
        .tasks
        .into_iter()
        .map(convert_task)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let children = entry
        .child_components
        .into_iter()
        .map(convert_component)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Component {
        name: entry.name.unwrap_or_else(|| entry.id.clone()),
        id: entry.id,
        discipline,
        alpha: entry.alpha,
        delta: entry.delta,
        tasks,
        children,
        core_id: entry.core_id,
    })
}

fn convert_task(entry: TaskEntry) -> std::result::Result<Task, ModelError> {
    let arrival = match entry.kind.as_str() {
        "periodic" => {
            let period = entry.period.ok_or_else(|| ModelError::InvalidModel {
                entity: format!("task '{}'", entry.id),
                reason: "periodic task is missing its period".into(),
            })?;
            ArrivalKind::Periodic { period }
        }
        "sporadic" => {
            let mit = entry
                .minimum_inter_arrival_time
                .ok_or_else(|| ModelError::InvalidModel {
                    entity: format!("task '{}'", entry.id),
                    reason: "sporadic task is missing its minimum inter-arrival time".into(),
                })?;
            ArrivalKind::Sporadic {
                min_inter_arrival: mit,
            }
        }
        other => {
            return Err(ModelError::InvalidModel {
                entity: format!("task '{}'", entry.id),
                reason: format!("unknown task type '{other}' (valid: periodic, sporadic)"),
            })
        }
    };

    Ok(Task {
        name: entry.name.unwrap_or_else(|| entry.id.clone()),
        id: entry.id,
        bcet: entry.bcet,
        wcet: entry.wcet,
        deadline: entry.deadline,
        priority: entry.priority,
        arrival,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
