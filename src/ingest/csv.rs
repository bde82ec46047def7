//! CSV / whitespace task-table ingestion.
//!
//! The alternate input format is a flat task table, one task per row:
//!
//! ```text
//! name  bcet  wcet  period  deadline  [priority]
//! ```
//!
//! Separators may be commas, tabs, or runs of spaces.  A header row is
//! detected when the first row mentions both "task" and "wcet"
//! (case-insensitive).  Rows whose wcet, period, or deadline do not parse
//! are skipped with a warning rather than failing the whole table — field
//! engineers paste these tables out of spreadsheets.
//!
//! The resulting model is a single EDF root component on one core with
//! performance factor 1, following the `core-<coreId>` binding convention.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::model::{Component, Core, Discipline, SystemModel};
use crate::task::{ArrivalKind, Task};

/// Parse a task table into a single-core, single-root system model.
pub fn from_csv_str(text: &str) -> SystemModel {
    let mut tasks = Vec::new();
    let mut seen_names = BTreeSet::new();
    let mut first_row = true;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if first_row {
            first_row = false;
            let lower = line.to_lowercase();
            if lower.contains("task") && lower.contains("wcet") {
                continue; // header row
            }
        }

        let columns: Vec<&str> = if line.contains(',') {
            line.split(',').map(str::trim).collect()
        } else {
            line.split_whitespace().collect()
        };

        if columns.len() < 5 {
            warn!(line = line_no + 1, "task row has fewer than 5 columns — skipped");
            continue;
        }

        let name = columns[0].to_string();
        let bcet = columns[1].parse::<f64>().ok();
        let (wcet, period, deadline) = match (
            columns[2].parse::<f64>(),
            columns[3].parse::<f64>(),
            columns[4].parse::<f64>(),
        ) {
            (Ok(w), Ok(p), Ok(d)) => (w, p, d),
            _ => {
                warn!(
                    line = line_no + 1,
                    name = %name,
                    "non-parseable wcet/period/deadline — row skipped"
                );
                continue;
            }
        };
        let priority = columns.get(5).and_then(|c| c.parse::<i32>().ok());

        // Table rows are keyed by display name; disambiguate repeats so the
        // model's id uniqueness holds.
        let id = if seen_names.insert(name.clone()) {
            name.clone()
        } else {
            let id = format!("{name}-{}", line_no + 1);
            warn!(name = %name, id = %id, "duplicate task name — id disambiguated");
            id
        };

        tasks.push(Task {
            id,
            name,
            bcet,
            wcet,
            deadline,
            priority,
            arrival: ArrivalKind::Periodic { period },
        });
    }

    info!(task_count = tasks.len(), "task table ingested");

    SystemModel {
        cores: vec![Core {
            id: "1".into(),
            name: "Core 1".into(),
            performance_factor: 1.0,
        }],
        roots: vec![Component {
            id: "core-1".into(),
            name: "Imported task table".into(),
            discipline: Discipline::Edf,
            alpha: None,
            delta: None,
            tasks,
            children: vec![],
            core_id: None,
        }],
    }
}

/// Parse a task-table file on disk.
pub fn load_csv_file(path: &Path) -> Result<SystemModel> {
    info!("Loading task table from: {}", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open task table: {}", path.display()))?;
    Ok(from_csv_str(&content))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
