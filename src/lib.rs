/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! hsf-core – schedulability analysis and simulation for hierarchical
//! ADAS scheduling on heterogeneous multicore platforms.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── task.rs        – task model: periodic / sporadic variants, per-task math
//! ├── model/         – cores, component tree, structural validation
//! ├── ingest/        – JSON model + CSV task-table ingestion
//! ├── hyperperiod/   – LCM / GCD horizon helpers
//! ├── analysis/      – DBF/SBF kernel, feasibility test, interface synthesis
//! ├── sim/           – event-driven hierarchical simulator
//! └── report.rs      – wire-ready result contracts
//! ```
//!
//! A typical run ingests a model, synthesizes a Bounded-Delay Resource
//! interface (α, Δ) for every component, then replays the system over a
//! horizon:
//!
//! ```rust,ignore
//! let mut model = hsf_core::ingest::load_from_file(&path)?;
//! let analysis = hsf_core::Synthesizer::new().synthesize(&mut model)?;
//! let trace = hsf_core::simulate(&model, 1000.0)?;
//! ```
//!
//! Analysis and simulation share no mutable state: the synthesizer is the
//! only writer (it annotates interfaces), the simulator is a pure reader,
//! and either can be run on its own.  Both are deterministic — identical
//! inputs produce identical reports and byte-identical traces.

pub mod analysis;
pub mod hyperperiod;
pub mod ingest;
pub mod model;
pub mod report;
pub mod sim;
pub mod task;

pub use analysis::Synthesizer;
pub use model::{ModelError, SystemModel};
pub use report::{AnalysisResults, SimulationResults};
pub use sim::{simulate, simulate_with_cancel, CancelToken};
