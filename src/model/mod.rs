//! System model: cores, the component tree, and structural validation.
//!
//! The model is a strict tree — the parent→child relation is exclusive
//! ownership and no back-references exist.  Lifecycle:
//!
//! 1. built by ingestion ([`crate::ingest`]),
//! 2. validated here (fatal errors, before any computation),
//! 3. annotated by the interface synthesizer (which writes α and Δ into each
//!    non-root component),
//! 4. consumed read-only by the simulator.
//!
//! Validation failures are structured [`ModelError`] variants carrying the
//! exact offending entity and values, so callers can log or forward them
//! without parsing message strings.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::warn;

use crate::task::Task;

/// Absolute tolerance for validation-side floating-point comparisons.
const TOL: f64 = 1e-9;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Fatal model-validation errors.
///
/// All three variants are returned before any analysis or simulation work
/// starts.  Infeasibility is *not* an error — it is a negative analysis
/// result carried inside [`crate::report::AnalysisResults`].
#[derive(Debug, Error)]
pub enum ModelError {
    /// A field is missing, out of range, or structurally inconsistent.
    #[error("invalid model: {entity}: {reason}")]
    InvalidModel { entity: String, reason: String },

    /// A root component resolves to no declared core, neither through an
    /// explicit `core_id` nor through the `core-<coreId>` id prefix.
    #[error("root component '{component}' is not bound to any declared core")]
    UnboundComponent { component: String },

    /// Two entities of the same kind share an id.
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
}

// ── Core ──────────────────────────────────────────────────────────────────────

/// A physical core of the heterogeneous platform.
///
/// `performance_factor` p scales execution: a task with reference WCET c
/// runs in wall-clock time c/p on this core.  The reference core has p = 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Core {
    pub id: String,
    pub name: String,
    pub performance_factor: f64,
}

// ── Component ─────────────────────────────────────────────────────────────────

/// Scheduling discipline of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Earliest Deadline First.
    Edf,
    /// Fixed-Priority Scheduling (lower priority number = higher priority).
    Fps,
}

/// A node of the scheduling hierarchy.
///
/// Owns an ordered task list and an ordered list of child components.  The
/// BDR interface (α, Δ) is `None` until the synthesizer writes it — except
/// for components whose interface arrived declared in the input model, which
/// the synthesizer validates instead of re-deriving.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub discipline: Discipline,

    /// BDR availability factor α ∈ (0, 1].
    pub alpha: Option<f64>,

    /// BDR supply delay bound Δ ≥ 0.
    pub delta: Option<f64>,

    pub tasks: Vec<Task>,
    pub children: Vec<Component>,

    /// Explicit core binding.  Only meaningful on root components; when
    /// absent the `core-<coreId>` id-prefix convention applies.
    pub core_id: Option<String>,
}

impl Component {
    /// Returns `true` if the input model carried an explicit interface for
    /// this component (either bound — a declared α is enough to pin it).
    pub fn has_declared_interface(&self) -> bool {
        self.alpha.is_some()
    }

    /// Pre-order walk over this component and all descendants.
    pub fn walk(&self, f: &mut impl FnMut(&Component)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

// ── SystemModel ───────────────────────────────────────────────────────────────

/// The complete analyzable system: a set of cores and a forest of root
/// components, each root bound to exactly one core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemModel {
    pub cores: Vec<Core>,
    pub roots: Vec<Component>,
}

impl SystemModel {
    /// Resolve the core a root component is bound to.
    ///
    /// An explicit `core_id` wins; otherwise the root's id must start with
    /// `core-<coreId>`.
    pub fn core_for_root(&self, root: &Component) -> Option<&Core> {
        if let Some(core_id) = &root.core_id {
            return self.cores.iter().find(|c| &c.id == core_id);
        }
        self.cores
            .iter()
            .find(|c| root.id.starts_with(&format!("core-{}", c.id)))
    }

    /// Structural validation — fatal, run before any computation.
    ///
    /// Checks, in order: core fields, per-kind id uniqueness, root↔core
    /// binding (each root bound, each core hosting at most one root), then
    /// every component's interface range and every task's timing fields.
    ///
    /// The relaxed-deadline case D > T is legal but logged, so it is never
    /// silently assumed away.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut core_ids = BTreeSet::new();
        for core in &self.cores {
            if !(core.performance_factor > 0.0) || !core.performance_factor.is_finite() {
                return Err(ModelError::InvalidModel {
                    entity: format!("core '{}'", core.id),
                    reason: format!(
                        "performance factor must be a positive number, got {}",
                        core.performance_factor
                    ),
                });
            }
            if !core_ids.insert(core.id.clone()) {
                return Err(ModelError::DuplicateId {
                    kind: "core",
                    id: core.id.clone(),
                });
            }
        }

        let mut bound_cores = BTreeSet::new();
        for root in &self.roots {
            let core = self
                .core_for_root(root)
                .ok_or_else(|| ModelError::UnboundComponent {
                    component: root.id.clone(),
                })?;
            if !bound_cores.insert(core.id.clone()) {
                return Err(ModelError::InvalidModel {
                    entity: format!("core '{}'", core.id),
                    reason: format!(
                        "hosts more than one root component ('{}' conflicts)",
                        root.id
                    ),
                });
            }
        }

        let mut component_ids = BTreeSet::new();
        let mut task_ids = BTreeSet::new();
        for root in &self.roots {
            Self::validate_component(root, &mut component_ids, &mut task_ids)?;
        }

        Ok(())
    }

    fn validate_component(
        component: &Component,
        component_ids: &mut BTreeSet<String>,
        task_ids: &mut BTreeSet<String>,
    ) -> Result<(), ModelError> {
        if !component_ids.insert(component.id.clone()) {
            return Err(ModelError::DuplicateId {
                kind: "component",
                id: component.id.clone(),
            });
        }

        if let Some(alpha) = component.alpha {
            if !(alpha > 0.0 && alpha <= 1.0 + TOL) {
                return Err(ModelError::InvalidModel {
                    entity: format!("component '{}'", component.id),
                    reason: format!("alpha must lie in (0, 1], got {alpha}"),
                });
            }
        }
        if let Some(delta) = component.delta {
            if !(delta >= 0.0) || !delta.is_finite() {
                return Err(ModelError::InvalidModel {
                    entity: format!("component '{}'", component.id),
                    reason: format!("delta must be >= 0, got {delta}"),
                });
            }
        }

        for task in &component.tasks {
            Self::validate_task(task, task_ids)?;
        }
        for child in &component.children {
            Self::validate_component(child, component_ids, task_ids)?;
        }
        Ok(())
    }

    fn validate_task(task: &Task, task_ids: &mut BTreeSet<String>) -> Result<(), ModelError> {
        if !task_ids.insert(task.id.clone()) {
            return Err(ModelError::DuplicateId {
                kind: "task",
                id: task.id.clone(),
            });
        }

        let entity = || format!("task '{}'", task.id);
        if !(task.wcet > 0.0) || !task.wcet.is_finite() {
            return Err(ModelError::InvalidModel {
                entity: entity(),
                reason: format!("wcet must be > 0, got {}", task.wcet),
            });
        }
        if !(task.deadline > 0.0) || !task.deadline.is_finite() {
            return Err(ModelError::InvalidModel {
                entity: entity(),
                reason: format!("deadline must be > 0, got {}", task.deadline),
            });
        }
        let period = task.period_or_mit();
        if !(period > 0.0) || !period.is_finite() {
            return Err(ModelError::InvalidModel {
                entity: entity(),
                reason: format!(
                    "{} must be > 0, got {period}",
                    if task.arrival.is_sporadic() {
                        "minimum inter-arrival time"
                    } else {
                        "period"
                    }
                ),
            });
        }
        if let Some(bcet) = task.bcet {
            if !(bcet >= 0.0) || !bcet.is_finite() {
                return Err(ModelError::InvalidModel {
                    entity: entity(),
                    reason: format!("bcet must be >= 0, got {bcet}"),
                });
            }
        }
        // Constrained-deadline invariant: a task that cannot finish by its
        // own deadline even when running alone is a modelling mistake.
        if task.wcet > task.deadline + TOL {
            return Err(ModelError::InvalidModel {
                entity: entity(),
                reason: format!(
                    "wcet {} exceeds relative deadline {}",
                    task.wcet, task.deadline
                ),
            });
        }
        if task.deadline > period + TOL {
            warn!(
                task = %task.id,
                deadline = task.deadline,
                period,
                "relative deadline exceeds period — relaxed-deadline task accepted"
            );
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
