//! Bottom-up BDR interface synthesis over the component tree.
//!
//! [`Synthesizer`] walks each root's subtree **post-order**: children's
//! interfaces are computed first, because a child's Half-Half server (Q, P)
//! becomes an additional periodic demand task inside its parent.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | State | Stateless `synthesize()` — all per-run state is local |
//! | Declared interfaces | Validated, never re-derived; a failing declared α is escalated 20 % per step to find the value that *would* be needed, pinned in the report with `isSchedulable = false` |
//! | Δ search orientation | Largest schedulable Δ (SBF is decreasing in Δ, so the schedulable region is an interval from 0); the schedulable endpoint is written back |
//! | Child supply demand | Explicit: every non-root child contributes (C=Q, T=P, D=P) to its parent |
//! | Inconclusive verdicts | Warned once per component and carried as a report flag, never a hard failure |
//!
//! # Example
//! ```rust,ignore
//! let mut model = ingest::from_json_str(&text)?;
//! let results = Synthesizer::new().synthesize(&mut model)?;
//! if !results.is_schedulable { /* report to the operator */ }
//! ```

pub mod feasibility;
pub mod kernel;

use tracing::{debug, info, warn};

use crate::model::{Component, ModelError, SystemModel};
use crate::report::{epoch_millis, AnalysisResults, ComponentInterface};

use feasibility::is_schedulable;
use kernel::{half_half, AnalysisTask, EPS};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Binary-search precision on the delay bound Δ.
pub const DELTA_PRECISION: f64 = 0.1;

/// Hard cap on Δ binary-search iterations; hitting it marks the component
/// inconclusive rather than looping on floating-point noise.
const MAX_SEARCH_ITERATIONS: u32 = 64;

/// Multiplicative α escalation step when a trial interface fails.
const ALPHA_GROWTH: f64 = 1.2;

/// Initial headroom over the utilization lower bound: α starts at 1.1·Σu.
const ALPHA_HEADROOM: f64 = 1.1;

/// Smallest availability factor ever written back, so an empty component
/// still receives a valid interface (α must stay positive).
const MIN_ALPHA: f64 = 1e-6;

// ── Internal outcome ──────────────────────────────────────────────────────────

/// Result of deriving (or validating) one component's interface.
struct Outcome {
    alpha: f64,
    delta: f64,
    /// `false` when no acceptable interface exists (α pinned to the last
    /// trial value, which exceeds 1 when Σu does).
    feasible: bool,
    /// A feasibility verdict along the way was horizon-capped.
    inconclusive: bool,
}

// ── Synthesizer ───────────────────────────────────────────────────────────────

/// Bottom-up interface synthesizer.
///
/// Holds only the search precision; every per-run structure is local to
/// [`Synthesizer::synthesize`], so one instance can serve any number of
/// models.
pub struct Synthesizer {
    precision: f64,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer {
    /// Synthesizer with the standard [`DELTA_PRECISION`].
    pub fn new() -> Self {
        Self {
            precision: DELTA_PRECISION,
        }
    }

    /// Synthesizer with a custom Δ precision (must be > 0).
    pub fn with_precision(precision: f64) -> Self {
        Self { precision }
    }

    // ── Public entry point ────────────────────────────────────────────────────

    /// Validate `model`, derive an interface for every component, write the
    /// interfaces back into the tree, and report overall schedulability.
    ///
    /// Roots without a declared interface are fixed at (α=1, Δ=0) and only
    /// checked; synthesizing a second time reproduces the first run's
    /// interfaces exactly (they are then declared, and declared interfaces
    /// validate).
    ///
    /// # Errors
    /// Only fatal validation errors ([`ModelError`]); infeasibility is the
    /// `is_schedulable = false` result, not an error.
    pub fn synthesize(&self, model: &mut SystemModel) -> Result<AnalysisResults, ModelError> {
        model.validate()?;

        // Resolve bindings up front: the tree walk needs the roots mutably.
        let factors: Vec<f64> = model
            .roots
            .iter()
            .map(|root| {
                model
                    .core_for_root(root)
                    .map(|core| core.performance_factor)
                    .ok_or_else(|| ModelError::UnboundComponent {
                        component: root.id.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;

        let mut interfaces = Vec::new();
        let mut schedulable = true;

        for (root, factor) in model.roots.iter_mut().zip(factors) {
            info!(root = %root.id, performance_factor = factor, "synthesizing subtree");
            self.synthesize_component(root, factor, true, &mut interfaces, &mut schedulable);
        }

        info!(
            component_count = interfaces.len(),
            schedulable, "interface synthesis complete"
        );

        Ok(AnalysisResults {
            is_schedulable: schedulable,
            component_interfaces: interfaces,
            timestamp: epoch_millis(),
        })
    }

    // ── Tree walk ─────────────────────────────────────────────────────────────

    /// Post-order synthesis of one component.  Returns the supply task this
    /// component presents to its parent (`None` for roots, which have no
    /// parent to demand from).
    fn synthesize_component(
        &self,
        component: &mut Component,
        factor: f64,
        is_root: bool,
        out: &mut Vec<ComponentInterface>,
        schedulable: &mut bool,
    ) -> Option<AnalysisTask> {
        let mut child_supply = Vec::new();
        for child in &mut component.children {
            if let Some(supply) = self.synthesize_component(child, factor, false, out, schedulable)
            {
                child_supply.push(supply);
            }
        }

        let outcome = if is_root || component.has_declared_interface() {
            self.validate_interface(component, &child_supply, factor)
        } else {
            self.search_interface(component, &child_supply, factor)
        };

        if !outcome.feasible {
            *schedulable = false;
        }
        if outcome.inconclusive {
            warn!(
                component = %component.id,
                cap = feasibility::HORIZON_CAP,
                "feasibility horizon exceeded the cap — verdict is inconclusive"
            );
        }

        // An infeasible declared interface stays declared: the report pins
        // the α that would be needed, but the model keeps what the operator
        // wrote, so a subsequent simulation shows the declared allocation
        // failing.
        if outcome.feasible || !component.has_declared_interface() {
            component.alpha = Some(outcome.alpha);
            component.delta = Some(outcome.delta);
        }

        let (budget, period) = half_half(outcome.alpha, outcome.delta);
        info!(
            component = %component.id,
            alpha = outcome.alpha,
            delta = outcome.delta,
            feasible = outcome.feasible,
            "interface assigned"
        );

        out.push(ComponentInterface {
            component_id: component.id.clone(),
            alpha: outcome.alpha,
            delta: outcome.delta,
            supply_budget: (!is_root).then_some(budget),
            supply_period: (!is_root).then_some(period),
            inconclusive: outcome.inconclusive,
        });

        (!is_root).then(|| AnalysisTask::supply(&component.id, budget, period))
    }

    // ── Declared / root interfaces ────────────────────────────────────────────

    /// Check a fixed interface: the declared (α, Δ), or (1, 0) for a root
    /// with none.  On failure, escalate α to find the value that would be
    /// needed; the component stays infeasible either way.
    fn validate_interface(
        &self,
        component: &Component,
        child_supply: &[AnalysisTask],
        factor: f64,
    ) -> Outcome {
        let declared_alpha = component.alpha.unwrap_or(1.0);
        let delta = component.delta.unwrap_or(0.0);

        let verdict = is_schedulable(component, child_supply, declared_alpha, delta, factor);
        if verdict.passed() {
            return Outcome {
                alpha: declared_alpha,
                delta,
                feasible: true,
                inconclusive: verdict.is_inconclusive(),
            };
        }

        warn!(
            component = %component.id,
            alpha = declared_alpha,
            delta,
            "declared interface is infeasible — escalating alpha to find the required factor"
        );

        let mut alpha = declared_alpha;
        let mut inconclusive = false;
        while alpha < 1.0 - EPS {
            alpha = (alpha * ALPHA_GROWTH).min(1.0);
            let verdict = is_schedulable(component, child_supply, alpha, delta, factor);
            if verdict.passed() {
                inconclusive = verdict.is_inconclusive();
                break;
            }
        }

        Outcome {
            alpha,
            delta,
            feasible: false,
            inconclusive,
        }
    }

    // ── Synthesis search ──────────────────────────────────────────────────────

    /// Derive the minimum-α, maximum-Δ interface for a non-root component
    /// with no declared interface.
    fn search_interface(
        &self,
        component: &Component,
        child_supply: &[AnalysisTask],
        factor: f64,
    ) -> Outcome {
        let own: Vec<AnalysisTask> = component
            .tasks
            .iter()
            .map(|t| AnalysisTask::from_task(t, factor))
            .collect();
        let total_u: f64 = own
            .iter()
            .chain(child_supply)
            .map(AnalysisTask::utilization)
            .sum();
        let max_deadline = own
            .iter()
            .chain(child_supply)
            .map(|t| t.deadline)
            .fold(0.0, f64::max);

        if total_u > 1.0 + EPS {
            // More than a full core: no α ≤ 1 can help.  The > 1 value in
            // the report tells the operator how much core is missing.
            return Outcome {
                alpha: ALPHA_HEADROOM * total_u,
                delta: 0.0,
                feasible: false,
                inconclusive: false,
            };
        }

        // α escalation at the most supply-generous point Δ = 0.
        let mut alpha = (ALPHA_HEADROOM * total_u).min(1.0).max(MIN_ALPHA);
        let mut verdict = is_schedulable(component, child_supply, alpha, 0.0, factor);
        while !verdict.passed() && alpha < 1.0 - EPS {
            alpha = (alpha * ALPHA_GROWTH).min(1.0);
            debug!(component = %component.id, alpha, "escalating alpha");
            verdict = is_schedulable(component, child_supply, alpha, 0.0, factor);
        }
        if !verdict.passed() {
            return Outcome {
                alpha,
                delta: 0.0,
                feasible: false,
                inconclusive: false,
            };
        }
        let mut inconclusive = verdict.is_inconclusive();

        // Largest schedulable Δ in [0, 2·max_deadline].  Invariant: lo is
        // schedulable, hi is not (unless the whole range is).
        let upper = 2.0 * max_deadline;
        let ceiling = is_schedulable(component, child_supply, alpha, upper, factor);
        let delta = if ceiling.passed() {
            inconclusive |= ceiling.is_inconclusive();
            upper
        } else {
            let mut lo = 0.0;
            let mut hi = upper;
            let mut iterations = 0;
            while hi - lo > self.precision {
                if iterations >= MAX_SEARCH_ITERATIONS {
                    inconclusive = true;
                    break;
                }
                iterations += 1;
                let mid = 0.5 * (lo + hi);
                let verdict = is_schedulable(component, child_supply, alpha, mid, factor);
                if verdict.passed() {
                    inconclusive |= verdict.is_inconclusive();
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            lo
        };

        Outcome {
            alpha,
            delta,
            feasible: true,
            inconclusive,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Core, Discipline};
    use crate::task::{ArrivalKind, Task};

    fn task(id: &str, wcet: f64, period: f64, deadline: f64) -> Task {
        Task {
            id: id.into(),
            name: id.into(),
            bcet: None,
            wcet,
            deadline,
            priority: None,
            arrival: ArrivalKind::Periodic { period },
        }
    }

    fn component(id: &str, tasks: Vec<Task>, children: Vec<Component>) -> Component {
        Component {
            id: id.into(),
            name: id.into(),
            discipline: Discipline::Edf,
            alpha: None,
            delta: None,
            tasks,
            children,
            core_id: None,
        }
    }

    fn model(root: Component) -> SystemModel {
        SystemModel {
            cores: vec![Core {
                id: "1".into(),
                name: "Core 1".into(),
                performance_factor: 1.0,
            }],
            roots: vec![root],
        }
    }

    fn interface<'a>(results: &'a AnalysisResults, id: &str) -> &'a ComponentInterface {
        results
            .component_interfaces
            .iter()
            .find(|i| i.component_id == id)
            .unwrap()
    }

    // ── roots ─────────────────────────────────────────────────────────────────

    #[test]
    fn root_is_fixed_at_full_dedicated_supply() {
        let mut m = model(component(
            "core-1-root",
            vec![task("t1", 2.0, 5.0, 5.0), task("t2", 2.0, 10.0, 10.0)],
            vec![],
        ));
        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        assert!(results.is_schedulable);

        let root = interface(&results, "core-1-root");
        assert_eq!(root.alpha, 1.0);
        assert_eq!(root.delta, 0.0);
        assert!(root.supply_budget.is_none(), "roots emit no supply task");
    }

    #[test]
    fn full_utilization_root_is_schedulable() {
        let mut m = model(component(
            "core-1-root",
            vec![task("t1", 4.0, 5.0, 5.0), task("t2", 2.0, 10.0, 10.0)],
            vec![],
        ));
        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        assert!(results.is_schedulable);
        assert_eq!(interface(&results, "core-1-root").alpha, 1.0);
    }

    // ── non-root synthesis ────────────────────────────────────────────────────

    #[test]
    fn child_interface_covers_its_utilization() {
        let child = component("child", vec![task("t", 2.0, 10.0, 10.0)], vec![]);
        let mut m = model(component("core-1-root", vec![], vec![child]));

        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        assert!(results.is_schedulable);

        let iface = interface(&results, "child");
        // α starts at 1.1·Σu = 0.22 and must not have escalated
        assert!((iface.alpha - 0.22).abs() < 1e-9, "alpha = {}", iface.alpha);
        assert!(iface.delta >= 0.0 && iface.delta <= 20.0);
        // Half-Half consistency
        if iface.delta > 1e-9 {
            assert!((iface.supply_period.unwrap() - 2.0 * iface.delta).abs() < 1e-9);
            assert!(
                (iface.supply_budget.unwrap() - iface.alpha * iface.supply_period.unwrap()).abs()
                    < 1e-9
            );
        }
    }

    #[test]
    fn synthesized_interface_is_written_back_and_feasible() {
        let child = component("child", vec![task("t", 2.0, 10.0, 10.0)], vec![]);
        let mut m = model(component("core-1-root", vec![], vec![child]));
        Synthesizer::new().synthesize(&mut m).unwrap();

        let child = &m.roots[0].children[0];
        let (alpha, delta) = (child.alpha.unwrap(), child.delta.unwrap());
        assert!(
            feasibility::is_schedulable(child, &[], alpha, delta, 1.0).passed(),
            "written-back interface ({alpha}, {delta}) must be feasible"
        );
    }

    #[test]
    fn synthesis_is_idempotent() {
        let child = component(
            "child",
            vec![task("t", 2.0, 10.0, 10.0), task("u", 1.0, 5.0, 5.0)],
            vec![],
        );
        let mut m = model(component("core-1-root", vec![], vec![child]));

        let first = Synthesizer::new().synthesize(&mut m).unwrap();
        let second = Synthesizer::new().synthesize(&mut m).unwrap();

        for (a, b) in first
            .component_interfaces
            .iter()
            .zip(&second.component_interfaces)
        {
            assert_eq!(a.component_id, b.component_id);
            assert!((a.alpha - b.alpha).abs() < DELTA_PRECISION);
            assert!((a.delta - b.delta).abs() < DELTA_PRECISION);
        }
    }

    #[test]
    fn child_supply_demand_is_added_to_the_parent() {
        // A heavy child makes the parent's core infeasible even though the
        // parent owns no tasks of its own beyond the child server.
        let child = component("child", vec![task("t", 9.0, 10.0, 10.0)], vec![]);
        let parent = component(
            "core-1-root",
            vec![task("own", 4.0, 10.0, 10.0)],
            vec![child],
        );
        let mut m = model(parent);
        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        // Child alone needs α ≥ 0.9; root demand = child server + 0.4 > 1
        assert!(!results.is_schedulable);
    }

    // ── declared interfaces ───────────────────────────────────────────────────

    #[test]
    fn feasible_declared_interface_is_kept() {
        let mut child = component("child", vec![task("t", 8.0, 100.0, 80.0)], vec![]);
        child.alpha = Some(0.4);
        child.delta = Some(50.0);
        let mut m = model(component("core-1-root", vec![], vec![child]));

        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        assert!(results.is_schedulable);

        let iface = interface(&results, "child");
        assert_eq!(iface.alpha, 0.4);
        assert_eq!(iface.delta, 50.0);
        assert!((iface.supply_budget.unwrap() - 40.0).abs() < 1e-9);
        assert!((iface.supply_period.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn oversubscribed_declared_interface_reports_required_alpha() {
        // Σu = 0.8 against a declared α = 0.5: infeasible, α escalates
        // 0.5 → 0.6 → 0.72 → 0.864
        let mut root = component("core-1-root", vec![task("t", 8.0, 10.0, 10.0)], vec![]);
        root.alpha = Some(0.5);
        root.delta = Some(0.0);
        let mut m = model(root);

        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        assert!(!results.is_schedulable);
        let iface = interface(&results, "core-1-root");
        assert!(
            iface.alpha >= 0.8,
            "pinned alpha {} must reach the utilization",
            iface.alpha
        );
    }

    // ── infeasibility ─────────────────────────────────────────────────────────

    #[test]
    fn utilization_above_one_pins_alpha_above_one() {
        let child = component(
            "child",
            vec![task("t1", 8.0, 10.0, 10.0), task("t2", 5.0, 10.0, 10.0)],
            vec![],
        );
        let mut m = model(component("core-1-root", vec![], vec![child]));

        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        assert!(!results.is_schedulable);
        assert!(
            interface(&results, "child").alpha > 1.0,
            "alpha sentinel must exceed 1"
        );
    }

    // ── determinism / ordering ────────────────────────────────────────────────

    #[test]
    fn interfaces_are_emitted_post_order() {
        let grandchild = component("gc", vec![task("t", 1.0, 10.0, 10.0)], vec![]);
        let child = component("c", vec![task("u", 1.0, 10.0, 10.0)], vec![grandchild]);
        let mut m = model(component("core-1-root", vec![], vec![child]));

        let results = Synthesizer::new().synthesize(&mut m).unwrap();
        let order: Vec<&str> = results
            .component_interfaces
            .iter()
            .map(|i| i.component_id.as_str())
            .collect();
        assert_eq!(order, vec!["gc", "c", "core-1-root"]);
    }

    #[test]
    fn validation_failure_aborts_before_synthesis() {
        let mut m = model(component("core-1-root", vec![task("t", 0.0, 10.0, 10.0)], vec![]));
        assert!(Synthesizer::new().synthesize(&mut m).is_err());
        // Nothing was written back
        assert!(m.roots[0].alpha.is_none());
    }
}
