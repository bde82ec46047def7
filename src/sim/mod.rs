//! Hierarchical discrete-event simulator.
//!
//! Replays one root subtree per core over `[0, horizon]`: task arrivals,
//! absolute deadlines, completions, and BDR supply windows, under EDF or
//! FPS at every component.  Produces per-task response times and miss
//! counts, per-component executed time, and an ordered execution trace.
//!
//! # Execution model
//!
//! * One job executes at a time per root subtree (each root owns its core).
//!   Independent subtrees simulate one after another and share no state; a
//!   host wanting parallelism can hand each run its own deep copy of the
//!   model.
//! * An active job is never preempted by an arrival — only by supply
//!   revocation on its component chain.  On every state-changing event the
//!   dispatcher walks the tree root-down: each component arbitrates between
//!   its own head-of-queue job and each supplied child's recursive pick,
//!   under its own discipline.
//! * Completions are scheduled optimistically at dispatch time and carry a
//!   token; a preemption invalidates the token, so a stale completion is
//!   ignored when it surfaces.
//! * Executed time is charged at every stop boundary (completion,
//!   preemption, end of horizon) — never lazily — and each contiguous slice
//!   emits one trace record.
//!
//! The run is deterministic: no randomness anywhere, all iteration in model
//! order, event ties resolved by the total order in [`event`].
//!
//! # Cancellation
//! The only suspension point is between events.  [`CancelToken`] is checked
//! there; a cancelled run returns partial results with `truncated = true`
//! and the last processed time.

pub mod event;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::kernel::{half_half, is_dedicated, EPS};
use crate::model::{Component, Discipline, ModelError, SystemModel};
use crate::report::{
    epoch_millis, ComponentUtilization, ExecutionSlice, SimulationResults, TaskResponse,
};

use event::{EventKind, EventQueue};

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cooperative stop flag shared between the host and a running simulation.
///
/// Clones share one flag.  The simulator polls it between events; it never
/// blocks on it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the simulation to stop at the next event boundary.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

// ── Public entry points ───────────────────────────────────────────────────────

/// Simulate `model` over `[0, horizon]`.
///
/// The model is consumed read-only; run it after the synthesizer has
/// annotated interfaces (a non-root component without one simulates as
/// dedicated, with a warning).
pub fn simulate(model: &SystemModel, horizon: f64) -> Result<SimulationResults, ModelError> {
    simulate_with_cancel(model, horizon, &CancelToken::new())
}

/// [`simulate`] with cooperative cancellation.
///
/// On cancellation the results cover `[0, last processed time]` and carry
/// `truncated = true`; root subtrees not yet started are absent from the
/// accumulators.
pub fn simulate_with_cancel(
    model: &SystemModel,
    horizon: f64,
    cancel: &CancelToken,
) -> Result<SimulationResults, ModelError> {
    model.validate()?;
    if !(horizon > 0.0) || !horizon.is_finite() {
        return Err(ModelError::InvalidModel {
            entity: "simulation".into(),
            reason: format!("horizon must be a positive number, got {horizon}"),
        });
    }

    let mut responses = Vec::new();
    let mut utilizations = Vec::new();
    let mut logs = Vec::new();
    let mut truncated = false;
    let mut simulation_time = horizon;

    for root in &model.roots {
        if cancel.is_cancelled() {
            truncated = true;
            if utilizations.is_empty() {
                simulation_time = 0.0;
            }
            break;
        }
        let factor = model
            .core_for_root(root)
            .ok_or_else(|| ModelError::UnboundComponent {
                component: root.id.clone(),
            })?
            .performance_factor;

        info!(root = %root.id, performance_factor = factor, horizon, "simulating subtree");
        let outcome = SubtreeSim::new(root, factor, horizon).run(cancel);

        responses.extend(outcome.responses);
        utilizations.extend(outcome.utilizations);
        logs.extend(outcome.logs);
        if outcome.truncated {
            truncated = true;
            simulation_time = outcome.end;
            break;
        }
    }

    // Subtrees simulate one after another; the merged trace is presented in
    // global time order (stable, so equal instants keep model order).
    logs.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    Ok(SimulationResults {
        task_response_times: responses,
        component_utilizations: utilizations,
        simulation_time,
        timestamp: epoch_millis(),
        truncated,
        execution_logs: logs,
    })
}

// ── Arena state ───────────────────────────────────────────────────────────────

struct CompNode {
    id: String,
    discipline: Discipline,
    /// Availability factor granted to this component (1.0 when dedicated).
    alpha: f64,
    /// Half-Half server realizing the interface: supplied during
    /// `[kP, kP + Q)` for every k.
    budget: f64,
    period: f64,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Whole-timeline supply: no window events exist for this component.
    dedicated: bool,
    available: bool,
    executed: f64,
    /// Pending job indices, selection-scanned under the discipline.
    ready: Vec<usize>,
}

struct TaskNode {
    id: String,
    component: usize,
    /// Wall-clock WCET on the bound core (reference WCET / p).
    wcet: f64,
    deadline: f64,
    period: f64,
    priority: i32,
    next_instance: u64,
    responses: Vec<f64>,
    missed: u64,
}

struct Job {
    task: usize,
    instance: u64,
    arrival: f64,
    /// Absolute deadline `arrival + D`.
    deadline: f64,
    remaining: f64,
    missed: bool,
    finished: bool,
}

struct Active {
    job: usize,
    /// Dispatch instant of the current slice.
    since: f64,
    token: u64,
}

struct SubtreeOutcome {
    truncated: bool,
    end: f64,
    responses: Vec<TaskResponse>,
    utilizations: Vec<ComponentUtilization>,
    logs: Vec<ExecutionSlice>,
}

// ── SubtreeSim ────────────────────────────────────────────────────────────────

/// One root subtree's simulation state.  Everything lives for a single
/// `run()`; nothing is shared between runs.
struct SubtreeSim {
    comps: Vec<CompNode>,
    tasks: Vec<TaskNode>,
    jobs: Vec<Job>,
    /// (task, instance) → job arena index; how deadline events find their
    /// job regardless of preemption.
    job_index: HashMap<(usize, u64), usize>,
    queue: EventQueue,
    active: Option<Active>,
    next_token: u64,
    horizon: f64,
    logs: Vec<ExecutionSlice>,
}

impl SubtreeSim {
    fn new(root: &Component, factor: f64, horizon: f64) -> Self {
        let mut sim = Self {
            comps: Vec::new(),
            tasks: Vec::new(),
            jobs: Vec::new(),
            job_index: HashMap::new(),
            queue: EventQueue::new(),
            active: None,
            next_token: 0,
            horizon,
            logs: Vec::new(),
        };
        sim.flatten(root, factor, None);
        sim.seed_events();
        sim
    }

    /// DFS pre-order flattening of the component tree into the arenas.
    fn flatten(&mut self, component: &Component, factor: f64, parent: Option<usize>) -> usize {
        let alpha = component.alpha.unwrap_or(1.0);
        let delta = component.delta.unwrap_or(0.0);
        if parent.is_some() && component.alpha.is_none() {
            warn!(
                component = %component.id,
                "no interface annotated — simulating as dedicated supply"
            );
        }
        let (budget, period) = half_half(alpha, delta);
        let dedicated = is_dedicated(budget, period);

        let idx = self.comps.len();
        self.comps.push(CompNode {
            id: component.id.clone(),
            discipline: component.discipline,
            alpha,
            budget,
            period,
            parent,
            children: Vec::new(),
            dedicated,
            // Windowed components start unsupplied; their first window
            // opens with the supply-start event at t = 0.
            available: dedicated,
            executed: 0.0,
            ready: Vec::new(),
        });

        for task in &component.tasks {
            self.tasks.push(TaskNode {
                id: task.id.clone(),
                component: idx,
                wcet: task.scaled_wcet(factor),
                deadline: task.deadline,
                period: task.period_or_mit(),
                priority: task.effective_priority(),
                next_instance: 0,
                responses: Vec::new(),
                missed: 0,
            });
        }

        for child in &component.children {
            let c = self.flatten(child, factor, Some(idx));
            self.comps[idx].children.push(c);
        }
        idx
    }

    /// Initial events: every task's first arrival at t = 0, and the full
    /// cyclic window sequence of every windowed component.
    fn seed_events(&mut self) {
        for task in 0..self.tasks.len() {
            self.queue.push(0.0, EventKind::Arrival { task });
        }
        for component in 0..self.comps.len() {
            if self.comps[component].dedicated {
                continue;
            }
            let (budget, period) = (self.comps[component].budget, self.comps[component].period);
            let mut k: u64 = 0;
            loop {
                let start = k as f64 * period;
                if start >= self.horizon {
                    break;
                }
                self.queue.push(start, EventKind::SupplyStart { component });
                self.queue.push(start + budget, EventKind::SupplyEnd { component });
                k += 1;
            }
        }
    }

    // ── Main loop ─────────────────────────────────────────────────────────────

    fn run(mut self, cancel: &CancelToken) -> SubtreeOutcome {
        let mut now = 0.0;
        let mut truncated = false;

        while let Some(ev) = self.queue.pop() {
            if ev.time > self.horizon + EPS {
                break;
            }
            if cancel.is_cancelled() {
                truncated = true;
                break;
            }
            now = ev.time;

            match ev.kind {
                EventKind::Arrival { task } => self.on_arrival(task, now),
                EventKind::Deadline { task, instance } => self.on_deadline(task, instance, now),
                EventKind::Completion { token } => self.on_completion(token, now),
                EventKind::SupplyStart { component } => {
                    self.comps[component].available = true;
                }
                EventKind::SupplyEnd { component } => self.on_supply_end(component, now),
            }

            self.dispatch(now);
        }

        let end = if truncated { now } else { self.horizon };
        self.finalize(end);
        self.collect(end, truncated)
    }

    // ── Event handlers ────────────────────────────────────────────────────────

    fn on_arrival(&mut self, task: usize, now: f64) {
        let node = &mut self.tasks[task];
        let instance = node.next_instance;
        node.next_instance += 1;

        let job = Job {
            task,
            instance,
            arrival: now,
            deadline: now + node.deadline,
            remaining: node.wcet,
            missed: false,
            finished: false,
        };
        let component = node.component;
        let abs_deadline = job.deadline;
        let next = now + node.period;

        let job_idx = self.jobs.len();
        self.jobs.push(job);
        self.job_index.insert((task, instance), job_idx);
        self.comps[component].ready.push(job_idx);

        self.queue.push(abs_deadline, EventKind::Deadline { task, instance });
        if next < self.horizon {
            self.queue.push(next, EventKind::Arrival { task });
        }
    }

    fn on_deadline(&mut self, task: usize, instance: u64, now: f64) {
        let Some(&job_idx) = self.job_index.get(&(task, instance)) else {
            return;
        };
        let in_flight = match &self.active {
            Some(a) if a.job == job_idx => now - a.since,
            _ => 0.0,
        };
        let job = &mut self.jobs[job_idx];
        // A job whose in-flight execution already covers its remaining work
        // completes at this very instant and meets the deadline.
        if !job.finished && job.remaining - in_flight > EPS {
            job.missed = true;
            self.tasks[task].missed += 1;
            debug!(
                task = %self.tasks[task].id,
                instance,
                deadline = now,
                "deadline missed — job keeps executing"
            );
        }
    }

    fn on_completion(&mut self, token: u64, now: f64) {
        // Stale completions are left over from a dispatch that was since
        // preempted.
        let current = matches!(&self.active, Some(a) if a.token == token);
        if !current {
            return;
        }
        let active = self.active.take().expect("checked above");
        self.stop_job(active, now);
    }

    fn on_supply_end(&mut self, component: usize, now: f64) {
        self.comps[component].available = false;
        let preempt = match &self.active {
            Some(a) => {
                let owner = self.tasks[self.jobs[a.job].task].component;
                self.chain_contains(owner, component)
            }
            None => false,
        };
        if preempt {
            let active = self.active.take().expect("checked above");
            self.stop_job(active, now);
        }
    }

    /// Does `component` appear on the supply chain of `owner` (itself or an
    /// ancestor)?
    fn chain_contains(&self, owner: usize, component: usize) -> bool {
        let mut cursor = Some(owner);
        while let Some(c) = cursor {
            if c == component {
                return true;
            }
            cursor = self.comps[c].parent;
        }
        false
    }

    // ── Job lifecycle ─────────────────────────────────────────────────────────

    /// Close the active slice at `now`: charge executed time, emit the trace
    /// record, then either complete the job or return it to its queue.
    fn stop_job(&mut self, active: Active, now: f64) {
        let elapsed = (now - active.since).max(0.0);
        let job = &mut self.jobs[active.job];
        job.remaining = (job.remaining - elapsed).max(0.0);
        let task = &mut self.tasks[job.task];
        let component = task.component;
        self.comps[component].executed += elapsed;

        if elapsed > EPS {
            self.logs.push(ExecutionSlice {
                task_id: task.id.clone(),
                component_id: self.comps[component].id.clone(),
                instance_id: job.instance,
                arrival_time: job.arrival,
                start_time: active.since,
                end_time: now,
                deadline: job.deadline,
                missed_deadline: job.missed,
            });
        }

        if job.remaining <= EPS {
            job.finished = true;
            task.responses.push(now - job.arrival);
            debug!(
                task = %task.id,
                instance = job.instance,
                response = now - job.arrival,
                "job completed"
            );
        } else {
            self.comps[component].ready.push(active.job);
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Select and start the next job, if the slot is free.
    ///
    /// An active job keeps the core — supply revocation is the only
    /// preemption source, and [`Self::on_supply_end`] has already cleared
    /// the slot when that happened.
    fn dispatch(&mut self, now: f64) {
        if self.active.is_some() {
            return;
        }
        let Some(job_idx) = self.pick(0) else {
            return;
        };

        let component = self.tasks[self.jobs[job_idx].task].component;
        let ready = &mut self.comps[component].ready;
        let pos = ready
            .iter()
            .position(|&j| j == job_idx)
            .expect("picked job must be queued");
        ready.swap_remove(pos);

        let token = self.next_token;
        self.next_token += 1;
        self.active = Some(Active {
            job: job_idx,
            since: now,
            token,
        });
        self.queue
            .push(now + self.jobs[job_idx].remaining, EventKind::Completion { token });
    }

    /// Root-down arbitration: the best pending job in `component`'s
    /// subtree, or `None` when the subtree has nothing eligible.
    ///
    /// The component weighs its own head-of-queue job against each supplied
    /// child's pick, under its own discipline — nested scheduling in its
    /// recursive form.
    fn pick(&self, component: usize) -> Option<usize> {
        let node = &self.comps[component];
        if !node.available {
            return None;
        }

        let mut best: Option<usize> = None;
        for &job in &node.ready {
            best = Some(match best {
                None => job,
                Some(b) if self.precedes(node.discipline, job, b) => job,
                Some(b) => b,
            });
        }
        for &child in &node.children {
            if let Some(job) = self.pick(child) {
                best = Some(match best {
                    None => job,
                    Some(b) if self.precedes(node.discipline, job, b) => job,
                    Some(b) => b,
                });
            }
        }
        best
    }

    /// Strict scheduling order between two jobs under a discipline.
    /// Deterministic: ties fall through to task id, then instance.
    fn precedes(&self, discipline: Discipline, a: usize, b: usize) -> bool {
        let (ja, jb) = (&self.jobs[a], &self.jobs[b]);
        let (ta, tb) = (&self.tasks[ja.task], &self.tasks[jb.task]);
        let order = match discipline {
            Discipline::Edf => ja
                .deadline
                .total_cmp(&jb.deadline)
                .then_with(|| ta.id.cmp(&tb.id))
                .then_with(|| ja.instance.cmp(&jb.instance)),
            Discipline::Fps => ta
                .priority
                .cmp(&tb.priority)
                .then_with(|| ta.id.cmp(&tb.id))
                .then_with(|| ja.instance.cmp(&jb.instance)),
        };
        order == std::cmp::Ordering::Less
    }

    // ── Wind-down ─────────────────────────────────────────────────────────────

    /// Charge the in-flight slice up to `end` without completing the job
    /// (unless its remaining work is exhausted exactly there).
    fn finalize(&mut self, end: f64) {
        if let Some(active) = self.active.take() {
            self.stop_job(active, end);
        }
    }

    fn collect(self, end: f64, truncated: bool) -> SubtreeOutcome {
        let denom = end.max(EPS);
        let responses = self
            .tasks
            .iter()
            .map(|t| TaskResponse {
                task_id: t.id.clone(),
                avg: if t.responses.is_empty() {
                    0.0
                } else {
                    t.responses.iter().sum::<f64>() / t.responses.len() as f64
                },
                max: t.responses.iter().copied().fold(0.0, f64::max),
                missed_deadlines: t.missed,
            })
            .collect();
        let utilizations = self
            .comps
            .iter()
            .map(|c| ComponentUtilization {
                component_id: c.id.clone(),
                utilization: c.executed / denom,
                allocated_utilization: c.alpha,
            })
            .collect();

        SubtreeOutcome {
            truncated,
            end,
            responses,
            utilizations,
            logs: self.logs,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
