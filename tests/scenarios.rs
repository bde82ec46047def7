//! End-to-end scenarios: analysis and simulation of small reference
//! systems with hand-checked expected outcomes.

use hsf_core::analysis::Synthesizer;
use hsf_core::ingest;
use hsf_core::model::{Component, Core, Discipline, SystemModel};
use hsf_core::report::{SimulationResults, TaskResponse};
use hsf_core::sim::simulate;
use hsf_core::task::{ArrivalKind, Task};

// ── Builders ──────────────────────────────────────────────────────────────────

fn periodic(id: &str, wcet: f64, period: f64, deadline: f64) -> Task {
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

fn prioritized(id: &str, priority: i32, wcet: f64, period: f64, deadline: f64) -> Task {
    Task {
        priority: Some(priority),
        ..periodic(id, wcet, period, deadline)
    }
}

fn root(discipline: Discipline, tasks: Vec<Task>) -> Component {
    Component {
        id: "core-1-root".into(),
        name: "root".into(),
        discipline,
        alpha: None,
        delta: None,
        tasks,
        children: vec![],
        core_id: None,
    }
}

fn single_core(factor: f64, root: Component) -> SystemModel {
    SystemModel {
        cores: vec![Core {
            id: "1".into(),
            name: "Core 1".into(),
            performance_factor: factor,
        }],
        roots: vec![root],
    }
}

fn response<'a>(results: &'a SimulationResults, id: &str) -> &'a TaskResponse {
    results
        .task_response_times
        .iter()
        .find(|r| r.task_id == id)
        .unwrap()
}

fn utilization(results: &SimulationResults, id: &str) -> f64 {
    results
        .component_utilizations
        .iter()
        .find(|u| u.component_id == id)
        .unwrap()
        .utilization
}

// ── Scenario 1: feasible EDF root ─────────────────────────────────────────────

#[test]
fn scenario_1_feasible_edf_root() {
    let mut model = single_core(
        1.0,
        root(
            Discipline::Edf,
            vec![periodic("t1", 2.0, 5.0, 5.0), periodic("t2", 2.0, 10.0, 10.0)],
        ),
    );

    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(analysis.is_schedulable);

    let results = simulate(&model, 100.0).unwrap();
    assert_eq!(response(&results, "t1").missed_deadlines, 0);
    assert_eq!(response(&results, "t2").missed_deadlines, 0);
    let u = utilization(&results, "core-1-root");
    assert!((u - 0.6).abs() < 0.02, "utilization = {u}");
}

// ── Scenario 2: full utilization ──────────────────────────────────────────────

#[test]
fn scenario_2_full_utilization_is_still_schedulable() {
    let mut model = single_core(
        1.0,
        root(
            Discipline::Edf,
            vec![periodic("t1", 4.0, 5.0, 5.0), periodic("t2", 2.0, 10.0, 10.0)],
        ),
    );

    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(analysis.is_schedulable, "U = 1.0 exactly fills a dedicated core");
    assert_eq!(analysis.component_interfaces[0].alpha, 1.0);

    let results = simulate(&model, 100.0).unwrap();
    assert_eq!(response(&results, "t1").missed_deadlines, 0);
    assert_eq!(response(&results, "t2").missed_deadlines, 0);
    let u = utilization(&results, "core-1-root");
    assert!((u - 1.0).abs() < 0.02, "utilization = {u}");
}

// ── Scenario 3: performance scaling ───────────────────────────────────────────

#[test]
fn scenario_3_slow_core_scales_wcet() {
    let mut model = single_core(
        0.8,
        root(Discipline::Edf, vec![periodic("t", 4.0, 10.0, 10.0)]),
    );

    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(analysis.is_schedulable);

    let results = simulate(&model, 100.0).unwrap();
    let r = response(&results, "t");
    assert_eq!(r.missed_deadlines, 0);
    assert!((r.max - 5.0).abs() < 1e-6, "scaled WCET must be 5, got {}", r.max);
    let u = utilization(&results, "core-1-root");
    assert!((u - 0.5).abs() < 0.01, "utilization = {u}");
}

// ── Scenario 4: fixed priorities ──────────────────────────────────────────────

#[test]
fn scenario_4_fps_root_response_times() {
    let mut model = single_core(
        1.0,
        root(
            Discipline::Fps,
            vec![
                prioritized("t1", 1, 3.0, 10.0, 10.0),
                prioritized("t2", 2, 6.0, 15.0, 15.0),
            ],
        ),
    );

    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(analysis.is_schedulable);

    let results = simulate(&model, 60.0).unwrap();
    assert_eq!(response(&results, "t1").missed_deadlines, 0);
    assert_eq!(response(&results, "t2").missed_deadlines, 0);
    assert!(response(&results, "t1").max <= 10.0);
    assert!((response(&results, "t2").max - 9.0).abs() < 1e-6);
}

// ── Scenario 5: BDR child with a sporadic task ────────────────────────────────

#[test]
fn scenario_5_bdr_child_through_the_json_contract() {
    let text = r#"{
        "cores": [{ "id": "1", "name": "Core 1", "performanceFactor": 1.0 }],
        "rootComponents": [{
            "id": "core-1-root", "name": "ADAS", "schedulingAlgorithm": "EDF",
            "tasks": [],
            "childComponents": [{
                "id": "aeb", "name": "Emergency brake",
                "schedulingAlgorithm": "EDF",
                "alpha": 0.4, "delta": 50,
                "tasks": [{
                    "id": "t", "name": "Brake check", "type": "sporadic",
                    "wcet": 8, "deadline": 80, "minimumInterArrivalTime": 100
                }]
            }]
        }]
    }"#;
    let mut model = ingest::from_json_str(text).unwrap();

    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(analysis.is_schedulable);
    let child = analysis
        .component_interfaces
        .iter()
        .find(|i| i.component_id == "aeb")
        .unwrap();
    assert_eq!(child.alpha, 0.4);
    assert_eq!(child.delta, 50.0);
    assert!((child.supply_budget.unwrap() - 40.0).abs() < 1e-9);
    assert!((child.supply_period.unwrap() - 100.0).abs() < 1e-9);

    let results = simulate(&model, 1000.0).unwrap();
    assert_eq!(response(&results, "t").missed_deadlines, 0);
    let u = utilization(&results, "aeb");
    // Property: a component never consumes beyond its allocation
    assert!(u <= 0.4 + 1.0 / 1000.0, "child utilization = {u}");
}

// ── Scenario 6: over-subscription of a declared interface ─────────────────────

#[test]
fn scenario_6_oversubscribed_declared_interface() {
    let mut r = root(Discipline::Edf, vec![periodic("t", 8.0, 10.0, 10.0)]);
    r.alpha = Some(0.5);
    r.delta = Some(0.0);
    let mut model = single_core(1.0, r);

    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(!analysis.is_schedulable);
    let iface = &analysis.component_interfaces[0];
    assert!(
        iface.alpha >= 0.8,
        "report must pin the escalated alpha, got {}",
        iface.alpha
    );

    // Without re-synthesis the model keeps its declared half-core and the
    // backlog grows job after job.
    assert_eq!(model.roots[0].alpha, Some(0.5));
    let results = simulate(&model, 100.0).unwrap();
    let r = response(&results, "t");
    assert!(r.missed_deadlines >= 8, "missed = {}", r.missed_deadlines);
    // Never more misses than released jobs: ⌈T / period⌉
    assert!(r.missed_deadlines <= 10);
}

// ── Cross-cutting properties ──────────────────────────────────────────────────

#[test]
fn synthesis_is_idempotent_end_to_end() {
    let build = || {
        let child = Component {
            id: "child".into(),
            name: "child".into(),
            discipline: Discipline::Edf,
            alpha: None,
            delta: None,
            tasks: vec![periodic("c1", 2.0, 10.0, 10.0), periodic("c2", 1.0, 5.0, 5.0)],
            children: vec![],
            core_id: None,
        };
        let mut r = root(Discipline::Edf, vec![periodic("r1", 1.0, 20.0, 20.0)]);
        r.children = vec![child];
        single_core(1.0, r)
    };

    let mut model = build();
    let first = Synthesizer::new().synthesize(&mut model).unwrap();
    let second = Synthesizer::new().synthesize(&mut model).unwrap();

    assert_eq!(first.is_schedulable, second.is_schedulable);
    for (a, b) in first
        .component_interfaces
        .iter()
        .zip(&second.component_interfaces)
    {
        assert_eq!(a.component_id, b.component_id);
        assert!((a.alpha - b.alpha).abs() < 0.1);
        assert!((a.delta - b.delta).abs() < 0.1);
    }
}

#[test]
fn simulation_is_deterministic_end_to_end() {
    let build = || {
        let child = Component {
            id: "child".into(),
            name: "child".into(),
            discipline: Discipline::Fps,
            alpha: Some(0.5),
            delta: Some(4.0),
            tasks: vec![
                prioritized("c1", 1, 1.0, 8.0, 8.0),
                prioritized("c2", 2, 2.0, 16.0, 16.0),
            ],
            children: vec![],
            core_id: None,
        };
        let mut r = root(Discipline::Edf, vec![periodic("r1", 2.0, 12.0, 12.0)]);
        r.children = vec![child];
        single_core(1.0, r)
    };

    let a = simulate(&build(), 500.0).unwrap();
    let b = simulate(&build(), 500.0).unwrap();
    assert_eq!(a.execution_logs, b.execution_logs);
    assert_eq!(a.task_response_times, b.task_response_times);
    assert_eq!(a.component_utilizations, b.component_utilizations);
}

#[test]
fn analysis_results_serialize_to_the_contract() {
    let mut model = single_core(
        1.0,
        root(Discipline::Edf, vec![periodic("t1", 2.0, 5.0, 5.0)]),
    );
    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    let json = serde_json::to_value(&analysis).unwrap();

    assert_eq!(json["isSchedulable"], true);
    assert_eq!(json["componentInterfaces"][0]["componentId"], "core-1-root");
    assert!(json["timestamp"].as_u64().unwrap() > 0);
}

#[test]
fn simulation_results_serialize_to_the_contract() {
    let model = single_core(
        1.0,
        root(Discipline::Edf, vec![periodic("t1", 2.0, 5.0, 5.0)]),
    );
    let results = simulate(&model, 50.0).unwrap();
    let json = serde_json::to_value(&results).unwrap();

    assert_eq!(json["simulationTime"], 50.0);
    assert_eq!(json["taskResponseTimes"][0]["taskId"], "t1");
    let logs = json["executionLogs"].as_array().unwrap();
    assert!(!logs.is_empty());
    assert!(logs[0].get("startTime").is_some());
    assert!(logs[0].get("instanceId").is_some());
}

#[test]
fn csv_table_flows_through_analysis_and_simulation() {
    let mut model = ingest::csv::from_csv_str(
        "Task,BCET,WCET,Period,Deadline\n\
         lane_detect,1,2,5,5\n\
         radar_fuse,1,2,10,10\n",
    );
    let analysis = Synthesizer::new().synthesize(&mut model).unwrap();
    assert!(analysis.is_schedulable);

    let results = simulate(&model, 100.0).unwrap();
    assert_eq!(response(&results, "lane_detect").missed_deadlines, 0);
    assert_eq!(response(&results, "radar_fuse").missed_deadlines, 0);
}
