use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stepflow_core::constants::SCHEMA_VERSION;
use stepflow_core::{BuildArgs, Edge, ExportMode, ImportError, Next, StepKind, TransitionStatus, TypedSchema, Workflow,
                    WorkflowError, WorkflowOptions};

#[derive(Clone)]
struct Api {
    next: Next<Api>,
    input: Value,
}

fn api(args: &BuildArgs<Api>) -> Result<Api, WorkflowError> {
    Ok(Api { next: args.next(),
             input: args.input().clone() })
}

fn active(wf: &Workflow<Api>) -> Api {
    wf.current_step().state().cloned().expect("step should be active")
}

#[derive(Serialize, Deserialize)]
struct Greeting {
    greeting: String,
}

fn inventory() -> Vec<StepKind<Api>> {
    vec![StepKind::builder("Emitter").build(api),
         StepKind::builder("Even").build(api),
         StepKind::builder("Odd").build(api),
         StepKind::builder("Counter").store(|| json!({ "count": 0 })).build(api),
         StepKind::builder("Greeter").config_schema(TypedSchema::<Greeting>::new()).build(api)]
}

/// Emitter --even/odd--> Even/Odd, Even -> Counter -> Greeter
fn sample() -> Workflow<Api> {
    let kinds = inventory();
    let wf = Workflow::with_options(kinds.clone(), WorkflowOptions::without_library_version()).expect("inventory");
    let emitter = kinds[0].named("emitter").expect("emitter");
    let even = kinds[1].named("even").expect("even");
    let odd = kinds[2].named("odd").expect("odd");
    let counter = kinds[3].named("counter").expect("counter");
    let greeter = kinds[4].configured(Some("hi"), json!({ "greeting": "hola" })).expect("greeter");
    wf.register([emitter.clone(), even.clone(), odd.clone(), counter.clone(), greeter.clone()])
      .expect("register");
    wf.connect_edge(Edge::conditional(&emitter, &even, "out % 2 === 0").expect("edge")).expect("connect");
    wf.connect_edge(Edge::conditional(&emitter, &odd, "out % 2 !== 0").expect("edge")).expect("connect");
    wf.connect_edge(Edge::transform(&even, &counter, "{ value: out }").expect("edge").unidirectional())
      .expect("connect");
    wf.connect(&counter, &greeter, false).expect("connect");
    wf
}

#[test]
fn basic_export_lists_graph() {
    let wf = sample();
    let basic = wf.export_value(ExportMode::Basic);
    assert_eq!(basic["format"], json!("stepflow/basic"));
    assert_eq!(basic["schemaVersion"], json!(SCHEMA_VERSION));
    assert_eq!(basic["inventoryKinds"], json!(["Emitter", "Even", "Odd", "Counter", "Greeter"]));
    assert_eq!(basic["nodes"][4], json!({ "id": "Greeter_hi", "kind": "Greeter", "name": "hi", "config": { "greeting": "hola" } }));
    assert_eq!(basic["edges"],
               json!([
                   { "kind": "conditional", "from": "Emitter_emitter", "to": "Even_even", "unidirectional": false, "expr": "out % 2 === 0" },
                   { "kind": "conditional", "from": "Emitter_emitter", "to": "Odd_odd", "unidirectional": false, "expr": "out % 2 !== 0" },
                   { "kind": "transform", "from": "Even_even", "to": "Counter_counter", "unidirectional": true, "expr": "{ value: out }" },
                   { "kind": "default", "from": "Counter_counter", "to": "Greeter_hi", "unidirectional": false }
               ]));
    assert!(basic.get("state").is_none());
    assert!(basic.get("libraryVersion").is_none());
}

#[test]
fn full_export_round_trips_into_a_fresh_runtime() {
    let wf = sample();
    let emitter = wf.node("Emitter_emitter").expect("emitter");
    wf.start(&emitter).expect("start");
    active(&wf).next.call(json!(4)).expect("to even");
    active(&wf).next.call(json!(4)).expect("to counter");
    let counter_store = wf.node("Counter_counter").and_then(|n| n.store()).expect("store");
    counter_store.set_state(json!({ "count": 7 }));

    let full = wf.export_value(ExportMode::Full);
    assert_eq!(full["state"]["current"], json!({ "nodeId": "Counter_counter", "status": "ready", "input": { "value": 4 } }));
    assert_eq!(full["state"]["history"],
               json!([{ "nodeId": "Emitter_emitter", "input": null }, { "nodeId": "Even_even", "input": 4 }]));
    assert_eq!(full["state"]["stores"], json!({ "Counter_counter": { "count": 7 } }));

    let fresh = Workflow::with_options(inventory(), WorkflowOptions::without_library_version()).expect("inventory");
    fresh.import(ExportMode::Full, &full).expect("import");
    assert_eq!(fresh.export_value(ExportMode::Full), full);
    assert_eq!(fresh.definition_hash(), wf.definition_hash());
    assert_eq!(active(&fresh).input, json!({ "value": 4 }));

    // el historial importado permite volver atrás (salvo por edges unidireccionales)
    let err = fresh.back().expect_err("even -> counter is unidirectional");
    assert!(matches!(err, WorkflowError::UnidirectionalBack { .. }));
}

#[test]
fn basic_import_resets_to_not_started() {
    let wf = sample();
    let emitter = wf.node("Emitter_emitter").expect("emitter");
    wf.start(&emitter).expect("start");
    let basic = wf.export_value(ExportMode::Basic);

    let other = Workflow::new(inventory()).expect("inventory");
    let lonely = inventory()[2].named("lonely").expect("odd");
    other.register([lonely.clone()]).expect("register");
    other.start(&lonely).expect("start");

    other.import(ExportMode::Basic, &basic).expect("import");
    assert_eq!(other.current_step().status(), TransitionStatus::NotStarted);
    assert_eq!(other.nodes().len(), 5);
    assert!(other.node("Odd_lonely").is_none());
    assert_eq!(other.edges().len(), 4);
}

#[test]
fn rejected_imports_leave_the_runtime_untouched() {
    let wf = sample();
    let emitter = wf.node("Emitter_emitter").expect("emitter");
    wf.start(&emitter).expect("start");
    active(&wf).next.call(json!(2)).expect("to even");
    let before_basic = wf.export_value(ExportMode::Basic);
    let before_full = wf.export_value(ExportMode::Full);

    let mut bad_edge = before_basic.clone();
    bad_edge["edges"][0]["to"] = json!("Nope_nope");
    let err = wf.import(ExportMode::Basic, &bad_edge).expect_err("unknown node in edge");
    assert_eq!(err,
               WorkflowError::Import(ImportError::UnknownEdgeNode { from: "Emitter_emitter".to_string(),
                                                                    to: "Nope_nope".to_string() }));

    let mut cases: Vec<(ExportMode, Value)> = Vec::new();
    let mut v = before_basic.clone();
    v["schemaVersion"] = json!("2.0.0");
    cases.push((ExportMode::Basic, v));
    cases.push((ExportMode::Full, before_basic.clone()));
    let mut v = before_basic.clone();
    v["inventoryKinds"] = json!(["Emitter", "Ghost"]);
    cases.push((ExportMode::Basic, v));
    let mut v = before_basic.clone();
    v["nodes"][0]["id"] = json!("Emitter_other");
    cases.push((ExportMode::Basic, v));
    let mut v = before_basic.clone();
    v["nodes"][4]["config"] = json!({ "greeting": 3 });
    cases.push((ExportMode::Basic, v));
    let mut v = before_basic.clone();
    v["edges"][1]["kind"] = json!("priority");
    cases.push((ExportMode::Basic, v));
    let mut v = before_basic.clone();
    v["edges"][1]["expr"] = json!("out +");
    cases.push((ExportMode::Basic, v));
    let mut v = before_full.clone();
    v["state"]["stores"]["Even_even"] = json!({});
    cases.push((ExportMode::Full, v));
    let mut v = before_full.clone();
    v["state"]["history"][0]["nodeId"] = json!("Ghost_ghost");
    cases.push((ExportMode::Full, v));
    let mut v = before_full.clone();
    v["state"]["current"]["nodeId"] = json!("Ghost_ghost");
    cases.push((ExportMode::Full, v));
    cases.push((ExportMode::Basic, json!({ "format": "stepflow/basic" })));

    for (mode, payload) in cases {
        assert!(wf.import(mode, &payload).is_err(), "payload should be rejected: {payload}");
        assert_eq!(wf.export_value(ExportMode::Basic), before_basic);
        assert_eq!(wf.export_value(ExportMode::Full), before_full);
    }
    assert_eq!(wf.current_step().kind(), Some("Even"));
}

#[test]
fn failing_reentry_restores_previous_state() {
    let flaky = StepKind::builder("Flaky").build(|args: &BuildArgs<Api>| {
                                              if args.input() == &json!("boom") {
                                                  return Err(WorkflowError::build("Flaky", "cannot enter"));
                                              }
                                              api(args)
                                          });
    let counter = StepKind::builder("Counter").store(|| json!({ "count": 0 })).build(api);
    let wf = Workflow::new(vec![flaky.clone(), counter.clone()]).expect("inventory");
    let f1 = flaky.instance().expect("flaky");
    let c1 = counter.instance().expect("counter");
    wf.register([f1.clone(), c1.clone()]).expect("register");
    wf.connect(&c1, &f1, false).expect("connect");
    wf.start(&c1).expect("start");
    c1.store().expect("store").set_state(json!({ "count": 5 }));
    let before = wf.export_value(ExportMode::Full);

    let mut payload = before.clone();
    payload["state"]["current"] = json!({ "nodeId": "Flaky_default", "status": "ready", "input": "boom" });
    let err = wf.import(ExportMode::Full, &payload).expect_err("re-entry fails");
    assert!(matches!(err, WorkflowError::Import(ImportError::Restore { ref id, .. }) if id == "Flaky_default"));

    assert_eq!(wf.export_value(ExportMode::Full), before);
    assert_eq!(wf.current_step().kind(), Some("Counter"));
    assert_eq!(wf.current_step().status(), TransitionStatus::Ready);
}

#[test]
fn deeply_nested_edge_expression_is_rejected_on_import() {
    let wf = sample();
    let emitter = wf.node("Emitter_emitter").expect("emitter");
    wf.start(&emitter).expect("start");
    let before = wf.export_value(ExportMode::Basic);

    let mut payload = before.clone();
    payload["edges"][0]["expr"] = json!(format!("{}out{}", "(".repeat(200_000), ")".repeat(200_000)));
    let err = wf.import(ExportMode::Basic, &payload).expect_err("nesting limit");
    assert!(matches!(err, WorkflowError::Import(ImportError::Expression(_))));
    assert_eq!(wf.export_value(ExportMode::Basic), before);
    assert_eq!(wf.current_step().kind(), Some("Emitter"));
}

#[test]
fn typed_snapshots_import_in_their_own_mode() {
    let wf = sample();
    let emitter = wf.node("Emitter_emitter").expect("emitter");
    wf.start(&emitter).expect("start");
    active(&wf).next.call(json!(3)).expect("to odd");
    let full = wf.export(ExportMode::Full);

    let fresh = Workflow::with_options(inventory(), WorkflowOptions::without_library_version()).expect("inventory");
    fresh.import_snapshot(&full).expect("full snapshot");
    assert_eq!(fresh.current_step().kind(), Some("Odd"));
    assert_eq!(fresh.history_len(), 1);

    fresh.import_snapshot(&wf.export(ExportMode::Basic)).expect("basic snapshot");
    assert!(!fresh.current_step().is_started());
    assert_eq!(fresh.history_len(), 0);
}
