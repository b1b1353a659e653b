use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stepflow_core::{BuildArgs, Edge, Next, StepKind, TypedSchema, Workflow, WorkflowError};

#[derive(Clone)]
struct Api {
    next: Next<Api>,
    input: Value,
}

impl Api {
    fn go(&self, output: Value) -> Result<(), WorkflowError> {
        self.next.call(output)
    }
}

fn api(args: &BuildArgs<Api>) -> Result<Api, WorkflowError> {
    Ok(Api { next: args.next(),
             input: args.input().clone() })
}

fn active(wf: &Workflow<Api>) -> Api {
    wf.current_step().state().cloned().expect("step should be active")
}

#[test]
fn default_edge_passes_output_through() {
    let a = StepKind::builder("A").build(api);
    let b = StepKind::builder("B").build(api);
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register").connect(&a1, &b1, false).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(42)).expect("go");

    let current = wf.current_step();
    assert_eq!(current.kind(), Some("B"));
    assert_eq!(active(&wf).input, json!(42));
    assert_eq!(wf.history_len(), 1);
}

#[test]
fn conditional_edges_route_even_and_odd() {
    let emitter = StepKind::builder("Emitter").build(api);
    let even = StepKind::builder("Even").build(api);
    let odd = StepKind::builder("Odd").build(api);
    let wf = Workflow::new(vec![emitter.clone(), even.clone(), odd.clone()]).expect("inventory");
    let e1 = emitter.instance().expect("emitter");
    let even1 = even.instance().expect("even");
    let odd1 = odd.instance().expect("odd");
    wf.register([e1.clone(), even1.clone(), odd1.clone()]).expect("register");
    wf.connect_edge(Edge::conditional(&e1, &even1, "out % 2 == 0").expect("even edge")).expect("connect");
    wf.connect_edge(Edge::conditional(&e1, &odd1, "out % 2 != 0").expect("odd edge")).expect("connect");

    wf.start(&e1).expect("start");
    active(&wf).go(json!(3)).expect("emit 3");
    assert_eq!(wf.current_step().kind(), Some("Odd"));

    wf.back().expect("back to emitter");
    active(&wf).go(json!(2)).expect("emit 2");
    assert_eq!(wf.current_step().kind(), Some("Even"));
    assert_eq!(active(&wf).input, json!(2));
}

#[test]
fn first_matching_edge_wins() {
    let src = StepKind::builder("Src").build(api);
    let dst = StepKind::builder("Dst").build(api);
    let wf = Workflow::new(vec![src.clone(), dst.clone()]).expect("inventory");
    let s1 = src.instance().expect("src");
    let first = dst.named("first").expect("first");
    let second = dst.named("second").expect("second");
    wf.register([s1.clone(), first.clone(), second.clone()]).expect("register");
    wf.connect_edge(Edge::conditional(&s1, &first, "out > 0").expect("edge")).expect("connect");
    wf.connect_edge(Edge::conditional(&s1, &second, "out > 0").expect("edge")).expect("connect");

    wf.start(&s1).expect("start");
    active(&wf).go(json!(5)).expect("go");
    assert_eq!(wf.current_step().name(), Some("first"));
}

#[test]
fn unidirectional_edge_blocks_back() {
    let a = StepKind::builder("A").build(api);
    let b = StepKind::builder("B").build(api);
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect(&a1, &b1, true).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(null)).expect("go");
    let err = wf.back().expect_err("back across a unidirectional edge");
    assert_eq!(err.to_string(),
               "back navigation is not allowed: edge from 'A_default' to 'B_default' is unidirectional");
    // nada cambió
    assert_eq!(wf.current_step().kind(), Some("B"));
    assert_eq!(wf.history_len(), 1);
}

#[derive(Serialize, Deserialize)]
struct Person {
    name: String,
    age: u32,
}

#[derive(Serialize, Deserialize)]
struct Account {
    username: String,
    years: u32,
}

#[test]
fn transform_edge_reshapes_output_and_validates_target_input() {
    let a = StepKind::builder("A").output_schema(TypedSchema::<Person>::new()).build(api);
    let b = StepKind::builder("B").input_schema(TypedSchema::<Account>::new()).build(api);
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect_edge(Edge::transform(&a1, &b1, "{ username: out.name, years: out.age }").expect("edge"))
      .expect("connect");

    wf.start(&a1).expect("start");
    let err = active(&wf).go(json!({"name": "ada"})).expect_err("missing age");
    assert!(matches!(err, WorkflowError::Validation { .. }), "unexpected error: {err}");

    active(&wf).go(json!({"name": "ada", "age": 36})).expect("go");
    assert_eq!(active(&wf).input, json!({"username": "ada", "years": 36}));
}

#[test]
fn transform_edge_failure_propagates_from_next() {
    let a = StepKind::builder("A").build(api);
    let b = StepKind::builder("B").build(api);
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect_edge(Edge::transform(&a1, &b1, "out.missing").expect("edge")).expect("connect");

    wf.start(&a1).expect("start");
    let err = active(&wf).go(json!({})).expect_err("undefined transform result");
    assert_eq!(err.to_string(),
               "transform edge failed to convert output -> input. Reason: result is undefined");
    assert_eq!(wf.current_step().kind(), Some("A"));
}

#[test]
fn invalid_config_fails_at_instantiation() {
    #[derive(Serialize, Deserialize)]
    struct Prompt {
        prompt: String,
    }
    let ask = StepKind::builder("Ask").config_schema(TypedSchema::<Prompt>::new())
                                      .build(|args: &BuildArgs<Value>| Ok(args.config().cloned().unwrap_or(Value::Null)));
    assert!(ask.configured(Some("bad"), json!({"prompt": 1})).is_err());

    let good = ask.configured(Some("good"), json!({"prompt": "email?", "extra": true})).expect("valid config");
    assert_eq!(good.config(), Some(&json!({"prompt": "email?"})));

    let plain = StepKind::builder("Plain").build(|_: &BuildArgs<Value>| Ok(Value::Null));
    let p = plain.create(None, Some(json!({"ignored": 1}))).expect("no config schema");
    assert_eq!(p.config(), None);
    assert_eq!(p.id(), "Plain_default");
}
