use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use stepflow_core::{deferred, BuildArgs, Cleanup, CleanupResolver, HookOutcome, Next, SharedStore, StepKind, TransitionStatus, Workflow,
                    WorkflowError};

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Clone)]
struct Api {
    next: Next<Api>,
    input: Value,
    store: Option<SharedStore>,
}

impl Api {
    fn go(&self, output: Value) -> Result<(), WorkflowError> {
        self.next.call(output)
    }

    fn inc(&self) {
        let store = self.store.as_ref().expect("step has a store");
        let count = store.get_state()["count"].as_i64().unwrap_or(0);
        store.set_state(json!({ "count": count + 1 }));
    }
}

fn api(args: &BuildArgs<Api>) -> Api {
    Api { next: args.next(),
          input: args.input().clone(),
          store: args.store() }
}

fn active(wf: &Workflow<Api>) -> Api {
    wf.current_step().state().cloned().expect("step should be active")
}

fn count(log: &Log, entry: &str) -> usize {
    log.borrow().iter().filter(|l| l.as_str() == entry).count()
}

fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

#[test]
fn forward_and_back_run_cleanups_at_the_right_time() {
    let log: Log = Rc::default();

    let la = log.clone();
    let a = StepKind::builder("A").build(move |args: &BuildArgs<Api>| {
                                      let (l1, l2, l3) = (la.clone(), la.clone(), la.clone());
                                      args.transition_in(move || {
                                              push(&l1, "A_in");
                                              HookOutcome::cleanup(move || push(&l1, "A_in_cleanup"))
                                          });
                                      args.transition_out(move || {
                                              push(&l2, "A_out");
                                              HookOutcome::cleanup(move || push(&l2, "A_out_cleanup"))
                                          });
                                      args.effect(None, move || {
                                              push(&l3, "A_effect");
                                              Some(Box::new(move || push(&l3, "A_effect_cleanup")) as Cleanup)
                                          });
                                      Ok(api(args))
                                  });
    let lb = log.clone();
    let b = StepKind::builder("B").build(move |args: &BuildArgs<Api>| {
                                      let (l1, l2, l3) = (lb.clone(), lb.clone(), lb.clone());
                                      let input = args.input().clone();
                                      args.transition_in(move || {
                                              push(&l1, format!("B_in:{input}"));
                                              HookOutcome::cleanup(move || push(&l1, "B_in_cleanup"))
                                          });
                                      args.transition_out(move || push(&l2, "B_out"));
                                      args.effect(None, move || {
                                              push(&l3, "B_effect");
                                              Some(Box::new(move || push(&l3, "B_effect_cleanup")) as Cleanup)
                                          });
                                      Ok(api(args))
                                  });

    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect(&a1, &b1, false).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(42)).expect("a -> b");
    assert_eq!(count(&log, "A_out_cleanup"), 0, "out cleanups wait for back()");
    wf.back().expect("back");
    assert_eq!(count(&log, "A_out_cleanup"), 1);
    active(&wf).go(json!(42)).expect("a -> b again");

    assert_eq!(wf.current_step().status(), TransitionStatus::Ready);
    assert_eq!(count(&log, "A_out"), 2);
    assert_eq!(count(&log, "A_in_cleanup"), 2);
    assert_eq!(count(&log, "A_effect_cleanup"), 2);
    assert_eq!(count(&log, "B_in:42"), 2);
    assert_eq!(count(&log, "B_out"), 1);
    assert_eq!(count(&log, "B_in_cleanup"), 1);
    assert_eq!(count(&log, "B_effect_cleanup"), 1);
}

#[test]
fn panicking_cleanups_do_not_break_navigation() {
    let log: Log = Rc::default();
    let la = log.clone();
    let a = StepKind::builder("A").build(move |args: &BuildArgs<Api>| {
                                      let l = la.clone();
                                      args.transition_out(move || {
                                              HookOutcome::cleanup(move || {
                                                  push(&l, "A_out_cleanup");
                                                  panic!("out cleanup error");
                                              })
                                          });
                                      Ok(api(args))
                                  });
    let b = StepKind::builder("B").build(|args: &BuildArgs<Api>| Ok(api(args)));
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect(&a1, &b1, false).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(1)).expect("go");
    wf.back().expect("back survives a panicking cleanup");
    assert_eq!(count(&log, "A_out_cleanup"), 1);
    assert_eq!(wf.current_step().kind(), Some("A"));
}

#[test]
fn deferred_in_cleanup_resolving_after_exit_runs_immediately() {
    let log: Log = Rc::default();
    let resolvers: Rc<RefCell<Vec<CleanupResolver>>> = Rc::default();

    let r = resolvers.clone();
    let a = StepKind::builder("A").build(move |args: &BuildArgs<Api>| {
                                      let r = r.clone();
                                      args.transition_in(move || {
                                              let (cleanup, resolver) = deferred();
                                              r.borrow_mut().push(resolver);
                                              cleanup
                                          });
                                      Ok(api(args))
                                  });
    let b = StepKind::builder("B").build(|args: &BuildArgs<Api>| Ok(api(args)));
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect(&a1, &b1, false).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(1)).expect("leave A before the cleanup arrives");
    let late = resolvers.borrow_mut().pop().expect("resolver");
    let l = log.clone();
    late.resolve_with(move || push(&l, "late_cleanup"));
    assert_eq!(count(&log, "late_cleanup"), 1, "stale cleanup runs at resolution");

    // vuelta a A: el cleanup en tiempo se guarda y corre al salir
    wf.back().expect("back");
    let timely = resolvers.borrow_mut().pop().expect("resolver");
    let l = log.clone();
    timely.resolve_with(move || push(&l, "timely_cleanup"));
    assert_eq!(count(&log, "timely_cleanup"), 0);
    active(&wf).go(json!(2)).expect("leave A again");
    assert_eq!(count(&log, "timely_cleanup"), 1);
}

#[test]
fn deferred_out_cleanup_runs_on_back_entry_or_immediately_after() {
    let log: Log = Rc::default();
    let resolvers: Rc<RefCell<Vec<CleanupResolver>>> = Rc::default();

    let r = resolvers.clone();
    let a = StepKind::builder("A").build(move |args: &BuildArgs<Api>| {
                                      let r = r.clone();
                                      args.transition_out(move || {
                                              let (cleanup, resolver) = deferred();
                                              r.borrow_mut().push(resolver);
                                              cleanup
                                          });
                                      Ok(api(args))
                                  });
    let b = StepKind::builder("B").build(|args: &BuildArgs<Api>| Ok(api(args)));
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect(&a1, &b1, false).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(1)).expect("go");
    wf.back().expect("back before resolution");

    let resolver = resolvers.borrow_mut().pop().expect("resolver");
    let l = log.clone();
    resolver.resolve_with(move || push(&l, "out_cleanup"));
    assert_eq!(count(&log, "out_cleanup"), 1, "bucket already executed");

    // un rechazo se registra como warning y no interrumpe nada
    active(&wf).go(json!(2)).expect("go again");
    resolvers.borrow_mut().pop().expect("resolver").reject("network down");
    wf.back().expect("back after rejection");
    assert_eq!(wf.current_step().kind(), Some("A"));
}

#[test]
fn restarting_runs_out_cleanups_no_back_can_reach() {
    let log: Log = Rc::default();
    let resolvers: Rc<RefCell<Vec<CleanupResolver>>> = Rc::default();

    let la = log.clone();
    let a = StepKind::builder("A").build(move |args: &BuildArgs<Api>| {
                                      let l = la.clone();
                                      args.transition_out(move || HookOutcome::cleanup(move || push(&l, "A_out_cleanup")));
                                      Ok(api(args))
                                  });
    let r = resolvers.clone();
    let b = StepKind::builder("B").build(move |args: &BuildArgs<Api>| {
                                      let r = r.clone();
                                      args.transition_out(move || {
                                              let (cleanup, resolver) = deferred();
                                              r.borrow_mut().push(resolver);
                                              cleanup
                                          });
                                      Ok(api(args))
                                  });
    let wf = Workflow::new(vec![a.clone(), b.clone()]).expect("inventory");
    let a1 = a.instance().expect("a");
    let b1 = b.instance().expect("b");
    wf.register([a1.clone(), b1.clone()]).expect("register");
    wf.connect(&a1, &b1, false).expect("connect");

    wf.start(&a1).expect("start");
    active(&wf).go(json!(1)).expect("go");
    assert_eq!(count(&log, "A_out_cleanup"), 0, "kept for back()");

    wf.start(&a1).expect("restart while B is active");
    assert_eq!(count(&log, "A_out_cleanup"), 1, "history dropped by the restart");
    assert_eq!(wf.history_len(), 0);

    let l = log.clone();
    resolvers.borrow_mut().pop().expect("resolver").resolve_with(move || push(&l, "B_out_cleanup"));
    assert_eq!(count(&log, "B_out_cleanup"), 1, "B can no longer be re-entered by back()");
}

#[test]
fn store_changes_rebuild_in_place_and_diff_effects() {
    let log: Log = Rc::default();
    let l = log.clone();
    let counter = StepKind::builder("Counter").store(|| json!({ "count": 0 }))
                                              .build(move |args: &BuildArgs<Api>| {
                                                  let count = args.store_state().unwrap_or(Value::Null)["count"].clone();
                                                  let (once, always, dep, hook) = (l.clone(), l.clone(), l.clone(), l.clone());
                                                  args.transition_in(move || push(&hook, "in"));
                                                  args.effect(Some(vec![]), move || {
                                                          push(&once, "once");
                                                          None
                                                      });
                                                  args.effect(None, move || {
                                                          push(&always, "always");
                                                          None
                                                      });
                                                  let seen = count.clone();
                                                  args.effect(Some(vec![count]), move || {
                                                          push(&dep, format!("dep:{seen}"));
                                                          None
                                                      });
                                                  Ok(api(args))
                                              });

    let wf = Workflow::new(vec![counter.clone()]).expect("inventory");
    let c1 = counter.named("first").expect("counter");
    wf.register([c1.clone()]).expect("register");
    let statuses = Rc::new(RefCell::new(Vec::new()));
    let s = statuses.clone();
    let _unsubscribe = wf.subscribe(move |_, _, status| s.borrow_mut().push(status));
    wf.start(&c1).expect("start");

    for _ in 0..3 {
        active(&wf).inc();
    }

    assert_eq!(count(&log, "in"), 1, "enter hooks never re-run on rebuild");
    assert_eq!(count(&log, "once"), 1);
    assert_eq!(count(&log, "always"), 4);
    assert_eq!(log.borrow().iter().filter(|l| l.starts_with("dep:")).cloned().collect::<Vec<_>>(),
               vec!["dep:0", "dep:1", "dep:2", "dep:3"]);
    assert_eq!(*statuses.borrow(),
               vec![TransitionStatus::TransitionIn,
                    TransitionStatus::Ready,
                    TransitionStatus::Ready,
                    TransitionStatus::Ready,
                    TransitionStatus::Ready]);
    assert_eq!(wf.store_states().get("Counter_first"), Some(&json!({ "count": 3 })));
}

#[test]
fn leaving_a_step_unsubscribes_from_its_store() {
    let builds = Rc::new(RefCell::new(0));
    let b_count = builds.clone();
    let counter = StepKind::builder("Counter").store(|| json!({ "count": 0 }))
                                              .build(move |args: &BuildArgs<Api>| {
                                                  *b_count.borrow_mut() += 1;
                                                  Ok(api(args))
                                              });
    let done = StepKind::builder("Done").build(|args: &BuildArgs<Api>| Ok(api(args)));
    let wf = Workflow::new(vec![counter.clone(), done.clone()]).expect("inventory");
    let c1 = counter.instance().expect("counter");
    let d1 = done.instance().expect("done");
    wf.register([c1.clone(), d1.clone()]).expect("register");
    wf.connect(&c1, &d1, false).expect("connect");
    wf.start(&c1).expect("start");

    let held = active(&wf);
    held.inc();
    assert_eq!(*builds.borrow(), 2);
    held.go(json!(null)).expect("leave counter");
    held.inc();
    assert_eq!(*builds.borrow(), 2, "no rebuild once the step is left");
    assert_eq!(active(&wf).input, Value::Null);
}

#[test]
fn rebuild_replaces_out_hooks() {
    let log: Log = Rc::default();
    let l = log.clone();
    let counter = StepKind::builder("Counter").store(|| json!({ "count": 0 }))
                                              .build(move |args: &BuildArgs<Api>| {
                                                  let n = args.store_state().unwrap_or(Value::Null)["count"].clone();
                                                  let out = l.clone();
                                                  args.transition_out(move || push(&out, format!("out:{n}")));
                                                  Ok(api(args))
                                              });
    let done = StepKind::builder("Done").build(|args: &BuildArgs<Api>| Ok(api(args)));
    let wf = Workflow::new(vec![counter.clone(), done.clone()]).expect("inventory");
    let c1 = counter.instance().expect("counter");
    let d1 = done.instance().expect("done");
    wf.register([c1.clone(), d1.clone()]).expect("register");
    wf.connect(&c1, &d1, false).expect("connect");
    wf.start(&c1).expect("start");

    active(&wf).inc();
    active(&wf).inc();
    active(&wf).go(json!(null)).expect("leave");
    assert_eq!(*log.borrow(), vec!["out:2".to_string()]);
}
