//! Demo `main-core`: onboarding con un step compuesto, navegación hacia
//! atrás y round-trip de snapshot completo.

use serde::{Deserialize, Serialize};
use serde_json::{json, to_string_pretty, Value};
use stepflow_rust::prelude::*;

#[derive(Clone)]
enum OnboardingApi {
    Step { next: Next<OnboardingApi>, input: Value },
    Signup(CompoundApi<OnboardingApi>),
}

impl OnboardingApi {
    fn submit(&self, output: Value) -> Result<(), WorkflowError> {
        match self {
            OnboardingApi::Step { next, .. } => next.call(output),
            OnboardingApi::Signup(inner) => match inner.inner_state() {
                Some(step) => step.submit(output),
                None => Err(WorkflowError::IncompleteCompound("Signup".into())),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Email {
    email: String,
}

#[derive(Serialize, Deserialize)]
struct Confirmed {
    email: String,
    confirmed: bool,
}

fn step(args: &BuildArgs<OnboardingApi>) -> Result<OnboardingApi, WorkflowError> {
    Ok(OnboardingApi::Step { next: args.next(),
                             input: args.input().clone() })
}

fn onboarding() -> Result<(Workflow<OnboardingApi>, StepInstance<OnboardingApi>), WorkflowError> {
    let collect = StepKind::builder("CollectEmail").output_schema(TypedSchema::<Email>::new()).build(step);
    let confirm = StepKind::builder("ConfirmEmail").input_schema(TypedSchema::<Email>::new())
                                                   .output_schema(TypedSchema::<Confirmed>::new())
                                                   .build(step);
    let c = collect.instance()?;
    let k = confirm.instance()?;
    let signup = CompoundStep::new("Signup", vec![collect, confirm]).register([c.clone(), k.clone()])
                                                                    .connect(&c, &k, false)
                                                                    .entry(&c)
                                                                    .exit(&k)
                                                                    .into_kind(OnboardingApi::Signup);
    let welcome = StepKind::builder("Welcome").build(step);
    let done = StepKind::builder("Done").input_schema(TypedSchema::<Confirmed>::new()).build(step);

    let wf = Workflow::new(vec![welcome.clone(), signup.clone(), done.clone()])?;
    let (w, s, d) = (welcome.instance()?, signup.instance()?, done.instance()?);
    wf.register([w.clone(), s.clone(), d.clone()])?
      .connect(&w, &s, false)?
      .connect_edge(Edge::transform(&s, &d, "{ ...out, confirmed: out.confirmed && out.email !== '' }")?)?;
    Ok((wf, w))
}

fn print_current(label: &str, wf: &Workflow<OnboardingApi>) {
    let current = wf.current_step();
    println!("[{label}] kind={:?} name={:?} status={}", current.kind(), current.name(), current.status());
}

fn active(wf: &Workflow<OnboardingApi>) -> Result<OnboardingApi, &'static str> {
    wf.current_step().state().cloned().ok_or("no active step")
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (wf, welcome) = onboarding()?;
    let _unsubscribe = wf.subscribe(|kind, name, status| println!("  · {kind}/{name} -> {status}"));

    wf.start(&welcome)?;
    print_current("start", &wf);
    active(&wf)?.submit(json!({}))?;
    print_current("signup", &wf);

    active(&wf)?.submit(json!({ "email": "ada@example.com" }))?;
    active(&wf)?.submit(json!({ "email": "ada@example.com", "confirmed": true }))?;
    print_current("done", &wf);

    wf.back()?;
    print_current("back", &wf);
    active(&wf)?.submit(json!({ "email": "ada@example.com" }))?;
    active(&wf)?.submit(json!({ "email": "ada@example.com", "confirmed": true }))?;

    let snapshot = wf.export_value(ExportMode::Full);
    println!("[export] {}", to_string_pretty(&snapshot).unwrap_or_default());

    let (restored, _) = onboarding()?;
    restored.import(ExportMode::Full, &snapshot)?;
    print_current("import", &restored);
    println!("[hash] original={} restored={}", wf.definition_hash(), restored.definition_hash());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("[main-core] error: {e}");
        std::process::exit(1);
    }
}
