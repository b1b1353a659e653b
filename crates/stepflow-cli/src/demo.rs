//! Workflow de demostración: un contador con store reactivo que enruta su
//! cuenta a `Even` u `Odd` y termina en `Summary` a través de un edge de
//! transformación.

use log::{debug, info};
use serde_json::{json, Value};
use crate::errors::CliError;
use stepflow_core::{AnySchema, BuildArgs, Edge, HookOutcome, Next, SharedStore, StepInstance, StepKind, Workflow, WorkflowError};

const LOG_TARGET: &str = "stepflow::cli";

/// Capacidades que cada step del demo expone mientras está activo.
#[derive(Clone)]
pub struct DemoApi {
    next: Next<DemoApi>,
    input: Value,
    store: Option<SharedStore>,
}

impl DemoApi {
    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn count(&self) -> i64 {
        self.store.as_ref().and_then(|s| s.get_state().get("count").and_then(Value::as_i64)).unwrap_or(0)
    }

    /// Incrementa el store del step; el runtime reconstruye la API en sitio.
    pub fn increment(&self) {
        if let Some(store) = &self.store {
            let count = self.count();
            store.set_state(json!({ "count": count + 1 }));
        }
    }

    pub fn submit(&self, output: Value) -> Result<(), WorkflowError> {
        self.next.call(output)
    }
}

fn demo_api(args: &BuildArgs<DemoApi>) -> Result<DemoApi, WorkflowError> {
    Ok(DemoApi { next: args.next(),
                 input: args.input().clone(),
                 store: args.store() })
}

/// Nodos del demo en el orden en que se registran.
pub struct DemoGraph {
    pub counter: StepInstance<DemoApi>,
    pub even: StepInstance<DemoApi>,
    pub odd: StepInstance<DemoApi>,
    pub summary: StepInstance<DemoApi>,
}

pub fn inventory() -> Vec<StepKind<DemoApi>> {
    let counter = StepKind::builder("Counter").store(|| json!({ "count": 0 })).build(|args| {
                                                   let name = args.name().to_string();
                                                   args.transition_in(move || {
                                                           info!(target: LOG_TARGET, "enter counter={name}");
                                                           let leaving = name.clone();
                                                           HookOutcome::cleanup(move || debug!(target: LOG_TARGET, "counter:cleanup name={leaving}"))
                                                       });
                                                   let count = args.store_state().and_then(|s| s.get("count").cloned()).unwrap_or(Value::Null);
                                                   args.effect(Some(vec![count.clone()]), move || {
                                                           debug!(target: LOG_TARGET, "counter:effect count={count}");
                                                           None
                                                       });
                                                   demo_api(args)
                                               });
    let even = StepKind::builder("Even").build(demo_api);
    let odd = StepKind::builder("Odd").build(demo_api);
    // acepta cualquier proyección que produzcan los edges de transformación
    let summary = StepKind::builder("Summary").input_schema(AnySchema).build(demo_api);
    vec![counter, even, odd, summary]
}

/// Construye el workflow del demo sin arrancarlo.
pub fn build() -> Result<(Workflow<DemoApi>, DemoGraph), WorkflowError> {
    let kinds = inventory();
    let wf = Workflow::new(kinds.clone())?;
    let graph = DemoGraph { counter: kinds[0].instance()?,
                            even: kinds[1].instance()?,
                            odd: kinds[2].instance()?,
                            summary: kinds[3].instance()? };
    wf.register([graph.counter.clone(), graph.even.clone(), graph.odd.clone(), graph.summary.clone()])?;
    wf.connect_edge(Edge::conditional(&graph.counter, &graph.even, "out % 2 == 0")?)?
      .connect_edge(Edge::conditional(&graph.counter, &graph.odd, "out % 2 != 0")?)?
      .connect_edge(Edge::transform(&graph.even, &graph.summary, "{ parity: 'even', value: out }")?)?
      .connect_edge(Edge::transform(&graph.odd, &graph.summary, "{ parity: 'odd', value: out }")?.unidirectional())?;
    Ok((wf, graph))
}

/// Proyección legible de `CurrentStep`.
pub fn describe(wf: &Workflow<DemoApi>) -> Value {
    let current = wf.current_step();
    if !current.is_started() {
        return json!({ "status": current.status().to_string() });
    }
    match current.state() {
        Some(api) => json!({
            "status": current.status().to_string(),
            "kind": current.kind(),
            "name": current.name(),
            "input": api.input(),
            "count": api.count(),
        }),
        None => json!({ "status": current.status().to_string() }),
    }
}

/// Arranca el demo, incrementa el contador `increments` veces y avanza
/// hasta `Summary`. Devuelve las proyecciones publicadas en el camino.
pub fn drive(wf: &Workflow<DemoApi>, graph: &DemoGraph, increments: u32) -> Result<Vec<Value>, CliError> {
    let mut trace = Vec::new();
    wf.start(&graph.counter)?;
    trace.push(describe(wf));
    for _ in 0..increments {
        active(wf)?.increment();
        trace.push(describe(wf));
    }
    let counter = active(wf)?;
    counter.submit(json!(counter.count()))?;
    trace.push(describe(wf));
    let parity = active(wf)?;
    parity.submit(parity.input().clone())?;
    trace.push(describe(wf));
    Ok(trace)
}

pub fn active(wf: &Workflow<DemoApi>) -> Result<DemoApi, CliError> {
    wf.current_step().state().cloned().ok_or(CliError::NotStarted)
}
