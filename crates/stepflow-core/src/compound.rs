//! Step compuesto: un kind cuyo build arranca un workflow interno.
//!
//! Cada entrada al step construye un `Workflow` nuevo con el inventario
//! interno. El nodo de salida no tiene edges propios hacia fuera: cuando
//! llama a `next(output)`, el valor (ya validado contra su output) avanza el
//! workflow externo y el error de ese avance vuelve a quien llamó a `next`.

use std::rc::Rc;

use serde_json::Value;

use crate::edge::{Edge, EdgeKind};
use crate::errors::WorkflowError;
use crate::step::{Next, StepInstance, StepKind};
use crate::store::Unsubscribe;
use crate::workflow::{CurrentStep, TransitionStatus, Workflow};

/// API del step compuesto: acceso al workflow interno.
pub struct CompoundApi<S> {
    inner: Workflow<S>,
}

impl<S> Clone for CompoundApi<S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S> std::fmt::Debug for CompoundApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundApi").finish_non_exhaustive()
    }
}

impl<S: Clone + 'static> CompoundApi<S> {
    pub fn workflow(&self) -> Workflow<S> {
        self.inner.clone()
    }

    pub fn inner_current(&self) -> CurrentStep<S> {
        self.inner.current_step()
    }

    pub fn inner_state(&self) -> Option<S> {
        self.inner_current().state().cloned()
    }

    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
        where F: Fn(&str, &str, TransitionStatus) + 'static
    {
        self.inner.subscribe(listener)
    }
}

/// Builder de un step compuesto.
pub struct CompoundStep<S> {
    kind: String,
    inventory: Vec<StepKind<S>>,
    nodes: Vec<StepInstance<S>>,
    edges: Vec<Edge>,
    entry: Option<StepInstance<S>>,
    exit: Option<StepInstance<S>>,
}

impl<S: Clone + 'static> CompoundStep<S> {
    pub fn new(kind: impl Into<String>, inventory: Vec<StepKind<S>>) -> Self {
        Self { kind: kind.into(),
               inventory,
               nodes: Vec::new(),
               edges: Vec::new(),
               entry: None,
               exit: None }
    }

    pub fn register<I>(mut self, instances: I) -> Self
        where I: IntoIterator<Item = StepInstance<S>>
    {
        self.nodes.extend(instances);
        self
    }

    pub fn connect(self, from: &StepInstance<S>, to: &StepInstance<S>, unidirectional: bool) -> Self {
        self.connect_edge(Edge::between(EdgeKind::Default, from.id(), to.id(), unidirectional))
    }

    pub fn connect_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Nodo de entrada; recibe el input del step compuesto.
    pub fn entry(mut self, node: &StepInstance<S>) -> Self {
        self.entry = Some(node.clone());
        self
    }

    /// Nodo de salida; su output es el output del step compuesto.
    pub fn exit(mut self, node: &StepInstance<S>) -> Self {
        self.exit = Some(node.clone());
        self
    }

    /// Convierte la composición en un `StepKind`. `wrap` proyecta la API
    /// del compuesto en el tipo de API del workflow externo.
    pub fn into_kind<W>(self, wrap: W) -> StepKind<S>
        where W: Fn(CompoundApi<S>) -> S + 'static
    {
        let input_schema = self.entry.as_ref().and_then(StepInstance::input_schema);
        let output_schema = self.exit.as_ref().and_then(StepInstance::output_schema);
        let composition = Rc::new(self);
        StepKind::builder(composition.kind.clone()).shared_schemas(input_schema, output_schema)
                                                   .build(move |args| {
                                                       let inner = composition.start_inner(args.input().clone(), args.next())?;
                                                       let leaving = inner.clone();
                                                       args.transition_out(move || leaving.discard_exit());
                                                       Ok(wrap(CompoundApi { inner }))
                                                   })
    }

    fn start_inner(&self, input: Value, outer_next: Next<S>) -> Result<Workflow<S>, WorkflowError> {
        let (Some(entry), Some(exit)) = (self.entry.as_ref(), self.exit.as_ref()) else {
            return Err(WorkflowError::IncompleteCompound(self.kind.clone()));
        };

        let inner = Workflow::new(self.inventory.clone())?;
        inner.register(self.nodes.iter().cloned())?;
        for edge in &self.edges {
            inner.connect_edge(edge.clone())?;
        }
        inner.hand_off(exit, move |output| outer_next.call(output))?;
        inner.start_with_input(entry, input)?;
        Ok(inner)
    }
}
