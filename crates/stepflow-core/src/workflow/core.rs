//! Runtime del workflow y su handle público.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use super::options::WorkflowOptions;
use super::state::{CurrentStep, HistoryEntry, TransitionStatus};
use crate::constants::LOG_TARGET;
use crate::edge::{Edge, EdgeKind};
use crate::errors::WorkflowError;
use crate::hashing::hash_value;
use crate::lifecycle::WorkflowContext;
use crate::snapshot::ExportMode;
use crate::step::{StepInstance, StepKind};
use crate::store::Unsubscribe;

pub(crate) type Subscriber = Rc<dyn Fn(&str, &str, TransitionStatus)>;

/// Salida de un nodo hacia fuera del workflow: cuando ningún edge del nodo
/// `from` acepta su output, éste se entrega a `forward` y su resultado es
/// el de `next`.
pub(crate) struct Handoff {
    pub from: String,
    pub forward: Rc<dyn Fn(Value) -> Result<(), WorkflowError>>,
}

/// Estado mutable del workflow. Sólo se accede a través de `Workflow`, que
/// nunca mantiene un préstamo activo mientras ejecuta código del usuario
/// (build, hooks, efectos, cleanups, validadores, suscriptores).
pub(crate) struct Runtime<S> {
    pub inventory: IndexMap<String, StepKind<S>>,
    pub nodes: IndexMap<String, StepInstance<S>>,
    pub edges: Vec<Edge>,
    pub history: Vec<HistoryEntry<S>>,
    pub subscribers: Vec<(u64, Subscriber)>,
    pub next_subscriber: u64,
    pub current_step: CurrentStep<S>,
    pub current: Option<StepInstance<S>>,
    pub context: Option<WorkflowContext>,
    pub version_counter: u64,
    pub options: WorkflowOptions,
    pub handoff: Option<Handoff>,
}

pub(crate) type RuntimeCell<S> = RefCell<Runtime<S>>;

impl<S> Runtime<S> {
    pub fn allowed_kinds(&self) -> String {
        self.inventory.keys().cloned().collect::<Vec<_>>().join(", ")
    }

    /// `true` si `version` es la generación del contexto vivo.
    pub fn is_live(&self, version: u64) -> bool {
        self.context.as_ref().is_some_and(|ctx| ctx.version == version)
    }
}

/// Handle del workflow. Los clones comparten el mismo runtime.
///
/// El runtime es single-thread y no reentrante: llamar a `back`, `start` o
/// `import` desde dentro de un hook, efecto o cleanup no está soportado.
pub struct Workflow<S> {
    pub(crate) runtime: Rc<RuntimeCell<S>>,
}

impl<S> Clone for Workflow<S> {
    fn clone(&self) -> Self {
        Self { runtime: self.runtime.clone() }
    }
}

impl<S> fmt::Debug for Workflow<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rt = self.runtime.borrow();
        f.debug_struct("Workflow")
         .field("inventory", &rt.inventory.keys().collect::<Vec<_>>())
         .field("nodes", &rt.nodes.keys().collect::<Vec<_>>())
         .field("edges", &rt.edges.len())
         .field("history", &rt.history.len())
         .field("current", &rt.current_step)
         .finish()
    }
}

impl<S: Clone + 'static> Workflow<S> {
    /// Crea un workflow con un inventario fijo de kinds. Falla si hay kinds
    /// duplicados.
    pub fn new(inventory: Vec<StepKind<S>>) -> Result<Self, WorkflowError> {
        Self::with_options(inventory, WorkflowOptions::default())
    }

    pub fn with_options(inventory: Vec<StepKind<S>>, options: WorkflowOptions) -> Result<Self, WorkflowError> {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for kind in &inventory {
            *counts.entry(kind.kind()).or_default() += 1;
        }
        let duplicates: Vec<String> = counts.iter()
                                            .filter(|(_, n)| **n > 1)
                                            .map(|(k, n)| format!("{k} ({n}x)"))
                                            .collect();
        if !duplicates.is_empty() {
            return Err(WorkflowError::DuplicateKinds(duplicates.join(", ")));
        }
        let inventory = inventory.into_iter().map(|k| (k.kind().to_string(), k)).collect();
        let runtime = Runtime { inventory,
                                nodes: IndexMap::new(),
                                edges: Vec::new(),
                                history: Vec::new(),
                                subscribers: Vec::new(),
                                next_subscriber: 0,
                                current_step: CurrentStep::NotStarted,
                                current: None,
                                context: None,
                                version_counter: 0,
                                options,
                                handoff: None };
        Ok(Self { runtime: Rc::new(RefCell::new(runtime)) })
    }

    pub(crate) fn from_shared(runtime: Rc<RuntimeCell<S>>) -> Self {
        Self { runtime }
    }

    pub fn inventory_kinds(&self) -> Vec<String> {
        self.runtime.borrow().inventory.keys().cloned().collect()
    }

    /// Instancias registradas, en orden de registro.
    pub fn nodes(&self) -> Vec<StepInstance<S>> {
        self.runtime.borrow().nodes.values().cloned().collect()
    }

    pub fn node(&self, id: &str) -> Option<StepInstance<S>> {
        self.runtime.borrow().nodes.get(id).cloned()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.runtime.borrow().edges.clone()
    }

    pub fn history_len(&self) -> usize {
        self.runtime.borrow().history.len()
    }

    /// Registra instancias. Registrar dos veces la misma instancia no tiene
    /// efecto; otra instancia con el mismo id es un error.
    pub fn register<I>(&self, instances: I) -> Result<&Self, WorkflowError>
        where I: IntoIterator<Item = StepInstance<S>>
    {
        let mut rt = self.runtime.borrow_mut();
        for instance in instances {
            if !rt.inventory.contains_key(instance.kind()) {
                return Err(WorkflowError::UnknownKind { kind: instance.kind().to_string(),
                                                        allowed: rt.allowed_kinds() });
            }
            match rt.nodes.get(instance.id()) {
                Some(existing) if existing.same_instance(&instance) => continue,
                Some(_) => return Err(WorkflowError::DuplicateInstance(instance.id().to_string())),
                None => {
                    debug!(target: LOG_TARGET, "register node={}", instance.id());
                    rt.nodes.insert(instance.id().to_string(), instance);
                }
            }
        }
        Ok(self)
    }

    /// Conecta dos instancias registradas con un edge por defecto.
    pub fn connect(&self, from: &StepInstance<S>, to: &StepInstance<S>, unidirectional: bool) -> Result<&Self, WorkflowError> {
        self.connect_edge(Edge::between(EdgeKind::Default, from.id(), to.id(), unidirectional))
    }

    pub fn connect_edge(&self, edge: Edge) -> Result<&Self, WorkflowError> {
        let mut rt = self.runtime.borrow_mut();
        if !rt.nodes.contains_key(edge.from_id()) {
            return Err(WorkflowError::UnregisteredEndpoint { endpoint: "from",
                                                             id: edge.from_id().to_string() });
        }
        if !rt.nodes.contains_key(edge.to_id()) {
            return Err(WorkflowError::UnregisteredEndpoint { endpoint: "to",
                                                             id: edge.to_id().to_string() });
        }
        debug!(target: LOG_TARGET, "connect kind={} from={} to={}", edge.kind().name(), edge.from_id(), edge.to_id());
        rt.edges.push(edge);
        Ok(self)
    }

    /// Registra la salida externa de `from` (ver [`Handoff`]).
    pub(crate) fn hand_off<F>(&self, from: &StepInstance<S>, forward: F) -> Result<(), WorkflowError>
        where F: Fn(Value) -> Result<(), WorkflowError> + 'static
    {
        let mut rt = self.runtime.borrow_mut();
        if !rt.nodes.contains_key(from.id()) {
            return Err(WorkflowError::UnregisteredEndpoint { endpoint: "from",
                                                             id: from.id().to_string() });
        }
        rt.handoff = Some(Handoff { from: from.id().to_string(),
                                    forward: Rc::new(forward) });
        Ok(())
    }

    /// Arranca en `node` con input nulo.
    pub fn start(&self, node: &StepInstance<S>) -> Result<(), WorkflowError> {
        self.start_with_input(node, Value::Null)
    }

    /// Arranca en `node`. Si ya hay un step activo se ejecuta su secuencia
    /// de salida y se vacía el historial.
    pub fn start_with_input(&self, node: &StepInstance<S>, input: Value) -> Result<(), WorkflowError> {
        let active = {
            let rt = self.runtime.borrow();
            if !rt.inventory.contains_key(node.kind()) {
                return Err(WorkflowError::UnknownKind { kind: node.kind().to_string(),
                                                        allowed: rt.allowed_kinds() });
            }
            match rt.nodes.get(node.id()) {
                Some(registered) if registered.same_instance(node) => {}
                _ => return Err(WorkflowError::UnregisteredStart(node.id().to_string())),
            }
            rt.current.is_some()
        };
        if active {
            self.discard_exit();
            self.discard_history();
        }
        self.transition_into(node.clone(), input, None)
    }

    /// Proyección del step activo.
    pub fn current_step(&self) -> CurrentStep<S> {
        self.runtime.borrow().current_step.clone()
    }

    /// Suscribe `listener` a cada cambio de estado `(kind, name, status)`.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
        where F: Fn(&str, &str, TransitionStatus) + 'static
    {
        let id = {
            let mut rt = self.runtime.borrow_mut();
            let id = rt.next_subscriber;
            rt.next_subscriber += 1;
            rt.subscribers.push((id, Rc::new(listener)));
            id
        };
        let weak = Rc::downgrade(&self.runtime);
        Box::new(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.borrow_mut().subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Vuelve al nodo anterior del historial. Con historial vacío no hace
    /// nada.
    pub fn back(&self) -> Result<(), WorkflowError> {
        {
            let rt = self.runtime.borrow();
            let (Some(entry), Some(current)) = (rt.history.last(), rt.current.as_ref()) else {
                return Ok(());
            };
            let crossing = rt.edges
                             .iter()
                             .find(|e| e.from_id() == entry.node.id() && e.to_id() == current.id());
            if crossing.is_some_and(Edge::is_unidirectional) {
                return Err(WorkflowError::UnidirectionalBack { previous: entry.node.id().to_string(),
                                                               current: current.id().to_string() });
            }
        }
        let Some(entry) = self.runtime.borrow_mut().history.pop() else {
            return Ok(());
        };
        debug!(target: LOG_TARGET, "back to={}", entry.node.id());
        self.discard_exit();
        self.transition_into(entry.node, entry.input, Some(entry.out_cleanups))
    }

    /// Hash estable del grafo (snapshot básico en forma canónica).
    pub fn definition_hash(&self) -> String {
        hash_value(&self.export_value(ExportMode::Basic))
    }

    /// Estado del store de cada nodo que tiene uno.
    pub fn store_states(&self) -> HashMap<String, Value> {
        let stores: Vec<_> = self.runtime
                                 .borrow()
                                 .nodes
                                 .values()
                                 .filter_map(|n| n.store().map(|s| (n.id().to_string(), s)))
                                 .collect();
        stores.into_iter().map(|(id, s)| (id, s.get_state())).collect()
    }
}
