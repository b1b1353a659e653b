use indexmap::IndexMap;
use log::{debug, error};
use serde_json::Value;

use super::types::{ExportMode, WorkflowSnapshot};
use crate::constants::{LOG_TARGET, SCHEMA_VERSION};
use crate::edge::Edge;
use crate::errors::{ImportError, WorkflowError};
use crate::lifecycle::OutCleanups;
use crate::step::{StepInstance, StepKind};
use crate::workflow::{CurrentStep, HistoryEntry, Workflow};

/// Estructuras reconstruidas y validadas, listas para aplicarse.
struct Prepared<S> {
    nodes: IndexMap<String, StepInstance<S>>,
    edges: Vec<Edge>,
    history: Vec<HistoryEntry<S>>,
    current: Option<(StepInstance<S>, Value)>,
}

/// Lo necesario para devolver el runtime a su estado previo.
struct Backup<S> {
    nodes: IndexMap<String, StepInstance<S>>,
    edges: Vec<Edge>,
    history: Vec<HistoryEntry<S>>,
    current: Option<(StepInstance<S>, Value)>,
}

fn prepare<S>(inventory: &IndexMap<String, StepKind<S>>,
              mode: ExportMode,
              payload: &Value)
              -> Result<Prepared<S>, ImportError> {
    let snapshot: WorkflowSnapshot =
        serde_json::from_value(payload.clone()).map_err(|e| ImportError::Malformed(e.to_string()))?;
    if snapshot.format != mode.format() {
        return Err(ImportError::FormatMismatch { expected: mode.format().to_string(),
                                                 found: snapshot.format });
    }
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(ImportError::SchemaVersion { expected: SCHEMA_VERSION.to_string(),
                                                found: snapshot.schema_version });
    }
    if let Some(unknown) = snapshot.inventory_kinds.iter().find(|k| !inventory.contains_key(k.as_str())) {
        return Err(ImportError::UnknownInventoryKind(unknown.clone()));
    }
    let state = match mode {
        ExportMode::Basic => None,
        ExportMode::Full => {
            Some(snapshot.state.ok_or_else(|| ImportError::Malformed("missing field `state`".to_string()))?)
        }
    };

    let mut nodes = IndexMap::new();
    for node in snapshot.nodes {
        let kind = inventory.get(&node.kind).ok_or_else(|| ImportError::UnknownNodeKind { id: node.id.clone(),
                                                                                          kind: node.kind.clone() })?;
        let instance = kind.create(Some(&node.name), node.config)
                           .map_err(|e| ImportError::Instantiate { id: node.id.clone(),
                                                                   reason: e.to_string() })?;
        if instance.id() != node.id {
            return Err(ImportError::IdMismatch { expected: node.id,
                                                 found: instance.id().to_string() });
        }
        if nodes.contains_key(&node.id) {
            return Err(ImportError::DuplicateNode(node.id));
        }
        nodes.insert(node.id, instance);
    }

    if let Some(state) = &state {
        for (id, value) in &state.stores {
            let node = nodes.get(id).ok_or_else(|| ImportError::UnknownStoreNode(id.clone()))?;
            let store = node.store().ok_or_else(|| ImportError::NodeWithoutStore(id.clone()))?;
            store.set_state(value.clone());
        }
    }

    let mut edges = Vec::with_capacity(snapshot.edges.len());
    for raw in snapshot.edges {
        let edge = Edge::from_serialized(&raw.kind, &raw.from, &raw.to, raw.unidirectional, raw.expr.as_deref())?;
        if !nodes.contains_key(&raw.from) || !nodes.contains_key(&raw.to) {
            return Err(ImportError::UnknownEdgeNode { from: raw.from, to: raw.to });
        }
        edges.push(edge);
    }

    let mut history = Vec::new();
    let mut current = None;
    if let Some(state) = state {
        for entry in state.history {
            let node = nodes.get(&entry.node_id).ok_or_else(|| ImportError::UnknownHistoryNode(entry.node_id.clone()))?;
            history.push(HistoryEntry { node: node.clone(),
                                        input: entry.input,
                                        out_cleanups: OutCleanups::shared() });
        }
        if let Some(id) = state.current.node_id {
            let node = nodes.get(&id).ok_or_else(|| ImportError::UnknownCurrentNode(id.clone()))?;
            current = Some((node.clone(), state.current.input));
        }
    }

    Ok(Prepared { nodes, edges, history, current })
}

/// El historial reemplazado por un import ya no puede recorrerse con
/// `back()`: sus cleanups de salida pendientes se ejecutan.
fn release_history<S>(history: Vec<HistoryEntry<S>>) {
    for entry in history {
        OutCleanups::run_all(&entry.out_cleanups);
    }
}

impl<S: Clone + 'static> Workflow<S> {
    /// Importa un snapshot. Es atómico: ante cualquier error el runtime
    /// queda como estaba antes de la llamada.
    ///
    /// `basic` reemplaza el grafo y deja el workflow sin arrancar; `full`
    /// además restaura stores e historial y re-entra en el nodo actual.
    pub fn import(&self, mode: ExportMode, payload: &Value) -> Result<(), WorkflowError> {
        // la fábrica de cada kind es código del usuario: no se presta el
        // runtime mientras se reconstruye
        let inventory = self.runtime.borrow().inventory.clone();
        let prepared = prepare(&inventory, mode, payload)?;
        self.commit(mode, prepared)
    }

    pub fn import_snapshot(&self, snapshot: &WorkflowSnapshot) -> Result<(), WorkflowError> {
        let mode = if snapshot.format == ExportMode::Full.format() { ExportMode::Full } else { ExportMode::Basic };
        let payload = serde_json::to_value(snapshot).map_err(|e| ImportError::Malformed(e.to_string()))?;
        self.import(mode, &payload)
    }

    fn commit(&self, mode: ExportMode, prepared: Prepared<S>) -> Result<(), WorkflowError> {
        let backup = {
            let rt = self.runtime.borrow();
            Backup { nodes: rt.nodes.clone(),
                     edges: rt.edges.clone(),
                     history: rt.history.clone(),
                     current: rt.current
                                .clone()
                                .zip(rt.context.as_ref().map(|ctx| ctx.current_input.clone())) }
        };
        let store_states = self.store_states();

        self.discard_exit();
        {
            let mut rt = self.runtime.borrow_mut();
            rt.nodes = prepared.nodes;
            rt.edges = prepared.edges;
            rt.history = prepared.history;
            rt.current = None;
            rt.current_step = CurrentStep::NotStarted;
        }
        debug!(target: LOG_TARGET, "import:commit mode={mode} current={:?}", prepared.current.as_ref().map(|(n, _)| n.id()));

        let Some((node, input)) = prepared.current else {
            release_history(backup.history);
            return Ok(());
        };
        let id = node.id().to_string();
        let Err(reason) = self.transition_into(node, input, None) else {
            release_history(backup.history);
            return Ok(());
        };

        // rollback
        self.discard_exit();
        {
            let mut rt = self.runtime.borrow_mut();
            rt.nodes = backup.nodes;
            rt.edges = backup.edges;
            rt.history = backup.history;
            rt.current = None;
            rt.current_step = CurrentStep::NotStarted;
        }
        for node in self.nodes() {
            if let (Some(store), Some(state)) = (node.store(), store_states.get(node.id())) {
                store.set_state(state.clone());
            }
        }
        if let Some((previous, previous_input)) = backup.current {
            if let Err(e) = self.transition_into(previous.clone(), previous_input, None) {
                error!(target: LOG_TARGET, "import rollback could not re-enter node={}: {e}", previous.id());
            }
        }
        Err(ImportError::Restore { id, reason: reason.to_string() }.into())
    }
}
