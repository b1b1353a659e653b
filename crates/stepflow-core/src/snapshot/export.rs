use std::collections::BTreeMap;

use serde_json::Value;

use super::types::{CurrentSnapshot, EdgeSnapshot, ExportMode, HistorySnapshot, NodeSnapshot, StateSnapshot, WorkflowSnapshot};
use crate::constants::SCHEMA_VERSION;
use crate::workflow::Workflow;

impl<S: Clone + 'static> Workflow<S> {
    /// Snapshot del grafo (`Basic`) o del grafo y el estado (`Full`).
    pub fn export(&self, mode: ExportMode) -> WorkflowSnapshot {
        let (mut snapshot, stores) = {
            let rt = self.runtime.borrow();
            let nodes = rt.nodes
                          .values()
                          .map(|n| NodeSnapshot { id: n.id().to_string(),
                                                  kind: n.kind().to_string(),
                                                  name: n.name().to_string(),
                                                  config: n.config().cloned() })
                          .collect();
            let edges = rt.edges
                          .iter()
                          .map(|e| EdgeSnapshot { kind: e.kind().name().to_string(),
                                                  from: e.from_id().to_string(),
                                                  to: e.to_id().to_string(),
                                                  unidirectional: e.is_unidirectional(),
                                                  expr: e.kind().expr().map(str::to_string) })
                          .collect();
            let state = match mode {
                ExportMode::Basic => None,
                ExportMode::Full => {
                    let current = CurrentSnapshot { node_id: rt.current.as_ref().map(|n| n.id().to_string()),
                                                    status: rt.current_step.status(),
                                                    input: rt.context
                                                             .as_ref()
                                                             .map(|ctx| ctx.current_input.clone())
                                                             .unwrap_or(Value::Null) };
                    let history = rt.history
                                    .iter()
                                    .map(|h| HistorySnapshot { node_id: h.node.id().to_string(),
                                                               input: h.input.clone() })
                                    .collect();
                    Some(StateSnapshot { current, history, stores: BTreeMap::new() })
                }
            };
            let stores: Vec<_> = match mode {
                ExportMode::Basic => Vec::new(),
                ExportMode::Full => rt.nodes
                                      .values()
                                      .filter_map(|n| n.store().map(|s| (n.id().to_string(), s)))
                                      .collect(),
            };
            (WorkflowSnapshot { format: mode.format().to_string(),
                                schema_version: SCHEMA_VERSION.to_string(),
                                library_version: rt.options.library_version.clone(),
                                inventory_kinds: rt.inventory.keys().cloned().collect(),
                                nodes,
                                edges,
                                state },
             stores)
        };
        // el estado de los stores se lee sin préstamo del runtime
        if let Some(state) = snapshot.state.as_mut() {
            state.stores = stores.into_iter().map(|(id, store)| (id, store.get_state())).collect();
        }
        snapshot
    }

    /// `export` como JSON.
    pub fn export_value(&self, mode: ExportMode) -> Value {
        serde_json::to_value(self.export(mode)).unwrap_or(Value::Null)
    }
}
