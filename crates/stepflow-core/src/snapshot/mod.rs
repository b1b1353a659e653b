//! Exportación e importación de snapshots.
//!
//! `basic` contiene el grafo (inventario, nodos, edges); `full` añade el
//! estado de ejecución (nodo actual, historial y estado de cada store).
//! La importación valida todo contra estructuras nuevas antes de tocar el
//! runtime y revierte si no puede re-entrar en el nodo registrado.

mod export;
mod import;
mod types;

pub use types::{CurrentSnapshot, EdgeSnapshot, ExportMode, HistorySnapshot, NodeSnapshot, StateSnapshot, WorkflowSnapshot};
