use crate::constants::LIBRARY_VERSION;

/// Opciones del runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Emitida como `libraryVersion` en los snapshots; informativa, no se
    /// valida al importar.
    pub library_version: Option<String>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self { library_version: Some(LIBRARY_VERSION.to_string()) }
    }
}

impl WorkflowOptions {
    pub fn without_library_version() -> Self {
        Self { library_version: None }
    }
}
