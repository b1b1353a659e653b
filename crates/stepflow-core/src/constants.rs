//! Constantes del runtime.
//!
//! `SCHEMA_VERSION` forma parte del contrato de snapshots: `import` exige
//! coincidencia exacta, sin compatibilidad hacia delante ni hacia atrás.

/// Versión del formato de snapshot.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Discriminador del snapshot que sólo contiene el grafo.
pub const FORMAT_BASIC: &str = "stepflow/basic";

/// Discriminador del snapshot con grafo y estado.
pub const FORMAT_FULL: &str = "stepflow/full";

/// Nombre por defecto de una instancia creada sin nombre.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Target de `log` usado por todo el runtime.
pub const LOG_TARGET: &str = "stepflow";

/// Versión de la librería emitida como `libraryVersion` en los snapshots.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
