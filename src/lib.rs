//! StepFlow Rust Library
//!
//! Fachada del workspace:
//! - Re-exporta el runtime de `stepflow-core` (steps, edges, ciclo de vida,
//!   snapshots).
//! - Expone `expr`, el compilador de expresiones usado por los edges
//!   condicionales y de transformación.
//!
//! Puede usarse desde `main.rs` o por otros crates/clientes.

pub use stepflow_core::*;
pub use stepflow_expr as expr;

/// Importaciones habituales para definir y conducir un workflow.
pub mod prelude {
    pub use stepflow_core::{BuildArgs, CompoundApi, CompoundStep, Edge, ExportMode, HookOutcome, Next, StepInstance, StepKind,
                            TransitionStatus, TypedSchema, Workflow, WorkflowError};
}
