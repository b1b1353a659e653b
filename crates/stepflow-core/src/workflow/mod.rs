//! Runtime del workflow: registro de nodos y edges, arranque, avance,
//! navegación hacia atrás, rebuild por store y suscripciones.

mod core;
mod options;
mod state;
mod transition;

pub use self::core::Workflow;
pub use options::WorkflowOptions;
pub use state::{CurrentStep, TransitionStatus};

pub(crate) use self::core::RuntimeCell;
pub(crate) use state::HistoryEntry;
