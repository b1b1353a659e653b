//! stepflow-core: runtime de workflows por pasos.
//!
//! Un workflow es un grafo dirigido de instancias de step conectadas por
//! edges. Sólo un step está activo a la vez; entrar y salir de él ejecuta
//! hooks, efectos y cleanups, y su store reactivo (si existe) dispara
//! rebuilds en sitio. El historial permite volver atrás y el estado
//! completo puede exportarse e importarse de forma atómica.

pub mod compound;
pub mod constants;
pub mod edge;
pub mod errors;
pub mod hashing;
pub mod lifecycle;
pub mod schema;
pub mod snapshot;
pub mod step;
pub mod store;
pub mod workflow;

pub use compound::{CompoundApi, CompoundStep};
pub use edge::{Edge, EdgeDecision, EdgeKind};
pub use errors::{ImportError, SchemaRole, ValidationError, WorkflowError};
pub use lifecycle::{deferred, Cleanup, CleanupResolver, DeferredCleanup, DependencyList, HookOutcome};
pub use schema::{AnySchema, FnSchema, Schema, TypedSchema};
pub use snapshot::{ExportMode, WorkflowSnapshot};
pub use step::{BuildArgs, Next, StepInstance, StepKind};
pub use store::{InMemoryStore, ReactiveStore, SharedStore, Unsubscribe};
pub use workflow::{CurrentStep, TransitionStatus, Workflow, WorkflowOptions};
