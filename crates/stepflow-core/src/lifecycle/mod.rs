//! Ciclo de vida del step activo: hooks de entrada/salida, cleanups
//! (síncronos y diferidos), efectos con diffing de dependencias y el
//! contexto versionado que los agrupa.

mod cleanup;
mod context;
mod effects;

pub use cleanup::{deferred, Cleanup, CleanupResolver, DeferredCleanup, HookOutcome, TransitionHook};
pub use effects::{DependencyList, EffectDef, EffectEntry, EffectFn};

pub(crate) use cleanup::{run_cleanup, OutCleanups, SharedOutCleanups};
pub(crate) use context::WorkflowContext;
pub(crate) use effects::{initial_effects, reconcile_effects, run_effect_cleanups};
