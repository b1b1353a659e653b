use serde_json::Value;

use super::cleanup::{Cleanup, TransitionHook};
use super::effects::EffectEntry;
use crate::store::Unsubscribe;

/// Estado de ciclo de vida del step activo. Existe uno solo a la vez: se
/// crea al entrar en un nodo y se destruye al terminar su secuencia de
/// salida. Un rebuild por store reutiliza el mismo contexto.
///
/// `version` identifica la generación del contexto; un cleanup diferido
/// que se resuelve contra una versión distinta de la actual se ejecuta en
/// el acto en lugar de almacenarse.
pub(crate) struct WorkflowContext {
    pub has_run_in: bool,
    pub in_hooks: Vec<TransitionHook>,
    pub in_cleanups: Vec<Cleanup>,
    pub out_hooks: Vec<TransitionHook>,
    pub effects: Vec<EffectEntry>,
    pub store_unsub: Option<Unsubscribe>,
    pub current_input: Value,
    pub version: u64,
}

impl WorkflowContext {
    pub fn new(version: u64, current_input: Value, in_hooks: Vec<TransitionHook>, out_hooks: Vec<TransitionHook>) -> Self {
        Self { has_run_in: false,
               in_hooks,
               in_cleanups: Vec::new(),
               out_hooks,
               effects: Vec::new(),
               store_unsub: None,
               current_input,
               version }
    }
}
