use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{SchemaRole, WorkflowError};
use crate::lifecycle::{Cleanup, DependencyList, EffectDef, HookOutcome, TransitionHook};
use crate::store::SharedStore;
use crate::workflow::{RuntimeCell, Workflow};

/// Hooks y efectos capturados durante una llamada a `build`.
#[derive(Default)]
pub(crate) struct Registrations {
    pub in_hooks: Vec<TransitionHook>,
    pub out_hooks: Vec<TransitionHook>,
    pub effects: Vec<EffectDef>,
}

/// Argumentos que recibe la función `build` de un step.
///
/// Las llamadas de registro (`transition_in`, `transition_out`, `effect`)
/// sólo anotan en listas locales; el runtime las incorpora al contexto
/// cuando `build` devuelve.
pub struct BuildArgs<S> {
    name: String,
    input: Value,
    config: Option<Value>,
    store: Option<SharedStore>,
    next: Next<S>,
    rebuild: bool,
    registrations: RefCell<Registrations>,
}

impl<S> BuildArgs<S> {
    pub(crate) fn new(name: String, input: Value, config: Option<Value>, store: Option<SharedStore>, next: Next<S>, rebuild: bool) -> Self {
        Self { name,
               input,
               config,
               store,
               next,
               rebuild,
               registrations: RefCell::new(Registrations::default()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Deserializa el input al tipo del step.
    pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, WorkflowError> {
        serde_json::from_value(self.input.clone()).map_err(|e| WorkflowError::Validation { step: self.name.clone(),
                                                                                          role: SchemaRole::Input,
                                                                                          reason: crate::errors::ValidationError::new(e.to_string()) })
    }

    pub fn config(&self) -> Option<&Value> {
        self.config.as_ref()
    }

    /// Snapshot del store en el momento del build.
    pub fn store_state(&self) -> Option<Value> {
        self.store.as_ref().map(|s| s.get_state())
    }

    pub fn store(&self) -> Option<SharedStore> {
        self.store.clone()
    }

    /// `true` cuando el build lo dispara un cambio del store.
    pub fn is_rebuild(&self) -> bool {
        self.rebuild
    }

    pub fn next(&self) -> Next<S> {
        self.next.clone()
    }

    /// Hook de entrada. En un rebuild se ignora: los hooks de entrada
    /// corren una sola vez por entrada al nodo.
    pub fn transition_in<F, R>(&self, hook: F)
        where F: FnOnce() -> R + 'static,
              R: Into<HookOutcome>
    {
        if self.rebuild {
            return;
        }
        self.registrations.borrow_mut().in_hooks.push(Box::new(move || hook().into()));
    }

    pub fn transition_out<F, R>(&self, hook: F)
        where F: FnOnce() -> R + 'static,
              R: Into<HookOutcome>
    {
        self.registrations.borrow_mut().out_hooks.push(Box::new(move || hook().into()));
    }

    /// Efecto posicional. `deps = None` re-ejecuta en cada rebuild,
    /// `Some(vec![])` una sola vez, y una lista no vacía cuando cambia algún
    /// elemento.
    pub fn effect<F>(&self, deps: Option<DependencyList>, run: F)
        where F: FnOnce() -> Option<Cleanup> + 'static
    {
        self.registrations.borrow_mut().effects.push(EffectDef { run: Box::new(run), deps });
    }

    pub(crate) fn into_registrations(self) -> Registrations {
        self.registrations.into_inner()
    }
}

/// Handle para avanzar desde el step que lo recibió en su `build`.
///
/// Sólo es válido mientras ese nodo siga activo en la misma generación de
/// contexto; después falla con `StaleStep`.
pub struct Next<S> {
    runtime: Weak<RuntimeCell<S>>,
    node_id: String,
    version: u64,
}

impl<S> Clone for Next<S> {
    fn clone(&self) -> Self {
        Self { runtime: self.runtime.clone(),
               node_id: self.node_id.clone(),
               version: self.version }
    }
}

impl<S> fmt::Debug for Next<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("node_id", &self.node_id).field("version", &self.version).finish()
    }
}

impl<S: Clone + 'static> Next<S> {
    pub(crate) fn new(runtime: Weak<RuntimeCell<S>>, node_id: String, version: u64) -> Self {
        Self { runtime, node_id, version }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Entrega el output del step y transiciona al siguiente nodo.
    pub fn call(&self, output: Value) -> Result<(), WorkflowError> {
        let runtime = self.runtime.upgrade().ok_or(WorkflowError::RuntimeDropped)?;
        Workflow::from_shared(runtime).advance(&self.node_id, self.version, output)
    }
}
