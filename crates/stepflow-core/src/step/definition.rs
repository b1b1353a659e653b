use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::args::BuildArgs;
use super::instance::StepInstance;
use crate::constants::DEFAULT_INSTANCE_NAME;
use crate::errors::{SchemaRole, WorkflowError};
use crate::schema::{Schema, SharedSchema};
use crate::store::{InMemoryStore, SharedStore};

/// Función que construye la API de un step activo.
pub type BuildFn<S> = Rc<dyn Fn(&BuildArgs<S>) -> Result<S, WorkflowError>>;

/// Fábrica del store reactivo de cada instancia.
pub type StoreFactory = Rc<dyn Fn() -> SharedStore>;

pub(crate) struct StepKindDef<S> {
    pub kind: String,
    pub input_schema: Option<SharedSchema>,
    pub output_schema: Option<SharedSchema>,
    pub config_schema: Option<SharedSchema>,
    pub store_factory: Option<StoreFactory>,
    pub build: BuildFn<S>,
}

/// Tipo de step. Clonar es barato (comparte la definición).
pub struct StepKind<S> {
    def: Rc<StepKindDef<S>>,
}

impl<S> Clone for StepKind<S> {
    fn clone(&self) -> Self {
        Self { def: self.def.clone() }
    }
}

impl<S> fmt::Debug for StepKind<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepKind")
         .field("kind", &self.def.kind)
         .field("has_input_schema", &self.def.input_schema.is_some())
         .field("has_output_schema", &self.def.output_schema.is_some())
         .field("has_config_schema", &self.def.config_schema.is_some())
         .field("has_store", &self.def.store_factory.is_some())
         .finish()
    }
}

impl<S> StepKind<S> {
    pub fn builder(kind: impl Into<String>) -> StepKindBuilder<S> {
        StepKindBuilder { kind: kind.into(),
                          input_schema: None,
                          output_schema: None,
                          config_schema: None,
                          store_factory: None,
                          _marker: std::marker::PhantomData }
    }

    pub fn kind(&self) -> &str {
        &self.def.kind
    }

    pub fn has_config_schema(&self) -> bool {
        self.def.config_schema.is_some()
    }

    pub fn has_store(&self) -> bool {
        self.def.store_factory.is_some()
    }

    pub(crate) fn def(&self) -> &StepKindDef<S> {
        &self.def
    }

    /// Instancia con nombre por defecto y sin config.
    pub fn instance(&self) -> Result<StepInstance<S>, WorkflowError> {
        self.create(None, None)
    }

    pub fn named(&self, name: &str) -> Result<StepInstance<S>, WorkflowError> {
        self.create(Some(name), None)
    }

    pub fn configured(&self, name: Option<&str>, config: Value) -> Result<StepInstance<S>, WorkflowError> {
        self.create(Some(name.unwrap_or(DEFAULT_INSTANCE_NAME)), Some(config))
    }

    /// Fábrica de instancias. La config se valida aquí (no en el build) y el
    /// store se construye de inmediato. Sin validador de config la
    /// instancia no conserva config alguna.
    pub fn create(&self, name: Option<&str>, config: Option<Value>) -> Result<StepInstance<S>, WorkflowError> {
        let name = name.unwrap_or(DEFAULT_INSTANCE_NAME).to_string();
        let id = format!("{}_{}", self.def.kind, name);
        let config = match &self.def.config_schema {
            Some(schema) => {
                let raw = config.unwrap_or(Value::Null);
                Some(schema.parse(&raw).map_err(|reason| WorkflowError::Validation { step: id.clone(),
                                                                                     role: SchemaRole::Config,
                                                                                     reason })?)
            }
            None => None,
        };
        let store = self.def.store_factory.as_ref().map(|factory| factory());
        Ok(StepInstance::new(id, name, self.clone(), config, store))
    }
}

/// Builder de `StepKind`.
pub struct StepKindBuilder<S> {
    kind: String,
    input_schema: Option<SharedSchema>,
    output_schema: Option<SharedSchema>,
    config_schema: Option<SharedSchema>,
    store_factory: Option<StoreFactory>,
    _marker: std::marker::PhantomData<fn() -> S>,
}

impl<S> StepKindBuilder<S> {
    pub fn input_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.input_schema = Some(Rc::new(schema));
        self
    }

    pub fn output_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.output_schema = Some(Rc::new(schema));
        self
    }

    pub fn config_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.config_schema = Some(Rc::new(schema));
        self
    }

    /// Store en memoria cuyo estado inicial produce `initial`.
    pub fn store<F>(mut self, initial: F) -> Self
        where F: Fn() -> Value + 'static
    {
        self.store_factory = Some(Rc::new(move || Rc::new(InMemoryStore::new(initial())) as SharedStore));
        self
    }

    pub(crate) fn shared_schemas(mut self, input: Option<SharedSchema>, output: Option<SharedSchema>) -> Self {
        self.input_schema = input;
        self.output_schema = output;
        self
    }

    pub fn store_factory<F>(mut self, factory: F) -> Self
        where F: Fn() -> SharedStore + 'static
    {
        self.store_factory = Some(Rc::new(factory));
        self
    }

    pub fn build<F>(self, build: F) -> StepKind<S>
        where F: Fn(&BuildArgs<S>) -> Result<S, WorkflowError> + 'static
    {
        StepKind { def: Rc::new(StepKindDef { kind: self.kind,
                                              input_schema: self.input_schema,
                                              output_schema: self.output_schema,
                                              config_schema: self.config_schema,
                                              store_factory: self.store_factory,
                                              build: Rc::new(build) }) }
    }
}
