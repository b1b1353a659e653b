use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::definition::StepKind;
use crate::errors::{SchemaRole, WorkflowError};
use crate::schema::SharedSchema;
use crate::store::SharedStore;

struct InstanceInner<S> {
    id: String,
    name: String,
    kind: StepKind<S>,
    config: Option<Value>,
    store: Option<SharedStore>,
}

/// Ocurrencia concreta de un `StepKind`. Inmutable tras su creación salvo
/// el estado interno de su store.
pub struct StepInstance<S> {
    inner: Rc<InstanceInner<S>>,
}

impl<S> Clone for StepInstance<S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S> fmt::Debug for StepInstance<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepInstance")
         .field("id", &self.inner.id)
         .field("config", &self.inner.config)
         .field("has_store", &self.inner.store.is_some())
         .finish()
    }
}

impl<S> StepInstance<S> {
    pub(crate) fn new(id: String, name: String, kind: StepKind<S>, config: Option<Value>, store: Option<SharedStore>) -> Self {
        Self { inner: Rc::new(InstanceInner { id, name, kind, config, store }) }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> &str {
        self.inner.kind.kind()
    }

    pub fn step_kind(&self) -> &StepKind<S> {
        &self.inner.kind
    }

    pub fn config(&self) -> Option<&Value> {
        self.inner.config.as_ref()
    }

    pub fn store(&self) -> Option<SharedStore> {
        self.inner.store.clone()
    }

    /// Identidad de objeto (no de id).
    pub fn same_instance(&self, other: &StepInstance<S>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn input_schema(&self) -> Option<SharedSchema> {
        self.inner.kind.def().input_schema.clone()
    }

    pub(crate) fn output_schema(&self) -> Option<SharedSchema> {
        self.inner.kind.def().output_schema.clone()
    }

    pub(crate) fn validate(&self, role: SchemaRole, value: Value) -> Result<Value, WorkflowError> {
        let def = self.inner.kind.def();
        let schema = match role {
            SchemaRole::Input => def.input_schema.as_ref(),
            SchemaRole::Output => def.output_schema.as_ref(),
            SchemaRole::Config => def.config_schema.as_ref(),
        };
        match schema {
            Some(schema) => schema.parse(&value).map_err(|reason| WorkflowError::Validation { step: self.inner.id.clone(),
                                                                                              role,
                                                                                              reason }),
            None => Ok(value),
        }
    }

    pub(crate) fn build_fn(&self) -> super::BuildFn<S> {
        self.inner.kind.def().build.clone()
    }
}
