//! Modelo de edges.
//!
//! Un edge conecta dos instancias (por id) y decide si el output del origen
//! pasa al destino y cómo. La selección en el runtime es first-match en
//! orden de registro; `unidirectional` sólo afecta a `back()`.

use std::fmt;
use std::rc::Rc;

use serde_json::{json, Value};
use stepflow_expr::{compile, Compiled, ExprValue};

use crate::errors::{ImportError, WorkflowError};
use crate::step::StepInstance;

pub const KIND_DEFAULT: &str = "default";
pub const KIND_CONDITIONAL: &str = "conditional";
pub const KIND_TRANSFORM: &str = "transform";

#[derive(Clone)]
pub enum EdgeKind {
    /// Deja pasar el output sin cambios.
    Default,
    /// Permite si la expresión es truthy.
    Conditional(Rc<Compiled>),
    /// El resultado de la expresión es el input del destino.
    Transform(Rc<Compiled>),
}

impl EdgeKind {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeKind::Default => KIND_DEFAULT,
            EdgeKind::Conditional(_) => KIND_CONDITIONAL,
            EdgeKind::Transform(_) => KIND_TRANSFORM,
        }
    }

    pub fn expr(&self) -> Option<&str> {
        match self {
            EdgeKind::Default => None,
            EdgeKind::Conditional(c) | EdgeKind::Transform(c) => Some(c.source()),
        }
    }
}

impl fmt::Debug for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr() {
            Some(expr) => write!(f, "{}({expr:?})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// Resultado de `Edge::validate`.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeDecision {
    Allow(Value),
    Deny,
}

#[derive(Debug, Clone)]
pub struct Edge {
    kind: EdgeKind,
    from: String,
    to: String,
    unidirectional: bool,
}

impl Edge {
    pub fn new<S>(kind: EdgeKind, from: &StepInstance<S>, to: &StepInstance<S>) -> Self {
        Self::between(kind, from.id(), to.id(), false)
    }

    pub(crate) fn between(kind: EdgeKind, from: &str, to: &str, unidirectional: bool) -> Self {
        Self { kind,
               from: from.to_string(),
               to: to.to_string(),
               unidirectional }
    }

    pub fn default_edge<S>(from: &StepInstance<S>, to: &StepInstance<S>) -> Self {
        Self::new(EdgeKind::Default, from, to)
    }

    pub fn conditional<S>(from: &StepInstance<S>, to: &StepInstance<S>, predicate: &str) -> Result<Self, WorkflowError> {
        Ok(Self::new(EdgeKind::Conditional(compile(predicate)?), from, to))
    }

    pub fn transform<S>(from: &StepInstance<S>, to: &StepInstance<S>, transform: &str) -> Result<Self, WorkflowError> {
        Ok(Self::new(EdgeKind::Transform(compile(transform)?), from, to))
    }

    /// Marca el edge como no navegable con `back()`.
    pub fn unidirectional(mut self) -> Self {
        self.unidirectional = true;
        self
    }

    /// Reconstruye un edge desde su forma serializada.
    pub(crate) fn from_serialized(kind: &str,
                                  from: &str,
                                  to: &str,
                                  unidirectional: bool,
                                  expr: Option<&str>)
                                  -> Result<Self, ImportError> {
        let compiled = |expr: Option<&str>| -> Result<Rc<Compiled>, ImportError> {
            let src = expr.ok_or_else(|| ImportError::MissingExpression { kind: kind.to_string(),
                                                                         from: from.to_string(),
                                                                         to: to.to_string() })?;
            compile(src).map_err(ImportError::Expression)
        };
        let kind = match kind {
            KIND_DEFAULT => EdgeKind::Default,
            KIND_CONDITIONAL => EdgeKind::Conditional(compiled(expr)?),
            KIND_TRANSFORM => EdgeKind::Transform(compiled(expr)?),
            other => return Err(ImportError::UnknownEdgeKind(other.to_string())),
        };
        Ok(Self::between(kind, from, to, unidirectional))
    }

    pub fn kind(&self) -> &EdgeKind {
        &self.kind
    }

    pub fn from_id(&self) -> &str {
        &self.from
    }

    pub fn to_id(&self) -> &str {
        &self.to
    }

    pub fn is_unidirectional(&self) -> bool {
        self.unidirectional
    }

    /// Evalúa el edge contra el output del origen (`env = {out}`).
    pub fn validate(&self, output: &Value) -> Result<EdgeDecision, WorkflowError> {
        match &self.kind {
            EdgeKind::Default => Ok(EdgeDecision::Allow(output.clone())),
            EdgeKind::Conditional(compiled) => {
                let env = json!({ "out": output });
                if compiled.eval_value(&ExprValue::from_json(&env)).truthy() {
                    Ok(EdgeDecision::Allow(output.clone()))
                } else {
                    Ok(EdgeDecision::Deny)
                }
            }
            EdgeKind::Transform(compiled) => {
                let env = json!({ "out": output });
                compiled.eval(&env)
                        .map(EdgeDecision::Allow)
                        .ok_or_else(|| WorkflowError::TransformFailed("result is undefined".to_string()))
            }
        }
    }
}
