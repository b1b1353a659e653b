//! Errores del runtime.
//!
//! Todo lo que no se traga explícitamente (rechazos de cleanups diferidos,
//! pánicos dentro de cleanups) se propaga al llamador de la operación
//! pública que lo disparó.

use std::fmt;

use stepflow_expr::ExprError;
use thiserror::Error;

/// Rol del validador que rechazó un valor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaRole {
    Input,
    Output,
    Config,
}

impl fmt::Display for SchemaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SchemaRole::Input => "input",
            SchemaRole::Output => "output",
            SchemaRole::Config => "config",
        };
        f.write_str(label)
    }
}

/// Error producido por un validador (`Schema::parse`).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum WorkflowError {
    #[error("workflow inventory contains duplicate step kinds: {0}. Each step kind must be unique")] DuplicateKinds(String),
    #[error("cannot register step instance kind '{kind}': not listed in inventory. Allowed kinds: [{allowed}]")] UnknownKind { kind: String, allowed: String },
    #[error("step instance '{0}' is already registered")] DuplicateInstance(String),
    #[error("cannot connect {endpoint} unregistered step instance '{id}'. Register the instance before connecting")] UnregisteredEndpoint { endpoint: &'static str, id: String },
    #[error("cannot start on unregistered step instance '{0}'. Register the instance before starting")] UnregisteredStart(String),
    #[error("invalid {role} for step '{step}': {reason}")] Validation { step: String, role: SchemaRole, reason: ValidationError },
    #[error("no next step from '{0}'")] NoNextStep(String),
    #[error("transition blocked by edge condition from '{0}'")] TransitionBlocked(String),
    #[error("transform edge failed to convert output -> input. Reason: {0}")] TransformFailed(String),
    #[error("expression error: {0}")] Expression(#[from] ExprError),
    #[error("back navigation is not allowed: edge from '{previous}' to '{current}' is unidirectional")] UnidirectionalBack { previous: String, current: String },
    #[error("step '{0}' is no longer active")] StaleStep(String),
    #[error("build failed for step '{step}': {message}")] Build { step: String, message: String },
    #[error("compound step '{0}' requires an entry and an exit")] IncompleteCompound(String),
    #[error("workflow runtime is no longer available")] RuntimeDropped,
    #[error("import failed: {0}")] Import(#[from] ImportError),
}

impl WorkflowError {
    pub fn build(step: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowError::Build { step: step.into(), message: message.into() }
    }
}

/// Motivos de rechazo de `import`. Cualquiera de ellos deja el runtime tal
/// como estaba antes de la llamada.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ImportError {
    #[error("malformed payload: {0}")] Malformed(String),
    #[error("format mismatch: expected '{expected}', found '{found}'")] FormatMismatch { expected: String, found: String },
    #[error("schema version mismatch: expected '{expected}', found '{found}'")] SchemaVersion { expected: String, found: String },
    #[error("unknown inventory kind '{0}'")] UnknownInventoryKind(String),
    #[error("node '{id}' has unknown kind '{kind}'")] UnknownNodeKind { id: String, kind: String },
    #[error("cannot instantiate node '{id}': {reason}")] Instantiate { id: String, reason: String },
    #[error("node id mismatch: payload '{expected}', reconstructed '{found}'")] IdMismatch { expected: String, found: String },
    #[error("duplicate node id '{0}'")] DuplicateNode(String),
    #[error("store state references unknown node '{0}'")] UnknownStoreNode(String),
    #[error("store state provided for node '{0}' which has no store")] NodeWithoutStore(String),
    #[error("unknown edge kind '{0}'")] UnknownEdgeKind(String),
    #[error("{kind} edge {from} -> {to} requires an expression")] MissingExpression { kind: String, from: String, to: String },
    #[error("invalid edge expression: {0}")] Expression(ExprError),
    #[error("edge references unknown node: {from} -> {to}")] UnknownEdgeNode { from: String, to: String },
    #[error("history references unknown node '{0}'")] UnknownHistoryNode(String),
    #[error("current step references unknown node '{0}'")] UnknownCurrentNode(String),
    #[error("cannot restore current step '{id}': {reason}")] Restore { id: String, reason: String },
}
