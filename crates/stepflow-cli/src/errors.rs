use stepflow_core::WorkflowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)] Workflow(#[from] WorkflowError),
    #[error("no active step")] NotStarted,
    #[error("cannot read '{path}': {source}")] Io { path: String, source: std::io::Error },
    #[error("invalid JSON in '{path}': {source}")] Json { path: String, source: serde_json::Error },
    #[error("{0}")] Usage(String),
}
