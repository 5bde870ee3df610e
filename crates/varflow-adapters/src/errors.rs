//! Errores de invocación de herramientas externas.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use varflow_core::CoreEngineError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),
    #[error("tool exited with exit status {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("expected output {} is missing or empty", .0.display())]
    MissingOutput(PathBuf),
    #[error("invalid output: {0}")]
    InvalidOutput(String),
    #[error("not dispatched: run cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(String),
}

impl ToolError {
    /// Errores que pueden desaparecer al reintentar.
    pub fn is_retryable(&self) -> bool {
        matches!(self,
                 ToolError::Timeout(_) | ToolError::NonZeroExit { .. } | ToolError::MissingOutput(_) | ToolError::Io(_))
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Io(e.to_string())
    }
}

impl From<ToolError> for CoreEngineError {
    fn from(e: ToolError) -> Self {
        CoreEngineError::Internal(e.to_string())
    }
}
