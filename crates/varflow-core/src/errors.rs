//! Errores del motor de etapas.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::StageId;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    /// Configuración inválida; se detecta antes de ejecutar etapas.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("stage {stage} failed: {message}")]
    StageFailed { stage: StageId, message: String },
    #[error("run cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl CoreEngineError {
    pub fn stage(stage: StageId, message: impl Into<String>) -> Self {
        CoreEngineError::StageFailed { stage,
                                       message: message.into() }
    }
}

impl From<std::io::Error> for CoreEngineError {
    fn from(e: std::io::Error) -> Self {
        CoreEngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CoreEngineError {
    fn from(e: serde_json::Error) -> Self {
        CoreEngineError::Serialization(e.to_string())
    }
}
