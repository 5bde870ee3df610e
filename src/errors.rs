//! Errores de la fachada del pipeline.
use thiserror::Error;
use varflow_core::CoreEngineError;
use varflow_domain::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Configuración inválida; se detecta antes de ejecutar ninguna etapa.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    Input(String),
    #[error(transparent)]
    Engine(#[from] CoreEngineError),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e.to_string())
    }
}

impl From<DomainError> for PipelineError {
    fn from(e: DomainError) -> Self {
        PipelineError::Configuration(e.to_string())
    }
}
