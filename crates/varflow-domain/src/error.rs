use thiserror::Error;

/// Error del dominio de variantes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Descriptor mal formado antes de la resolución.
    #[error("invalid descriptor: {0}")]
    Validation(String),
    /// Salida de herramienta o texto de configuración que no se pudo interpretar.
    #[error("{0}")]
    Parse(String),
    /// Alelos o posición inconsistentes con la forma de la variante.
    #[error("malformed coordinate: {0}")]
    MalformedCoordinate(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Serialization(e.to_string())
    }
}
