use serde::{Deserialize, Serialize};

use super::StageId;
use crate::errors::CoreEngineError;
use crate::model::{ArtifactEntry, LedgerEntry};

/// Aviso no fatal de una etapa (p. ej. una fuente de conocimiento que falló).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWarning {
    pub stage: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub message: String,
}

/// Lo que una etapa entrega al runner.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    /// Artefactos en orden (una fuente por entrada en la etapa multi-fuente).
    pub artifacts: Vec<ArtifactEntry>,
    pub ledger: Vec<LedgerEntry>,
    pub warnings: Vec<StageWarning>,
    /// Número de descriptores de entrada, si la etapa lo conoce.
    pub input_count: Option<usize>,
    pub message: String,
}

impl StageOutput {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self { message: message.into(),
               ..Self::default() }
    }

    pub fn artifact(mut self, entry: ArtifactEntry) -> Self {
        self.artifacts.push(entry);
        self
    }
}

/// Resultado de ejecutar una etapa.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Succeeded(StageOutput),
    /// Fallo a nivel de etapa; `output` conserva lo producido hasta el fallo.
    Failed { error: CoreEngineError, output: StageOutput },
}

impl StageOutcome {
    pub fn failed(error: CoreEngineError) -> Self {
        StageOutcome::Failed { output: StageOutput::with_message(error.to_string()),
                               error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded(_))
    }
}
