//! Resultados de la resolución de coordenadas.
//!
//! Cada descriptor de un lote produce exactamente un `ResolutionOutcome`:
//! un `CoordinateRecord` o un `ResolutionFailure`. Ambos conservan el índice
//! de envío para restaurar el orden y trazar la procedencia.

use serde::{Deserialize, Serialize};

use crate::{CoordinateType, FailureCategory, VariantDescriptor};

/// Coordenada genómica resuelta. Inmutable tras su creación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub index: usize,
    pub descriptor: VariantDescriptor,
    pub invocation_input: String,
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    pub coordinate_type: CoordinateType,
    pub transcript: Option<String>,
    pub gene: Option<String>,
    /// Anotación proteica legible ya normalizada.
    pub annotation: Option<String>,
}

/// Descriptor que no pudo resolverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub index: usize,
    pub descriptor: VariantDescriptor,
    pub coordinate_type_guess: Option<CoordinateType>,
    pub raw_output: String,
    pub category: FailureCategory,
    pub message: String,
    #[serde(default)]
    pub origin: FailureOrigin,
}

/// Punto del flujo en que falló un descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    /// Rechazado antes de invocar la herramienta.
    #[default]
    Precheck,
    /// El ejecutable no pudo arrancarse.
    ToolUnavailable,
    /// La herramienta se ejecutó y falló, o su salida no sirvió.
    Invocation,
    /// No llegó a despacharse por cancelación.
    NotDispatched,
}

impl FailureOrigin {
    /// Si el descriptor llegó a ocupar un worker.
    pub fn was_dispatched(&self) -> bool {
        matches!(self, FailureOrigin::ToolUnavailable | FailureOrigin::Invocation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Resolved(CoordinateRecord),
    Failed(ResolutionFailure),
}

impl ResolutionOutcome {
    pub fn index(&self) -> usize {
        match self {
            ResolutionOutcome::Resolved(r) => r.index,
            ResolutionOutcome::Failed(f) => f.index,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    /// Separa un lote en éxitos y fallos conservando el orden.
    pub fn partition(outcomes: Vec<ResolutionOutcome>) -> (Vec<CoordinateRecord>, Vec<ResolutionFailure>) {
        let mut records = Vec::new();
        let mut failures = Vec::new();
        for o in outcomes {
            match o {
                ResolutionOutcome::Resolved(r) => records.push(r),
                ResolutionOutcome::Failed(f) => failures.push(f),
            }
        }
        (records, failures)
    }
}
