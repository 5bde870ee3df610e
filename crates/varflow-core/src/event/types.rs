//! Tipos de evento de una ejecución.
//!
//! El runner emite un evento por transición a un `EventStore` append-only;
//! el log de estados del `RunContext` y `events.jsonl` se derivan del mismo
//! flujo de transiciones.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::{RunState, StageId, StageState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEventKind {
    /// Primer evento: fija la huella de la secuencia de etapas habilitadas.
    RunInitialized {
        definition_hash: String,
        engine_version: String,
        stages: Vec<StageId>,
    },
    StageTransition {
        stage: StageId,
        state: StageState,
        elapsed_ms: u64,
        message: String,
    },
    /// Cierre con el estado global.
    RunFinished { state: RunState, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub run_id: String,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RunEventKind,
}
