//! Resumen visible de una ejecución (`run_summary.json`).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::{ArtifactMap, LedgerEntry, LedgerSummary, StageLogEntry};
use crate::stage::{RunState, StageId, StageState, StageWarning};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: StageId,
    pub state: StageState,
    pub message: String,
}

/// Log de etapas, artefactos, ledger (resumen + entradas) y avisos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub state: RunState,
    pub message: String,
    pub run_dir: PathBuf,
    pub definition_hash: String,
    pub elapsed_ms: u64,
    pub stages: Vec<StageSummary>,
    pub stage_log: Vec<StageLogEntry>,
    pub artifacts: ArtifactMap,
    pub ledger: LedgerSummary,
    pub failures: Vec<LedgerEntry>,
    pub warnings: Vec<StageWarning>,
}

impl RunReport {
    pub fn stage_state(&self, stage: StageId) -> Option<StageState> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.state)
    }

    pub fn succeeded(&self) -> bool {
        self.state != RunState::Failed
    }
}
