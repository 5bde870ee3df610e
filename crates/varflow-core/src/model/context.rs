//! Contexto de una ejecución (`RunContext`).
//!
//! Es el único objeto mutable de la ejecución: identificador, directorio de
//! trabajo, log de estados por etapa, mapa de artefactos y ledger de fallos.
//! Las etapas lo reciben en sólo lectura; sólo el runner lo modifica, una vez
//! terminada cada etapa.
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ArtifactEntry, ArtifactMap, FailureLedger};
use crate::constants::{RUN_ID_TIME_FORMAT, SCRATCH_DIR};
use crate::stage::{RunState, StageId, StageOutput, StageState, StageWarning};

/// Entrada del log de estados: `{etapa, estado, instante, mensaje}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLogEntry {
    pub seq: u64,
    pub stage: StageId,
    pub state: StageState,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub message: String,
}

/// Identificador `AAAAMMDD_HHMMSS_mmm_xxxxxxxx` (tiempo + sufijo aleatorio).
pub fn generate_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format(RUN_ID_TIME_FORMAT), &suffix[..8])
}

#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    run_dir: PathBuf,
    scratch_dir: PathBuf,
    created_at: DateTime<Utc>,
    state: RunState,
    stage_log: Vec<StageLogEntry>,
    artifacts: ArtifactMap,
    ledger: FailureLedger,
    warnings: Vec<StageWarning>,
    total_inputs: usize,
}

impl RunContext {
    /// Crea `<output_dir>/run_<run_id>/scratch` con un identificador nuevo.
    pub fn create(output_dir: &Path) -> std::io::Result<Self> {
        Self::create_with_id(output_dir, generate_run_id())
    }

    pub fn create_with_id(output_dir: &Path, run_id: String) -> std::io::Result<Self> {
        let run_dir = output_dir.join(format!("run_{run_id}"));
        let scratch_dir = run_dir.join(SCRATCH_DIR);
        std::fs::create_dir_all(&scratch_dir)?;
        Ok(Self { run_id,
                  run_dir,
                  scratch_dir,
                  created_at: Utc::now(),
                  state: RunState::Created,
                  stage_log: Vec::new(),
                  artifacts: ArtifactMap::default(),
                  ledger: FailureLedger::default(),
                  warnings: Vec::new(),
                  total_inputs: 0 })
    }

    /// Registra un artefacto suministrado por el llamador (ruta de bypass).
    pub fn with_supplied_artifact(mut self, stage: StageId, entry: ArtifactEntry) -> Self {
        self.artifacts.record(stage, vec![entry]);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Ruta de un fichero de salida dentro del directorio de la ejecución.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.run_dir.join(file_name)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stage_log(&self) -> &[StageLogEntry] {
        &self.stage_log
    }

    pub fn artifacts(&self) -> &ArtifactMap {
        &self.artifacts
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn warnings(&self) -> &[StageWarning] {
        &self.warnings
    }

    pub fn total_inputs(&self) -> usize {
        self.total_inputs
    }

    /// Último estado registrado de una etapa (replay del log); `Pending` si
    /// aún no tiene entradas.
    pub fn stage_state(&self, stage: StageId) -> StageState {
        self.stage_log
            .iter()
            .rev()
            .find(|e| e.stage == stage)
            .map_or(StageState::Pending, |e| e.state)
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    pub(crate) fn log_transition(&mut self,
                                 stage: StageId,
                                 state: StageState,
                                 elapsed: Duration,
                                 message: impl Into<String>)
                                 -> StageLogEntry {
        let entry = StageLogEntry { seq: self.stage_log.len() as u64,
                                    stage,
                                    state,
                                    timestamp: Utc::now(),
                                    elapsed_ms: elapsed.as_millis() as u64,
                                    message: message.into() };
        self.stage_log.push(entry.clone());
        entry
    }

    /// Incorpora la salida de una etapa terminada.
    pub(crate) fn absorb(&mut self, stage: StageId, output: StageOutput) {
        if let Some(n) = output.input_count {
            self.total_inputs = n;
        }
        self.artifacts.record(stage, output.artifacts);
        self.ledger.extend(output.ledger);
        self.warnings.extend(output.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique_and_time_prefixed() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), "20240101_000000_000_".len() + 8);
        assert!(a.chars().take(8).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn create_lays_out_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::create_with_id(dir.path(), "r1".into()).unwrap();
        assert_eq!(ctx.run_dir(), dir.path().join("run_r1"));
        assert!(ctx.scratch_dir().is_dir());
        assert_eq!(ctx.state(), RunState::Created);
        assert_eq!(ctx.stage_state(StageId::Resolve), StageState::Pending);
    }

    #[test]
    fn stage_state_replays_latest_transition() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = RunContext::create_with_id(dir.path(), "r2".into()).unwrap();
        ctx.log_transition(StageId::Validate, StageState::Running, Duration::ZERO, "");
        ctx.log_transition(StageId::Validate, StageState::Succeeded, Duration::from_millis(3), "ok");
        assert_eq!(ctx.stage_state(StageId::Validate), StageState::Succeeded);
        assert_eq!(ctx.stage_log()[1].seq, 1);
    }
}
