//! Ejecución secuencial de la secuencia fija de etapas.
//!
//! Invariantes:
//! - La etapa N+1 sólo empieza cuando la N quedó en `Succeeded` o `Skipped`.
//! - Una etapa fatal en `Failed` detiene la secuencia; las restantes quedan
//!   en `Pending`.
//! - La cancelación se comprueba en cada frontera de etapa.
//! - El contexto sólo se modifica aquí, después de que cada etapa termine.
use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::builder::RemediationLookup;
use super::callback::notify;
use super::{RunReport, StageRunnerBuilder, StageSummary, StatusCallback, StatusUpdate};
use crate::constants::{ENGINE_VERSION, RUN_SUMMARY_FILE};
use crate::event::{EventStore, RunEvent, RunEventKind};
use crate::hashing::hash_value;
use crate::model::RunContext;
use crate::stage::{RunState, StageDefinition, StageId, StageOutcome, StageState};

pub struct StageRunner<E: EventStore> {
    event_store: E,
    stages: Vec<Box<dyn StageDefinition>>,
    disabled: HashSet<StageId>,
    callback: Option<StatusCallback>,
    callback_budget: Duration,
    cancel: CancellationToken,
    preserve_intermediates: bool,
    remediation: Option<RemediationLookup>,
    definition_hash: String,
}

impl<E: EventStore> StageRunner<E> {
    pub fn builder(event_store: E) -> StageRunnerBuilder<E> {
        StageRunnerBuilder::new(event_store)
    }

    pub(crate) fn from_builder(b: StageRunnerBuilder<E>) -> Self {
        let stages_json: Vec<serde_json::Value> =
            b.stages
             .iter()
             .map(|s| json!({ "id": s.id(), "enabled": !b.disabled.contains(&s.id()), "params": s.params() }))
             .collect();
        let definition_hash = hash_value(&json!({ "engine_version": ENGINE_VERSION, "stages": stages_json }));
        Self { event_store: b.event_store,
               stages: b.stages,
               disabled: b.disabled,
               callback: b.callback,
               callback_budget: b.callback_budget,
               cancel: b.cancel,
               preserve_intermediates: b.preserve_intermediates,
               remediation: b.remediation,
               definition_hash }
    }

    /// Huella (blake3 del JSON canónico) de la secuencia configurada.
    pub fn definition_hash(&self) -> &str {
        &self.definition_hash
    }

    /// Token para cancelar la ejecución desde fuera.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_enabled(&self, stage: StageId) -> bool {
        !self.disabled.contains(&stage)
    }

    pub fn events(&self, run_id: &str) -> Vec<RunEvent> {
        self.event_store.list(run_id)
    }

    fn emit(&mut self, run_id: &str, kind: RunEventKind) {
        if let Err(e) = self.event_store.append_kind(run_id, kind) {
            warn!("could not record event for run {run_id}: {e}");
        }
    }

    async fn transition(&mut self,
                        ctx: &mut RunContext,
                        stage: StageId,
                        state: StageState,
                        elapsed: Duration,
                        message: String) {
        ctx.log_transition(stage, state, elapsed, message.clone());
        self.emit(ctx.run_id(),
                  RunEventKind::StageTransition { stage,
                                                  state,
                                                  elapsed_ms: elapsed.as_millis() as u64,
                                                  message: message.clone() });
        let update = StatusUpdate { run_id: ctx.run_id().to_string(),
                                    stage,
                                    state,
                                    elapsed,
                                    message };
        notify(self.callback.as_ref(), self.callback_budget, update).await;
    }

    /// Ejecuta todas las etapas sobre `ctx`, persiste el resumen y devuelve el informe.
    pub async fn run(&mut self, mut ctx: RunContext) -> RunReport {
        let started = Instant::now();
        let stages = std::mem::take(&mut self.stages);
        let enabled: Vec<StageId> = stages.iter().map(|s| s.id()).filter(|id| self.is_enabled(*id)).collect();

        ctx.set_state(RunState::Running);
        self.emit(ctx.run_id(),
                  RunEventKind::RunInitialized { definition_hash: self.definition_hash.clone(),
                                                 engine_version: ENGINE_VERSION.to_string(),
                                                 stages: enabled });
        info!("run {} started ({} stages, definition {})", ctx.run_id(), stages.len(), &self.definition_hash[..12]);

        let mut halted: Option<String> = None;
        let mut cancelled = false;
        let mut non_fatal_failure = false;

        for stage in &stages {
            let id = stage.id();
            if self.cancel.is_cancelled() {
                info!("run {} cancelled before stage {id}", ctx.run_id());
                cancelled = true;
                break;
            }
            if !self.is_enabled(id) {
                info!("stage {id} skipped: disabled by configuration");
                self.transition(&mut ctx, id, StageState::Skipped, Duration::ZERO, "disabled by configuration".into())
                    .await;
                continue;
            }
            if stage.is_bypassed(&ctx) {
                info!("stage {id} skipped: upstream artifact supplied");
                self.transition(&mut ctx, id, StageState::Skipped, Duration::ZERO, "upstream artifact supplied".into())
                    .await;
                continue;
            }

            info!("stage {id} started");
            self.transition(&mut ctx, id, StageState::Running, Duration::ZERO, String::new()).await;
            let stage_start = Instant::now();
            let outcome = stage.run(&ctx, &self.cancel).await;
            let elapsed = stage_start.elapsed();

            let message = match outcome {
                StageOutcome::Succeeded(output) => {
                    let message = output.message.clone();
                    debug!("stage {id} produced {} artifacts, {} ledger entries",
                           output.artifacts.len(),
                           output.ledger.len());
                    ctx.absorb(id, output);
                    info!("stage {id} succeeded in {elapsed:?}: {message}");
                    self.transition(&mut ctx, id, StageState::Succeeded, elapsed, message.clone()).await;
                    message
                }
                StageOutcome::Failed { error, output } => {
                    ctx.absorb(id, output);
                    let message = error.to_string();
                    self.transition(&mut ctx, id, StageState::Failed, elapsed, message.clone()).await;
                    message
                }
            };

            if !ctx.stage_state(id).allows_next() {
                if stage.is_fatal() {
                    error!("stage {id} failed, halting run: {message}");
                    halted = Some(message);
                    break;
                }
                warn!("non-fatal stage {id} failed: {message}");
                non_fatal_failure = true;
            }
        }

        let produced = ctx.artifacts().iter().any(|(stage, _)| ctx.stage_state(*stage) == StageState::Succeeded);
        let (state, message) = if let Some(msg) = halted {
            if produced {
                (RunState::PartiallyCompleted, format!("halted after failure: {msg}"))
            } else {
                (RunState::Failed, msg)
            }
        } else if cancelled {
            let state = if produced { RunState::PartiallyCompleted } else { RunState::Failed };
            (state, "run cancelled".to_string())
        } else if non_fatal_failure || !ctx.ledger().is_empty() || !ctx.warnings().is_empty() {
            (RunState::PartiallyCompleted,
             format!("finished with {} item failures and {} warnings", ctx.ledger().len(), ctx.warnings().len()))
        } else {
            (RunState::Completed, "all stages finished".to_string())
        };

        ctx.set_state(state);
        self.emit(ctx.run_id(),
                  RunEventKind::RunFinished { state,
                                              message: message.clone() });
        info!("run {} {}: {message}", ctx.run_id(), state.as_str());

        let report = self.report(&ctx, &stages, state, message, started.elapsed());
        self.stages = stages;
        self.finish(&ctx, &report);
        report
    }

    fn report(&self,
              ctx: &RunContext,
              stages: &[Box<dyn StageDefinition>],
              state: RunState,
              message: String,
              elapsed: Duration)
              -> RunReport {
        let summaries = stages.iter()
                              .map(|s| {
                                  let id = s.id();
                                  let message = ctx.stage_log()
                                                   .iter()
                                                   .rev()
                                                   .find(|e| e.stage == id)
                                                   .map(|e| e.message.clone())
                                                   .unwrap_or_default();
                                  StageSummary { stage: id,
                                                 state: ctx.stage_state(id),
                                                 message }
                              })
                              .collect();
        let lookup = self.remediation.clone();
        let ledger = ctx.ledger().summary(ctx.total_inputs(), |c| lookup.as_ref().and_then(|f| f(c)));
        RunReport { run_id: ctx.run_id().to_string(),
                    state,
                    message,
                    run_dir: ctx.run_dir().to_path_buf(),
                    definition_hash: self.definition_hash.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    stages: summaries,
                    stage_log: ctx.stage_log().to_vec(),
                    artifacts: ctx.artifacts().clone(),
                    ledger,
                    failures: ctx.ledger().entries().to_vec(),
                    warnings: ctx.warnings().to_vec() }
    }

    /// Persiste `run_summary.json` y elimina `scratch/` salvo que se conserven intermedios.
    fn finish(&self, ctx: &RunContext, report: &RunReport) {
        let summary_path = ctx.output_path(RUN_SUMMARY_FILE);
        match serde_json::to_vec_pretty(report) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&summary_path, bytes) {
                    warn!("could not write {}: {e}", summary_path.display());
                }
            }
            Err(e) => warn!("could not serialize run summary: {e}"),
        }
        if self.preserve_intermediates {
            debug!("keeping intermediates in {}", ctx.scratch_dir().display());
        } else if let Err(e) = std::fs::remove_dir_all(ctx.scratch_dir()) {
            warn!("could not remove {}: {e}", ctx.scratch_dir().display());
        }
    }
}
