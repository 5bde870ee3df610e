//! Callback de estado invocado tras cada transición.
//!
//! El callback corre en el pool bloqueante de tokio y se espera como máximo
//! `budget`; si tarda más, falla o entra en pánico, se registra con `warn!`
//! y la ejecución continúa.
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use serde::Serialize;

use crate::stage::{StageId, StageState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub run_id: String,
    pub stage: StageId,
    pub state: StageState,
    /// Tiempo de la etapa hasta esta transición.
    pub elapsed: Duration,
    pub message: String,
}

pub type StatusCallback = Arc<dyn Fn(&StatusUpdate) -> Result<(), String> + Send + Sync>;

pub(crate) async fn notify(callback: Option<&StatusCallback>, budget: Duration, update: StatusUpdate) {
    let Some(callback) = callback.cloned() else {
        return;
    };
    let stage = update.stage;
    let state = update.state;
    let handle = tokio::task::spawn_blocking(move || callback(&update));
    match tokio::time::timeout(budget, handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("status callback failed on {stage} -> {}: {e}", state.as_str()),
        Ok(Err(join)) => warn!("status callback panicked on {stage} -> {}: {join}", state.as_str()),
        Err(_) => warn!("status callback exceeded {budget:?} on {stage} -> {}; not waiting", state.as_str()),
    }
}
