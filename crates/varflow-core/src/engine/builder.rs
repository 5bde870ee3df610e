//! Builder para `StageRunner`.
//!
//! ```ignore
//! let runner = StageRunner::builder(JsonlEventStore::new(path))
//!     .stage(ValidateStage::new(..))
//!     .stage(ResolveStage::new(..))
//!     .disable(StageId::AnnotateA)
//!     .status_callback(Arc::new(|u| { println!("{u:?}"); Ok(()) }))
//!     .build();
//! ```
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{StageRunner, StatusCallback};
use crate::event::EventStore;
use crate::stage::{StageDefinition, StageId};

pub(crate) type RemediationLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct StageRunnerBuilder<E: EventStore> {
    pub(crate) event_store: E,
    pub(crate) stages: Vec<Box<dyn StageDefinition>>,
    pub(crate) disabled: HashSet<StageId>,
    pub(crate) callback: Option<StatusCallback>,
    pub(crate) callback_budget: Duration,
    pub(crate) cancel: CancellationToken,
    pub(crate) preserve_intermediates: bool,
    pub(crate) remediation: Option<RemediationLookup>,
}

impl<E: EventStore> StageRunnerBuilder<E> {
    pub(crate) fn new(event_store: E) -> Self {
        Self { event_store,
               stages: Vec::new(),
               disabled: HashSet::new(),
               callback: None,
               callback_budget: Duration::from_millis(250),
               cancel: CancellationToken::new(),
               preserve_intermediates: false,
               remediation: None }
    }

    /// Añade una etapa. Las etapas se ordenan por su posición en la secuencia fija.
    pub fn stage<S: StageDefinition + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn boxed_stage(mut self, stage: Box<dyn StageDefinition>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn disable(mut self, stage: StageId) -> Self {
        self.disabled.insert(stage);
        self
    }

    pub fn disable_all(mut self, stages: impl IntoIterator<Item = StageId>) -> Self {
        self.disabled.extend(stages);
        self
    }

    pub fn status_callback(mut self, callback: StatusCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn callback_budget(mut self, budget: Duration) -> Self {
        self.callback_budget = budget;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn preserve_intermediates(mut self, preserve: bool) -> Self {
        self.preserve_intermediates = preserve;
        self
    }

    /// Tabla de remediación para el resumen del ledger (categoría -> sugerencia).
    pub fn remediation<F>(mut self, lookup: F) -> Self
        where F: Fn(&str) -> Option<String> + Send + Sync + 'static
    {
        self.remediation = Some(Arc::new(lookup));
        self
    }

    pub fn build(mut self) -> StageRunner<E> {
        self.stages.sort_by_key(|s| s.id().position());
        StageRunner::from_builder(self)
    }
}
