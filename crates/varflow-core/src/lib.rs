//! varflow-core: runner secuencial de etapas, contexto de ejecución,
//! artefactos, ledger de fallos y eventos. Neutral respecto al dominio.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod stage;

pub use engine::{retry_with_backoff, RetryPolicy, RunReport, StageRunner, StageRunnerBuilder, StageSummary,
                 StatusCallback, StatusUpdate};
pub use errors::CoreEngineError;
pub use event::{EventStore, InMemoryEventStore, JsonlEventStore, RunEvent, RunEventKind};
pub use model::{ArtifactEntry, ArtifactMap, ArtifactPaths, FailureLedger, LedgerEntry, LedgerSummary, RunContext,
                StageLogEntry};
pub use stage::{RunState, StageDefinition, StageId, StageOutcome, StageOutput, StageState, StageWarning};
pub use tokio_util::sync::CancellationToken;
