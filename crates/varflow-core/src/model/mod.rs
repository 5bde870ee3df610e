//! Modelos del motor: artefactos, ledger de fallos y contexto de ejecución.

pub mod artifact;
pub mod context;
pub mod ledger;

pub use artifact::{ArtifactEntry, ArtifactMap, ArtifactPaths};
pub use context::{generate_run_id, RunContext, StageLogEntry};
pub use ledger::{CategorySummary, FailureLedger, LedgerEntry, LedgerSummary};
