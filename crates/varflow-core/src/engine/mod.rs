//! Runner secuencial de etapas y utilidades de ejecución.

mod builder;
mod callback;
mod report;
mod retry;
mod runner;

pub use builder::StageRunnerBuilder;
pub use callback::{StatusCallback, StatusUpdate};
pub use report::{RunReport, StageSummary};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use runner::StageRunner;
