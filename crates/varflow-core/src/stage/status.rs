use serde::{Deserialize, Serialize};

/// Estado de una etapa.
///
/// Transiciones válidas:
/// - `Pending` -> `Running` -> `Succeeded` | `Failed`
/// - `Pending` -> `Skipped` (deshabilitada o artefacto ya suministrado)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Succeeded => "succeeded",
            StageState::Failed => "failed",
            StageState::Skipped => "skipped",
        }
    }

    /// La etapa siguiente puede comenzar.
    pub fn allows_next(&self) -> bool {
        matches!(self, StageState::Succeeded | StageState::Skipped)
    }
}

/// Estado global de la ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    Running,
    Completed,
    Failed,
    PartiallyCompleted,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::PartiallyCompleted => "partially_completed",
        }
    }
}
