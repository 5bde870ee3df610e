//! Etapas: identificadores, estados, trait de definición y resultado.

mod definition;
mod id;
mod outcome;
mod status;

pub use definition::StageDefinition;
pub use id::StageId;
pub use outcome::{StageOutcome, StageOutput, StageWarning};
pub use status::{RunState, StageState};
