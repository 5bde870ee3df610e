use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{StageId, StageOutcome};
use crate::model::RunContext;

/// Trait que define una etapa del pipeline.
///
/// `run` recibe el contexto en sólo lectura: los resultados vuelven en el
/// `StageOutcome` y es el runner quien los incorpora al contexto.
#[async_trait]
pub trait StageDefinition: Send + Sync {
    fn id(&self) -> StageId;

    fn name(&self) -> &str {
        self.id().as_str()
    }

    /// Sólo la extracción final es no fatal.
    fn is_fatal(&self) -> bool {
        self.id() != StageId::Extract
    }

    /// `true` si el artefacto que produce esta etapa ya fue suministrado.
    fn is_bypassed(&self, _ctx: &RunContext) -> bool {
        false
    }

    /// Parámetros deterministas que entran en el hash de definición.
    fn params(&self) -> Value {
        Value::Null
    }

    async fn run(&self, ctx: &RunContext, cancel: &CancellationToken) -> StageOutcome;
}
