use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, RunContext, StageDefinition, StageId, StageOutcome, StageOutput, StageWarning};

use super::{artifact, upstream_path, ANNOTATE_B_DIR};
use crate::fanout::MultiSourceAnnotator;

/// Segundo anotador, una invocación por fuente de conocimiento.
pub struct AnnotateBStage {
    annotator: MultiSourceAnnotator,
}

impl AnnotateBStage {
    pub fn new(annotator: MultiSourceAnnotator) -> Self {
        Self { annotator }
    }

    async fn annotate(&self, ctx: &RunContext, cancel: &CancellationToken) -> Result<StageOutcome, CoreEngineError> {
        let input = upstream_path(ctx, StageId::AnnotateB, StageId::AnnotateA)?;
        if self.annotator.settings().sources.is_empty() {
            return Err(CoreEngineError::Configuration("no knowledge sources configured".into()));
        }
        let out_dir = ctx.run_dir().join(ANNOTATE_B_DIR);
        std::fs::create_dir_all(&out_dir)?;

        let mut output = StageOutput::default();
        for source_result in self.annotator.annotate(&input, &out_dir, cancel).await {
            match source_result.result {
                Ok(path) => output.artifacts.push(artifact(&path, Some(source_result.source.id))?),
                Err(e) => output.warnings.push(StageWarning { stage: StageId::AnnotateB,
                                                              label: Some(source_result.source.id),
                                                              message: e.to_string() }),
            }
        }
        let total = output.artifacts.len() + output.warnings.len();
        output.message = format!("{} of {total} knowledge sources annotated", output.artifacts.len());
        if output.artifacts.is_empty() {
            return Ok(StageOutcome::Failed { error: CoreEngineError::stage(StageId::AnnotateB, "every knowledge source failed"),
                                             output });
        }
        Ok(StageOutcome::Succeeded(output))
    }
}

#[async_trait]
impl StageDefinition for AnnotateBStage {
    fn id(&self) -> StageId {
        StageId::AnnotateB
    }

    fn params(&self) -> Value {
        let settings = self.annotator.settings();
        json!({
            "sources": settings.sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "retry_attempts": settings.retry.max_attempts,
        })
    }

    async fn run(&self, ctx: &RunContext, cancel: &CancellationToken) -> StageOutcome {
        self.annotate(ctx, cancel).await.unwrap_or_else(StageOutcome::failed)
    }
}
