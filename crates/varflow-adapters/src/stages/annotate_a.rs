use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, RunContext, StageDefinition, StageId, StageOutcome, StageOutput};

use super::{artifact, upstream_path, ExternalTool, ANNOTATION_A_FILE};
use crate::invoker::{invoke_with_timeout, require_output, ToolInvocation, ToolInvoker, ToolOutput};

/// Primer anotador: `<exe> <vcf> <salida>`.
pub struct AnnotateAStage {
    tool: ExternalTool,
    invoker: Arc<dyn ToolInvoker>,
}

impl AnnotateAStage {
    pub fn new(tool: ExternalTool, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { tool, invoker }
    }

    async fn annotate(&self, ctx: &RunContext) -> Result<StageOutput, CoreEngineError> {
        let input = upstream_path(ctx, StageId::AnnotateA, StageId::Assemble)?;
        let output_path = ctx.output_path(ANNOTATION_A_FILE);
        let invocation = ToolInvocation::new(&self.tool.executable).path_arg(&input)
                                                                  .path_arg(&output_path)
                                                                  .in_dir(ctx.run_dir());
        let fail = |e: crate::errors::ToolError| CoreEngineError::stage(StageId::AnnotateA, e.to_string());
        let out = invoke_with_timeout(self.invoker.as_ref(), &invocation, self.tool.timeout).await
                                                                                          .and_then(ToolOutput::into_result)
                                                                                          .map_err(fail)?;
        require_output(&output_path).await.map_err(fail)?;
        info!("annotate_a finished in {:?}", out.duration);
        Ok(StageOutput::with_message(format!("annotation written to {}", output_path.display()))
            .artifact(artifact(&output_path, None)?))
    }
}

#[async_trait]
impl StageDefinition for AnnotateAStage {
    fn id(&self) -> StageId {
        StageId::AnnotateA
    }

    fn params(&self) -> Value {
        json!({ "executable": Path::new(&self.tool.executable).file_name().map(|n| n.to_string_lossy().into_owned()) })
    }

    async fn run(&self, ctx: &RunContext, _cancel: &CancellationToken) -> StageOutcome {
        match self.annotate(ctx).await {
            Ok(output) => StageOutcome::Succeeded(output),
            Err(e) => StageOutcome::failed(e),
        }
    }
}
