use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, RunContext, StageDefinition, StageId, StageOutcome, StageOutput, StageWarning};

use super::{artifact, ExternalTool, TABULATE_DIR};
use crate::errors::ToolError;
use crate::fanout::bounded_fan_out;
use crate::invoker::{invoke_with_timeout, require_output, ToolInvocation, ToolInvoker, ToolOutput};

/// Convierte cada JSON de la anotación multi-fuente a CSV:
/// `<conversor> <json> <csv>`.
pub struct TabulateStage {
    tool: ExternalTool,
    workers: usize,
    invoker: Arc<dyn ToolInvoker>,
}

impl TabulateStage {
    pub fn new(tool: ExternalTool, workers: usize, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { tool,
               workers,
               invoker }
    }

    async fn tabulate(&self, ctx: &RunContext, cancel: &CancellationToken) -> Result<StageOutcome, CoreEngineError> {
        let inputs = ctx.artifacts()
                        .get(StageId::AnnotateB)
                        .ok_or_else(|| CoreEngineError::stage(StageId::Tabulate, "required annotate_b artifact is missing"))?
                        .entries()
                        .to_vec();
        let out_dir = ctx.run_dir().join(TABULATE_DIR);
        std::fs::create_dir_all(&out_dir)?;

        let jobs: Vec<(PathBuf, PathBuf)> = inputs.iter()
                                                  .map(|e| (e.path.clone(), csv_path(&out_dir, &e.path)))
                                                  .collect();
        let results = bounded_fan_out(jobs, self.workers, cancel, |(json, csv)| {
                          let invoker = self.invoker.clone();
                          let tool = self.tool.clone();
                          async move {
                              let invocation = ToolInvocation::new(&tool.executable).path_arg(&json).path_arg(&csv);
                              invoke_with_timeout(invoker.as_ref(), &invocation, tool.timeout).await
                                                                                              .and_then(ToolOutput::into_result)?;
                              require_output(&csv).await?;
                              Ok::<PathBuf, ToolError>(csv)
                          }
                      }).await;

        let mut output = StageOutput::default();
        for (entry, result) in inputs.into_iter().zip(results) {
            match result {
                Ok(csv) => output.artifacts.push(artifact(&csv, entry.label)?),
                Err(e) => output.warnings.push(StageWarning { stage: StageId::Tabulate,
                                                              label: entry.label,
                                                              message: e.to_string() }),
            }
        }
        output.message = format!("{} tables written", output.artifacts.len());
        if output.artifacts.is_empty() {
            return Ok(StageOutcome::Failed { error: CoreEngineError::stage(StageId::Tabulate, "no table could be produced"),
                                             output });
        }
        Ok(StageOutcome::Succeeded(output))
    }
}

fn csv_path(out_dir: &Path, json: &Path) -> PathBuf {
    let stem = json.file_stem().map_or_else(|| "table".into(), |s| s.to_string_lossy().into_owned());
    out_dir.join(format!("{stem}.csv"))
}

#[async_trait]
impl StageDefinition for TabulateStage {
    fn id(&self) -> StageId {
        StageId::Tabulate
    }

    fn params(&self) -> Value {
        json!({ "executable": Path::new(&self.tool.executable).file_name().map(|n| n.to_string_lossy().into_owned()) })
    }

    async fn run(&self, ctx: &RunContext, cancel: &CancellationToken) -> StageOutcome {
        self.tabulate(ctx, cancel).await.unwrap_or_else(StageOutcome::failed)
    }
}
