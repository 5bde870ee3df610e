use std::path::Path;

use async_trait::async_trait;
use log::info;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, RunContext, StageDefinition, StageId, StageOutcome, StageOutput};
use varflow_domain::{FailureOrigin, ResolutionOutcome};

use super::{artifact, read_json, upstream_path, write_json, RESOLUTION_FILE};
use crate::assembler::resolution_ledger_entry;
use crate::resolver::{CoordinateResolver, IndexedDescriptor};

pub struct ResolveStage {
    resolver: CoordinateResolver,
}

impl ResolveStage {
    pub fn new(resolver: CoordinateResolver) -> Self {
        Self { resolver }
    }

    async fn resolve(&self, ctx: &RunContext, cancel: &CancellationToken) -> Result<StageOutcome, CoreEngineError> {
        let input = upstream_path(ctx, StageId::Resolve, StageId::Validate)?;
        let batch: Vec<IndexedDescriptor> = read_json(&input)?;
        let resolver = self.resolver.with_scratch_dir(ctx.scratch_dir());
        let outcomes = resolver.resolve_batch(&batch, cancel).await;

        let path = ctx.output_path(RESOLUTION_FILE);
        write_json(&path, &outcomes)?;

        let mut output = StageOutput::default();
        let mut dispatched = 0usize;
        let mut unreachable = 0usize;
        for outcome in &outcomes {
            match outcome {
                ResolutionOutcome::Resolved(_) => dispatched += 1,
                ResolutionOutcome::Failed(failure) => {
                    if failure.origin.was_dispatched() {
                        dispatched += 1;
                    }
                    if failure.origin == FailureOrigin::ToolUnavailable {
                        unreachable += 1;
                    }
                    output.ledger.push(resolution_ledger_entry(failure));
                }
            }
        }
        let resolved = outcomes.len() - output.ledger.len();
        output.message = format!("{resolved} of {} descriptors resolved", outcomes.len());
        info!("{}", output.message);
        let output = output.artifact(artifact(&path, None)?);

        // Los rechazos previos a la invocación no cuentan: la herramienta
        // es inalcanzable si ningún descriptor despachado pudo arrancarla.
        if dispatched > 0 && unreachable == dispatched {
            let error = CoreEngineError::stage(StageId::Resolve,
                                               format!("coordinate annotator '{}' could not be started",
                                                       resolver.settings().executable));
            return Ok(StageOutcome::Failed { error, output });
        }
        Ok(StageOutcome::Succeeded(output))
    }
}

#[async_trait]
impl StageDefinition for ResolveStage {
    fn id(&self) -> StageId {
        StageId::Resolve
    }

    fn is_bypassed(&self, ctx: &RunContext) -> bool {
        ctx.artifacts().contains(StageId::Assemble)
    }

    fn params(&self) -> Value {
        let s = self.resolver.settings();
        json!({
            "executable": Path::new(&s.executable).file_name().map(|n| n.to_string_lossy().into_owned()),
            "database": s.database,
            "reference": s.reference,
            "use_ccds": s.use_ccds,
        })
    }

    async fn run(&self, ctx: &RunContext, cancel: &CancellationToken) -> StageOutcome {
        self.resolve(ctx, cancel).await.unwrap_or_else(StageOutcome::failed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::errors::ToolError;
    use crate::invoker::{ToolInvocation, ToolInvoker, ToolOutput};
    use crate::resolver::ResolverSettings;
    use crate::stages::DESCRIPTORS_FILE;
    use varflow_core::ArtifactEntry;
    use varflow_domain::VariantDescriptor;

    struct MissingTool;

    #[async_trait]
    impl ToolInvoker for MissingTool {
        async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Spawn { program: invocation.program.clone(),
                                   message: "No such file or directory".into() })
        }
    }

    fn context_with(dir: &Path, run_id: &str, descriptors: &[&str]) -> RunContext {
        let ctx = RunContext::create_with_id(dir, run_id.into()).unwrap();
        let batch = IndexedDescriptor::enumerate(descriptors.iter().map(|d| VariantDescriptor::new(*d)));
        let path = ctx.output_path(DESCRIPTORS_FILE);
        write_json(&path, &batch).unwrap();
        ctx.with_supplied_artifact(StageId::Validate, ArtifactEntry::from_file(&path, None).unwrap())
    }

    fn stage() -> ResolveStage {
        let settings = ResolverSettings { executable: "/nonexistent/transvar".into(),
                                          ..ResolverSettings::default() };
        ResolveStage::new(CoordinateResolver::new(settings, Arc::new(MissingTool)))
    }

    #[tokio::test]
    async fn unreachable_tool_fails_the_stage_despite_prechecked_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(dir.path(), "r1", &["GENE1:fusion(GENE2)", "ATM:p.L507F"]);
        let outcome = stage().run(&ctx, &CancellationToken::new()).await;
        let StageOutcome::Failed { error, output } = outcome else {
            panic!("resolve should fail when the tool cannot start");
        };
        assert!(error.to_string().contains("could not be started"), "{error}");
        assert_eq!(output.ledger.len(), 2);
        assert_eq!(output.ledger[1].category, "tool_nonzero_exit");
    }

    #[tokio::test]
    async fn only_prechecked_rejections_do_not_blame_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(dir.path(), "r2", &["GENE1:fusion(GENE2)"]);
        let outcome = stage().run(&ctx, &CancellationToken::new()).await;
        let StageOutcome::Succeeded(output) = outcome else {
            panic!("nothing was dispatched, the tool is not at fault");
        };
        assert_eq!(output.ledger.len(), 1);
        assert_eq!(output.ledger[0].category, "unsupported_coordinate_type");
    }
}
