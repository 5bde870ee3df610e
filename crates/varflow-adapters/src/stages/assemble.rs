use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, RunContext, StageDefinition, StageId, StageOutcome, StageOutput};
use varflow_domain::ResolutionOutcome;

use super::{artifact, read_json, upstream_path, FAILURE_LEDGER_FILE, VARIANTS_FILE};
use crate::assembler::{assemble_records, render_positional_artifact, FailureReport};

/// Construye `variants.vcf` y `failure_ledger.json` a partir de la resolución.
#[derive(Debug, Default)]
pub struct AssembleStage;

impl AssembleStage {
    pub fn new() -> Self {
        Self
    }

    fn assemble(&self, ctx: &RunContext) -> Result<StageOutcome, CoreEngineError> {
        let input = upstream_path(ctx, StageId::Assemble, StageId::Resolve)?;
        let outcomes: Vec<ResolutionOutcome> = read_json(&input)?;
        let (records, _failures) = ResolutionOutcome::partition(outcomes);
        let assembled = assemble_records(&records);

        let mut entries = ctx.ledger().entries().to_vec();
        entries.extend(assembled.failures.iter().cloned());
        let report = FailureReport::build(entries, ctx.total_inputs());
        report.write_to(&ctx.output_path(FAILURE_LEDGER_FILE))?;
        for category in &report.summary.categories {
            warn!("{} descriptors failed as {} ({}%)", category.count, category.category, category.percentage);
        }

        let mut output = StageOutput::default();
        output.ledger = assembled.failures;
        if assembled.records.is_empty() {
            output.message = "no records could be assembled".into();
            return Ok(StageOutcome::Failed { error: CoreEngineError::stage(StageId::Assemble, output.message.clone()),
                                             output });
        }
        let path = ctx.output_path(VARIANTS_FILE);
        std::fs::write(&path, render_positional_artifact(&assembled.records, Utc::now()))?;
        output.message = format!("{} positional records written", assembled.records.len());
        info!("{}", output.message);
        Ok(StageOutcome::Succeeded(output.artifact(artifact(&path, None)?)))
    }
}

#[async_trait]
impl StageDefinition for AssembleStage {
    fn id(&self) -> StageId {
        StageId::Assemble
    }

    fn is_bypassed(&self, ctx: &RunContext) -> bool {
        ctx.artifacts().contains(StageId::Assemble)
    }

    async fn run(&self, ctx: &RunContext, _cancel: &CancellationToken) -> StageOutcome {
        self.assemble(ctx).unwrap_or_else(StageOutcome::failed)
    }
}
