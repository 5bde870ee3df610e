use async_trait::async_trait;
use log::{debug, info};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, RunContext, StageDefinition, StageId, StageOutcome, StageOutput};

use super::artifact;

pub const FINAL_REPORT_FILE: &str = "final_report.csv";
const SOURCE_COLUMN: &str = "knowledge_source";

/// Une las tablas por fuente en `final_report.csv`, con la fuente como
/// primera columna. La cabecera es la de la primera tabla.
#[derive(Debug, Default)]
pub struct ExtractStage;

impl ExtractStage {
    pub fn new() -> Self {
        Self
    }

    fn extract(&self, ctx: &RunContext) -> Result<StageOutput, CoreEngineError> {
        let tables = ctx.artifacts()
                        .get(StageId::Tabulate)
                        .ok_or_else(|| CoreEngineError::stage(StageId::Extract, "required tabulate artifact is missing"))?;
        let mut report = String::new();
        let mut rows = 0usize;
        for entry in tables.entries() {
            let label = entry.label.clone().unwrap_or_else(|| {
                                              entry.path
                                                   .file_stem()
                                                   .map_or_else(String::new, |s| s.to_string_lossy().into_owned())
                                          });
            let text = std::fs::read_to_string(&entry.path)?;
            let mut lines = text.lines().filter(|l| !l.trim().is_empty());
            let Some(header) = lines.next() else {
                debug!("table {} is empty", entry.path.display());
                continue;
            };
            if report.is_empty() {
                report.push_str(&format!("{SOURCE_COLUMN},{header}\n"));
            }
            for line in lines {
                report.push_str(&quote_field(&label));
                report.push(',');
                report.push_str(line);
                report.push('\n');
                rows += 1;
            }
        }
        if report.is_empty() {
            return Err(CoreEngineError::stage(StageId::Extract, "every table is empty"));
        }
        let path = ctx.output_path(FINAL_REPORT_FILE);
        std::fs::write(&path, report)?;
        info!("final report: {rows} rows from {} tables", tables.len());
        Ok(StageOutput::with_message(format!("{rows} report rows")).artifact(artifact(&path, None)?))
    }
}

fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[async_trait]
impl StageDefinition for ExtractStage {
    fn id(&self) -> StageId {
        StageId::Extract
    }

    async fn run(&self, ctx: &RunContext, _cancel: &CancellationToken) -> StageOutcome {
        match self.extract(ctx) {
            Ok(output) => StageOutcome::Succeeded(output),
            Err(e) => StageOutcome::failed(e),
        }
    }
}
