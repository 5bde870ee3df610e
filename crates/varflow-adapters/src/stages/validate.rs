use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use varflow_core::{CoreEngineError, LedgerEntry, RunContext, StageDefinition, StageId, StageOutcome, StageOutput};
use varflow_domain::{inspect_vcf, DomainError, FailureCategory, VariantDescriptor};

use super::{artifact, write_json, DESCRIPTORS_FILE};
use crate::resolver::IndexedDescriptor;

/// Origen de los descriptores de una ejecución.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Descriptors(Vec<VariantDescriptor>),
    /// CSV con columnas `gene` y `protein_change` (o `variant`).
    Csv(PathBuf),
    /// VCF ya construido; resolución y ensamblado se omiten.
    Vcf(PathBuf),
}

impl InputSource {
    fn kind(&self) -> &'static str {
        match self {
            InputSource::Descriptors(_) => "descriptors",
            InputSource::Csv(_) => "csv",
            InputSource::Vcf(_) => "vcf",
        }
    }
}

pub struct ValidateStage {
    source: InputSource,
}

impl ValidateStage {
    pub fn new(source: InputSource) -> Self {
        Self { source }
    }

    fn validate_vcf(&self, path: &Path) -> Result<StageOutput, CoreEngineError> {
        let text = std::fs::read_to_string(path)?;
        let count = inspect_vcf(&text).map_err(|e| CoreEngineError::stage(StageId::Validate, e.to_string()))?;
        let mut output = StageOutput::with_message(format!("supplied VCF with {count} records"));
        output.input_count = Some(count);
        Ok(output.artifact(artifact(path, None)?))
    }

    fn validate_descriptors(&self, ctx: &RunContext, descriptors: Vec<VariantDescriptor>) -> StageOutcome {
        if descriptors.is_empty() {
            return StageOutcome::failed(CoreEngineError::stage(StageId::Validate, "no variant descriptors supplied"));
        }
        let total = descriptors.len();
        let mut output = StageOutput::default();
        output.input_count = Some(total);
        let mut valid = Vec::with_capacity(total);
        for item in IndexedDescriptor::enumerate(descriptors) {
            match item.descriptor.validate() {
                Ok(()) => valid.push(item),
                Err(e) => {
                    debug!("descriptor #{} rejected: {e}", item.index);
                    output.ledger.push(LedgerEntry { stage: StageId::Validate,
                                                     index: Some(item.index),
                                                     raw_input: item.descriptor.to_string(),
                                                     category: FailureCategory::InputValidationError.as_str().into(),
                                                     group: item.descriptor
                                                                .coordinate_type_guess()
                                                                .map(|t| t.as_str().to_string()),
                                                     detail: e.to_string() });
                }
            }
        }
        if valid.is_empty() {
            output.message = format!("all {total} descriptors failed validation");
            return StageOutcome::Failed { error: CoreEngineError::stage(StageId::Validate, output.message.clone()),
                                          output };
        }
        let path = ctx.output_path(DESCRIPTORS_FILE);
        let entry = write_json(&path, &valid).and_then(|_| artifact(&path, None));
        match entry {
            Ok(entry) => {
                output.message = format!("{} of {total} descriptors valid", valid.len());
                info!("{}", output.message);
                StageOutcome::Succeeded(output.artifact(entry))
            }
            Err(error) => StageOutcome::Failed { error, output },
        }
    }
}

#[async_trait]
impl StageDefinition for ValidateStage {
    fn id(&self) -> StageId {
        StageId::Validate
    }

    fn params(&self) -> Value {
        json!({ "input": self.source.kind() })
    }

    async fn run(&self, ctx: &RunContext, _cancel: &CancellationToken) -> StageOutcome {
        match &self.source {
            InputSource::Descriptors(list) => self.validate_descriptors(ctx, list.clone()),
            InputSource::Csv(path) => {
                let parsed = std::fs::read_to_string(path).map_err(CoreEngineError::from)
                                                          .and_then(|text| {
                                                              parse_descriptor_csv(&text)
                                                                  .map_err(|e| CoreEngineError::stage(StageId::Validate, e.to_string()))
                                                          });
                match parsed {
                    Ok(descriptors) => self.validate_descriptors(ctx, descriptors),
                    Err(e) => StageOutcome::failed(e),
                }
            }
            InputSource::Vcf(path) => match self.validate_vcf(path) {
                Ok(output) => StageOutcome::Succeeded(output),
                Err(e) => StageOutcome::failed(e),
            },
        }
    }
}

/// Lee descriptores de un CSV con cabecera. Las cabeceras no distinguen
/// mayúsculas; las filas sin gen o sin cambio se descartan.
pub fn parse_descriptor_csv(text: &str) -> Result<Vec<VariantDescriptor>, DomainError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| DomainError::Parse("CSV input is empty".into()))?;
    let columns: Vec<String> = split_csv_line(header.trim_start_matches('\u{feff}')).into_iter()
                                                                                    .map(|c| c.trim().to_ascii_lowercase())
                                                                                    .collect();
    let gene_col = columns.iter()
                          .position(|c| c == "gene")
                          .ok_or_else(|| DomainError::Parse("CSV input lacks a 'gene' column".into()))?;
    let change_col = columns.iter()
                            .position(|c| c == "protein_change")
                            .or_else(|| columns.iter().position(|c| c == "variant"))
                            .ok_or_else(|| DomainError::Parse("CSV input lacks a 'protein_change' or 'variant' column".into()))?;

    let mut descriptors = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let value = |i: usize| fields.get(i).map(|f| f.trim()).unwrap_or_default().to_string();
        let (gene, change) = (value(gene_col), value(change_col));
        if gene.is_empty() || change.is_empty() {
            continue;
        }
        descriptors.push(VariantDescriptor::new(change).with_gene(gene));
    }
    Ok(descriptors)
}

/// Separa una línea CSV respetando comillas dobles (`""` escapa una comilla).
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current.trim_end_matches('\r').to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_headers_are_case_insensitive_and_incomplete_rows_skipped() {
        let text = "Sample,GENE,Protein_Change\ns1,ATM,p.L507F\ns2,,p.V600E\ns3,\"BRAF\",\"p.V600E\"\ns4,TP53,\n";
        let descriptors = parse_descriptor_csv(text).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].to_string(), "ATM:p.L507F");
        assert_eq!(descriptors[1].gene.as_deref(), Some("BRAF"));
    }

    #[test]
    fn variant_column_is_accepted() {
        let descriptors = parse_descriptor_csv("gene,variant\r\nEGFR,p.L858R\r\n").unwrap();
        assert_eq!(descriptors[0].notation, "p.L858R");
    }

    #[test]
    fn missing_columns_are_rejected() {
        assert!(parse_descriptor_csv("gene,sample\nATM,s1\n").is_err());
        assert!(parse_descriptor_csv("").is_err());
    }

    #[test]
    fn quoted_commas_stay_in_the_field() {
        assert_eq!(split_csv_line("a,\"b,c\",\"d\"\"e\""), vec!["a", "b,c", "d\"e"]);
    }

    #[tokio::test]
    async fn invalid_descriptors_go_to_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::create_with_id(dir.path(), "v1".into()).unwrap();
        let stage = ValidateStage::new(InputSource::Descriptors(vec![VariantDescriptor::new("ATM:p.L507F"),
                                                                     VariantDescriptor::new("bad\u{7}input")]));
        let StageOutcome::Succeeded(output) = stage.run(&ctx, &CancellationToken::new()).await else {
            panic!("validation should succeed");
        };
        assert_eq!(output.input_count, Some(2));
        assert_eq!(output.ledger.len(), 1);
        assert_eq!(output.ledger[0].index, Some(1));
        let written: Vec<IndexedDescriptor> =
            serde_json::from_str(&std::fs::read_to_string(ctx.output_path(DESCRIPTORS_FILE)).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].index, 0);
    }

    #[tokio::test]
    async fn empty_input_fails_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::create_with_id(dir.path(), "v2".into()).unwrap();
        let outcome = ValidateStage::new(InputSource::Descriptors(vec![])).run(&ctx, &CancellationToken::new()).await;
        assert!(!outcome.is_success());
    }
}
