//! Ensamblado del artefacto posicional y del ledger de fallos.
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use varflow_core::{FailureLedger, LedgerEntry, LedgerSummary, StageId};
use varflow_domain::{assemble_record, render_vcf, CoordinateRecord, FailureCategory, PositionalRecord,
                     ResolutionFailure, VcfProvenance};

/// Versión declarada en la cabecera cuando la herramienta no la informa.
pub const TOOL_VERSION_PLACEHOLDER: &str = "unknown";

/// Resultado de ensamblar un lote de registros resueltos.
#[derive(Debug, Clone, Default)]
pub struct AssemblyOutcome {
    pub records: Vec<PositionalRecord>,
    pub failures: Vec<LedgerEntry>,
}

/// Ensambla en orden de envío; cada registro produce una línea o un fallo.
pub fn assemble_records(records: &[CoordinateRecord]) -> AssemblyOutcome {
    let mut sorted: Vec<&CoordinateRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.index);
    let mut outcome = AssemblyOutcome::default();
    for record in sorted {
        match assemble_record(record) {
            Ok(positional) => outcome.records.push(positional),
            Err(failure) => outcome.failures.push(LedgerEntry { stage: StageId::Assemble,
                                                                index: Some(record.index),
                                                                raw_input: record.descriptor.to_string(),
                                                                category: failure.category.as_str().to_string(),
                                                                group: Some(record.coordinate_type.as_str().to_string()),
                                                                detail: failure.message }),
        }
    }
    outcome
}

/// Entrada del ledger para un descriptor no resuelto.
pub fn resolution_ledger_entry(failure: &ResolutionFailure) -> LedgerEntry {
    LedgerEntry { stage: StageId::Resolve,
                  index: Some(failure.index),
                  raw_input: failure.descriptor.to_string(),
                  category: failure.category.as_str().to_string(),
                  group: failure.coordinate_type_guess.map(|t| t.as_str().to_string()),
                  detail: failure.message.clone() }
}

/// Sugerencia de remediación para una categoría serializada.
pub fn remediation_for(category: &str) -> Option<String> {
    FailureCategory::from_str(category).ok().map(|c| c.remediation_hint().to_string())
}

pub fn render_positional_artifact(records: &[PositionalRecord], generated_at: DateTime<Utc>) -> String {
    let provenance = VcfProvenance::new(varflow_core::constants::SOURCE_NAME, TOOL_VERSION_PLACEHOLDER, generated_at);
    render_vcf(records, &provenance)
}

/// Contenido de `failure_ledger.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub summary: LedgerSummary,
    pub entries: Vec<LedgerEntry>,
}

impl FailureReport {
    pub fn build(entries: Vec<LedgerEntry>, total_inputs: usize) -> Self {
        let mut ledger = FailureLedger::default();
        ledger.extend(entries);
        Self { summary: ledger.summary(total_inputs, remediation_for),
               entries: ledger.entries().to_vec() }
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varflow_domain::{CoordinateType, VariantDescriptor};

    fn record(index: usize, notation: &str, reference: &str, alternate: &str) -> CoordinateRecord {
        let descriptor = VariantDescriptor::new(notation);
        CoordinateRecord { index,
                           invocation_input: descriptor.invocation_input(None),
                           descriptor,
                           chrom: "17".into(),
                           pos: 43_045_700,
                           reference: reference.into(),
                           alternate: alternate.into(),
                           coordinate_type: CoordinateType::Protein,
                           transcript: None,
                           gene: None,
                           annotation: None }
    }

    #[test]
    fn records_and_failures_partition_input_in_submission_order() {
        let records = vec![record(2, "BRCA1:p.C61G", "A", "C"),
                           record(0, "BRCA1:p.E23fs", "AG", "A"),
                           record(1, "BRCA1:p.X1dup", "A", "A")];
        let out = assemble_records(&records);
        assert_eq!(out.records.len() + out.failures.len(), 3);
        let indices: Vec<usize> = out.records.iter().map(|r| r.source_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(out.failures[0].category, "malformed_coordinate");
        assert_eq!(out.failures[0].group.as_deref(), Some("protein"));
    }

    #[test]
    fn report_carries_remediation_hints() {
        let out = assemble_records(&[record(0, "BRCA1:p.X1dup", "A", "A")]);
        let report = FailureReport::build(out.failures, 4);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.categories[0].percentage, 25.0);
        assert!(report.summary.categories[0].remediation.is_some());
        assert!(remediation_for("no_such_category").is_none());
    }
}
