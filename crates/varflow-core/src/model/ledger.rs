//! Ledger acumulado de fallos por ítem.
//!
//! El motor no interpreta las categorías: son cadenas que el dominio define.
//! El resumen agrupa por categoría y por grupo (tipo de coordenada), con
//! porcentaje sobre el total de entradas y una muestra acotada de entradas
//! crudas por categoría.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::LEDGER_SAMPLE_LIMIT;
use crate::stage::StageId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub stage: StageId,
    /// Índice de envío del descriptor, si aplica.
    pub index: Option<usize>,
    pub raw_input: String,
    pub category: String,
    /// Grupo de diagnóstico (tipo de coordenada); `None` si no se pudo deducir.
    pub group: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureLedger {
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub percentage: f64,
    pub samples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_inputs: usize,
    pub failed: usize,
    pub categories: Vec<CategorySummary>,
    pub by_group: IndexMap<String, usize>,
}

/// Grupo usado cuando una entrada no tiene tipo de coordenada.
pub const UNKNOWN_GROUP: &str = "unknown";

impl FailureLedger {
    pub fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = LedgerEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Índices de envío presentes en el ledger.
    pub fn indices(&self) -> Vec<usize> {
        self.entries.iter().filter_map(|e| e.index).collect()
    }

    /// Resumen con una sugerencia de remediación por categoría.
    pub fn summary<H>(&self, total_inputs: usize, hint: H) -> LedgerSummary
        where H: Fn(&str) -> Option<String>
    {
        let mut grouped: IndexMap<&str, Vec<&LedgerEntry>> = IndexMap::new();
        let mut by_group: IndexMap<String, usize> = IndexMap::new();
        for entry in &self.entries {
            grouped.entry(entry.category.as_str()).or_default().push(entry);
            let group = entry.group.clone().unwrap_or_else(|| UNKNOWN_GROUP.to_string());
            *by_group.entry(group).or_insert(0) += 1;
        }
        let categories = grouped.into_iter()
                                .map(|(category, entries)| {
                                    let count = entries.len();
                                    let percentage = if total_inputs == 0 {
                                        0.0
                                    } else {
                                        (count as f64 * 10_000.0 / total_inputs as f64).round() / 100.0
                                    };
                                    CategorySummary { category: category.to_string(),
                                                      count,
                                                      percentage,
                                                      samples: entries.iter()
                                                                      .take(LEDGER_SAMPLE_LIMIT)
                                                                      .map(|e| e.raw_input.clone())
                                                                      .collect(),
                                                      remediation: hint(category) }
                                })
                                .collect();
        LedgerSummary { total_inputs,
                        failed: self.entries.len(),
                        categories,
                        by_group }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize, category: &str, group: Option<&str>) -> LedgerEntry {
        LedgerEntry { stage: StageId::Resolve,
                      index: Some(i),
                      raw_input: format!("GENE{i}:p.X{i}Y"),
                      category: category.into(),
                      group: group.map(str::to_string),
                      detail: String::new() }
    }

    #[test]
    fn summary_counts_and_bounds_samples() {
        let mut ledger = FailureLedger::default();
        for i in 0..7 {
            ledger.push(entry(i, "timeout", Some("protein")));
        }
        ledger.push(entry(7, "unknown", None));
        let summary = ledger.summary(16, |c| (c == "timeout").then(|| "raise the timeout".to_string()));
        assert_eq!(summary.failed, 8);
        assert_eq!(summary.categories[0].category, "timeout");
        assert_eq!(summary.categories[0].count, 7);
        assert_eq!(summary.categories[0].samples.len(), LEDGER_SAMPLE_LIMIT);
        assert_eq!(summary.categories[0].percentage, 43.75);
        assert_eq!(summary.categories[0].remediation.as_deref(), Some("raise the timeout"));
        assert!(summary.categories[1].remediation.is_none());
        assert_eq!(summary.by_group.get("protein"), Some(&7));
        assert_eq!(summary.by_group.get(UNKNOWN_GROUP), Some(&1));
    }

    #[test]
    fn empty_input_set_has_zero_percentages() {
        let mut ledger = FailureLedger::default();
        ledger.push(entry(0, "timeout", None));
        assert_eq!(ledger.summary(0, |_| None).categories[0].percentage, 0.0);
    }
}
