use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CoreEngineError;

/// Etapas de la secuencia fija, en orden de ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Validate,
    Resolve,
    Assemble,
    AnnotateA,
    AnnotateB,
    Tabulate,
    Extract,
}

impl StageId {
    pub const ORDER: [StageId; 7] = [StageId::Validate,
                                     StageId::Resolve,
                                     StageId::Assemble,
                                     StageId::AnnotateA,
                                     StageId::AnnotateB,
                                     StageId::Tabulate,
                                     StageId::Extract];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Validate => "validate",
            StageId::Resolve => "resolve",
            StageId::Assemble => "assemble",
            StageId::AnnotateA => "annotate_a",
            StageId::AnnotateB => "annotate_b",
            StageId::Tabulate => "tabulate",
            StageId::Extract => "extract",
        }
    }

    pub fn position(&self) -> usize {
        StageId::ORDER.iter().position(|s| s == self).unwrap_or(usize::MAX)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acepta el nombre canónico y los alias históricos de cada herramienta.
impl FromStr for StageId {
    type Err = CoreEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "validate" | "validation" => Ok(StageId::Validate),
            "resolve" | "transvar" => Ok(StageId::Resolve),
            "assemble" | "vcf" | "vcf_builder" => Ok(StageId::Assemble),
            "annotate_a" | "sarj" => Ok(StageId::AnnotateA),
            "annotate_b" | "tps" => Ok(StageId::AnnotateB),
            "tabulate" | "json_to_csv" => Ok(StageId::Tabulate),
            "extract" | "report" | "report_extraction" => Ok(StageId::Extract),
            other => Err(CoreEngineError::Configuration(format!("unknown stage '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical_stages() {
        assert_eq!("TransVar".parse::<StageId>().unwrap(), StageId::Resolve);
        assert_eq!("json-to-csv".parse::<StageId>().unwrap(), StageId::Tabulate);
        assert_eq!("annotate_b".parse::<StageId>().unwrap(), StageId::AnnotateB);
        assert!("upload".parse::<StageId>().is_err());
    }

    #[test]
    fn order_is_the_declared_sequence() {
        let positions: Vec<usize> = StageId::ORDER.iter().map(StageId::position).collect();
        assert_eq!(positions, (0..7).collect::<Vec<_>>());
    }
}
