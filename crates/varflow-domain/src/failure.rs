//! Taxonomía de fallos por ítem y tabla de clasificación.
//!
//! La clasificación es heurística: se busca la primera regla cuyo patrón
//! (subcadena, sin distinguir mayúsculas) aparece en el texto del fallo. La
//! tabla es extensible desde configuración; las reglas extra van delante de
//! las integradas. Lo que no coincide queda como `Unknown`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Categoría de fallo de un descriptor individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    InputValidationError,
    UnparseableOutput,
    Timeout,
    UnsupportedCoordinateType,
    AmbiguousTranscript,
    ToolNonzeroExit,
    UnsupportedVariantShape,
    MalformedCoordinate,
    Cancelled,
    Unknown,
}

/// Familia de la taxonomía de errores a la que pertenece una categoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureFamily {
    InputValidation,
    Resolution,
    Assembly,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 10] = [FailureCategory::InputValidationError,
                                            FailureCategory::UnparseableOutput,
                                            FailureCategory::Timeout,
                                            FailureCategory::UnsupportedCoordinateType,
                                            FailureCategory::AmbiguousTranscript,
                                            FailureCategory::ToolNonzeroExit,
                                            FailureCategory::UnsupportedVariantShape,
                                            FailureCategory::MalformedCoordinate,
                                            FailureCategory::Cancelled,
                                            FailureCategory::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::InputValidationError => "input_validation_error",
            FailureCategory::UnparseableOutput => "unparseable_output",
            FailureCategory::Timeout => "timeout",
            FailureCategory::UnsupportedCoordinateType => "unsupported_coordinate_type",
            FailureCategory::AmbiguousTranscript => "ambiguous_transcript",
            FailureCategory::ToolNonzeroExit => "tool_nonzero_exit",
            FailureCategory::UnsupportedVariantShape => "unsupported_variant_shape",
            FailureCategory::MalformedCoordinate => "malformed_coordinate",
            FailureCategory::Cancelled => "cancelled",
            FailureCategory::Unknown => "unknown",
        }
    }

    pub fn family(&self) -> FailureFamily {
        match self {
            FailureCategory::InputValidationError => FailureFamily::InputValidation,
            FailureCategory::UnsupportedVariantShape | FailureCategory::MalformedCoordinate => FailureFamily::Assembly,
            _ => FailureFamily::Resolution,
        }
    }

    /// Sugerencia de remediación (tabla estática, una por categoría).
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            FailureCategory::InputValidationError => {
                "Check the descriptor text: it must be a non-empty single line such as GENE:p.L507F."
            }
            FailureCategory::UnparseableOutput => {
                "The annotator answered but no coordinates could be read; verify the notation and the tool version."
            }
            FailureCategory::Timeout => {
                "The annotator exceeded the per-invocation timeout; raise GENOMICS_TIMEOUT_SECONDS or retry later."
            }
            FailureCategory::UnsupportedCoordinateType => {
                "Only genomic (g.), coding (c.) and protein (p.) notations can be resolved; fusions and free text need manual curation."
            }
            FailureCategory::AmbiguousTranscript => {
                "Several transcripts matched; supply a transcript hint or a preferred transcript for the gene."
            }
            FailureCategory::ToolNonzeroExit => {
                "The annotator exited with an error; check the executable path, database and reference selectors."
            }
            FailureCategory::UnsupportedVariantShape => {
                "Copy-number, splice, fusion and structural variants cannot be written as simple positional records; annotate them manually."
            }
            FailureCategory::MalformedCoordinate => {
                "The resolved alleles do not match the notation; verify the reference build and the transcript."
            }
            FailureCategory::Cancelled => "The run was cancelled before this descriptor was dispatched; resubmit it.",
            FailureCategory::Unknown => "Unclassified failure; inspect the raw tool output in the failure ledger.",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        FailureCategory::ALL.iter()
                            .copied()
                            .find(|c| c.as_str() == wanted)
                            .ok_or_else(|| DomainError::Parse(format!("unknown failure category '{s}'")))
    }
}

/// Regla de clasificación: subcadena en minúsculas -> categoría.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    pub category: FailureCategory,
}

impl ClassificationRule {
    pub fn new(pattern: impl Into<String>, category: FailureCategory) -> Self {
        Self { pattern: pattern.into().to_ascii_lowercase(),
               category }
    }
}

/// Tabla ordenada de reglas; gana la primera coincidencia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTable {
    rules: Vec<ClassificationRule>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        use FailureCategory::*;
        let builtin = [("ambiguous", AmbiguousTranscript),
                       ("multiple transcripts", AmbiguousTranscript),
                       ("unsupported coordinate", UnsupportedCoordinateType),
                       ("unknown coordinate type", UnsupportedCoordinateType),
                       ("timed out", Timeout),
                       ("timeout", Timeout),
                       ("unparseable", UnparseableOutput),
                       ("could not parse", UnparseableOutput),
                       ("invalid output", UnparseableOutput),
                       ("exit status", ToolNonzeroExit),
                       ("exited with", ToolNonzeroExit),
                       ("non-zero exit", ToolNonzeroExit)];
        Self { rules: builtin.iter().map(|(p, c)| ClassificationRule::new(*p, *c)).collect() }
    }
}

impl ClassificationTable {
    /// Tabla integrada con `extra` antepuestas (mayor prioridad).
    pub fn with_rules(extra: Vec<ClassificationRule>) -> Self {
        let mut table = Self::default();
        let mut rules = extra;
        rules.append(&mut table.rules);
        table.rules = rules;
        table
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Clasifica un texto de fallo crudo.
    pub fn classify(&self, text: &str) -> FailureCategory {
        let lowered = text.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|r| !r.pattern.is_empty() && lowered.contains(&r.pattern))
            .map_or(FailureCategory::Unknown, |r| r.category)
    }

    /// Interpreta reglas en formato `patrón=>categoría;patrón=>categoría`.
    pub fn parse_rules(spec: &str) -> Result<Vec<ClassificationRule>, DomainError> {
        spec.split(';')
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                let (pattern, category) =
                    chunk.split_once("=>")
                         .ok_or_else(|| DomainError::Parse(format!("classification rule '{chunk}' lacks '=>'")))?;
                let pattern = pattern.trim();
                if pattern.is_empty() {
                    return Err(DomainError::Parse(format!("classification rule '{chunk}' has an empty pattern")));
                }
                Ok(ClassificationRule::new(pattern, category.parse()?))
            })
            .collect()
    }
}
