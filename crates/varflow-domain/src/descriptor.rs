//! Descriptor de variante: unidad de entrada del pipeline.
//!
//! Un `VariantDescriptor` es inmutable una vez enviado. La conversión a la
//! línea de invocación de la herramienta externa (`invocation_input`) es
//! determinista y sólo normaliza la parte proteica de la notación.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::notation::normalize_protein;
use crate::DomainError;

/// Longitud máxima aceptada para una notación libre.
pub const MAX_NOTATION_LEN: usize = 256;

/// Tipo de coordenada de la notación de entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateType {
    Genomic,
    Coding,
    Protein,
}

impl CoordinateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateType::Genomic => "genomic",
            CoordinateType::Coding => "coding",
            CoordinateType::Protein => "protein",
        }
    }

    /// Subcomando de la herramienta de anotación para este tipo.
    pub fn subcommand(&self) -> &'static str {
        match self {
            CoordinateType::Genomic => "ganno",
            CoordinateType::Coding => "canno",
            CoordinateType::Protein => "panno",
        }
    }

    /// Deduce el tipo a partir del prefijo HGVS de la parte de cambio
    /// (`p.`, `c.`, `g.`). `None` si no es reconocible.
    pub fn guess(change: &str) -> Option<Self> {
        let change = change.trim().trim_start_matches('(');
        if change.starts_with("p.") {
            Some(CoordinateType::Protein)
        } else if change.starts_with("c.") {
            Some(CoordinateType::Coding)
        } else if change.starts_with("g.") {
            Some(CoordinateType::Genomic)
        } else {
            None
        }
    }
}

impl fmt::Display for CoordinateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinateType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
            "g" | "genomic" | "gdna" => Ok(CoordinateType::Genomic),
            "c" | "coding" | "cdna" => Ok(CoordinateType::Coding),
            "p" | "protein" => Ok(CoordinateType::Protein),
            other => Err(DomainError::Parse(format!("unknown coordinate type '{other}'"))),
        }
    }
}

/// Unidad de entrada: notación libre más pistas opcionales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    pub notation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_type: Option<CoordinateType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl VariantDescriptor {
    pub fn new(notation: impl Into<String>) -> Self {
        Self { notation: notation.into(),
               gene: None,
               coordinate_type: None,
               transcript: None }
    }

    pub fn with_gene(mut self, gene: impl Into<String>) -> Self {
        self.gene = Some(gene.into());
        self
    }

    pub fn with_coordinate_type(mut self, coordinate_type: CoordinateType) -> Self {
        self.coordinate_type = Some(coordinate_type);
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Valida el descriptor antes de la resolución (`input_validation_error`).
    pub fn validate(&self) -> Result<(), DomainError> {
        let trimmed = self.notation.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation("empty notation".into()));
        }
        if trimmed.len() > MAX_NOTATION_LEN {
            return Err(DomainError::Validation(format!("notation longer than {MAX_NOTATION_LEN} characters")));
        }
        if trimmed.chars().any(|c| c.is_control()) {
            return Err(DomainError::Validation("notation contains control characters".into()));
        }
        for (label, value) in [("gene", &self.gene), ("transcript", &self.transcript)] {
            if let Some(v) = value {
                if v.is_empty() || !v.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
                    return Err(DomainError::Validation(format!("invalid {label} hint '{v}'")));
                }
            }
        }
        Ok(())
    }

    /// Prefijo antes del último `:` (gen, transcrito o cromosoma), si existe.
    pub fn prefix(&self) -> Option<&str> {
        self.notation.trim().rsplit_once(':').map(|(p, _)| p)
    }

    /// Parte de cambio de la notación (tras el último `:`).
    pub fn change(&self) -> &str {
        let trimmed = self.notation.trim();
        trimmed.rsplit_once(':').map_or(trimmed, |(_, c)| c)
    }

    /// Gen explícito o, en su defecto, el prefijo de la notación cuando no es
    /// un transcrito ni un cromosoma.
    pub fn gene_symbol(&self) -> Option<&str> {
        self.gene.as_deref().or_else(|| self.prefix().filter(|p| !is_sequence_id(p)))
    }

    /// Pista explícita o tipo deducido de la notación.
    pub fn coordinate_type_guess(&self) -> Option<CoordinateType> {
        self.coordinate_type.or_else(|| CoordinateType::guess(self.change()))
    }

    /// Línea única de invocación para la herramienta de anotación.
    ///
    /// El transcrito (pista o preferido) sustituye al prefijo; si no hay
    /// transcrito se usa el prefijo de la notación o la pista de gen.
    pub fn invocation_input(&self, preferred_transcript: Option<&str>) -> String {
        let change = match self.coordinate_type_guess() {
            Some(CoordinateType::Protein) => normalize_protein(self.change()),
            _ => self.change().trim().to_string(),
        };
        let prefix = self.transcript
                         .as_deref()
                         .or(preferred_transcript)
                         .or_else(|| self.prefix())
                         .or(self.gene.as_deref());
        match prefix {
            Some(p) => format!("{p}:{change}"),
            None => change,
        }
    }
}

const SEQUENCE_ID_PREFIXES: &[&str] = &["CHR", "NM_", "NP_", "NR_", "NC_", "NG_", "XM_", "XP_", "ENST", "ENSP", "CCDS"];

fn is_sequence_id(prefix: &str) -> bool {
    let upper = prefix.to_ascii_uppercase();
    SEQUENCE_ID_PREFIXES.iter().any(|p| upper.starts_with(p))
    || upper.chars().all(|c| c.is_ascii_digit())
    || matches!(upper.as_str(), "X" | "Y" | "MT")
}

impl fmt::Display for VariantDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.gene, self.prefix()) {
            (Some(g), None) => write!(f, "{g}:{}", self.notation.trim()),
            _ => f.write_str(self.notation.trim()),
        }
    }
}
