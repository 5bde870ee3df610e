//! Clasificación por forma de variante y plantillas posicionales.
//!
//! `VariantShape` es un conjunto cerrado: cada variante soportada tiene un
//! único handler que produce el `PositionalRecord`; las formas no soportadas
//! se devuelven como fallo `unsupported_variant_shape` sin intentar plantilla.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::positional::PositionalRecord;
use crate::{CoordinateRecord, CoordinateType, DomainError, FailureCategory};

/// Longitud máxima (bases cambiadas) de un indel representable.
pub const MAX_INDEL_LEN: usize = 50;

static FUSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"fusion|rearrangement|translocation|::").expect("static regex"));
static SPLICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"splice|exon.*skip|intron").expect("static regex"));
static COPY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bgain\b|\bloss\b|amplification|\bcnv\b|copy[ _-]?number|duplication").expect("static regex"));
static BREAKPOINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"breakpoint|inversion|\dinv\b").expect("static regex"));

static PROTEIN_MISSENSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^p\.[A-Z*]\d+[A-Z*]$").expect("static regex"));
static NUCLEOTIDE_SUBSTITUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[ACGTN]>[ACGTN]$").expect("static regex"));

/// Formas que no admiten plantilla posicional simple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedShape {
    CopyNumber,
    StructuralBreakpoint,
    Splice,
    Fusion,
    LongIndel,
}

impl UnsupportedShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnsupportedShape::CopyNumber => "copy_number",
            UnsupportedShape::StructuralBreakpoint => "structural_breakpoint",
            UnsupportedShape::Splice => "splice",
            UnsupportedShape::Fusion => "fusion",
            UnsupportedShape::LongIndel => "long_indel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantShape {
    SimpleSubstitution,
    ShortInsertion,
    ShortDeletion,
    DeletionInsertion,
    Unsupported(UnsupportedShape),
}

impl VariantShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantShape::SimpleSubstitution => "simple_substitution",
            VariantShape::ShortInsertion => "short_insertion",
            VariantShape::ShortDeletion => "short_deletion",
            VariantShape::DeletionInsertion => "deletion_insertion",
            VariantShape::Unsupported(u) => u.as_str(),
        }
    }

    /// Aplica la plantilla de la forma. Cada variante soportada tiene su handler.
    pub fn template(&self, record: &CoordinateRecord, alleles: NormalizedAlleles) -> Result<PositionalRecord, UnsupportedShape> {
        match self {
            VariantShape::SimpleSubstitution => Ok(substitution_template(record, alleles)),
            VariantShape::ShortInsertion => Ok(insertion_template(record, alleles)),
            VariantShape::ShortDeletion => Ok(deletion_template(record, alleles)),
            VariantShape::DeletionInsertion => Ok(delins_template(record, alleles)),
            VariantShape::Unsupported(u) => Err(*u),
        }
    }
}

impl fmt::Display for VariantShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VariantShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Alelos recortados a su representación mínima con base de anclaje.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAlleles {
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
}

/// Fallo del ensamblado de un registro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyFailure {
    pub category: FailureCategory,
    pub message: String,
}

/// Recorta bases comunes (sufijo y luego prefijo) dejando al menos una base
/// en cada alelo; el recorte de prefijo desplaza la posición.
pub fn normalize_alleles(pos: u64, reference: &str, alternate: &str) -> Result<NormalizedAlleles, DomainError> {
    let reference = reference.trim().to_ascii_uppercase();
    let alternate = alternate.trim().to_ascii_uppercase();
    for (label, allele) in [("reference", &reference), ("alternate", &alternate)] {
        if allele.is_empty() || !allele.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T' | 'N')) {
            return Err(DomainError::MalformedCoordinate(format!("{label} allele '{allele}' is not a nucleotide sequence")));
        }
    }
    if pos == 0 {
        return Err(DomainError::MalformedCoordinate("position must be 1-based".into()));
    }
    if reference == alternate {
        return Err(DomainError::MalformedCoordinate(format!("reference equals alternate ({reference})")));
    }

    let r = reference.as_bytes();
    let a = alternate.as_bytes();
    let mut suffix = 0;
    while r.len() - suffix > 1 && a.len() - suffix > 1 && r[r.len() - 1 - suffix] == a[a.len() - 1 - suffix] {
        suffix += 1;
    }
    let mut prefix = 0;
    while r.len() - suffix - prefix > 1 && a.len() - suffix - prefix > 1 && r[prefix] == a[prefix] {
        prefix += 1;
    }
    Ok(NormalizedAlleles { pos: pos + prefix as u64,
                           reference: reference[prefix..r.len() - suffix].to_string(),
                           alternate: alternate[prefix..a.len() - suffix].to_string() })
}

/// Forma sugerida por la notación, si la notación la restringe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotationHint {
    Substitution,
    EqualLength,
    Insertion,
    Deletion,
}

fn notation_hint(change: &str, coordinate_type: CoordinateType) -> Option<NotationHint> {
    let lowered = change.to_ascii_lowercase();
    if lowered.contains("delins") {
        return None;
    }
    match coordinate_type {
        CoordinateType::Protein => PROTEIN_MISSENSE.is_match(change).then_some(NotationHint::EqualLength),
        CoordinateType::Coding | CoordinateType::Genomic => {
            if NUCLEOTIDE_SUBSTITUTION.is_match(change) {
                Some(NotationHint::Substitution)
            } else if lowered.contains("dup") || lowered.contains("ins") {
                Some(NotationHint::Insertion)
            } else if lowered.contains("del") {
                Some(NotationHint::Deletion)
            } else {
                None
            }
        }
    }
}

fn unsupported_by_notation(notation: &str) -> Option<UnsupportedShape> {
    let lowered = notation.to_ascii_lowercase();
    if FUSION.is_match(&lowered) {
        Some(UnsupportedShape::Fusion)
    } else if SPLICE.is_match(&lowered) {
        Some(UnsupportedShape::Splice)
    } else if COPY_NUMBER.is_match(&lowered) {
        Some(UnsupportedShape::CopyNumber)
    } else if BREAKPOINT.is_match(&lowered) {
        Some(UnsupportedShape::StructuralBreakpoint)
    } else {
        None
    }
}

fn geometry(alleles: &NormalizedAlleles) -> VariantShape {
    let (r, a) = (alleles.reference.len(), alleles.alternate.len());
    let shape = if r == 1 && a == 1 {
        VariantShape::SimpleSubstitution
    } else if r == 1 && alleles.alternate.starts_with(&alleles.reference) {
        VariantShape::ShortInsertion
    } else if a == 1 && alleles.reference.starts_with(&alleles.alternate) {
        VariantShape::ShortDeletion
    } else {
        VariantShape::DeletionInsertion
    };
    if r.max(a) - 1 > MAX_INDEL_LEN {
        VariantShape::Unsupported(UnsupportedShape::LongIndel)
    } else {
        shape
    }
}

fn agrees(hint: NotationHint, shape: VariantShape, alleles: &NormalizedAlleles) -> bool {
    match hint {
        NotationHint::Substitution => shape == VariantShape::SimpleSubstitution,
        NotationHint::EqualLength => {
            matches!(shape, VariantShape::SimpleSubstitution | VariantShape::DeletionInsertion)
            && alleles.reference.len() == alleles.alternate.len()
        }
        NotationHint::Insertion => shape == VariantShape::ShortInsertion,
        NotationHint::Deletion => shape == VariantShape::ShortDeletion,
    }
}

/// Clasifica un registro resuelto. La notación se consulta primero para
/// formas no soportadas; después decide la geometría de los alelos, que
/// debe coincidir con lo que la notación implique.
pub fn classify_shape(record: &CoordinateRecord) -> Result<(VariantShape, NormalizedAlleles), DomainError> {
    let alleles = normalize_alleles(record.pos, &record.reference, &record.alternate)?;
    if let Some(u) = unsupported_by_notation(&record.descriptor.notation) {
        return Ok((VariantShape::Unsupported(u), alleles));
    }
    let shape = geometry(&alleles);
    if let VariantShape::Unsupported(_) = shape {
        return Ok((shape, alleles));
    }
    let change = match (record.coordinate_type, record.annotation.as_deref()) {
        (CoordinateType::Protein, Some(annotation)) => annotation.to_string(),
        (CoordinateType::Protein, None) => crate::normalize_protein(record.descriptor.change()),
        _ => record.descriptor.change().trim().to_string(),
    };
    if let Some(hint) = notation_hint(&change, record.coordinate_type) {
        if !agrees(hint, shape, &alleles) {
            return Err(DomainError::MalformedCoordinate(format!("notation '{change}' does not match {} alleles {}>{}",
                                                                shape.as_str(),
                                                                alleles.reference,
                                                                alleles.alternate)));
        }
    }
    Ok((shape, alleles))
}

/// Convierte un registro resuelto en su línea posicional o en un fallo de ensamblado.
pub fn assemble_record(record: &CoordinateRecord) -> Result<PositionalRecord, AssemblyFailure> {
    let (shape, alleles) = classify_shape(record).map_err(|e| AssemblyFailure { category: FailureCategory::MalformedCoordinate,
                                                                                  message: e.to_string() })?;
    shape.template(record, alleles)
         .map_err(|u| AssemblyFailure { category: FailureCategory::UnsupportedVariantShape,
                                        message: format!("{} variants have no positional template", u.as_str()) })
}

fn substitution_template(record: &CoordinateRecord, alleles: NormalizedAlleles) -> PositionalRecord {
    PositionalRecord::from_resolved(record, alleles, VariantShape::SimpleSubstitution, None)
}

fn insertion_template(record: &CoordinateRecord, alleles: NormalizedAlleles) -> PositionalRecord {
    let inserted = (alleles.alternate.len() - 1) as i64;
    PositionalRecord::from_resolved(record, alleles, VariantShape::ShortInsertion, Some(inserted))
}

fn deletion_template(record: &CoordinateRecord, alleles: NormalizedAlleles) -> PositionalRecord {
    let deleted = (alleles.reference.len() - 1) as i64;
    PositionalRecord::from_resolved(record, alleles, VariantShape::ShortDeletion, Some(-deleted))
}

fn delins_template(record: &CoordinateRecord, alleles: NormalizedAlleles) -> PositionalRecord {
    let delta = alleles.alternate.len() as i64 - alleles.reference.len() as i64;
    PositionalRecord::from_resolved(record, alleles, VariantShape::DeletionInsertion, Some(delta))
}
