//! Registro posicional y serialización del artefacto agregado (VCF 4.2).
//!
//! La línea de un registro depende sólo del `CoordinateRecord` de origen:
//! mismo registro, mismos bytes. La cabecera lleva la procedencia
//! (herramienta, versión, marca de tiempo, número de registros).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shape::{NormalizedAlleles, VariantShape};
use crate::{CoordinateRecord, CoordinateType, DomainError};

pub const VCF_FILE_FORMAT: &str = "VCFv4.2";
pub const VCF_COLUMNS: [&str; 8] = ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

const INFO_HEADERS: &[(&str, &str, &str, &str)] =
    &[("VARIANT_SHAPE", "1", "String", "Variant shape assigned by the assembler"),
      ("COORD_TYPE", "1", "String", "Coordinate type of the source descriptor"),
      ("SRC_INDEX", "1", "Integer", "Submission index of the source descriptor"),
      ("INDEL_LEN", "1", "Integer", "Inserted (positive) or deleted (negative) base count"),
      ("GENE", "1", "String", "Gene symbol"),
      ("TRANSCRIPT", "1", "String", "Transcript identifier"),
      ("PROTEIN", "1", "String", "Normalized protein change")];

/// Una línea del artefacto posicional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionalRecord {
    pub contig: String,
    pub position: u64,
    pub reference: String,
    pub alternate: String,
    pub shape: VariantShape,
    pub coordinate_type: CoordinateType,
    pub source_index: usize,
    pub gene: Option<String>,
    pub transcript: Option<String>,
    pub annotation: Option<String>,
    pub indel_length: Option<i64>,
}

impl PositionalRecord {
    pub(crate) fn from_resolved(record: &CoordinateRecord,
                                alleles: NormalizedAlleles,
                                shape: VariantShape,
                                indel_length: Option<i64>)
                                -> Self {
        let gene = record.gene.clone().or_else(|| record.descriptor.gene_symbol().map(str::to_string));
        Self { contig: record.chrom.clone(),
               position: alleles.pos,
               reference: alleles.reference,
               alternate: alleles.alternate,
               shape,
               coordinate_type: record.coordinate_type,
               source_index: record.index,
               gene,
               transcript: record.transcript.clone(),
               annotation: record.annotation.clone(),
               indel_length }
    }

    /// Campo INFO con claves en orden fijo.
    pub fn info_field(&self) -> String {
        let mut info = format!("VARIANT_SHAPE={};COORD_TYPE={};SRC_INDEX={}",
                               self.shape.as_str(),
                               self.coordinate_type.as_str(),
                               self.source_index);
        if let Some(len) = self.indel_length {
            let _ = write!(info, ";INDEL_LEN={len}");
        }
        for (key, value) in [("GENE", &self.gene), ("TRANSCRIPT", &self.transcript), ("PROTEIN", &self.annotation)] {
            if let Some(v) = value {
                let _ = write!(info, ";{key}={}", escape_info(v));
            }
        }
        info
    }

    /// Línea tabulada de 8 columnas (sin salto de línea final).
    pub fn to_vcf_line(&self) -> String {
        format!("{}\t{}\t.\t{}\t{}\t.\t.\t{}",
                self.contig,
                self.position,
                self.reference,
                self.alternate,
                self.info_field())
    }
}

/// Codifica los caracteres reservados de INFO (`;`, `=`, `,`, espacio, `%`).
fn escape_info(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ';' => out.push_str("%3B"),
            '=' => out.push_str("%3D"),
            ',' => out.push_str("%2C"),
            ' ' => out.push_str("%20"),
            '\t' => out.push_str("%09"),
            _ => out.push(c),
        }
    }
    out
}

/// Metadatos de procedencia para la cabecera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VcfProvenance {
    pub source: String,
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
}

impl VcfProvenance {
    pub fn new(source: impl Into<String>, tool_version: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self { source: source.into(),
               tool_version: tool_version.into(),
               generated_at }
    }
}

/// Serializa cabecera + registros en orden de envío.
pub fn render_vcf(records: &[PositionalRecord], provenance: &VcfProvenance) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "##fileformat={VCF_FILE_FORMAT}");
    let _ = writeln!(out, "##fileDate={}", provenance.generated_at.format("%Y%m%d"));
    let _ = writeln!(out, "##source={}", provenance.source);
    let _ = writeln!(out, "##sourceToolVersion={}", provenance.tool_version);
    let _ = writeln!(out, "##generated={}", provenance.generated_at.to_rfc3339());
    let _ = writeln!(out, "##recordCount={}", records.len());
    for (id, number, kind, description) in INFO_HEADERS {
        let _ = writeln!(out, "##INFO=<ID={id},Number={number},Type={kind},Description=\"{description}\">");
    }
    let _ = writeln!(out, "{}", VCF_COLUMNS.join("\t"));
    for record in records {
        out.push_str(&record.to_vcf_line());
        out.push('\n');
    }
    out
}

/// Comprueba que un VCF suministrado por el llamador tenga cabecera y las 8
/// columnas obligatorias. Devuelve el número de registros de datos.
pub fn inspect_vcf(text: &str) -> Result<usize, DomainError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next().ok_or_else(|| DomainError::Parse("empty VCF".into()))?;
    if !first.starts_with("##fileformat=VCF") {
        return Err(DomainError::Parse("VCF must start with a ##fileformat line".into()));
    }
    let mut header_seen = false;
    let mut records = 0usize;
    for (n, line) in lines.enumerate() {
        if line.starts_with("##") {
            continue;
        }
        if line.starts_with("#CHROM") {
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < VCF_COLUMNS.len() || columns[..VCF_COLUMNS.len()] != VCF_COLUMNS {
                return Err(DomainError::Parse("VCF header lacks the 8 mandatory columns".into()));
            }
            header_seen = true;
            continue;
        }
        if !header_seen {
            return Err(DomainError::Parse("VCF data line before #CHROM header".into()));
        }
        if line.split('\t').count() < VCF_COLUMNS.len() {
            return Err(DomainError::Parse(format!("VCF line {} has fewer than 8 columns", n + 2)));
        }
        records += 1;
    }
    if !header_seen {
        return Err(DomainError::Parse("VCF lacks a #CHROM header".into()));
    }
    Ok(records)
}
