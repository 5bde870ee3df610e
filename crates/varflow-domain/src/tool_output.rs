//! Lectura posicional de la salida tabular del anotador de coordenadas.
//!
//! Se aceptan dos disposiciones:
//! - compacta: `chrom  pos  ref  alt  [transcript  [anotación]]`
//! - completa: `input  transcript  gene  strand  coordenadas  región  info`,
//!   donde `coordenadas` es `chr11:g.108236402C>T/c.1519C>T/p.L507F`.
//!
//! Varias líneas con coordenadas distintas significan transcritos ambiguos.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::notation::normalize_protein;
use crate::DomainError;

static GENOMIC_SUBSTITUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:/\s]+):g\.(\d+)([ACGTN]+)>([ACGTN]+)").expect("static regex"));

const MAX_EXCERPT: usize = 200;

/// Coordenadas extraídas de una línea de salida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCoordinates {
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    pub transcript: Option<String>,
    pub annotation: Option<String>,
}

/// Interpreta stdout completo. El texto de error está pensado para la tabla
/// de clasificación (`ambiguous`, `unparseable output`).
pub fn parse_tool_output(stdout: &str) -> Result<ParsedCoordinates, DomainError> {
    let mut candidates: Vec<ParsedCoordinates> = Vec::new();
    let mut first_data_line: Option<&str> = None;
    for line in stdout.lines() {
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').map(str::trim).collect();
        if fields[0].eq_ignore_ascii_case("input") {
            continue;
        }
        first_data_line.get_or_insert(trimmed);
        if let Some(parsed) = parse_compact(&fields).or_else(|| parse_full(&fields)) {
            if !candidates.iter().any(|c| same_site(c, &parsed)) {
                candidates.push(parsed);
            }
        }
    }
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => {
            let excerpt: String = first_data_line.unwrap_or("<empty>").chars().take(MAX_EXCERPT).collect();
            Err(DomainError::Parse(format!("unparseable output: no coordinate line found ({excerpt})")))
        }
        n => Err(DomainError::Parse(format!("ambiguous: {n} candidate transcripts"))),
    }
}

fn same_site(a: &ParsedCoordinates, b: &ParsedCoordinates) -> bool {
    a.chrom == b.chrom && a.pos == b.pos && a.reference == b.reference && a.alternate == b.alternate
}

fn optional(field: Option<&&str>) -> Option<String> {
    field.map(|f| f.trim())
         .filter(|f| !f.is_empty() && *f != "." && *f != "./././.")
         .map(str::to_string)
}

fn is_allele(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic() || c == '*' || c == '-')
}

fn parse_compact(fields: &[&str]) -> Option<ParsedCoordinates> {
    if fields.len() < 4 {
        return None;
    }
    let pos = fields[1].parse::<u64>().ok()?;
    if fields[0].is_empty() || !is_allele(fields[2]) || !is_allele(fields[3]) {
        return None;
    }
    Some(ParsedCoordinates { chrom: fields[0].to_string(),
                             pos,
                             reference: fields[2].to_string(),
                             alternate: fields[3].to_string(),
                             transcript: optional(fields.get(4)),
                             annotation: optional(fields.get(5)).map(|a| normalize_protein(&a)) })
}

fn parse_full(fields: &[&str]) -> Option<ParsedCoordinates> {
    let coordinates = fields.get(4)?;
    let caps = GENOMIC_SUBSTITUTION.captures(coordinates)?;
    let pos = caps[2].parse::<u64>().ok()?;
    let transcript = optional(fields.get(1)).and_then(|t| t.split_whitespace().next().map(str::to_string));
    let annotation = coordinates.split('/')
                                .find(|part| part.starts_with("p."))
                                .filter(|p| *p != "p.")
                                .map(normalize_protein);
    Some(ParsedCoordinates { chrom: caps[1].to_string(),
                             pos,
                             reference: caps[3].to_string(),
                             alternate: caps[4].to_string(),
                             transcript,
                             annotation })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_line_is_read_by_offset() {
        let parsed = parse_tool_output("11\t108236402\tC\tT\n").unwrap();
        assert_eq!(parsed.chrom, "11");
        assert_eq!(parsed.pos, 108236402);
        assert_eq!(parsed.reference, "C");
        assert_eq!(parsed.alternate, "T");
        assert!(parsed.transcript.is_none());
    }

    #[test]
    fn full_layout_uses_coordinate_column() {
        let out = "input\ttranscript\tgene\tstrand\tcoordinates(gDNA/cDNA/protein)\tregion\tinfo\n\
                   ATM:p.L507F\tNM_000051.3 (protein_coding)\tATM\t+\tchr11:g.108236402C>T/c.1519C>T/p.Leu507Phe\tinside_[cds_in_exon_11]\tCSQN=Missense\n";
        let parsed = parse_tool_output(out).unwrap();
        assert_eq!(parsed.chrom, "chr11");
        assert_eq!(parsed.pos, 108236402);
        assert_eq!(parsed.transcript.as_deref(), Some("NM_000051.3"));
        assert_eq!(parsed.annotation.as_deref(), Some("p.L507F"));
    }

    #[test]
    fn distinct_candidates_are_ambiguous() {
        let out = "11\t108236402\tC\tT\tNM_1\n11\t108236500\tC\tT\tNM_2\n";
        let err = parse_tool_output(out).unwrap_err().to_string();
        assert!(err.starts_with("ambiguous"), "{err}");
    }

    #[test]
    fn repeated_identical_lines_collapse() {
        let out = "11\t108236402\tC\tT\tNM_1\n11\t108236402\tC\tT\tNM_1\n";
        assert!(parse_tool_output(out).is_ok());
    }

    #[test]
    fn garbage_is_unparseable() {
        let err = parse_tool_output("GENE1:fusion(GENE2)\t.\t.\t.\t././.\t.\tError_no_valid_transcript").unwrap_err();
        assert!(err.to_string().starts_with("unparseable output"));
        assert!(parse_tool_output("").is_err());
    }
}
