//! Normalización de notación proteica.
//!
//! Convierte códigos de aminoácido de tres letras a una letra y reescribe los
//! sufijos de frameshift/extensión a su forma corta (`fs`, `ext`). Sólo se
//! aplica al campo legible de anotación; nunca a coordenadas.
//!
//! La función es idempotente: un código de tres letras sólo se reemplaza si
//! va seguido de un no-minúscula o de una operación (`fs`, `del`, ...), y el
//! resultado (mayúscula o `*`) nunca puede iniciar un nuevo código.

use once_cell::sync::Lazy;
use regex::Regex;

static FRAMESHIFT_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Ff]rameshift").expect("static regex"));
static FS_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"fs[*0-9?]*").expect("static regex"));
static EXT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"ext[*0-9?-]*").expect("static regex"));

/// Tabla tres letras -> una letra. `Stop` va primero por ser el único de
/// cuatro caracteres.
const AMINO_ACIDS: &[(&str, char)] = &[("Stop", '*'),
                                       ("Ala", 'A'),
                                       ("Arg", 'R'),
                                       ("Asn", 'N'),
                                       ("Asp", 'D'),
                                       ("Cys", 'C'),
                                       ("Gln", 'Q'),
                                       ("Glu", 'E'),
                                       ("Gly", 'G'),
                                       ("His", 'H'),
                                       ("Ile", 'I'),
                                       ("Leu", 'L'),
                                       ("Lys", 'K'),
                                       ("Met", 'M'),
                                       ("Phe", 'F'),
                                       ("Pro", 'P'),
                                       ("Sec", 'U'),
                                       ("Ser", 'S'),
                                       ("Thr", 'T'),
                                       ("Trp", 'W'),
                                       ("Tyr", 'Y'),
                                       ("Val", 'V'),
                                       ("Ter", '*'),
                                       ("Xaa", 'X')];

/// Operaciones en minúscula que pueden seguir directamente a un aminoácido.
const EDIT_SUFFIXES: &[&str] = &["fs", "del", "ins", "dup", "ext", "inv"];

/// Normaliza una anotación proteica (`p.Leu507Phe` -> `p.L507F`).
pub fn normalize_protein(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| !c.is_whitespace() && *c != '(' && *c != ')').collect();
    let worded = FRAMESHIFT_WORD.replace_all(&stripped, "fs");
    let one_letter = collapse_three_letter(&worded);
    let fs = FS_SUFFIX.replace_all(&one_letter, "fs");
    EXT_SUFFIX.replace_all(&fs, "ext").into_owned()
}

fn collapse_three_letter(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    'scan: while !rest.is_empty() {
        for (code, single) in AMINO_ACIDS {
            if let Some(after) = rest.strip_prefix(code) {
                let boundary = after.chars().next().map_or(true, |c| !c.is_ascii_lowercase())
                               || EDIT_SUFFIXES.iter().any(|s| after.starts_with(s));
                if boundary {
                    out.push(*single);
                    rest = after;
                    continue 'scan;
                }
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_letter_missense_collapses() {
        assert_eq!(normalize_protein("p.Leu507Phe"), "p.L507F");
        assert_eq!(normalize_protein("p.(Arg123Gln)"), "p.R123Q");
    }

    #[test]
    fn adjacent_codes_are_all_collapsed() {
        assert_eq!(normalize_protein("p.Lys2_Leu3insGlnSer"), "p.K2_L3insQS");
    }

    #[test]
    fn frameshift_and_extension_suffixes_are_shortened() {
        assert_eq!(normalize_protein("p.Glu5ValfsTer12"), "p.E5Vfs");
        assert_eq!(normalize_protein("p.Arg97fs*23"), "p.R97fs");
        assert_eq!(normalize_protein("p.Arg97 frameshift"), "p.R97fs");
        assert_eq!(normalize_protein("p.Ter110GlnextTer17"), "p.*110Qext");
    }

    #[test]
    fn codes_before_edit_operations_collapse() {
        assert_eq!(normalize_protein("p.Leu507del"), "p.L507del");
        assert_eq!(normalize_protein("p.Gly12_Gly13dup"), "p.G12_G13dup");
    }

    #[test]
    fn one_letter_input_is_untouched() {
        assert_eq!(normalize_protein("p.L507F"), "p.L507F");
        assert_eq!(normalize_protein(""), "");
    }

    #[test]
    fn code_followed_by_lowercase_is_left_alone() {
        assert_eq!(normalize_protein("p.Serum"), "p.Serum");
    }
}
