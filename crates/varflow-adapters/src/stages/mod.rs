//! Implementaciones de `StageDefinition` para la secuencia fija.
//!
//! Las etapas se comunican sólo a través de ficheros en el directorio de la
//! ejecución; cada una lee la ruta de su etapa anterior del mapa de
//! artefactos.
mod annotate_a;
mod annotate_b;
mod assemble;
mod extract;
mod resolve;
mod tabulate;
mod validate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use varflow_core::{ArtifactEntry, CoreEngineError, RunContext, StageId};

pub use annotate_a::AnnotateAStage;
pub use annotate_b::AnnotateBStage;
pub use assemble::AssembleStage;
pub use extract::{ExtractStage, FINAL_REPORT_FILE};
pub use resolve::ResolveStage;
pub use tabulate::TabulateStage;
pub use validate::{parse_descriptor_csv, InputSource, ValidateStage};

pub const DESCRIPTORS_FILE: &str = "descriptors.json";
pub const RESOLUTION_FILE: &str = "resolution.json";
pub const VARIANTS_FILE: &str = "variants.vcf";
pub const FAILURE_LEDGER_FILE: &str = "failure_ledger.json";
pub const ANNOTATION_A_FILE: &str = "annotation_a.json";
pub const ANNOTATE_B_DIR: &str = "annotate_b";
pub const TABULATE_DIR: &str = "tabulate";

/// Ejecutable externo con su límite de tiempo por invocación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub executable: String,
    pub timeout: Duration,
}

impl ExternalTool {
    pub fn new(executable: impl Into<String>, timeout: Duration) -> Self {
        Self { executable: executable.into(),
               timeout }
    }
}

/// Ruta principal producida por `upstream`; error de etapa si falta.
pub(crate) fn upstream_path(ctx: &RunContext, stage: StageId, upstream: StageId) -> Result<PathBuf, CoreEngineError> {
    ctx.artifacts()
       .primary(upstream)
       .map(Path::to_path_buf)
       .ok_or_else(|| CoreEngineError::stage(stage, format!("required {upstream} artifact is missing")))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CoreEngineError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CoreEngineError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub(crate) fn artifact(path: &Path, label: Option<String>) -> Result<ArtifactEntry, CoreEngineError> {
    Ok(ArtifactEntry::from_file(path, label)?)
}
