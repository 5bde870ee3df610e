//! Mapa de artefactos por etapa.
//!
//! Cada etapa registra una secuencia ordenada de rutas de longitud >= 1; las
//! etapas de una sola salida registran una secuencia de un elemento, de modo
//! que los consumidores nunca distinguen entre ruta y lista.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::hashing::sha256_file;
use crate::stage::StageId;

/// Un fichero producido (o suministrado) con su checksum SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Identificador de la fuente en la etapa multi-fuente.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub path: PathBuf,
    pub checksum: String,
}

impl ArtifactEntry {
    /// Lee el fichero para calcular el checksum.
    pub fn from_file(path: impl Into<PathBuf>, label: Option<String>) -> std::io::Result<Self> {
        let path = path.into();
        let checksum = sha256_file(&path)?;
        Ok(Self { label, path, checksum })
    }
}

/// Secuencia no vacía de artefactos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ArtifactEntry>", into = "Vec<ArtifactEntry>")]
pub struct ArtifactPaths(Vec<ArtifactEntry>);

impl TryFrom<Vec<ArtifactEntry>> for ArtifactPaths {
    type Error = String;

    fn try_from(entries: Vec<ArtifactEntry>) -> Result<Self, Self::Error> {
        Self::new(entries).ok_or_else(|| "an artifact list needs at least one entry".to_string())
    }
}

impl From<ArtifactPaths> for Vec<ArtifactEntry> {
    fn from(paths: ArtifactPaths) -> Self {
        paths.0
    }
}

impl ArtifactPaths {
    pub fn new(entries: Vec<ArtifactEntry>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self(entries))
        }
    }

    pub fn single(entry: ArtifactEntry) -> Self {
        Self(vec![entry])
    }

    pub fn first(&self) -> &ArtifactEntry {
        &self.0[0]
    }

    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.0
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(|e| e.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Artefactos por etapa, en orden de registro.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactMap(IndexMap<StageId, ArtifactPaths>);

impl ArtifactMap {
    /// Registra las salidas de una etapa; una lista vacía no se registra.
    pub fn record(&mut self, stage: StageId, entries: Vec<ArtifactEntry>) -> bool {
        match ArtifactPaths::new(entries) {
            Some(paths) => {
                self.0.insert(stage, paths);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, stage: StageId) -> Option<&ArtifactPaths> {
        self.0.get(&stage)
    }

    /// Primera ruta de la etapa (las etapas de salida única sólo tienen una).
    pub fn primary(&self, stage: StageId) -> Option<&Path> {
        self.0.get(&stage).map(|p| p.first().path.as_path())
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.0.contains_key(&stage)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StageId, &ArtifactPaths)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ArtifactEntry {
        ArtifactEntry { label: None,
                        path: PathBuf::from(name),
                        checksum: String::new() }
    }

    #[test]
    fn empty_outputs_are_not_recorded() {
        let mut map = ArtifactMap::default();
        assert!(!map.record(StageId::AnnotateB, vec![]));
        assert!(map.is_empty());
    }

    #[test]
    fn single_and_multi_outputs_share_one_shape() {
        let mut map = ArtifactMap::default();
        map.record(StageId::Assemble, vec![entry("variants.vcf")]);
        map.record(StageId::AnnotateB, vec![entry("a.json"), entry("b.json")]);
        assert_eq!(map.primary(StageId::Assemble), Some(Path::new("variants.vcf")));
        assert_eq!(map.get(StageId::AnnotateB).map(ArtifactPaths::len), Some(2));
        let json = serde_json::to_value(&map).unwrap();
        assert!(json["assemble"].is_array());
        let back: ArtifactMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn empty_artifact_lists_do_not_deserialize() {
        assert!(serde_json::from_str::<ArtifactPaths>("[]").is_err());
        assert!(serde_json::from_str::<ArtifactMap>(r#"{"assemble": []}"#).is_err());
        let one: ArtifactPaths = serde_json::from_str(r#"[{"path": "v.vcf", "checksum": "00"}]"#).unwrap();
        assert_eq!(one.first().path, PathBuf::from("v.vcf"));
    }
}
