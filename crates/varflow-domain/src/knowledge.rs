//! Fuentes de conocimiento para la anotación multi-fuente.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Una fuente configurada: identificador, ruta y descripción opcional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSourceSpec {
    pub id: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl KnowledgeSourceSpec {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { id: id.into(),
               path: path.into(),
               description: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Interpreta `id|ruta|descripción;id|ruta` en orden de configuración.
    /// Los identificadores deben ser únicos.
    pub fn parse_list(spec: &str) -> Result<Vec<Self>, DomainError> {
        let mut sources: Vec<Self> = Vec::new();
        for chunk in spec.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            let mut parts = chunk.splitn(3, '|').map(str::trim);
            let id = parts.next().unwrap_or_default();
            let path = parts.next().unwrap_or_default();
            if id.is_empty() || path.is_empty() {
                return Err(DomainError::Parse(format!("knowledge source '{chunk}' must be 'id|path[|description]'")));
            }
            if sources.iter().any(|s| s.id == id) {
                return Err(DomainError::Parse(format!("duplicate knowledge source id '{id}'")));
            }
            let mut source = Self::new(id, path);
            if let Some(desc) = parts.next().filter(|d| !d.is_empty()) {
                source = source.with_description(desc);
            }
            sources.push(source);
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources_in_order() {
        let list = KnowledgeSourceSpec::parse_list("cosmic_v97|/kb/cosmic|COSMIC v97; clinvar|/kb/clinvar").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "cosmic_v97");
        assert_eq!(list[0].description.as_deref(), Some("COSMIC v97"));
        assert_eq!(list[1].path, PathBuf::from("/kb/clinvar"));
        assert!(list[1].description.is_none());
    }

    #[test]
    fn rejects_missing_path_and_duplicates() {
        assert!(KnowledgeSourceSpec::parse_list("cosmic").is_err());
        assert!(KnowledgeSourceSpec::parse_list("a|/x;a|/y").is_err());
    }
}
