//! Configuración del pipeline desde variables de entorno (`GENOMICS_*`).
//!
//! Toda conversión texto -> enum ocurre aquí (base de datos, versión de
//! referencia, etapas, categorías); el resto del código sólo ve tipos cerrados.
//! `from_lookup` recibe la fuente de valores para que los tests no toquen el
//! entorno del proceso.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use serde::Serialize;
use varflow_core::{RetryPolicy, StageId};
use varflow_domain::{ClassificationRule, ClassificationTable, KnowledgeSourceSpec};

use crate::errors::PipelineError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

pub const ENV_PREFIX: &str = "GENOMICS_";
pub const MAX_WORKERS: usize = 32;

/// Base de datos de transcritos del anotador de coordenadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Refseq,
    Ucsc,
    Ensembl,
    Gencode,
    Ccds,
}

impl Database {
    pub fn as_str(&self) -> &'static str {
        match self {
            Database::Refseq => "refseq",
            Database::Ucsc => "ucsc",
            Database::Ensembl => "ensembl",
            Database::Gencode => "gencode",
            Database::Ccds => "ccds",
        }
    }
}

impl FromStr for Database {
    type Err = PipelineError;

    /// Acepta cualquier capitalización y el prefijo `--` de la línea de comandos.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches("--").to_ascii_lowercase().as_str() {
            "refseq" => Ok(Database::Refseq),
            "ucsc" => Ok(Database::Ucsc),
            "ensembl" => Ok(Database::Ensembl),
            "gencode" => Ok(Database::Gencode),
            "ccds" => Ok(Database::Ccds),
            other => Err(PipelineError::Configuration(format!("unknown transcript database '{other}'"))),
        }
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceVersion {
    Hg19,
    Hg38,
}

impl ReferenceVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceVersion::Hg19 => "hg19",
            ReferenceVersion::Hg38 => "hg38",
        }
    }
}

impl FromStr for ReferenceVersion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches("--").to_ascii_lowercase().as_str() {
            "hg19" | "grch37" => Ok(ReferenceVersion::Hg19),
            "hg38" | "grch38" => Ok(ReferenceVersion::Hg38),
            other => Err(PipelineError::Configuration(format!("unknown reference version '{other}'"))),
        }
    }
}

impl fmt::Display for ReferenceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub transvar_executable: String,
    pub database: Database,
    pub reference: ReferenceVersion,
    pub use_ccds: bool,
    pub annotate_a_executable: Option<String>,
    pub annotate_b_executable: Option<String>,
    pub tabulate_executable: Option<String>,
    pub knowledge_sources: Vec<KnowledgeSourceSpec>,
    pub max_workers: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub callback_budget: Duration,
    pub output_dir: PathBuf,
    pub preserve_intermediates: bool,
    pub disabled_stages: Vec<StageId>,
    pub failure_rules: Vec<ClassificationRule>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { transvar_executable: "transvar".into(),
               database: Database::Refseq,
               reference: ReferenceVersion::Hg38,
               use_ccds: true,
               annotate_a_executable: None,
               annotate_b_executable: None,
               tabulate_executable: None,
               knowledge_sources: Vec::new(),
               max_workers: 4,
               timeout: Duration::from_secs(300),
               retry: RetryPolicy::default(),
               callback_budget: Duration::from_millis(250),
               output_dir: PathBuf::from("output"),
               preserve_intermediates: false,
               disabled_stages: Vec::new(),
               failure_rules: Vec::new() }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PipelineError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineError::Configuration(format!("{key}: '{other}' is not a boolean"))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, PipelineError> {
    value.trim()
         .parse()
         .map_err(|_| PipelineError::Configuration(format!("{key}: '{value}' is not a valid number")))
}

/// Lista de etapas separadas por comas; admite los alias históricos.
pub fn parse_stage_list(value: &str) -> Result<Vec<StageId>, PipelineError> {
    value.split(',')
         .map(str::trim)
         .filter(|s| !s.is_empty())
         .map(|s| StageId::from_str(s).map_err(|e| PipelineError::Configuration(e.to_string())))
         .collect()
}

/// Fuentes por defecto: una por cada variable `KB_*` definida.
fn default_sources(get: &dyn Fn(&str) -> Option<String>) -> Vec<KnowledgeSourceSpec> {
    [("cosmic_v97", "KB_COSMIC", "COSMIC somatic mutations"),
     ("clinvar_20230801", "KB_CLINVAR", "ClinVar clinical significance")].iter()
                                                                          .filter_map(|(id, key, desc)| {
                                                                              get(key).map(|p| KnowledgeSourceSpec::new(*id, p.trim()).with_description(*desc))
                                                                          })
                                                                          .collect()
}

impl PipelineConfig {
    /// Lee `GENOMICS_*` del entorno tras cargar `.env`.
    pub fn from_env() -> Result<Self, PipelineError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, PipelineError>
        where L: Fn(&str) -> Option<String>
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("TRANSVAR_EXECUTABLE") {
            config.transvar_executable = v.trim().to_string();
        }
        if let Some(v) = get("TRANSVAR_DATABASE") {
            config.database = v.parse()?;
        }
        if let Some(v) = get("TRANSVAR_REF_VERSION") {
            config.reference = v.parse()?;
        }
        if let Some(v) = get("TRANSVAR_USE_CCDS") {
            config.use_ccds = parse_bool("TRANSVAR_USE_CCDS", &v)?;
        }
        config.annotate_a_executable = get("SARJ_SCRIPT");
        config.annotate_b_executable = get("TPS_EXECUTABLE");
        config.tabulate_executable = get("JSON_TO_CSV_SCRIPT");

        config.knowledge_sources = match get("KNOWLEDGE_SOURCES") {
            Some(v) => KnowledgeSourceSpec::parse_list(&v)?,
            None => default_sources(&get),
        };

        if let Some(v) = get("MAX_WORKERS") {
            config.max_workers = parse_number::<usize>("MAX_WORKERS", &v)?.clamp(1, MAX_WORKERS);
        }
        if let Some(v) = get("TIMEOUT_SECONDS") {
            config.timeout = Duration::from_secs(parse_number("TIMEOUT_SECONDS", &v)?);
        }
        let attempts = match get("RETRY_ATTEMPTS") {
            Some(v) => parse_number("RETRY_ATTEMPTS", &v)?,
            None => config.retry.max_attempts,
        };
        let backoff = match get("RETRY_BACKOFF_MS") {
            Some(v) => Duration::from_millis(parse_number("RETRY_BACKOFF_MS", &v)?),
            None => config.retry.base_delay,
        };
        config.retry = RetryPolicy::new(attempts, backoff);
        if let Some(v) = get("CALLBACK_TIMEOUT_MS") {
            config.callback_budget = Duration::from_millis(parse_number("CALLBACK_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = get("PRESERVE_INTERMEDIATES") {
            config.preserve_intermediates = parse_bool("PRESERVE_INTERMEDIATES", &v)?;
        }
        if let Some(v) = get("DISABLED_STAGES") {
            config.disabled_stages = parse_stage_list(&v)?;
        }
        if let Some(v) = get("FAILURE_PATTERNS") {
            config.failure_rules = ClassificationTable::parse_rules(&v)?;
        }
        Ok(config)
    }

    pub fn is_enabled(&self, stage: StageId) -> bool {
        !self.disabled_stages.contains(&stage)
    }

    pub fn classification(&self) -> ClassificationTable {
        ClassificationTable::with_rules(self.failure_rules.clone())
    }

    /// Comprueba que cada etapa habilitada tenga lo que necesita.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let missing = |what: &str, stage: StageId| {
            PipelineError::Configuration(format!("{what} is required while stage {stage} is enabled"))
        };
        if self.is_enabled(StageId::Resolve) && self.transvar_executable.trim().is_empty() {
            return Err(missing("GENOMICS_TRANSVAR_EXECUTABLE", StageId::Resolve));
        }
        if self.is_enabled(StageId::AnnotateA) && self.annotate_a_executable.is_none() {
            return Err(missing("GENOMICS_SARJ_SCRIPT", StageId::AnnotateA));
        }
        if self.is_enabled(StageId::AnnotateB) {
            if self.annotate_b_executable.is_none() {
                return Err(missing("GENOMICS_TPS_EXECUTABLE", StageId::AnnotateB));
            }
            if self.knowledge_sources.is_empty() {
                return Err(missing("GENOMICS_KNOWLEDGE_SOURCES", StageId::AnnotateB));
            }
        }
        if self.is_enabled(StageId::Tabulate) && self.tabulate_executable.is_none() {
            return Err(missing("GENOMICS_JSON_TO_CSV_SCRIPT", StageId::Tabulate));
        }
        if self.timeout.is_zero() {
            return Err(PipelineError::Configuration("GENOMICS_TIMEOUT_SECONDS must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use varflow_domain::FailureCategory;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (format!("GENOMICS_{k}"), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let c = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(c.database, Database::Refseq);
        assert_eq!(c.reference, ReferenceVersion::Hg38);
        assert!(c.use_ccds);
        assert_eq!(c.max_workers, 4);
        assert_eq!(c.timeout, Duration::from_secs(300));
        assert_eq!(c.retry, RetryPolicy::new(3, Duration::from_millis(1000)));
        assert!(c.knowledge_sources.is_empty());
    }

    #[test]
    fn enum_values_are_normalized_at_the_boundary() {
        let c = PipelineConfig::from_lookup(lookup(&[("TRANSVAR_DATABASE", "--Ensembl"),
                                                     ("TRANSVAR_REF_VERSION", "GRCh37"),
                                                     ("TRANSVAR_USE_CCDS", "no")])).unwrap();
        assert_eq!(c.database, Database::Ensembl);
        assert_eq!(c.reference, ReferenceVersion::Hg19);
        assert!(!c.use_ccds);
        assert!(PipelineConfig::from_lookup(lookup(&[("TRANSVAR_DATABASE", "genbank")])).is_err());
    }

    #[test]
    fn workers_are_clamped_and_stage_aliases_accepted() {
        let c = PipelineConfig::from_lookup(lookup(&[("MAX_WORKERS", "500"), ("DISABLED_STAGES", "tps, report")])).unwrap();
        assert_eq!(c.max_workers, MAX_WORKERS);
        assert_eq!(c.disabled_stages, vec![StageId::AnnotateB, StageId::Extract]);
        assert!(!c.is_enabled(StageId::AnnotateB));
        assert!(PipelineConfig::from_lookup(lookup(&[("DISABLED_STAGES", "upload")])).is_err());
    }

    #[test]
    fn default_knowledge_sources_come_from_per_source_keys() {
        let c = PipelineConfig::from_lookup(lookup(&[("KB_COSMIC", "/kb/cosmic"), ("KB_CLINVAR", "/kb/clinvar")])).unwrap();
        let ids: Vec<&str> = c.knowledge_sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["cosmic_v97", "clinvar_20230801"]);
        let c = PipelineConfig::from_lookup(lookup(&[("KNOWLEDGE_SOURCES", "local|/kb/local|in-house")])).unwrap();
        assert_eq!(c.knowledge_sources[0].description.as_deref(), Some("in-house"));
    }

    #[test]
    fn extra_failure_patterns_take_priority() {
        let c = PipelineConfig::from_lookup(lookup(&[("FAILURE_PATTERNS", "no valid transcript=>ambiguous_transcript")]))
            .unwrap();
        assert_eq!(c.classification().classify("Error: no valid transcript found"),
                   FailureCategory::AmbiguousTranscript);
        assert_eq!(c.classification().classify("tool exited with exit status 1"), FailureCategory::ToolNonzeroExit);
    }

    #[test]
    fn validation_requires_tools_of_enabled_stages() {
        let c = PipelineConfig::from_lookup(|_| None).unwrap();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("GENOMICS_SARJ_SCRIPT"), "{err}");

        let c = PipelineConfig::from_lookup(lookup(&[("DISABLED_STAGES", "annotate_a,annotate_b,tabulate,extract")])).unwrap();
        assert!(c.validate().is_ok());

        let c = PipelineConfig::from_lookup(lookup(&[("SARJ_SCRIPT", "sarj"),
                                                     ("TPS_EXECUTABLE", "tps"),
                                                     ("JSON_TO_CSV_SCRIPT", "json2csv")])).unwrap();
        assert!(c.validate().unwrap_err().to_string().contains("KNOWLEDGE_SOURCES"));
    }
}
