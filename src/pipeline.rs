//! Fachada que arma la secuencia completa de etapas y la ejecuta.
//!
//! `Pipeline::run` valida la configuración antes de crear nada en disco: un
//! error de configuración nunca deja un directorio de ejecución a medias.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;
use varflow_adapters::{remediation_for, AnnotateAStage, AnnotateBStage, AssembleStage, CoordinateResolver,
                       ExternalTool, ExtractStage, InputSource, MultiSourceAnnotator, MultiSourceSettings,
                       ProcessInvoker, ResolveStage, ResolverSettings, TabulateStage, ToolInvoker, ValidateStage};
use varflow_core::constants::EVENTS_FILE;
use varflow_core::{ArtifactEntry, CancellationToken, JsonlEventStore, RunContext, RunReport, StageId, StageRunner,
                   StatusCallback};
use varflow_domain::VariantDescriptor;

use crate::config::PipelineConfig;
use crate::errors::PipelineError;

/// Entrada de una ejecución.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineInput {
    Variants(Vec<VariantDescriptor>),
    Csv(PathBuf),
    /// VCF ya construido: resolución y ensamblado quedan `skipped`.
    Vcf(PathBuf),
}

pub struct Pipeline {
    config: PipelineConfig,
    invoker: Arc<dyn ToolInvoker>,
    callback: Option<StatusCallback>,
    cancel: CancellationToken,
    preferred_transcripts: HashMap<String, String>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config,
               invoker: Arc::new(ProcessInvoker),
               callback: None,
               cancel: CancellationToken::new(),
               preferred_transcripts: HashMap::new() }
    }

    /// Sustituye el invocador de procesos (los tests usan uno en memoria).
    pub fn with_invoker(mut self, invoker: Arc<dyn ToolInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Mapa gen -> transcrito usado cuando el descriptor no trae transcrito.
    pub fn with_preferred_transcripts(mut self, map: HashMap<String, String>) -> Self {
        self.preferred_transcripts = map.into_iter()
                                        .map(|(g, t)| (g.trim().to_ascii_uppercase(), t.trim().to_string()))
                                        .collect();
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token para cancelar la ejecución en curso desde otra tarea.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, input: PipelineInput) -> Result<RunReport, PipelineError> {
        self.config.validate()?;
        let source = match input {
            PipelineInput::Variants(list) => InputSource::Descriptors(list),
            PipelineInput::Csv(path) => InputSource::Csv(existing(path)?),
            PipelineInput::Vcf(path) => InputSource::Vcf(existing(path)?),
        };

        std::fs::create_dir_all(&self.config.output_dir)?;
        let mut ctx = RunContext::create(&self.config.output_dir)?;
        if let InputSource::Vcf(path) = &source {
            ctx = ctx.with_supplied_artifact(StageId::Assemble, ArtifactEntry::from_file(path, None)?);
        }
        info!("run {} in {}", ctx.run_id(), ctx.run_dir().display());

        let mut runner = self.build_runner(source, &ctx);
        Ok(runner.run(ctx).await)
    }

    fn build_runner(&self, source: InputSource, ctx: &RunContext) -> StageRunner<JsonlEventStore> {
        let c = &self.config;
        let resolver = CoordinateResolver::new(ResolverSettings { executable: c.transvar_executable.clone(),
                                                                  database: c.database.as_str().to_string(),
                                                                  reference: c.reference.as_str().to_string(),
                                                                  use_ccds: c.use_ccds,
                                                                  workers: c.max_workers,
                                                                  timeout: c.timeout,
                                                                  classification: c.classification(),
                                                                  preferred_transcripts: self.preferred_transcripts.clone(),
                                                                  scratch_dir: None },
                                               self.invoker.clone());
        let annotator = MultiSourceAnnotator::new(MultiSourceSettings { executable: c.annotate_b_executable
                                                                                    .clone()
                                                                                    .unwrap_or_default(),
                                                                        sources: c.knowledge_sources.clone(),
                                                                        workers: c.max_workers,
                                                                        timeout: c.timeout,
                                                                        retry: c.retry },
                                                  self.invoker.clone());
        let tool = |exe: &Option<String>| ExternalTool::new(exe.clone().unwrap_or_default(), c.timeout);

        let store = JsonlEventStore::new(ctx.run_dir().join(EVENTS_FILE));
        let mut builder = StageRunner::builder(store).stage(ValidateStage::new(source))
                                                     .stage(ResolveStage::new(resolver))
                                                     .stage(AssembleStage::new())
                                                     .stage(AnnotateAStage::new(tool(&c.annotate_a_executable),
                                                                                self.invoker.clone()))
                                                     .stage(AnnotateBStage::new(annotator))
                                                     .stage(TabulateStage::new(tool(&c.tabulate_executable),
                                                                               c.max_workers,
                                                                               self.invoker.clone()))
                                                     .stage(ExtractStage::new())
                                                     .disable_all(c.disabled_stages.iter().copied())
                                                     .callback_budget(c.callback_budget)
                                                     .cancellation(self.cancel.clone())
                                                     .preserve_intermediates(c.preserve_intermediates)
                                                     .remediation(remediation_for);
        if let Some(cb) = &self.callback {
            builder = builder.status_callback(cb.clone());
        }
        builder.build()
    }
}

fn existing(path: PathBuf) -> Result<PathBuf, PipelineError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PipelineError::Input(format!("{} does not exist", path.display())))
    }
}

/// Ejecuta la secuencia completa con procesos reales.
pub async fn run_full_pipeline(input: PipelineInput, config: PipelineConfig) -> Result<RunReport, PipelineError> {
    Pipeline::new(config).run(input).await
}
