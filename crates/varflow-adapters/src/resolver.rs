//! Resolución concurrente de descriptores a coordenadas genómicas.
//!
//! Cada descriptor se traduce en una invocación de la herramienta de
//! anotación de coordenadas. Las invocaciones se reparten en un pool acotado
//! (`workers`) y cada una tiene su propio límite de tiempo. El resultado se
//! devuelve en orden de envío, uno por descriptor.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use varflow_domain::{parse_tool_output, ClassificationTable, CoordinateRecord, CoordinateType, FailureCategory,
                     FailureOrigin, ResolutionFailure, ResolutionOutcome, VariantDescriptor};

use crate::errors::ToolError;
use crate::invoker::{invoke_with_timeout, ToolInvocation, ToolInvoker, ToolOutput};

pub const MAX_WORKERS: usize = 32;

/// Parámetros de la herramienta y del pool.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub executable: String,
    pub database: String,
    pub reference: String,
    pub use_ccds: bool,
    pub workers: usize,
    pub timeout: Duration,
    pub classification: ClassificationTable,
    /// Gen (en mayúsculas) -> transcrito preferido.
    pub preferred_transcripts: HashMap<String, String>,
    /// Directorio para el log de cada invocación.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { executable: "transvar".into(),
               database: "refseq".into(),
               reference: "hg38".into(),
               use_ccds: true,
               workers: 4,
               timeout: Duration::from_secs(300),
               classification: ClassificationTable::default(),
               preferred_transcripts: HashMap::new(),
               scratch_dir: None }
    }
}

impl ResolverSettings {
    pub fn preferred_transcript(&self, descriptor: &VariantDescriptor) -> Option<&str> {
        let gene = descriptor.gene_symbol()?;
        self.preferred_transcripts.get(&gene.to_ascii_uppercase()).map(String::as_str)
    }

    /// `<exe> <panno|canno|ganno> -i <input> -d <db> --reference <ref> [--ccds]`
    pub fn command(&self, coordinate_type: CoordinateType, input: &str) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.executable).arg(coordinate_type.subcommand())
                                                                  .arg("-i")
                                                                  .arg(input)
                                                                  .arg("-d")
                                                                  .arg(&self.database)
                                                                  .arg("--reference")
                                                                  .arg(&self.reference);
        if self.use_ccds {
            invocation = invocation.arg("--ccds");
        }
        invocation
    }
}

/// Descriptor con su índice de envío.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexedDescriptor {
    pub index: usize,
    pub descriptor: VariantDescriptor,
}

impl IndexedDescriptor {
    pub fn new(index: usize, descriptor: VariantDescriptor) -> Self {
        Self { index, descriptor }
    }

    /// Numera una lista en orden.
    pub fn enumerate(descriptors: impl IntoIterator<Item = VariantDescriptor>) -> Vec<Self> {
        descriptors.into_iter().enumerate().map(|(i, d)| Self::new(i, d)).collect()
    }
}

#[derive(Clone)]
pub struct CoordinateResolver {
    settings: Arc<ResolverSettings>,
    invoker: Arc<dyn ToolInvoker>,
}

impl CoordinateResolver {
    pub fn new(settings: ResolverSettings, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { settings: Arc::new(settings),
               invoker }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Copia que escribe el log de cada invocación en `dir`.
    pub fn with_scratch_dir(&self, dir: &Path) -> Self {
        let mut settings = (*self.settings).clone();
        settings.scratch_dir = Some(dir.to_path_buf());
        Self { settings: Arc::new(settings),
               invoker: self.invoker.clone() }
    }

    /// Resuelve un lote. Devuelve exactamente un resultado por descriptor,
    /// en el orden de `batch`. Tras la cancelación no se despachan nuevas
    /// invocaciones; las pendientes quedan como `cancelled`.
    pub async fn resolve_batch(&self, batch: &[IndexedDescriptor], cancel: &CancellationToken) -> Vec<ResolutionOutcome> {
        let workers = self.settings.workers.clamp(1, MAX_WORKERS);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut slots: Vec<Option<ResolutionOutcome>> = vec![None; batch.len()];
        let mut set = JoinSet::new();

        for (slot, item) in batch.iter().enumerate() {
            // Los fallos previos a la invocación no ocupan un worker.
            if let Err(failure) = self.precheck(item) {
                slots[slot] = Some(ResolutionOutcome::Failed(failure));
                continue;
            }
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };
            let this = self.clone();
            let item = item.clone();
            set.spawn(async move {
                let outcome = this.resolve_one(&item).await;
                drop(permit);
                (slot, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, outcome)) => slots[slot] = Some(outcome),
                Err(e) => warn!("resolver worker failed: {e}"),
            }
        }

        slots.into_iter()
             .zip(batch)
             .map(|(slot, item)| {
                 slot.unwrap_or_else(|| {
                         let (category, message, origin) = if cancel.is_cancelled() {
                             (FailureCategory::Cancelled, ToolError::Cancelled.to_string(), FailureOrigin::NotDispatched)
                         } else {
                             (FailureCategory::Unknown,
                              "resolver worker terminated unexpectedly".to_string(),
                              FailureOrigin::Invocation)
                         };
                         ResolutionOutcome::Failed(failure_at(item, String::new(), category, message, origin))
                     })
             })
             .collect()
    }

    fn precheck(&self, item: &IndexedDescriptor) -> Result<(), ResolutionFailure> {
        if let Err(e) = item.descriptor.validate() {
            return Err(failure(item, String::new(), FailureCategory::InputValidationError, e.to_string()));
        }
        if item.descriptor.coordinate_type_guess().is_none() {
            let message = format!("unsupported coordinate type: cannot infer g./c./p. from '{}'", item.descriptor.change());
            return Err(failure(item, String::new(), FailureCategory::UnsupportedCoordinateType, message));
        }
        Ok(())
    }

    async fn resolve_one(&self, item: &IndexedDescriptor) -> ResolutionOutcome {
        let descriptor = &item.descriptor;
        let Some(coordinate_type) = descriptor.coordinate_type_guess() else {
            return ResolutionOutcome::Failed(failure(item,
                                                     String::new(),
                                                     FailureCategory::UnsupportedCoordinateType,
                                                     "unsupported coordinate type".into()));
        };
        let preferred = self.settings.preferred_transcript(descriptor);
        let input = descriptor.invocation_input(preferred);
        let invocation = self.settings.command(coordinate_type, &input);

        let result = invoke_with_timeout(self.invoker.as_ref(), &invocation, self.settings.timeout).await;
        self.write_scratch_log(item.index, &invocation, &result).await;

        let output = match result.and_then(ToolOutput::into_result) {
            Ok(output) => output,
            Err(e) => {
                let message = e.to_string();
                let (category, raw, origin) = match &e {
                    // Ejecutable ausente o sin permisos: nunca llegó a correr.
                    ToolError::Spawn { .. } => {
                        (FailureCategory::ToolNonzeroExit, message.clone(), FailureOrigin::ToolUnavailable)
                    }
                    ToolError::Timeout(_) => (FailureCategory::Timeout, String::new(), FailureOrigin::Invocation),
                    ToolError::InvalidOutput(_) => {
                        (FailureCategory::UnparseableOutput, message.clone(), FailureOrigin::Invocation)
                    }
                    ToolError::NonZeroExit { stderr, .. } => {
                        (self.settings.classification.classify(&message), stderr.clone(), FailureOrigin::Invocation)
                    }
                    _ => (self.settings.classification.classify(&message), String::new(), FailureOrigin::Invocation),
                };
                debug!("descriptor #{} '{}' failed: {message}", item.index, descriptor.notation);
                return ResolutionOutcome::Failed(failure_at(item, raw, category, message, origin));
            }
        };

        match parse_tool_output(&output.stdout) {
            Ok(parsed) => {
                let transcript = parsed.transcript
                                       .or_else(|| descriptor.transcript.clone())
                                       .or_else(|| preferred.map(str::to_string));
                let annotation = parsed.annotation.or_else(|| {
                                                       (coordinate_type == CoordinateType::Protein)
                                                           .then(|| varflow_domain::normalize_protein(descriptor.change()))
                                                   });
                ResolutionOutcome::Resolved(CoordinateRecord { index: item.index,
                                                               descriptor: descriptor.clone(),
                                                               invocation_input: input,
                                                               chrom: parsed.chrom,
                                                               pos: parsed.pos,
                                                               reference: parsed.reference,
                                                               alternate: parsed.alternate,
                                                               coordinate_type,
                                                               transcript,
                                                               gene: descriptor.gene_symbol().map(str::to_string),
                                                               annotation })
            }
            Err(e) => {
                let message = e.to_string();
                let category = self.settings.classification.classify(&message);
                debug!("descriptor #{} '{}' unparsed: {message}", item.index, descriptor.notation);
                ResolutionOutcome::Failed(failure_at(item, output.stdout, category, message, FailureOrigin::Invocation))
            }
        }
    }

    async fn write_scratch_log(&self, index: usize, invocation: &ToolInvocation, result: &Result<ToolOutput, ToolError>) {
        let Some(dir) = &self.settings.scratch_dir else {
            return;
        };
        let body = match result {
            Ok(out) => format!("$ {invocation}\nexit: {:?}\n--- stdout\n{}\n--- stderr\n{}\n",
                               out.exit_code, out.stdout, out.stderr),
            Err(e) => format!("$ {invocation}\nerror: {e}\n"),
        };
        let path = dir.join(format!("resolve_{index:05}.log"));
        if let Err(e) = tokio::fs::write(&path, body).await {
            debug!("could not write {}: {e}", path.display());
        }
    }
}

fn failure(item: &IndexedDescriptor, raw_output: String, category: FailureCategory, message: String) -> ResolutionFailure {
    failure_at(item, raw_output, category, message, FailureOrigin::Precheck)
}

fn failure_at(item: &IndexedDescriptor,
              raw_output: String,
              category: FailureCategory,
              message: String,
              origin: FailureOrigin)
              -> ResolutionFailure {
    ResolutionFailure { index: item.index,
                        descriptor: item.descriptor.clone(),
                        coordinate_type_guess: item.descriptor.coordinate_type_guess(),
                        raw_output,
                        category,
                        message,
                        origin }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        calls: Mutex<Vec<ToolInvocation>>,
        stdout: String,
    }

    #[async_trait]
    impl ToolInvoker for Recording {
        async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(ToolOutput { exit_code: Some(0),
                            stdout: self.stdout.clone(),
                            ..ToolOutput::default() })
        }
    }

    struct Failing(ToolError);

    #[async_trait]
    impl ToolInvoker for Failing {
        async fn invoke(&self, _invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
            Err(self.0.clone())
        }
    }

    #[test]
    fn command_layout_follows_coordinate_type() {
        let settings = ResolverSettings::default();
        let inv = settings.command(CoordinateType::Protein, "ATM:p.L507F");
        assert_eq!(inv.to_string(), "transvar panno -i ATM:p.L507F -d refseq --reference hg38 --ccds");
        let settings = ResolverSettings { use_ccds: false,
                                          ..ResolverSettings::default() };
        assert_eq!(settings.command(CoordinateType::Coding, "x").args[0], "canno");
    }

    #[tokio::test]
    async fn preferred_transcript_replaces_gene_prefix() {
        let invoker = Arc::new(Recording { calls: Mutex::new(Vec::new()),
                                           stdout: "11\t108236402\tC\tT\n".into() });
        let mut settings = ResolverSettings::default();
        settings.preferred_transcripts.insert("ATM".into(), "NM_000051.3".into());
        let resolver = CoordinateResolver::new(settings, invoker.clone());
        let batch = IndexedDescriptor::enumerate([VariantDescriptor::new("atm:p.Leu507Phe")]);
        let out = resolver.resolve_batch(&batch, &CancellationToken::new()).await;
        let ResolutionOutcome::Resolved(record) = &out[0] else {
            panic!("expected a record: {out:?}");
        };
        assert_eq!(record.invocation_input, "NM_000051.3:p.L507F");
        assert_eq!(record.transcript.as_deref(), Some("NM_000051.3"));
        assert_eq!(record.annotation.as_deref(), Some("p.L507F"));
        assert_eq!(invoker.calls.lock().unwrap()[0].args[2], "NM_000051.3:p.L507F");
    }

    #[tokio::test]
    async fn invalid_descriptors_never_reach_the_tool() {
        let invoker = Arc::new(Recording { calls: Mutex::new(Vec::new()),
                                           stdout: String::new() });
        let resolver = CoordinateResolver::new(ResolverSettings::default(), invoker.clone());
        let batch = IndexedDescriptor::enumerate([VariantDescriptor::new("  "),
                                                  VariantDescriptor::new("GENE1:fusion(GENE2)")]);
        let out = resolver.resolve_batch(&batch, &CancellationToken::new()).await;
        let categories: Vec<_> = out.iter()
                                    .map(|o| match o {
                                        ResolutionOutcome::Failed(f) => f.category,
                                        ResolutionOutcome::Resolved(_) => panic!("unexpected record"),
                                    })
                                    .collect();
        assert_eq!(categories,
                   vec![FailureCategory::InputValidationError, FailureCategory::UnsupportedCoordinateType]);
        assert!(invoker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_executable_points_at_the_tool() {
        let invoker = Arc::new(Failing(ToolError::Spawn { program: "/opt/transvar".into(),
                                                          message: "No such file or directory".into() }));
        let resolver = CoordinateResolver::new(ResolverSettings::default(), invoker);
        let batch = IndexedDescriptor::enumerate([VariantDescriptor::new("GENE1:fusion(GENE2)"),
                                                  VariantDescriptor::new("ATM:p.L507F")]);
        let out = resolver.resolve_batch(&batch, &CancellationToken::new()).await;
        let ResolutionOutcome::Failed(fusion) = &out[0] else {
            panic!("expected a failure: {out:?}");
        };
        assert_eq!(fusion.origin, FailureOrigin::Precheck);
        assert!(!fusion.origin.was_dispatched());
        let ResolutionOutcome::Failed(atm) = &out[1] else {
            panic!("expected a failure: {out:?}");
        };
        assert_eq!(atm.category, FailureCategory::ToolNonzeroExit);
        assert_eq!(atm.origin, FailureOrigin::ToolUnavailable);
        assert!(atm.raw_output.contains("/opt/transvar"));
    }

    #[tokio::test]
    async fn undecodable_output_is_unparseable() {
        let invoker = Arc::new(Failing(ToolError::InvalidOutput("stdout is not valid UTF-8".into())));
        let resolver = CoordinateResolver::new(ResolverSettings::default(), invoker);
        let batch = IndexedDescriptor::enumerate([VariantDescriptor::new("ATM:p.L507F")]);
        let out = resolver.resolve_batch(&batch, &CancellationToken::new()).await;
        assert!(matches!(&out[0],
                         ResolutionOutcome::Failed(f) if f.category == FailureCategory::UnparseableOutput
                                                         && f.origin == FailureOrigin::Invocation));
    }

    #[tokio::test]
    async fn cancelled_batch_dispatches_nothing() {
        let invoker = Arc::new(Recording { calls: Mutex::new(Vec::new()),
                                           stdout: "1\t100\tA\tG\n".into() });
        let resolver = CoordinateResolver::new(ResolverSettings::default(), invoker.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let batch = IndexedDescriptor::enumerate([VariantDescriptor::new("BRCA1:p.C61G")]);
        let out = resolver.resolve_batch(&batch, &cancel).await;
        assert!(matches!(&out[0], ResolutionOutcome::Failed(f) if f.category == FailureCategory::Cancelled
                                                                 && f.origin == FailureOrigin::NotDispatched));
        assert!(invoker.calls.lock().unwrap().is_empty());
    }
}
