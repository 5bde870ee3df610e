//! Anotación multi-fuente: una invocación por fuente de conocimiento.
//!
//! Las invocaciones corren en un pool acotado; los resultados se devuelven en
//! orden de configuración. El fallo de una fuente no aborta a las demás.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use varflow_core::{retry_with_backoff, RetryPolicy};
use varflow_domain::KnowledgeSourceSpec;

use crate::errors::ToolError;
use crate::invoker::{invoke_with_timeout, require_output, ToolInvocation, ToolInvoker, ToolOutput};

/// Ejecuta `task` sobre cada elemento con como máximo `workers` en vuelo.
/// El vector resultado tiene la misma longitud y orden que `items`; los
/// elementos no despachados por cancelación quedan como `ToolError::Cancelled`.
pub async fn bounded_fan_out<T, R, F, Fut>(items: Vec<T>,
                                           workers: usize,
                                           cancel: &CancellationToken,
                                           task: F)
                                           -> Vec<Result<R, ToolError>>
    where T: Send + 'static,
          R: Send + 'static,
          F: Fn(T) -> Fut,
          Fut: Future<Output = Result<R, ToolError>> + Send + 'static
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut slots: Vec<Option<Result<R, ToolError>>> = (0..items.len()).map(|_| None).collect();
    let mut set = JoinSet::new();
    for (slot, item) in items.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        let fut = task(item);
        set.spawn(async move {
            let result = fut.await;
            drop(permit);
            (slot, result)
        });
    }
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((slot, result)) => slots[slot] = Some(result),
            Err(e) => warn!("fan-out task failed: {e}"),
        }
    }
    slots.into_iter()
         .map(|s| {
             s.unwrap_or_else(|| {
                  if cancel.is_cancelled() {
                      Err(ToolError::Cancelled)
                  } else {
                      Err(ToolError::Io("task terminated unexpectedly".into()))
                  }
              })
         })
         .collect()
}

/// Resultado por fuente.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: KnowledgeSourceSpec,
    pub result: Result<PathBuf, ToolError>,
}

#[derive(Debug, Clone)]
pub struct MultiSourceSettings {
    pub executable: String,
    pub sources: Vec<KnowledgeSourceSpec>,
    pub workers: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Clone)]
pub struct MultiSourceAnnotator {
    settings: Arc<MultiSourceSettings>,
    invoker: Arc<dyn ToolInvoker>,
}

impl MultiSourceAnnotator {
    pub fn new(settings: MultiSourceSettings, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { settings: Arc::new(settings),
               invoker }
    }

    pub fn settings(&self) -> &MultiSourceSettings {
        &self.settings
    }

    /// `<out_dir>/<stem del input>_<id de fuente>.json`
    pub fn output_path(input: &Path, out_dir: &Path, source: &KnowledgeSourceSpec) -> PathBuf {
        let stem = input.file_stem().map_or_else(|| "annotation".into(), |s| s.to_string_lossy().into_owned());
        out_dir.join(format!("{stem}_{}.json", source.id))
    }

    /// Una invocación por fuente, con reintentos para errores transitorios.
    pub async fn annotate(&self, input: &Path, out_dir: &Path, cancel: &CancellationToken) -> Vec<SourceResult> {
        let sources = self.settings.sources.clone();
        let jobs: Vec<(KnowledgeSourceSpec, PathBuf)> =
            sources.iter().map(|s| (s.clone(), Self::output_path(input, out_dir, s))).collect();
        let input = input.to_path_buf();
        let results = bounded_fan_out(jobs, self.settings.workers, cancel, |(source, output)| {
                          let this = self.clone();
                          let input = input.clone();
                          async move { this.annotate_one(&input, &source, output).await }
                      }).await;
        sources.into_iter()
               .zip(results)
               .map(|(source, result)| {
                   match &result {
                       Ok(path) => info!("source {} annotated: {}", source.id, path.display()),
                       Err(e) => warn!("source {} failed: {e}", source.id),
                   }
                   SourceResult { source, result }
               })
               .collect()
    }

    async fn annotate_one(&self,
                          input: &Path,
                          source: &KnowledgeSourceSpec,
                          output: PathBuf)
                          -> Result<PathBuf, ToolError> {
        let invocation = ToolInvocation::new(&self.settings.executable).path_arg(input)
                                                                       .path_arg(&source.path)
                                                                       .path_arg(&output);
        retry_with_backoff(&self.settings.retry, ToolError::is_retryable, |_attempt| {
            let invocation = invocation.clone();
            let output = output.clone();
            async move {
                let _ = tokio::fs::remove_file(&output).await;
                invoke_with_timeout(self.invoker.as_ref(), &invocation, self.settings.timeout).await
                                                                                           .and_then(ToolOutput::into_result)?;
                require_output(&output).await?;
                let text = tokio::fs::read_to_string(&output).await?;
                serde_json::from_str::<serde_json::Value>(&text)
                    .map_err(|e| ToolError::InvalidOutput(format!("{} is not valid JSON: {e}", output.display())))?;
                Ok::<PathBuf, ToolError>(output)
            }
        }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn results_follow_input_order_not_completion_order() {
        let out = bounded_fan_out(vec![30u64, 1, 15], 3, &CancellationToken::new(), |ms| async move {
                      tokio::time::sleep(Duration::from_millis(ms)).await;
                      Ok::<u64, ToolError>(ms)
                  }).await;
        let values: Vec<u64> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![30, 1, 15]);
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..8).collect();
        let (f, p) = (in_flight.clone(), peak.clone());
        let out = bounded_fan_out(items, 2, &CancellationToken::new(), move |i| {
                      let (f, p) = (f.clone(), p.clone());
                      async move {
                          let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                          p.fetch_max(now, Ordering::SeqCst);
                          tokio::time::sleep(Duration::from_millis(5)).await;
                          f.fetch_sub(1, Ordering::SeqCst);
                          Ok::<usize, ToolError>(i)
                      }
                  }).await;
        assert_eq!(out.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancelled_fan_out_dispatches_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = bounded_fan_out(vec![1, 2], 2, &cancel, |i| async move { Ok::<i32, ToolError>(i) }).await;
        assert!(out.iter().all(|r| matches!(r, Err(ToolError::Cancelled))));
    }

    #[test]
    fn output_path_uses_input_stem_and_source_id() {
        let source = KnowledgeSourceSpec::new("cosmic_v97", "/kb/cosmic");
        let path = MultiSourceAnnotator::output_path(Path::new("/run/annotation_a.json"), Path::new("/run/annotate_b"), &source);
        assert_eq!(path, PathBuf::from("/run/annotate_b/annotation_a_cosmic_v97.json"));
    }
}
