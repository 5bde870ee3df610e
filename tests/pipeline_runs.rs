use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use varflow::adapters::{ToolError, ToolInvocation, ToolInvoker, ToolOutput};
use varflow::engine::{CancellationToken, RunState, StageId, StageState, StatusUpdate};
use varflow::domain::{KnowledgeSourceSpec, VariantDescriptor};
use varflow::{Pipeline, PipelineConfig, PipelineError, PipelineInput};

/// Simula las cuatro herramientas externas según el nombre del programa.
#[derive(Default)]
struct FakeTools {
    transvar_calls: AtomicUsize,
}

fn done(stdout: &str) -> Result<ToolOutput, ToolError> {
    Ok(ToolOutput { exit_code: Some(0),
                    stdout: stdout.into(),
                    ..ToolOutput::default() })
}

#[async_trait]
impl ToolInvoker for FakeTools {
    async fn invoke(&self, inv: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        match inv.program.as_str() {
            "transvar" => {
                self.transvar_calls.fetch_add(1, Ordering::SeqCst);
                match inv.args[2].as_str() {
                    "ATM:p.L507F" => done("11\t108236402\tC\tT\n"),
                    "BRAF:p.V600E" => done("7\t140753336\tA\tT\n"),
                    "KRAS:p.G12D" => Ok(ToolOutput { exit_code: Some(1),
                                                     stderr: "Error: transcript not found".into(),
                                                     ..ToolOutput::default() }),
                    _ => done(""),
                }
            }
            "sarj" => {
                std::fs::write(&inv.args[1], "{\"variants\":[]}")?;
                done("")
            }
            "tps" => {
                if inv.args[1].contains("broken") {
                    return Ok(ToolOutput { exit_code: Some(3),
                                           stderr: "cannot open knowledge base".into(),
                                           ..ToolOutput::default() });
                }
                std::fs::write(&inv.args[2], "{\"hits\":[]}")?;
                done("")
            }
            "json2csv" => {
                std::fs::write(&inv.args[1], "gene,effect\nATM,missense\n")?;
                done("")
            }
            other => Err(ToolError::Spawn { program: other.into(),
                                            message: "not found".into() }),
        }
    }
}

fn config(output_dir: &Path, sources: &[(&str, &str)]) -> PipelineConfig {
    PipelineConfig { annotate_a_executable: Some("sarj".into()),
                     annotate_b_executable: Some("tps".into()),
                     tabulate_executable: Some("json2csv".into()),
                     knowledge_sources: sources.iter().map(|(id, p)| KnowledgeSourceSpec::new(*id, *p)).collect(),
                     output_dir: output_dir.to_path_buf(),
                     timeout: Duration::from_secs(5),
                     retry: varflow::engine::RetryPolicy::new(2, Duration::from_millis(1)),
                     ..PipelineConfig::default() }
}

const TWO_SOURCES: &[(&str, &str)] = &[("cosmic_v97", "/kb/cosmic"), ("clinvar_20230801", "/kb/clinvar")];

fn variants(notations: &[&str]) -> PipelineInput {
    PipelineInput::Variants(notations.iter().map(|n| VariantDescriptor::new(*n)).collect())
}

fn pipeline(config: PipelineConfig) -> (Pipeline, Arc<FakeTools>) {
    let tools = Arc::new(FakeTools::default());
    (Pipeline::new(config).with_invoker(tools.clone()), tools)
}

#[tokio::test]
async fn clean_run_completes_and_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline(config(dir.path(), TWO_SOURCES));
    let report = pipeline.run(variants(&["ATM:p.L507F", "BRAF:p.V600E"])).await.unwrap();

    assert_eq!(report.state, RunState::Completed, "{}", report.message);
    for id in StageId::ORDER {
        assert_eq!(report.stage_state(id), Some(StageState::Succeeded), "{id}");
    }
    let annotate_b = report.artifacts.get(StageId::AnnotateB).unwrap();
    let labels: Vec<_> = annotate_b.entries().iter().map(|e| e.label.clone().unwrap()).collect();
    assert_eq!(labels, vec!["cosmic_v97", "clinvar_20230801"]);

    let vcf = std::fs::read_to_string(report.artifacts.primary(StageId::Assemble).unwrap()).unwrap();
    assert!(vcf.contains("##recordCount=2"));
    let lines: Vec<&str> = vcf.lines().filter(|l| !l.starts_with('#')).collect();
    assert!(lines[0].starts_with("11\t108236402\t.\tC\tT"));
    assert!(lines[1].starts_with("7\t140753336\t.\tA\tT"));

    let report_csv = std::fs::read_to_string(report.artifacts.primary(StageId::Extract).unwrap()).unwrap();
    assert_eq!(report_csv,
               "knowledge_source,gene,effect\ncosmic_v97,ATM,missense\nclinvar_20230801,ATM,missense\n");

    assert!(report.run_dir.join("events.jsonl").is_file());
    assert!(report.run_dir.join("run_summary.json").is_file());
    assert!(!report.run_dir.join("scratch").exists());
}

#[tokio::test]
async fn item_failures_make_the_run_partial_and_partition_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, tools) = pipeline(config(dir.path(), TWO_SOURCES));
    let input = variants(&["ATM:p.L507F", "GENE1:fusion(GENE2)", "KRAS:p.G12D", "BRAF:p.V600E"]);
    let report = pipeline.run(input).await.unwrap();

    assert_eq!(report.state, RunState::PartiallyCompleted);
    assert_eq!(tools.transvar_calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.ledger.total_inputs, 4);
    let failed: Vec<usize> = report.failures.iter().filter_map(|f| f.index).collect();
    assert_eq!(failed, vec![1, 2]);

    let categories: Vec<&str> = report.ledger.categories.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(categories, vec!["unsupported_coordinate_type", "tool_nonzero_exit"]);
    assert_eq!(report.ledger.categories[0].percentage, 25.0);
    assert!(report.ledger.categories.iter().all(|c| c.remediation.is_some()));

    let vcf = std::fs::read_to_string(report.artifacts.primary(StageId::Assemble).unwrap()).unwrap();
    assert!(vcf.contains("##recordCount=2"));
    assert!(report.run_dir.join("failure_ledger.json").is_file());
}

#[tokio::test]
async fn failing_knowledge_source_leaves_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let sources = &[("cosmic_v97", "/kb/cosmic"), ("local", "/kb/broken"), ("clinvar_20230801", "/kb/clinvar")];
    let (pipeline, _) = pipeline(config(dir.path(), sources));
    let report = pipeline.run(variants(&["ATM:p.L507F"])).await.unwrap();

    assert_eq!(report.stage_state(StageId::AnnotateB), Some(StageState::Succeeded));
    assert_eq!(report.artifacts.get(StageId::AnnotateB).unwrap().len(), 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].label.as_deref(), Some("local"));
    assert_eq!(report.state, RunState::PartiallyCompleted);
}

#[tokio::test]
async fn disabled_stage_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), TWO_SOURCES);
    cfg.disabled_stages = vec![StageId::Extract];
    let (pipeline, _) = pipeline(cfg);
    let report = pipeline.run(variants(&["ATM:p.L507F"])).await.unwrap();
    assert_eq!(report.stage_state(StageId::Extract), Some(StageState::Skipped));
    assert_eq!(report.stage_state(StageId::Tabulate), Some(StageState::Succeeded));
    assert_eq!(report.state, RunState::Completed);
}

#[tokio::test]
async fn supplied_vcf_bypasses_resolution_and_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = dir.path().join("ready.vcf");
    std::fs::write(&vcf,
                   "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n11\t108236402\t.\tC\tT\t.\t.\t.\n")
        .unwrap();
    let (pipeline, tools) = pipeline(config(&dir.path().join("out"), TWO_SOURCES));
    let report = pipeline.run(PipelineInput::Vcf(vcf.clone())).await.unwrap();

    assert_eq!(report.stage_state(StageId::Resolve), Some(StageState::Skipped));
    assert_eq!(report.stage_state(StageId::Assemble), Some(StageState::Skipped));
    assert_eq!(report.stage_state(StageId::AnnotateA), Some(StageState::Succeeded));
    assert_eq!(report.artifacts.primary(StageId::Assemble), Some(vcf.as_path()));
    assert_eq!(tools.transvar_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.state, RunState::Completed);
}

#[tokio::test]
async fn csv_input_uses_gene_and_change_columns() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("input.csv");
    std::fs::write(&csv, "Gene,Protein_Change\nATM,p.L507F\n,p.A1V\n").unwrap();
    let (pipeline, tools) = pipeline(config(&dir.path().join("out"), TWO_SOURCES));
    let report = pipeline.run(PipelineInput::Csv(csv)).await.unwrap();
    assert_eq!(report.state, RunState::Completed, "{}", report.message);
    assert_eq!(report.ledger.total_inputs, 1);
    assert_eq!(tools.transvar_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn configuration_errors_abort_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never_created");
    let mut cfg = config(&out, TWO_SOURCES);
    cfg.annotate_a_executable = None;
    let (pipeline, tools) = pipeline(cfg);
    let err = pipeline.run(variants(&["ATM:p.L507F"])).await.unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert!(!out.exists());
    assert_eq!(tools.transvar_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_input_file_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline(config(dir.path(), TWO_SOURCES));
    let err = pipeline.run(PipelineInput::Csv(PathBuf::from("/nonexistent/input.csv"))).await.unwrap_err();
    assert!(matches!(err, PipelineError::Input(_)));
}

#[tokio::test]
async fn status_callback_follows_the_stage_order() {
    let dir = tempfile::tempdir().unwrap();
    let seen: Arc<Mutex<Vec<(StageId, StageState)>>> = Arc::default();
    let sink = seen.clone();
    let (pipeline, _) = pipeline(config(dir.path(), TWO_SOURCES));
    let pipeline = pipeline.with_status_callback(Arc::new(move |u: &StatusUpdate| -> Result<(), String> {
                                                     sink.lock().unwrap().push((u.stage, u.state));
                                                     Ok(())
                                                 }));
    pipeline.run(variants(&["ATM:p.L507F"])).await.unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), StageId::ORDER.len() * 2);
    assert_eq!(seen[0], (StageId::Validate, StageState::Running));
    assert_eq!(seen[13], (StageId::Extract, StageState::Succeeded));
}

#[tokio::test]
async fn cancelled_run_starts_no_stage() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let (pipeline, tools) = pipeline(config(dir.path(), TWO_SOURCES));
    let report = pipeline.with_cancellation(token).run(variants(&["ATM:p.L507F"])).await.unwrap();
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.stage_state(StageId::Validate), Some(StageState::Pending));
    assert_eq!(tools.transvar_calls.load(Ordering::SeqCst), 0);
}
