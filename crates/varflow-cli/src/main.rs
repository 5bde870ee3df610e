use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Args, Parser, Subcommand};
use log::{error, info};
use varflow::config::parse_stage_list;
use varflow::{Pipeline, PipelineConfig, PipelineError, PipelineInput};
use varflow_core::{RunState, StatusCallback, StatusUpdate};
use varflow_domain::VariantDescriptor;

#[derive(Debug, Parser)]
#[command(name = "varflow", version, about = "Genomic variant annotation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ejecuta la secuencia completa de etapas.
    Run(RunArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("input").required(true).args(["variant", "csv", "vcf"])))]
struct RunArgs {
    /// Descriptor de variante (p. ej. `ATM:p.L507F`); repetible.
    #[arg(long)]
    variant: Vec<String>,
    /// CSV con columnas `gene` y `protein_change`.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// VCF ya construido; omite resolución y ensamblado.
    #[arg(long)]
    vcf: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Etapa a deshabilitar (acepta alias como `tps` o `report`); repetible.
    #[arg(long = "disable-stage")]
    disable_stage: Vec<String>,
    /// Transcrito preferido `GEN=TRANSCRITO`; repetible.
    #[arg(long = "transcript", value_parser = parse_transcript)]
    transcript: Vec<(String, String)>,
    #[arg(long)]
    preserve_intermediates: bool,
}

fn parse_transcript(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((gene, tx)) if !gene.trim().is_empty() && !tx.trim().is_empty() => {
            Ok((gene.trim().to_string(), tx.trim().to_string()))
        }
        _ => Err(format!("expected GENE=TRANSCRIPT, got '{value}'")),
    }
}

fn input_of(args: &RunArgs) -> PipelineInput {
    if let Some(path) = &args.csv {
        PipelineInput::Csv(path.clone())
    } else if let Some(path) = &args.vcf {
        PipelineInput::Vcf(path.clone())
    } else {
        PipelineInput::Variants(args.variant.iter().map(VariantDescriptor::new).collect())
    }
}

fn config_for(args: &RunArgs) -> Result<PipelineConfig, PipelineError> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    for stage in parse_stage_list(&args.disable_stage.join(","))? {
        if !config.disabled_stages.contains(&stage) {
            config.disabled_stages.push(stage);
        }
    }
    config.preserve_intermediates |= args.preserve_intermediates;
    Ok(config)
}

async fn run(args: RunArgs) -> Result<RunState, PipelineError> {
    let config = config_for(&args)?;
    let callback: StatusCallback = Arc::new(|u: &StatusUpdate| -> Result<(), String> {
        info!("[{}] {} -> {} ({:?}) {}", u.run_id, u.stage, u.state.as_str(), u.elapsed, u.message);
        Ok(())
    });
    let transcripts: HashMap<String, String> = args.transcript.iter().cloned().collect();
    let pipeline = Pipeline::new(config).with_status_callback(callback)
                                        .with_preferred_transcripts(transcripts);
    let report = pipeline.run(input_of(&args)).await?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("could not serialize the run report: {e}"),
    }
    Ok(report.state)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => match run(args).await {
            Ok(RunState::Failed) => ExitCode::from(1),
            Ok(_) => ExitCode::SUCCESS,
            Err(PipelineError::Configuration(msg)) => {
                error!("configuration error: {msg}");
                ExitCode::from(2)
            }
            Err(e) => {
                error!("{e}");
                ExitCode::from(1)
            }
        },
    }
}
