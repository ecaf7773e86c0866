use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::error;

use dep_reconcile::config::{PipelineConfig, log_path};
use dep_reconcile::logging::init_logging;
use dep_reconcile::pipeline::{Pipeline, PipelineInputs};

#[derive(Parser)]
#[command(name = "dep-reconcile")]
#[command(
    version,
    about = "Reconcile a module inventory table against a build manifest and package registries"
)]
struct Cli {
    /// Module table exported from the current build
    current_table: String,

    /// Reference table (path or http(s) URL), or a *.deps.json manifest
    /// when the reference table comes from `referenceUrl`
    source: String,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory searched for *.deps.json manifests
    #[arg(long, value_name = "DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory the finished table is written to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Do not persist the table between stages
    #[arg(long)]
    no_checkpoint: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let _guard = init_logging(config.log_filter.as_deref(), Some(&log_path()));

    match run(&cli, config) {
        Ok(output) => {
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.upload_dir {
        config.upload_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.no_checkpoint {
        config.checkpoint = false;
    }
    Ok(config)
}

fn run(cli: &Cli, config: PipelineConfig) -> anyhow::Result<PathBuf> {
    let inputs = PipelineInputs::from_args(&cli.current_table, &cli.source, &config)?;
    let pipeline = Pipeline::new(config);

    let report = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(pipeline.run(&inputs))?;

    Ok(report.output)
}
