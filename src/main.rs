use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stagehand::admission::AdmissionController;
use stagehand::cli::TargetArgs;
use stagehand::config::PipelineConfig;
use stagehand::error::StagehandError;
use stagehand::index::RangeIndex;
use stagehand::queue::JobQueue;
use stagehand::stages::StageDriver;
use stagehand::submit::{DispatchMode, Dispatcher, ShellSubmitter};

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(version)]
#[command(about = "Batch-pipeline job submission coordinator")]
struct Cli {
    /// Queue commands for the admission cycle instead of submitting now
    #[arg(short = 'q', long, global = true)]
    queue: bool,

    /// TOML config file; built-in defaults are used when omitted
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit skim jobs over raw detector data
    Skim(TargetArgs),

    /// Submit waveform-extraction jobs over skim output
    Wave(TargetArgs),

    /// Split wave files into small parts for parallel analysis
    Split(TargetArgs),

    /// Annotate split files with the cut of the first file
    Cut(TargetArgs),

    /// Submit analysis jobs over split output
    Lat(TargetArgs),

    /// Convert wave output to dataframe files
    Convert(TargetArgs),

    /// Run one admission cycle: query occupancy, drain the queue
    Cron,

    /// Report scheduler occupancy and queue length
    Status,
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let index = RangeIndex::new(config.datasets.clone(), config.calibration.clone());
    let queue = JobQueue::new(config.queue_path.clone());

    match &cli.command {
        Command::Cron => {
            let controller = AdmissionController::new(&config);
            let report = controller.cycle(&queue, &mut ShellSubmitter)?;
            tracing::info!(
                submitted = report.submitted.len(),
                remaining = report.remaining,
                "admission cycle done"
            );
        }
        Command::Status => {
            let controller = AdmissionController::new(&config);
            let status = controller.query();
            let queued = queue.entries()?.len();
            println!(
                "running {} (cap {})  pending {} (cap {})  queued {}",
                status.running_jobs, config.max_running, status.pending_jobs, config.max_pending, queued
            );
        }
        stage => {
            let mode = if cli.queue {
                DispatchMode::Queue
            } else {
                DispatchMode::Immediate
            };
            let mut dispatch = Dispatcher::new(mode, config.submit_prefix.clone(), queue);
            let mut driver = StageDriver::new(&config, &index, &mut dispatch);
            run_stage(&mut driver, stage, &index, config.cal_run_limit)?;
        }
    }

    Ok(())
}

fn run_stage(
    driver: &mut StageDriver,
    command: &Command,
    index: &RangeIndex,
    cal_run_limit: usize,
) -> Result<(), StagehandError> {
    let target = match command {
        Command::Skim(t)
        | Command::Wave(t)
        | Command::Split(t)
        | Command::Cut(t)
        | Command::Lat(t)
        | Command::Convert(t) => t,
        Command::Cron | Command::Status => unreachable!("handled in main"),
    };
    let (selection, cal) = target.resolve(index, cal_run_limit)?;
    let cal = cal.as_deref();
    match command {
        Command::Skim(_) => driver.skim(selection, cal),
        Command::Wave(_) => driver.wave(selection, cal),
        Command::Split(_) => driver.split(selection, cal),
        Command::Cut(_) => driver.cut(selection, cal),
        Command::Lat(_) => driver.lat(selection, cal),
        Command::Convert(_) => driver.convert(selection, cal),
        Command::Cron | Command::Status => unreachable!("handled in main"),
    }
}
