//! Lungscope: lung-cancer risk scoring from the command line.
//!
//! Reads patient records as JSON and prints prediction results as JSON on
//! stdout. Logs go to stderr (or a file) so stdout stays machine-readable.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lungscope::adapters::sanitize::SanitizingMakeWriter;
use lungscope::{PatientRecord, PipelineConfig, PredictionService};

#[derive(Parser, Debug)]
#[command(name = "lungscope", version, about = "Lung-cancer risk scoring")]
struct Cli {
    /// Signed model bundle directory
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Pipeline configuration JSON (thresholds, caps, batch policy)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one patient record (JSON object; `-` reads stdin)
    Predict { file: PathBuf },
    /// Score a JSON array of patient records
    Batch { file: PathBuf },
    /// Show the loaded model
    Info,
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging. stdout carries results, so logs default to stderr.
    let log_mode = std::env::var("LUNGSCOPE_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file =
            std::env::var("LUNGSCOPE_LOG_FILE").unwrap_or_else(|_| "lungscope.log".to_string());

        if let Some(parent) = Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let service = PredictionService::new(config).context("configuring prediction service")?;

    // `info` reports an unloaded model instead of failing.
    if let Err(e) = service.reload(&cli.model_dir) {
        match cli.command {
            Command::Info => tracing::warn!("No model loaded: {}", e),
            _ => return Err(e).context("loading model bundle"),
        }
    }

    match &cli.command {
        Command::Predict { file } => {
            let record: PatientRecord = serde_json::from_str(&read_input(file)?)
                .context("parsing patient record")?;
            print_json(&service.predict(&record)?)?;
        }
        Command::Batch { file } => {
            let records: Vec<PatientRecord> = serde_json::from_str(&read_input(file)?)
                .context("parsing patient records")?;
            print_json(&service.predict_batch(&records)?)?;
        }
        Command::Info => match service.model_info() {
            Some(info) => print_json(&info)?,
            None => print_json(&serde_json::json!({ "ready": false }))?,
        },
    }

    Ok(())
}
