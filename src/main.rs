use anyhow::{Context, Result};
use audiochunk::audio::FfmpegTool;
use audiochunk::config::Config;
use audiochunk::ingest::register_day;
use audiochunk::pipeline::{print_summary, run_batch, PipelineContext};
use audiochunk::store::{SourceFile, StateStore};
use audiochunk::RunDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audiochunk")]
#[command(version, about = "Convert daily audio drops and split them into fixed-length chunks")]
#[command(
    long_about = "Processes the recordings in input/<YYMMDD>: archives each original, converts it, cuts it into fixed-duration chunks, and tracks every file and chunk in a SQLite database."
)]
struct Cli {
    /// Config file (defaults to <config dir>/audiochunk/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process the day's recordings
    Run {
        /// Day to process, YYMMDD or YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<RunDate>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Record the day's retrieved recordings as pending
    Register {
        /// Day to register, YYMMDD or YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<RunDate>,
    },

    /// Show the recorded state of source files
    Status {
        /// Only show this day
        #[arg(short, long)]
        date: Option<RunDate>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<StateStore> {
    let store = StateStore::new(&config.database_path);
    store
        .ensure_schema()
        .with_context(|| format!("Failed to prepare {}", store.path().display()))?;
    Ok(store)
}

#[derive(Serialize)]
struct StatusRow {
    #[serde(flatten)]
    source: SourceFile,
    chunks: usize,
}

fn print_status(store: &StateStore, date: Option<RunDate>, json: bool) -> Result<()> {
    let rows = store
        .list_sources(date)?
        .into_iter()
        .map(|source| {
            let chunks = store.chunks_for_source(&source.key())?.len();
            Ok(StatusRow { source, chunks })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No source files recorded.");
        return Ok(());
    }

    println!(
        "{:<8} {:<32} {:<11} {:>7} {:>12}  UPDATED",
        "DATE", "SOURCE", "STATUS", "CHUNKS", "BYTES"
    );
    for row in &rows {
        println!(
            "{:<8} {:<32} {:<11} {:>7} {:>12}  {}",
            RunDate::new(row.source.run_date),
            row.source.source_name,
            row.source.status,
            row.chunks,
            row.source.size_bytes,
            row.source.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_logging(cli.verbose, config.log_file.as_deref())?;

    match cli.command {
        Command::Run { date, no_progress } => {
            let run_date = date.unwrap_or_else(RunDate::today);
            config
                .ensure_directories()
                .context("Failed to create working directories")?;
            let store = open_store(&config)?;

            let media = FfmpegTool::from_config(&config);
            media
                .check_available()
                .await
                .context("FFmpeg is required. Install it with: apt install ffmpeg")?;

            info!("Input:      {}", config.input_root.display());
            info!("Processing: {}", config.processing_root.display());
            info!("Run date:   {}", run_date);

            let input_root = config.input_root.clone();
            let ctx = PipelineContext::new(config, store, Arc::new(media))
                .with_progress(!no_progress);
            let summary = run_batch(&ctx, &input_root, run_date).await?;
            print_summary(&summary);
        }
        Command::Register { date } => {
            let run_date = date.unwrap_or_else(RunDate::today);
            config
                .ensure_directories()
                .context("Failed to create working directories")?;
            let store = open_store(&config)?;
            let summary = register_day(
                &store,
                &config.input_root,
                run_date,
                &config.source_extension,
            )?;
            println!(
                "Registered {} file(s) for {}, {} already known",
                summary.registered, run_date, summary.already_known
            );
        }
        Command::Status { date, json } => {
            let store = open_store(&config)?;
            print_status(&store, date, json)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["audiochunk", "run", "--date", "240315", "--no-progress"])
            .unwrap();
        match cli.command {
            Command::Run { date, no_progress } => {
                assert_eq!(date.unwrap().bucket(), "240315");
                assert!(no_progress);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["audiochunk", "run", "--date", "15/03/2024"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["audiochunk", "status", "--json", "-v", "-c", "/etc/a.toml"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/a.toml")));
    }
}
