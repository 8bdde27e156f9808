use crate::audio::MediaTool;
use crate::config::Config;
use crate::engine::{process_one, ProcessOutcome};
use crate::error::{AudiochunkError, Result};
use crate::run_date::RunDate;
use crate::store::StateStore;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Handles shared by every operation of one run.
///
/// Built once at startup and passed explicitly; nothing in the crate reaches for globals.
pub struct PipelineContext {
    pub config: Config,
    pub store: StateStore,
    pub media: Arc<dyn MediaTool>,
    /// Show a progress bar while the batch runs.
    pub show_progress: bool,
}

impl PipelineContext {
    pub fn new(config: Config, store: StateStore, media: Arc<dyn MediaTool>) -> Self {
        Self {
            config,
            store,
            media,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// A file the batch gave up on, with the error that stopped it.
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub source_name: String,
    pub error: String,
}

/// What happened during one batch run.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub run_date: RunDate,
    /// Source files found in the day folder.
    pub attempted: usize,
    /// Converted and chunked in this run.
    pub chunked: usize,
    /// Already converted by an earlier run.
    pub skipped: usize,
    /// Finished after an interrupted earlier run.
    pub resumed: usize,
    pub chunks_created: usize,
    pub failed: Vec<FailedFile>,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn new(run_date: RunDate) -> Self {
        Self {
            run_date,
            attempted: 0,
            chunked: 0,
            skipped: 0,
            resumed: 0,
            chunks_created: 0,
            failed: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Files that reached `completed` in this run.
    pub fn completed(&self) -> usize {
        self.chunked + self.skipped + self.resumed
    }

    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Chunked { chunks, .. } => {
                self.chunked += 1;
                self.chunks_created += chunks;
            }
            ProcessOutcome::AlreadyConverted => self.skipped += 1,
            ProcessOutcome::Resumed { created, .. } => {
                self.resumed += 1;
                self.chunks_created += created;
            }
        }
    }
}

/// Process every source file in `input_root/<YYMMDD>` one at a time.
///
/// A missing day folder means there is nothing to do. A file that fails is logged and counted,
/// and the batch moves on to the next one.
pub async fn run_batch(
    ctx: &PipelineContext,
    input_root: &Path,
    run_date: RunDate,
) -> Result<BatchSummary> {
    let start_time = Instant::now();
    let mut summary = BatchSummary::new(run_date);

    let day_folder = input_root.join(run_date.bucket());
    if !day_folder.is_dir() {
        info!(
            "No files found for date {} in {}",
            run_date,
            input_root.display()
        );
        return Ok(summary);
    }

    let candidates = list_candidates(&day_folder, &ctx.config.source_extension)?;
    info!(
        "Found {} .{} files in {}, converting with {}",
        candidates.len(),
        ctx.config.source_extension,
        day_folder.display(),
        ctx.media.name()
    );

    let progress = ctx.show_progress.then(|| {
        let pb = ProgressBar::new(candidates.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    for path in candidates {
        summary.attempted += 1;
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(pb) = &progress {
            pb.set_message(source_name.clone());
        }

        match process_one(ctx, &path, run_date).await {
            Ok(outcome) => {
                debug!("'{}' finished: {:?}", source_name, outcome);
                summary.record(&outcome);
            }
            Err(e) => {
                error!("Error processing file {}: {}", path.display(), e);
                summary.failed.push(FailedFile {
                    source_name,
                    error: e.to_string(),
                });
            }
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("✓ {} files", summary.attempted));
    }

    summary.elapsed = start_time.elapsed();
    info!(
        "Batch {} done: {} completed, {} failed in {:.2}s",
        run_date,
        summary.completed(),
        summary.failed.len(),
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

/// Regular files in `day_folder` whose name ends in `.<extension>`, in listing order.
pub fn list_candidates(day_folder: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let suffix = format!(".{extension}");
    let entries = std::fs::read_dir(day_folder)
        .map_err(AudiochunkError::file_op("list", day_folder))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(AudiochunkError::file_op("list", day_folder))?;
        let path = entry.path();
        let matches = entry.file_name().to_string_lossy().ends_with(&suffix);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Print a summary of the batch run.
pub fn print_summary(summary: &BatchSummary) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                  Batch {} Complete", summary.run_date);
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Files:      {}", summary.attempted);
    println!(
        "  {} Chunked:  {} ({} chunks)",
        style("✓").green(),
        summary.chunked,
        summary.chunks_created
    );
    println!("  {} Skipped:  {}", style("↷").cyan(), summary.skipped);
    if summary.resumed > 0 {
        println!("  {} Resumed:  {}", style("↻").yellow(), summary.resumed);
    }
    println!("  {} Failed:   {}", style("✗").red(), summary.failed.len());
    for failed in &summary.failed {
        println!("      {}: {}", style(&failed.source_name).bold(), failed.error);
    }
    println!();
    println!("  Time:       {:.2}s", summary.elapsed.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
