//! Per-file state machine: skip, convert, chunk, complete, or fail and quarantine.
//!
//! Source status moves `pending -> processing -> completed | failed` within one attempt.
//! A converted file already present in the `Convert` folder means the file was done by an
//! earlier run; the engine then marks it completed without touching the media tool. The one
//! exception is a file whose previous attempt never left `processing` (the process died mid
//! run): its converted output is reused and only the chunk files missing on disk are cut.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::audio::plan_chunks;
use crate::error::{AudiochunkError, Result};
use crate::layout::Layout;
use crate::pipeline::PipelineContext;
use crate::quarantine::quarantine;
use crate::run_date::RunDate;
use crate::store::{ChunkStatus, SourceKey, SourceStatus};

/// How a successfully processed file got to `completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Converted and cut into `chunks` chunks.
    Chunked { chunks: usize, duration: Duration },
    /// The converted output already existed; nothing was redone.
    AlreadyConverted,
    /// An interrupted attempt was finished: `created` chunks were cut and `reused` were kept
    /// from disk, `recovered` of which had no chunk row yet and were recorded now.
    Resumed {
        created: usize,
        reused: usize,
        recovered: usize,
    },
}

/// Process one source file end to end, recording every step in the state store.
///
/// A failure after the `processing` status is written marks the file `failed`, moves its
/// working folder into the failed root, and is then returned to the caller. Store failures on
/// the status updates themselves are returned without that handling.
pub async fn process_one(
    ctx: &PipelineContext,
    input: &Path,
    run_date: RunDate,
) -> Result<ProcessOutcome> {
    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AudiochunkError::FileNotFound(input.display().to_string()))?;
    let key = SourceKey::new(source_name, run_date);

    let interrupted = matches!(
        ctx.store.get_source_by_name(&key)?.map(|row| row.status),
        Some(SourceStatus::Processing)
    );

    ctx.store
        .upsert_source_status(&key, SourceStatus::Processing, Utc::now())?;
    info!("Processing '{}'", key);

    match run_stages(ctx, input, &key, interrupted).await {
        Ok(outcome) => {
            ctx.store
                .upsert_source_status(&key, SourceStatus::Completed, Utc::now())?;
            info!("Completed '{}': {:?}", key, outcome);
            Ok(outcome)
        }
        Err(err) => {
            handle_failure(ctx, &key, &err)?;
            Err(err)
        }
    }
}

async fn run_stages(
    ctx: &PipelineContext,
    input: &Path,
    key: &SourceKey,
    interrupted: bool,
) -> Result<ProcessOutcome> {
    let config = &ctx.config;

    let layout = Layout::plan(
        &config.processing_root,
        &key.name,
        key.run_date,
        &config.converted_extension,
    )?;

    // The raw input is archived before anything transforms it.
    let archived = layout.original_folder.join(&key.name);
    std::fs::copy(input, &archived).map_err(AudiochunkError::file_op("copy", input))?;
    debug!("Archived original to {}", archived.display());

    if layout.converted_file.exists() {
        if !interrupted {
            info!(
                "Skipping conversion for '{}', {} already exists",
                key.name,
                layout.converted_file.display()
            );
            return Ok(ProcessOutcome::AlreadyConverted);
        }

        warn!(
            "Resuming '{}': previous attempt stopped after conversion",
            key.name
        );
        let cut = cut_chunks(ctx, &layout, key, true).await?;
        return Ok(ProcessOutcome::Resumed {
            created: cut.created,
            reused: cut.reused,
            recovered: cut.recovered,
        });
    }

    info!(
        "Converting '{}' to {} format",
        key.name, config.converted_extension
    );
    ctx.media.convert(input, &layout.converted_file).await?;

    let cut = cut_chunks(ctx, &layout, key, false).await?;
    Ok(ProcessOutcome::Chunked {
        chunks: cut.created,
        duration: cut.duration,
    })
}

struct CutResult {
    created: usize,
    reused: usize,
    recovered: usize,
    duration: Duration,
}

async fn cut_chunks(
    ctx: &PipelineContext,
    layout: &Layout,
    key: &SourceKey,
    keep_existing: bool,
) -> Result<CutResult> {
    let duration = ctx.media.duration(&layout.converted_file).await?;
    let spans = plan_chunks(duration, ctx.config.chunk_duration())?;
    info!(
        "Creating {} chunks for '{}' ({:.1}s)",
        spans.len(),
        key.name,
        duration.as_secs_f64()
    );

    // Rows already written by the interrupted attempt; each chunk file gets exactly one.
    let recorded: HashSet<String> = if keep_existing {
        ctx.store
            .chunks_for_source(key)?
            .into_iter()
            .map(|chunk| chunk.chunk_file_name)
            .collect()
    } else {
        HashSet::new()
    };

    let mut result = CutResult {
        created: 0,
        reused: 0,
        recovered: 0,
        duration,
    };
    for span in &spans {
        let chunk_name = span.file_name(&layout.stem, &ctx.config.converted_extension);
        let chunk_path = layout.chunk_path(&chunk_name);
        let is_recorded = recorded.contains(&chunk_name);

        if keep_existing && is_complete(&chunk_path) {
            if is_recorded {
                debug!("Keeping existing chunk {}", chunk_name);
            } else {
                warn!("Recording chunk {} left unrecorded by an earlier run", chunk_name);
                ctx.store
                    .record_chunk(&chunk_name, key, ChunkStatus::Processing, Utc::now())?;
                result.recovered += 1;
            }
            result.reused += 1;
            continue;
        }

        debug!(
            "Extracting chunk {}/{} for '{}'",
            span.index + 1,
            spans.len(),
            key.name
        );
        ctx.media
            .extract_segment(&layout.converted_file, &chunk_path, span.start, span.end)
            .await?;
        if !is_recorded {
            ctx.store
                .record_chunk(&chunk_name, key, ChunkStatus::Processing, Utc::now())?;
        }
        result.created += 1;
    }

    Ok(result)
}

/// An empty chunk file is what a killed extraction leaves behind; it is cut again.
fn is_complete(chunk_path: &Path) -> bool {
    std::fs::metadata(chunk_path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn handle_failure(ctx: &PipelineContext, key: &SourceKey, err: &AudiochunkError) -> Result<()> {
    error!("Error processing file '{}' ({}): {}", key, err.kind(), err);

    ctx.store
        .upsert_source_status(key, SourceStatus::Failed, Utc::now())?;

    if let Err(move_err) = quarantine(
        &ctx.config.processing_root,
        &ctx.config.failed_root,
        key.run_date,
        &Layout::stem_of(&key.name),
    ) {
        error!(
            "Error moving '{}' to the failed folder: {}",
            key, move_err
        );
    }
    Ok(())
}
