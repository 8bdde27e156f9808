//! Registration of retrieved recordings.
//!
//! The transfer itself happens elsewhere and leaves files under `input_root/<YYMMDD>`. This
//! records each of them once per day as a `pending` source file with its path and size.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{AudiochunkError, Result};
use crate::pipeline::list_candidates;
use crate::run_date::RunDate;
use crate::store::{SourceKey, StateStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSummary {
    pub registered: usize,
    pub already_known: usize,
}

/// Register every matching file in the day folder that has no row for this date yet.
pub fn register_day(
    store: &StateStore,
    input_root: &Path,
    run_date: RunDate,
    source_extension: &str,
) -> Result<RegisterSummary> {
    let mut summary = RegisterSummary::default();

    let day_folder = input_root.join(run_date.bucket());
    if !day_folder.is_dir() {
        info!("No input folder for date {}", run_date);
        return Ok(summary);
    }

    for path in list_candidates(&day_folder, source_extension)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = SourceKey::new(name, run_date);

        if store.get_source_by_name(&key)?.is_some() {
            debug!("Skipping '{}', already registered for {}", key.name, run_date);
            summary.already_known += 1;
            continue;
        }

        let size = std::fs::metadata(&path)
            .map_err(AudiochunkError::file_op("read metadata of", &path))?
            .len();
        let local_path = relative_to_cwd(&path);
        store.register_source(&key, &local_path.to_string_lossy(), size, Utc::now())?;
        info!("Registered '{}' ({} bytes)", key, size);
        summary.registered += 1;
    }

    Ok(summary)
}

fn relative_to_cwd(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}
