use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{AudiochunkError, Result};
use crate::run_date::RunDate;

/// Move the working folder of a failed file from the processing root into the failed root.
///
/// The folder keeps its `<YYMMDD>/<stem>` subtree. Returns the new location, or `None` if
/// there was no working folder to move.
pub fn quarantine(
    processing_root: &Path,
    failed_root: &Path,
    run_date: RunDate,
    stem: &str,
) -> Result<Option<PathBuf>> {
    let working = processing_root.join(run_date.bucket()).join(stem);
    if !working.exists() {
        debug!("No working folder to quarantine at {}", working.display());
        return Ok(None);
    }

    let day_folder = failed_root.join(run_date.bucket());
    std::fs::create_dir_all(&day_folder)
        .map_err(AudiochunkError::file_op("create directory", &day_folder))?;

    let destination = unique_destination(&day_folder, stem);
    move_dir(&working, &destination)?;

    info!(
        "Moved '{}' to quarantine at {}",
        stem,
        destination.display()
    );
    Ok(Some(destination))
}

/// `<dir>/<stem>`, or `<dir>/<stem>.<n>` for the first free `n` if that is taken.
fn unique_destination(dir: &Path, stem: &str) -> PathBuf {
    let candidate = dir.join(stem);
    if !candidate.exists() {
        return candidate;
    }

    (1..)
        .map(|n| dir.join(format!("{stem}.{n}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

fn move_dir(from: &Path, to: &Path) -> Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(
                "Rename of {} failed ({e}), falling back to copy",
                from.display()
            );
            copy_tree(from, to)?;
            std::fs::remove_dir_all(from).map_err(AudiochunkError::file_op("remove", from))
        }
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| AudiochunkError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| AudiochunkError::Io(std::io::Error::other(e)))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(AudiochunkError::file_op("create directory", &target))?;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(AudiochunkError::file_op("copy", entry.path()))?;
        }
    }
    Ok(())
}
