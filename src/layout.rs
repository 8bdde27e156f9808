//! On-disk layout of a source file's working folder.
//!
//! ```text
//! <base>/<YYMMDD>/<stem>/original/<source file>
//!                       /Convert/<stem>.<ext>
//!                       /Chunks/<stem>_<start>_<end>.<ext>
//! ```

use std::path::{Path, PathBuf};

use crate::error::{AudiochunkError, Result};
use crate::run_date::RunDate;

pub const ORIGINAL_DIR: &str = "original";
pub const CONVERT_DIR: &str = "Convert";
pub const CHUNKS_DIR: &str = "Chunks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Source file name without its extension.
    pub stem: String,
    pub file_folder: PathBuf,
    pub original_folder: PathBuf,
    pub convert_folder: PathBuf,
    pub chunks_folder: PathBuf,
    pub converted_file: PathBuf,
}

impl Layout {
    /// Compute the layout without touching the filesystem.
    pub fn resolve(
        base_dir: &Path,
        source_file_name: &str,
        run_date: RunDate,
        converted_extension: &str,
    ) -> Self {
        let stem = Self::stem_of(source_file_name);
        let file_folder = base_dir.join(run_date.bucket()).join(&stem);
        let convert_folder = file_folder.join(CONVERT_DIR);

        Self {
            converted_file: convert_folder.join(format!("{stem}.{converted_extension}")),
            original_folder: file_folder.join(ORIGINAL_DIR),
            chunks_folder: file_folder.join(CHUNKS_DIR),
            convert_folder,
            file_folder,
            stem,
        }
    }

    /// Compute the layout and create every folder in it.
    pub fn plan(
        base_dir: &Path,
        source_file_name: &str,
        run_date: RunDate,
        converted_extension: &str,
    ) -> Result<Self> {
        let layout = Self::resolve(base_dir, source_file_name, run_date, converted_extension);
        layout.ensure_dirs()?;
        Ok(layout)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.original_folder,
            &self.convert_folder,
            &self.chunks_folder,
        ] {
            std::fs::create_dir_all(dir)
                .map_err(AudiochunkError::file_op("create directory", dir))?;
        }
        Ok(())
    }

    pub fn chunk_path(&self, chunk_file_name: &str) -> PathBuf {
        self.chunks_folder.join(chunk_file_name)
    }

    /// Name of the per-file folder for `source_file_name`: the name without its extension.
    pub fn stem_of(source_file_name: &str) -> String {
        Path::new(source_file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_file_name.to_string())
    }
}
