use crate::error::{AudiochunkError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root holding the `YYMMDD` day folders filled by the retrieval step.
    pub input_root: PathBuf,
    /// Root the per-file working folders are built under.
    pub processing_root: PathBuf,
    /// Root failed working folders are relocated to.
    pub failed_root: PathBuf,
    pub database_path: PathBuf,
    /// Append logs to this file instead of stdout.
    pub log_file: Option<PathBuf>,
    /// Extension of recognized source recordings, without the dot.
    pub source_extension: String,
    /// Extension of the converted and chunked output, without the dot.
    pub converted_extension: String,
    pub audio_codec: String,
    pub chunk_duration_secs: u64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("input"),
            processing_root: PathBuf::from("processing"),
            failed_root: PathBuf::from("failed"),
            database_path: PathBuf::from("conversion.db"),
            log_file: None,
            source_extension: "wav".to_string(),
            converted_extension: "wma".to_string(),
            audio_codec: "wmav2".to_string(),
            chunk_duration_secs: 10,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default config file), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(AudiochunkError::FileNotFound(path.display().to_string()));
                }
                Self::from_file(path)?
            }
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(AudiochunkError::file_op("read config", path))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Override fields from `AUDIOCHUNK_*` variables resolved through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("AUDIOCHUNK_INPUT_ROOT") {
            self.input_root = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("AUDIOCHUNK_PROCESSING_ROOT") {
            self.processing_root = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("AUDIOCHUNK_FAILED_ROOT") {
            self.failed_root = PathBuf::from(dir);
        }
        if let Some(db) = lookup("AUDIOCHUNK_DATABASE") {
            self.database_path = PathBuf::from(db);
        }
        if let Some(log) = lookup("AUDIOCHUNK_LOG_FILE") {
            self.log_file = Some(PathBuf::from(log));
        }
        if let Some(secs) = lookup("AUDIOCHUNK_CHUNK_SECONDS") {
            if let Ok(secs) = secs.parse() {
                self.chunk_duration_secs = secs;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_duration_secs == 0 {
            return Err(AudiochunkError::Config(
                "chunk_duration_secs must be greater than 0".to_string(),
            ));
        }

        for (field, ext) in [
            ("source_extension", &self.source_extension),
            ("converted_extension", &self.converted_extension),
        ] {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(AudiochunkError::Config(format!(
                    "{field} must be a bare extension like 'wav', got '{ext}'"
                )));
            }
        }

        for (field, dir) in [
            ("input_root", &self.input_root),
            ("processing_root", &self.processing_root),
            ("failed_root", &self.failed_root),
            ("database_path", &self.database_path),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(AudiochunkError::Config(format!("{field} must not be empty")));
            }
        }

        Ok(())
    }

    pub fn chunk_duration(&self) -> Duration {
        Duration::from_secs(self.chunk_duration_secs)
    }

    /// Create the input, processing and failed roots plus the database directory.
    pub fn ensure_directories(&self) -> Result<()> {
        let mut dirs = vec![
            self.input_root.clone(),
            self.processing_root.clone(),
            self.failed_root.clone(),
        ];
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.push(parent.to_path_buf());
            }
        }

        for dir in dirs {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .map_err(AudiochunkError::file_op("create directory", &dir))?;
                info!("Directory '{}' created", dir.display());
            }
        }
        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audiochunk").join("config.toml"))
    }
}
