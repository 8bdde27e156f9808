use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::error::{AudiochunkError, Result};

use super::MediaTool;

/// Number of trailing stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

/// [`MediaTool`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: String,
    ffprobe: String,
    audio_codec: String,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            audio_codec: "wmav2".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
            .with_codec(config.audio_codec.clone())
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = codec.into();
        self
    }

    /// Check that both FFmpeg and FFprobe can be executed.
    pub async fn check_available(&self) -> Result<()> {
        for binary in [&self.ffmpeg, &self.ffprobe] {
            let output = Command::new(binary)
                .arg("-version")
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| {
                    AudiochunkError::Transform(format!(
                        "{binary} not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
                    ))
                })?;

            if !output.status.success() {
                return Err(AudiochunkError::Transform(format!(
                    "{binary} version check failed"
                )));
            }
        }

        debug!("FFmpeg and FFprobe are available");
        Ok(())
    }

    async fn run(&self, command: &mut Command, label: &str) -> Result<Output> {
        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AudiochunkError::Transform(format!("Failed to run {label}: {e}")))?;

        if !output.status.success() {
            return Err(AudiochunkError::Transform(format!(
                "{label} exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        if !input.exists() {
            return Err(AudiochunkError::FileNotFound(input.display().to_string()));
        }

        let partial = partial_path(output);
        debug!(
            "Converting {} to {} with {}",
            input.display(),
            output.display(),
            self.audio_codec
        );

        let result = self
            .run(
                Command::new(&self.ffmpeg)
                    .args(["-y", "-i"])
                    .arg(input)
                    .args(["-vn", "-acodec", self.audio_codec.as_str()])
                    .arg(&partial),
                "FFmpeg conversion",
            )
            .await;

        finish_partial(result, &partial, output).await
    }

    async fn duration(&self, path: &Path) -> Result<Duration> {
        let output = self
            .run(
                Command::new(&self.ffprobe)
                    .args([
                        "-v",
                        "error",
                        "-show_entries",
                        "format=duration",
                        "-of",
                        "default=noprint_wrappers=1:nokey=1",
                    ])
                    .arg(path),
                "FFprobe",
            )
            .await?;

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start: Duration,
        end: Duration,
    ) -> Result<()> {
        if end <= start {
            return Err(AudiochunkError::Transform(
                "Segment duration is zero".to_string(),
            ));
        }

        let start_secs = format!("{:.3}", start.as_secs_f64());
        let end_secs = format!("{:.3}", end.as_secs_f64());
        debug!("Extracting segment: start={}, end={}", start_secs, end_secs);

        let partial = partial_path(output);
        let result = self
            .run(
                Command::new(&self.ffmpeg)
                    .args(["-y", "-i"])
                    .arg(input)
                    .args(["-acodec", "copy", "-ss", start_secs.as_str(), "-to", end_secs.as_str()])
                    .arg(&partial),
                "FFmpeg segment extraction",
            )
            .await;

        finish_partial(result, &partial, output).await
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Move a finished `.partial` file into place, or clean it up if FFmpeg failed.
///
/// `output` only ever appears complete, so a killed run never leaves a truncated file under
/// the final name.
async fn finish_partial(result: Result<Output>, partial: &Path, output: &Path) -> Result<()> {
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(e);
    }

    if !partial.exists() {
        return Err(AudiochunkError::Transform(format!(
            "FFmpeg did not create {}",
            output.display()
        )));
    }

    tokio::fs::rename(partial, output)
        .await
        .map_err(AudiochunkError::file_op("rename", output))
}

/// Sibling path FFmpeg writes to before the result is renamed into place.
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
        None => format!("{stem}.partial"),
    };
    output.with_file_name(name)
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let secs: f64 = raw.parse().map_err(|e| {
        AudiochunkError::Transform(format!("Failed to parse duration '{raw}': {e}"))
    })?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(AudiochunkError::Transform(format!(
            "FFprobe reported an invalid duration '{raw}'"
        )));
    }

    Duration::try_from_secs_f64(secs).map_err(|e| {
        AudiochunkError::Transform(format!("FFprobe reported an invalid duration '{raw}': {e}"))
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/Convert/sample.wma")),
            PathBuf::from("/out/Convert/sample.partial.wma")
        );
        assert_eq!(
            partial_path(Path::new("/out/raw")),
            PathBuf::from("/out/raw.partial")
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("25.000000\n").unwrap(), Duration::from_secs(25));
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-1.5").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(matches!(
            parse_duration("1e300"),
            Err(AudiochunkError::Transform(_))
        ));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = b"one\ntwo\n\nthree\nfour\nfive\nsix\n";
        assert_eq!(stderr_tail(stderr), "two | three | four | five | six");
    }

    #[tokio::test]
    async fn test_check_available() {
        let result = FfmpegTool::default().check_available().await;
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }
        assert!(result.is_ok(), "FFmpeg check failed: {:?}", result.err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_transform_failure() {
        let tool = FfmpegTool::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let result = tool.check_available().await;
        assert!(matches!(result, Err(AudiochunkError::Transform(_))));
    }

    #[tokio::test]
    async fn test_convert_file_not_found() {
        let result = FfmpegTool::default()
            .convert(Path::new("/nonexistent/file.wav"), Path::new("/tmp/out.wma"))
            .await;
        match result {
            Err(AudiochunkError::FileNotFound(path)) => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_run_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sample_0_10.wma");
        let partial = partial_path(&output);
        std::fs::write(&partial, b"half a chunk").unwrap();

        let result = finish_partial(
            Err(AudiochunkError::Transform("killed".to_string())),
            &partial,
            &output,
        )
        .await;

        assert!(result.is_err());
        assert!(!partial.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_extract_failure_leaves_no_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sample_0_10.wma");
        let tool = FfmpegTool::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");

        let result = tool
            .extract_segment(
                &dir.path().join("sample.wma"),
                &output,
                Duration::ZERO,
                Duration::from_secs(10),
            )
            .await;

        assert!(matches!(result, Err(AudiochunkError::Transform(_))));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_range() {
        let result = FfmpegTool::default()
            .extract_segment(
                Path::new("/tmp/in.wma"),
                Path::new("/tmp/out.wma"),
                Duration::from_secs(10),
                Duration::from_secs(10),
            )
            .await;
        assert!(matches!(result, Err(AudiochunkError::Transform(_))));
    }
}
