pub mod chunk;
pub mod extract;

pub use chunk::{plan_chunks, ChunkSpan};
pub use extract::FfmpegTool;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// The transcoding capability the pipeline drives.
///
/// Every operation either produces its output file or fails; a failure is always a hard
/// failure of that step.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Convert `input` into the working format, writing it to `output`.
    async fn convert(&self, input: &Path, output: &Path) -> Result<()>;

    /// Duration of the media file at `path`.
    async fn duration(&self, path: &Path) -> Result<Duration>;

    /// Copy the `[start, end)` range of `input` into `output`.
    async fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start: Duration,
        end: Duration,
    ) -> Result<()>;

    /// Short name of the backend, used in logs.
    fn name(&self) -> &'static str;
}
