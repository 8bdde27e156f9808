use std::time::Duration;

use crate::error::{AudiochunkError, Result};

/// Upper bound on chunks cut from one recording, well past any real recording length.
pub const MAX_CHUNKS: u32 = 1_000_000;

/// One fixed-length slice of a converted recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
}

impl ChunkSpan {
    /// Chunk file name, e.g. `sample_10_20.wma`.
    pub fn file_name(&self, stem: &str, extension: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            stem,
            self.start.as_secs(),
            self.end.as_secs(),
            extension
        )
    }
}

/// Plan `floor(total / chunk_duration)` back-to-back spans starting at zero.
///
/// Spans always have the full chunk length, so the last one may end past `total`; the
/// trailing remainder shorter than one chunk is not emitted. A duration that would need more
/// than [`MAX_CHUNKS`] spans is rejected.
pub fn plan_chunks(total: Duration, chunk_duration: Duration) -> Result<Vec<ChunkSpan>> {
    if chunk_duration.is_zero() {
        return Ok(Vec::new());
    }

    let ratio = total.as_secs_f64() / chunk_duration.as_secs_f64();
    if !ratio.is_finite() || ratio < 1.0 {
        return Ok(Vec::new());
    }
    if ratio >= f64::from(MAX_CHUNKS) + 1.0 {
        return Err(too_long(total));
    }
    let count = ratio.floor() as u32;

    (0..count)
        .map(|index| {
            let start = chunk_duration
                .checked_mul(index)
                .ok_or_else(|| too_long(total))?;
            let end = start
                .checked_add(chunk_duration)
                .ok_or_else(|| too_long(total))?;
            Ok(ChunkSpan {
                index: index as usize,
                start,
                end,
            })
        })
        .collect()
}

fn too_long(total: Duration) -> AudiochunkError {
    AudiochunkError::Transform(format!(
        "Duration of {:.1}s is too long to chunk",
        total.as_secs_f64()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_exact_multiple() {
        let chunks = plan_chunks(Duration::from_secs(30), Duration::from_secs(10)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].start, Duration::from_secs(20));
        assert_eq!(chunks[2].end, Duration::from_secs(30));
    }

    #[test]
    fn test_plan_drops_short_remainder() {
        let chunks = plan_chunks(Duration::from_secs_f64(29.9), Duration::from_secs(10)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].end, Duration::from_secs(20));
    }

    #[test]
    fn test_plan_ranges_are_contiguous() {
        let c = Duration::from_secs(7);
        let chunks = plan_chunks(Duration::from_secs(100), c).unwrap();
        assert_eq!(chunks.len(), 14);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.start, c * i as u32);
            assert_eq!(chunk.end, c * (i as u32 + 1));
        }
    }

    #[test]
    fn test_plan_shorter_than_one_chunk() {
        assert!(plan_chunks(Duration::from_secs(9), Duration::from_secs(10))
            .unwrap()
            .is_empty());
        assert!(plan_chunks(Duration::ZERO, Duration::from_secs(10))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_plan_zero_chunk_duration() {
        assert!(plan_chunks(Duration::from_secs(60), Duration::ZERO)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_plan_rejects_absurd_duration() {
        let huge = Duration::from_secs(u64::MAX / 2);
        assert!(matches!(
            plan_chunks(huge, Duration::from_secs(10)),
            Err(AudiochunkError::Transform(_))
        ));

        let limit = Duration::from_secs(10) * MAX_CHUNKS;
        let chunks = plan_chunks(limit, Duration::from_secs(10)).unwrap();
        assert_eq!(chunks.len(), MAX_CHUNKS as usize);
        assert_eq!(chunks.last().unwrap().end, limit);
    }

    #[test]
    fn test_file_name() {
        let span = ChunkSpan {
            index: 1,
            start: Duration::from_secs(10),
            end: Duration::from_secs(20),
        };
        assert_eq!(span.file_name("sample", "wma"), "sample_10_20.wma");
    }
}
