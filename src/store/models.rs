use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::run_date::RunDate;

/// Lifecycle of a source recording within one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Processing => "processing",
            SourceStatus::Completed => "completed",
            SourceStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SourceStatus::Pending),
            "processing" => Ok(SourceStatus::Processing),
            "completed" => Ok(SourceStatus::Completed),
            "failed" => Ok(SourceStatus::Failed),
            other => Err(format!("unknown source status: {other}")),
        }
    }
}

/// Chunk rows are written once, at creation; there is no per-chunk failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Processing,
    Completed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Processing => "processing",
            ChunkStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ChunkStatus::Processing),
            "completed" => Ok(ChunkStatus::Completed),
            other => Err(format!("unknown chunk status: {other}")),
        }
    }
}

/// Identity of a source recording: its file name within one day's batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub name: String,
    pub run_date: RunDate,
}

impl SourceKey {
    pub fn new(name: impl Into<String>, run_date: RunDate) -> Self {
        Self {
            name: name.into(),
            run_date,
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run_date.bucket(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: i64,
    pub source_name: String,
    pub run_date: NaiveDate,
    pub local_path: Option<String>,
    pub size_bytes: i64,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceFile {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            source_name: row.get("source_name")?,
            run_date: row.get("run_date")?,
            local_path: row.get("local_path")?,
            size_bytes: row.get("size_bytes")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn key(&self) -> SourceKey {
        SourceKey::new(self.source_name.clone(), RunDate::new(self.run_date))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: i64,
    pub chunk_file_name: String,
    pub source_name: String,
    pub run_date: NaiveDate,
    pub status: ChunkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            chunk_file_name: row.get("chunk_file_name")?,
            source_name: row.get("source_name")?,
            run_date: row.get("run_date")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|message: String| FromSqlError::Other(message.into()))
            }
        }
    };
}

text_column!(SourceStatus);
text_column!(ChunkStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_status_round_trip_names() {
        for status in [
            SourceStatus::Pending,
            SourceStatus::Processing,
            SourceStatus::Completed,
            SourceStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SourceStatus>().unwrap(), status);
        }
        assert!("Completed".parse::<SourceStatus>().is_err());
    }

    #[test]
    fn test_chunk_status_parse() {
        assert_eq!(
            "processing".parse::<ChunkStatus>().unwrap(),
            ChunkStatus::Processing
        );
        assert!("failed".parse::<ChunkStatus>().is_err());
    }

    #[test]
    fn test_source_key_display() {
        let key = SourceKey::new(
            "sample.wav",
            RunDate::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
        );
        assert_eq!(key.to_string(), "240315/sample.wav");
    }
}
