//! Durable record of source files and the chunks produced from them.
//!
//! Every call opens its own connection and runs in autocommit mode, so a write is on disk
//! before the call returns. Nothing is batched.

pub mod models;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::{AudiochunkError, Result};
use crate::run_date::RunDate;

pub use models::{ChunkRecord, ChunkStatus, SourceFile, SourceKey, SourceStatus};

const SCHEMA: &str = include_str!("schema.sql");

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = FULL;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}

/// SQLite-backed store for [`SourceFile`] and [`ChunkRecord`] rows.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store at `path`. The database file is created on first use.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(|source| {
            AudiochunkError::OpenStore {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| AudiochunkError::OpenStore {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    /// Create both tables if they are missing. Safe to call on every startup.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Set the status of `key`, inserting the row first if this is the first time it is seen.
    pub fn upsert_source_status(
        &self,
        key: &SourceKey,
        status: SourceStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO source_files (source_name, run_date, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(source_name, run_date) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![&key.name, key.run_date.date(), status, at],
        )?;
        Ok(())
    }

    /// Insert a `pending` row for a freshly retrieved file.
    ///
    /// An existing row for the same key is left untouched and returned as is.
    pub fn register_source(
        &self,
        key: &SourceKey,
        local_path: &str,
        size_bytes: u64,
        at: DateTime<Utc>,
    ) -> Result<SourceFile> {
        let size_bytes = i64::try_from(size_bytes).map_err(|_| {
            AudiochunkError::Config(format!("file size {size_bytes} does not fit the store"))
        })?;

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO source_files
                (source_name, run_date, local_path, size_bytes, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(source_name, run_date) DO NOTHING",
            params![
                &key.name,
                key.run_date.date(),
                local_path,
                size_bytes,
                SourceStatus::Pending,
                at
            ],
        )?;

        let row = conn.query_row(
            "SELECT * FROM source_files WHERE source_name = ?1 AND run_date = ?2",
            params![&key.name, key.run_date.date()],
            SourceFile::from_row,
        )?;
        Ok(row)
    }

    /// Append a chunk row. Duplicates are not rejected.
    pub fn record_chunk(
        &self,
        chunk_file_name: &str,
        source: &SourceKey,
        status: ChunkStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO chunks (chunk_file_name, source_name, run_date, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                chunk_file_name,
                &source.name,
                source.run_date.date(),
                status,
                at
            ],
        )?;
        Ok(())
    }

    pub fn get_source_by_name(&self, key: &SourceKey) -> Result<Option<SourceFile>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT * FROM source_files WHERE source_name = ?1 AND run_date = ?2",
                params![&key.name, key.run_date.date()],
                SourceFile::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All source rows, optionally restricted to one run date, oldest first.
    pub fn list_sources(&self, run_date: Option<RunDate>) -> Result<Vec<SourceFile>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM source_files
             WHERE (?1 IS NULL OR run_date = ?1)
             ORDER BY run_date ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([run_date.map(|d| d.date())], SourceFile::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Chunk rows for one source in the order they were produced.
    pub fn chunks_for_source(&self, key: &SourceKey) -> Result<Vec<ChunkRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM chunks WHERE source_name = ?1 AND run_date = ?2 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![&key.name, key.run_date.date()],
                ChunkRecord::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_by_status(&self, run_date: Option<RunDate>) -> Result<HashMap<SourceStatus, usize>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM source_files
             WHERE (?1 IS NULL OR run_date = ?1)
             GROUP BY status",
        )?;
        let mut map = HashMap::new();
        for row in stmt.query_map([run_date.map(|d| d.date())], |row| {
            Ok((row.get::<_, SourceStatus>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (status, count) = row?;
            map.insert(status, count as usize);
        }
        Ok(map)
    }
}
