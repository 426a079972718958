use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::model::{IndexBuild, IndexType, TrackDetail, TrackId, VectorId, VectorMetadataRow};

use super::migrations::MIGRATIONS;

/// Default time to wait on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Vector ids bound per detail query.
const RESOLVE_CHUNK: usize = 500;

/// A database connection holding vector metadata and the track catalog.
///
/// The connection is closed when the handle is dropped.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database, waiting at most `busy_timeout` on locks.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Vector metadata
impl Database {
    /// Replace the whole `vector_metadata` table with `rows`.
    ///
    /// Runs in one transaction: on error the previous contents survive.
    pub fn replace_vector_metadata(&self, rows: &[VectorMetadataRow]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM vector_metadata", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO vector_metadata (vector_id, track_id, vector_dimensions, faiss_index)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.vector_id.as_i64(),
                    row.track_id.get(),
                    row.vector_dimensions as i64,
                    row.index_type.as_str(),
                ])?;
            }
        }
        tx.commit()?;

        log::info!("Replaced vector metadata with {} rows", rows.len());
        Ok(rows.len())
    }

    /// All metadata rows, ordered by vector id.
    pub fn list_vector_metadata(&self) -> Result<Vec<VectorMetadataRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT vector_id, track_id, vector_dimensions, faiss_index
             FROM vector_metadata
             ORDER BY vector_id",
        )?;

        let rows = stmt
            .query_map([], |row| Self::row_to_metadata(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Number of rows in `vector_metadata`.
    pub fn count_vector_metadata(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vector_metadata", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn row_to_metadata(row: &rusqlite::Row) -> rusqlite::Result<VectorMetadataRow> {
        let index_type: String = row.get(3)?;
        Ok(VectorMetadataRow {
            vector_id: VectorId::new(column_to_usize(row, 0)?),
            track_id: TrackId::new(row.get(1)?),
            vector_dimensions: column_to_usize(row, 2)?,
            index_type: index_type
                .parse::<IndexType>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        })
    }
}

// Track detail resolution
impl Database {
    /// Join vector ids to their track, artist and album records.
    ///
    /// Ids without a metadata row (or without catalog rows) are dropped.
    /// Duplicate ids yield one record. Records come back in the order the
    /// ids first appear in `vector_ids`.
    pub fn resolve_track_details(&self, vector_ids: &[VectorId]) -> Result<Vec<TrackDetail>> {
        let mut rank: HashMap<VectorId, usize> = HashMap::new();
        let mut unique: Vec<VectorId> = Vec::new();
        for &id in vector_ids {
            if !rank.contains_key(&id) {
                rank.insert(id, unique.len());
                unique.push(id);
            }
        }

        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<VectorId, TrackDetail> = HashMap::new();
        for chunk in unique.chunks(RESOLVE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let query = format!(
                "SELECT vm.vector_id, t.track_id, t.title, a.name,
                        CAST(strftime('%Y', t.date_created) AS INTEGER),
                        al.title, t.genre_top
                 FROM vector_metadata vm
                 INNER JOIN tracks t ON t.track_id = vm.track_id
                 INNER JOIN artists a ON a.track_id = t.track_id
                 INNER JOIN albums al ON al.track_id = t.track_id
                 WHERE vm.vector_id IN ({placeholders})"
            );

            let mut stmt = self.conn.prepare(&query)?;
            let details = stmt
                .query_map(
                    rusqlite::params_from_iter(chunk.iter().map(|id| id.as_i64())),
                    |row| Self::row_to_detail(row),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for detail in details {
                found.entry(detail.vector_id).or_insert(detail);
            }
        }

        let mut details: Vec<TrackDetail> = found.into_values().collect();
        details.sort_by_key(|d| rank.get(&d.vector_id).copied().unwrap_or(usize::MAX));

        if details.is_empty() {
            log::info!(
                "No tracks found for the given {} vector ids",
                unique.len()
            );
        } else {
            log::debug!(
                "Resolved {} of {} vector ids to tracks",
                details.len(),
                unique.len()
            );
        }

        Ok(details)
    }

    fn row_to_detail(row: &rusqlite::Row) -> rusqlite::Result<TrackDetail> {
        let released: Option<i64> = row.get(4)?;
        Ok(TrackDetail {
            vector_id: VectorId::new(column_to_usize(row, 0)?),
            track_id: TrackId::new(row.get(1)?),
            title: row.get(2)?,
            artist: row.get(3)?,
            released: released.and_then(|y| i32::try_from(y).ok()),
            album: row.get(5)?,
            genre: row.get(6)?,
        })
    }
}

// Index build history
impl Database {
    /// Record a completed index build.
    pub fn record_index_build(&self, build: &IndexBuild) -> Result<()> {
        self.conn.execute(
            "INSERT INTO index_builds (
                built_at, index_type, vector_dimensions, vector_count, categories, skipped_files
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                build.built_at.to_rfc3339(),
                build.index_type.as_str(),
                build.vector_dimensions as i64,
                build.vector_count as i64,
                serde_json::to_string(&build.categories)?,
                build.skipped_files as i64,
            ],
        )?;
        Ok(())
    }

    /// The most recent index build, if any.
    pub fn latest_index_build(&self) -> Result<Option<IndexBuild>> {
        let build = self
            .conn
            .query_row(
                "SELECT built_at, index_type, vector_dimensions, vector_count, categories, skipped_files
                 FROM index_builds
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                |row| Self::row_to_build(row),
            )
            .optional()?;
        Ok(build)
    }

    fn row_to_build(row: &rusqlite::Row) -> rusqlite::Result<IndexBuild> {
        use chrono::DateTime;

        let built_at: String = row.get(0)?;
        let index_type: String = row.get(1)?;
        let categories: String = row.get(4)?;

        Ok(IndexBuild {
            built_at: DateTime::parse_from_rfc3339(&built_at)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?
                .into(),
            index_type: index_type
                .parse::<IndexType>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
            vector_dimensions: column_to_usize(row, 2)?,
            vector_count: column_to_usize(row, 3)?,
            categories: serde_json::from_str(&categories)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
            skipped_files: column_to_usize(row, 5)?,
        })
    }
}

fn column_to_usize(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(idx)?;
    usize::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}
