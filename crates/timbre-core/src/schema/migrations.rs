/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Vector position -> track mapping, replaced wholesale on every rebuild
CREATE TABLE IF NOT EXISTS vector_metadata (
    vector_id INTEGER PRIMARY KEY,
    track_id INTEGER NOT NULL,
    vector_dimensions INTEGER NOT NULL,
    faiss_index TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vector_metadata_track_id ON vector_metadata(track_id);

-- Catalog tables. Populated by the external catalog loader; created here so
-- the detail join is valid against an empty store.
CREATE TABLE IF NOT EXISTS tracks (
    track_id INTEGER PRIMARY KEY,
    title TEXT,
    date_created TEXT,
    genre_top TEXT
);

CREATE TABLE IF NOT EXISTS artists (
    track_id INTEGER NOT NULL,
    name TEXT
);

CREATE INDEX IF NOT EXISTS idx_artists_track_id ON artists(track_id);

CREATE TABLE IF NOT EXISTS albums (
    track_id INTEGER NOT NULL,
    title TEXT
);

CREATE INDEX IF NOT EXISTS idx_albums_track_id ON albums(track_id);
"#;

const MIGRATION_002: &str = r#"
-- History of completed index builds
CREATE TABLE IF NOT EXISTS index_builds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    built_at TEXT NOT NULL,
    index_type TEXT NOT NULL,
    vector_dimensions INTEGER NOT NULL,
    vector_count INTEGER NOT NULL,
    categories TEXT NOT NULL,
    skipped_files INTEGER NOT NULL DEFAULT 0
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: MIGRATION_001,
    },
    Migration {
        version: 2,
        name: "index_builds",
        sql: MIGRATION_002,
    },
];
