//! Table layout and migration.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::StoreResult;

/// Version recorded in the `meta` table.
pub const SCHEMA_VERSION: &str = "1";

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
  key   TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS collections (
  id            TEXT PRIMARY KEY,
  name          TEXT NOT NULL UNIQUE,
  description   TEXT NOT NULL DEFAULT '',
  project       TEXT NOT NULL DEFAULT '',
  owner         TEXT NOT NULL DEFAULT '',
  status        TEXT NOT NULL DEFAULT 'ACTIVE',
  created_at    TEXT NOT NULL,
  updated_at    TEXT NOT NULL,
  metadata_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS files (
  id            TEXT PRIMARY KEY,
  collection_id TEXT NOT NULL REFERENCES collections(id),
  name          TEXT NOT NULL,
  description   TEXT NOT NULL DEFAULT '',
  owner         TEXT NOT NULL DEFAULT '',
  status        TEXT NOT NULL DEFAULT 'ACTIVE',
  created_at    TEXT NOT NULL,
  updated_at    TEXT NOT NULL,
  UNIQUE(collection_id, name)
);

CREATE TABLE IF NOT EXISTS versions (
  id                TEXT PRIMARY KEY,
  file_id           TEXT NOT NULL REFERENCES files(id),
  version_number    INTEGER NOT NULL,
  hash              TEXT NOT NULL DEFAULT '',
  hash_algorithm    TEXT NOT NULL DEFAULT 'md5',
  address           TEXT NOT NULL DEFAULT '',
  storage_kind      TEXT NOT NULL DEFAULT 'LOCAL',
  status            TEXT NOT NULL DEFAULT 'DRAFT',
  source_version_id TEXT,
  transformer       TEXT NOT NULL DEFAULT '',
  metadata_json     TEXT NOT NULL DEFAULT '{}',
  created_at        TEXT NOT NULL,
  updated_at        TEXT NOT NULL,
  UNIQUE(file_id, version_number)
);

CREATE INDEX IF NOT EXISTS idx_files_collection ON files(collection_id);
CREATE INDEX IF NOT EXISTS idx_versions_file ON versions(file_id);
CREATE INDEX IF NOT EXISTS idx_versions_source ON versions(source_version_id);
"#;

/// Create missing tables and record the schema version. Idempotent.
pub fn migrate(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(DDL)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    if inserted > 0 {
        debug!(version = SCHEMA_VERSION, "initialized schema");
    }
    Ok(())
}

/// Schema version stored in the database, if it has been initialized.
pub fn stored_version(conn: &Connection) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}
