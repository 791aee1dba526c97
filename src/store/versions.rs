//! Row access for the `versions` table, plus the lineage walk.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::codec;
use super::error::{StoreError, StoreResult};
use crate::model::{ContentHash, FileId, StorageAddress, StorageKind, Version, VersionId, VersionNumber};

const COLUMNS: &str = "id, file_id, version_number, hash, hash_algorithm, address, storage_kind, \
                       status, source_version_id, transformer, metadata_json, created_at, updated_at";

struct VersionRow {
    id: String,
    file_id: String,
    version_number: i64,
    hash: String,
    hash_algorithm: String,
    address: String,
    storage_kind: String,
    status: String,
    source_version_id: Option<String>,
    transformer: String,
    metadata_json: String,
    created_at: String,
    updated_at: String,
}

impl VersionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            version_number: row.get(2)?,
            hash: row.get(3)?,
            hash_algorithm: row.get(4)?,
            address: row.get(5)?,
            storage_kind: row.get(6)?,
            status: row.get(7)?,
            source_version_id: row.get(8)?,
            transformer: row.get(9)?,
            metadata_json: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn decode(self) -> StoreResult<Version> {
        Ok(Version {
            version_number: codec::decode_version_number(&self.id, self.version_number)?,
            status: codec::decode_tag("versions", &self.id, &self.status)?,
            kind: StorageKind::from_tag_lossy(&self.storage_kind),
            metadata: codec::decode_metadata(&self.metadata_json)?,
            created_at: codec::decode_timestamp(&self.created_at)?,
            updated_at: codec::decode_timestamp(&self.updated_at)?,
            hash: ContentHash::new(self.hash, self.hash_algorithm),
            address: StorageAddress::new(self.address),
            source_version_id: self.source_version_id.map(VersionId::new),
            transformer: self.transformer,
            id: VersionId::new(self.id),
            file_id: FileId::new(self.file_id),
        })
    }
}

/// Insert, or overwrite the mutable fields of an existing row with the
/// same id. Number, file, kind and lineage pointer are fixed at insert.
pub fn upsert(conn: &Connection, version: &Version) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO versions (id, file_id, version_number, hash, hash_algorithm, address,
                              storage_kind, status, source_version_id, transformer,
                              metadata_json, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(id) DO UPDATE SET
            hash = excluded.hash,
            hash_algorithm = excluded.hash_algorithm,
            address = excluded.address,
            status = excluded.status,
            transformer = excluded.transformer,
            metadata_json = excluded.metadata_json,
            updated_at = excluded.updated_at
        "#,
        params![
            version.id.as_str(),
            version.file_id.as_str(),
            i64::from(version.version_number),
            version.hash.value,
            version.hash.algorithm,
            version.address.as_str(),
            version.kind.as_str(),
            version.status.as_str(),
            version.source_version_id.as_ref().map(VersionId::as_str),
            version.transformer,
            codec::encode_metadata(&version.metadata)?,
            codec::encode_timestamp(&version.created_at),
            codec::encode_timestamp(&version.updated_at),
        ],
    )
    .map_err(StoreError::from_write)?;
    Ok(())
}

pub fn update(conn: &Connection, version: &Version) -> StoreResult<usize> {
    conn.execute(
        r#"
        UPDATE versions
        SET hash = ?2, hash_algorithm = ?3, address = ?4, status = ?5,
            transformer = ?6, metadata_json = ?7, updated_at = ?8
        WHERE id = ?1
        "#,
        params![
            version.id.as_str(),
            version.hash.value,
            version.hash.algorithm,
            version.address.as_str(),
            version.status.as_str(),
            version.transformer,
            codec::encode_metadata(&version.metadata)?,
            codec::encode_timestamp(&version.updated_at),
        ],
    )
    .map_err(StoreError::from_write)
}

pub fn get(conn: &Connection, id: &VersionId) -> StoreResult<Option<Version>> {
    let sql = format!("SELECT {COLUMNS} FROM versions WHERE id = ?1");
    conn.query_row(&sql, params![id.as_str()], VersionRow::read)
        .optional()?
        .map(VersionRow::decode)
        .transpose()
}

pub fn get_by_number(
    conn: &Connection,
    file_id: &FileId,
    number: VersionNumber,
) -> StoreResult<Option<Version>> {
    let sql = format!("SELECT {COLUMNS} FROM versions WHERE file_id = ?1 AND version_number = ?2");
    conn.query_row(&sql, params![file_id.as_str(), i64::from(number)], VersionRow::read)
        .optional()?
        .map(VersionRow::decode)
        .transpose()
}

pub fn latest(conn: &Connection, file_id: &FileId) -> StoreResult<Option<Version>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM versions WHERE file_id = ?1 AND status = 'COMMITTED' \
         ORDER BY version_number DESC LIMIT 1"
    );
    conn.query_row(&sql, params![file_id.as_str()], VersionRow::read)
        .optional()?
        .map(VersionRow::decode)
        .transpose()
}

pub fn list(conn: &Connection, file_id: &FileId, include_deleted: bool) -> StoreResult<Vec<Version>> {
    let filter = if include_deleted { "" } else { " AND status != 'DELETED'" };
    let sql = format!("SELECT {COLUMNS} FROM versions WHERE file_id = ?1{filter} ORDER BY version_number");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![file_id.as_str()], VersionRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(VersionRow::decode).collect()
}

/// Deleted versions still hold their numbers, so they count here.
pub fn next_number(conn: &Connection, file_id: &FileId) -> StoreResult<VersionNumber> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version_number), 0) + 1 FROM versions WHERE file_id = ?1",
        params![file_id.as_str()],
        |row| row.get(0),
    )?;
    codec::decode_version_number(file_id.as_str(), next)
}

/// Follow lineage pointers from `start`, one lookup per hop.
///
/// The start version is returned even when `max_depth` is zero.
pub fn lineage(conn: &Connection, start: &VersionId, max_depth: usize) -> StoreResult<Vec<Version>> {
    let limit = max_depth.max(1);
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(start.clone());

    while let Some(id) = next.take() {
        if chain.len() >= limit {
            break;
        }
        if !visited.insert(id.clone()) {
            warn!(start = %start, revisit = %id, "lineage cycle detected");
            break;
        }
        let Some(version) = get(conn, &id)? else {
            break;
        };
        next = version.source_version_id.clone();
        chain.push(version);
    }

    Ok(chain)
}
