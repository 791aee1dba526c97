//! Row access for the `collections` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::codec;
use super::error::{StoreError, StoreResult};
use crate::model::{Collection, CollectionId};

const COLUMNS: &str = "id, name, description, project, owner, status, created_at, updated_at, metadata_json";

/// Raw column values, decoded outside the rusqlite row callback.
struct CollectionRow {
    id: String,
    name: String,
    description: String,
    project: String,
    owner: String,
    status: String,
    created_at: String,
    updated_at: String,
    metadata_json: String,
}

impl CollectionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            project: row.get(3)?,
            owner: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            metadata_json: row.get(8)?,
        })
    }

    fn decode(self) -> StoreResult<Collection> {
        Ok(Collection {
            status: codec::decode_tag("collections", &self.id, &self.status)?,
            created_at: codec::decode_timestamp(&self.created_at)?,
            updated_at: codec::decode_timestamp(&self.updated_at)?,
            metadata: codec::decode_metadata(&self.metadata_json)?,
            id: CollectionId::new(self.id),
            name: self.name,
            description: self.description,
            project: self.project,
            owner: self.owner,
        })
    }
}

/// Insert, or overwrite the mutable fields of an existing row with the
/// same id.
pub fn upsert(conn: &Connection, collection: &Collection) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO collections (id, name, description, project, owner, status,
                                 created_at, updated_at, metadata_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            project = excluded.project,
            owner = excluded.owner,
            status = excluded.status,
            updated_at = excluded.updated_at,
            metadata_json = excluded.metadata_json
        "#,
        params![
            collection.id.as_str(),
            collection.name,
            collection.description,
            collection.project,
            collection.owner,
            collection.status.as_str(),
            codec::encode_timestamp(&collection.created_at),
            codec::encode_timestamp(&collection.updated_at),
            codec::encode_metadata(&collection.metadata)?,
        ],
    )
    .map_err(StoreError::from_write)?;
    Ok(())
}

/// Overwrite the mutable fields; returns the number of rows touched.
pub fn update(conn: &Connection, collection: &Collection) -> StoreResult<usize> {
    conn.execute(
        r#"
        UPDATE collections
        SET name = ?2, description = ?3, project = ?4, owner = ?5, status = ?6,
            updated_at = ?7, metadata_json = ?8
        WHERE id = ?1
        "#,
        params![
            collection.id.as_str(),
            collection.name,
            collection.description,
            collection.project,
            collection.owner,
            collection.status.as_str(),
            codec::encode_timestamp(&collection.updated_at),
            codec::encode_metadata(&collection.metadata)?,
        ],
    )
    .map_err(StoreError::from_write)
}

pub fn get(conn: &Connection, id: &CollectionId) -> StoreResult<Option<Collection>> {
    let sql = format!("SELECT {COLUMNS} FROM collections WHERE id = ?1");
    conn.query_row(&sql, params![id.as_str()], CollectionRow::read)
        .optional()?
        .map(CollectionRow::decode)
        .transpose()
}

pub fn get_by_name(conn: &Connection, name: &str) -> StoreResult<Option<Collection>> {
    let sql = format!("SELECT {COLUMNS} FROM collections WHERE name = ?1");
    conn.query_row(&sql, params![name], CollectionRow::read)
        .optional()?
        .map(CollectionRow::decode)
        .transpose()
}

pub fn list(conn: &Connection, include_deleted: bool) -> StoreResult<Vec<Collection>> {
    let sql = if include_deleted {
        format!("SELECT {COLUMNS} FROM collections ORDER BY name")
    } else {
        format!("SELECT {COLUMNS} FROM collections WHERE status != 'DELETED' ORDER BY name")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], CollectionRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(CollectionRow::decode).collect()
}
