//! Row access for the `files` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::codec;
use super::error::{StoreError, StoreResult};
use crate::model::{CollectionId, FileId, LogicalFile};

const COLUMNS: &str = "id, collection_id, name, description, owner, status, created_at, updated_at";

struct FileRow {
    id: String,
    collection_id: String,
    name: String,
    description: String,
    owner: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl FileRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            collection_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            owner: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> StoreResult<LogicalFile> {
        Ok(LogicalFile {
            status: codec::decode_tag("files", &self.id, &self.status)?,
            created_at: codec::decode_timestamp(&self.created_at)?,
            updated_at: codec::decode_timestamp(&self.updated_at)?,
            id: FileId::new(self.id),
            collection_id: CollectionId::new(self.collection_id),
            name: self.name,
            description: self.description,
            owner: self.owner,
        })
    }
}

pub fn upsert(conn: &Connection, file: &LogicalFile) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO files (id, collection_id, name, description, owner, status,
                           created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            owner = excluded.owner,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
        params![
            file.id.as_str(),
            file.collection_id.as_str(),
            file.name,
            file.description,
            file.owner,
            file.status.as_str(),
            codec::encode_timestamp(&file.created_at),
            codec::encode_timestamp(&file.updated_at),
        ],
    )
    .map_err(StoreError::from_write)?;
    Ok(())
}

pub fn update(conn: &Connection, file: &LogicalFile) -> StoreResult<usize> {
    conn.execute(
        r#"
        UPDATE files
        SET name = ?2, description = ?3, owner = ?4, status = ?5, updated_at = ?6
        WHERE id = ?1
        "#,
        params![
            file.id.as_str(),
            file.name,
            file.description,
            file.owner,
            file.status.as_str(),
            codec::encode_timestamp(&file.updated_at),
        ],
    )
    .map_err(StoreError::from_write)
}

pub fn get(conn: &Connection, id: &FileId) -> StoreResult<Option<LogicalFile>> {
    let sql = format!("SELECT {COLUMNS} FROM files WHERE id = ?1");
    conn.query_row(&sql, params![id.as_str()], FileRow::read)
        .optional()?
        .map(FileRow::decode)
        .transpose()
}

pub fn get_by_name(
    conn: &Connection,
    collection_id: &CollectionId,
    name: &str,
) -> StoreResult<Option<LogicalFile>> {
    let sql = format!("SELECT {COLUMNS} FROM files WHERE collection_id = ?1 AND name = ?2");
    conn.query_row(&sql, params![collection_id.as_str(), name], FileRow::read)
        .optional()?
        .map(FileRow::decode)
        .transpose()
}

pub fn list(
    conn: &Connection,
    collection_id: &CollectionId,
    include_deleted: bool,
) -> StoreResult<Vec<LogicalFile>> {
    let filter = if include_deleted { "" } else { " AND status != 'DELETED'" };
    let sql = format!("SELECT {COLUMNS} FROM files WHERE collection_id = ?1{filter} ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![collection_id.as_str()], FileRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(FileRow::decode).collect()
}
