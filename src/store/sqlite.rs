//! SQLite implementation of the [`Repository`] contract.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::{collections, files, schema, versions};
use crate::model::{
    Collection, CollectionId, EntityKind, FileId, LogicalFile, ModelError, ModelResult, Repository,
    Version, VersionId, VersionNumber,
};

/// SQLite journal mode applied on open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection settings for [`SqliteRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file; `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Create the file (and its parent directory) if missing.
    pub create_if_missing: bool,
    pub journal_mode: JournalMode,
    pub foreign_keys: bool,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            journal_mode: JournalMode::Wal,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn memory() -> Self {
        Self::default()
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    pub fn foreign_keys(mut self, value: bool) -> Self {
        self.foreign_keys = value;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Repository backed by one SQLite connection.
///
/// The connection is opened on first use and shared behind a mutex, so a
/// single handle serializes its own writes. [`Repository::close`] drops the
/// connection; the next call opens a fresh one. For an in-memory store that
/// fresh connection starts empty.
pub struct SqliteRepository {
    config: StoreConfig,
    conn: Mutex<Option<Connection>>,
}

impl fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRepository")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SqliteRepository {
    /// Create a repository; nothing is opened until the first operation.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Repository over a database file with default settings.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::file(path))
    }

    /// Private in-memory repository (for testing).
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Open the connection now rather than on first use, surfacing any
    /// configuration problem early.
    pub fn connect(&self) -> StoreResult<()> {
        self.with_conn(|_| Ok(()))
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> StoreResult<Option<String>> {
        self.with_conn(schema::stored_version)
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let conn = match &self.config.path {
            None => Connection::open_in_memory()?,
            Some(path) => {
                let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX;
                if self.config.create_if_missing {
                    flags |= OpenFlags::SQLITE_OPEN_CREATE;
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent).map_err(|source| StoreError::Path {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                    }
                }
                Connection::open_with_flags(path, flags)?
            }
        };

        conn.execute_batch(&format!("PRAGMA journal_mode={};", self.config.journal_mode))?;
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        schema::migrate(&conn)?;

        debug!(path = ?self.config.path, journal = %self.config.journal_mode, "opened connection");
        Ok(conn)
    }

    /// Run `f` against the shared connection, opening it if needed.
    pub(crate) fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let mut guard = self.conn.lock();
        let conn = match guard.take() {
            Some(conn) => conn,
            None => self.open_connection()?,
        };
        f(guard.insert(conn))
    }
}

/// Map a unique-key failure to the domain error for the key it names.
fn classify(err: StoreError, entity: EntityKind, name: &str, version: Option<&Version>) -> ModelError {
    if let Some(version) = version {
        if err.violates("versions.file_id") || err.violates("versions.version_number") {
            return ModelError::VersionConflict {
                file: version.file_id.to_string(),
                number: version.version_number.get(),
            };
        }
    }
    if err.violates("collections.name") || err.violates("files.name") {
        return ModelError::duplicate(entity, name);
    }
    ModelError::Store(err)
}

fn require_updated(rows: usize, entity: EntityKind, id: &str) -> ModelResult<()> {
    if rows == 0 {
        return Err(ModelError::not_found(entity, id));
    }
    Ok(())
}

impl Repository for SqliteRepository {
    // ==================== Collections ====================

    fn add_collection(&self, collection: &Collection) -> ModelResult<()> {
        if let Some(existing) = self.get_collection_by_name(&collection.name)? {
            if existing.id != collection.id {
                return Err(ModelError::duplicate(EntityKind::Collection, &collection.name));
            }
        }
        self.with_conn(|conn| collections::upsert(conn, collection))
            .map_err(|err| classify(err, EntityKind::Collection, &collection.name, None))?;
        debug!(name = %collection.name, id = %collection.id, "added collection");
        Ok(())
    }

    fn get_collection(&self, id: &CollectionId) -> ModelResult<Option<Collection>> {
        Ok(self.with_conn(|conn| collections::get(conn, id))?)
    }

    fn get_collection_by_name(&self, name: &str) -> ModelResult<Option<Collection>> {
        Ok(self.with_conn(|conn| collections::get_by_name(conn, name))?)
    }

    fn list_collections(&self, include_deleted: bool) -> ModelResult<Vec<Collection>> {
        Ok(self.with_conn(|conn| collections::list(conn, include_deleted))?)
    }

    fn update_collection(&self, collection: &Collection) -> ModelResult<()> {
        let rows = self
            .with_conn(|conn| collections::update(conn, collection))
            .map_err(|err| classify(err, EntityKind::Collection, &collection.name, None))?;
        require_updated(rows, EntityKind::Collection, collection.id.as_str())
    }

    // ==================== Files ====================

    fn add_file(&self, file: &LogicalFile) -> ModelResult<()> {
        if let Some(existing) = self.get_file_by_name(&file.collection_id, &file.name)? {
            if existing.id != file.id {
                return Err(ModelError::duplicate(EntityKind::File, &file.name));
            }
        }
        self.with_conn(|conn| files::upsert(conn, file))
            .map_err(|err| classify(err, EntityKind::File, &file.name, None))?;
        debug!(name = %file.name, id = %file.id, collection = %file.collection_id, "added file");
        Ok(())
    }

    fn get_file(&self, id: &FileId) -> ModelResult<Option<LogicalFile>> {
        Ok(self.with_conn(|conn| files::get(conn, id))?)
    }

    fn get_file_by_name(
        &self,
        collection_id: &CollectionId,
        name: &str,
    ) -> ModelResult<Option<LogicalFile>> {
        Ok(self.with_conn(|conn| files::get_by_name(conn, collection_id, name))?)
    }

    fn list_files(
        &self,
        collection_id: &CollectionId,
        include_deleted: bool,
    ) -> ModelResult<Vec<LogicalFile>> {
        Ok(self.with_conn(|conn| files::list(conn, collection_id, include_deleted))?)
    }

    fn update_file(&self, file: &LogicalFile) -> ModelResult<()> {
        let rows = self
            .with_conn(|conn| files::update(conn, file))
            .map_err(|err| classify(err, EntityKind::File, &file.name, None))?;
        require_updated(rows, EntityKind::File, file.id.as_str())
    }

    // ==================== Versions ====================

    fn add_version(&self, version: &Version) -> ModelResult<()> {
        if let Some(existing) = self.get_version_by_number(&version.file_id, version.version_number)? {
            if existing.id != version.id {
                return Err(ModelError::VersionConflict {
                    file: version.file_id.to_string(),
                    number: version.version_number.get(),
                });
            }
        }
        self.with_conn(|conn| versions::upsert(conn, version))
            .map_err(|err| classify(err, EntityKind::Version, version.id.as_str(), Some(version)))?;
        debug!(
            file = %version.file_id,
            number = %version.version_number,
            status = %version.status,
            "added version"
        );
        Ok(())
    }

    fn get_version(&self, id: &VersionId) -> ModelResult<Option<Version>> {
        Ok(self.with_conn(|conn| versions::get(conn, id))?)
    }

    fn get_version_by_number(
        &self,
        file_id: &FileId,
        number: VersionNumber,
    ) -> ModelResult<Option<Version>> {
        Ok(self.with_conn(|conn| versions::get_by_number(conn, file_id, number))?)
    }

    fn latest_version(&self, file_id: &FileId) -> ModelResult<Option<Version>> {
        Ok(self.with_conn(|conn| versions::latest(conn, file_id))?)
    }

    fn list_versions(&self, file_id: &FileId, include_deleted: bool) -> ModelResult<Vec<Version>> {
        Ok(self.with_conn(|conn| versions::list(conn, file_id, include_deleted))?)
    }

    fn update_version(&self, version: &Version) -> ModelResult<()> {
        let rows = self.with_conn(|conn| versions::update(conn, version))?;
        require_updated(rows, EntityKind::Version, version.id.as_str())
    }

    fn next_version_number(&self, file_id: &FileId) -> ModelResult<VersionNumber> {
        Ok(self.with_conn(|conn| versions::next_number(conn, file_id))?)
    }

    // ==================== Lineage ====================

    fn query_lineage(&self, version_id: &VersionId, max_depth: usize) -> ModelResult<Vec<Version>> {
        Ok(self.with_conn(|conn| versions::lineage(conn, version_id, max_depth))?)
    }

    // ==================== Lifecycle ====================

    fn close(&self) -> ModelResult<()> {
        let mut guard = self.conn.lock();
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| StoreError::Sqlite(err))?;
            debug!(path = ?self.config.path, "closed connection");
        }
        Ok(())
    }
}
