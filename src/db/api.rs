//! Database API - high-level handle over the store, gateway and services.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::gateway::{ContentGateway, LocalGateway, MemoryGateway};
use crate::model::{
    Collection, EntityKind, FileLookup, LogicalFile, ModelError, Repository, DEFAULT_LINEAGE_DEPTH,
};
use crate::pipeline::{self, Resolution, UriError, VersionUri};
use crate::services::{IntegrityService, LineageService};
use crate::store::{JournalMode, SqliteRepository, StoreConfig, StoreError};

/// Default location of the metadata database, relative to the working
/// directory.
pub const DEFAULT_DATABASE_PATH: &str = ".versiondb/metadata.db";

/// Directory, next to the database file, that holds pushed content.
pub const OBJECTS_DIR: &str = "objects";

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid uri: {0}")]
    Uri(#[from] UriError),

    #[error("database not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DatabaseError {
    /// check if this error means something the caller asked for is missing
    pub fn is_not_found(&self) -> bool {
        match self {
            DatabaseError::Model(e) => e.is_not_found(),
            DatabaseError::NotFound(_) => true,
            _ => false,
        }
    }
}

/// Database configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path to the database file; `None` keeps it in memory.
    pub path: Option<PathBuf>,
    /// Create the file and its directory if they don't exist.
    pub create_if_missing: bool,
    pub journal_mode: JournalMode,
    /// Enforce foreign keys between tables.
    pub foreign_keys: bool,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
    /// Lineage depth used when a query does not give one.
    pub lineage_depth: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from(DEFAULT_DATABASE_PATH)),
            create_if_missing: true,
            journal_mode: JournalMode::Wal,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
            lineage_depth: DEFAULT_LINEAGE_DEPTH,
        }
    }
}

impl DatabaseConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ..Default::default()
        }
    }

    /// Set create_if_missing flag.
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

    pub fn lineage_depth(mut self, depth: usize) -> Self {
        self.lineage_depth = depth;
        self
    }

    fn validate(&self) -> DatabaseResult<()> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(DatabaseError::InvalidConfig("empty database path".into()));
            }
            if path.is_dir() {
                return Err(DatabaseError::InvalidConfig(format!(
                    "{} is a directory, expected a database file",
                    path.display()
                )));
            }
            if !self.create_if_missing && !path.exists() {
                return Err(DatabaseError::NotFound(path.clone()));
            }
        }
        Ok(())
    }

    /// Where pushed content goes for a file database: `objects/` beside the
    /// database file. `None` for an in-memory database.
    pub fn objects_dir(&self) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        Some(parent.join(OBJECTS_DIR))
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.path.clone(),
            create_if_missing: self.create_if_missing,
            journal_mode: self.journal_mode,
            foreign_keys: self.foreign_keys,
            busy_timeout: self.busy_timeout,
        }
    }
}

/// The main database handle.
///
/// Owns the repository and the content gateway and hands out the services
/// that work over them.
pub struct Database {
    config: DatabaseConfig,
    repo: SqliteRepository,
    gateway: Box<dyn ContentGateway + Send + Sync>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        Self::open_with_config(DatabaseConfig::new(path.as_ref()))
    }

    /// Open or create a database with custom configuration.
    ///
    /// A file database stores pushed bytes in a [`LocalGateway`] under
    /// [`DatabaseConfig::objects_dir`]; an in-memory one uses a
    /// [`MemoryGateway`]. [`Database::with_gateway`] replaces either.
    pub fn open_with_config(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        let repo = SqliteRepository::new(config.store_config());
        repo.connect()?;
        let gateway: Box<dyn ContentGateway + Send + Sync> = match config.objects_dir() {
            Some(dir) => Box::new(LocalGateway::new(dir)),
            None => Box::new(MemoryGateway::new()),
        };
        Ok(Self {
            config,
            repo,
            gateway,
        })
    }

    /// Create a new in-memory database (for testing).
    pub fn in_memory() -> DatabaseResult<Self> {
        Self::open_with_config(DatabaseConfig::in_memory())
    }

    /// Replace the content gateway.
    pub fn with_gateway(mut self, gateway: impl ContentGateway + Send + Sync + 'static) -> Self {
        self.gateway = Box::new(gateway);
        self
    }

    pub fn repository(&self) -> &SqliteRepository {
        &self.repo
    }

    pub fn gateway(&self) -> &dyn ContentGateway {
        self.gateway.as_ref()
    }

    pub fn lineage(&self) -> LineageService<'_> {
        LineageService::new(&self.repo).with_default_depth(self.config.lineage_depth)
    }

    pub fn integrity(&self) -> IntegrityService<'_> {
        IntegrityService::new(self.gateway.as_ref())
    }

    // ==================== Collections ====================

    /// Persist a new collection.
    pub fn create_collection(&self, collection: Collection) -> DatabaseResult<Collection> {
        self.repo.add_collection(&collection)?;
        Ok(collection)
    }

    /// Look up a collection by name, whatever its status.
    pub fn collection(&self, name: &str) -> DatabaseResult<Collection> {
        self.repo
            .get_collection_by_name(name)?
            .ok_or_else(|| ModelError::not_found(EntityKind::Collection, name).into())
    }

    pub fn collections(&self, include_deleted: bool) -> DatabaseResult<Vec<Collection>> {
        Ok(self.repo.list_collections(include_deleted)?)
    }

    /// Look up a file by collection and file name.
    pub fn file(&self, collection: &str, name: &str) -> DatabaseResult<LogicalFile> {
        let collection = self.collection(collection)?;
        Ok(collection.get_child(&self.repo, FileLookup::Name(name))?)
    }

    // ==================== Pipeline ====================

    /// Parse and resolve a version address.
    pub fn resolve(&self, uri: &str) -> DatabaseResult<Resolution> {
        let uri: VersionUri = uri.parse()?;
        Ok(pipeline::resolve(&self.repo, &uri)?)
    }

    /// Get database statistics.
    pub fn stats(&self) -> DatabaseResult<DatabaseStats> {
        let mut stats = DatabaseStats::default();
        for collection in self.repo.list_collections(true)? {
            stats.collections += 1;
            for file in self.repo.list_files(&collection.id, true)? {
                stats.files += 1;
                for version in self.repo.list_versions(&file.id, true)? {
                    stats.versions += 1;
                    if version.is_committed() {
                        stats.committed_versions += 1;
                    }
                }
            }
        }
        Ok(stats)
    }

    /// Get the database path.
    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    /// Get the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Release the connection. Later calls reopen it.
    pub fn close(&self) -> DatabaseResult<()> {
        Ok(self.repo.close()?)
    }
}

/// Database statistics, deleted entities included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub collections: usize,
    pub files: usize,
    pub versions: usize,
    pub committed_versions: usize,
}
