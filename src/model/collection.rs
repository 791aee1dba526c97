//! Named collections of logical files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::error::{EntityKind, ModelError, ModelResult};
use crate::model::file::LogicalFile;
use crate::model::repository::Repository;
use crate::model::status::EntityStatus;
use crate::model::types::{self, CollectionId, FileId, Metadata};

/// How to pick one file out of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLookup<'a> {
    Name(&'a str),
    Id(&'a FileId),
}

impl<'a> FileLookup<'a> {
    /// Build a lookup from two optional keys, exactly one of which must be
    /// set.
    pub fn from_parts(name: Option<&'a str>, id: Option<&'a FileId>) -> ModelResult<Self> {
        match (name, id) {
            (Some(name), None) => Ok(FileLookup::Name(name)),
            (None, Some(id)) => Ok(FileLookup::Id(id)),
            (Some(_), Some(_)) => Err(ModelError::invalid_argument(
                "give either a file name or a file id, not both",
            )),
            (None, None) => Err(ModelError::invalid_argument(
                "a file name or a file id is required",
            )),
        }
    }
}

/// A named grouping of logical files (a dataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    /// Globally unique.
    pub name: String,
    pub description: String,
    pub project: String,
    pub owner: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Shared by every file in the collection.
    pub metadata: Metadata,
}

impl Collection {
    /// A new ACTIVE collection. Nothing is persisted until
    /// [`Repository::add_collection`] is called.
    pub fn new(name: impl Into<String>) -> Self {
        let now = types::now();
        Self {
            id: CollectionId::generate(),
            name: name.into(),
            description: String::new(),
            project: String::new(),
            owner: String::new(),
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    // ==================== Children ====================

    /// Create and persist a new ACTIVE file in this collection.
    ///
    /// An empty `owner` inherits the collection's owner. Fails with
    /// `DuplicateName` if a file of that name exists here in any status.
    pub fn add_child(
        &self,
        repo: &dyn Repository,
        name: &str,
        description: &str,
        owner: &str,
    ) -> ModelResult<LogicalFile> {
        if repo.get_file_by_name(&self.id, name)?.is_some() {
            return Err(ModelError::duplicate(EntityKind::File, name));
        }

        let owner = if owner.is_empty() { self.owner.as_str() } else { owner };
        let file = LogicalFile::new(self.id.clone(), name)
            .with_description(description)
            .with_owner(owner);
        repo.add_file(&file)?;

        debug!(collection = %self.name, file = %file.name, id = %file.id, "added file");
        Ok(file)
    }

    /// Fetch one file of this collection by name or id, whatever its status.
    pub fn get_child(&self, repo: &dyn Repository, lookup: FileLookup<'_>) -> ModelResult<LogicalFile> {
        let found = match lookup {
            FileLookup::Name(name) => repo.get_file_by_name(&self.id, name)?,
            FileLookup::Id(id) => repo
                .get_file(id)?
                .filter(|file| file.collection_id == self.id),
        };
        found.ok_or_else(|| {
            let identifier = match lookup {
                FileLookup::Name(name) => name.to_string(),
                FileLookup::Id(id) => id.to_string(),
            };
            ModelError::not_found(EntityKind::File, identifier)
        })
    }

    /// Files of this collection ordered by name.
    pub fn list_children(
        &self,
        repo: &dyn Repository,
        include_deleted: bool,
    ) -> ModelResult<Vec<LogicalFile>> {
        repo.list_files(&self.id, include_deleted)
    }

    /// Soft-delete one file. Its versions are left untouched.
    pub fn delete_child(&self, repo: &dyn Repository, name: &str) -> ModelResult<LogicalFile> {
        let mut file = self.get_child(repo, FileLookup::Name(name))?;
        file.mark_deleted();
        repo.update_file(&file)?;
        Ok(file)
    }

    /// Soft-delete every file that is still ACTIVE.
    pub fn delete_all_children(&self, repo: &dyn Repository) -> ModelResult<usize> {
        let mut count = 0;
        for mut file in repo.list_files(&self.id, false)? {
            file.mark_deleted();
            repo.update_file(&file)?;
            count += 1;
        }
        Ok(count)
    }

    /// True when every file of this collection is DELETED, or there are none.
    pub fn can_delete(&self, repo: &dyn Repository) -> ModelResult<bool> {
        Ok(repo
            .list_files(&self.id, true)?
            .iter()
            .all(LogicalFile::is_deleted))
    }

    /// Soft-delete this collection, refusing while any file is still live.
    pub fn delete(&mut self, repo: &dyn Repository) -> ModelResult<()> {
        if !self.can_delete(repo)? {
            return Err(ModelError::DeleteConstraint {
                entity: EntityKind::Collection,
                name: self.name.clone(),
            });
        }
        if !self.is_deleted() {
            self.status = EntityStatus::Deleted;
            self.updated_at = types::now();
        }
        repo.update_collection(self)
    }
}
