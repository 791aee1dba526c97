//! Immutable, content-addressed snapshots of a logical file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::{ContentGateway, TransferOptions};
use crate::model::error::{ModelError, ModelResult};
use crate::model::status::{StorageKind, VersionStatus};
use crate::model::types::{self, ContentHash, FileId, Metadata, StorageAddress, VersionId, VersionNumber};

/// A snapshot of a [`LogicalFile`](crate::model::LogicalFile).
///
/// Versions stored in different backends differ only in `kind`; saving,
/// loading and verifying go through the same gateway calls for all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub file_id: FileId,
    pub version_number: VersionNumber,
    pub hash: ContentHash,
    pub address: StorageAddress,
    pub kind: StorageKind,
    pub status: VersionStatus,
    /// Lineage pointer to the version this one was derived from.
    pub source_version_id: Option<VersionId>,
    /// How this version was produced.
    pub transformer: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Version {
    /// A fresh DRAFT version with an empty hash.
    pub fn new(file_id: FileId, version_number: VersionNumber, kind: StorageKind) -> Self {
        let now = types::now();
        Self {
            id: VersionId::generate(),
            file_id,
            version_number,
            hash: ContentHash::empty(),
            address: StorageAddress::default(),
            kind,
            status: VersionStatus::Draft,
            source_version_id: None,
            transformer: String::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.status == VersionStatus::Committed
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    /// Move to `target`, refusing backward transitions.
    pub fn transition_to(&mut self, target: VersionStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(ModelError::InvalidStatusTransition {
                current: self.status,
                target,
            });
        }
        if self.status != target {
            self.status = target;
            self.updated_at = types::now();
        }
        Ok(())
    }

    /// Push the data at `source` and commit with the hash the gateway
    /// returns.
    pub fn save(
        &mut self,
        gateway: &dyn ContentGateway,
        source: &Path,
        options: &TransferOptions,
    ) -> ModelResult<()> {
        // Check before pushing so a rejected save leaves no remote bytes behind.
        if !self.status.can_transition_to(VersionStatus::Committed) {
            return Err(ModelError::InvalidStatusTransition {
                current: self.status,
                target: VersionStatus::Committed,
            });
        }
        let hash = gateway.push(source, &self.address, options)?;
        self.hash = hash;
        self.transition_to(VersionStatus::Committed)
    }

    /// Commit with a hash computed elsewhere; the gateway is not contacted.
    pub fn commit_with_hash(&mut self, hash: ContentHash) -> ModelResult<()> {
        if hash.is_empty() {
            return Err(ModelError::invalid_argument("precomputed hash must not be empty"));
        }
        self.transition_to(VersionStatus::Committed)?;
        self.hash = hash;
        Ok(())
    }

    /// Pull this version's data to `dest`, returning the resolved path.
    pub fn load(
        &self,
        gateway: &dyn ContentGateway,
        dest: &Path,
        options: &TransferOptions,
    ) -> ModelResult<PathBuf> {
        Ok(gateway.pull(&self.hash, dest, options)?)
    }

    /// Ask the gateway whether the stored bytes still match the hash.
    pub fn verify(&self, gateway: &dyn ContentGateway, remote: Option<&str>) -> ModelResult<bool> {
        Ok(gateway.verify(&self.hash, remote)?)
    }

    /// Soft-delete this version.
    pub fn mark_deleted(&mut self) -> ModelResult<()> {
        self.transition_to(VersionStatus::Deleted)
    }
}
