//! Checks that stored bytes still match recorded hashes.

use std::collections::HashMap;

use tracing::debug;

use crate::gateway::ContentGateway;
use crate::model::{ModelError, ModelResult, Version, VersionId};

/// Verifies versions against the content gateway.
pub struct IntegrityService<'a> {
    gateway: &'a dyn ContentGateway,
    remote: Option<String>,
}

impl<'a> IntegrityService<'a> {
    pub fn new(gateway: &'a dyn ContentGateway) -> Self {
        Self { gateway, remote: None }
    }

    /// Verify against a named remote instead of the gateway default.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Whether the version's bytes are present and intact.
    ///
    /// A version that was never pushed (empty hash) is reported as false
    /// without asking the gateway.
    pub fn verify_version(&self, version: &Version) -> ModelResult<bool> {
        if version.hash.is_empty() {
            debug!(version = %version.id, "skipping verify of unhashed version");
            return Ok(false);
        }
        version.verify(self.gateway, self.remote.as_deref())
    }

    /// Verify each version, keyed by id.
    pub fn verify_batch(&self, versions: &[Version]) -> ModelResult<HashMap<VersionId, bool>> {
        versions
            .iter()
            .map(|v| Ok((v.id.clone(), self.verify_version(v)?)))
            .collect()
    }

    /// Fail with an integrity error unless the version verifies.
    pub fn require_version(&self, version: &Version) -> ModelResult<()> {
        if self.verify_version(version)? {
            Ok(())
        } else {
            Err(ModelError::Integrity {
                version: version.id.clone(),
                expected: version.hash.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MemoryGateway, TransferOptions};
    use crate::model::{FileId, StorageKind, VersionNumber};
    use tempfile::TempDir;

    fn pushed(gateway: &MemoryGateway, dir: &TempDir, content: &[u8]) -> Version {
        let path = dir.path().join("data.bin");
        std::fs::write(&path, content).unwrap();
        let mut v = Version::new(FileId::generate(), VersionNumber::FIRST, StorageKind::Local);
        v.save(gateway, &path, &TransferOptions::new()).unwrap();
        v
    }

    #[test]
    fn test_empty_hash_skips_gateway() {
        let gateway = MemoryGateway::new();
        let service = IntegrityService::new(&gateway);
        let draft = Version::new(FileId::generate(), VersionNumber::FIRST, StorageKind::S3);

        assert!(!service.verify_version(&draft).unwrap());
        assert_eq!(gateway.verify_count(), 0);
    }

    #[test]
    fn test_verify_and_require() {
        let dir = TempDir::new().unwrap();
        let gateway = MemoryGateway::new();
        let good = pushed(&gateway, &dir, b"intact");
        let service = IntegrityService::new(&gateway);

        assert!(service.verify_version(&good).unwrap());
        service.require_version(&good).unwrap();

        gateway.put(None, &good.hash.value, b"rotted".to_vec());
        let err = service.require_version(&good).unwrap_err();
        assert!(matches!(err, ModelError::Integrity { .. }));
    }

    #[test]
    fn test_verify_batch() {
        let dir = TempDir::new().unwrap();
        let gateway = MemoryGateway::new();
        let good = pushed(&gateway, &dir, b"one");
        let draft = Version::new(FileId::generate(), VersionNumber::FIRST, StorageKind::Azure);
        let service = IntegrityService::new(&gateway);

        assert!(service.verify_batch(&[]).unwrap().is_empty());

        let results = service.verify_batch(&[good.clone(), draft.clone()]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[&good.id], true);
        assert_eq!(results[&draft.id], false);
    }

    #[test]
    fn test_named_remote() {
        let dir = TempDir::new().unwrap();
        let gateway = MemoryGateway::new();
        let v = pushed(&gateway, &dir, b"payload");

        let backup = IntegrityService::new(&gateway).with_remote("backup");
        assert!(!backup.verify_version(&v).unwrap());
        gateway.transfer(&v.hash, "default", "backup", None).unwrap();
        assert!(backup.verify_version(&v).unwrap());
    }
}
