//! Lifecycle states and the storage-kind tag.
//!
//! All three enums are persisted as their uppercase string tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status or kind tag that is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} tag: '{tag}'")]
pub struct UnknownTagError {
    pub kind: &'static str,
    pub tag: String,
}

/// Lifecycle status of collections and logical files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityStatus {
    #[default]
    Active,
    Deleted,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Active => "ACTIVE",
            EntityStatus::Deleted => "DELETED",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, EntityStatus::Deleted)
    }
}

impl FromStr for EntityStatus {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(EntityStatus::Active),
            "DELETED" => Ok(EntityStatus::Deleted),
            other => Err(UnknownTagError {
                kind: "entity status",
                tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a version.
///
/// Transitions only move forward: `DRAFT -> COMMITTED -> DELETED`, or
/// `DRAFT -> DELETED` directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    #[default]
    Draft,
    Committed,
    Deleted,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "DRAFT",
            VersionStatus::Committed => "COMMITTED",
            VersionStatus::Deleted => "DELETED",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, VersionStatus::Deleted)
    }

    /// Whether moving from `self` to `target` is a legal transition.
    ///
    /// Re-deleting a deleted version is accepted as a no-op.
    pub fn can_transition_to(&self, target: VersionStatus) -> bool {
        matches!(
            (self, target),
            (VersionStatus::Draft, VersionStatus::Committed)
                | (VersionStatus::Draft, VersionStatus::Deleted)
                | (VersionStatus::Committed, VersionStatus::Deleted)
                | (VersionStatus::Deleted, VersionStatus::Deleted)
        )
    }
}

impl FromStr for VersionStatus {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(VersionStatus::Draft),
            "COMMITTED" => Ok(VersionStatus::Committed),
            "DELETED" => Ok(VersionStatus::Deleted),
            other => Err(UnknownTagError {
                kind: "version status",
                tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical backend a version's bytes live in.
///
/// This is the only thing that differs between versions stored in
/// different places; save/load/verify behave identically for every kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageKind {
    S3,
    Gcs,
    Azure,
    #[default]
    Local,
}

impl StorageKind {
    pub const ALL: [StorageKind; 4] = [
        StorageKind::S3,
        StorageKind::Gcs,
        StorageKind::Azure,
        StorageKind::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::S3 => "S3",
            StorageKind::Gcs => "GCS",
            StorageKind::Azure => "AZURE",
            StorageKind::Local => "LOCAL",
        }
    }

    /// Parse a stored tag, falling back to [`StorageKind::Local`] for
    /// anything unrecognized so that reads never fail on the tag alone.
    pub fn from_tag_lossy(tag: &str) -> Self {
        tag.parse().unwrap_or_default()
    }
}

impl FromStr for StorageKind {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S3" => Ok(StorageKind::S3),
            "GCS" => Ok(StorageKind::Gcs),
            "AZURE" => Ok(StorageKind::Azure),
            "LOCAL" => Ok(StorageKind::Local),
            other => Err(UnknownTagError {
                kind: "storage kind",
                tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_parse_back() {
        for kind in StorageKind::ALL {
            assert_eq!(kind.as_str().parse::<StorageKind>().unwrap(), kind);
        }
        assert_eq!("DRAFT".parse::<VersionStatus>().unwrap(), VersionStatus::Draft);
        assert_eq!("DELETED".parse::<EntityStatus>().unwrap(), EntityStatus::Deleted);
        assert!("active".parse::<EntityStatus>().is_err());
    }

    #[test]
    fn test_unknown_storage_kind_falls_back_to_local() {
        assert_eq!(StorageKind::from_tag_lossy("HDFS"), StorageKind::Local);
        assert_eq!(StorageKind::from_tag_lossy(""), StorageKind::Local);
        assert_eq!(StorageKind::from_tag_lossy("GCS"), StorageKind::Gcs);
    }

    #[test]
    fn test_version_transitions() {
        use VersionStatus::*;

        assert!(Draft.can_transition_to(Committed));
        assert!(Draft.can_transition_to(Deleted));
        assert!(Committed.can_transition_to(Deleted));
        assert!(Deleted.can_transition_to(Deleted));

        assert!(!Committed.can_transition_to(Draft));
        assert!(!Deleted.can_transition_to(Committed));
        assert!(!Deleted.can_transition_to(Draft));
        assert!(!Committed.can_transition_to(Committed));
    }

    #[test]
    fn test_serde_uses_uppercase_tags() {
        assert_eq!(serde_json::to_string(&StorageKind::Gcs).unwrap(), "\"GCS\"");
        assert_eq!(serde_json::to_string(&VersionStatus::Committed).unwrap(), "\"COMMITTED\"");
    }
}
