//! Value objects shared by the entity model and the persistence engine.
//!
//! Identifiers are opaque strings (lowercase ULIDs when generated here) so
//! that rows written by other tools can still be read back. Each entity gets
//! its own identifier type, which keeps a file id from being passed where a
//! version id is expected.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Open key-value metadata attached to collections and versions.
pub type Metadata = BTreeMap<String, Value>;

/// Default hash algorithm recorded when none is supplied.
pub const DEFAULT_HASH_ALGORITHM: &str = "md5";

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, time-ordered identifier.
            pub fn generate() -> Self {
                Self(ulid::Ulid::new().to_string().to_lowercase())
            }

            /// get the string representation
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// convert to owned String
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Collection`](crate::model::Collection).
    CollectionId
);
entity_id!(
    /// Identifier of a [`LogicalFile`](crate::model::LogicalFile).
    FileId
);
entity_id!(
    /// Identifier of a [`Version`](crate::model::Version).
    VersionId
);

/// Error for value objects built from out-of-range input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidValueError {
    #[error("version number must be >= 1, got {0}")]
    VersionNumber(i64),
}

/// Content-addressed hash of a version's bytes.
///
/// An empty `value` means the bytes were never pushed; such a hash can never
/// verify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash {
    pub value: String,
    pub algorithm: String,
}

impl ContentHash {
    pub fn new(value: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            algorithm: algorithm.into(),
        }
    }

    /// A hash computed with the default algorithm.
    pub fn md5(value: impl Into<String>) -> Self {
        Self::new(value, DEFAULT_HASH_ALGORITHM)
    }

    /// An empty hash (nothing pushed yet).
    pub fn empty() -> Self {
        Self::md5("")
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// First eight characters, or `none` when empty.
    pub fn short(&self) -> &str {
        if self.value.is_empty() {
            "none"
        } else {
            let end = self.value.char_indices().nth(8).map_or(self.value.len(), |(i, _)| i);
            &self.value[..end]
        }
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Physical address of a version's bytes, e.g. `s3://bucket/path` or a
/// local path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageAddress(String);

impl StorageAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// URI scheme (`s3`, `gs`, `file`, ...), or an empty string for plain
    /// local paths.
    pub fn scheme(&self) -> &str {
        match self.0.split_once("://") {
            Some((scheme, _))
                if !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
            {
                scheme
            }
            _ => "",
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential, 1-based version ordinal within a logical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// The first version of every file.
    pub const FIRST: VersionNumber = VersionNumber(1);

    pub fn new(value: i64) -> Result<Self, InvalidValueError> {
        if value < 1 || value > i64::from(u32::MAX) {
            return Err(InvalidValueError::VersionNumber(value));
        }
        Ok(Self(value as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The number that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl TryFrom<i64> for VersionNumber {
    type Error = InvalidValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionNumber> for i64 {
    fn from(number: VersionNumber) -> Self {
        i64::from(number.0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current time truncated to the precision timestamps are stored with, so an
/// entity compares equal to itself after a round trip through the store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
