//! `versiondb://collection/file@vN` addresses.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::VersionNumber;

/// Scheme that marks a pipeline dependency as a stored version.
pub const URI_SCHEME: &str = "versiondb";

/// Why a string is not a usable version address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("expected a versiondb:// uri, got '{0}'")]
    WrongScheme(String),

    #[error("uri '{0}' names no collection")]
    MissingCollection(String),

    #[error("uri '{0}' names no file")]
    MissingFile(String),

    #[error("invalid version pin '@v{pin}' in '{uri}'")]
    BadVersion { uri: String, pin: String },
}

/// A parsed version address.
///
/// Without a pin the address follows the file's latest committed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionUri {
    pub collection: String,
    pub file: String,
    pub pinned: Option<VersionNumber>,
}

impl VersionUri {
    pub fn new(collection: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            file: file.into(),
            pinned: None,
        }
    }

    pub fn pinned(mut self, number: VersionNumber) -> Self {
        self.pinned = Some(number);
        self
    }

    /// Cheap scheme check, without a full parse.
    pub fn is_version_uri(s: &str) -> bool {
        s.split_once("://").is_some_and(|(scheme, _)| scheme == URI_SCHEME)
    }
}

impl FromStr for VersionUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = match s.split_once("://") {
            Some((URI_SCHEME, rest)) => rest,
            _ => return Err(UriError::WrongScheme(s.to_string())),
        };

        let (collection, path) = rest.split_once('/').unwrap_or((rest, ""));
        if collection.is_empty() {
            return Err(UriError::MissingCollection(s.to_string()));
        }
        let path = path.trim_start_matches('/');

        // The last "@v" wins so file names may contain the marker themselves.
        let (file, pinned) = match path.rsplit_once("@v") {
            Some((file, pin)) => {
                let number = pin
                    .parse::<i64>()
                    .ok()
                    .and_then(|n| VersionNumber::new(n).ok())
                    .ok_or_else(|| UriError::BadVersion {
                        uri: s.to_string(),
                        pin: pin.to_string(),
                    })?;
                (file, Some(number))
            }
            None => (path, None),
        };
        if file.is_empty() {
            return Err(UriError::MissingFile(s.to_string()));
        }

        Ok(Self {
            collection: collection.to_string(),
            file: file.to_string(),
            pinned,
        })
    }
}

impl fmt::Display for VersionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{URI_SCHEME}://{}/{}", self.collection, self.file)?;
        if let Some(number) = self.pinned {
            write!(f, "@v{number}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pinned() {
        let uri: VersionUri = "versiondb://cifar/train.csv@v3".parse().unwrap();
        assert_eq!(uri.collection, "cifar");
        assert_eq!(uri.file, "train.csv");
        assert_eq!(uri.pinned, Some(VersionNumber::new(3).unwrap()));
        assert_eq!(uri.to_string(), "versiondb://cifar/train.csv@v3");
    }

    #[test]
    fn test_parse_unpinned_and_nested() {
        let uri: VersionUri = "versiondb://cifar/raw/images.tar".parse().unwrap();
        assert_eq!(uri.file, "raw/images.tar");
        assert_eq!(uri.pinned, None);

        let uri: VersionUri = "versiondb://cifar/a@vb.csv@v2".parse().unwrap();
        assert_eq!(uri.file, "a@vb.csv");
        assert_eq!(uri.pinned.map(VersionNumber::get), Some(2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "s3://bucket/key".parse::<VersionUri>(),
            Err(UriError::WrongScheme(_))
        ));
        assert!(matches!(
            "versiondb:///file".parse::<VersionUri>(),
            Err(UriError::MissingCollection(_))
        ));
        assert!(matches!(
            "versiondb://cifar".parse::<VersionUri>(),
            Err(UriError::MissingFile(_))
        ));
        assert!(matches!(
            "versiondb://cifar/f@vx".parse::<VersionUri>(),
            Err(UriError::BadVersion { .. })
        ));
        assert!(matches!(
            "versiondb://cifar/f@v0".parse::<VersionUri>(),
            Err(UriError::BadVersion { .. })
        ));
    }

    #[test]
    fn test_scheme_check() {
        assert!(VersionUri::is_version_uri("versiondb://a/b"));
        assert!(!VersionUri::is_version_uri("data/train.csv"));
        assert!(!VersionUri::is_version_uri("s3://a/b"));
    }
}
