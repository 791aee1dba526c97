//! Addressing stored versions from pipeline definitions.
//!
//! A pipeline names its inputs by [`VersionUri`]; [`resolve`] maps the
//! address to a version and [`dependency_status`] compares it with the hash
//! the pipeline recorded on its last run.

mod resolve;
mod uri;

pub use resolve::{dependency_status, resolve, DependencyInfo, DependencyStatus, Resolution};
pub use uri::{UriError, VersionUri, URI_SCHEME};
