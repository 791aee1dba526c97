//! Boundary to the content store that holds the actual bytes.
//!
//! The entity model only ever talks to a [`ContentGateway`]. Pushing,
//! pulling, and verifying bytes against a real object store is the job of
//! an implementation outside this crate. [`LocalGateway`] keeps objects in a
//! directory next to the metadata database; [`MemoryGateway`] is an
//! in-process store for tests.
//!
//! Calls are synchronous from the model's point of view. Callers that need
//! timeouts or cancellation implement them inside their gateway.

mod error;
mod local;
mod memory;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub use error::{GatewayError, GatewayResult};
pub use local::LocalGateway;
pub use memory::MemoryGateway;

use crate::model::{ContentHash, StorageAddress};

/// Remote used when a call does not name one.
pub const DEFAULT_REMOTE: &str = "default";

/// Algorithm tag of the hashes the bundled gateways produce.
pub const SHA256: &str = "sha256";

/// Content hash of `bytes` as the bundled gateways compute it.
pub fn sha256(bytes: &[u8]) -> ContentHash {
    ContentHash::new(hex::encode(Sha256::digest(bytes)), SHA256)
}

/// Optional knobs for a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Named remote to use instead of the gateway's default.
    pub remote: Option<String>,
    /// Number of parallel transfer jobs.
    pub jobs: Option<usize>,
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote hint.
    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Set the parallelism.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }
}

/// Push/pull/verify/transfer contract for content-addressed bytes.
pub trait ContentGateway {
    /// Hash and upload the data at `source`, returning its content hash.
    fn push(
        &self,
        source: &Path,
        address: &StorageAddress,
        options: &TransferOptions,
    ) -> GatewayResult<ContentHash>;

    /// Materialize the data for `hash` at `dest`, returning the absolute
    /// path that was written.
    ///
    /// Fails with [`GatewayError::DataNotFound`] when the backend has no
    /// such data.
    fn pull(
        &self,
        hash: &ContentHash,
        dest: &Path,
        options: &TransferOptions,
    ) -> GatewayResult<PathBuf>;

    /// Whether the backend holds intact data for `hash`.
    ///
    /// A mismatch is `Ok(false)`; only transport failures are errors.
    fn verify(&self, hash: &ContentHash, remote: Option<&str>) -> GatewayResult<bool>;

    /// Copy the data for `hash` between two remotes.
    fn transfer(
        &self,
        hash: &ContentHash,
        from_remote: &str,
        to_remote: &str,
        jobs: Option<usize>,
    ) -> GatewayResult<bool>;
}
