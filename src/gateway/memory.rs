//! In-process content store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::{sha256, ContentGateway, GatewayError, GatewayResult, TransferOptions, DEFAULT_REMOTE, SHA256};
use crate::model::{ContentHash, StorageAddress};

/// A [`ContentGateway`] that keeps bytes in memory, one map per remote.
///
/// Every call is counted so tests can assert whether the gateway was
/// contacted at all.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    remotes: HashMap<String, HashMap<String, Vec<u8>>>,
    pushes: usize,
    pulls: usize,
    verifies: usize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash bytes the way `push` does.
    pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
        sha256(bytes)
    }

    /// Store raw bytes under an explicit hash, bypassing hashing.
    ///
    /// Lets tests plant corrupted content.
    pub fn put(&self, remote: Option<&str>, hash: &str, bytes: impl Into<Vec<u8>>) {
        let mut state = self.state.lock();
        state
            .remotes
            .entry(remote.unwrap_or(DEFAULT_REMOTE).to_string())
            .or_default()
            .insert(hash.to_string(), bytes.into());
    }

    /// Whether `remote` holds anything under `hash`.
    pub fn contains(&self, remote: Option<&str>, hash: &str) -> bool {
        let state = self.state.lock();
        state
            .remotes
            .get(remote.unwrap_or(DEFAULT_REMOTE))
            .is_some_and(|objects| objects.contains_key(hash))
    }

    pub fn push_count(&self) -> usize {
        self.state.lock().pushes
    }

    pub fn pull_count(&self) -> usize {
        self.state.lock().pulls
    }

    pub fn verify_count(&self) -> usize {
        self.state.lock().verifies
    }
}

impl ContentGateway for MemoryGateway {
    fn push(
        &self,
        source: &Path,
        address: &StorageAddress,
        options: &TransferOptions,
    ) -> GatewayResult<ContentHash> {
        if source.is_dir() {
            return Err(GatewayError::storage(format!(
                "cannot push directory {}",
                source.display()
            )));
        }
        let bytes = fs::read(source)?;
        let hash = Self::hash_bytes(&bytes);

        let mut state = self.state.lock();
        state.pushes += 1;
        let remote = options.remote.as_deref().unwrap_or(DEFAULT_REMOTE);
        debug!(remote, address = %address, hash = %hash.value, "push");
        state
            .remotes
            .entry(remote.to_string())
            .or_default()
            .insert(hash.value.clone(), bytes);
        Ok(hash)
    }

    fn pull(
        &self,
        hash: &ContentHash,
        dest: &Path,
        options: &TransferOptions,
    ) -> GatewayResult<PathBuf> {
        let bytes = {
            let mut state = self.state.lock();
            state.pulls += 1;
            let remote = options.remote.as_deref().unwrap_or(DEFAULT_REMOTE);
            state
                .remotes
                .get(remote)
                .and_then(|objects| objects.get(&hash.value))
                .cloned()
                .ok_or_else(|| GatewayError::DataNotFound {
                    hash: hash.value.clone(),
                    algorithm: hash.algorithm.clone(),
                })?
        };

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, bytes)?;
        Ok(fs::canonicalize(dest)?)
    }

    fn verify(&self, hash: &ContentHash, remote: Option<&str>) -> GatewayResult<bool> {
        let mut state = self.state.lock();
        state.verifies += 1;
        if hash.algorithm != SHA256 {
            return Ok(false);
        }
        let stored = state
            .remotes
            .get(remote.unwrap_or(DEFAULT_REMOTE))
            .and_then(|objects| objects.get(&hash.value));
        Ok(stored.is_some_and(|bytes| Self::hash_bytes(bytes).value == hash.value))
    }

    fn transfer(
        &self,
        hash: &ContentHash,
        from_remote: &str,
        to_remote: &str,
        _jobs: Option<usize>,
    ) -> GatewayResult<bool> {
        let mut state = self.state.lock();
        let bytes = match state
            .remotes
            .get(from_remote)
            .and_then(|objects| objects.get(&hash.value))
        {
            Some(bytes) => bytes.clone(),
            None => return Ok(false),
        };
        state
            .remotes
            .entry(to_remote.to_string())
            .or_default()
            .insert(hash.value.clone(), bytes);
        Ok(true)
    }
}
