//! Content store on the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{sha256, ContentGateway, GatewayError, GatewayResult, TransferOptions, DEFAULT_REMOTE, SHA256};
use crate::model::{ContentHash, StorageAddress};

const TMP_DIR: &str = "tmp";

/// A [`ContentGateway`] that keeps content-addressed objects under a root
/// directory, one subdirectory per remote:
///
/// ```text
/// <root>/<remote>/<hash[0..2]>/<hash>
/// ```
///
/// Objects are written to a temporary file first and renamed into place, so
/// a crashed push never leaves a partial object behind.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    root: PathBuf,
}

impl LocalGateway {
    /// Gateway rooted at `root`. Nothing is created until the first push.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn remote_dir(&self, remote: Option<&str>) -> GatewayResult<PathBuf> {
        let remote = remote.unwrap_or(DEFAULT_REMOTE);
        if remote.is_empty()
            || remote == TMP_DIR
            || remote.starts_with('.')
            || remote.contains(['/', '\\'])
        {
            return Err(GatewayError::storage(format!("invalid remote name '{remote}'")));
        }
        Ok(self.root.join(remote))
    }

    /// Where the object for `hash` lives, or `None` for a value that cannot
    /// name an object.
    fn object_path(&self, remote: Option<&str>, hash: &str) -> GatewayResult<Option<PathBuf>> {
        if hash.len() < 3 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(None);
        }
        let dir = self.remote_dir(remote)?;
        Ok(Some(dir.join(&hash[..2]).join(hash)))
    }

    fn write_object(&self, path: &Path, hash: &str, bytes: &[u8]) -> GatewayResult<()> {
        let tmp_dir = self.root.join(TMP_DIR);
        fs::create_dir_all(&tmp_dir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_dir.join(format!("{hash}.partial"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn not_found(hash: &ContentHash) -> GatewayError {
        GatewayError::DataNotFound {
            hash: hash.value.clone(),
            algorithm: hash.algorithm.clone(),
        }
    }
}

impl ContentGateway for LocalGateway {
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
        let hash = sha256(&bytes);
        let remote = options.remote.as_deref();
        let path = self
            .object_path(remote, &hash.value)?
            .ok_or_else(|| GatewayError::storage("computed hash is not a valid object name"))?;

        if path.exists() {
            debug!(address = %address, hash = %hash.value, "object already stored");
        } else {
            self.write_object(&path, &hash.value, &bytes)?;
            debug!(address = %address, hash = %hash.value, path = %path.display(), "stored object");
        }
        Ok(hash)
    }

    fn pull(
        &self,
        hash: &ContentHash,
        dest: &Path,
        options: &TransferOptions,
    ) -> GatewayResult<PathBuf> {
        let path = self
            .object_path(options.remote.as_deref(), &hash.value)?
            .filter(|p| p.is_file())
            .ok_or_else(|| Self::not_found(hash))?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&path, dest)?;
        Ok(fs::canonicalize(dest)?)
    }

    fn verify(&self, hash: &ContentHash, remote: Option<&str>) -> GatewayResult<bool> {
        if hash.algorithm != SHA256 {
            return Ok(false);
        }
        let Some(path) = self.object_path(remote, &hash.value)?.filter(|p| p.is_file()) else {
            return Ok(false);
        };
        let bytes = fs::read(path)?;
        Ok(sha256(&bytes).value == hash.value)
    }

    fn transfer(
        &self,
        hash: &ContentHash,
        from_remote: &str,
        to_remote: &str,
        _jobs: Option<usize>,
    ) -> GatewayResult<bool> {
        let Some(from) = self.object_path(Some(from_remote), &hash.value)?.filter(|p| p.is_file()) else {
            return Ok(false);
        };
        let Some(to) = self.object_path(Some(to_remote), &hash.value)? else {
            return Ok(false);
        };
        if !to.exists() {
            let bytes = fs::read(from)?;
            self.write_object(&to, &hash.value, &bytes)?;
        }
        debug!(hash = %hash.value, from_remote, to_remote, "transferred object");
        Ok(true)
    }
}
