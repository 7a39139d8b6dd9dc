//! File-backed address registry.
//!
//! Layout, one directory per network:
//!
//! ```text
//! <root>/<network>/.chainId
//! <root>/<network>/.lock
//! <root>/<network>/<Contract>.json
//! ```
//!
//! Entries are pretty-printed JSON so the directory can be committed and reviewed.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use fs2::FileExt;

use super::{AddressRegistry, AddressRegistryEntry, check_version};
use crate::{DeployError, DeployResult};

const LOCK_FILENAME: &str = ".lock";
const CHAIN_ID_FILENAME: &str = ".chainId";

/// Address registry stored as one JSON file per contract and network.
#[derive(Debug, Clone)]
pub struct FsAddressRegistry {
    root: PathBuf,
}

/// Exclusive lock over the directory of one network, released on drop.
struct NetworkLock(File);

impl Drop for NetworkLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            tracing::warn!(err = %e, "Failed to release address registry lock");
        }
    }
}

impl FsAddressRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn network_dir(&self, network: &str) -> PathBuf {
        self.root.join(network)
    }

    fn entry_path(&self, network: &str, contract: &str) -> PathBuf {
        self.network_dir(network).join(format!("{contract}.json"))
    }

    /// Take the exclusive lock of a network, creating its directory if needed.
    ///
    /// Blocks until concurrent writers on the same network release the lock.
    fn lock(&self, network: &str) -> Result<NetworkLock, DeployError> {
        let dir = self.network_dir(network);
        fs::create_dir_all(&dir).map_err(|e| DeployError::io(&dir, e))?;

        let lock_path = dir.join(LOCK_FILENAME);
        let file = File::create(&lock_path).map_err(|e| DeployError::io(&lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| DeployError::io(&lock_path, e))?;

        Ok(NetworkLock(file))
    }

    fn read_entry(path: &Path) -> Result<Option<AddressRegistryEntry>, DeployError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| DeployError::RegistryFormat {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write through a temporary file so readers never observe a partial entry.
    fn write_atomic(path: &Path, content: &str) -> Result<(), DeployError> {
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| DeployError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| DeployError::io(path, e))
    }
}

impl AddressRegistry for FsAddressRegistry {
    fn lookup(
        &self,
        network: &str,
        contract: &str,
    ) -> Result<Option<AddressRegistryEntry>, DeployError> {
        Self::read_entry(&self.entry_path(network, contract))
    }

    fn record(
        &self,
        network: &str,
        contract: &str,
        result: DeployResult,
        bytecode_hash: &str,
        expected_version: Option<u64>,
    ) -> Result<AddressRegistryEntry, DeployError> {
        let _lock = self.lock(network)?;

        let path = self.entry_path(network, contract);
        let current = Self::read_entry(&path)?;
        check_version(network, contract, current.as_ref(), expected_version)?;

        let entry = AddressRegistryEntry::succeeding(current.as_ref(), result, bytecode_hash);
        let mut json = serde_json::to_string_pretty(&entry)
            .expect("AddressRegistryEntry serialization should never fail");
        json.push('\n');
        Self::write_atomic(&path, &json)?;

        tracing::debug!(
            path = %path.display(),
            version = entry.version,
            "Address registry entry written"
        );
        Ok(entry)
    }

    fn entries(&self, network: &str) -> Result<Vec<AddressRegistryEntry>, DeployError> {
        let dir = self.network_dir(network);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for dir_entry in fs::read_dir(&dir).map_err(|e| DeployError::io(&dir, e))? {
            let path = dir_entry.map_err(|e| DeployError::io(&dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            entries.extend(Self::read_entry(&path)?);
        }
        Ok(entries)
    }

    fn reset(&self, network: &str) -> Result<(), DeployError> {
        let dir = self.network_dir(network);
        if !dir.exists() {
            return Ok(());
        }

        fs::remove_dir_all(&dir).map_err(|e| DeployError::io(&dir, e))?;
        tracing::warn!(network, path = %dir.display(), "Deployments reset");
        Ok(())
    }

    fn bind_chain_id(&self, network: &str, chain_id: u64) -> Result<(), DeployError> {
        let _lock = self.lock(network)?;
        let path = self.network_dir(network).join(CHAIN_ID_FILENAME);

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| DeployError::io(&path, e))?;
            let stored = content.trim().parse::<u64>().map_err(|e| {
                DeployError::io(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                )
            })?;

            if stored != chain_id {
                return Err(DeployError::ChainIdMismatch {
                    network: network.to_string(),
                    stored,
                    configured: chain_id,
                });
            }
            return Ok(());
        }

        fs::write(&path, format!("{chain_id}\n")).map_err(|e| DeployError::io(&path, e))
    }
}
