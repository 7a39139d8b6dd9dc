//! Compiled contract artifacts and their content signature.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A compiled contract, in the hardhat artifact format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    /// Creation bytecode.
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn new(contract_name: impl Into<String>, bytecode: impl Into<Bytes>) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi: serde_json::Value::Array(Vec::new()),
            bytecode: bytecode.into(),
        }
    }

    /// Compute the SHA-256 hash of the creation bytecode, hex-encoded.
    ///
    /// The hash is the freshness marker stored in the address registry: a deployment is
    /// up to date as long as the bytecode hash did not change.
    pub fn bytecode_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytecode);
        hex::encode(hasher.finalize())
    }
}

/// Supplies the compiled artifact of a contract by name.
pub trait ArtifactSource: Send + Sync {
    fn artifact(&self, contract: &str) -> anyhow::Result<Artifact>;
}

/// Reads artifacts from a build output directory.
///
/// Both flat (`<dir>/<Contract>.json`) and hardhat (`<dir>/contracts/<Contract>.sol/<Contract>.json`)
/// layouts are supported, in that order.
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    dir: PathBuf,
}

impl FsArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, contract: &str) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{contract}.json")),
            self.dir
                .join("contracts")
                .join(format!("{contract}.sol"))
                .join(format!("{contract}.json")),
        ]
    }

    fn load(path: &Path) -> anyhow::Result<Artifact> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }
}

impl ArtifactSource for FsArtifacts {
    fn artifact(&self, contract: &str) -> anyhow::Result<Artifact> {
        let path = self
            .candidates(contract)
            .into_iter()
            .find(|path| path.exists())
            .with_context(|| {
                format!(
                    "No artifact for {} found in {}",
                    contract,
                    self.dir.display()
                )
            })?;

        let artifact = Self::load(&path)?;
        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        tracing::trace!(contract, path = %path.display(), "Loaded artifact");
        Ok(artifact)
    }
}

/// Artifacts held in memory, keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    artifacts: HashMap<String, Artifact>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the artifact of a contract.
    pub fn with(mut self, artifact: Artifact) -> Self {
        self.insert(artifact);
        self
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }
}

impl ArtifactSource for InMemoryArtifacts {
    fn artifact(&self, contract: &str) -> anyhow::Result<Artifact> {
        self.artifacts
            .get(contract)
            .cloned()
            .with_context(|| format!("No artifact registered for {}", contract))
    }
}
