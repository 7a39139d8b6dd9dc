//! Persisted registry of deployed contract addresses, keyed by network.

mod fs;
mod memory;

pub use fs::FsAddressRegistry;
pub use memory::MemoryAddressRegistry;

use serde::{Deserialize, Serialize};

use crate::{DeployError, DeployResult};

/// The last known deployment of a contract on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRegistryEntry {
    /// The deployment itself.
    #[serde(flatten)]
    pub result: DeployResult,
    /// SHA-256 of the bytecode that was deployed. A different hash means the contract
    /// must be redeployed.
    pub bytecode_hash: String,
    /// Unix timestamp (seconds) of the write.
    pub deployed_at: u64,
    /// Incremented on every write, starting at 1.
    pub version: u64,
}

impl AddressRegistryEntry {
    /// Build the entry that replaces `previous`.
    pub(crate) fn succeeding(
        previous: Option<&AddressRegistryEntry>,
        result: DeployResult,
        bytecode_hash: &str,
    ) -> Self {
        Self {
            result,
            bytecode_hash: bytecode_hash.to_string(),
            deployed_at: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
            version: previous.map_or(1, |entry| entry.version + 1),
        }
    }
}

/// Storage of deployed contract addresses.
///
/// Implementations only need to guarantee that [`AddressRegistry::record`] is atomic per
/// key: the stored version is compared to the version the caller read, and the write is
/// rejected with [`DeployError::ConcurrentModification`] when they differ.
pub trait AddressRegistry: Send + Sync {
    /// Look up the entry of a contract on a network.
    fn lookup(
        &self,
        network: &str,
        contract: &str,
    ) -> Result<Option<AddressRegistryEntry>, DeployError>;

    /// Upsert the entry of a contract, always overwriting.
    ///
    /// `expected_version` is the version observed by the caller, `None` if it saw no entry.
    fn record(
        &self,
        network: &str,
        contract: &str,
        result: DeployResult,
        bytecode_hash: &str,
        expected_version: Option<u64>,
    ) -> Result<AddressRegistryEntry, DeployError>;

    /// All entries of a network, sorted by contract name.
    fn entries(&self, network: &str) -> Result<Vec<AddressRegistryEntry>, DeployError>;

    /// Delete every entry of a network.
    fn reset(&self, network: &str) -> Result<(), DeployError>;

    /// Associate a network with a chain id, failing if it was bound to another chain.
    fn bind_chain_id(&self, _network: &str, _chain_id: u64) -> Result<(), DeployError> {
        Ok(())
    }

    /// Whether the contract must be (re)deployed for the given bytecode hash.
    fn needs_redeploy(
        &self,
        network: &str,
        contract: &str,
        current_bytecode_hash: &str,
    ) -> Result<bool, DeployError> {
        Ok(self
            .lookup(network, contract)?
            .is_none_or(|entry| entry.bytecode_hash != current_bytecode_hash))
    }
}

/// Fail unless the stored version matches the version the writer observed.
pub(crate) fn check_version(
    network: &str,
    contract: &str,
    current: Option<&AddressRegistryEntry>,
    expected: Option<u64>,
) -> Result<(), DeployError> {
    let found = current.map(|entry| entry.version);
    if found != expected {
        return Err(DeployError::ConcurrentModification {
            network: network.to_string(),
            name: contract.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod conformance {
    //! Behaviour every [`AddressRegistry`] implementation must exhibit.

    use super::*;
    use crate::unit::test_utils::fake_result;

    pub fn needs_redeploy_tracks_bytecode_hash(registry: &dyn AddressRegistry) {
        assert!(registry.needs_redeploy("sepolia", "RewardToken", "h1").unwrap());

        registry
            .record("sepolia", "RewardToken", fake_result("RewardToken", 1), "h1", None)
            .unwrap();

        assert!(!registry.needs_redeploy("sepolia", "RewardToken", "h1").unwrap());
        assert!(registry.needs_redeploy("sepolia", "RewardToken", "h2").unwrap());
    }

    pub fn networks_are_isolated(registry: &dyn AddressRegistry) {
        registry
            .record("sepolia", "RewardToken", fake_result("RewardToken", 1), "h1", None)
            .unwrap();

        assert!(registry.lookup("mainnet", "RewardToken").unwrap().is_none());
        assert!(registry.needs_redeploy("mainnet", "RewardToken", "h1").unwrap());
    }

    pub fn record_overwrites_and_bumps_version(registry: &dyn AddressRegistry) {
        let first = registry
            .record("sepolia", "Staking", fake_result("Staking", 1), "h1", None)
            .unwrap();
        let second = registry
            .record("sepolia", "Staking", fake_result("Staking", 2), "h1", Some(first.version))
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let stored = registry.lookup("sepolia", "Staking").unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored.result, fake_result("Staking", 2));
    }

    pub fn stale_writer_is_rejected(registry: &dyn AddressRegistry) {
        // Both writers observe an empty registry; only the first may write.
        registry
            .record("sepolia", "Staking", fake_result("Staking", 1), "h1", None)
            .unwrap();

        let err = registry
            .record("sepolia", "Staking", fake_result("Staking", 2), "h1", None)
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::ConcurrentModification { expected: None, found: Some(1), .. }
        ));
        let stored = registry.lookup("sepolia", "Staking").unwrap().unwrap();
        assert_eq!(stored.result, fake_result("Staking", 1));
    }

    pub fn reset_only_clears_one_network(registry: &dyn AddressRegistry) {
        registry
            .record("sepolia", "RewardToken", fake_result("RewardToken", 1), "h1", None)
            .unwrap();
        registry
            .record("sepolia", "Staking", fake_result("Staking", 2), "h2", None)
            .unwrap();
        registry
            .record("mainnet", "RewardToken", fake_result("RewardToken", 3), "h1", None)
            .unwrap();

        let names: Vec<_> = registry
            .entries("sepolia")
            .unwrap()
            .into_iter()
            .map(|entry| entry.result.contract_name)
            .collect();
        assert_eq!(names, ["RewardToken", "Staking"]);

        registry.reset("sepolia").unwrap();

        assert!(registry.entries("sepolia").unwrap().is_empty());
        assert_eq!(registry.entries("mainnet").unwrap().len(), 1);
        // Resetting an unknown network is a no-op.
        registry.reset("holesky").unwrap();
    }
}
