//! In-memory address registry for ephemeral networks.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, PoisonError},
};

use super::{AddressRegistry, AddressRegistryEntry, check_version};
use crate::{DeployError, DeployResult};

/// Address registry that forgets everything when dropped.
///
/// Used for throwaway development networks whose state does not outlive the node.
#[derive(Debug, Default)]
pub struct MemoryAddressRegistry {
    networks: Mutex<HashMap<String, BTreeMap<String, AddressRegistryEntry>>>,
}

impl MemoryAddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_networks<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, BTreeMap<String, AddressRegistryEntry>>) -> T,
    ) -> T {
        let mut networks = self.networks.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut networks)
    }
}

impl AddressRegistry for MemoryAddressRegistry {
    fn lookup(
        &self,
        network: &str,
        contract: &str,
    ) -> Result<Option<AddressRegistryEntry>, DeployError> {
        Ok(self.with_networks(|networks| {
            networks
                .get(network)
                .and_then(|entries| entries.get(contract))
                .cloned()
        }))
    }

    fn record(
        &self,
        network: &str,
        contract: &str,
        result: DeployResult,
        bytecode_hash: &str,
        expected_version: Option<u64>,
    ) -> Result<AddressRegistryEntry, DeployError> {
        self.with_networks(|networks| {
            let entries = networks.entry(network.to_string()).or_default();
            let current = entries.get(contract);
            check_version(network, contract, current, expected_version)?;

            let entry = AddressRegistryEntry::succeeding(current, result, bytecode_hash);
            entries.insert(contract.to_string(), entry.clone());
            Ok(entry)
        })
    }

    fn entries(&self, network: &str) -> Result<Vec<AddressRegistryEntry>, DeployError> {
        Ok(self.with_networks(|networks| {
            networks
                .get(network)
                .map(|entries| entries.values().cloned().collect())
                .unwrap_or_default()
        }))
    }

    fn reset(&self, network: &str) -> Result<(), DeployError> {
        self.with_networks(|networks| networks.remove(network));
        Ok(())
    }
}
