//! Network context handed to deployment units.

use std::{collections::HashMap, sync::Arc};

use alloy_core::primitives::Address;

use crate::{AddressRegistry, DeployError, DeployResult, NamedAccounts};

/// What a deployment unit can see of the network it deploys to.
///
/// Besides the network identity and the named accounts, the context resolves contracts
/// deployed by earlier units: first from the results of the current run, then from the
/// persisted address registry.
pub struct NetworkContext {
    network: String,
    chain_id: u64,
    accounts: NamedAccounts,
    addresses: Arc<dyn AddressRegistry>,
    deployed: HashMap<String, DeployResult>,
}

impl NetworkContext {
    pub fn new(
        network: impl Into<String>,
        chain_id: u64,
        accounts: NamedAccounts,
        addresses: Arc<dyn AddressRegistry>,
    ) -> Self {
        Self {
            network: network.into(),
            chain_id,
            accounts,
            addresses,
            deployed: HashMap::new(),
        }
    }

    /// Name of the active network.
    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn named_accounts(&self) -> &NamedAccounts {
        &self.accounts
    }

    /// Address of a named account role.
    pub fn named_account(&self, role: &str) -> Result<Address, DeployError> {
        self.accounts.account(role)
    }

    /// Resolve the deployment of another contract by name.
    ///
    /// Fails with [`DeployError::UnresolvedContract`] if the contract was neither deployed
    /// (or skipped) earlier in this run nor recorded in the address registry.
    pub fn get_deployed_handle(&self, name: &str) -> Result<DeployResult, DeployError> {
        if let Some(result) = self.deployed.get(name) {
            return Ok(result.clone());
        }

        match self.addresses.lookup(&self.network, name)? {
            Some(entry) => Ok(entry.result),
            None => Err(DeployError::UnresolvedContract {
                network: self.network.clone(),
                name: name.to_string(),
            }),
        }
    }

    pub(crate) fn addresses(&self) -> &dyn AddressRegistry {
        self.addresses.as_ref()
    }

    /// Make a unit's result visible to the units that follow it.
    pub(crate) fn remember(&mut self, unit: &str, result: DeployResult) {
        self.deployed.insert(unit.to_string(), result);
    }
}
