//! Named accounts: mapping of account roles (e.g. `deployer`) to addresses.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use derive_more::Deref;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DeployError, rpc};

/// How a named account is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountSpec {
    /// Index into the accounts exposed by the node.
    Index(usize),
    /// A literal address.
    Address(Address),
}

/// Supplies the accounts available on a network, in node order.
pub trait AccountResolver: Send + Sync {
    fn accounts(&self) -> BoxFuture<'_, anyhow::Result<Vec<Address>>>;
}

/// Resolves the unlocked accounts of a node through `eth_accounts`.
#[derive(Debug, Clone)]
pub struct RpcAccountResolver {
    client: reqwest::Client,
    url: Url,
}

impl RpcAccountResolver {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

impl AccountResolver for RpcAccountResolver {
    fn accounts(&self) -> BoxFuture<'_, anyhow::Result<Vec<Address>>> {
        Box::pin(async move {
            rpc::json_rpc_call(&self.client, &self.url, "eth_accounts", vec![]).await
        })
    }
}

/// A fixed list of accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts(pub Vec<Address>);

impl AccountResolver for StaticAccounts {
    fn accounts(&self) -> BoxFuture<'_, anyhow::Result<Vec<Address>>> {
        let accounts = self.0.clone();
        Box::pin(async move { Ok(accounts) })
    }
}

/// Role to address mapping handed to deployment units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct NamedAccounts(BTreeMap<String, Address>);

impl NamedAccounts {
    /// Resolve the configured roles against the accounts available on the network.
    pub fn resolve(
        specs: &BTreeMap<String, AccountSpec>,
        available: &[Address],
    ) -> Result<Self, DeployError> {
        let mut accounts = BTreeMap::new();
        for (role, spec) in specs {
            let address = match *spec {
                AccountSpec::Address(address) => address,
                AccountSpec::Index(index) => *available.get(index).ok_or_else(|| {
                    DeployError::AccountIndexOutOfRange {
                        role: role.clone(),
                        index,
                        available: available.len(),
                    }
                })?,
            };
            accounts.insert(role.clone(), address);
        }

        tracing::debug!(accounts = ?accounts, "Resolved named accounts");
        Ok(Self(accounts))
    }

    /// Resolve the configured roles using an account resolver.
    pub async fn fetch(
        specs: &BTreeMap<String, AccountSpec>,
        resolver: &dyn AccountResolver,
    ) -> anyhow::Result<Self> {
        let available = resolver.accounts().await?;
        Ok(Self::resolve(specs, &available)?)
    }

    /// Address of a role.
    pub fn account(&self, role: &str) -> Result<Address, DeployError> {
        self.0
            .get(role)
            .copied()
            .ok_or_else(|| DeployError::UnknownAccount(role.to_string()))
    }
}

impl<S: Into<String>> FromIterator<(S, Address)> for NamedAccounts {
    fn from_iter<I: IntoIterator<Item = (S, Address)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(role, address)| (role.into(), address)).collect())
    }
}
