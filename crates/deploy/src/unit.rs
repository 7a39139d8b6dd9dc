//! Deployment units and the results they produce.

use std::{collections::BTreeSet, fmt, sync::Arc};

use alloy_core::primitives::{Address, B256};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::NetworkContext;

/// Future returned by a [`DeployAction`].
pub type ActionFuture<'a> = BoxFuture<'a, anyhow::Result<DeployResult>>;

/// The body of a deployment unit.
///
/// The action receives the network context of the run and deploys exactly one contract.
/// Deployed contracts of earlier units are reachable through
/// [`NetworkContext::get_deployed_handle`].
pub trait DeployAction: Send + Sync {
    /// Deploy the contract, returning where it landed on chain.
    fn deploy<'a>(&'a self, ctx: &'a NetworkContext) -> ActionFuture<'a>;
}

/// Outcome of one successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    /// Name of the deployed contract.
    pub contract_name: String,
    /// Address the contract was deployed at.
    pub address: Address,
    /// Hash of the creation transaction.
    pub transaction_hash: B256,
    /// Reference to the artifact (ABI and bytecode) the contract was built from.
    pub artifact: String,
    /// Block the creation transaction was included in.
    pub block_number: u64,
}

/// A named, tagged deployment action.
///
/// The unit name doubles as the contract name under which the result is stored in the
/// address registry.
#[derive(Clone)]
pub struct DeploymentUnit {
    name: String,
    tags: BTreeSet<String>,
    dependencies: Vec<String>,
    action: Arc<dyn DeployAction>,
}

impl DeploymentUnit {
    /// Create an untagged unit without dependencies.
    pub fn new(name: impl Into<String>, action: impl DeployAction + 'static) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            dependencies: Vec::new(),
            action: Arc::new(action),
        }
    }

    /// Attach tags used to select this unit.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Declare a unit that must run before this one.
    pub fn depends_on(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        if !self.dependencies.contains(&unit) {
            self.dependencies.push(unit);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag_set(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn action(&self) -> &dyn DeployAction {
        self.action.as_ref()
    }
}

impl fmt::Debug for DeploymentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentUnit")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
