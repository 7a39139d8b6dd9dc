//! Entry point tying resolution and execution together.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    AddressRegistry, ArtifactSource, DeployError, ExecutionReport, Executor, NamedAccounts,
    NetworkContext, RunPlan, Tags, UnitRegistry, resolve,
};

/// The network a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTarget {
    pub name: String,
    pub chain_id: u64,
}

impl NetworkTarget {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }
}

/// Options of one deployment run.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Tags selecting the units to run.
    pub tags: Tags,
    /// Redeploy units even if their bytecode did not change.
    pub force: bool,
    /// Forget every recorded deployment of the network before running.
    pub reset: bool,
    /// Cooperative cancellation signal, checked between units.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl DeployOptions {
    pub fn new(tags: Tags) -> Self {
        Self {
            tags,
            ..Default::default()
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Orchestrates the deployment of a set of units on a network.
pub struct Deployer {
    units: UnitRegistry,
    addresses: Arc<dyn AddressRegistry>,
    artifacts: Arc<dyn ArtifactSource>,
}

impl Deployer {
    pub fn new(
        units: UnitRegistry,
        addresses: Arc<dyn AddressRegistry>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            units,
            addresses,
            artifacts,
        }
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn addresses(&self) -> &Arc<dyn AddressRegistry> {
        &self.addresses
    }

    /// Resolve the units selected by `tags`, without running anything.
    pub fn plan(&self, tags: &Tags) -> Result<RunPlan<'_>, DeployError> {
        resolve(&self.units, tags)
    }

    /// Run the units selected by the options against a network.
    ///
    /// Resolution errors and registry errors raised before the first unit (reset, chain id
    /// binding) are returned as `Err`. Failures of individual units are reported in the
    /// returned [`ExecutionReport`].
    pub async fn deploy(
        &self,
        network: NetworkTarget,
        accounts: NamedAccounts,
        options: DeployOptions,
    ) -> Result<ExecutionReport, DeployError> {
        tracing::info!(
            network = %network.name,
            chain_id = network.chain_id,
            tags = ?options.tags,
            "Starting deployment process..."
        );

        let plan = self.plan(&options.tags)?;

        if options.reset {
            self.addresses.reset(&network.name)?;
        }
        self.addresses
            .bind_chain_id(&network.name, network.chain_id)?;

        let mut ctx = NetworkContext::new(
            network.name,
            network.chain_id,
            accounts,
            self.addresses.clone(),
        );

        let mut executor = Executor::new(self.artifacts.clone()).force(options.force);
        if let Some(cancel) = options.cancel {
            executor = executor.cancel_on(cancel);
        }

        let report = executor.execute(&plan, &mut ctx).await;

        if report.is_success() {
            tracing::info!("✓ Deployment complete!");
        }
        Ok(report)
    }
}
