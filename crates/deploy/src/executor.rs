//! Sequential execution of a run plan.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    ArtifactSource, DeployError, DeployResult, DeploymentUnit, NetworkContext, RunPlan,
};

/// Status of one executed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ExecutionStatus {
    /// The registry already held a deployment with the same bytecode.
    Skipped,
    /// The deploy action ran and its result was recorded.
    Deployed,
    /// The unit could not be deployed; the rest of the plan was abandoned.
    Failed,
}

/// Outcome of one unit of the plan.
#[derive(Debug)]
pub struct ExecutionRecord {
    pub unit: String,
    pub status: ExecutionStatus,
    pub outcome: Result<DeployResult, DeployError>,
}

impl ExecutionRecord {
    fn completed(unit: &str, status: ExecutionStatus, result: DeployResult) -> Self {
        Self {
            unit: unit.to_string(),
            status,
            outcome: Ok(result),
        }
    }

    fn failed(unit: &str, error: DeployError) -> Self {
        Self {
            unit: unit.to_string(),
            status: ExecutionStatus::Failed,
            outcome: Err(error),
        }
    }

    /// The deployment this record refers to, if any.
    pub fn result(&self) -> Option<&DeployResult> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DeployError> {
        self.outcome.as_ref().err()
    }
}

/// Records of a run, in plan order.
///
/// Units after a failed unit, or after a cancellation, have no record.
#[derive(Debug)]
pub struct ExecutionReport {
    pub network: String,
    pub records: Vec<ExecutionRecord>,
    /// Whether the run was cancelled before completing the plan.
    pub cancelled: bool,
}

impl ExecutionReport {
    /// Whether every planned unit was deployed or skipped.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records
            .iter()
            .filter(|record| record.status == ExecutionStatus::Failed)
    }

    pub fn statuses(&self) -> Vec<(&str, ExecutionStatus)> {
        self.records
            .iter()
            .map(|record| (record.unit.as_str(), record.status))
            .collect()
    }

    pub fn record(&self, unit: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|record| record.unit == unit)
    }
}

/// Runs the units of a plan one after the other.
///
/// For every unit the executor compares the bytecode hash of its artifact to the hash
/// stored in the address registry. Unchanged units are skipped, others are deployed and
/// recorded. The first failure aborts the rest of the plan.
pub struct Executor {
    artifacts: Arc<dyn ArtifactSource>,
    force: bool,
    cancel: Option<watch::Receiver<bool>>,
}

impl Executor {
    pub fn new(artifacts: Arc<dyn ArtifactSource>) -> Self {
        Self {
            artifacts,
            force: false,
            cancel: None,
        }
    }

    /// Redeploy every unit, even those whose bytecode did not change.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Stop before the next unit once `true` is sent on the channel.
    ///
    /// A unit whose deploy action already started runs to completion.
    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| *cancel.borrow())
    }

    /// Execute the plan against the network of `ctx`.
    pub async fn execute(&self, plan: &RunPlan<'_>, ctx: &mut NetworkContext) -> ExecutionReport {
        let mut report = ExecutionReport {
            network: ctx.network().to_string(),
            records: Vec::with_capacity(plan.len()),
            cancelled: false,
        };

        tracing::info!(
            network = ctx.network(),
            chain_id = ctx.chain_id(),
            units = ?plan.names(),
            force = self.force,
            "Executing deployment plan"
        );

        for unit in plan.iter() {
            if self.is_cancelled() {
                tracing::warn!(next = unit.name(), "Deployment cancelled, stopping");
                report.cancelled = true;
                break;
            }

            let record = self.run_unit(unit, ctx).await;
            log_record(&record);

            let failed = record.status == ExecutionStatus::Failed;
            report.records.push(record);
            if failed {
                tracing::error!(
                    unit = unit.name(),
                    remaining = plan.len() - report.records.len(),
                    "Aborting deployment plan"
                );
                break;
            }
        }

        report
    }

    async fn run_unit(&self, unit: &DeploymentUnit, ctx: &mut NetworkContext) -> ExecutionRecord {
        match self.try_run_unit(unit, ctx).await {
            Ok((status, result)) => ExecutionRecord::completed(unit.name(), status, result),
            Err(error) => ExecutionRecord::failed(unit.name(), error),
        }
    }

    async fn try_run_unit(
        &self,
        unit: &DeploymentUnit,
        ctx: &mut NetworkContext,
    ) -> Result<(ExecutionStatus, DeployResult), DeployError> {
        let name = unit.name();
        let bytecode_hash = self
            .artifacts
            .artifact(name)
            .map_err(|reason| DeployError::MissingArtifact {
                name: name.to_string(),
                reason,
            })?
            .bytecode_hash();

        let existing = ctx.addresses().lookup(ctx.network(), name)?;

        match &existing {
            Some(entry) if !self.force && entry.bytecode_hash == bytecode_hash => {
                ctx.remember(name, entry.result.clone());
                return Ok((ExecutionStatus::Skipped, entry.result.clone()));
            }
            Some(entry) if !self.force => {
                tracing::info!(
                    unit = name,
                    previous = %entry.result.address,
                    "Bytecode changed, redeploying"
                );
            }
            _ => {}
        }

        tracing::debug!(unit = name, bytecode_hash = %bytecode_hash, "Running deploy action");
        let result = unit
            .action()
            .deploy(ctx)
            .await
            .map_err(|reason| action_error(name, reason))?;

        let expected_version = existing.as_ref().map(|entry| entry.version);
        ctx.addresses().record(
            ctx.network(),
            name,
            result.clone(),
            &bytecode_hash,
            expected_version,
        )?;
        ctx.remember(name, result.clone());

        Ok((ExecutionStatus::Deployed, result))
    }
}

/// Keep core errors raised inside a deploy action (e.g. an unresolved dependency) intact.
fn action_error(unit: &str, reason: anyhow::Error) -> DeployError {
    match reason.downcast::<DeployError>() {
        Ok(error) => error,
        Err(reason) => DeployError::DeployActionFailed {
            unit: unit.to_string(),
            reason,
        },
    }
}

fn log_record(record: &ExecutionRecord) {
    match &record.outcome {
        Ok(result) => tracing::info!(
            unit = %record.unit,
            status = %record.status,
            address = %result.address,
            tx = %result.transaction_hash,
            block = result.block_number,
            "{} {}",
            record.status,
            record.unit
        ),
        Err(error) => tracing::error!(
            unit = %record.unit,
            status = %record.status,
            err = %error,
            "{} {}",
            record.status,
            record.unit
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        AddressRegistry, Artifact, InMemoryArtifacts, MemoryAddressRegistry, NamedAccounts, Tags,
        UnitRegistry, resolve,
        unit::test_utils::{CountingAction, FailingAction},
    };

    struct Fixture {
        units: UnitRegistry,
        addresses: Arc<MemoryAddressRegistry>,
        artifacts: InMemoryArtifacts,
        reward: CountingAction,
        staking: CountingAction,
    }

    impl Fixture {
        fn staking() -> Self {
            let reward = CountingAction::default();
            let staking = CountingAction::requiring("RewardToken");

            let mut units = UnitRegistry::new();
            units
                .register(
                    DeploymentUnit::new("RewardToken", reward.clone()).tags(["all", "rewardToken"]),
                )
                .unwrap();
            units
                .register(
                    DeploymentUnit::new("Staking", staking.clone())
                        .tags(["all", "stakingToken"])
                        .depends_on("RewardToken"),
                )
                .unwrap();

            let artifacts = InMemoryArtifacts::new()
                .with(Artifact::new("RewardToken", vec![0x60, 0x01]))
                .with(Artifact::new("Staking", vec![0x60, 0x02]));

            Self {
                units,
                addresses: Arc::new(MemoryAddressRegistry::new()),
                artifacts,
                reward,
                staking,
            }
        }

        fn context(&self) -> NetworkContext {
            NetworkContext::new(
                "sepolia",
                11155111,
                NamedAccounts::default(),
                self.addresses.clone(),
            )
        }

        fn executor(&self) -> Executor {
            Executor::new(Arc::new(self.artifacts.clone()))
        }

        async fn run(&self, executor: Executor) -> ExecutionReport {
            let plan = resolve(&self.units, &Tags::all()).unwrap();
            executor.execute(&plan, &mut self.context()).await
        }
    }

    #[tokio::test]
    async fn test_fresh_registry_deploys_in_order() {
        let fixture = Fixture::staking();

        let report = fixture.run(fixture.executor()).await;

        assert!(report.is_success());
        assert_eq!(
            report.statuses(),
            [
                ("RewardToken", ExecutionStatus::Deployed),
                ("Staking", ExecutionStatus::Deployed)
            ]
        );

        // Staking observed the exact address recorded for RewardToken.
        let recorded = fixture
            .addresses
            .lookup("sepolia", "RewardToken")
            .unwrap()
            .unwrap();
        let observed = fixture.staking.observed.lock().unwrap().clone();
        assert_eq!(observed, [("RewardToken".to_string(), recorded.result.address)]);
        assert_eq!(
            report.record("RewardToken").unwrap().result().unwrap().address,
            recorded.result.address
        );
    }

    #[tokio::test]
    async fn test_second_run_skips_everything() {
        let fixture = Fixture::staking();

        let first = fixture.run(fixture.executor()).await;
        let second = fixture.run(fixture.executor()).await;

        assert!(first.is_success());
        assert!(second.is_success());
        assert!(
            second
                .records
                .iter()
                .all(|record| record.status == ExecutionStatus::Skipped)
        );
        assert_eq!(fixture.reward.calls(), 1);
        assert_eq!(fixture.staking.calls(), 1);

        // Skipped units still expose their deployment.
        let first_address = first.record("Staking").unwrap().result().unwrap().address;
        let second_address = second.record("Staking").unwrap().result().unwrap().address;
        assert_eq!(first_address, second_address);
    }

    #[tokio::test]
    async fn test_changed_bytecode_redeploys_only_that_unit() {
        let mut fixture = Fixture::staking();
        fixture.run(fixture.executor()).await;

        fixture
            .artifacts
            .insert(Artifact::new("Staking", vec![0x60, 0x03]));
        let report = fixture.run(fixture.executor()).await;

        assert_eq!(
            report.statuses(),
            [
                ("RewardToken", ExecutionStatus::Skipped),
                ("Staking", ExecutionStatus::Deployed)
            ]
        );
        assert_eq!(fixture.staking.calls(), 2);
        let entry = fixture.addresses.lookup("sepolia", "Staking").unwrap().unwrap();
        assert_eq!(entry.version, 2);
    }

    #[tokio::test]
    async fn test_force_redeploys_unchanged_units() {
        let fixture = Fixture::staking();
        fixture.run(fixture.executor()).await;
        let before = fixture
            .addresses
            .lookup("sepolia", "RewardToken")
            .unwrap()
            .unwrap();

        let report = fixture.run(fixture.executor().force(true)).await;

        assert!(report.is_success());
        assert_eq!(fixture.reward.calls(), 2);
        let after = fixture
            .addresses
            .lookup("sepolia", "RewardToken")
            .unwrap()
            .unwrap();
        assert_ne!(before.result, after.result);
        assert_eq!(after.version, before.version + 1);
    }

    #[tokio::test]
    async fn test_bad_ordering_fails_with_unresolved_contract() {
        let fixture = Fixture::staking();
        let staking = fixture.units.get("Staking").unwrap();
        let plan = RunPlan::from_units([staking]);

        let report = fixture.executor().execute(&plan, &mut fixture.context()).await;

        assert!(!report.is_success());
        let record = report.record("Staking").unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(matches!(
            record.error(),
            Some(DeployError::UnresolvedContract { name, .. }) if name == "RewardToken"
        ));
        assert!(fixture.addresses.lookup("sepolia", "Staking").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_units_but_keeps_records() {
        let mut units = UnitRegistry::new();
        let after = CountingAction::default();
        units
            .register(DeploymentUnit::new("RewardToken", CountingAction::default()))
            .unwrap();
        units
            .register(DeploymentUnit::new("Staking", FailingAction("execution reverted")))
            .unwrap();
        units
            .register(DeploymentUnit::new("Rewards", after.clone()))
            .unwrap();
        let artifacts = InMemoryArtifacts::new()
            .with(Artifact::new("RewardToken", vec![0x01]))
            .with(Artifact::new("Staking", vec![0x02]))
            .with(Artifact::new("Rewards", vec![0x03]));
        let addresses = Arc::new(MemoryAddressRegistry::new());
        let mut ctx = NetworkContext::new("sepolia", 1, NamedAccounts::default(), addresses.clone());

        let plan = resolve(&units, &Tags::all()).unwrap();
        let report = Executor::new(Arc::new(artifacts))
            .execute(&plan, &mut ctx)
            .await;

        assert_eq!(
            report.statuses(),
            [
                ("RewardToken", ExecutionStatus::Deployed),
                ("Staking", ExecutionStatus::Failed)
            ]
        );
        assert!(matches!(
            report.record("Staking").unwrap().error(),
            Some(DeployError::DeployActionFailed { unit, .. }) if unit == "Staking"
        ));
        assert_eq!(after.calls(), 0);
        assert!(addresses.lookup("sepolia", "RewardToken").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_unit() {
        let mut fixture = Fixture::staking();
        fixture.artifacts = InMemoryArtifacts::new();

        let report = fixture.run(fixture.executor()).await;

        assert_eq!(report.records.len(), 1);
        assert!(matches!(
            report.records[0].error(),
            Some(DeployError::MissingArtifact { name, .. }) if name == "RewardToken"
        ));
        assert_eq!(fixture.reward.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_write_is_reported_as_failure() {
        let fixture = Fixture::staking();
        let plan = resolve(&fixture.units, &Tags::from_iter(["rewardToken"])).unwrap();

        // Another process records RewardToken after this run looked it up: simulate by
        // writing from inside the deploy action.
        struct RacingAction(Arc<MemoryAddressRegistry>);
        impl crate::DeployAction for RacingAction {
            fn deploy<'a>(&'a self, _ctx: &'a NetworkContext) -> crate::ActionFuture<'a> {
                Box::pin(async move {
                    let other = crate::unit::test_utils::fake_result("RewardToken", 99);
                    self.0.record("sepolia", "RewardToken", other, "other", None)?;
                    Ok(crate::unit::test_utils::fake_result("RewardToken", 1))
                })
            }
        }

        let mut units = UnitRegistry::new();
        units
            .register(DeploymentUnit::new(
                "RewardToken",
                RacingAction(fixture.addresses.clone()),
            ))
            .unwrap();
        let plan_racing = resolve(&units, &Tags::all()).unwrap();
        assert_eq!(plan.names(), plan_racing.names());

        let report = fixture
            .executor()
            .execute(&plan_racing, &mut fixture.context())
            .await;

        assert!(matches!(
            report.records[0].error(),
            Some(DeployError::ConcurrentModification { expected: None, found: Some(1), .. })
        ));
        let stored = fixture
            .addresses
            .lookup("sepolia", "RewardToken")
            .unwrap()
            .unwrap();
        assert_eq!(stored.bytecode_hash, "other");
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_unit() {
        let fixture = Fixture::staking();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let report = fixture.run(fixture.executor().cancel_on(cancel_rx)).await;

        assert!(report.cancelled);
        assert!(!report.is_success());
        assert!(report.records.is_empty());
        assert_eq!(fixture.reward.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds() {
        let fixture = Fixture::staking();
        let plan = RunPlan::from_units([]);

        let report = fixture.executor().execute(&plan, &mut fixture.context()).await;

        assert!(report.is_success());
        assert!(report.records.is_empty());
    }
}
