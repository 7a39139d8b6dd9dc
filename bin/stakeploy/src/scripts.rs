//! The deployment units of the staking system.
//!
//! - `RewardToken` (tags `all`, `rewardToken`): the ERC-20 paid out as reward.
//! - `Staking` (tags `all`, `stakingToken`): the staking pool. The reward token is both
//!   the staked token and the reward token.

use std::sync::Arc;

use stakeploy_deploy::{
    ActionFuture, ContractFactory, DeployAction, DeployError, DeployRequest, DeploymentUnit,
    NetworkContext, UnitRegistry,
};

pub const REWARD_TOKEN: &str = "RewardToken";
pub const STAKING: &str = "Staking";

/// Account role sending the creation transactions.
const DEPLOYER_ROLE: &str = "deployer";

struct DeployRewardToken {
    factory: Arc<dyn ContractFactory>,
}

impl DeployAction for DeployRewardToken {
    fn deploy<'a>(&'a self, ctx: &'a NetworkContext) -> ActionFuture<'a> {
        Box::pin(async move {
            let deployer = ctx.named_account(DEPLOYER_ROLE)?;
            self.factory
                .deploy_contract(DeployRequest::new(REWARD_TOKEN, deployer))
                .await
        })
    }
}

struct DeployStaking {
    factory: Arc<dyn ContractFactory>,
}

impl DeployAction for DeployStaking {
    fn deploy<'a>(&'a self, ctx: &'a NetworkContext) -> ActionFuture<'a> {
        Box::pin(async move {
            let deployer = ctx.named_account(DEPLOYER_ROLE)?;
            let reward_token = ctx.get_deployed_handle(REWARD_TOKEN)?;

            self.factory
                .deploy_contract(
                    DeployRequest::new(STAKING, deployer)
                        .arg(reward_token.address)
                        .arg(reward_token.address),
                )
                .await
        })
    }
}

/// Register the staking system units.
pub fn register_units(
    units: &mut UnitRegistry,
    factory: Arc<dyn ContractFactory>,
) -> Result<(), DeployError> {
    units.register(
        DeploymentUnit::new(
            REWARD_TOKEN,
            DeployRewardToken {
                factory: factory.clone(),
            },
        )
        .tags(["all", "rewardToken"]),
    )?;

    units.register(
        DeploymentUnit::new(STAKING, DeployStaking { factory })
            .tags(["all", "stakingToken"])
            .depends_on(REWARD_TOKEN),
    )?;

    Ok(())
}
