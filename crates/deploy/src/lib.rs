//! stakeploy-deploy - Deployment orchestration library for tagged contract units.
//!
//! This crate resolves which deployment units to run from a set of tags, orders them by
//! their declared dependencies, and executes them against a network while keeping a
//! per-network registry of deployed contract addresses. Units whose bytecode did not
//! change since their last deployment are skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stakeploy_deploy::{
//!     DeployOptions, Deployer, FsAddressRegistry, FsArtifacts, NamedAccounts, NetworkTarget,
//!     Tags, UnitRegistry,
//! };
//!
//! # async fn example(units: UnitRegistry) -> anyhow::Result<()> {
//! let deployer = Deployer::new(
//!     units,
//!     Arc::new(FsAddressRegistry::new("deployments")),
//!     Arc::new(FsArtifacts::new("artifacts")),
//! );
//!
//! let report = deployer
//!     .deploy(
//!         NetworkTarget::new("localhost", 31337),
//!         NamedAccounts::default(),
//!         DeployOptions::new(Tags::all()),
//!     )
//!     .await?;
//!
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

mod accounts;
pub use accounts::{AccountResolver, AccountSpec, NamedAccounts, RpcAccountResolver, StaticAccounts};

mod address_book;
pub use address_book::{
    AddressRegistry, AddressRegistryEntry, FsAddressRegistry, MemoryAddressRegistry,
};

mod artifacts;
pub use artifacts::{Artifact, ArtifactSource, FsArtifacts, InMemoryArtifacts};

mod config;
pub use config::{CONFIG_FILENAME, NetworkConfig, StakeployConfig};

mod context;
pub use context::NetworkContext;

mod deployer;
pub use deployer::{DeployOptions, Deployer, NetworkTarget};

mod error;
pub use error::DeployError;

mod executor;
pub use executor::{ExecutionRecord, ExecutionReport, ExecutionStatus, Executor};

mod factory;
pub use factory::{ContractFactory, DeployRequest, RpcContractFactory};

mod registry;
pub use registry::UnitRegistry;

mod report;

mod resolver;
pub use resolver::{ALL_TAG, RunPlan, Tags, resolve};

pub mod rpc;

mod unit;
pub use unit::{ActionFuture, DeployAction, DeployResult, DeploymentUnit};
