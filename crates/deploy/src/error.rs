//! Error taxonomy of the orchestration core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving or executing a deployment run.
///
/// Resolution errors ([`DeployError::DuplicateUnit`], [`DeployError::UnknownDependency`],
/// [`DeployError::CyclicDependency`]) are raised before any deployment side effect.
#[derive(Error, Debug)]
pub enum DeployError {
    /// A unit with the same name was already registered.
    #[error("deployment unit '{0}' is already registered")]
    DuplicateUnit(String),

    /// A unit references a dependency that is not registered.
    #[error("deployment unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },

    /// The selected units contain a dependency cycle.
    #[error("cyclic dependency between deployment units: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A deployed contract was requested but neither the current run nor the
    /// address registry knows about it.
    #[error("contract '{name}' is not deployed on network '{network}'")]
    UnresolvedContract { network: String, name: String },

    /// The deploy action of a unit failed.
    #[error("deploy action of unit '{unit}' failed: {reason:#}")]
    DeployActionFailed { unit: String, reason: anyhow::Error },

    /// The registry entry changed between the read and the write of this run.
    #[error(
        "registry entry for '{name}' on network '{network}' was modified concurrently \
         (expected version {expected:?}, found {found:?})"
    )]
    ConcurrentModification {
        network: String,
        name: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// A named account role has no address.
    #[error("named account '{0}' is not configured")]
    UnknownAccount(String),

    /// A named account points past the accounts exposed by the node.
    #[error("named account '{role}' uses index {index} but only {available} accounts are available")]
    AccountIndexOutOfRange {
        role: String,
        index: usize,
        available: usize,
    },

    /// The compiled artifact of a contract could not be loaded.
    #[error("artifact for contract '{name}' could not be loaded: {reason:#}")]
    MissingArtifact { name: String, reason: anyhow::Error },

    /// The network is not declared in the configuration.
    #[error("network '{0}' is not configured")]
    UnknownNetwork(String),

    /// The deployments of a network were recorded against another chain.
    #[error("network '{network}' was deployed on chain {stored}, but chain {configured} is configured")]
    ChainIdMismatch {
        network: String,
        stored: u64,
        configured: u64,
    },

    /// Reading or writing the persisted address registry failed.
    #[error("address registry I/O error at {}: {source}", .path.display())]
    RegistryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted registry entry is malformed.
    #[error("malformed address registry entry at {}: {source}", .path.display())]
    RegistryFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DeployError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RegistryIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was raised before any deployment side effect took place.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateUnit(_) | Self::UnknownDependency { .. } | Self::CyclicDependency { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_is_rendered_as_path() {
        let err = DeployError::CyclicDependency {
            cycle: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "cyclic dependency between deployment units: A -> B -> A"
        );
        assert!(err.is_resolution_error());
    }

    #[test]
    fn test_action_failure_keeps_context_chain() {
        let reason = anyhow::anyhow!("execution reverted").context("Failed to send transaction");
        let err = DeployError::DeployActionFailed {
            unit: "Staking".to_string(),
            reason,
        };

        let message = err.to_string();
        assert!(message.contains("Failed to send transaction"));
        assert!(message.contains("execution reverted"));
        assert!(!err.is_resolution_error());
    }
}
