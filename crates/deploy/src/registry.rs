//! Registry of the deployment units known to one invocation.

use std::collections::HashMap;

use crate::{DeployError, DeploymentUnit};

/// Holds every deployment unit of an invocation, in registration order.
///
/// The registry is a plain value: it lives as long as the invocation that built it, so
/// separate runs (and tests) never share registrations.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Vec<DeploymentUnit>,
    index: HashMap<String, usize>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit.
    ///
    /// Fails with [`DeployError::DuplicateUnit`] if a unit with the same name exists.
    pub fn register(&mut self, unit: DeploymentUnit) -> Result<(), DeployError> {
        if self.index.contains_key(unit.name()) {
            return Err(DeployError::DuplicateUnit(unit.name().to_string()));
        }

        tracing::debug!(
            unit = unit.name(),
            tags = ?unit.tag_set(),
            dependencies = ?unit.dependencies(),
            "Registered deployment unit"
        );

        self.index.insert(unit.name().to_string(), self.units.len());
        self.units.push(unit);
        Ok(())
    }

    /// Iterate over all units in registration order.
    ///
    /// Each call starts a fresh iteration.
    pub fn all(&self) -> impl ExactSizeIterator<Item = &DeploymentUnit> {
        self.units.iter()
    }

    pub fn get(&self, name: &str) -> Option<&DeploymentUnit> {
        self.position(name).map(|idx| &self.units[idx])
    }

    /// Registration index of the unit with the given name.
    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn by_position(&self, idx: usize) -> &DeploymentUnit {
        &self.units[idx]
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::test_utils::CountingAction;

    #[test]
    fn test_register_rejects_duplicate_names() {
        let mut registry = UnitRegistry::new();
        registry
            .register(DeploymentUnit::new("RewardToken", CountingAction::default()))
            .unwrap();

        let err = registry
            .register(DeploymentUnit::new("RewardToken", CountingAction::default()))
            .unwrap_err();

        assert!(matches!(err, DeployError::DuplicateUnit(name) if name == "RewardToken"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_all_is_restartable_and_ordered() {
        let mut registry = UnitRegistry::new();
        for name in ["C", "A", "B"] {
            registry
                .register(DeploymentUnit::new(name, CountingAction::default()))
                .unwrap();
        }

        let first: Vec<_> = registry.all().map(DeploymentUnit::name).collect();
        let second: Vec<_> = registry.all().map(DeploymentUnit::name).collect();

        assert_eq!(first, ["C", "A", "B"]);
        assert_eq!(first, second);
        assert_eq!(registry.get("A").map(DeploymentUnit::name), Some("A"));
        assert!(registry.get("D").is_none());
    }
}
