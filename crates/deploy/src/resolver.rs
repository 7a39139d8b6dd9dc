//! Tag selection and dependency ordering of deployment units.
//!
//! [`resolve`] turns a tag request into a [`RunPlan`]: the selected units plus their
//! transitive dependencies, topologically sorted. Units without an ordering constraint
//! between them keep their registration order.

use std::collections::{BTreeSet, HashMap};

use derive_more::Deref;

use crate::{DeployError, DeploymentUnit, UnitRegistry};

/// Tag that selects every registered unit.
pub const ALL_TAG: &str = "all";

/// A set of requested tags.
///
/// An empty set, or a set containing [`ALL_TAG`], selects every unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    /// Request every unit.
    pub fn all() -> Self {
        Self::from_iter([ALL_TAG])
    }

    /// Whether the request selects every unit regardless of its tags.
    pub fn selects_everything(&self) -> bool {
        self.0.is_empty() || self.0.contains(ALL_TAG)
    }

    /// Whether the unit is selected by this request.
    pub fn selects(&self, unit: &DeploymentUnit) -> bool {
        self.selects_everything() || !self.0.is_disjoint(unit.tag_set())
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .map(|tag: String| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        )
    }
}

/// The ordered units to execute in one invocation.
#[derive(Debug, Clone, Deref)]
pub struct RunPlan<'r>(Vec<&'r DeploymentUnit>);

impl<'r> RunPlan<'r> {
    /// Build a plan from an explicit order, bypassing resolution.
    pub fn from_units(units: impl IntoIterator<Item = &'r DeploymentUnit>) -> Self {
        Self(units.into_iter().collect())
    }

    /// Names of the planned units, in execution order.
    pub fn names(&self) -> Vec<&'r str> {
        self.0.iter().map(|unit| unit.name()).collect()
    }
}

/// Compute the run plan for the requested tags.
///
/// # Errors
/// - [`DeployError::UnknownDependency`] if a selected unit (or one of its dependencies)
///   references an unregistered unit.
/// - [`DeployError::CyclicDependency`] if the selected units contain a cycle.
pub fn resolve<'r>(registry: &'r UnitRegistry, tags: &Tags) -> Result<RunPlan<'r>, DeployError> {
    let selected = select(registry, tags)?;

    // Edges point from a dependency to its dependents.
    let mut in_degree: HashMap<usize, usize> = HashMap::with_capacity(selected.len());
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for &idx in &selected {
        let dependencies = dependency_positions(registry, idx)?;
        in_degree.insert(idx, dependencies.len());
        for dependency in dependencies {
            dependents.entry(dependency).or_default().push(idx);
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| *idx)
        .collect();
    let mut order = Vec::with_capacity(selected.len());

    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for dependent in dependents.get(&idx).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() < selected.len() {
        let blocked: BTreeSet<usize> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(idx, _)| idx)
            .collect();
        return Err(DeployError::CyclicDependency {
            cycle: find_cycle(registry, &blocked),
        });
    }

    let plan = RunPlan(order.into_iter().map(|idx| registry.by_position(idx)).collect());
    tracing::debug!(tags = ?tags, plan = ?plan.names(), "Resolved run plan");
    Ok(plan)
}

/// Positions of the units matching the tags, plus their transitive dependencies.
fn select(registry: &UnitRegistry, tags: &Tags) -> Result<BTreeSet<usize>, DeployError> {
    let mut selected = BTreeSet::new();
    let mut pending: Vec<usize> = registry
        .all()
        .enumerate()
        .filter(|(_, unit)| tags.selects(unit))
        .map(|(idx, _)| idx)
        .collect();

    while let Some(idx) = pending.pop() {
        if !selected.insert(idx) {
            continue;
        }
        for dependency in dependency_positions(registry, idx)? {
            if !selected.contains(&dependency) {
                pending.push(dependency);
            }
        }
    }

    Ok(selected)
}

fn dependency_positions(registry: &UnitRegistry, idx: usize) -> Result<BTreeSet<usize>, DeployError> {
    let unit = registry.by_position(idx);
    unit.dependencies()
        .iter()
        .map(|dependency| {
            registry
                .position(dependency)
                .ok_or_else(|| DeployError::UnknownDependency {
                    unit: unit.name().to_string(),
                    dependency: dependency.clone(),
                })
        })
        .collect()
}

/// Walk dependency edges among the blocked units until a unit repeats.
///
/// Every blocked unit has at least one blocked dependency, so the walk always closes a
/// cycle. The returned path starts and ends with the same unit.
fn find_cycle(registry: &UnitRegistry, blocked: &BTreeSet<usize>) -> Vec<String> {
    let Some(&start) = blocked.first() else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut visited = HashMap::from([(start, 0usize)]);
    let mut current = start;

    loop {
        let next = registry
            .by_position(current)
            .dependencies()
            .iter()
            .filter_map(|dependency| registry.position(dependency))
            .find(|dependency| blocked.contains(dependency));

        let Some(next) = next else {
            break;
        };

        if let Some(&pos) = visited.get(&next) {
            path.drain(..pos);
            path.push(next);
            break;
        }

        visited.insert(next, path.len());
        path.push(next);
        current = next;
    }

    path.into_iter()
        .map(|idx| registry.by_position(idx).name().to_string())
        .collect()
}
