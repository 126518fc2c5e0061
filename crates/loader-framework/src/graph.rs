//! Entity dependency graph.
//!
//! Ordering between entity types is data, not call order: each entity lists
//! the entities whose rows it references, and the controller derives its
//! stages from the graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::LoadError;

/// Entity type to prerequisite types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    // BTreeMap keeps stage contents in a stable order.
    prerequisites: BTreeMap<&'static str, BTreeSet<&'static str>>,
    declared: Vec<&'static str>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity with no prerequisites (yet).
    pub fn add_entity(&mut self, entity: &'static str) -> &mut Self {
        if !self.prerequisites.contains_key(entity) {
            self.prerequisites.insert(entity, BTreeSet::new());
            self.declared.push(entity);
        }
        self
    }

    /// Declare that `entity` may only load once `prerequisite` has drained.
    pub fn add_dependency(&mut self, entity: &'static str, prerequisite: &'static str) -> &mut Self {
        self.add_entity(prerequisite);
        self.add_entity(entity);
        if let Some(set) = self.prerequisites.get_mut(entity) {
            set.insert(prerequisite);
        }
        self
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.prerequisites.contains_key(entity)
    }

    /// Entities in declaration order.
    pub fn entities(&self) -> &[&'static str] {
        &self.declared
    }

    /// Direct prerequisites of `entity`; empty for unknown entities.
    pub fn prerequisites(&self, entity: &str) -> Vec<&'static str> {
        self.prerequisites
            .get(entity)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Group entities into stages: every entity's prerequisites sit in earlier stages.
    ///
    /// Entities within a stage do not depend on each other and may load
    /// concurrently. Within a stage, entities keep declaration order.
    pub fn stages(&self) -> Result<Vec<Vec<&'static str>>, LoadError> {
        let mut placed: BTreeSet<&'static str> = BTreeSet::new();
        let mut stages = Vec::new();

        while placed.len() < self.declared.len() {
            let stage: Vec<&'static str> = self
                .declared
                .iter()
                .copied()
                .filter(|e| !placed.contains(e))
                .filter(|e| self.prerequisites[e].iter().all(|p| placed.contains(p)))
                .collect();

            if stage.is_empty() {
                let stuck: Vec<&str> = self
                    .declared
                    .iter()
                    .copied()
                    .filter(|e| !placed.contains(e))
                    .collect();
                return Err(LoadError::Graph(format!(
                    "dependency cycle among: {}",
                    stuck.join(", ")
                )));
            }

            placed.extend(stage.iter().copied());
            stages.push(stage);
        }

        Ok(stages)
    }

    /// First `(entity, prerequisite)` pair that `order` would load the wrong way round.
    ///
    /// An entity appearing in `order` before one of its prerequisites, or
    /// whose prerequisite is missing from `order` entirely, is a violation.
    pub fn violation(&self, order: &[&str]) -> Option<(&'static str, &'static str)> {
        for (pos, entity) in order.iter().enumerate() {
            let Some((&name, prereqs)) = self.prerequisites.get_key_value(*entity) else {
                continue;
            };
            for &p in prereqs {
                if !order[..pos].contains(&p) {
                    return Some((name, p));
                }
            }
        }
        None
    }
}
