//! Generators and planned row counts for a whole dataset.

use std::sync::Arc;

use loader_framework::Generator;
use tracing::debug;

use crate::entities::{Address, Attendees, Comments, EventTag, Friends, Invitation, Person, SocialEvent, Tag};
use crate::scale::ScaleFactors;

/// One entity type to load.
#[derive(Clone)]
pub struct PlannedLoad {
    pub generator: Arc<dyn Generator>,
    /// Units to generate.
    pub count: u64,
}

/// Entity name to generator and count, in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<(&'static str, PlannedLoad)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every Olio entity sized by `scale`.
    pub fn olio(scale: ScaleFactors) -> Self {
        let users = scale.loaded_users;
        let events = scale.events;
        let tags = scale.tags;
        let scale = Arc::new(scale);
        let social_event = SocialEvent::new(Arc::clone(&scale));
        let base_time = social_event.base_time();

        let mut registry = Self::new();
        registry
            .register(Arc::new(Person::new(Arc::clone(&scale))), users)
            .register(Arc::new(Friends::new(Arc::clone(&scale))), users)
            .register(Arc::new(Address), users)
            .register(Arc::new(Invitation::new(Arc::clone(&scale))), users)
            .register(Arc::new(Tag), tags)
            .register(Arc::new(social_event), events)
            .register(Arc::new(EventTag::new(Arc::clone(&scale))), events)
            .register(Arc::new(Attendees::new(Arc::clone(&scale))), events)
            .register(Arc::new(Comments::new(scale, base_time)), events);

        for (entity, planned) in &registry.entries {
            debug!("Planned {} {} units", planned.count, entity);
        }
        registry
    }

    /// Add `generator`, replacing any entry for the same entity.
    pub fn register(&mut self, generator: Arc<dyn Generator>, count: u64) -> &mut Self {
        let entity = generator.entity();
        let planned = PlannedLoad { generator, count };
        match self.entries.iter_mut().find(|(name, _)| *name == entity) {
            Some((_, entry)) => *entry = planned,
            None => self.entries.push((entity, planned)),
        }
        self
    }

    pub fn get(&self, entity: &str) -> Option<&PlannedLoad> {
        self.entries
            .iter()
            .find(|(name, _)| *name == entity)
            .map(|(_, planned)| planned)
    }

    /// Registered entity names in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedLoad> {
        self.entries.iter().map(|(_, planned)| planned)
    }

    /// Total units planned across every entity.
    pub fn total_units(&self) -> u64 {
        self.iter().map(|p| p.count).sum()
    }
}
