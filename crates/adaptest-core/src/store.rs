//! Ability persistence seam.
//!
//! The controller reads prior abilities when a session starts and hands the
//! final ability over when it completes. Durable storage lives behind this
//! trait; the in-memory store is enough for simulations and tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::model::Ability;

/// Lookup and hand-off of respondent abilities.
pub trait AbilityStore: Send + Sync {
    /// Latest known ability for a respondent.
    fn load(&self, respondent_id: &str) -> Option<Ability>;

    /// Take ownership of a final ability.
    fn save(&self, ability: Ability) -> anyhow::Result<()>;
}

/// Thread-safe in-memory store keyed by respondent id.
#[derive(Debug, Default)]
pub struct InMemoryAbilityStore {
    abilities: Mutex<HashMap<String, Ability>>,
}

impl InMemoryAbilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with known abilities.
    pub fn with_abilities(abilities: impl IntoIterator<Item = Ability>) -> Self {
        let map = abilities
            .into_iter()
            .map(|a| (a.respondent_id.clone(), a))
            .collect();
        Self {
            abilities: Mutex::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.abilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AbilityStore for InMemoryAbilityStore {
    fn load(&self, respondent_id: &str) -> Option<Ability> {
        self.abilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(respondent_id)
            .cloned()
    }

    fn save(&self, ability: Ability) -> anyhow::Result<()> {
        self.abilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ability.respondent_id.clone(), ability);
        Ok(())
    }
}
