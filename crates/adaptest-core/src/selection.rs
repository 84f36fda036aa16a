//! Next-item selection.
//!
//! The controller asks a [`SelectionStrategy`] to score every unanswered item
//! and presents the highest-scoring one. [`MaxInformation`] is the default;
//! any closure `Fn(&Item, &Ability, &[ResponseRecord]) -> f64` is also a
//! strategy.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::bank::ItemBank;
use crate::irt;
use crate::model::{Ability, Category, Item, ResponseRecord};

/// Scores a candidate item for the respondent's current state.
pub trait SelectionStrategy: Send + Sync {
    fn score(&self, item: &Item, ability: &Ability, history: &[ResponseRecord]) -> f64;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> SelectionStrategy for F
where
    F: Fn(&Item, &Ability, &[ResponseRecord]) -> f64 + Send + Sync,
{
    fn score(&self, item: &Item, ability: &Ability, history: &[ResponseRecord]) -> f64 {
        self(item, ability, history)
    }
}

/// Fisher information at the current θ.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxInformation;

impl SelectionStrategy for MaxInformation {
    fn score(&self, item: &Item, ability: &Ability, _history: &[ResponseRecord]) -> f64 {
        irt::fisher_information(item, ability.theta)
    }

    fn name(&self) -> &str {
        "max-information"
    }
}

/// Pick the best unanswered item in bank order.
///
/// Ties keep the earlier item. Returns `None` when every item is answered.
pub fn select_next_item<'a>(
    bank: &'a ItemBank,
    ability: &Ability,
    history: &[ResponseRecord],
    strategy: &dyn SelectionStrategy,
) -> Option<&'a Item> {
    let answered: HashSet<&str> = history.iter().map(|r| r.item_id.as_str()).collect();

    let mut best: Option<(&Item, f64)> = None;
    for item in bank.iter() {
        if answered.contains(item.id.as_str()) {
            continue;
        }
        let score = strategy.score(item, ability, history);
        let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((item, score)),
        }
    }

    best.map(|(item, _)| item)
}

/// Counts how often each item has been administered across sessions.
///
/// Shared between concurrently running sessions, so every access goes through
/// the internal mutex.
#[derive(Debug, Default)]
pub struct ExposureLedger {
    inner: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    counts: HashMap<String, u64>,
    sessions: u64,
}

impl ExposureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Note the start of a session.
    pub fn record_session(&self) {
        self.state().sessions += 1;
    }

    /// Note that an item was presented.
    pub fn record(&self, item_id: &str) {
        *self.state().counts.entry(item_id.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, item_id: &str) -> u64 {
        self.state().counts.get(item_id).copied().unwrap_or(0)
    }

    pub fn sessions(&self) -> u64 {
        self.state().sessions
    }

    /// Fraction of sessions that presented the item, in `[0, 1]`.
    pub fn exposure_rate(&self, item_id: &str) -> f64 {
        let state = self.state();
        if state.sessions == 0 {
            return 0.0;
        }
        let count = state.counts.get(item_id).copied().unwrap_or(0);
        (count as f64 / state.sessions as f64).min(1.0)
    }

    pub fn reset(&self) {
        let mut state = self.state();
        state.counts.clear();
        state.sessions = 0;
    }
}

/// Relative weights for [`BalancedStrategy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceWeights {
    pub information: f64,
    pub category_diversity: f64,
    pub difficulty_fit: f64,
    pub exposure: f64,
}

impl Default for BalanceWeights {
    fn default() -> Self {
        Self {
            information: 0.4,
            category_diversity: 0.2,
            difficulty_fit: 0.2,
            exposure: 0.2,
        }
    }
}

/// Multi-criteria selection: information, category balance, difficulty fit
/// and exposure control.
pub struct BalancedStrategy {
    bank: Arc<ItemBank>,
    ledger: Option<Arc<ExposureLedger>>,
    weights: BalanceWeights,
}

impl BalancedStrategy {
    pub fn new(bank: Arc<ItemBank>) -> Self {
        Self {
            bank,
            ledger: None,
            weights: BalanceWeights::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<ExposureLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_weights(mut self, weights: BalanceWeights) -> Self {
        self.weights = weights;
        self
    }

    fn category_share(&self, category: Category, history: &[ResponseRecord]) -> f64 {
        if history.is_empty() {
            return 0.0;
        }
        let same = history
            .iter()
            .filter_map(|r| self.bank.get(&r.item_id))
            .filter(|i| i.category == category)
            .count();
        same as f64 / history.len() as f64
    }
}

impl SelectionStrategy for BalancedStrategy {
    fn score(&self, item: &Item, ability: &Ability, history: &[ResponseRecord]) -> f64 {
        // Peak 2PL information is a²/4.
        let peak = item.discrimination * item.discrimination / 4.0;
        let information = if peak > 0.0 {
            (irt::fisher_information(item, ability.theta) / peak).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let diversity = 1.0 - self.category_share(item.category, history);
        let fit = (-(item.difficulty - ability.theta).abs()).exp();
        let exposure = self
            .ledger
            .as_ref()
            .map(|l| 1.0 - l.exposure_rate(&item.id))
            .unwrap_or(1.0);

        let w = &self.weights;
        w.information * information
            + w.category_diversity * diversity
            + w.difficulty_fit * fit
            + w.exposure * exposure
    }

    fn name(&self) -> &str {
        "balanced"
    }
}
