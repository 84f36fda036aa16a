//! Respondent abstraction used by the simulation engine.
//!
//! Implementations live in `adaptest-respondents`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::Item;

/// Anything that can answer a presented item.
#[async_trait]
pub trait Respondent: Send + Sync {
    /// Stable respondent identifier.
    fn id(&self) -> &str;

    /// Answer one item.
    async fn respond(&self, request: &ItemRequest) -> anyhow::Result<RespondentAnswer>;

    /// Latent trait the respondent answers from, when known.
    ///
    /// Simulated respondents expose it so runs can report recovery error.
    fn true_theta(&self) -> Option<f64> {
        None
    }
}

/// An item presented during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub session_id: String,
    pub respondent_id: String,
    /// 1-based position of the item within the session.
    pub sequence: usize,
    pub item: Item,
}

/// A respondent's answer to an [`ItemRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RespondentAnswer {
    pub response: f64,
    pub time_spent_secs: f64,
}
