//! Mock respondent for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use adaptest_core::traits::{ItemRequest, Respondent, RespondentAnswer};

use crate::error::RespondentError;

/// Seconds reported per answer unless configured.
pub const DEFAULT_TIME_SPENT_SECS: f64 = 5.0;

/// A scripted respondent.
///
/// Answers from a per-item script, falling back to a fixed response. A
/// response outside the item's scale is clamped onto it.
pub struct MockRespondent {
    id: String,
    /// Map of item id → response.
    responses: HashMap<String, f64>,
    /// Response for unscripted items; `None` makes them an error.
    default_response: Option<f64>,
    time_spent_secs: f64,
    /// Fail every request after this many answers.
    fail_after: Option<u32>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ItemRequest>>,
}

impl MockRespondent {
    /// A respondent that only answers scripted items.
    pub fn new(id: impl Into<String>, responses: HashMap<String, f64>) -> Self {
        Self {
            id: id.into(),
            responses,
            default_response: None,
            time_spent_secs: DEFAULT_TIME_SPENT_SECS,
            fail_after: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A respondent that gives the same response to every item.
    pub fn with_fixed_response(id: impl Into<String>, response: f64) -> Self {
        Self {
            default_response: Some(response),
            ..Self::new(id, HashMap::new())
        }
    }

    pub fn with_time_spent(mut self, secs: f64) -> Self {
        self.time_spent_secs = secs;
        self
    }

    /// Stop answering after `n` answers.
    pub fn failing_after(mut self, n: u32) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Get the number of calls made to this respondent.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this respondent.
    pub fn last_request(&self) -> Option<ItemRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Respondent for MockRespondent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn respond(&self, request: &ItemRequest) -> anyhow::Result<RespondentAnswer> {
        let answered = self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        if self.fail_after.is_some_and(|limit| answered >= limit) {
            return Err(RespondentError::Unavailable {
                id: self.id.clone(),
                answered,
            }
            .into());
        }

        let item = &request.item;
        let response = self
            .responses
            .get(&item.id)
            .copied()
            .or(self.default_response)
            .ok_or_else(|| RespondentError::NoAnswer {
                id: self.id.clone(),
                item_id: item.id.clone(),
            })?;

        Ok(RespondentAnswer {
            response: response.clamp(item.scale.min, item.scale.max),
            time_spent_secs: self.time_spent_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::model::{Category, Item, ResponseScale};

    fn request(item_id: &str) -> ItemRequest {
        ItemRequest {
            session_id: "s".into(),
            respondent_id: "mock".into(),
            sequence: 1,
            item: Item::new(item_id, Category::Ativacao, 0.0, 1.0, 0.0, ResponseScale::likert5())
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let mock = MockRespondent::with_fixed_response("mock", 4.0);
        let answer = mock.respond(&request("q1")).await.unwrap();
        assert_eq!(answer.response, 4.0);
        assert_eq!(answer.time_spent_secs, DEFAULT_TIME_SPENT_SECS);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.last_request().unwrap().item.id, "q1");
    }

    #[tokio::test]
    async fn scripted_responses() {
        let mut script = HashMap::new();
        script.insert("q1".to_string(), 2.0);
        script.insert("q2".to_string(), 9.0);
        let mock = MockRespondent::new("mock", script).with_time_spent(1.5);

        let a = mock.respond(&request("q1")).await.unwrap();
        assert_eq!(a.response, 2.0);
        assert_eq!(a.time_spent_secs, 1.5);

        // Clamped onto the 1..5 scale.
        let b = mock.respond(&request("q2")).await.unwrap();
        assert_eq!(b.response, 5.0);

        let err = mock.respond(&request("q3")).await.unwrap_err();
        assert!(err.to_string().contains("no answer for item q3"));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn fails_after_limit() {
        let mock = MockRespondent::with_fixed_response("mock", 3.0).failing_after(2);
        assert!(mock.respond(&request("a")).await.is_ok());
        assert!(mock.respond(&request("b")).await.is_ok());
        let err = mock.respond(&request("c")).await.unwrap_err();
        assert!(err.to_string().contains("unavailable after 2 answers"));
    }
}
