//! Adaptive session controller.
//!
//! Orchestrates the item bank, estimator, selector and stopping rules into a
//! per-respondent state machine:
//!
//! ```text
//! Created -> Active -> { Active | Converged } -> Complete
//! ```
//!
//! The controller exclusively owns every live session. A session is driven by
//! one caller at a time; distinct controllers may run in parallel over the
//! same `Arc<ItemBank>`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use crate::bank::ItemBank;
use crate::error::{AssessmentError, AssessmentResult};
use crate::estimator::estimate_ability_from;
use crate::model::{Ability, Item, ResponseRecord};
use crate::selection::{select_next_item, ExposureLedger, MaxInformation, SelectionStrategy};
use crate::session::{
    AdaptiveSession, CompletedSession, SessionDiagnostics, SessionOptions, SessionState,
};
use crate::stopping::StopReason;
use crate::store::AbilityStore;

/// Drives adaptive sessions against one item bank.
pub struct AdaptiveController {
    bank: Arc<ItemBank>,
    store: Arc<dyn AbilityStore>,
    strategy: Arc<dyn SelectionStrategy>,
    ledger: Option<Arc<ExposureLedger>>,
    sessions: HashMap<String, AdaptiveSession>,
    /// Ids of sessions already handed back by `complete_session`.
    released: HashSet<String>,
}

impl AdaptiveController {
    pub fn new(bank: Arc<ItemBank>, store: Arc<dyn AbilityStore>) -> Self {
        Self {
            bank,
            store,
            strategy: Arc::new(MaxInformation),
            ledger: None,
            sessions: HashMap::new(),
            released: HashSet::new(),
        }
    }

    /// Replace the default maximum-information strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Record sessions and presented items in an exposure ledger.
    pub fn with_exposure_ledger(mut self, ledger: Arc<ExposureLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn bank(&self) -> &ItemBank {
        &self.bank
    }

    /// Start a session under an externally generated id.
    ///
    /// The starting θ is `options.initial_theta`, else the respondent's stored
    /// ability, else 0.
    pub fn start_session(
        &mut self,
        session_id: impl Into<String>,
        respondent_id: impl Into<String>,
        options: SessionOptions,
    ) -> AssessmentResult<&AdaptiveSession> {
        options.validate()?;
        let session_id = session_id.into();
        let respondent_id = respondent_id.into();

        if self.sessions.contains_key(&session_id) || self.released.contains(&session_id) {
            return Err(AssessmentError::Configuration(format!(
                "session id already in use: {session_id}"
            )));
        }

        let start_theta = options
            .initial_theta
            .or_else(|| self.store.load(&respondent_id).map(|a| a.theta))
            .unwrap_or(0.0);

        tracing::info!(
            session = %session_id,
            respondent = %respondent_id,
            start_theta,
            max_questions = options.max_questions,
            target_precision = options.target_precision,
            "session started"
        );

        if let Some(ledger) = &self.ledger {
            ledger.record_session();
        }

        let session = AdaptiveSession::new(session_id.clone(), respondent_id, &options, start_theta);
        Ok(self.sessions.entry(session_id).or_insert(session))
    }

    /// Next item to present, or `None` once the session is over.
    ///
    /// Stops the session when a stopping rule fires or the pool is empty. The
    /// stopped session stays readable until [`complete_session`] releases it.
    ///
    /// [`complete_session`]: AdaptiveController::complete_session
    pub fn select_next_question(&mut self, session_id: &str) -> Option<Item> {
        let session = self.sessions.get(session_id)?;
        if session.is_complete {
            return None;
        }

        if let Some(reason) = session.stop_decision() {
            self.stop(session_id, reason);
            return None;
        }

        let next = select_next_item(
            &self.bank,
            &session.final_ability,
            &session.responses,
            self.strategy.as_ref(),
        )
        .cloned();

        match next {
            Some(item) => {
                tracing::debug!(
                    session = %session_id,
                    item = %item.id,
                    strategy = self.strategy.name(),
                    theta = session.current_theta,
                    "selected item"
                );
                if let Some(ledger) = &self.ledger {
                    ledger.record(&item.id);
                }
                Some(item)
            }
            None => {
                self.stop(session_id, StopReason::PoolExhausted);
                None
            }
        }
    }

    /// Record an answer and re-estimate θ over the full history.
    ///
    /// Every re-estimation starts from the session's starting θ, so the
    /// result depends only on the history and that start.
    ///
    /// Returns `Ok(None)` when the session is unknown or already complete.
    /// Unknown items and out-of-scale responses fail without touching the
    /// session.
    pub fn process_response(
        &mut self,
        session_id: &str,
        item_id: &str,
        response: f64,
        time_spent_secs: f64,
    ) -> AssessmentResult<Option<Ability>> {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Ok(None);
        };
        if session.is_complete {
            return Ok(None);
        }

        let item = self.bank.require(item_id)?;
        if !item.scale.contains(response) {
            return Err(AssessmentError::ResponseOutOfRange {
                item_id: item.id.clone(),
                response,
                min: item.scale.min,
                max: item.scale.max,
            });
        }
        if !(time_spent_secs.is_finite() && time_spent_secs >= 0.0) {
            return Err(AssessmentError::Configuration(format!(
                "time spent must be a non-negative number of seconds, got {time_spent_secs}"
            )));
        }

        session
            .responses
            .push(ResponseRecord::new(item, response, time_spent_secs, Utc::now()));

        let previous = session.current_theta;
        let estimate =
            estimate_ability_from(session.initial_theta(), &session.responses, &self.bank);

        session.current_theta = estimate.theta;
        session.theta_trajectory.push(estimate.theta);
        session.precision_trajectory.push(estimate.standard_error);
        session.final_ability = Ability::new(
            session.respondent_id.clone(),
            estimate.theta,
            estimate.standard_error,
            session.responses.clone(),
        );

        let rule = session.stopping_rule();
        session.state = if (estimate.theta - previous).abs() < rule.convergence_threshold {
            SessionState::Converged
        } else {
            SessionState::Active
        };

        tracing::debug!(
            session = %session_id,
            item = %item_id,
            response,
            theta = estimate.theta,
            se = estimate.standard_error,
            iterations = estimate.iterations,
            "re-estimated ability"
        );

        Ok(Some(session.final_ability.clone()))
    }

    /// Mark a session terminal, hand its final ability to the store and
    /// release it.
    ///
    /// Returns the session record by value. Only the id is kept afterwards, so
    /// it cannot be reused; completing it again returns `None`.
    pub fn complete_session(&mut self, session_id: &str) -> Option<CompletedSession> {
        let reason = {
            let session = self.sessions.get(session_id)?;
            session
                .stop_reason
                .or_else(|| session.stop_decision())
                .unwrap_or(StopReason::Manual)
        };
        self.stop(session_id, reason);

        let session = self.sessions.remove(session_id)?;
        self.released.insert(session_id.to_string());

        let record = CompletedSession::from_session(session, reason);
        tracing::info!(
            session = %session_id,
            respondent = %record.respondent_id,
            answered = record.responses.len(),
            theta = record.final_ability.theta,
            se = record.final_ability.standard_error,
            %reason,
            "session complete"
        );
        Some(record)
    }

    /// Make a live session terminal and persist its ability once.
    fn stop(&mut self, session_id: &str, reason: StopReason) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        if session.is_complete {
            return;
        }
        session.is_complete = true;
        session.state = SessionState::Complete;
        session.stop_reason = Some(reason);
        session.final_ability.last_updated = Utc::now();

        if let Err(e) = self.store.save(session.final_ability.clone()) {
            tracing::error!(session = %session_id, "failed to persist final ability: {e:#}");
        }
        tracing::debug!(session = %session_id, %reason, "session stopped");
    }

    /// A session that has not been released yet.
    pub fn session(&self, session_id: &str) -> Option<&AdaptiveSession> {
        self.sessions.get(session_id)
    }

    pub fn is_complete(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map_or_else(|| self.released.contains(session_id), |s| s.is_complete)
    }

    /// Diagnostics for a session that has not been released yet.
    pub fn diagnostics(&self, session_id: &str) -> Option<SessionDiagnostics> {
        self.sessions.get(session_id).map(AdaptiveSession::diagnostics)
    }

    /// Sessions held in memory, including stopped ones not yet released.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
