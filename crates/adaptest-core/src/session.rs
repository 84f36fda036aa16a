//! Adaptive session state.
//!
//! A session is owned exclusively by the controller until it is released.
//! Released sessions become a [`CompletedSession`] record that is never
//! mutated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, AssessmentResult};
use crate::model::{Ability, ResponseRecord};
use crate::stopping::{StopReason, StoppingRule};

/// Default target standard error.
pub const DEFAULT_TARGET_PRECISION: f64 = 0.3;
/// Default question budget.
pub const DEFAULT_MAX_QUESTIONS: usize = 15;
/// Answers required before a session may stop on precision or convergence.
pub const MIN_QUESTIONS: usize = 5;

/// Options accepted when starting a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub target_precision: f64,
    pub max_questions: usize,
    /// Explicit starting θ, overriding any stored prior.
    #[serde(default)]
    pub initial_theta: Option<f64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            target_precision: DEFAULT_TARGET_PRECISION,
            max_questions: DEFAULT_MAX_QUESTIONS,
            initial_theta: None,
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> AssessmentResult<()> {
        if !(self.target_precision.is_finite() && self.target_precision > 0.0) {
            return Err(AssessmentError::Configuration(format!(
                "target_precision must be > 0, got {}",
                self.target_precision
            )));
        }
        if self.max_questions == 0 {
            return Err(AssessmentError::Configuration(
                "max_questions must be > 0".into(),
            ));
        }
        if let Some(theta) = self.initial_theta {
            if !theta.is_finite() {
                return Err(AssessmentError::Configuration(format!(
                    "initial_theta must be finite, got {theta}"
                )));
            }
        }
        Ok(())
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Started, no answers yet.
    Created,
    /// Collecting answers.
    Active,
    /// The last re-estimation barely moved θ.
    Converged,
    /// Terminal.
    Complete,
}

/// A live adaptive session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveSession {
    pub session_id: String,
    pub respondent_id: String,
    pub start_time: DateTime<Utc>,
    pub current_theta: f64,
    pub target_precision: f64,
    pub max_questions: usize,
    pub min_questions: usize,
    pub responses: Vec<ResponseRecord>,
    pub is_complete: bool,
    pub state: SessionState,
    pub final_ability: Ability,
    /// Starting θ followed by the θ after each answer.
    pub theta_trajectory: Vec<f64>,
    /// Standard error after each answer.
    pub precision_trajectory: Vec<f64>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
}

impl AdaptiveSession {
    pub(crate) fn new(
        session_id: String,
        respondent_id: String,
        options: &SessionOptions,
        start_theta: f64,
    ) -> Self {
        let ability = Ability::initial(respondent_id.clone(), start_theta);
        Self {
            session_id,
            respondent_id,
            start_time: Utc::now(),
            current_theta: ability.theta,
            target_precision: options.target_precision,
            max_questions: options.max_questions,
            min_questions: MIN_QUESTIONS,
            responses: Vec::new(),
            is_complete: false,
            state: SessionState::Created,
            theta_trajectory: vec![ability.theta],
            precision_trajectory: Vec::new(),
            final_ability: ability,
            stop_reason: None,
        }
    }

    pub fn questions_answered(&self) -> usize {
        self.responses.len()
    }

    /// θ the session started from.
    pub fn initial_theta(&self) -> f64 {
        self.theta_trajectory.first().copied().unwrap_or(0.0)
    }

    pub fn has_answered(&self, item_id: &str) -> bool {
        self.responses.iter().any(|r| r.item_id == item_id)
    }

    pub fn stopping_rule(&self) -> StoppingRule {
        StoppingRule {
            max_questions: self.max_questions,
            target_precision: self.target_precision,
            min_questions: self.min_questions,
            ..StoppingRule::default()
        }
    }

    /// Current stopping decision, ignoring pool exhaustion.
    pub fn stop_decision(&self) -> Option<StopReason> {
        let standard_error = if self.responses.is_empty() {
            f64::INFINITY
        } else {
            self.final_ability.standard_error
        };
        self.stopping_rule().evaluate(
            self.responses.len(),
            standard_error,
            &self.theta_trajectory,
        )
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics::from_parts(
            &self.responses,
            &self.theta_trajectory,
            &self.precision_trajectory,
            self.is_complete,
        )
    }
}

/// Per-session diagnostics for display and analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    pub questions_answered: usize,
    /// Mean seconds spent per answered item (0 with no answers).
    pub average_time_per_question: f64,
    /// Difficulty of each answered item, in order.
    pub difficulty_progression: Vec<f64>,
    /// θ after each answer, in order.
    pub ability_progression: Vec<f64>,
    /// Standard error after each answer, in order.
    pub precision_progression: Vec<f64>,
    /// Latest standard error (1.0 with no answers).
    pub final_precision: f64,
    pub is_complete: bool,
}

impl SessionDiagnostics {
    fn from_parts(
        responses: &[ResponseRecord],
        theta_trajectory: &[f64],
        precision_trajectory: &[f64],
        is_complete: bool,
    ) -> Self {
        let n = responses.len();
        let average_time_per_question = if n == 0 {
            0.0
        } else {
            responses.iter().map(|r| r.time_spent_secs).sum::<f64>() / n as f64
        };
        Self {
            questions_answered: n,
            average_time_per_question,
            difficulty_progression: responses.iter().map(|r| r.difficulty).collect(),
            ability_progression: theta_trajectory.iter().skip(1).copied().collect(),
            precision_progression: precision_trajectory.to_vec(),
            final_precision: precision_trajectory.last().copied().unwrap_or(1.0),
            is_complete,
        }
    }
}

/// The immutable record of a finished session.
///
/// This is what validation consumes: a corpus of completed sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub session_id: String,
    pub respondent_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub initial_theta: f64,
    pub final_ability: Ability,
    pub responses: Vec<ResponseRecord>,
    /// θ after each answer.
    pub ability_progression: Vec<f64>,
    /// Standard error after each answer.
    pub precision_progression: Vec<f64>,
    pub stop_reason: StopReason,
    pub is_complete: bool,
}

impl CompletedSession {
    pub(crate) fn from_session(session: AdaptiveSession, reason: StopReason) -> Self {
        let initial_theta = session.initial_theta();
        Self {
            session_id: session.session_id,
            respondent_id: session.respondent_id,
            start_time: session.start_time,
            end_time: Utc::now(),
            initial_theta,
            final_ability: session.final_ability,
            responses: session.responses,
            ability_progression: session.theta_trajectory.into_iter().skip(1).collect(),
            precision_progression: session.precision_trajectory,
            stop_reason: reason,
            is_complete: true,
        }
    }

    pub fn final_theta(&self) -> f64 {
        self.final_ability.theta
    }

    /// Starting θ followed by the θ after each answer.
    pub fn theta_trajectory(&self) -> Vec<f64> {
        std::iter::once(self.initial_theta)
            .chain(self.ability_progression.iter().copied())
            .collect()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics::from_parts(
            &self.responses,
            &self.theta_trajectory(),
            &self.precision_progression,
            self.is_complete,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.target_precision, 0.3);
        assert_eq!(options.max_questions, 15);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn invalid_options_rejected() {
        let zero = SessionOptions {
            max_questions: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(AssessmentError::Configuration(_))
        ));

        let negative = SessionOptions {
            target_precision: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(AssessmentError::Configuration(_))
        ));

        let nan_theta = SessionOptions {
            initial_theta: Some(f64::NAN),
            ..Default::default()
        };
        assert!(nan_theta.validate().is_err());
    }

    #[test]
    fn new_session_is_created() {
        let session = AdaptiveSession::new("s1".into(), "r1".into(), &SessionOptions::default(), 0.4);
        assert_eq!(session.state, SessionState::Created);
        assert_eq!(session.theta_trajectory, vec![0.4]);
        assert_eq!(session.min_questions, MIN_QUESTIONS);
        assert!(session.stop_decision().is_none());

        let diag = session.diagnostics();
        assert_eq!(diag.questions_answered, 0);
        assert_eq!(diag.average_time_per_question, 0.0);
        assert_eq!(diag.final_precision, 1.0);
    }
}
