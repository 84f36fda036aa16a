//! Stopping rules for adaptive sessions.

use serde::{Deserialize, Serialize};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The question budget was used up.
    MaxQuestions,
    /// The standard error reached the target precision.
    TargetPrecision,
    /// θ stopped moving between re-estimations.
    Converged,
    /// Every bank item has been answered.
    PoolExhausted,
    /// The caller completed the session explicitly.
    Manual,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::MaxQuestions => "max questions reached",
            StopReason::TargetPrecision => "target precision reached",
            StopReason::Converged => "estimate converged",
            StopReason::PoolExhausted => "item pool exhausted",
            StopReason::Manual => "completed by caller",
        };
        f.write_str(s)
    }
}

/// Thresholds consulted after every answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoppingRule {
    pub max_questions: usize,
    pub target_precision: f64,
    /// Never stop on precision or convergence before this many answers.
    pub min_questions: usize,
    /// Answers required before the convergence heuristic applies.
    pub convergence_min_questions: usize,
    /// Number of trailing θ changes averaged by the heuristic.
    pub convergence_window: usize,
    /// Mean |Δθ| under which the estimate counts as converged.
    pub convergence_threshold: f64,
}

impl Default for StoppingRule {
    fn default() -> Self {
        Self {
            max_questions: 15,
            target_precision: 0.3,
            min_questions: 5,
            convergence_min_questions: 8,
            convergence_window: 3,
            convergence_threshold: 0.1,
        }
    }
}

impl StoppingRule {
    /// Decide whether to stop.
    ///
    /// `theta_trajectory` holds the starting θ followed by the θ after each
    /// answer, so its consecutive differences are the incremental changes.
    pub fn evaluate(
        &self,
        answered: usize,
        standard_error: f64,
        theta_trajectory: &[f64],
    ) -> Option<StopReason> {
        if answered >= self.max_questions {
            return Some(StopReason::MaxQuestions);
        }
        if answered < self.min_questions {
            return None;
        }
        if standard_error <= self.target_precision {
            return Some(StopReason::TargetPrecision);
        }
        if answered >= self.convergence_min_questions {
            if let Some(mean) = mean_recent_change(theta_trajectory, self.convergence_window) {
                if mean < self.convergence_threshold {
                    return Some(StopReason::Converged);
                }
            }
        }
        None
    }
}

/// Mean absolute θ change over the last `window` steps of a trajectory.
///
/// `None` when the trajectory has fewer than `window` steps.
pub fn mean_recent_change(theta_trajectory: &[f64], window: usize) -> Option<f64> {
    if window == 0 || theta_trajectory.len() < window + 1 {
        return None;
    }
    let tail = &theta_trajectory[theta_trajectory.len() - window - 1..];
    let total: f64 = tail.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    Some(total / window as f64)
}
