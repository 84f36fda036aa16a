//! Maximum-likelihood ability estimation via Newton-Raphson.
//!
//! The estimator is a pure function of the response history and the bank:
//! the same inputs always produce the same θ and standard error.

use serde::{Deserialize, Serialize};

use crate::bank::ItemBank;
use crate::irt;
use crate::model::{Item, ResponseRecord, THETA_MAX, THETA_MIN};

/// Maximum Newton-Raphson iterations.
pub const MAX_ITERATIONS: usize = 50;
/// Convergence tolerance on |Δθ|.
pub const CONVERGENCE_TOLERANCE: f64 = 0.001;
/// Below this |L″| the iteration stops instead of dividing.
pub const MIN_SECOND_DERIVATIVE: f64 = 1e-4;
/// Standard error reported when there is no information at all.
pub const MAX_STANDARD_ERROR: f64 = 1.0;

/// Result of one estimation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub standard_error: f64,
    /// Newton-Raphson steps taken.
    pub iterations: usize,
    /// `true` when |Δθ| fell under the tolerance.
    pub converged: bool,
}

/// Estimate θ from a response history, starting at θ = 0.
pub fn estimate_ability_mle(history: &[ResponseRecord], bank: &ItemBank) -> AbilityEstimate {
    estimate_ability_from(0.0, history, bank)
}

/// Estimate θ from a response history, starting at `start`.
///
/// Records whose item is no longer in the bank are ignored.
pub fn estimate_ability_from(
    start: f64,
    history: &[ResponseRecord],
    bank: &ItemBank,
) -> AbilityEstimate {
    let answered: Vec<(&Item, bool)> = history
        .iter()
        .filter_map(|r| bank.get(&r.item_id).map(|item| (item, r.correct)))
        .collect();

    let start = start.clamp(THETA_MIN, THETA_MAX);
    if answered.is_empty() {
        return AbilityEstimate {
            theta: start,
            standard_error: MAX_STANDARD_ERROR,
            iterations: 0,
            converged: false,
        };
    }

    let mut theta = start;
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..MAX_ITERATIONS {
        let (first, second) = answered
            .iter()
            .map(|(item, correct)| irt::log_likelihood_derivatives(item, theta, *correct))
            .fold((0.0, 0.0), |(d1, d2), (a, b)| (d1 + a, d2 + b));

        if second.abs() < MIN_SECOND_DERIVATIVE {
            tracing::debug!(theta, second, "flat likelihood, stopping Newton-Raphson");
            break;
        }

        iterations += 1;
        let next = (theta - first / second).clamp(THETA_MIN, THETA_MAX);
        let delta = (next - theta).abs();
        theta = next;

        if delta < CONVERGENCE_TOLERANCE {
            converged = true;
            break;
        }
    }

    let standard_error = standard_error_for(answered.iter().map(|(item, _)| *item), theta);

    AbilityEstimate {
        theta,
        standard_error,
        iterations,
        converged,
    }
}

/// Standard error of θ given the answered items: 1/√ΣI(θ).
///
/// Returns [`MAX_STANDARD_ERROR`] when the items carry no information.
pub fn standard_error_for<'a>(items: impl IntoIterator<Item = &'a Item>, theta: f64) -> f64 {
    let information = irt::test_information(items, theta);
    if information > 0.0 {
        1.0 / information.sqrt()
    } else {
        MAX_STANDARD_ERROR
    }
}

/// Standard error for a response history evaluated at `theta`.
pub fn standard_error(history: &[ResponseRecord], bank: &ItemBank, theta: f64) -> f64 {
    standard_error_for(history.iter().filter_map(|r| bank.get(&r.item_id)), theta)
}
