//! Three-parameter logistic item response model.
//!
//! P(θ) = c + (1 − c) / (1 + e^(−a(θ − b)))

use crate::model::Item;

#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

/// Probability of a "correct" (above-midpoint) response at `theta`.
#[inline]
pub fn probability(item: &Item, theta: f64) -> f64 {
    let c = item.guessing;
    let z = item.discrimination * (theta - item.difficulty);
    (c + (1.0 - c) * sigmoid(z)).clamp(0.0, 1.0)
}

/// First derivative of [`probability`] with respect to θ.
#[inline]
pub fn probability_derivative(item: &Item, theta: f64) -> f64 {
    let a = item.discrimination;
    let c = item.guessing;
    let e = (-a * (theta - item.difficulty)).exp();
    a * (1.0 - c) * e / ((1.0 + e) * (1.0 + e))
}

/// Fisher information of `item` at `theta`.
///
/// Returns 0 whenever the computation is not finite: items the respondent is
/// certain to pass or fail carry no information.
#[inline]
pub fn fisher_information(item: &Item, theta: f64) -> f64 {
    let p = probability(item, theta);
    let dp = probability_derivative(item, theta);
    let info = (dp * dp) / (p * (1.0 - p));
    if info.is_finite() {
        info.max(0.0)
    } else {
        0.0
    }
}

/// Total information of a set of items at `theta`.
pub fn test_information<'a>(items: impl IntoIterator<Item = &'a Item>, theta: f64) -> f64 {
    items
        .into_iter()
        .map(|item| fisher_information(item, theta))
        .sum()
}

/// Log-likelihood of one binary outcome.
#[inline]
pub fn log_likelihood(item: &Item, theta: f64, correct: bool) -> f64 {
    const FLOOR: f64 = 1e-10;
    let p = probability(item, theta).clamp(FLOOR, 1.0 - FLOOR);
    if correct {
        p.ln()
    } else {
        (1.0 - p).ln()
    }
}

/// First and second θ-derivatives of one outcome's log-likelihood.
///
/// L′ = a(P − c)(u − P) / (P(1 − c))
/// L″ = a²(P − c)(1 − P)(uc − P²) / (P²(1 − c)²)
///
/// Both are returned as 0 when not finite.
#[inline]
pub fn log_likelihood_derivatives(item: &Item, theta: f64, correct: bool) -> (f64, f64) {
    let a = item.discrimination;
    let c = item.guessing;
    let u = if correct { 1.0 } else { 0.0 };
    let p = probability(item, theta);
    let q = 1.0 - p;
    let one_minus_c = 1.0 - c;

    let first = a * (p - c) * (u - p) / (p * one_minus_c);
    let second = a * a * (p - c) * q * (u * c - p * p) / (p * p * one_minus_c * one_minus_c);

    (
        if first.is_finite() { first } else { 0.0 },
        if second.is_finite() { second } else { 0.0 },
    )
}
