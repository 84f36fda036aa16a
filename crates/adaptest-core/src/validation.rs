//! Psychometric validation over batches of completed sessions.

use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::bank::ItemBank;
use crate::error::{AssessmentError, AssessmentResult};
use crate::irt;
use crate::model::{Category, ResponseRecord};
use crate::session::CompletedSession;
use crate::statistics::{self, t_critical};
use crate::stopping::mean_recent_change;

/// Folds used when none are configured.
pub const DEFAULT_FOLDS: usize = 5;
/// Held-out responses per fold required by cross-validation.
pub const MIN_RESPONSES_PER_FOLD: usize = 10;
/// Difficulty window for the majority-vote predictor.
pub const NEIGHBOR_DIFFICULTY_WINDOW: f64 = 0.5;
/// Width of a stability bucket.
pub const STABILITY_BUCKET_DAYS: i64 = 7;

pub const PREDICTIVE_ACCURACY_THRESHOLD: f64 = 0.8;
pub const AGREEMENT_THRESHOLD: f64 = 0.75;
pub const TEST_RETEST_THRESHOLD: f64 = 0.8;
pub const CRONBACH_ALPHA_THRESHOLD: f64 = 0.8;

// ---------------------------------------------------------------------------
// Cross-validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub folds: usize,
    pub fold_accuracies: Vec<f64>,
    pub mean_accuracy: f64,
    pub std_dev: f64,
    /// 95 % interval with t(df = folds − 1).
    pub confidence_interval: [f64; 2],
    pub is_valid: bool,
}

/// K-fold cross-validation of a difficulty-neighbourhood majority vote.
///
/// Responses are shuffled with `seed`, so equal inputs give equal results.
pub fn cross_validate(
    responses: &[ResponseRecord],
    k: usize,
    seed: u64,
) -> AssessmentResult<CrossValidationResult> {
    if k < 2 {
        return Err(AssessmentError::Configuration(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if responses.len() < MIN_RESPONSES_PER_FOLD * k {
        return Err(AssessmentError::InsufficientData(format!(
            "{k}-fold cross-validation needs at least {} responses, got {}",
            MIN_RESPONSES_PER_FOLD * k,
            responses.len()
        )));
    }

    let mut order: Vec<usize> = (0..responses.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut fold_accuracies = Vec::with_capacity(k);
    for fold in 0..k {
        let (test, train): (Vec<_>, Vec<_>) = order
            .iter()
            .enumerate()
            .partition(|(pos, _)| pos % k == fold);
        let test: Vec<&ResponseRecord> = test.into_iter().map(|(_, &i)| &responses[i]).collect();
        let train: Vec<&ResponseRecord> =
            train.into_iter().map(|(_, &i)| &responses[i]).collect();

        let fallback = majority(train.iter().copied());
        let hits = test
            .iter()
            .filter(|held_out| {
                let neighbours = train.iter().copied().filter(|r| {
                    (r.difficulty - held_out.difficulty).abs() <= NEIGHBOR_DIFFICULTY_WINDOW
                });
                let predicted = majority(neighbours).unwrap_or(fallback.unwrap_or(true));
                predicted == held_out.correct
            })
            .count();
        fold_accuracies.push(hits as f64 / test.len() as f64);
    }

    let mean_accuracy = statistics::mean(&fold_accuracies);
    let std_dev = statistics::std_dev(&fold_accuracies);
    let margin = t_critical(k - 1, 0.95) * std_dev / (k as f64).sqrt();

    Ok(CrossValidationResult {
        folds: k,
        fold_accuracies,
        mean_accuracy,
        std_dev,
        confidence_interval: [mean_accuracy - margin, mean_accuracy + margin],
        is_valid: mean_accuracy > PREDICTIVE_ACCURACY_THRESHOLD,
    })
}

/// Majority correctness; ties predict correct, no votes predict nothing.
fn majority<'a>(responses: impl Iterator<Item = &'a ResponseRecord>) -> Option<bool> {
    let (mut correct, mut total) = (0usize, 0usize);
    for r in responses {
        total += 1;
        if r.correct {
            correct += 1;
        }
    }
    (total > 0).then(|| 2 * correct >= total)
}

// ---------------------------------------------------------------------------
// Aggregate metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            cv_folds: DEFAULT_FOLDS,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub cronbach_alpha: f64,
    pub test_retest_reliability: f64,
    pub predictive_accuracy: f64,
    pub user_system_agreement: f64,
    pub convergence_rate: f64,
    pub stability_index: f64,
    pub session_count: usize,
    pub response_count: usize,
    #[serde(default)]
    pub cross_validation: Option<CrossValidationResult>,
}

/// Compute every metric over a corpus of completed sessions.
///
/// Metrics that cannot be computed from the corpus are reported as 0.
pub fn compute_validation_metrics(
    sessions: &[CompletedSession],
    bank: &ItemBank,
    options: &ValidationOptions,
) -> ValidationMetrics {
    let responses: Vec<ResponseRecord> = sessions
        .iter()
        .flat_map(|s| s.responses.iter().cloned())
        .collect();

    let cross_validation = match cross_validate(&responses, options.cv_folds, options.seed) {
        Ok(cv) => Some(cv),
        Err(e) => {
            tracing::warn!("skipping predictive accuracy: {e}");
            None
        }
    };

    ValidationMetrics {
        cronbach_alpha: category_alpha(sessions, bank),
        test_retest_reliability: test_retest_reliability(sessions),
        predictive_accuracy: cross_validation
            .as_ref()
            .map(|cv| cv.mean_accuracy)
            .unwrap_or(0.0),
        user_system_agreement: user_system_agreement(sessions, bank),
        convergence_rate: convergence_rate(sessions),
        stability_index: stability_index(sessions),
        session_count: sessions.len(),
        response_count: responses.len(),
        cross_validation,
    }
}

/// Mean of per-category alphas.
///
/// A category contributes when at least two items were each answered by at
/// least two sessions that answered two or more of its items. Unanswered
/// cells are filled with the item mean.
pub fn category_alpha(sessions: &[CompletedSession], bank: &ItemBank) -> f64 {
    let mut alphas = Vec::new();
    for category in Category::ALL {
        let per_session: Vec<HashMap<&str, f64>> = sessions
            .iter()
            .map(|s| {
                s.responses
                    .iter()
                    .filter(|r| bank.get(&r.item_id).is_some_and(|i| i.category == category))
                    .map(|r| (r.item_id.as_str(), r.response))
                    .collect::<HashMap<_, _>>()
            })
            .filter(|answers| answers.len() >= 2)
            .collect();
        if per_session.len() < 2 {
            continue;
        }

        let mut coverage: BTreeMap<&str, usize> = BTreeMap::new();
        for answers in &per_session {
            for id in answers.keys() {
                *coverage.entry(*id).or_insert(0) += 1;
            }
        }
        let matrix: Vec<Vec<f64>> = coverage
            .into_iter()
            .filter(|(_, n)| *n >= 2)
            .map(|(id, _)| {
                let observed: Vec<f64> =
                    per_session.iter().filter_map(|a| a.get(id).copied()).collect();
                let fill = statistics::mean(&observed);
                per_session
                    .iter()
                    .map(|a| a.get(id).copied().unwrap_or(fill))
                    .collect()
            })
            .collect();

        match statistics::cronbach_alpha(&matrix) {
            Ok(alpha) => alphas.push(alpha),
            Err(e) => tracing::debug!(%category, "no alpha: {e}"),
        }
    }

    if alphas.is_empty() {
        tracing::warn!("no category had enough overlapping responses for cronbach's alpha");
        return 0.0;
    }
    statistics::mean(&alphas)
}

/// `1 − mean|Δθ| / 2` over consecutive sessions of the same respondent.
pub fn test_retest_reliability(sessions: &[CompletedSession]) -> f64 {
    let mut by_respondent: HashMap<&str, Vec<&CompletedSession>> = HashMap::new();
    for s in sessions {
        by_respondent.entry(&s.respondent_id).or_default().push(s);
    }

    let mut deltas = Vec::new();
    for group in by_respondent.values_mut() {
        group.sort_by_key(|s| s.start_time);
        deltas.extend(
            group
                .windows(2)
                .map(|w| (w[1].final_theta() - w[0].final_theta()).abs()),
        );
    }

    if deltas.is_empty() {
        tracing::warn!("no respondent has repeated sessions; test-retest reliability is 0");
        return 0.0;
    }
    (1.0 - statistics::mean(&deltas) / 2.0).clamp(0.0, 1.0)
}

/// One minus the mean normalised gap between model-expected and actual
/// responses at each session's final θ.
pub fn user_system_agreement(sessions: &[CompletedSession], bank: &ItemBank) -> f64 {
    let deviations: Vec<f64> = sessions
        .iter()
        .flat_map(|s| {
            let theta = s.final_theta();
            s.responses.iter().filter_map(move |r| {
                let item = bank.get(&r.item_id)?;
                let span = item.scale.span();
                let expected = item.scale.min + irt::probability(item, theta) * span;
                Some((expected - r.response).abs() / span)
            })
        })
        .collect();

    if deviations.is_empty() {
        return 0.0;
    }
    (1.0 - statistics::mean(&deviations)).clamp(0.0, 1.0)
}

/// Fraction of sessions whose last three θ changes average below 0.1.
pub fn convergence_rate(sessions: &[CompletedSession]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    let converged = sessions
        .iter()
        .filter(|s| mean_recent_change(&s.theta_trajectory(), 3).is_some_and(|m| m < 0.1))
        .count();
    converged as f64 / sessions.len() as f64
}

/// `1 / (1 + mean drift)` of mean final θ across 7-day buckets.
pub fn stability_index(sessions: &[CompletedSession]) -> f64 {
    let Some(earliest) = sessions.iter().map(|s| s.start_time).min() else {
        return 0.0;
    };
    let width = Duration::days(STABILITY_BUCKET_DAYS);

    let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for s in sessions {
        let bucket = (s.start_time - earliest).num_seconds() / width.num_seconds();
        buckets.entry(bucket).or_default().push(s.final_theta());
    }

    let means: Vec<f64> = buckets.values().map(|v| statistics::mean(v)).collect();
    if means.len() < 2 {
        return 1.0;
    }
    let drift: Vec<f64> = means.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    1.0 / (1.0 + statistics::mean(&drift))
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub name: String,
    pub value: f64,
    pub threshold: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScientificValidation {
    pub passed: bool,
    pub criteria: Vec<CriterionResult>,
    pub recommendations: Vec<String>,
}

/// Check metrics against fixed thresholds, recommending a fix for each
/// failure.
pub fn validate_scientific_criteria(metrics: &ValidationMetrics) -> ScientificValidation {
    let checks = [
        (
            "predictive_accuracy",
            metrics.predictive_accuracy,
            PREDICTIVE_ACCURACY_THRESHOLD,
            "Improve predictive accuracy: recalibrate item difficulties against observed responses.",
        ),
        (
            "user_system_agreement",
            metrics.user_system_agreement,
            AGREEMENT_THRESHOLD,
            "Improve user-system agreement: review items whose responses drift from the model's expectation.",
        ),
        (
            "test_retest_reliability",
            metrics.test_retest_reliability,
            TEST_RETEST_THRESHOLD,
            "Improve test-retest reliability: collect repeated sessions and tighten the target precision.",
        ),
        (
            "cronbach_alpha",
            metrics.cronbach_alpha,
            CRONBACH_ALPHA_THRESHOLD,
            "Improve internal consistency: revise or remove items that correlate weakly within their category.",
        ),
    ];

    let mut criteria = Vec::with_capacity(checks.len());
    let mut recommendations = Vec::new();
    for (name, value, threshold, advice) in checks {
        let passed = value > threshold;
        if !passed {
            recommendations.push(format!("{advice} ({name} = {value:.3}, needs > {threshold})"));
        }
        criteria.push(CriterionResult {
            name: name.to_string(),
            value,
            threshold,
            passed,
        });
    }

    ScientificValidation {
        passed: recommendations.is_empty(),
        criteria,
        recommendations,
    }
}
