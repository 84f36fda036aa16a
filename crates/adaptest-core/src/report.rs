//! Psychometric report with JSON persistence and regression detection.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bank::{BankSummary, ItemBank};
use crate::model::Category;
use crate::session::CompletedSession;
use crate::statistics::{self, ConfidenceInterval, TTestResult};
use crate::validation::{
    compute_validation_metrics, validate_scientific_criteria, ScientificValidation,
    ValidationMetrics, ValidationOptions,
};

/// Precision, in θ units, used for the sample size recommendation.
pub const TARGET_MEAN_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub validation: ValidationOptions,
    /// Level of the interval around the mean final θ.
    pub confidence_level: f64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            validation: ValidationOptions::default(),
            confidence_level: 0.95,
        }
    }
}

/// Distribution of final θ across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThetaSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub confidence_interval: ConfidenceInterval,
}

/// Answer statistics for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub items_in_bank: usize,
    pub responses: usize,
    pub mean_response: f64,
    pub mean_difficulty: f64,
}

/// A complete psychometric report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychometricReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub bank: BankSummary,
    pub metrics: ValidationMetrics,
    pub criteria: ScientificValidation,
    #[serde(default)]
    pub theta_summary: Option<ThetaSummary>,
    pub categories: Vec<CategorySummary>,
    pub mean_questions: f64,
    pub mean_final_precision: f64,
    /// Respondents needed to pin the mean θ within ±0.1 at 95 %.
    #[serde(default)]
    pub recommended_sample_size: Option<u64>,
    /// Final θ of every session, in input order.
    pub final_thetas: Vec<f64>,
}

impl PsychometricReport {
    /// Build a report from completed sessions.
    pub fn generate(
        sessions: &[CompletedSession],
        bank: &ItemBank,
        options: &ReportOptions,
    ) -> Self {
        let metrics = compute_validation_metrics(sessions, bank, &options.validation);
        let criteria = validate_scientific_criteria(&metrics);

        let final_thetas: Vec<f64> = sessions.iter().map(CompletedSession::final_theta).collect();
        let theta_summary = statistics::confidence_interval(&final_thetas, options.confidence_level)
            .ok()
            .map(|ci| ThetaSummary {
                mean: ci.mean,
                std_dev: statistics::std_dev(&final_thetas),
                min: final_thetas.iter().copied().fold(f64::INFINITY, f64::min),
                max: final_thetas.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                confidence_interval: ci,
            });
        let recommended_sample_size = theta_summary.as_ref().and_then(|t| {
            statistics::sample_size(TARGET_MEAN_MARGIN, t.std_dev, 0.95).ok()
        });

        let categories = Category::ALL
            .iter()
            .map(|&category| {
                let answered: Vec<(f64, f64)> = sessions
                    .iter()
                    .flat_map(|s| s.responses.iter())
                    .filter(|r| bank.get(&r.item_id).is_some_and(|i| i.category == category))
                    .map(|r| (r.response, r.difficulty))
                    .collect();
                let responses: Vec<f64> = answered.iter().map(|(r, _)| *r).collect();
                let difficulties: Vec<f64> = answered.iter().map(|(_, b)| *b).collect();
                CategorySummary {
                    category,
                    items_in_bank: bank.by_category(category).count(),
                    responses: answered.len(),
                    mean_response: statistics::mean(&responses),
                    mean_difficulty: statistics::mean(&difficulties),
                }
            })
            .collect();

        let questions: Vec<f64> = sessions.iter().map(|s| s.responses.len() as f64).collect();
        let precisions: Vec<f64> = sessions
            .iter()
            .map(|s| s.final_ability.standard_error)
            .collect();

        tracing::info!(
            sessions = sessions.len(),
            passed = criteria.passed,
            "generated psychometric report"
        );

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            bank: bank.summary(),
            metrics,
            criteria,
            theta_summary,
            categories,
            mean_questions: statistics::mean(&questions),
            mean_final_precision: statistics::mean(&precisions),
            recommended_sample_size,
            final_thetas,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: PsychometricReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Headline metrics by name. Higher is better for all of them.
    pub fn headline_metrics(&self) -> [(&'static str, f64); 6] {
        let m = &self.metrics;
        [
            ("cronbach_alpha", m.cronbach_alpha),
            ("test_retest_reliability", m.test_retest_reliability),
            ("predictive_accuracy", m.predictive_accuracy),
            ("user_system_agreement", m.user_system_agreement),
            ("convergence_rate", m.convergence_rate),
            ("stability_index", m.stability_index),
        ]
    }

    /// Compare this report against a baseline.
    ///
    /// A metric moving by more than `threshold` counts as a regression or an
    /// improvement.
    pub fn compare(&self, baseline: &PsychometricReport, threshold: f64) -> MetricComparison {
        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;

        for ((metric, current), (_, base)) in self
            .headline_metrics()
            .into_iter()
            .zip(baseline.headline_metrics())
        {
            let delta = current - base;
            let change = MetricChange {
                metric: metric.to_string(),
                baseline: base,
                current,
                delta,
            };
            if delta < -threshold {
                regressions.push(change);
            } else if delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        let theta_shift =
            statistics::two_sample_t_test(&self.final_thetas, &baseline.final_thetas, 0.95).ok();

        MetricComparison {
            regressions,
            improvements,
            unchanged,
            theta_shift,
        }
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("# Psychometric report: {}\n\n", self.bank.name));
        md.push_str(&format!(
            "{} sessions, {} responses, {:.1} questions per session, mean SE {:.3}\n\n",
            self.metrics.session_count,
            self.metrics.response_count,
            self.mean_questions,
            self.mean_final_precision
        ));

        md.push_str("## Criteria\n\n");
        md.push_str("| Criterion | Value | Threshold | Status |\n");
        md.push_str("|-----------|-------|-----------|--------|\n");
        for c in &self.criteria.criteria {
            md.push_str(&format!(
                "| {} | {:.3} | > {} | {} |\n",
                c.name,
                c.value,
                c.threshold,
                if c.passed { "PASS" } else { "FAIL" }
            ));
        }
        md.push('\n');

        md.push_str("## Metrics\n\n");
        md.push_str(&format!(
            "- Convergence rate: {:.1}%\n- Stability index: {:.3}\n",
            self.metrics.convergence_rate * 100.0,
            self.metrics.stability_index
        ));
        if let Some(cv) = &self.metrics.cross_validation {
            md.push_str(&format!(
                "- Cross-validation ({} folds): {:.1}% [{:.1}%, {:.1}%]\n",
                cv.folds,
                cv.mean_accuracy * 100.0,
                cv.confidence_interval[0] * 100.0,
                cv.confidence_interval[1] * 100.0
            ));
        }
        if let Some(t) = &self.theta_summary {
            md.push_str(&format!(
                "- Final θ: mean {:.3} (sd {:.3}), {:.0}% CI [{:.3}, {:.3}]\n",
                t.mean,
                t.std_dev,
                t.confidence_interval.level * 100.0,
                t.confidence_interval.lower,
                t.confidence_interval.upper
            ));
        }
        if let Some(n) = self.recommended_sample_size {
            md.push_str(&format!("- Recommended sample size: {n}\n"));
        }
        md.push('\n');

        if !self.criteria.recommendations.is_empty() {
            md.push_str("## Recommendations\n\n");
            for r in &self.criteria.recommendations {
                md.push_str(&format!("- {r}\n"));
            }
        }

        md
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricComparison {
    pub regressions: Vec<MetricChange>,
    pub improvements: Vec<MetricChange>,
    pub unchanged: usize,
    /// Two-sample t-test of final θ, current against baseline.
    #[serde(default)]
    pub theta_shift: Option<TTestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

impl MetricComparison {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (title, changes) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Metric | Baseline | Current | Delta |\n");
            md.push_str("|--------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {:.3} | {:.3} | {:+.3} |\n",
                    c.metric, c.baseline, c.current, c.delta
                ));
            }
            md.push('\n');
        }

        if let Some(t) = &self.theta_shift {
            md.push_str(&format!(
                "θ shift: t = {:.3}, p ≈ {:.3}, {} effect{}\n",
                t.statistic,
                t.p_value,
                t.effect_size,
                if t.significant { " (significant)" } else { "" }
            ));
        }

        md
    }

    /// Returns true if there are any regressions.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ability, Item, ResponseRecord, ResponseScale};
    use crate::stopping::StopReason;

    fn bank() -> ItemBank {
        let items = (0..8).map(|i| {
            Item::new(
                format!("q{i}"),
                Category::ALL[i % 4],
                -1.4 + 0.4 * i as f64,
                1.3,
                0.1,
                ResponseScale::likert5(),
            )
            .unwrap()
        });
        ItemBank::from_items("emo", "Emotional state", items).unwrap()
    }

    fn sessions(bank: &ItemBank, thetas: &[f64]) -> Vec<CompletedSession> {
        thetas
            .iter()
            .enumerate()
            .map(|(n, &theta)| {
                let start = Utc::now();
                let responses: Vec<_> = bank
                    .iter()
                    .take(6)
                    .map(|item| {
                        let r = if item.difficulty < theta { 4.0 } else { 2.0 };
                        ResponseRecord::new(item, r, 2.0, start)
                    })
                    .collect();
                CompletedSession {
                    session_id: format!("s{n}"),
                    respondent_id: format!("r{n}"),
                    start_time: start,
                    end_time: start,
                    initial_theta: 0.0,
                    final_ability: Ability::new(format!("r{n}"), theta, 0.4, responses.clone()),
                    responses,
                    ability_progression: vec![theta; 6],
                    precision_progression: vec![0.4; 6],
                    stop_reason: StopReason::MaxQuestions,
                    is_complete: true,
                }
            })
            .collect()
    }

    fn with_metrics(alpha: f64, accuracy: f64) -> PsychometricReport {
        let bank = bank();
        let mut report =
            PsychometricReport::generate(&sessions(&bank, &[0.0, 0.5]), &bank, &ReportOptions::default());
        report.metrics.cronbach_alpha = alpha;
        report.metrics.predictive_accuracy = accuracy;
        report
    }

    #[test]
    fn generate_summarises_sessions() {
        let bank = bank();
        let report = PsychometricReport::generate(
            &sessions(&bank, &[-1.0, 0.0, 1.0, 0.5]),
            &bank,
            &ReportOptions::default(),
        );
        assert_eq!(report.metrics.session_count, 4);
        assert_eq!(report.metrics.response_count, 24);
        assert_eq!(report.criteria.criteria.len(), 4);
        assert_eq!(report.categories.len(), 4);
        assert_eq!(report.categories[0].items_in_bank, 2);
        assert!((report.mean_questions - 6.0).abs() < 1e-12);
        assert_eq!(report.final_thetas, vec![-1.0, 0.0, 1.0, 0.5]);

        let theta = report.theta_summary.as_ref().unwrap();
        assert!((theta.mean - 0.125).abs() < 1e-12);
        assert_eq!(theta.min, -1.0);
        assert_eq!(theta.max, 1.0);
        assert!(report.recommended_sample_size.unwrap() > 0);
    }

    #[test]
    fn empty_corpus_still_reports() {
        let bank = bank();
        let report = PsychometricReport::generate(&[], &bank, &ReportOptions::default());
        assert!(report.theta_summary.is_none());
        assert!(!report.criteria.passed);
        assert_eq!(report.mean_questions, 0.0);
    }

    #[test]
    fn markdown_lists_criteria_and_recommendations() {
        let bank = bank();
        let report =
            PsychometricReport::generate(&sessions(&bank, &[0.2, 0.4]), &bank, &ReportOptions::default());
        let md = report.to_markdown();
        assert!(md.contains("# Psychometric report: Emotional state"));
        assert!(md.contains("| predictive_accuracy |"));
        assert!(md.contains("## Recommendations"));
    }

    #[test]
    fn save_and_load_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = with_metrics(0.9, 0.85);
        report.save_json(&path).unwrap();
        let loaded = PsychometricReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.bank, report.bank);
        assert!(PsychometricReport::load_json(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn compare_detects_regression() {
        let baseline = with_metrics(0.9, 0.85);
        let current = with_metrics(0.7, 0.86);
        let diff = current.compare(&baseline, 0.05);
        assert!(diff.has_regressions());
        assert_eq!(diff.regressions.len(), 1);
        assert_eq!(diff.regressions[0].metric, "cronbach_alpha");
        assert!(diff.improvements.is_empty());
        assert_eq!(diff.unchanged, 5);
        assert!(diff.theta_shift.is_some());
        assert!(diff.to_markdown().contains("### Regressions"));
    }

    #[test]
    fn compare_detects_improvement() {
        let baseline = with_metrics(0.7, 0.6);
        let current = with_metrics(0.7, 0.9);
        let diff = current.compare(&baseline, 0.05);
        assert!(!diff.has_regressions());
        assert_eq!(diff.improvements.len(), 1);
        assert_eq!(diff.improvements[0].metric, "predictive_accuracy");
    }
}
