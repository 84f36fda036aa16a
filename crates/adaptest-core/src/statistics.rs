//! Descriptive and inferential statistics used by validation.
//!
//! Critical values come from lookup tables rather than a distribution library:
//! one-tailed Student t values for the 90/95/99 % levels bucketed by degrees of
//! freedom, and two-tailed values for df ≤ 30 to approximate p-values.

use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, AssessmentResult};

/// Normal critical value used for untabulated levels.
pub const DEFAULT_Z: f64 = 1.96;

// ---------------------------------------------------------------------------
// Descriptive helpers
// ---------------------------------------------------------------------------

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance (n − 1 denominator); 0 with fewer than two values.
pub fn variance(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64
}

/// Sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

// ---------------------------------------------------------------------------
// Critical values
// ---------------------------------------------------------------------------

/// One-tailed t values for α = 0.05, 0.025, 0.005, keyed by the upper df of
/// each bucket.
const T_ONE_TAILED: [(usize, [f64; 3]); 16] = [
    (1, [6.314, 12.706, 63.657]),
    (2, [2.920, 4.303, 9.925]),
    (3, [2.353, 3.182, 5.841]),
    (4, [2.132, 2.776, 4.604]),
    (5, [2.015, 2.571, 4.032]),
    (6, [1.943, 2.447, 3.707]),
    (7, [1.895, 2.365, 3.499]),
    (8, [1.860, 2.306, 3.355]),
    (9, [1.833, 2.262, 3.250]),
    (10, [1.812, 2.228, 3.169]),
    (15, [1.753, 2.131, 2.947]),
    (20, [1.725, 2.086, 2.845]),
    (25, [1.708, 2.060, 2.787]),
    (30, [1.697, 2.042, 2.750]),
    (60, [1.671, 2.000, 2.660]),
    (120, [1.658, 1.980, 2.617]),
];

const Z_VALUES: [f64; 3] = [1.645, 1.960, 2.576];

fn level_column(level: f64) -> Option<usize> {
    [0.90, 0.95, 0.99]
        .iter()
        .position(|l| (l - level).abs() < 1e-9)
}

/// Two-sided critical t for a confidence level.
///
/// Levels other than 0.90, 0.95 and 0.99 fall back to 1.96. df of 0 is
/// treated as 1; df above 120 uses the normal value.
pub fn t_critical(df: usize, level: f64) -> f64 {
    let Some(col) = level_column(level) else {
        return DEFAULT_Z;
    };
    let df = df.max(1);
    T_ONE_TAILED
        .iter()
        .find(|(upper, _)| df <= *upper)
        .map(|(_, row)| row[col])
        .unwrap_or(Z_VALUES[col])
}

/// Two-sided normal critical value for a confidence level.
pub fn z_critical(level: f64) -> f64 {
    level_column(level)
        .map(|col| Z_VALUES[col])
        .unwrap_or(DEFAULT_Z)
}

/// Two-tailed significance levels matching the columns of [`T_TWO_TAILED`].
const TWO_TAILED_ALPHAS: [f64; 6] = [0.20, 0.10, 0.05, 0.02, 0.01, 0.001];

/// Two-tailed critical t for df 1..=30.
const T_TWO_TAILED: [[f64; 6]; 30] = [
    [3.078, 6.314, 12.706, 31.821, 63.657, 636.619],
    [1.886, 2.920, 4.303, 6.965, 9.925, 31.599],
    [1.638, 2.353, 3.182, 4.541, 5.841, 12.924],
    [1.533, 2.132, 2.776, 3.747, 4.604, 8.610],
    [1.476, 2.015, 2.571, 3.365, 4.032, 6.869],
    [1.440, 1.943, 2.447, 3.143, 3.707, 5.959],
    [1.415, 1.895, 2.365, 2.998, 3.499, 5.408],
    [1.397, 1.860, 2.306, 2.896, 3.355, 5.041],
    [1.383, 1.833, 2.262, 2.821, 3.250, 4.781],
    [1.372, 1.812, 2.228, 2.764, 3.169, 4.587],
    [1.363, 1.796, 2.201, 2.718, 3.106, 4.437],
    [1.356, 1.782, 2.179, 2.681, 3.055, 4.318],
    [1.350, 1.771, 2.160, 2.650, 3.012, 4.221],
    [1.345, 1.761, 2.145, 2.624, 2.977, 4.140],
    [1.341, 1.753, 2.131, 2.602, 2.947, 4.073],
    [1.337, 1.746, 2.120, 2.583, 2.921, 4.015],
    [1.333, 1.740, 2.110, 2.567, 2.898, 3.965],
    [1.330, 1.734, 2.101, 2.552, 2.878, 3.922],
    [1.328, 1.729, 2.093, 2.539, 2.861, 3.883],
    [1.325, 1.725, 2.086, 2.528, 2.845, 3.850],
    [1.323, 1.721, 2.080, 2.518, 2.831, 3.819],
    [1.321, 1.717, 2.074, 2.508, 2.819, 3.792],
    [1.319, 1.714, 2.069, 2.500, 2.807, 3.768],
    [1.318, 1.711, 2.064, 2.492, 2.797, 3.745],
    [1.316, 1.708, 2.060, 2.485, 2.787, 3.725],
    [1.315, 1.706, 2.056, 2.479, 2.779, 3.707],
    [1.314, 1.703, 2.052, 2.473, 2.771, 3.690],
    [1.313, 1.701, 2.048, 2.467, 2.763, 3.674],
    [1.311, 1.699, 2.045, 2.462, 2.756, 3.659],
    [1.310, 1.697, 2.042, 2.457, 2.750, 3.646],
];

/// Standard normal CDF (Abramowitz–Stegun 26.2.17).
pub fn normal_cdf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let d = 0.398_942_3 * (-x * x / 2.0).exp();
    let tail = d
        * t
        * (0.319_381_5 + t * (-0.356_563_8 + t * (1.781_478 + t * (-1.821_256 + t * 1.330_274))));
    if x > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Approximate two-tailed p-value for a t statistic.
///
/// Interpolates the df ≤ 30 table linearly between tabulated columns and
/// bottoms out at 0.001; larger df use the normal approximation.
pub fn two_tailed_p_value(t: f64, df: usize) -> f64 {
    let t = t.abs();
    if !t.is_finite() {
        return if t.is_nan() { 1.0 } else { 0.0 };
    }
    if df > 30 {
        return (2.0 * (1.0 - normal_cdf(t))).clamp(0.0, 1.0);
    }

    let row = &T_TWO_TAILED[df.max(1) - 1];
    let (mut prev_t, mut prev_p) = (0.0, 1.0);
    for (crit, alpha) in row.iter().zip(TWO_TAILED_ALPHAS) {
        if t <= *crit {
            let frac = (t - prev_t) / (crit - prev_t);
            return prev_p + frac * (alpha - prev_p);
        }
        prev_t = *crit;
        prev_p = alpha;
    }
    TWO_TAILED_ALPHAS[TWO_TAILED_ALPHAS.len() - 1]
}

// ---------------------------------------------------------------------------
// Confidence intervals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub level: f64,
    pub standard_error: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Mean ± t(df = n − 1)·s/√n.
pub fn confidence_interval(data: &[f64], level: f64) -> AssessmentResult<ConfidenceInterval> {
    if data.is_empty() {
        return Err(AssessmentError::InsufficientData(
            "confidence interval needs at least one value".into(),
        ));
    }
    let n = data.len();
    let m = mean(data);
    let standard_error = std_dev(data) / (n as f64).sqrt();
    let margin = t_critical(n - 1, level) * standard_error;
    Ok(ConfidenceInterval {
        mean: m,
        lower: m - margin,
        upper: m + margin,
        margin,
        level,
        standard_error,
    })
}

// ---------------------------------------------------------------------------
// Reliability
// ---------------------------------------------------------------------------

/// Cronbach's alpha over `items[item][respondent]`.
///
/// Every item must have the same number of respondents. A matrix with no
/// total-score variance yields 0.
pub fn cronbach_alpha(items: &[Vec<f64>]) -> AssessmentResult<f64> {
    let k = items.len();
    if k < 2 {
        return Err(AssessmentError::InsufficientData(format!(
            "cronbach's alpha needs at least 2 items, got {k}"
        )));
    }
    let n = items[0].len();
    if n < 2 {
        return Err(AssessmentError::InsufficientData(format!(
            "cronbach's alpha needs at least 2 respondents, got {n}"
        )));
    }
    if let Some(bad) = items.iter().position(|row| row.len() != n) {
        return Err(AssessmentError::InsufficientData(format!(
            "item {bad} has {} responses, expected {n}",
            items[bad].len()
        )));
    }

    let item_variance_sum: f64 = items.iter().map(|row| variance(row)).sum();
    let totals: Vec<f64> = (0..n).map(|j| items.iter().map(|row| row[j]).sum()).collect();
    let total_variance = variance(&totals);
    if total_variance <= f64::EPSILON {
        return Ok(0.0);
    }

    let k = k as f64;
    Ok(k / (k - 1.0) * (1.0 - item_variance_sum / total_variance))
}

// ---------------------------------------------------------------------------
// Hypothesis tests
// ---------------------------------------------------------------------------

/// Cohen's d magnitude bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectSize {
    Small,
    Medium,
    Large,
}

impl EffectSize {
    pub fn from_cohens_d(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            EffectSize::Small
        } else if d < 0.8 {
            EffectSize::Medium
        } else {
            EffectSize::Large
        }
    }
}

impl std::fmt::Display for EffectSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectSize::Small => write!(f, "small"),
            EffectSize::Medium => write!(f, "medium"),
            EffectSize::Large => write!(f, "large"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub critical_value: f64,
    pub significant: bool,
    pub cohens_d: f64,
    pub effect_size: EffectSize,
}

impl TTestResult {
    fn build(difference: f64, standard_error: f64, spread: f64, df: usize, level: f64) -> Self {
        // Zero spread gives no evidence either way.
        let statistic = if standard_error > 0.0 {
            difference / standard_error
        } else {
            0.0
        };
        let cohens_d = if spread > 0.0 { difference / spread } else { 0.0 };
        let critical_value = t_critical(df, level);
        Self {
            statistic,
            degrees_of_freedom: df,
            p_value: two_tailed_p_value(statistic, df),
            critical_value,
            significant: statistic.abs() > critical_value,
            cohens_d,
            effect_size: EffectSize::from_cohens_d(cohens_d),
        }
    }
}

/// Test whether the mean of `data` differs from `hypothesized_mean`.
pub fn one_sample_t_test(
    data: &[f64],
    hypothesized_mean: f64,
    level: f64,
) -> AssessmentResult<TTestResult> {
    if data.len() < 2 {
        return Err(AssessmentError::InsufficientData(
            "one-sample t-test needs at least 2 values".into(),
        ));
    }
    let n = data.len() as f64;
    let sd = std_dev(data);
    let difference = mean(data) - hypothesized_mean;
    Ok(TTestResult::build(
        difference,
        sd / n.sqrt(),
        sd,
        data.len() - 1,
        level,
    ))
}

/// Pooled-variance test of whether two samples share a mean.
pub fn two_sample_t_test(a: &[f64], b: &[f64], level: f64) -> AssessmentResult<TTestResult> {
    if a.len() < 2 || b.len() < 2 {
        return Err(AssessmentError::InsufficientData(
            "two-sample t-test needs at least 2 values per group".into(),
        ));
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let df = a.len() + b.len() - 2;
    let pooled = (((n1 - 1.0) * variance(a) + (n2 - 1.0) * variance(b)) / df as f64).sqrt();
    let standard_error = pooled * (1.0 / n1 + 1.0 / n2).sqrt();
    Ok(TTestResult::build(
        mean(a) - mean(b),
        standard_error,
        pooled,
        df,
        level,
    ))
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Respondents needed to estimate a mean within `margin` at `level`.
pub fn sample_size(margin: f64, std_dev: f64, level: f64) -> AssessmentResult<u64> {
    if !(margin.is_finite() && margin > 0.0) {
        return Err(AssessmentError::Configuration(format!(
            "margin of error must be > 0, got {margin}"
        )));
    }
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(AssessmentError::Configuration(format!(
            "standard deviation must be >= 0, got {std_dev}"
        )));
    }
    let n = (z_critical(level) * std_dev / margin).powi(2).ceil();
    Ok(n as u64)
}
