//! Simulated respondents answering from a known θ.
//!
//! Each answer draws a binary outcome with the 3PL probability of the
//! presented item, then maps it onto the item's scale: a value above the
//! midpoint for a "correct" outcome, at or below it otherwise.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};

use adaptest_core::irt;
use adaptest_core::model::{Item, ResponseScale, THETA_MAX, THETA_MIN};
use adaptest_core::traits::{ItemRequest, Respondent, RespondentAnswer};

use crate::error::RespondentError;

/// Mean seconds spent per item when no timing is configured.
pub const DEFAULT_MEAN_TIME_SECS: f64 = 8.0;
/// Spread of the time spent per item.
pub const DEFAULT_TIME_SD_SECS: f64 = 2.0;
/// Shortest time a simulated answer can take.
const MIN_TIME_SECS: f64 = 0.5;

pub struct SimulatedRespondent {
    id: String,
    theta: f64,
    mean_time_secs: f64,
    time_sd_secs: f64,
    rng: Mutex<StdRng>,
    answered: AtomicU32,
}

impl SimulatedRespondent {
    /// A respondent with true trait `theta`, reproducible from `seed`.
    pub fn new(id: impl Into<String>, theta: f64, seed: u64) -> Self {
        Self {
            id: id.into(),
            theta: theta.clamp(THETA_MIN, THETA_MAX),
            mean_time_secs: DEFAULT_MEAN_TIME_SECS,
            time_sd_secs: DEFAULT_TIME_SD_SECS,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            answered: AtomicU32::new(0),
        }
    }

    /// Override the time-per-item distribution.
    pub fn with_timing(mut self, mean_secs: f64, sd_secs: f64) -> Result<Self, RespondentError> {
        if !(mean_secs.is_finite() && mean_secs >= 0.0) {
            return Err(RespondentError::InvalidParameter {
                name: "mean_time_secs".into(),
                reason: format!("must be >= 0, got {mean_secs}"),
            });
        }
        if !(sd_secs.is_finite() && sd_secs >= 0.0) {
            return Err(RespondentError::InvalidParameter {
                name: "time_sd_secs".into(),
                reason: format!("must be >= 0, got {sd_secs}"),
            });
        }
        self.mean_time_secs = mean_secs;
        self.time_sd_secs = sd_secs;
        Ok(self)
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Number of items answered so far.
    pub fn answered(&self) -> u32 {
        self.answered.load(Ordering::Relaxed)
    }

    /// Answer an item synchronously.
    pub fn answer(&self, item: &Item) -> RespondentAnswer {
        let p = irt::probability(item, self.theta);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let correct = rng.random::<f64>() < p;
        let response = draw_response(&item.scale, correct, &mut *rng);
        let z: f64 = StandardNormal.sample(&mut *rng);
        let time_spent_secs = (self.mean_time_secs + self.time_sd_secs * z).max(MIN_TIME_SECS);
        self.answered.fetch_add(1, Ordering::Relaxed);
        RespondentAnswer {
            response,
            time_spent_secs,
        }
    }
}

#[async_trait]
impl Respondent for SimulatedRespondent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn respond(&self, request: &ItemRequest) -> anyhow::Result<RespondentAnswer> {
        let answer = self.answer(&request.item);
        tracing::trace!(
            respondent = %self.id,
            item = %request.item.id,
            response = answer.response,
            "simulated answer"
        );
        Ok(answer)
    }

    fn true_theta(&self) -> Option<f64> {
        Some(self.theta)
    }
}

/// Map a binary outcome onto a response scale.
///
/// Integer-bounded scales yield integer points; other scales a uniform value
/// in the matching half.
fn draw_response<R: Rng + ?Sized>(scale: &ResponseScale, correct: bool, rng: &mut R) -> f64 {
    let mid = scale.midpoint();
    if scale.min.fract() == 0.0 && scale.max.fract() == 0.0 {
        let points: Vec<f64> = (scale.min as i64..=scale.max as i64)
            .map(|v| v as f64)
            .filter(|v| (*v > mid) == correct)
            .collect();
        if !points.is_empty() {
            return points[rng.random_range(0..points.len())];
        }
    }
    let u = rng.random::<f64>();
    if correct {
        mid + (scale.max - mid) * (1.0 - u)
    } else {
        scale.min + (mid - scale.min) * u
    }
}

/// Reject a θ distribution with a non-finite mean or a negative spread.
pub(crate) fn check_distribution(mean: f64, sd: f64) -> Result<(), RespondentError> {
    if !mean.is_finite() {
        return Err(RespondentError::InvalidParameter {
            name: "mean".into(),
            reason: format!("must be finite, got {mean}"),
        });
    }
    if !(sd.is_finite() && sd >= 0.0) {
        return Err(RespondentError::InvalidParameter {
            name: "std_dev".into(),
            reason: format!("must be >= 0, got {sd}"),
        });
    }
    Ok(())
}

/// Draw `n` respondents with θ ~ N(mean, sd), clamped to the θ range.
///
/// Ids are `{prefix}-0001`, `{prefix}-0002`, ...; every respondent gets its
/// own seed derived from `seed`.
pub fn generate_population(
    prefix: &str,
    n: usize,
    mean: f64,
    sd: f64,
    seed: u64,
) -> Result<Vec<SimulatedRespondent>, RespondentError> {
    check_distribution(mean, sd)?;
    let dist = Normal::new(mean, sd).map_err(|e| RespondentError::InvalidParameter {
        name: "std_dev".into(),
        reason: e.to_string(),
    })?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..n)
        .map(|i| {
            let theta = dist.sample(&mut rng);
            SimulatedRespondent::new(
                format!("{prefix}-{:04}", i + 1),
                theta,
                seed.wrapping_add(i as u64 + 1),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::model::Category;

    fn item(difficulty: f64, scale: ResponseScale) -> Item {
        Item::new("q", Category::Valencia, difficulty, 1.5, 0.0, scale).unwrap()
    }

    #[test]
    fn answers_stay_on_scale() {
        let r = SimulatedRespondent::new("r", 0.0, 3);
        let likert = item(0.0, ResponseScale::likert5());
        let slider = item(0.0, ResponseScale::new(0.0, 0.5));
        for _ in 0..200 {
            let a = r.answer(&likert);
            assert!(likert.scale.contains(a.response));
            assert_eq!(a.response.fract(), 0.0);
            assert!(a.time_spent_secs >= MIN_TIME_SECS);

            let b = r.answer(&slider);
            assert!(slider.scale.contains(b.response));
        }
        assert_eq!(r.answered(), 400);
    }

    #[test]
    fn same_seed_same_answers() {
        let a = SimulatedRespondent::new("a", 0.5, 99);
        let b = SimulatedRespondent::new("b", 0.5, 99);
        let it = item(0.3, ResponseScale::likert5());
        for _ in 0..20 {
            assert_eq!(a.answer(&it), b.answer(&it));
        }
    }

    #[test]
    fn high_theta_mostly_agrees_with_easy_items() {
        let r = SimulatedRespondent::new("r", 3.0, 5);
        let easy = item(-2.0, ResponseScale::likert5());
        let agreed = (0..200)
            .filter(|_| easy.scale.is_correct(r.answer(&easy).response))
            .count();
        assert!(agreed > 180, "agreed {agreed}/200");
    }

    #[test]
    fn integer_draws_respect_outcome() {
        let mut rng = StdRng::seed_from_u64(1);
        let scale = ResponseScale::likert5();
        for _ in 0..50 {
            assert!(draw_response(&scale, true, &mut rng) >= 4.0);
            assert!(draw_response(&scale, false, &mut rng) <= 3.0);
        }
    }

    #[test]
    fn timing_is_validated() {
        assert!(SimulatedRespondent::new("r", 0.0, 1)
            .with_timing(5.0, -1.0)
            .is_err());
        assert!(SimulatedRespondent::new("r", 0.0, 1)
            .with_timing(-5.0, 1.0)
            .is_err());
        assert!(SimulatedRespondent::new("r", 0.0, 1)
            .with_timing(5.0, 0.0)
            .is_ok());
    }

    #[test]
    fn population_is_reproducible() {
        let a = generate_population("sim", 30, 0.0, 1.0, 7).unwrap();
        let b = generate_population("sim", 30, 0.0, 1.0, 7).unwrap();
        assert_eq!(a.len(), 30);
        assert_eq!(a[0].id(), "sim-0001");
        assert_eq!(a[29].id(), "sim-0030");
        assert!(a.iter().zip(&b).all(|(x, y)| x.theta() == y.theta()));
        assert!(a.iter().all(|r| (THETA_MIN..=THETA_MAX).contains(&r.theta())));
        assert!(a.iter().any(|r| r.theta() != a[0].theta()));

    }

    #[test]
    fn population_rejects_bad_distribution() {
        for (mean, sd) in [(0.0, -1.0), (0.0, -1e-9), (0.0, f64::NAN), (f64::INFINITY, 1.0)] {
            assert!(matches!(
                generate_population("sim", 3, mean, sd, 7),
                Err(RespondentError::InvalidParameter { .. })
            ));
        }

        let flat = generate_population("sim", 4, 0.5, 0.0, 7).unwrap();
        assert!(flat.iter().all(|r| r.theta() == 0.5));
    }

    #[tokio::test]
    async fn respond_reports_true_theta() {
        let r = SimulatedRespondent::new("r", 1.2, 2);
        let request = ItemRequest {
            session_id: "s".into(),
            respondent_id: "r".into(),
            sequence: 1,
            item: item(0.0, ResponseScale::likert5()),
        };
        let answer = r.respond(&request).await.unwrap();
        assert!(request.item.scale.contains(answer.response));
        assert_eq!(r.true_theta(), Some(1.2));
    }
}
