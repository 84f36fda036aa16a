//! Respondent configuration and factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::engine::SimulationConfig;
use adaptest_core::session::{SessionOptions, DEFAULT_MAX_QUESTIONS, DEFAULT_TARGET_PRECISION};
use adaptest_core::traits::Respondent;

use crate::error::RespondentError;
use crate::mock::{MockRespondent, DEFAULT_TIME_SPENT_SECS};
use crate::simulated::{
    check_distribution, generate_population, SimulatedRespondent, DEFAULT_MEAN_TIME_SECS,
    DEFAULT_TIME_SD_SECS,
};

/// Configuration for one group of respondents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RespondentConfig {
    /// Respondents answering from a true θ under the 3PL model.
    ///
    /// With `theta` set every respondent shares it; otherwise θ is drawn
    /// from N(`mean`, `std_dev`).
    Simulated {
        #[serde(default = "default_count")]
        count: usize,
        #[serde(default)]
        theta: Option<f64>,
        #[serde(default)]
        mean: f64,
        #[serde(default = "default_std_dev")]
        std_dev: f64,
        #[serde(default = "default_mean_time")]
        mean_time_secs: f64,
    },
    /// A single respondent giving the same response to every item.
    Fixed {
        response: f64,
        #[serde(default = "default_time_spent")]
        time_spent_secs: f64,
    },
}

fn default_count() -> usize {
    1
}
fn default_std_dev() -> f64 {
    1.0
}
fn default_mean_time() -> f64 {
    DEFAULT_MEAN_TIME_SECS
}
fn default_time_spent() -> f64 {
    DEFAULT_TIME_SPENT_SECS
}

/// Session settings shared by every simulated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_target_precision")]
    pub target_precision: f64,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

fn default_target_precision() -> f64 {
    DEFAULT_TARGET_PRECISION
}
fn default_max_questions() -> usize {
    DEFAULT_MAX_QUESTIONS
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            target_precision: default_target_precision(),
            max_questions: default_max_questions(),
        }
    }
}

impl SessionSettings {
    pub fn to_options(&self) -> SessionOptions {
        SessionOptions {
            target_precision: self.target_precision,
            max_questions: self.max_questions,
            initial_theta: None,
        }
    }
}

/// Top-level adaptest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Respondent groups keyed by name.
    #[serde(default)]
    pub respondents: BTreeMap<String, RespondentConfig>,
    /// Max respondents simulated concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Output directory for results.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Base seed for every random draw.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Folds used for cross-validation in reports.
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default = "default_sessions_per_respondent")]
    pub sessions_per_respondent: usize,
    #[serde(default)]
    pub session: SessionSettings,
}

fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./adaptest-results")
}
fn default_seed() -> u64 {
    42
}
fn default_cv_folds() -> usize {
    5
}
fn default_sessions_per_respondent() -> usize {
    1
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            respondents: BTreeMap::new(),
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
            seed: default_seed(),
            cv_folds: default_cv_folds(),
            sessions_per_respondent: default_sessions_per_respondent(),
            session: SessionSettings::default(),
        }
    }
}

impl AdaptestConfig {
    /// Engine settings derived from this configuration.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            parallelism: self.parallelism,
            sessions_per_respondent: self.sessions_per_respondent,
            session: self.session.to_options(),
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_SEED`, `ADAPTEST_PARALLELISM`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AdaptestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Apply `ADAPTEST_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    mut config: AdaptestConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AdaptestConfig> {
    if let Some(seed) = lookup("ADAPTEST_SEED") {
        config.seed = seed
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_SEED: {seed}"))?;
    }
    if let Some(parallelism) = lookup("ADAPTEST_PARALLELISM") {
        config.parallelism = parallelism
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_PARALLELISM: {parallelism}"))?;
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}

/// Create the respondents of one configured group.
pub fn create_respondents(
    name: &str,
    config: &RespondentConfig,
    seed: u64,
) -> Result<Vec<Arc<dyn Respondent>>, RespondentError> {
    match config {
        RespondentConfig::Simulated {
            count,
            theta,
            mean,
            std_dev,
            mean_time_secs,
        } => {
            check_distribution(*mean, *std_dev)?;
            let population = match theta {
                Some(theta) => (0..*count)
                    .map(|i| {
                        SimulatedRespondent::new(
                            format!("{name}-{:04}", i + 1),
                            *theta,
                            seed.wrapping_add(i as u64 + 1),
                        )
                    })
                    .collect(),
                None => generate_population(name, *count, *mean, *std_dev, seed)?,
            };
            population
                .into_iter()
                .map(|r| {
                    let r = r.with_timing(*mean_time_secs, DEFAULT_TIME_SD_SECS)?;
                    Ok::<_, RespondentError>(Arc::new(r) as Arc<dyn Respondent>)
                })
                .collect()
        }
        RespondentConfig::Fixed {
            response,
            time_spent_secs,
        } => {
            if !response.is_finite() {
                return Err(RespondentError::InvalidParameter {
                    name: "response".into(),
                    reason: format!("must be finite, got {response}"),
                });
            }
            if !(time_spent_secs.is_finite() && *time_spent_secs >= 0.0) {
                return Err(RespondentError::InvalidParameter {
                    name: "time_spent_secs".into(),
                    reason: format!("must be >= 0, got {time_spent_secs}"),
                });
            }
            let mock =
                MockRespondent::with_fixed_response(name, *response).with_time_spent(*time_spent_secs);
            Ok(vec![Arc::new(mock)])
        }
    }
}

/// Create every configured respondent.
///
/// Groups are created in name order; each gets a seed derived from the base
/// seed and its position.
pub fn create_population(config: &AdaptestConfig) -> Result<Vec<Arc<dyn Respondent>>> {
    let mut population = Vec::new();
    for (index, (name, group)) in config.respondents.iter().enumerate() {
        let seed = config
            .seed
            .wrapping_add((index as u64 + 1).wrapping_mul(1_000_003));
        let group = create_respondents(name, group, seed)
            .with_context(|| format!("invalid respondent group '{name}'"))?;
        tracing::debug!(group = %name, count = group.len(), "created respondents");
        population.extend(group);
    }
    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = AdaptestConfig::default();
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.seed, 42);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.session.max_questions, 15);
        assert_eq!(config.session.target_precision, 0.3);
        assert!(config.respondents.is_empty());
    }

    #[test]
    fn parse_respondent_config() {
        let toml_str = r#"
seed = 7

[session]
max_questions = 20

[respondents.cohort]
type = "simulated"
count = 10
std_dev = 0.5

[respondents.calm]
type = "simulated"
theta = -1.0

[respondents.neutral]
type = "fixed"
response = 3.0
"#;
        let config: AdaptestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.session.max_questions, 20);
        assert_eq!(config.session.target_precision, 0.3);
        assert_eq!(config.respondents.len(), 3);
        assert_eq!(
            config.respondents.get("cohort"),
            Some(&RespondentConfig::Simulated {
                count: 10,
                theta: None,
                mean: 0.0,
                std_dev: 0.5,
                mean_time_secs: 8.0,
            })
        );
        assert!(matches!(
            config.respondents.get("neutral"),
            Some(RespondentConfig::Fixed { time_spent_secs, .. }) if *time_spent_secs == 5.0
        ));

        let population = create_population(&config).unwrap();
        assert_eq!(population.len(), 12);
        assert!(population.iter().any(|r| r.id() == "neutral"));
        assert!(population
            .iter()
            .filter(|r| r.id().starts_with("calm-"))
            .all(|r| r.true_theta() == Some(-1.0)));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> =
            [("ADAPTEST_SEED", "99"), ("ADAPTEST_PARALLELISM", " 8 ")].into();
        let config = apply_env_overrides(AdaptestConfig::default(), |k| {
            vars.get(k).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.parallelism, 8);

        let err = apply_env_overrides(AdaptestConfig::default(), |k| {
            (k == "ADAPTEST_SEED").then(|| "abc".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("ADAPTEST_SEED"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adaptest.toml");
        std::fs::write(&path, "parallelism = 2\ncv_folds = 3\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.simulation_config().parallelism, 2);

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn invalid_groups_are_rejected() {
        let bad_sd = RespondentConfig::Simulated {
            count: 3,
            theta: None,
            mean: 0.0,
            std_dev: -1.0,
            mean_time_secs: 8.0,
        };
        assert!(matches!(
            create_respondents("g", &bad_sd, 1),
            Err(RespondentError::InvalidParameter { .. })
        ));

        let bad_sd_fixed_theta = RespondentConfig::Simulated {
            count: 3,
            theta: Some(1.0),
            mean: 0.0,
            std_dev: -0.5,
            mean_time_secs: 8.0,
        };
        assert!(create_respondents("g", &bad_sd_fixed_theta, 1).is_err());

        let bad_time = RespondentConfig::Fixed {
            response: 3.0,
            time_spent_secs: -2.0,
        };
        assert!(matches!(
            create_respondents("g", &bad_time, 1),
            Err(RespondentError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn population_is_reproducible() {
        let mut config = AdaptestConfig::default();
        config.respondents.insert(
            "sim".into(),
            RespondentConfig::Simulated {
                count: 5,
                theta: None,
                mean: 0.0,
                std_dev: 1.0,
                mean_time_secs: 8.0,
            },
        );
        let a = create_population(&config).unwrap();
        let b = create_population(&config).unwrap();
        let thetas = |p: &[Arc<dyn Respondent>]| -> Vec<Option<f64>> {
            p.iter().map(|r| r.true_theta()).collect()
        };
        assert_eq!(thetas(&a), thetas(&b));
    }
}
