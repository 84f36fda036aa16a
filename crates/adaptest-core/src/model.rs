//! Core data model types for adaptest.
//!
//! Items, the responses recorded against them, and the ability snapshots
//! derived from a response history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, AssessmentResult};

/// Lower bound of the θ scale.
pub const THETA_MIN: f64 = -4.0;
/// Upper bound of the θ scale.
pub const THETA_MAX: f64 = 4.0;
/// z value used for the ability confidence interval.
pub const ABILITY_CI_Z: f64 = 1.96;

/// The emotional-state dimension an item measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Valence (pleasant / unpleasant).
    Valencia,
    /// Activation / arousal.
    Ativacao,
    /// Concentration.
    Concentracao,
    /// Motivation.
    Motivacao,
}

impl Category {
    /// All categories in declaration order.
    pub const ALL: [Category; 4] = [
        Category::Valencia,
        Category::Ativacao,
        Category::Concentracao,
        Category::Motivacao,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Valencia => write!(f, "valencia"),
            Category::Ativacao => write!(f, "ativacao"),
            Category::Concentracao => write!(f, "concentracao"),
            Category::Motivacao => write!(f, "motivacao"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valencia" | "valência" | "valence" => Ok(Category::Valencia),
            "ativacao" | "ativação" | "activation" | "arousal" => Ok(Category::Ativacao),
            "concentracao" | "concentração" | "concentration" => Ok(Category::Concentracao),
            "motivacao" | "motivação" | "motivation" => Ok(Category::Motivacao),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Closed numeric range a response must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseScale {
    pub min: f64,
    pub max: f64,
}

impl ResponseScale {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Five-point Likert scale.
    pub fn likert5() -> Self {
        Self::new(1.0, 5.0)
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// A response counts as "correct" when it lies strictly above the midpoint.
    ///
    /// This splits polytomous Likert answers into the binary outcome the 3PL
    /// model expects. It is an approximation flagged for domain review.
    pub fn is_correct(&self, value: f64) -> bool {
        value > self.midpoint()
    }
}

impl Default for ResponseScale {
    fn default() -> Self {
        Self::likert5()
    }
}

/// A scored questionnaire item with 3PL parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the bank.
    pub id: String,
    /// Dimension the item measures.
    pub category: Category,
    /// Difficulty `b`.
    pub difficulty: f64,
    /// Discrimination `a` (> 0).
    pub discrimination: f64,
    /// Pseudo-guessing `c` in `[0, 1)`.
    #[serde(default)]
    pub guessing: f64,
    /// Response scale.
    #[serde(default)]
    pub scale: ResponseScale,
    /// Opaque content payload owned by the presentation layer.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Item {
    /// Create a validated item with no content payload.
    pub fn new(
        id: impl Into<String>,
        category: Category,
        difficulty: f64,
        discrimination: f64,
        guessing: f64,
        scale: ResponseScale,
    ) -> AssessmentResult<Self> {
        let item = Self {
            id: id.into(),
            category,
            difficulty,
            discrimination,
            guessing,
            scale,
            content: serde_json::Value::Null,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> AssessmentResult<()> {
        let invalid = |reason: String| AssessmentError::InvalidItem {
            id: self.id.clone(),
            reason,
        };
        if self.id.trim().is_empty() {
            return Err(invalid("id is empty".into()));
        }
        if !self.difficulty.is_finite() {
            return Err(invalid(format!("difficulty {} is not finite", self.difficulty)));
        }
        if !(self.discrimination.is_finite() && self.discrimination > 0.0) {
            return Err(invalid(format!(
                "discrimination must be > 0, got {}",
                self.discrimination
            )));
        }
        if !(0.0..1.0).contains(&self.guessing) {
            return Err(invalid(format!(
                "guessing must be in [0, 1), got {}",
                self.guessing
            )));
        }
        if !(self.scale.min.is_finite() && self.scale.max.is_finite())
            || self.scale.min >= self.scale.max
        {
            return Err(invalid(format!(
                "scale [{}, {}] must satisfy min < max",
                self.scale.min, self.scale.max
            )));
        }
        Ok(())
    }
}

/// One answered item. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub item_id: String,
    pub response: f64,
    pub timestamp: DateTime<Utc>,
    /// Seconds spent on the item.
    pub time_spent_secs: f64,
    /// Difficulty of the item at the time it was answered.
    pub difficulty: f64,
    /// Response above the scale midpoint.
    pub correct: bool,
}

impl ResponseRecord {
    pub fn new(item: &Item, response: f64, time_spent_secs: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id.clone(),
            response,
            timestamp,
            time_spent_secs,
            difficulty: item.difficulty,
            correct: item.scale.is_correct(response),
        }
    }
}

/// A respondent's trait estimate together with its precision and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub respondent_id: String,
    pub theta: f64,
    pub standard_error: f64,
    /// `[theta - 1.96·SE, theta + 1.96·SE]`.
    pub confidence_interval: [f64; 2],
    pub response_history: Vec<ResponseRecord>,
    pub last_updated: DateTime<Utc>,
}

impl Ability {
    pub fn new(
        respondent_id: impl Into<String>,
        theta: f64,
        standard_error: f64,
        response_history: Vec<ResponseRecord>,
    ) -> Self {
        let theta = theta.clamp(THETA_MIN, THETA_MAX);
        let standard_error = standard_error.max(0.0);
        Self {
            respondent_id: respondent_id.into(),
            theta,
            standard_error,
            confidence_interval: [
                theta - ABILITY_CI_Z * standard_error,
                theta + ABILITY_CI_Z * standard_error,
            ],
            response_history,
            last_updated: Utc::now(),
        }
    }

    /// Ability with no evidence: θ at the given starting point, SE = 1.
    pub fn initial(respondent_id: impl Into<String>, theta: f64) -> Self {
        Self::new(respondent_id, theta, 1.0, Vec::new())
    }

    pub fn questions_answered(&self) -> usize {
        self.response_history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_and_parse() {
        assert_eq!(Category::Valencia.to_string(), "valencia");
        assert_eq!("Motivacao".parse::<Category>().unwrap(), Category::Motivacao);
        assert_eq!("ativação".parse::<Category>().unwrap(), Category::Ativacao);
        assert_eq!(
            "concentration".parse::<Category>().unwrap(),
            Category::Concentracao
        );
        assert!("humor".parse::<Category>().is_err());
    }

    #[test]
    fn item_validation() {
        let scale = ResponseScale::likert5();
        assert!(Item::new("ok", Category::Valencia, 0.0, 1.0, 0.2, scale).is_ok());
        assert!(Item::new("a", Category::Valencia, 0.0, 0.0, 0.0, scale).is_err());
        assert!(Item::new("c", Category::Valencia, 0.0, 1.0, 1.0, scale).is_err());
        assert!(Item::new("c2", Category::Valencia, 0.0, 1.0, -0.1, scale).is_err());
        assert!(Item::new(
            "s",
            Category::Valencia,
            0.0,
            1.0,
            0.0,
            ResponseScale::new(5.0, 5.0)
        )
        .is_err());
        assert!(Item::new("", Category::Valencia, 0.0, 1.0, 0.0, scale).is_err());
    }

    #[test]
    fn correctness_is_strictly_above_midpoint() {
        let scale = ResponseScale::likert5();
        assert!(!scale.is_correct(3.0));
        assert!(scale.is_correct(3.5));
        assert!(!scale.is_correct(1.0));
        assert!(scale.is_correct(5.0));
    }

    #[test]
    fn response_record_copies_difficulty() {
        let item = Item::new("q", Category::Motivacao, 1.25, 1.0, 0.0, ResponseScale::likert5())
            .unwrap();
        let record = ResponseRecord::new(&item, 4.0, 3.5, Utc::now());
        assert_eq!(record.difficulty, 1.25);
        assert!(record.correct);
        assert_eq!(record.item_id, "q");
    }

    #[test]
    fn ability_interval_and_clamp() {
        let ability = Ability::new("r1", 0.5, 0.25, vec![]);
        assert!((ability.confidence_interval[0] - (0.5 - 0.49)).abs() < 1e-12);
        assert!((ability.confidence_interval[1] - (0.5 + 0.49)).abs() < 1e-12);

        let clamped = Ability::new("r1", 9.0, 0.1, vec![]);
        assert_eq!(clamped.theta, THETA_MAX);
    }

    #[test]
    fn item_serde_roundtrip_defaults() {
        let json = r#"{"id":"q1","category":"valencia","difficulty":0.3,"discrimination":1.2}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.guessing, 0.0);
        assert_eq!(item.scale, ResponseScale::likert5());
        assert!(item.validate().is_ok());
    }
}
