//! Tabular export of answered items.
//!
//! One row per answered item per session, with a fixed column order and
//! per-column metadata for statistical packages.

use serde::{Deserialize, Serialize};

use crate::bank::ItemBank;
use crate::model::{THETA_MAX, THETA_MIN};
use crate::session::CompletedSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Number,
    Boolean,
    Timestamp,
}

/// Metadata for one export column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportColumn {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ColumnKind,
    /// Inclusive valid numeric range; `None` bounds are open.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ExportColumn {
    const fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: ColumnKind::Text,
            min: None,
            max: None,
        }
    }

    const fn numeric(
        name: &'static str,
        description: &'static str,
        kind: ColumnKind,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        Self {
            name,
            description,
            kind,
            min,
            max,
        }
    }

    /// Whether a numeric value lies within the column's range.
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite()
            && self.min.map_or(true, |min| value >= min)
            && self.max.map_or(true, |max| value <= max)
    }
}

pub const EXPORT_COLUMNS: [ExportColumn; 16] = [
    ExportColumn::text("session_id", "Externally generated session identifier"),
    ExportColumn::text("respondent_id", "Respondent identifier"),
    ExportColumn::numeric(
        "sequence",
        "1-based position of the item within the session",
        ColumnKind::Integer,
        Some(1.0),
        None,
    ),
    ExportColumn::text("item_id", "Item identifier"),
    ExportColumn::text("category", "Emotional-state dimension measured by the item"),
    ExportColumn::numeric(
        "difficulty",
        "IRT difficulty (b) of the item",
        ColumnKind::Number,
        None,
        None,
    ),
    ExportColumn::numeric(
        "discrimination",
        "IRT discrimination (a) of the item",
        ColumnKind::Number,
        Some(0.0),
        None,
    ),
    ExportColumn::numeric(
        "guessing",
        "IRT lower asymptote (c) of the item",
        ColumnKind::Number,
        Some(0.0),
        Some(1.0),
    ),
    ExportColumn::numeric(
        "response",
        "Raw response on the item's scale",
        ColumnKind::Number,
        None,
        None,
    ),
    ExportColumn::numeric(
        "scale_min",
        "Lowest valid response",
        ColumnKind::Number,
        None,
        None,
    ),
    ExportColumn::numeric(
        "scale_max",
        "Highest valid response",
        ColumnKind::Number,
        None,
        None,
    ),
    ExportColumn::numeric(
        "correct",
        "1 when the response lies above the scale midpoint",
        ColumnKind::Boolean,
        Some(0.0),
        Some(1.0),
    ),
    ExportColumn::numeric(
        "time_spent_secs",
        "Seconds spent answering",
        ColumnKind::Number,
        Some(0.0),
        None,
    ),
    ExportColumn::numeric(
        "theta_after",
        "Ability estimate after this answer",
        ColumnKind::Number,
        Some(THETA_MIN),
        Some(THETA_MAX),
    ),
    ExportColumn::numeric(
        "standard_error_after",
        "Standard error of the estimate after this answer",
        ColumnKind::Number,
        Some(0.0),
        None,
    ),
    ExportColumn {
        name: "timestamp",
        description: "RFC 3339 time the answer was recorded",
        kind: ColumnKind::Timestamp,
        min: None,
        max: None,
    },
];

/// One answered item.
///
/// Item parameters are empty when the item is no longer in the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub session_id: String,
    pub respondent_id: String,
    pub sequence: usize,
    pub item_id: String,
    pub category: Option<String>,
    pub difficulty: f64,
    pub discrimination: Option<f64>,
    pub guessing: Option<f64>,
    pub response: f64,
    pub scale_min: Option<f64>,
    pub scale_max: Option<f64>,
    pub correct: bool,
    pub time_spent_secs: f64,
    pub theta_after: f64,
    pub standard_error_after: f64,
    pub timestamp: String,
}

impl ExportRow {
    /// Cell values in [`EXPORT_COLUMNS`] order.
    pub fn values(&self) -> Vec<String> {
        let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        vec![
            self.session_id.clone(),
            self.respondent_id.clone(),
            self.sequence.to_string(),
            self.item_id.clone(),
            self.category.clone().unwrap_or_default(),
            self.difficulty.to_string(),
            opt(self.discrimination),
            opt(self.guessing),
            self.response.to_string(),
            opt(self.scale_min),
            opt(self.scale_max),
            u8::from(self.correct).to_string(),
            self.time_spent_secs.to_string(),
            self.theta_after.to_string(),
            self.standard_error_after.to_string(),
            self.timestamp.clone(),
        ]
    }

    /// Names of numeric columns whose value is outside the declared range.
    pub fn out_of_range(&self) -> Vec<&'static str> {
        let numeric = [
            (2, Some(self.sequence as f64)),
            (5, Some(self.difficulty)),
            (6, self.discrimination),
            (7, self.guessing),
            (8, Some(self.response)),
            (9, self.scale_min),
            (10, self.scale_max),
            (11, Some(f64::from(u8::from(self.correct)))),
            (12, Some(self.time_spent_secs)),
            (13, Some(self.theta_after)),
            (14, Some(self.standard_error_after)),
        ];
        numeric
            .into_iter()
            .filter_map(|(col, value)| {
                let column = &EXPORT_COLUMNS[col];
                value.filter(|v| !column.accepts(*v)).map(|_| column.name)
            })
            .collect()
    }
}

/// Column names in order.
pub fn header() -> Vec<&'static str> {
    EXPORT_COLUMNS.iter().map(|c| c.name).collect()
}

/// Flatten completed sessions into export rows.
pub fn build_export(sessions: &[CompletedSession], bank: &ItemBank) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    for session in sessions {
        for (i, record) in session.responses.iter().enumerate() {
            let item = bank.get(&record.item_id);
            if item.is_none() {
                tracing::warn!(
                    session = %session.session_id,
                    item = %record.item_id,
                    "exporting response for item missing from bank"
                );
            }
            rows.push(ExportRow {
                session_id: session.session_id.clone(),
                respondent_id: session.respondent_id.clone(),
                sequence: i + 1,
                item_id: record.item_id.clone(),
                category: item.map(|it| it.category.to_string()),
                difficulty: record.difficulty,
                discrimination: item.map(|it| it.discrimination),
                guessing: item.map(|it| it.guessing),
                response: record.response,
                scale_min: item.map(|it| it.scale.min),
                scale_max: item.map(|it| it.scale.max),
                correct: record.correct,
                time_spent_secs: record.time_spent_secs,
                theta_after: session
                    .ability_progression
                    .get(i)
                    .copied()
                    .unwrap_or(session.final_ability.theta),
                standard_error_after: session
                    .precision_progression
                    .get(i)
                    .copied()
                    .unwrap_or(session.final_ability.standard_error),
                timestamp: record.timestamp.to_rfc3339(),
            });
        }
    }
    rows
}
