//! TOML item bank parser.
//!
//! Loads item banks from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bank::ItemBank;
use crate::model::{Category, Item, ResponseScale};
use crate::session::DEFAULT_MAX_QUESTIONS;

/// Intermediate TOML structure for parsing item bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    item_bank: TomlBankHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_scale_min")]
    default_scale_min: f64,
    #[serde(default = "default_scale_max")]
    default_scale_max: f64,
}

fn default_scale_min() -> f64 {
    1.0
}

fn default_scale_max() -> f64 {
    5.0
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    category: String,
    difficulty: f64,
    #[serde(default = "default_discrimination")]
    discrimination: f64,
    #[serde(default)]
    guessing: f64,
    #[serde(default)]
    scale_min: Option<f64>,
    #[serde(default)]
    scale_max: Option<f64>,
    #[serde(default)]
    content: Option<toml::Value>,
}

fn default_discrimination() -> f64 {
    1.0
}

/// Parse a single TOML file into an [`ItemBank`].
pub fn parse_item_bank(path: &Path) -> Result<ItemBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank file: {}", path.display()))?;

    parse_item_bank_str(&content, path)
}

/// Parse a TOML string into an [`ItemBank`] (useful for testing).
pub fn parse_item_bank_str(content: &str, source_path: &Path) -> Result<ItemBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let header = parsed.item_bank;
    let mut bank = ItemBank::new(header.id, header.name).with_description(header.description);

    for raw in parsed.items {
        let category: Category = raw
            .category
            .parse()
            .map_err(|e: String| anyhow::anyhow!("item {}: {}", raw.id, e))?;

        let scale = ResponseScale::new(
            raw.scale_min.unwrap_or(header.default_scale_min),
            raw.scale_max.unwrap_or(header.default_scale_max),
        );

        let content = match raw.content {
            Some(value) => serde_json::to_value(value)
                .with_context(|| format!("item {}: content is not representable", raw.id))?,
            None => serde_json::Value::Null,
        };

        let item = Item::new(
            raw.id,
            category,
            raw.difficulty,
            raw.discrimination,
            raw.guessing,
            scale,
        )?
        .with_content(content);

        bank.add_item(item)
            .with_context(|| format!("invalid item bank: {}", source_path.display()))?;
    }

    Ok(bank)
}

/// Recursively load all `.toml` item bank files from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<ItemBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_item_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// Load a bank from a file, or merge every bank found in a directory.
pub fn load_item_bank(path: &Path) -> Result<ItemBank> {
    if !path.is_dir() {
        return parse_item_bank(path);
    }

    let banks = load_bank_directory(path)?;
    anyhow::ensure!(!banks.is_empty(), "no item banks found in {}", path.display());
    if banks.len() == 1 {
        return Ok(banks.into_iter().next().unwrap_or_default());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "merged".to_string());
    let mut merged = ItemBank::new(name.clone(), name);
    for bank in banks {
        for item in bank.items() {
            merged
                .add_item(item.clone())
                .with_context(|| format!("merging bank {}", bank.id()))?;
        }
    }
    Ok(merged)
}

/// A warning from item bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The item ID (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an item bank for common psychometric issues.
pub fn validate_item_bank(bank: &ItemBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let counts = bank.category_counts();
    for category in Category::ALL {
        if !counts.contains_key(&category) {
            warnings.push(ValidationWarning {
                item_id: None,
                message: format!("category '{category}' has no items"),
            });
        }
    }

    if bank.len() < DEFAULT_MAX_QUESTIONS {
        warnings.push(ValidationWarning {
            item_id: None,
            message: format!(
                "bank has {} items, fewer than the default session length of {}",
                bank.len(),
                DEFAULT_MAX_QUESTIONS
            ),
        });
    }

    for item in bank.iter() {
        if item.discrimination < 0.3 {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!(
                    "low discrimination ({:.2}); item contributes little information",
                    item.discrimination
                ),
            });
        }
        if item.difficulty.abs() > 3.5 {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("extreme difficulty ({:.2})", item.difficulty),
            });
        }
        if item.guessing > 0.35 {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("high guessing parameter ({:.2})", item.guessing),
            });
        }
    }

    let mut seen_difficulties = HashSet::new();
    for item in bank.iter() {
        let key = (item.category, (item.difficulty * 1000.0).round() as i64);
        if !seen_difficulties.insert(key) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!(
                    "duplicates the difficulty of another '{}' item",
                    item.category
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[item_bank]
id = "mood"
name = "Mood Check"
description = "Short emotional-state bank"

[[items]]
id = "val-1"
category = "valencia"
difficulty = -0.5
discrimination = 1.4

[items.content]
text = "I feel good right now"

[[items]]
id = "mot-1"
category = "motivacao"
difficulty = 0.8
discrimination = 1.1
guessing = 0.1
scale_min = 0
scale_max = 10
"#;

    #[test]
    fn parse_valid_toml() {
        let bank = parse_item_bank_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(bank.id(), "mood");
        assert_eq!(bank.name(), "Mood Check");
        assert_eq!(bank.len(), 2);

        let val = bank.get("val-1").unwrap();
        assert_eq!(val.category, Category::Valencia);
        assert_eq!(val.scale, ResponseScale::likert5());
        assert_eq!(val.content["text"], "I feel good right now");

        let mot = bank.get("mot-1").unwrap();
        assert_eq!(mot.scale, ResponseScale::new(0.0, 10.0));
        assert_eq!(mot.guessing, 0.1);
    }

    #[test]
    fn parse_defaults() {
        let toml = r#"
[item_bank]
id = "minimal"
name = "Minimal"

[[items]]
id = "q1"
category = "ativacao"
difficulty = 0.0
"#;
        let bank = parse_item_bank_str(toml, &PathBuf::from("test.toml")).unwrap();
        let item = bank.get("q1").unwrap();
        assert_eq!(item.discrimination, 1.0);
        assert_eq!(item.guessing, 0.0);
    }

    #[test]
    fn parse_rejects_unknown_category() {
        let toml = r#"
[item_bank]
id = "bad"
name = "Bad"

[[items]]
id = "q1"
category = "humor"
difficulty = 0.0
"#;
        let err = parse_item_bank_str(toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("unknown category"));
    }

    #[test]
    fn parse_rejects_invalid_parameters() {
        let toml = r#"
[item_bank]
id = "bad"
name = "Bad"

[[items]]
id = "q1"
category = "valencia"
difficulty = 0.0
discrimination = -2.0
"#;
        assert!(parse_item_bank_str(toml, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn parse_rejects_duplicate_ids() {
        let toml = r#"
[item_bank]
id = "dupes"
name = "Dupes"

[[items]]
id = "same"
category = "valencia"
difficulty = 0.0

[[items]]
id = "same"
category = "motivacao"
difficulty = 1.0
"#;
        let err = parse_item_bank_str(toml, &PathBuf::from("dupes.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate item id"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_item_bank_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_flags_issues() {
        let toml = r#"
[item_bank]
id = "weak"
name = "Weak"

[[items]]
id = "flat"
category = "valencia"
difficulty = 3.9
discrimination = 0.1
guessing = 0.5
"#;
        let bank = parse_item_bank_str(toml, &PathBuf::from("weak.toml")).unwrap();
        let warnings = validate_item_bank(&bank);
        assert!(warnings.iter().any(|w| w.message.contains("low discrimination")));
        assert!(warnings.iter().any(|w| w.message.contains("extreme difficulty")));
        assert!(warnings.iter().any(|w| w.message.contains("high guessing")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("'motivacao' has no items")));
        assert!(warnings.iter().any(|w| w.message.contains("fewer than")));
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mood.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not toml {").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let banks = load_bank_directory(dir.path()).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].id(), "mood");

        let merged = load_item_bank(dir.path()).unwrap();
        assert_eq!(merged.len(), 2);
    }
}
