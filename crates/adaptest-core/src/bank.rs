//! The item bank: an ordered catalog of validated items.
//!
//! Banks are populated before sessions start and then shared read-only
//! (typically behind an `Arc`). Bank order is significant: it breaks ties
//! during item selection.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, AssessmentResult};
use crate::model::{Category, Item};

/// Ordered collection of items with id lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BankRepr", into = "BankRepr")]
pub struct ItemBank {
    id: String,
    name: String,
    description: String,
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct BankRepr {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    items: Vec<Item>,
}

impl From<BankRepr> for ItemBank {
    fn from(repr: BankRepr) -> Self {
        let mut bank = ItemBank::new(repr.id, repr.name).with_description(repr.description);
        for item in repr.items {
            if let Err(e) = bank.add_item(item) {
                tracing::warn!("dropping item while deserializing bank: {e}");
            }
        }
        bank
    }
}

impl From<ItemBank> for BankRepr {
    fn from(bank: ItemBank) -> Self {
        Self {
            id: bank.id,
            name: bank.name,
            description: bank.description,
            items: bank.items,
        }
    }
}

impl ItemBank {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build a bank from items, failing on the first invalid or duplicate item.
    pub fn from_items(
        id: impl Into<String>,
        name: impl Into<String>,
        items: impl IntoIterator<Item = Item>,
    ) -> AssessmentResult<Self> {
        let mut bank = Self::new(id, name);
        for item in items {
            bank.add_item(item)?;
        }
        Ok(bank)
    }

    /// Append an item. Only safe between sessions.
    pub fn add_item(&mut self, item: Item) -> AssessmentResult<()> {
        item.validate()?;
        if self.index.contains_key(&item.id) {
            return Err(AssessmentError::DuplicateItem(item.id));
        }
        self.index.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    /// Look up an item or fail with [`AssessmentError::UnknownItem`].
    pub fn require(&self, id: &str) -> AssessmentResult<&Item> {
        self.get(id)
            .ok_or_else(|| AssessmentError::UnknownItem(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Items in bank order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |i| i.category == category)
    }

    /// Item count per category, in category order.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn summary(&self) -> BankSummary {
        BankSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            item_count: self.items.len(),
        }
    }
}

/// Summary of a bank (without the items).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSummary {
    pub id: String,
    pub name: String,
    pub item_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResponseScale;

    fn item(id: &str, category: Category) -> Item {
        Item::new(id, category, 0.0, 1.0, 0.0, ResponseScale::likert5()).unwrap()
    }

    #[test]
    fn add_and_lookup_preserves_order() {
        let bank = ItemBank::from_items(
            "b",
            "Bank",
            vec![
                item("q2", Category::Valencia),
                item("q1", Category::Motivacao),
                item("q3", Category::Valencia),
            ],
        )
        .unwrap();

        assert_eq!(bank.len(), 3);
        let ids: Vec<&str> = bank.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["q2", "q1", "q3"]);
        assert_eq!(bank.get("q1").unwrap().category, Category::Motivacao);
        assert!(bank.get("missing").is_none());
        assert_eq!(bank.by_category(Category::Valencia).count(), 2);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut bank = ItemBank::new("b", "Bank");
        bank.add_item(item("q1", Category::Valencia)).unwrap();
        let err = bank.add_item(item("q1", Category::Ativacao)).unwrap_err();
        assert_eq!(err, AssessmentError::DuplicateItem("q1".into()));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn require_reports_unknown_item() {
        let bank = ItemBank::new("b", "Bank");
        assert_eq!(
            bank.require("nope").unwrap_err(),
            AssessmentError::UnknownItem("nope".into())
        );
    }

    #[test]
    fn invalid_items_rejected() {
        let mut bank = ItemBank::new("b", "Bank");
        let mut bad = item("q1", Category::Valencia);
        bad.discrimination = -1.0;
        assert!(bank.add_item(bad).is_err());
        assert!(bank.is_empty());
    }

    #[test]
    fn category_counts() {
        let bank = ItemBank::from_items(
            "b",
            "Bank",
            vec![
                item("q1", Category::Valencia),
                item("q2", Category::Valencia),
                item("q3", Category::Concentracao),
            ],
        )
        .unwrap();
        let counts = bank.category_counts();
        assert_eq!(counts.get(&Category::Valencia), Some(&2));
        assert_eq!(counts.get(&Category::Concentracao), Some(&1));
        assert_eq!(counts.get(&Category::Motivacao), None);
    }

    #[test]
    fn serde_rebuilds_index() {
        let bank = ItemBank::from_items("b", "Bank", vec![item("q1", Category::Valencia)]).unwrap();
        let json = serde_json::to_string(&bank).unwrap();
        let loaded: ItemBank = serde_json::from_str(&json).unwrap();
        assert!(loaded.contains("q1"));
        assert_eq!(loaded.name(), "Bank");
    }
}
