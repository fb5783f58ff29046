//! Domain models for Pennywise

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Spending category
///
/// Closed set. The display label is also the persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Food,
    Transport,
    Housing,
    Entertainment,
    Education,
    Shopping,
    Health,
    Other,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Category; 8] = [
        Self::Food,
        Self::Transport,
        Self::Housing,
        Self::Entertainment,
        Self::Education,
        Self::Shopping,
        Self::Health,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food & Drink",
            Self::Transport => "Transportation",
            Self::Housing => "Housing & Utilities",
            Self::Entertainment => "Entertainment",
            Self::Education => "Education",
            Self::Shopping => "Shopping",
            Self::Health => "Health",
            Self::Other => "Other",
        }
    }

    /// Match an exact label, falling back to `Other`
    ///
    /// Used for anything that did not come from our own enum: stored records
    /// written by another version and categories guessed by the AI backend.
    pub fn from_label_lossy(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == label.trim())
            .unwrap_or(Self::Other)
    }

    /// Starting limit used when the budget collection is first seeded
    pub fn default_limit(&self) -> f64 {
        match self {
            Self::Food => 5000.0,
            Self::Entertainment => 1500.0,
            _ => 0.0,
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(c) = Self::ALL
            .into_iter()
            .find(|c| c.as_str().to_lowercase() == lower)
        {
            return Ok(c);
        }
        match lower.as_str() {
            "food" | "drink" | "dining" => Ok(Self::Food),
            "transport" | "travel" => Ok(Self::Transport),
            "housing" | "utilities" | "rent" => Ok(Self::Housing),
            "fun" => Ok(Self::Entertainment),
            "school" => Ok(Self::Education),
            "medical" => Ok(Self::Health),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Self::from_label_lossy(&label)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// A recorded expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub category: Category,
    pub description: String,
    pub date: NaiveDate,
}

impl Expense {
    /// Create an expense with a fresh id
    pub fn new(draft: NewExpense) -> Result<Self> {
        validate_amount("amount", draft.amount)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            amount: draft.amount,
            category: draft.category,
            description: draft.description,
            date: draft.date,
        })
    }
}

/// Expense fields before an id has been assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: f64,
    pub category: Category,
    pub description: String,
    pub date: NaiveDate,
}

/// Monthly spending cap for a category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub category: Category,
    pub limit: f64,
}

/// One of the two persisted record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Expenses,
    Budgets,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Self::Expenses, Self::Budgets];

    /// Storage key holding this collection
    pub fn key(&self) -> &'static str {
        match self {
            Self::Expenses => "expenses",
            Self::Budgets => "budgets",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Reject negative, NaN and infinite money values
pub(crate) fn validate_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidData(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip_through_json() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
            let back: Category = serde_json::from_str(&json).unwrap();
            assert_eq!(back, category);
        }
    }

    #[test]
    fn test_unknown_label_coerces_to_other() {
        let c: Category = serde_json::from_str("\"Groceries\"").unwrap();
        assert_eq!(c, Category::Other);
        assert_eq!(Category::from_label_lossy("food & drink"), Category::Other);
        assert_eq!(Category::from_label_lossy(" Health "), Category::Health);
    }

    #[test]
    fn test_category_from_str_aliases() {
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!(
            "housing & utilities".parse::<Category>().unwrap(),
            Category::Housing
        );
        assert_eq!("transport".parse::<Category>().unwrap(), Category::Transport);
        assert!("groceries".parse::<Category>().is_err());
    }

    #[test]
    fn test_default_limits() {
        assert_eq!(Category::Food.default_limit(), 5000.0);
        assert_eq!(Category::Entertainment.default_limit(), 1500.0);
        assert_eq!(Category::Health.default_limit(), 0.0);
    }

    #[test]
    fn test_expense_new_assigns_unique_ids() {
        let draft = NewExpense {
            amount: 250.0,
            category: Category::Food,
            description: "Lunch".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        let a = Expense::new(draft.clone()).unwrap();
        let b = Expense::new(draft).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.amount, 250.0);
    }

    #[test]
    fn test_expense_new_rejects_negative_and_nan() {
        let mut draft = NewExpense {
            amount: -1.0,
            category: Category::Other,
            description: "Refund".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        assert!(matches!(Expense::new(draft.clone()), Err(Error::InvalidData(_))));
        draft.amount = f64::NAN;
        assert!(Expense::new(draft).is_err());
    }

    #[test]
    fn test_expense_json_layout() {
        let expense = Expense {
            id: "abc".to_string(),
            amount: 100.0,
            category: Category::Transport,
            description: "Metro card".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let value = serde_json::to_value(&expense).unwrap();
        assert_eq!(value["category"], "Transportation");
        assert_eq!(value["date"], "2024-01-01");
        assert_eq!(value["id"], "abc");
    }

    #[test]
    fn test_collection_keys() {
        assert_eq!(Collection::from_key("expenses"), Some(Collection::Expenses));
        assert_eq!(Collection::from_key("budgets"), Some(Collection::Budgets));
        assert_eq!(Collection::from_key("other"), None);
    }
}
