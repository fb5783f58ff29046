//! Insight request and response types
//!
//! These types are backend-agnostic and used across all implementations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Budget, Category, Expense, NewExpense};

/// Most recent expenses included in an analysis request
pub const MAX_DIGEST_EXPENSES: usize = 50;

/// Which insight operation a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ParseExpense,
    AnalyzeSpending,
}

/// A single structured-output generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub kind: RequestKind,
    /// Full prompt sent to the model
    pub prompt: String,
    /// The user text or digest the prompt was built from
    pub input: String,
    /// JSON schema of the expected response (OpenAPI subset, as Gemini takes it)
    pub schema: serde_json::Value,
}

/// Expense fields guessed from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExpense {
    pub amount: f64,
    pub category: Category,
    pub description: String,
    pub date: NaiveDate,
}

impl ParsedExpense {
    pub fn into_new_expense(self) -> NewExpense {
        NewExpense {
            amount: self.amount,
            category: self.category,
            description: self.description,
            date: self.date,
        }
    }
}

/// Amount as a model may return it: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => first_number(s),
        }
    }
}

/// First numeric token in `text`, e.g. `"Rs. 1,200.50 for 3"` gives 1200.5
///
/// Thousands separators are accepted between digits. A `-` directly before
/// the digits is kept so negative amounts can be rejected downstream.
fn first_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(char::is_ascii_digit)?;

    let mut token = String::new();
    if start > 0 && chars[start - 1] == '-' {
        token.push('-');
    }

    let next_is_digit = |i: usize| chars.get(i + 1).is_some_and(char::is_ascii_digit);
    let mut seen_point = false;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() => token.push(c),
            ',' if !seen_point && next_is_digit(i) => {}
            '.' if !seen_point && next_is_digit(i) => {
                seen_point = true;
                token.push('.');
            }
            _ => break,
        }
        i += 1;
    }
    token.parse().ok()
}

/// Parse response exactly as the model sent it, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParsedExpense {
    #[serde(default)]
    pub amount: Option<RawAmount>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl RawParsedExpense {
    /// Validate into a `ParsedExpense`
    ///
    /// Returns `None` without a usable amount. Unknown categories become
    /// `Other`, a missing or unreadable date becomes `today`, and a missing
    /// description falls back to the text the user typed.
    pub fn into_parsed(self, input: &str, today: NaiveDate) -> Option<ParsedExpense> {
        let amount = self.amount.as_ref().and_then(RawAmount::value)?;
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }

        let category = self
            .category
            .as_deref()
            .map(Category::from_label_lossy)
            .unwrap_or(Category::Other);

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| input.trim().to_string());

        let date = self
            .date
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(today);

        Some(ParsedExpense {
            amount,
            category,
            description,
            date,
        })
    }
}

/// Accept `YYYY-MM-DD`, optionally followed by a time part
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Narrative spending analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingAnalysis {
    pub summary: String,
    #[serde(default)]
    pub tips: Vec<String>,
}

impl SpendingAnalysis {
    /// Returned when no backend is configured; no request is attempted
    pub fn offline() -> Self {
        Self {
            summary: "Add your API key to enable AI insights for your finances.".to_string(),
            tips: vec![
                "Track every rupee spent.".to_string(),
                "Set strict monthly limits.".to_string(),
                "Avoid impulse buying.".to_string(),
            ],
        }
    }

    /// Returned when the backend call or its response fails
    pub fn unavailable() -> Self {
        Self {
            summary: "Could not analyze data at this time.".to_string(),
            tips: vec![
                "Check your internet connection.".to_string(),
                "Ensure API key is valid.".to_string(),
            ],
        }
    }
}

/// Bounded view of the data sent for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingDigest {
    /// Up to `MAX_DIGEST_EXPENSES`, most recent first
    pub expenses: Vec<Expense>,
    /// Budgets with a positive limit
    pub budgets: Vec<Budget>,
}

impl SpendingDigest {
    pub fn new(expenses: &[Expense], budgets: &[Budget]) -> Self {
        let mut recent = expenses.to_vec();
        recent.sort_by(|a, b| b.date.cmp(&a.date));
        recent.truncate(MAX_DIGEST_EXPENSES);

        Self {
            expenses: recent,
            budgets: budgets.iter().filter(|b| b.limit > 0.0).copied().collect(),
        }
    }

    /// One line per expense: `date: description (₹amount) - category`
    pub fn expense_lines(&self) -> String {
        self.expenses
            .iter()
            .map(|e| format!("{}: {} (₹{}) - {}", e.date, e.description, e.amount, e.category))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One line per budget: `category: ₹limit`
    pub fn budget_lines(&self) -> String {
        self.budgets
            .iter()
            .map(|b| format!("{}: ₹{}", b.category, b.limit))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
