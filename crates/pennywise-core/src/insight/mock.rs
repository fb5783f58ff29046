//! Mock backend for testing
//!
//! Answers deterministically without any network I/O. Useful for unit tests
//! and for trying the CLI without an API key (`AI_BACKEND=mock`).

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::models::Category;

use super::types::{GenerateRequest, RequestKind};
use super::InsightBackend;

/// Mock insight backend
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Fail every generate call (exercises fallbacks)
    pub failing: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            failing: false,
        }
    }

    /// Create a mock whose generate calls always fail
    pub fn failing() -> Self {
        Self {
            healthy: false,
            failing: true,
        }
    }
}

/// First number in the text, ignoring thousands separators
fn first_amount(text: &str) -> Option<f64> {
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || (c == '.' && !digits.is_empty()) {
            digits.push(c);
        } else if c == ',' && !digits.is_empty() {
            continue;
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.trim_end_matches('.').parse().ok()
}

fn guess_category(text: &str) -> Category {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["lunch", "dinner", "breakfast", "coffee", "chai", "pizza", "snack", "starbucks"]) {
        Category::Food
    } else if has(&["uber", "ola", "bus", "metro", "train", "auto", "cab", "petrol"]) {
        Category::Transport
    } else if has(&["rent", "electricity", "wifi", "internet", "water bill"]) {
        Category::Housing
    } else if has(&["movie", "netflix", "concert", "game", "spotify"]) {
        Category::Entertainment
    } else if has(&["book", "course", "tuition", "exam", "stationery"]) {
        Category::Education
    } else if has(&["shirt", "shoes", "amazon", "flipkart", "clothes"]) {
        Category::Shopping
    } else if has(&["doctor", "medicine", "pharmacy", "gym", "hospital"]) {
        Category::Health
    } else {
        Category::Other
    }
}

#[async_trait]
impl InsightBackend for MockBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        if self.failing {
            return Err(Error::InvalidData("Mock backend configured to fail".into()));
        }

        let response = match request.kind {
            RequestKind::ParseExpense => json!({
                "amount": first_amount(&request.input),
                "category": guess_category(&request.input).as_str(),
                "description": request.input.trim(),
            }),
            RequestKind::AnalyzeSpending => {
                let entries = request
                    .input
                    .lines()
                    .take_while(|l| !l.trim().is_empty())
                    .count();
                json!({
                    "summary": format!("Mock analysis of {} recent expenses.", entries),
                    "tips": [
                        "Cook at home twice a week.",
                        "Review subscriptions monthly.",
                        "Set a weekly cash limit."
                    ]
                })
            }
        };
        Ok(response.to_string())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
