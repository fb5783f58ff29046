//! Prompt templates and response schemas
//!
//! Templates use mustache-style `{{var}}` placeholders. Schemas follow the
//! OpenAPI subset the Gemini API accepts as `responseSchema`.

use chrono::NaiveDate;
use serde_json::json;

use crate::models::Category;

use super::types::{GenerateRequest, RequestKind, SpendingDigest};

const PARSE_EXPENSE: &str = "\
Extract expense details from this text: \"{{input}}\". Today is {{today}}. \
If the date is not specified, use today. Dates are YYYY-MM-DD. \
The currency is Indian Rupees (INR), but do not include the symbol in the amount number. \
Map category to exactly one of: {{categories}}.";

const ANALYZE_SPENDING: &str = "\
You are a financial advisor for an Indian student.
Analyze these recent expenses (in INR) and budgets.
Provide a brief summary of their spending habits (max 2 sentences) and 3 specific, \
actionable tips to save money or stay on budget.

Expenses:
{{expenses}}

Budgets:
{{budgets}}
";

/// Replace each `{{key}}` in `template` in a single pass
///
/// Substituted values are never rescanned, so placeholders inside user text
/// stay literal. Unknown placeholders are left as they are.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };
        let key = &after[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    result.push_str(rest);
    result
}

fn category_list() -> String {
    Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the request for turning free text into an expense
pub fn parse_expense_request(text: &str, today: NaiveDate) -> GenerateRequest {
    let today = today.format("%Y-%m-%d").to_string();
    let categories = category_list();
    let prompt = render(
        PARSE_EXPENSE,
        &[
            ("input", text),
            ("today", &today),
            ("categories", &categories),
        ],
    );

    GenerateRequest {
        kind: RequestKind::ParseExpense,
        prompt,
        input: text.to_string(),
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "amount": { "type": "NUMBER" },
                "category": { "type": "STRING" },
                "description": { "type": "STRING" },
                "date": { "type": "STRING" }
            },
            "required": ["amount", "category", "description", "date"]
        }),
    }
}

/// Build the request for a narrative spending analysis
pub fn analyze_spending_request(digest: &SpendingDigest) -> GenerateRequest {
    let expenses = digest.expense_lines();
    let budgets = digest.budget_lines();
    let prompt = render(
        ANALYZE_SPENDING,
        &[("expenses", &expenses), ("budgets", &budgets)],
    );

    GenerateRequest {
        kind: RequestKind::AnalyzeSpending,
        prompt,
        input: format!("{}\n\n{}", expenses, budgets),
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "summary": { "type": "STRING" },
                "tips": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["summary", "tips"]
        }),
    }
}
