//! JSON parsing helpers for insight responses
//!
//! Models often wrap the JSON payload in prose or code fences, so the
//! outermost `{...}` span is extracted before deserializing.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::types::{RawParsedExpense, SpendingAnalysis};

/// Longest slice of a bad response quoted in an error message
const RAW_PREVIEW_LEN: usize = 200;

fn preview(s: &str) -> String {
    if s.len() > RAW_PREVIEW_LEN {
        let mut end = RAW_PREVIEW_LEN;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    } else {
        s.to_string()
    }
}

/// Deserialize the first top-level JSON object found in `response`
pub fn extract_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid JSON from model: {} | Raw: {}",
                    e,
                    preview(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in model response | Raw: {}",
            preview(response)
        ))),
    }
}

/// Parse a natural-language expense response
pub fn parse_expense_response(response: &str) -> Result<RawParsedExpense> {
    extract_json(response)
}

/// Parse a spending analysis response; an empty summary is rejected
pub fn parse_analysis_response(response: &str) -> Result<SpendingAnalysis> {
    let mut analysis: SpendingAnalysis = extract_json(response)?;
    analysis.summary = analysis.summary.trim().to_string();
    if analysis.summary.is_empty() {
        return Err(Error::InvalidData("Analysis response has no summary".into()));
    }
    analysis.tips = analysis
        .tips
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    Ok(analysis)
}
