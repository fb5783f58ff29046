//! Insight client tests against the mock HTTP server

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use super::*;
use crate::config::{BackendKind, InsightConfig};
use crate::models::Category;
use crate::test_utils::{MockInsightServer, MockMode};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
}

fn gemini_client(server: &MockInsightServer) -> InsightClient {
    InsightClient::from_config(&InsightConfig {
        backend: BackendKind::Gemini,
        api_key: Some("test-key".into()),
        host: Some(server.url()),
        model: None,
        timeout: Duration::from_secs(5),
    })
}

fn openai_client(server: &MockInsightServer) -> InsightClient {
    InsightClient::from_config(&InsightConfig {
        backend: BackendKind::OpenAICompatible,
        api_key: None,
        host: Some(server.url()),
        model: Some("llama3.2".into()),
        timeout: Duration::from_secs(5),
    })
}

fn sample_expenses() -> Vec<Expense> {
    vec![
        Expense {
            id: "a".into(),
            amount: 250.0,
            category: Category::Food,
            description: "Pizza".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        },
        Expense {
            id: "b".into(),
            amount: 100.0,
            category: Category::Transport,
            description: "Bus pass".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        },
    ]
}

#[tokio::test]
async fn test_gemini_parse_expense() {
    let server = MockInsightServer::start().await;
    let client = gemini_client(&server);

    let parsed = client
        .parse_natural_language_expense_on("Starbucks 350 yesterday", today())
        .await
        .unwrap();

    assert_eq!(parsed.amount, 350.0);
    assert_eq!(parsed.category, Category::Food);
    assert_eq!(parsed.description, "Starbucks coffee");
    assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    assert_eq!(server.request_count(), 1);

    let prompt = server.last_prompt().unwrap();
    assert!(prompt.contains("Starbucks 350 yesterday"));
    assert!(prompt.contains("2024-03-06"));
}

#[tokio::test]
async fn test_unknown_category_and_missing_date() {
    let server = MockInsightServer::start().await;
    server.set_parse_response(json!({
        "amount": 80,
        "category": "Beverages",
        "description": "Chai"
    }));
    let client = gemini_client(&server);

    let parsed = client
        .parse_natural_language_expense_on("chai 80", today())
        .await
        .unwrap();
    assert_eq!(parsed.category, Category::Other);
    assert_eq!(parsed.date, today());
}

#[tokio::test]
async fn test_parse_failures_are_none() {
    let server = MockInsightServer::start().await;
    let client = gemini_client(&server);

    server.set_mode(MockMode::Garbage);
    assert!(client
        .parse_natural_language_expense_on("chai 80", today())
        .await
        .is_none());

    server.set_mode(MockMode::ServerError);
    assert!(client
        .parse_natural_language_expense_on("chai 80", today())
        .await
        .is_none());

    // Single attempt per call, no retries
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn test_gemini_analysis() {
    let server = MockInsightServer::start().await;
    let client = gemini_client(&server);
    let budgets = vec![
        Budget {
            category: Category::Food,
            limit: 5000.0,
        },
        Budget {
            category: Category::Health,
            limit: 0.0,
        },
    ];

    let analysis = client.analyze_spending(&sample_expenses(), &budgets).await;
    assert_eq!(analysis.summary, "Most of your money goes to food.");
    assert_eq!(analysis.tips.len(), 3);

    let prompt = server.last_prompt().unwrap();
    assert!(prompt.contains("2024-03-01: Pizza (₹250) - Food & Drink"));
    assert!(prompt.contains("Food & Drink: ₹5000"));
    assert!(!prompt.contains("Health"));
}

#[tokio::test]
async fn test_analysis_failures_use_unavailable_payload() {
    let server = MockInsightServer::start().await;
    let client = gemini_client(&server);

    server.set_mode(MockMode::ServerError);
    assert_eq!(
        client.analyze_spending(&sample_expenses(), &[]).await,
        SpendingAnalysis::unavailable()
    );

    server.set_mode(MockMode::Garbage);
    assert_eq!(
        client.analyze_spending(&sample_expenses(), &[]).await,
        SpendingAnalysis::unavailable()
    );

    server.set_mode(MockMode::Valid);
    server.set_analysis_response(json!({ "tips": ["no summary"] }));
    assert_eq!(
        client.analyze_spending(&sample_expenses(), &[]).await,
        SpendingAnalysis::unavailable()
    );
}

#[tokio::test]
async fn test_no_credential_makes_no_requests() {
    let server = MockInsightServer::start().await;
    let client = InsightClient::from_config(&InsightConfig {
        backend: BackendKind::Gemini,
        api_key: None,
        host: Some(server.url()),
        model: None,
        timeout: Duration::from_secs(5),
    });

    assert!(!client.is_configured());
    assert_eq!(
        client.analyze_spending(&sample_expenses(), &[]).await,
        SpendingAnalysis::offline()
    );
    assert!(client
        .parse_natural_language_expense_on("chai 80", today())
        .await
        .is_none());
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_openai_compatible_round_trip() {
    let server = MockInsightServer::start().await;
    let client = openai_client(&server);

    let parsed = client
        .parse_natural_language_expense_on("Starbucks 350", today())
        .await
        .unwrap();
    assert_eq!(parsed.amount, 350.0);

    let analysis = client.analyze_spending(&sample_expenses(), &[]).await;
    assert_eq!(analysis.summary, "Most of your money goes to food.");

    let prompt = server.last_prompt().unwrap();
    assert!(prompt.contains("Respond with only a JSON object"));
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn test_health_checks() {
    let server = MockInsightServer::start().await;

    let gemini = gemini_client(&server);
    assert!(gemini.backend().unwrap().health_check().await);

    let openai = openai_client(&server);
    assert!(openai.backend().unwrap().health_check().await);

    assert_eq!(server.request_count(), 0);
}
