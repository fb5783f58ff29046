//! Insight client: free-text expense parsing and spending analysis
//!
//! # Architecture
//!
//! - `InsightBackend` trait: one structured-output `generate` call plus
//!   health/identity accessors
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OpenAICompatibleBackend`,
//!   `MockBackend`
//! - `InsightClient`: the boundary callers use. It never returns an error;
//!   failures become `None` (parsing) or a fixed fallback payload (analysis).
//!
//! # Usage
//!
//! ```rust,ignore
//! let insights = InsightClient::from_config(&config.insight);
//! if let Some(parsed) = insights.parse_natural_language_expense("chai 20").await {
//!     store.add_expense(Expense::new(parsed.into_new_expense())?)?;
//! }
//! let analysis = insights.analyze_spending(&expenses, &budgets).await;
//! ```

pub mod gemini;
mod mock;
pub mod openai_compatible;
pub mod parsing;
pub mod prompts;
mod sequencer;
pub mod types;

#[cfg(test)]
mod server_tests;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use sequencer::{RequestSequencer, Ticket};
pub use types::*;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

use crate::config::{BackendKind, InsightConfig};
use crate::error::{Error, Result};
use crate::models::{Budget, Expense};

use parsing::{parse_analysis_response, parse_expense_response};

/// Trait implemented by every model backend
#[async_trait]
pub trait InsightBackend: Send + Sync {
    /// Send one prompt and return the raw response text
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete backend enum
#[derive(Clone)]
pub enum AIClient {
    Gemini(GeminiBackend),
    /// vLLM, LocalAI, llama-server, hosted OpenAI, etc.
    OpenAICompatible(OpenAICompatibleBackend),
    /// Deterministic offline backend
    Mock(MockBackend),
}

impl AIClient {
    /// Build the configured backend
    ///
    /// Returns `Ok(None)` when the configuration has no usable credential
    /// (Gemini without an API key, OpenAI-compatible without a host).
    pub fn from_config(config: &InsightConfig) -> Result<Option<Self>> {
        let model = config.model_or_default();
        match config.backend {
            BackendKind::Gemini => {
                let Some(api_key) = config.api_key.as_deref() else {
                    debug!("No Gemini API key configured");
                    return Ok(None);
                };
                let host = config
                    .host_or_default()
                    .unwrap_or(gemini::DEFAULT_GEMINI_HOST);
                Ok(Some(AIClient::Gemini(GeminiBackend::new(
                    host,
                    model,
                    api_key,
                    config.timeout,
                )?)))
            }
            BackendKind::OpenAICompatible => {
                let Some(host) = config.host_or_default() else {
                    debug!("No OpenAI-compatible host configured");
                    return Ok(None);
                };
                Ok(Some(AIClient::OpenAICompatible(
                    OpenAICompatibleBackend::new(
                        host,
                        model,
                        config.api_key.as_deref(),
                        config.timeout,
                    )?,
                )))
            }
            BackendKind::Mock => Ok(Some(AIClient::Mock(MockBackend::new()))),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Backend name for display
    pub fn kind(&self) -> BackendKind {
        match self {
            AIClient::Gemini(_) => BackendKind::Gemini,
            AIClient::OpenAICompatible(_) => BackendKind::OpenAICompatible,
            AIClient::Mock(_) => BackendKind::Mock,
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Gemini(b) => AIClient::Gemini(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }
}

// Implement InsightBackend for AIClient by delegating to the inner backend
#[async_trait]
impl InsightBackend for AIClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        match self {
            AIClient::Gemini(b) => b.generate(request).await,
            AIClient::OpenAICompatible(b) => b.generate(request).await,
            AIClient::Mock(b) => b.generate(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Failure-absorbing front for the configured backend
#[derive(Clone)]
pub struct InsightClient {
    backend: Option<AIClient>,
}

impl InsightClient {
    pub fn new(backend: Option<AIClient>) -> Self {
        Self { backend }
    }

    /// A client with no backend: parsing is unavailable, analysis is offline
    pub fn offline() -> Self {
        Self { backend: None }
    }

    /// Build from configuration; a backend that cannot be constructed
    /// leaves the client offline
    pub fn from_config(config: &InsightConfig) -> Self {
        match AIClient::from_config(config) {
            Ok(backend) => Self::new(backend),
            Err(e) => {
                warn!(error = %e, "Could not build insight backend, running offline");
                Self::offline()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&AIClient> {
        self.backend.as_ref()
    }

    /// Turn free text into expense fields, dated relative to today
    pub async fn parse_natural_language_expense(&self, text: &str) -> Option<ParsedExpense> {
        self.parse_natural_language_expense_on(text, Local::now().date_naive())
            .await
    }

    /// Turn free text into expense fields, with `today` as the default date
    pub async fn parse_natural_language_expense_on(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Option<ParsedExpense> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(backend) = &self.backend else {
            warn!("No insight backend configured, cannot parse expense text");
            return None;
        };

        let request = prompts::parse_expense_request(text, today);
        let result = backend
            .generate(&request)
            .await
            .and_then(|raw| parse_expense_response(&raw))
            .and_then(|raw| {
                raw.into_parsed(text, today).ok_or_else(|| {
                    Error::InvalidData("Parsed expense has no usable amount".into())
                })
            });

        match result {
            Ok(parsed) => {
                debug!(amount = parsed.amount, category = %parsed.category, "Parsed expense text");
                Some(parsed)
            }
            Err(e) => {
                warn!(error = %e, model = backend.model(), "Expense parsing failed");
                None
            }
        }
    }

    /// Summarize spending habits; never fails
    pub async fn analyze_spending(
        &self,
        expenses: &[Expense],
        budgets: &[Budget],
    ) -> SpendingAnalysis {
        let Some(backend) = &self.backend else {
            return SpendingAnalysis::offline();
        };

        let digest = SpendingDigest::new(expenses, budgets);
        let request = prompts::analyze_spending_request(&digest);
        debug!(
            expenses = digest.expenses.len(),
            budgets = digest.budgets.len(),
            "Requesting spending analysis"
        );

        match backend
            .generate(&request)
            .await
            .and_then(|raw| parse_analysis_response(&raw))
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, model = backend.model(), "Spending analysis failed");
                SpendingAnalysis::unavailable()
            }
        }
    }
}
