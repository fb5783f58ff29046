//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API
//! (vLLM, LocalAI, llama-server, Docker Model Runner, hosted OpenAI).
//!
//! # Configuration
//!
//! - `OPENAI_COMPATIBLE_HOST`: server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: model name (default: gpt-3.5-turbo)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::GenerateRequest;
use super::InsightBackend;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI-compatible backend
///
/// There is no portable structured-output switch across these servers, so
/// the response schema is appended to the prompt and the JSON is extracted
/// from whatever text comes back.
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref api_key) => builder.header("Authorization", format!("Bearer {}", api_key)),
            None => builder,
        }
    }
}

fn prompt_with_schema(request: &GenerateRequest) -> String {
    format!(
        "{}\n\nRespond with only a JSON object matching this schema:\n{}",
        request.prompt, request.schema
    )
}

#[async_trait]
impl InsightBackend for OpenAICompatibleBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt_with_schema(request),
            }],
            temperature: Some(0.1),
            stream: false,
        };

        debug!(model = %self.model, kind = ?request.kind, "Chat completion");

        let response = self
            .authorize(
                self.http_client
                    .post(format!("{}/v1/chat/completions", self.base_url)),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("No response from OpenAI API".into()))
    }

    async fn health_check(&self) -> bool {
        // /v1/models is the standard endpoint
        if let Ok(resp) = self
            .authorize(self.http_client.get(format!("{}/v1/models", self.base_url)))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        // /health is common for LocalAI and llama-server
        matches!(
            self.http_client
                .get(format!("{}/health", self.base_url))
                .send()
                .await,
            Ok(resp) if resp.status().is_success()
        )
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}
