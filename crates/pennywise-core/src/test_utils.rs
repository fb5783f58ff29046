//! Test utilities for pennywise-core
//!
//! A mock insight server speaking both the Gemini `generateContent` API and
//! the OpenAI chat completions API. It counts generate requests and can be
//! switched to answer with garbage or HTTP 500.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// How the server answers generate requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Well-formed JSON payloads
    Valid,
    /// 200 OK with text that contains no JSON
    Garbage,
    /// HTTP 500
    ServerError,
}

struct MockState {
    mode: Mutex<MockMode>,
    requests: AtomicUsize,
    parse_response: Mutex<Value>,
    analysis_response: Mutex<Value>,
    last_prompt: Mutex<Option<String>>,
}

/// Mock insight server for integration tests
pub struct MockInsightServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockInsightServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            mode: Mutex::new(MockMode::Valid),
            requests: AtomicUsize::new(0),
            parse_response: Mutex::new(json!({
                "amount": 350,
                "category": "Food & Drink",
                "description": "Starbucks coffee",
                "date": "2024-03-05"
            })),
            analysis_response: Mutex::new(json!({
                "summary": "Most of your money goes to food.",
                "tips": ["Cook at home.", "Carry a water bottle.", "Plan weekly meals."]
            })),
            last_prompt: Mutex::new(None),
        });

        let app = Router::new()
            .route(
                "/v1beta/models/:model",
                get(handle_model_info).post(handle_gemini_generate),
            )
            .route("/v1/models", get(handle_model_info))
            .route("/v1/chat/completions", post(handle_chat_completion))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_mode(&self, mode: MockMode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    /// Payload returned for expense parsing requests
    pub fn set_parse_response(&self, value: Value) {
        *self.state.parse_response.lock().unwrap() = value;
    }

    /// Payload returned for spending analysis requests
    pub fn set_analysis_response(&self, value: Value) {
        *self.state.analysis_response.lock().unwrap() = value;
    }

    /// Number of generate requests received (health checks excluded)
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Prompt text of the most recent generate request
    pub fn last_prompt(&self) -> Option<String> {
        self.state.last_prompt.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockInsightServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Record the request and pick the answer text, or fail with 500
fn answer(state: &MockState, prompt: String) -> Result<String, StatusCode> {
    state.requests.fetch_add(1, Ordering::SeqCst);

    // Prompt wording from insight::prompts
    let is_parse = prompt.contains("Extract expense details");
    *state.last_prompt.lock().unwrap() = Some(prompt);

    match *state.mode.lock().unwrap() {
        MockMode::ServerError => Err(StatusCode::INTERNAL_SERVER_ERROR),
        MockMode::Garbage => Ok("I'm sorry, I can't help with budgeting today.".to_string()),
        MockMode::Valid => {
            let payload = if is_parse {
                state.parse_response.lock().unwrap().clone()
            } else {
                state.analysis_response.lock().unwrap().clone()
            };
            Ok(payload.to_string())
        }
    }
}

async fn handle_model_info() -> Json<Value> {
    Json(json!({ "name": "models/mock", "data": [{ "id": "mock" }] }))
}

/// Gemini generateContent endpoint (`/v1beta/models/{model}:generateContent`)
async fn handle_gemini_generate(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> Response {
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    match answer(&state, prompt) {
        Ok(text) => Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        }))
        .into_response(),
        Err(status) => (status, "internal error").into_response(),
    }
}

/// OpenAI chat completions endpoint
async fn handle_chat_completion(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> Response {
    let prompt = body["messages"][0]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let model = body["model"].as_str().unwrap_or("mock").to_string();

    match answer(&state, prompt) {
        Ok(text) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        Err(status) => (status, "internal error").into_response(),
    }
}
