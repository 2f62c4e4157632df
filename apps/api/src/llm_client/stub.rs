//! A local stand-in for the Messages API, served by axum on an ephemeral port.
//! Tests point `LlmSettings::api_url` at it and script the replies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use super::{LlmClient, LlmSettings};

#[derive(Default)]
struct Exchange {
    replies: VecDeque<(StatusCode, Value)>,
    prompts: Vec<String>,
    api_keys: Vec<String>,
}

type Shared = Arc<Mutex<Exchange>>;

pub struct StubModel {
    url: String,
    exchange: Shared,
}

impl StubModel {
    /// Serves `replies` in order. The last reply repeats once the rest are used up.
    pub async fn serve(replies: Vec<(StatusCode, Value)>) -> Self {
        let exchange: Shared = Arc::new(Mutex::new(Exchange {
            replies: replies.into(),
            ..Exchange::default()
        }));
        let app = Router::new()
            .route("/v1/messages", post(reply))
            .with_state(exchange.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/messages", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self { url, exchange }
    }

    pub fn client(&self) -> LlmClient {
        LlmClient::new(LlmSettings {
            api_key: "test-key".to_string(),
            api_url: self.url.clone(),
            timeout: Duration::from_secs(5),
            retry_base_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    pub fn calls(&self) -> usize {
        self.exchange.lock().unwrap().prompts.len()
    }

    /// User prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.exchange.lock().unwrap().prompts.clone()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.exchange.lock().unwrap().api_keys.clone()
    }
}

/// A successful Messages API response whose only text block is `text`.
pub fn text_reply(text: &str) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }),
    )
}

pub fn error_reply(status: StatusCode, message: &str) -> (StatusCode, Value) {
    (
        status,
        json!({"type": "error", "error": {"type": "api_error", "message": message}}),
    )
}

async fn reply(
    State(exchange): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut exchange = exchange.lock().unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    exchange.prompts.push(prompt.to_string());
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    exchange.api_keys.push(key.to_string());

    let next = if exchange.replies.len() > 1 {
        exchange.replies.pop_front()
    } else {
        exchange.replies.front().cloned()
    };
    let (status, body) = next.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, json!({})));
    (status, Json(body))
}
