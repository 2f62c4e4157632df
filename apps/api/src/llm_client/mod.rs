/// LLM Client: the single point of entry for hosted model calls.
///
/// No other module talks to the model API directly. The credential is handed
/// in at construction from `Config`; nothing caches it globally and no
/// endpoint ever returns it.
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
#[cfg(test)]
pub(crate) mod stub;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Model used for contract analysis. Pinned so scores stay comparable.
pub const MODEL: &str = "claude-sonnet-4-5";
/// Analyses of long contracts produce many clauses; leave room for them.
const MAX_TOKENS: u32 = 8192;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Connection settings for [`LlmClient`].
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub api_url: String,
    pub timeout: Duration,
    /// First backoff delay; doubles on each further retry.
    pub retry_base_delay: Duration,
}

impl LlmSettings {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(120),
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Wraps the Messages API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    retry_base_delay: Duration,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(settings.timeout).build()?,
            api_key: settings.api_key,
            api_url: settings.api_url,
            retry_base_delay: settings.retry_base_delay,
        })
    }

    /// Makes a raw call, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            // Scoring should be as repeatable as the model allows.
            temperature: 0.0,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: base, then 2x base
                let delay = self.retry_base_delay * (1 << (attempt - 1));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Calls the model and returns its text, for pass-through checks.
    pub async fn call_text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    /// Calls the model and deserializes the JSON object in its reply.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.call_text(prompt, system).await?;
        serde_json::from_str(extract_json_object(&text)).map_err(LlmError::Parse)
    }
}

/// Pulls the JSON payload out of a model reply: strips ```json fences and any
/// prose before the first `{` or after the last `}`.
fn extract_json_object(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|inner| inner.trim().trim_end_matches("```").trim())
        .unwrap_or(text);

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::stub::{error_reply, text_reply, StubModel};
    use super::*;

    #[test]
    fn test_extract_json_with_json_fence() {
        let input = "```json\n{\"riskScore\": 40}\n```";
        assert_eq!(extract_json_object(input), "{\"riskScore\": 40}");
    }

    #[test]
    fn test_extract_json_with_bare_fence() {
        let input = "```\n{\"riskScore\": 40}\n```";
        assert_eq!(extract_json_object(input), "{\"riskScore\": 40}");
    }

    #[test]
    fn test_extract_json_no_fence() {
        let input = "{\"riskScore\": 40}";
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn test_extract_json_drops_surrounding_prose() {
        let input = "Here is the analysis:\n{\"a\": {\"b\": 1}}\nLet me know!";
        assert_eq!(extract_json_object(input), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_extract_json_without_object_returns_trimmed_text() {
        assert_eq!(extract_json_object("  no json here "), "no json here");
    }

    #[test]
    fn test_settings_default_to_public_endpoint() {
        let settings = LlmSettings::new("key".to_string());
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.timeout, Duration::from_secs(120));
        assert_eq!(settings.retry_base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let response: LlmResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "thinking", "text": null},
                {"type": "text", "text": "{}"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 2}
        }))
        .unwrap();
        assert_eq!(response.text(), Some("{}"));
    }

    // ── Over HTTP, against a local stand-in ─────────────────────────────────

    #[tokio::test]
    async fn test_call_sends_prompt_and_key() {
        let model = StubModel::serve(vec![text_reply("pong")]).await;
        let text = model.client().call_text("ping", "system").await.unwrap();
        assert_eq!(text, "pong");
        assert_eq!(model.prompts(), vec!["ping".to_string()]);
        assert_eq!(model.api_keys(), vec!["test-key".to_string()]);
    }

    #[tokio::test]
    async fn test_call_retries_rate_limit_and_server_errors() {
        let model = StubModel::serve(vec![
            error_reply(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            error_reply(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
            text_reply("```json\n{\"riskScore\": 40}\n```"),
        ])
        .await;
        let value: serde_json::Value = model.client().call_json("ping", "system").await.unwrap();
        assert_eq!(value["riskScore"], 40);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_call_gives_up_after_max_retries() {
        let model =
            StubModel::serve(vec![error_reply(StatusCode::TOO_MANY_REQUESTS, "slow down")]).await;
        let err = model.client().call("ping", "system").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }), "got {err:?}");
        assert_eq!(model.calls(), MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let model =
            StubModel::serve(vec![error_reply(StatusCode::BAD_REQUEST, "prompt is too long")])
                .await;
        let err = model.client().call("ping", "system").await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "prompt is too long");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_parse_error() {
        let model = StubModel::serve(vec![text_reply("{\"riskScore\": 40, \"clauses\": [")]).await;
        let err = model
            .client()
            .call_json::<serde_json::Value>("ping", "system")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
        assert_eq!(model.calls(), 1);
    }
}
