//! AI gateway client: the single point of entry for all OpenRouter calls.
//!
//! ARCHITECTURAL RULE: No other module may call the OpenRouter API directly.
//! All completion requests MUST go through this module, which enforces the
//! local rate limit, classifies transport failures into typed errors, retries
//! transient failures with exponential backoff, and logs every body through
//! the redacting logger.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod catalog;
pub mod logger;
pub mod rate_limit;

use logger::SafeLogger;
use rate_limit::RateLimiter;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const CHAT_COMPLETIONS_ENDPOINT: &str = "/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_REQUESTS_PER_MINUTE: usize = 60;

/// HTTP status codes worth retrying: request timeout, upstream rate limit,
/// and transient 5xx families.
const RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

// ────────────────────────────────────────────────────────────────────────────
// Error taxonomy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Request timed out after {}s", REQUEST_TIMEOUT.as_secs())]
    Timeout,

    #[error("Network connection failed")]
    Network(#[source] reqwest::Error),

    #[error("API error (status {status})")]
    Api { status: u16, data: Option<Value> },

    #[error("Authentication failed: invalid or expired API key")]
    Authentication,

    #[error("Invalid response structure: {0}")]
    Validation(String),

    #[error("Could not extract flashcards from model response: {0:?}")]
    Parsing(String),

    #[error("Local rate limit exceeded ({limit}/min), retry in {wait_secs}s")]
    RateLimited { limit: usize, wait_secs: u64 },

    #[error("Unexpected error during API communication")]
    Unknown(#[source] anyhow::Error),
}

impl AiError {
    /// Stable error-kind tag used in audit rows.
    pub fn code(&self) -> &'static str {
        match self {
            AiError::Timeout => "timeout",
            AiError::Network(_) => "network",
            AiError::Api { .. } => "api",
            AiError::Authentication => "authentication",
            AiError::Validation(_) => "validation",
            AiError::Parsing(_) => "parsing",
            AiError::RateLimited { .. } => "rate_limited",
            AiError::Unknown(_) => "unknown",
        }
    }

    /// Transient failures that a sequential retry may fix. Local rate-limit
    /// hits are excluded: retrying immediately would burn the retry budget
    /// against our own quota.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Timeout | AiError::Network(_) => true,
            AiError::Api { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            _ => false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (OpenRouter chat-completions schema)
// ────────────────────────────────────────────────────────────────────────────

/// Sampling parameters passed through to the gateway unmodified.
#[derive(Debug, Clone, Serialize)]
pub struct ModelParameters {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// A named strict JSON-schema descriptor sent as `response_format`.
///
/// This is a hint only: providers are not guaranteed to honor it, so the
/// response recovery pipeline independently validates whatever comes back.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub json_schema: JsonSchemaSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaSpec {
    pub name: &'static str,
    pub strict: bool,
    pub schema: Value,
}

/// The `{flashcards: [{front, back}]}` schema requested from the provider.
pub fn flashcards_response_format() -> ResponseFormat {
    ResponseFormat {
        kind: "json_schema",
        json_schema: JsonSchemaSpec {
            name: "flashcards",
            strict: true,
            schema: json!({
                "type": "object",
                "properties": {
                    "flashcards": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "front": { "type": "string" },
                                "back": { "type": "string" }
                            },
                            "required": ["front", "back"]
                        }
                    }
                },
                "required": ["flashcards"]
            }),
        },
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a ResponseFormat>,
    #[serde(flatten)]
    parameters: &'a ModelParameters,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatResponse {
    /// Returns the first choice's message content, or a `Validation` error
    /// when the provider sent an empty choice list.
    pub fn content(&self) -> Result<&str, AiError> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AiError::Validation("response contains no choices".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Low-level HTTP client
// ────────────────────────────────────────────────────────────────────────────

/// Thin POST client around the completion endpoint: serializes the payload,
/// applies the hard timeout, and classifies failures into `AiError` kinds.
struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    logger: SafeLogger,
}

impl ApiClient {
    fn new(base_url: String, api_key: String, logger: SafeLogger) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AiError::Unknown(e.into()))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            logger,
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &impl Serialize,
    ) -> Result<T, AiError> {
        let body = serde_json::to_value(payload).map_err(|e| AiError::Unknown(e.into()))?;
        self.logger
            .debug(&format!("Sending request to {endpoint}"), &body);

        let result = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .header("X-Title", "Flashcards API")
            .json(&body)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                self.logger.error(
                    "Request timed out",
                    &json!({ "timeout_secs": REQUEST_TIMEOUT.as_secs() }),
                );
                return Err(AiError::Timeout);
            }
            Err(e) if e.is_connect() => {
                self.logger
                    .error("Network connection failed", &json!(e.to_string()));
                return Err(AiError::Network(e));
            }
            Err(e) => return Err(AiError::Unknown(e.into())),
        };

        let status = response.status();
        if !status.is_success() {
            let data = response.json::<Value>().await.ok();
            self.logger.error(
                &format!("API error: {status}"),
                data.as_ref().unwrap_or(&Value::Null),
            );
            return Err(match status.as_u16() {
                401 => AiError::Authentication,
                code => AiError::Api { status: code, data },
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| AiError::Unknown(e.into()))?;
        self.logger
            .debug(&format!("Received response from {endpoint}"), &value);

        serde_json::from_value(value).map_err(|e| AiError::Validation(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Retry combinator
// ────────────────────────────────────────────────────────────────────────────

/// Runs `op` up to `retry_count` extra times for retryable errors, sleeping
/// `2^attempt` seconds between attempts. An explicit loop keeps the stack
/// depth bounded and the retry budget testable.
pub(crate) async fn with_retry<F, Fut, T>(retry_count: u32, mut op: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry_count => {
                let delay = Duration::from_secs(1u64 << attempt);
                warn!(
                    "AI gateway call failed ({e}), retry {}/{} after {}s",
                    attempt + 1,
                    retry_count,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OpenRouter client
// ────────────────────────────────────────────────────────────────────────────

/// The single OpenRouter client shared by all services.
pub struct OpenRouterClient {
    client: ApiClient,
    retry_count: u32,
    rate_limiter: Mutex<RateLimiter>,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Result<Self, AiError> {
        if api_key.is_empty() {
            return Err(AiError::Authentication);
        }

        let logger = SafeLogger::new().with_sensitive_keys(&["openrouter"]);
        let client = ApiClient::new(OPENROUTER_BASE_URL.to_string(), api_key, logger)?;

        Ok(Self {
            client,
            retry_count: DEFAULT_RETRY_COUNT,
            rate_limiter: Mutex::new(RateLimiter::new(DEFAULT_REQUESTS_PER_MINUTE)),
        })
    }

    /// Sends a chat-completions request, enforcing the local rate limit and
    /// retrying transient failures sequentially with exponential backoff.
    pub async fn send_chat_request(
        &self,
        model_path: &str,
        system_message: &str,
        user_message: &str,
        parameters: &ModelParameters,
        response_format: Option<&ResponseFormat>,
    ) -> Result<ChatResponse, AiError> {
        with_retry(self.retry_count, || {
            self.dispatch(
                model_path,
                system_message,
                user_message,
                parameters,
                response_format,
            )
        })
        .await
    }

    async fn dispatch(
        &self,
        model_path: &str,
        system_message: &str,
        user_message: &str,
        parameters: &ModelParameters,
        response_format: Option<&ResponseFormat>,
    ) -> Result<ChatResponse, AiError> {
        self.lock_limiter().check(Instant::now())?;

        let payload = ChatRequest {
            model: model_path,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_message,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            response_format,
            parameters,
        };

        let response: ChatResponse = self.client.post(CHAT_COMPLETIONS_ENDPOINT, &payload).await?;

        self.lock_limiter().record(Instant::now());

        debug!(
            "Chat request succeeded: model={}, total_tokens={}",
            response.model, response.usage.total_tokens
        );

        Ok(response)
    }

    fn lock_limiter(&self) -> std::sync::MutexGuard<'_, RateLimiter> {
        // Recover from poisoning: the limiter holds only timestamps.
        self.rate_limiter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retryable_classification() {
        assert!(AiError::Timeout.is_retryable());
        assert!(AiError::Api {
            status: 503,
            data: None
        }
        .is_retryable());
        assert!(AiError::Api {
            status: 429,
            data: None
        }
        .is_retryable());
        assert!(!AiError::Api {
            status: 400,
            data: None
        }
        .is_retryable());
        assert!(!AiError::Authentication.is_retryable());
        assert!(!AiError::Parsing("x".to_string()).is_retryable());
        assert!(!AiError::RateLimited {
            limit: 60,
            wait_secs: 10
        }
        .is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_third_attempt() {
        let calls = Cell::new(0u32);
        let result = with_retry(3, || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 3 {
                    Err(AiError::Api {
                        status: 503,
                        data: None,
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_exhausted_after_three_retries() {
        let calls = Cell::new(0u32);
        let result: Result<(), AiError> = with_retry(3, || {
            calls.set(calls.get() + 1);
            async {
                Err(AiError::Api {
                    status: 503,
                    data: None,
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AiError::Api { status: 503, .. })));
        // Initial attempt plus exactly three retries.
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_propagates_immediately() {
        let calls = Cell::new(0u32);
        let result: Result<(), AiError> = with_retry(3, || {
            calls.set(calls.get() + 1);
            async { Err(AiError::Authentication) }
        })
        .await;

        assert!(matches!(result, Err(AiError::Authentication)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn empty_api_key_is_rejected_at_construction() {
        assert!(matches!(
            OpenRouterClient::new(String::new()),
            Err(AiError::Authentication)
        ));
    }

    #[test]
    fn chat_request_serializes_openrouter_schema() {
        let parameters = ModelParameters::default();
        let format = flashcards_response_format();
        let request = ChatRequest {
            model: "google/gemini-2.0-flash-001",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "system",
                },
                ChatMessage {
                    role: "user",
                    content: "user",
                },
            ],
            response_format: Some(&format),
            parameters: &parameters,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "google/gemini-2.0-flash-001");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["strict"], true);
        // Parameters are flattened onto the top-level payload.
        let temperature = value["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
        assert_eq!(value["max_tokens"], 2000);
        assert!(value["top_p"].is_number());
    }

    #[test]
    fn chat_response_content_requires_a_choice() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "id": "gen-1",
            "model": "google/gemini-2.0-flash-001",
            "choices": [],
            "usage": { "prompt_tokens": 1, "completion_tokens": 0, "total_tokens": 1 }
        }))
        .unwrap();
        assert!(matches!(response.content(), Err(AiError::Validation(_))));
    }
}
