//! Redacting logger for AI gateway traffic.
//!
//! Every request/response body sent to or received from the gateway is passed
//! through `SafeLogger` before emission, so API keys, bearer tokens and
//! token-shaped strings never reach the logs. Key matching and value-shape
//! heuristics are configurable so tests can assert exact redaction behavior.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, warn};

const REDACTION_REPLACEMENT: &str = "[REDACTED]";

const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "apikey",
    "api_key",
    "token",
    "accesstoken",
    "access_token",
    "password",
    "secret",
    "authorization",
    "authentication",
    "credential",
    "private",
    "key",
    "bearer",
];

/// A string shaped like a JWT: three dot-separated base64url segments.
static JWT_SHAPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").expect("valid regex")
});

/// A long uninterrupted alphanumeric blob, typical of API keys.
static KEY_SHAPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{21,}$").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct SafeLogger {
    sensitive_keys: Vec<String>,
    replacement: String,
}

impl Default for SafeLogger {
    fn default() -> Self {
        Self {
            sensitive_keys: DEFAULT_SENSITIVE_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            replacement: REDACTION_REPLACEMENT.to_string(),
        }
    }
}

impl SafeLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds extra sensitive key substrings on top of the defaults.
    pub fn with_sensitive_keys(mut self, extra: &[&str]) -> Self {
        self.sensitive_keys
            .extend(extra.iter().map(|k| k.to_lowercase()));
        self
    }

    /// Walks a JSON value, replacing sensitive fields and token-shaped
    /// strings with the redaction marker.
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                if JWT_SHAPED.is_match(s) || KEY_SHAPED.is_match(s) {
                    Value::String(self.replacement.clone())
                } else {
                    value.clone()
                }
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| {
                        if self.is_sensitive_key(key) {
                            (key.clone(), Value::String(self.replacement.clone()))
                        } else {
                            (key.clone(), self.redact(v))
                        }
                    })
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    fn is_sensitive_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_keys.iter().any(|s| key.contains(s.as_str()))
    }

    pub fn debug(&self, message: &str, payload: &Value) {
        debug!(target: "ai_gateway", payload = %self.redact(payload), "{message}");
    }

    pub fn warn(&self, message: &str, payload: &Value) {
        warn!(target: "ai_gateway", payload = %self.redact(payload), "{message}");
    }

    pub fn error(&self, message: &str, payload: &Value) {
        error!(target: "ai_gateway", payload = %self.redact(payload), "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_keys_case_insensitively() {
        let logger = SafeLogger::new();
        let redacted = logger.redact(&json!({
            "Authorization": "Bearer abc",
            "model": "google/gemini-2.0-flash-001"
        }));
        assert_eq!(redacted["Authorization"], "[REDACTED]");
        assert_eq!(redacted["model"], "google/gemini-2.0-flash-001");
    }

    #[test]
    fn redacts_jwt_shaped_strings() {
        let logger = SafeLogger::new();
        let redacted = logger.redact(&json!({
            "note": "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig"
        }));
        assert_eq!(redacted["note"], "[REDACTED]");
    }

    #[test]
    fn redacts_long_alphanumeric_blobs_but_not_prose() {
        let logger = SafeLogger::new();
        let redacted = logger.redact(&json!({
            "blob": "sk-or-v1-0123456789abcdef0123456789abcdef",
            "prose": "To jest zwykłe zdanie o fiszkach, dłuższe niż 20 znaków."
        }));
        assert_eq!(redacted["blob"], "[REDACTED]");
        assert_eq!(
            redacted["prose"],
            "To jest zwykłe zdanie o fiszkach, dłuższe niż 20 znaków."
        );
    }

    #[test]
    fn redacts_nested_structures() {
        let logger = SafeLogger::new().with_sensitive_keys(&["openrouter"]);
        let redacted = logger.redact(&json!({
            "request": {
                "openrouter_key": "whatever",
                "messages": [{"role": "user", "content": "krótki tekst"}]
            }
        }));
        assert_eq!(redacted["request"]["openrouter_key"], "[REDACTED]");
        assert_eq!(redacted["request"]["messages"][0]["content"], "krótki tekst");
    }
}
