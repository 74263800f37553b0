//! Payload sanitization.
//!
//! Reports carry arbitrary application data; before anything leaves the
//! process, values under sensitive keys are redacted and secret-looking
//! substrings are scrubbed out of free text. The walk is depth-bounded
//! so pathological nesting cannot blow the stack.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::MAX_SANITIZE_DEPTH;

/// Replacement for values under sensitive keys.
pub const REDACTED: &str = "[REDACTED]";

/// Replacement for subtrees beyond the recursion bound.
const DEPTH_LIMIT_MARKER: &str = "[MAX_DEPTH]";

/// Key substrings (case-insensitive) whose values are always redacted.
const SENSITIVE_KEY_PARTS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "auth",
    "cookie",
    "session",
    "credit_card",
    "social_security",
];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex is valid")
});

static CREDIT_CARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b").expect("card regex is valid")
});

static SSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn regex is valid"));

static KEY_VALUE_SECRET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(password|passwd|secret|token|api[_-]?key|auth)\s*[=:]\s*[^\s&;,]+")
        .expect("key=value regex is valid")
});

/// Recursively sanitizes an arbitrary JSON value.
///
/// Values of keys that case-insensitively contain a sensitive substring
/// become [`REDACTED`]; free-text strings are scrubbed of emails,
/// card/SSN-like numbers, and `key=value` secrets. Recursion stops at
/// a fixed depth, replacing deeper subtrees with a marker.
pub fn sanitize_data(value: &Value) -> Value {
    sanitize_at_depth(value, 0)
}

fn sanitize_at_depth(value: &Value, depth: usize) -> Value {
    if depth >= MAX_SANITIZE_DEPTH {
        return Value::String(DEPTH_LIMIT_MARKER.to_string());
    }

    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map {
                if is_sensitive_key(key) {
                    sanitized.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize_at_depth(entry, depth + 1));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(entries) => Value::Array(
            entries
                .iter()
                .map(|entry| sanitize_at_depth(entry, depth + 1))
                .collect(),
        ),
        Value::String(text) => Value::String(scrub_text(text)),
        other => other.clone(),
    }
}

/// True when a key should have its value redacted outright.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

/// Scrubs secret-looking substrings out of free text.
///
/// Emails become `[EMAIL]`, card-like numbers `[CREDIT_CARD]`, SSN-like
/// numbers `[SSN]`, and `key=value` secrets keep the key with a redacted
/// value.
pub fn scrub_text(text: &str) -> String {
    let text = KEY_VALUE_SECRET_RE.replace_all(text, format!("$1={}", REDACTED).as_str());
    let text = EMAIL_RE.replace_all(&text, "[EMAIL]");
    let text = CREDIT_CARD_RE.replace_all(&text, "[CREDIT_CARD]");
    let text = SSN_RE.replace_all(&text, "[SSN]");
    text.into_owned()
}
