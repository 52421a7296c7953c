//! Data structures shared across the API, storage and provisioning binaries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Record identifier used when `COUNTER_ID` is not configured.
pub const DEFAULT_COUNTER_ID: &str = "counter";

/// Upper bound for counter identifiers; matches the `counters.id` column width.
pub const COUNTER_ID_MAX_LENGTH: usize = 64;

/// Errors emitted when a configured counter identifier fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CounterIdError {
    #[error("counter id must not be empty")]
    Empty,
    #[error("counter id must be at most {COUNTER_ID_MAX_LENGTH} characters")]
    TooLong,
    #[error("counter id may only contain ASCII letters, digits, '-', '_' or '.'")]
    InvalidCharacter,
}

/// Validates that the identifier fits the `counters.id` column contract.
pub fn validate_counter_id(id: &str) -> Result<(), CounterIdError> {
    if id.is_empty() {
        return Err(CounterIdError::Empty);
    }

    if id.len() > COUNTER_ID_MAX_LENGTH {
        return Err(CounterIdError::TooLong);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CounterIdError::InvalidCharacter);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterId(String);

impl CounterId {
    pub fn parse(id: &str) -> Result<Self, CounterIdError> {
        validate_counter_id(id)?;
        Ok(Self(id.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for CounterId {
    fn default() -> Self {
        Self(DEFAULT_COUNTER_ID.to_owned())
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted view counter. `views` only ever grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    pub id: CounterId,
    pub views: i64,
}

/// JSON body returned to callers after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsBody {
    pub views: i64,
}

/// Origin allowed to read responses when none is configured.
pub const DEFAULT_CORS_ALLOW_ORIGIN: &str = "*";

/// Static and configurable headers attached to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeaders {
    cors_allow_origin: Option<String>,
}

impl Default for ResponseHeaders {
    fn default() -> Self {
        Self::new(Some(DEFAULT_CORS_ALLOW_ORIGIN.to_owned()))
    }
}

impl ResponseHeaders {
    pub const CONTENT_TYPE: &'static str = "application/json";
    pub const CACHE_CONTROL: &'static str = "no-store";
    pub const ALLOWED_METHODS: &'static str = "GET, POST";

    /// `None` turns CORS headers off entirely.
    pub fn new(cors_allow_origin: Option<String>) -> Self {
        Self { cors_allow_origin }
    }

    pub fn cors_allow_origin(&self) -> Option<&str> {
        self.cors_allow_origin.as_deref()
    }

    /// CORS entries only; empty when CORS is off.
    pub fn cors_pairs(&self) -> Vec<(&'static str, String)> {
        match self.cors_allow_origin() {
            Some(origin) => vec![
                ("Access-Control-Allow-Origin", origin.to_owned()),
                ("Access-Control-Allow-Methods", Self::ALLOWED_METHODS.to_owned()),
            ],
            None => Vec::new(),
        }
    }

    /// Header pairs in the order they are emitted.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("Content-Type", Self::CONTENT_TYPE.to_owned()),
            ("Cache-Control", Self::CACHE_CONTROL.to_owned()),
        ];
        pairs.extend(self.cors_pairs());
        pairs
    }
}

/// Transport-neutral response envelope: `statusCode`, `headers` and a
/// JSON-encoded `body`, mirroring what an HTTP gateway expects from a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl InvocationResponse {
    pub const OK: u16 = 200;

    pub fn views(views: i64, headers: &ResponseHeaders) -> Self {
        Self {
            status_code: Self::OK,
            headers: headers
                .pairs()
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
            body: json!({ "views": views }).to_string(),
        }
    }
}
