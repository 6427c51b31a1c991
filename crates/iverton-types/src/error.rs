use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors from key-value backing operations (used by trait definitions in iverton-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised while mirroring store state to the key-value backing.
///
/// Never fatal: the persistence middleware logs these and carries on with
/// in-memory state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize state for '{store}': {message}")]
    Serialize { store: String, message: String },

    #[error("backing error for '{store}': {source}")]
    Backing {
        store: String,
        #[source]
        source: RepositoryError,
    },

    #[error("snapshot for '{store}' has version {found}, expected {expected}")]
    VersionMismatch {
        store: String,
        expected: u32,
        found: u32,
    },

    #[error("malformed snapshot for '{store}': {message}")]
    MalformedSnapshot { store: String, message: String },
}

/// How loudly a fetch failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Failures from the webhook gateway.
///
/// A disabled gateway is not an error: it yields `Ok(None)`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("webhook endpoint path must not be empty")]
    InvalidEndpoint,

    #[error("webhook request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("webhook request failed with HTTP {status}")]
    RequestFailed { status: u16 },

    #[error("webhook transport error: {0}")]
    Transport(String),

    #[error("webhook response could not be decoded: {0}")]
    Decode(String),
}

impl FetchError {
    /// Classify the failure for logging.
    ///
    /// Server errors and timeouts are high, rate limiting and client errors
    /// medium, a missing resource low.
    pub fn severity(&self) -> Severity {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport(_) => Severity::High,
            FetchError::RequestFailed { status } if *status >= 500 => Severity::High,
            FetchError::RequestFailed { status: 404 } => Severity::Low,
            FetchError::RequestFailed { .. } => Severity::Medium,
            FetchError::Decode(_) | FetchError::InvalidEndpoint => Severity::Medium,
        }
    }
}

/// Credential and session failures, surfaced through the auth store's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Your session has expired, please sign in again")]
    SessionExpired,

    #[error("session storage error: {0}")]
    Storage(String),

    #[error("password hashing failed")]
    Hashing,
}

/// Field-keyed validation messages for form input.
///
/// Returned directly to the caller; never written to a store's `error` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
