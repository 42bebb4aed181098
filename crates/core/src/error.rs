//! Error taxonomy for domainclaw operations.
//!
//! Every surfaced error is an [`AppError`]: a machine-readable kind, a human
//! message, an optional details map, a retryable flag, and an optional wrapped
//! cause. Callers branch on [`ErrorKind`], never on message text. The kind
//! also determines the process exit code, which is part of the stable
//! contract consumed by agent operators.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, AppError>;

/// The machine-readable classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    RateLimited,
    Provider,
    Budget,
    Confirmation,
    Safety,
    Partial,
    Internal,
}

impl ErrorKind {
    /// Stable wire code emitted in error envelopes.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Auth => "auth_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Provider => "provider_error",
            ErrorKind::Budget => "budget_violation",
            ErrorKind::Confirmation => "confirmation_error",
            ErrorKind::Safety => "safety_policy_violation",
            ErrorKind::Partial => "partial_failure",
            ErrorKind::Internal => "internal_error",
        }
    }

    /// Process exit code for this kind. The mapping is total: anything that
    /// is not an [`AppError`] exits 5 alongside provider/internal failures.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Validation => 2,
            ErrorKind::Auth => 3,
            ErrorKind::RateLimited => 4,
            ErrorKind::Provider | ErrorKind::Internal => 5,
            ErrorKind::Budget => 6,
            ErrorKind::Confirmation => 7,
            ErrorKind::Safety => 8,
            ErrorKind::Partial => 9,
        }
    }
}

/// The error type carried across every component boundary.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub retryable: bool,
    pub doc_url: Option<String>,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: serde_json::Map::new(),
            retryable: false,
            doc_url: None,
            cause: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message).retryable(true)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, message)
    }

    pub fn budget(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Budget, message)
    }

    pub fn confirmation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Confirmation, message)
    }

    pub fn safety(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Safety, message)
    }

    pub fn partial(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Partial, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Wrap an arbitrary failure, preserving it as the source.
    pub fn wrap(
        kind: ErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(kind, message).with_cause(cause)
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Map<String, serde_json::Value>) -> Self {
        self.details = details;
        self
    }

    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Whether a retry engine may re-attempt the failed call.
    pub fn is_retryable(&self) -> bool {
        self.retryable || self.kind == ErrorKind::RateLimited
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::wrap(ErrorKind::Internal, "i/o failure", err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::wrap(ErrorKind::Internal, "serialization failure", err)
    }
}

// The wire shape drops the cause (the source chain is for humans, not for
// machines) and omits empty optional fields.
impl Serialize for AppError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut fields = 3;
        if !self.details.is_empty() {
            fields += 1;
        }
        if self.doc_url.is_some() {
            fields += 1;
        }
        let mut s = serializer.serialize_struct("AppError", fields)?;
        s.serialize_field("code", self.kind.code())?;
        s.serialize_field("message", &self.message)?;
        if !self.details.is_empty() {
            s.serialize_field("details", &self.details)?;
        }
        s.serialize_field("retryable", &self.retryable)?;
        if let Some(url) = &self.doc_url {
            s.serialize_field("doc_url", url)?;
        }
        s.end()
    }
}
