//! Error handling for Guildboard Core.
//!
//! This module provides:
//! - Structured error types with context and chaining
//! - HTTP status code mapping for API responses
//! - Machine-readable error codes for API clients
//! - User-friendly messages vs detailed internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! Business-rule violations from the bounty state machine are NOT errors:
//! they are returned as [`crate::bounties::TransitionOutcome::Rejected`]
//! values. `BoardError` covers I/O, database, serialization, configuration,
//! and request-validation failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// A specialized Result type for Guildboard operations.
pub type Result<T> = std::result::Result<T, BoardError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error
/// handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Bounty errors (1000-1099)
    BountyNotFound,
    InvalidTransition,

    // Database errors (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    RecordNotFound,
    /// The queried table is not provisioned (Postgres SQLSTATE 42P01).
    /// This is the defined fallback trigger for the flat-file event source,
    /// not a failure in itself.
    TableMissing,

    // Serialization errors (2200-2299)
    SerializationError,
    DeserializationError,
    InvalidJson,

    // Validation errors (4100-4199)
    ValidationError,
    InvalidInput,
    MissingRequiredField,

    // Configuration errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal errors (9000-9099)
    InternalError,
    UnknownError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::BountyNotFound => 1000,
            Self::InvalidTransition => 1001,

            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,
            Self::RecordNotFound => 2003,
            Self::TableMissing => 2004,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,
            Self::InvalidJson => 2202,

            Self::ValidationError => 4100,
            Self::InvalidInput => 4101,
            Self::MissingRequiredField => 4102,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            Self::InternalError => 9000,
            Self::UnknownError => 9099,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::BountyNotFound | Self::RecordNotFound => StatusCode::NOT_FOUND,

            Self::InvalidTransition => StatusCode::CONFLICT,

            Self::ValidationError | Self::InvalidInput | Self::MissingRequiredField => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            Self::DatabaseConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,

            Self::DatabaseError
            | Self::DatabaseQueryFailed
            | Self::TableMissing
            | Self::SerializationError
            | Self::DeserializationError
            | Self::InvalidJson
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InternalError
            | Self::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseConnectionFailed | Self::DatabaseQueryFailed
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "bounty",
            2000..=2099 => "database",
            2200..=2299 => "serialization",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging and alerting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// User errors (bad input, not found, illegal transitions)
    Low,
    /// Operational conditions (unprovisioned tables triggering fallback)
    Medium,
    /// System errors (query failures, corrupt data, bad configuration)
    High,
    /// Errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::BountyNotFound
            | ErrorCode::InvalidTransition
            | ErrorCode::RecordNotFound
            | ErrorCode::ValidationError
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField => Self::Low,

            ErrorCode::TableMissing => Self::Medium,

            ErrorCode::DatabaseError
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::InvalidJson
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::DatabaseConnectionFailed
            | ErrorCode::InternalError
            | ErrorCode::UnknownError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (bounty, artifact, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Guildboard Core.
#[derive(Error, Debug)]
pub struct BoardError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl BoardError {
    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// Create a not found error.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("{} not found: {}", entity_type, entity_id),
        )
        .with_details(ErrorDetails::new().with_entity(&entity_type, &entity_id))
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Create a bounty not found error.
    pub fn bounty_not_found(bounty_id: impl Into<String>) -> Self {
        let bounty_id = bounty_id.into();
        Self::new(
            ErrorCode::BountyNotFound,
            format!("Bounty not found: {}", bounty_id),
        )
        .with_details(ErrorDetails::new().with_entity("bounty", &bounty_id))
    }

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    /// Record error metrics.
    fn record_metrics(&self) {
        counter!(
            "guildboard_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&BoardError> for ErrorResponse {
    fn from(error: &BoardError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.context.is_empty() && error.details.entity_id.is_none() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| BoardError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| BoardError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| BoardError::new(ErrorCode::RecordNotFound, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| BoardError::new(code, "Resource not found"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Postgres SQLSTATE for "relation does not exist".
const UNDEFINED_TABLE: &str = "42P01";

impl From<sqlx::Error> for BoardError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (
                ErrorCode::RecordNotFound,
                "The requested record was not found",
            ),
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(UNDEFINED_TABLE) {
                    return Self::with_internal(
                        ErrorCode::TableMissing,
                        "Backing table is not provisioned",
                        db_err.to_string(),
                    )
                    .with_source(error);
                }
                (ErrorCode::DatabaseQueryFailed, "Database error")
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::DatabaseError, "Database error"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() {
            ErrorCode::DeserializationError
        } else if error.is_eof() {
            ErrorCode::InvalidJson
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for BoardError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::NotFound => (ErrorCode::RecordNotFound, "File or resource not found"),
            _ => (ErrorCode::InternalError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for BoardError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<BoardError>() {
            Ok(board_error) => board_error,
            Err(error) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal error occurred",
                error.to_string(),
            ),
        }
    }
}

impl From<config::ConfigError> for BoardError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (
                ErrorCode::ConfigurationError,
                "Configuration error occurred",
            ),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
