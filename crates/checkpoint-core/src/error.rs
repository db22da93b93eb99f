//! Error types for management API operations.
//!
//! The management server reports the same failure differently depending on the
//! API generation it speaks. Every response is funnelled through
//! [`crate::decode::decode_response`], which produces one of the API variants
//! below; everything else in this enum is a local or transport-level failure.

use serde::Serialize;
use thiserror::Error;

/// Main error type for management API operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unclassified server response
    #[error("Unknown error: {0}")]
    UnknownError(String),

    /// The server answered, but the API service reports itself down (503)
    #[error("API appears to be down: {0}")]
    ApiDown(String),

    /// The server rejected the supplied credentials
    #[error("Access denied: {0}")]
    BadCredentials(String),

    /// The administrator account is locked
    #[error("Administrator account locked: {0}")]
    AccountLocked(String),

    /// Authenticated, but the account may not use the API
    #[error("Permission denied: {0}")]
    ConnectionProhibited(String),

    /// The server's rate limit was hit
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// A write call was attempted on a read-only session
    #[error("Write call in a read-only session: {0}")]
    WriteCallInReadOnlySession(String),

    /// The referenced object does not exist
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Client and server disagree on the API version
    #[error("Unknown API version: {0}")]
    UnknownApiVersion(String),

    /// Server-side validation reported errors or warnings
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Policy installation was refused, e.g. another install is running
    #[error("Policy installation failed: {0}")]
    PolicyInstallationFailed(String),

    /// Transport failure before an HTTP status was available
    #[error("Transport error: {0}")]
    Transport(String),

    /// A successful response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// Invalid endpoint or URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The session was logged out
    #[error("Session closed: {0}")]
    SessionClosed(String),
}

/// Specialized result type for management API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error report for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorReport {
    /// Stable error code
    pub code: String,
    /// Short human-readable title
    pub description: String,
    /// Full error message including server detail
    pub message: String,
    /// What the caller can do about it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_suggestion: Option<String>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownError(_) => "UNKNOWN_ERROR",
            Self::ApiDown(_) => "API_DOWN",
            Self::BadCredentials(_) => "BAD_CREDENTIALS",
            Self::AccountLocked(_) => "ACCOUNT_LOCKED",
            Self::ConnectionProhibited(_) => "CONNECTION_PROHIBITED",
            Self::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            Self::WriteCallInReadOnlySession(_) => "WRITE_CALL_IN_READ_ONLY_SESSION",
            Self::InvalidObject(_) => "INVALID_OBJECT",
            Self::UnknownApiVersion(_) => "UNKNOWN_API_VERSION",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::PolicyInstallationFailed(_) => "POLICY_INSTALLATION_FAILED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::InvalidUuid(_) => "INVALID_UUID",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::SessionClosed(_) => "SESSION_CLOSED",
        }
    }

    /// Returns a short human-readable title for the error.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::UnknownError(_) => "Unknown Error",
            Self::ApiDown(_) => "API Appears to be Down",
            Self::BadCredentials(_) => "Access Denied",
            Self::AccountLocked(_) => "Account Locked",
            Self::ConnectionProhibited(_) => "Permission Denied",
            Self::TooManyRequests(_) => "Too Many Requests",
            Self::WriteCallInReadOnlySession(_) => "Write Call in a Read-Only Session",
            Self::InvalidObject(_) => "Call made to change an invalid object",
            Self::UnknownApiVersion(_) => "Unknown API Version",
            Self::ValidationFailed(_) => "Validation Failed",
            Self::PolicyInstallationFailed(_) => "Policy Installation Failed",
            Self::Transport(_) => "Connection Failed",
            Self::InvalidResponse(_) => "Invalid Response",
            Self::InvalidUuid(_) => "Invalid UUID",
            Self::InvalidEndpoint(_) => "Invalid Endpoint",
            Self::ConfigError(_) => "Configuration Error",
            Self::SessionClosed(_) => "Session Closed",
        }
    }

    /// Returns a recovery suggestion, where one exists.
    #[must_use]
    pub const fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::UnknownError(_) => Some(
                "Something has gone wrong in a way that is not currently handled.",
            ),
            Self::ApiDown(_) => Some(
                "The server is reachable, but the API service is down. Please check the API status.",
            ),
            Self::BadCredentials(_) => Some(
                "The server refused the credentials provided. Please try entering them again.",
            ),
            Self::AccountLocked(_) => Some(
                "The administrator account is locked. Unlock it on the server or wait for the lockout to expire.",
            ),
            Self::ConnectionProhibited(_) => Some(
                "The server accepted the credentials, but the user may not use the API. Please confirm the user's permissions on the server.",
            ),
            Self::TooManyRequests(_) => Some(
                "The server's rate limit was hit. Wait a few minutes or run 'api throttling off' on the server.",
            ),
            Self::WriteCallInReadOnlySession(_) => Some(
                "The session is read-only. Try again after connecting in write mode.",
            ),
            Self::InvalidObject(_) => Some(
                "The call referenced an object which does not exist.",
            ),
            Self::UnknownApiVersion(_) => Some(
                "The server does not support the requested API version.",
            ),
            Self::ValidationFailed(_) => Some(
                "The server found validation errors. Review the staged changes and try again.",
            ),
            Self::PolicyInstallationFailed(_) => Some(
                "The policy could not be installed. Check for an installation already in progress.",
            ),
            Self::SessionClosed(_) => Some("Log in again to obtain a new session."),
            Self::Transport(_)
            | Self::InvalidResponse(_)
            | Self::InvalidUuid(_)
            | Self::InvalidEndpoint(_)
            | Self::ConfigError(_) => None,
        }
    }

    /// Returns true for errors classified from a server response or the
    /// read-only precondition, as opposed to local or transport failures.
    #[must_use]
    pub const fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownError(_)
                | Self::ApiDown(_)
                | Self::BadCredentials(_)
                | Self::AccountLocked(_)
                | Self::ConnectionProhibited(_)
                | Self::TooManyRequests(_)
                | Self::WriteCallInReadOnlySession(_)
                | Self::InvalidObject(_)
                | Self::UnknownApiVersion(_)
                | Self::ValidationFailed(_)
                | Self::PolicyInstallationFailed(_)
        )
    }

    /// Converts the error into an [`ErrorReport`].
    #[must_use]
    pub fn into_report(self) -> ErrorReport {
        ErrorReport {
            code: self.error_code().to_string(),
            description: self.description().to_string(),
            recovery_suggestion: self.recovery_suggestion().map(str::to_string),
            message: self.to_string(),
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
