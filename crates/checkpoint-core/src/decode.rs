//! Classification of raw management API responses.
//!
//! Three generations of the management API report the same condition with
//! different status codes, and reuse 400 (and 500 on the oldest servers) for
//! several unrelated failures. Classification therefore runs through an
//! ordered rule list: rules that inspect `code`/`message` come first, and the
//! bare status code is only consulted when no content rule matched.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// The only status the management API uses for success.
pub const STATUS_OK: u16 = 200;

/// Error body shape shared by every API generation.
///
/// All fields are optional; older servers omit some of them or send them with
/// unexpected types. Each field is read on its own, so one odd field does not
/// hide the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `err_login_failed`.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
    /// Validation errors, when the server reports them.
    pub errors: Option<Vec<Value>>,
    /// Validation warnings, when the server reports them.
    pub warnings: Option<Vec<Value>>,
}

impl ErrorBody {
    /// Parses a body, returning `None` when it is not a JSON object.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(body).ok()?;
        let fields = value.as_object()?;
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        let list = |key: &str| fields.get(key).and_then(Value::as_array).cloned();

        Some(Self {
            code: text("code"),
            message: text("message"),
            errors: list("errors"),
            warnings: list("warnings"),
        })
    }

    fn code_contains(&self, needle: &str) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| code.to_ascii_lowercase().contains(needle))
    }

    fn message_contains(&self, needle: &str) -> bool {
        self.message
            .as_deref()
            .is_some_and(|message| message.to_ascii_lowercase().contains(needle))
    }

    fn has_findings(&self) -> bool {
        let non_empty = |list: &Option<Vec<Value>>| list.as_ref().is_some_and(|l| !l.is_empty());
        non_empty(&self.errors) || non_empty(&self.warnings)
    }
}

/// A content-based classification rule.
struct Rule {
    /// Status codes the rule applies to; `None` means any non-200 status.
    statuses: Option<&'static [u16]>,
    matches: fn(&ErrorBody) -> bool,
    build: fn(String) -> Error,
}

impl Rule {
    fn applies(&self, status: u16, body: &ErrorBody) -> bool {
        self.statuses.map_or(true, |s| s.contains(&status)) && (self.matches)(body)
    }
}

// Order matters. The permission and lock messages both arrive with the
// generic `err_login_failed` code, so they must be checked before the
// credentials rule. Bare findings lists come last.
const CONTENT_RULES: &[Rule] = &[
    Rule {
        statuses: Some(&[400, 500]),
        matches: |b| b.message_contains("account is locked"),
        build: Error::AccountLocked,
    },
    Rule {
        statuses: Some(&[400, 403, 500]),
        matches: |b| {
            b.code_contains("permission")
                || (b.message_contains("permission") && b.message_contains("api"))
        },
        build: Error::ConnectionProhibited,
    },
    Rule {
        statuses: None,
        matches: |b| b.code_contains("too_many_requests") || b.message_contains("too many requests"),
        build: Error::TooManyRequests,
    },
    Rule {
        statuses: Some(&[400]),
        matches: |b| {
            b.code_contains("api_version")
                || b.code_contains("unsupported_version")
                || b.message_contains("api version")
        },
        build: Error::UnknownApiVersion,
    },
    Rule {
        statuses: Some(&[400, 500]),
        matches: |b| b.code_contains("validation") || b.message_contains("validation"),
        build: Error::ValidationFailed,
    },
    Rule {
        statuses: None,
        matches: |b| {
            b.code_contains("object_not_found")
                || (b.message_contains("object") && b.message_contains("not found"))
        },
        build: Error::InvalidObject,
    },
    Rule {
        statuses: Some(&[400, 409, 500]),
        matches: |b| {
            b.code_contains("policy_installation")
                || b.code_contains("install_policy")
                || b.message_contains("policy installation")
                || b.message_contains("installation is already in progress")
        },
        build: Error::PolicyInstallationFailed,
    },
    Rule {
        statuses: Some(&[400, 500]),
        matches: |b| b.code_contains("login_failed") || b.message_contains("authentication to server failed"),
        build: Error::BadCredentials,
    },
    // A findings list only decides the kind when nothing more specific did.
    Rule {
        statuses: Some(&[400, 500]),
        matches: ErrorBody::has_findings,
        build: Error::ValidationFailed,
    },
];

/// Classification by status code alone, used when no content rule matched.
fn classify_status(status: u16) -> fn(String) -> Error {
    match status {
        400 => Error::BadCredentials,
        403 => Error::ConnectionProhibited,
        404 => Error::InvalidObject,
        409 => Error::PolicyInstallationFailed,
        429 => Error::TooManyRequests,
        503 => Error::ApiDown,
        _ => Error::UnknownError,
    }
}

/// Decodes a raw `(status, body)` pair into either the untouched body or a
/// typed error.
///
/// A 200 status always succeeds and returns `body` unchanged, whatever it
/// contains. The function is pure: the same input always yields the same
/// outcome.
///
/// # Errors
///
/// Returns one of the API variants of [`Error`] for every non-200 status.
pub fn decode_response(status: u16, body: Vec<u8>) -> Result<Vec<u8>> {
    if status == STATUS_OK {
        return Ok(body);
    }
    Err(classify(status, &body))
}

/// Classifies a non-200 response. Exposed separately so callers holding a
/// borrowed body can classify without giving it up.
#[must_use]
pub fn classify(status: u16, body: &[u8]) -> Error {
    let parsed = ErrorBody::parse(body).unwrap_or_default();
    let detail = detail_text(status, &parsed);

    let build = CONTENT_RULES
        .iter()
        .find(|rule| rule.applies(status, &parsed))
        .map_or_else(|| classify_status(status), |rule| rule.build);

    let error = build(detail);
    debug!(status, code = error.error_code(), "classified management API error");
    error
}

fn detail_text(status: u16, body: &ErrorBody) -> String {
    match (&body.code, &body.message) {
        (Some(code), Some(message)) => format!("{message} ({code})"),
        (None, Some(message)) => message.clone(),
        (Some(code), None) => code.clone(),
        (None, None) => format!("HTTP status {status}"),
    }
}
