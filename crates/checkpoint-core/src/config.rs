//! Configuration for connecting to a management server.
//!
//! Loading from files or the environment is left to the caller; the struct
//! derives `Deserialize` so any serde source works.

use crate::client::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_TASK_CHECK_INTERVAL, DEFAULT_TASK_MAX_DURATION,
};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a management API connection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ManagementConfig {
    /// Management server base URL, e.g. `https://mgmt.example.com/`
    #[validate(url)]
    pub url: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a PEM CA certificate to trust
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seconds between task status checks
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_task_check_interval_secs")]
    pub task_check_interval_secs: u64,

    /// Maximum seconds to wait for a task
    #[validate(range(max = 86400))]
    #[serde(default = "default_task_max_duration_secs")]
    pub task_max_duration_secs: u64,

    /// Keepalive period in seconds; derived from the session timeout when unset
    #[validate(range(min = 1, max = 3600))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive_interval_secs: Option<u64>,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

const fn default_task_check_interval_secs() -> u64 {
    DEFAULT_TASK_CHECK_INTERVAL
}

const fn default_task_max_duration_secs() -> u64 {
    DEFAULT_TASK_MAX_DURATION
}

impl ManagementConfig {
    /// Create a new configuration for the given server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            url: url.into(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            request_timeout_secs: default_request_timeout_secs(),
            task_check_interval_secs: default_task_check_interval_secs(),
            task_max_duration_secs: default_task_max_duration_secs(),
            keepalive_interval_secs: None,
        };

        config.validate_config()?;
        Ok(config)
    }

    /// Run field validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the offending fields.
    pub fn validate_config(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: std::path::PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the task polling interval and budget in seconds.
    #[must_use]
    pub const fn with_task_polling(mut self, check_interval: u64, max_duration: u64) -> Self {
        self.task_check_interval_secs = check_interval;
        self.task_max_duration_secs = max_duration;
        self
    }

    /// Set a fixed keepalive period in seconds.
    #[must_use]
    pub const fn with_keepalive_interval(mut self, seconds: u64) -> Self {
        self.keepalive_interval_secs = Some(seconds);
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the task check interval as a Duration.
    #[must_use]
    pub const fn task_check_interval(&self) -> Duration {
        Duration::from_secs(self.task_check_interval_secs)
    }

    /// Get the task budget as a Duration.
    #[must_use]
    pub const fn task_max_duration(&self) -> Duration {
        Duration::from_secs(self.task_max_duration_secs)
    }

    /// Get the configured keepalive period, if any.
    #[must_use]
    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive_interval_secs.map(Duration::from_secs)
    }

    /// Parse the server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_url(&self) -> Result<Url, Error> {
        Url::parse(&self.url).map_err(|e| Error::ConfigError(format!("Invalid server URL: {e}")))
    }
}
