//! HTTP settings and operational defaults.
//!
//! Calls are never retried at this layer. The only repetition in the client is
//! the task poller waiting for an "in progress" task to finish.

use crate::config::ManagementConfig;
use std::time::Duration;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default TCP/TLS connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Idle connections are dropped after this many seconds.
pub const DEFAULT_IDLE_CONNECTION_TIMEOUT: u64 = 90;

/// Default number of idle connections kept per host.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 4;

/// Default seconds between task status checks.
pub const DEFAULT_TASK_CHECK_INTERVAL: u64 = 5;

/// Default seconds to wait for a task before giving up.
pub const DEFAULT_TASK_MAX_DURATION: u64 = 600;

/// Low-level HTTP settings for the management transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Whole-request timeout, including reading the body
    pub request_timeout: Duration,
    /// Time allowed to establish TCP and TLS
    pub connect_timeout: Duration,
    /// How long an idle pooled connection is kept
    pub idle_connection_timeout: Duration,
    /// Pooled idle connections kept to the server
    pub max_idle_connections: usize,
    /// Log each request and response at `debug`
    pub log_traffic: bool,
}

impl HttpSettings {
    /// Settings with the crate defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            idle_connection_timeout: Duration::from_secs(DEFAULT_IDLE_CONNECTION_TIMEOUT),
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            log_traffic: true,
        }
    }

    /// Defaults, with the request timeout taken from `config`.
    #[must_use]
    pub fn from_config(config: &ManagementConfig) -> Self {
        Self::new().with_request_timeout(config.timeout())
    }

    /// Set the whole-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Tune the idle connection pool.
    #[must_use]
    pub const fn with_idle_connections(mut self, timeout: Duration, max: usize) -> Self {
        self.idle_connection_timeout = timeout;
        self.max_idle_connections = max;
        self
    }

    /// Turn per-request `debug` logging on or off.
    #[must_use]
    pub const fn with_traffic_logging(mut self, enabled: bool) -> Self {
        self.log_traffic = enabled;
        self
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::new()
    }
}
