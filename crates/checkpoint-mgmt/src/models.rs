//! Request and response shapes for the session-level API commands.
//!
//! Field names on the wire are kebab-case and fixed by the server; the Rust
//! names are descriptive. Serde renames carry the mapping.

use crate::transport::SessionId;
use checkpoint_core::types::{DualFormatTimestamp, TASK_IN_PROGRESS};
use checkpoint_core::uuid::{PolicyPackageUuid, SessionUuid, TargetUuid, TaskId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Command names, relative to the web API root.
pub mod endpoint {
    /// Log in and obtain a session id.
    pub const LOGIN: &str = "login";
    /// End the session.
    pub const LOGOUT: &str = "logout";
    /// Reset the session idle timer.
    pub const KEEPALIVE: &str = "keepalive";
    /// Publish staged changes.
    pub const PUBLISH: &str = "publish";
    /// Discard staged changes.
    pub const DISCARD: &str = "discard";
    /// Install a policy package.
    pub const INSTALL_POLICY: &str = "install-policy";
    /// Query asynchronous task status.
    pub const SHOW_TASK: &str = "show-task";
}

/// Login credentials.
#[derive(Debug)]
pub enum Credentials {
    /// Username and password.
    Password {
        /// Administrator name.
        username: String,
        /// Password.
        password: SecretString,
    },
    /// Username and password, logging in to a specific domain.
    DomainPassword {
        /// Administrator name.
        username: String,
        /// Password.
        password: SecretString,
        /// Domain name, e.g. `System Data`.
        domain: String,
    },
    /// API key.
    ApiKey {
        /// The key.
        api_key: SecretString,
    },
}

impl Credentials {
    /// Username/password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Username/password credentials for a domain.
    #[must_use]
    pub fn domain_password(
        username: impl Into<String>,
        password: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self::DomainPassword {
            username: username.into(),
            password: SecretString::from(password.into()),
            domain: domain.into(),
        }
    }

    /// API key credentials.
    #[must_use]
    pub fn api_key(api_key: impl Into<String>) -> Self {
        Self::ApiKey {
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// The username, when the credentials carry one.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Password { username, .. } | Self::DomainPassword { username, .. } => {
                Some(username)
            }
            Self::ApiKey { .. } => None,
        }
    }

    /// Builds the login request body: `{user, password, domain?, api-key?, read-only}`.
    #[must_use]
    pub fn login_body(&self, read_only: bool) -> Map<String, Value> {
        let mut body = Map::new();
        match self {
            Self::Password { username, password } => {
                body.insert("user".into(), Value::from(username.as_str()));
                body.insert("password".into(), Value::from(password.expose_secret()));
            }
            Self::DomainPassword {
                username,
                password,
                domain,
            } => {
                body.insert("user".into(), Value::from(username.as_str()));
                body.insert("password".into(), Value::from(password.expose_secret()));
                body.insert("domain".into(), Value::from(domain.as_str()));
            }
            Self::ApiKey { api_key } => {
                body.insert("api-key".into(), Value::from(api_key.expose_secret()));
            }
        }
        body.insert("read-only".into(), Value::Bool(read_only));
        body
    }
}

/// Decoded login response. Consumed once to build a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoginResult {
    /// API version the server speaks.
    pub api_server_version: String,
    /// Session token.
    pub sid: SessionId,
    /// Idle timeout in seconds.
    pub session_timeout: u64,
    /// Whether the server opened the session read-only.
    #[serde(default)]
    pub read_only: Option<bool>,
    /// Administrator name as the server knows it.
    #[serde(default, rename = "user-name")]
    pub username: Option<String>,
    /// Previous login time.
    #[serde(default, rename = "last-login-was-at")]
    pub last_login: Option<DualFormatTimestamp>,
    /// Server-side UUID of this session.
    #[serde(default, rename = "uid")]
    pub server_uid: Option<SessionUuid>,
    /// URL the server reports for itself.
    pub url: Url,
}

/// Which parts of a policy package to install, and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyPushParameters {
    /// Install the access control policy.
    pub access: bool,
    /// Install the desktop security policy.
    pub desktop_security: bool,
    /// Install the QoS policy.
    pub qos: bool,
    /// Install the threat prevention policy.
    pub threat_prevention: bool,
    /// Fail unless every cluster member accepts the policy.
    pub install_on_all_cluster_members_or_fail: bool,
    /// Compile and verify without installing.
    pub prepare_only: bool,
}

/// Body of an `install-policy` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct InstallPolicyRequest {
    /// Policy package to install.
    pub policy_package: PolicyPackageUuid,
    /// Gateways or clusters to install on.
    pub targets: Vec<TargetUuid>,
    /// Installation flags, flattened into the body.
    #[serde(flatten)]
    pub parameters: PolicyPushParameters,
}

/// Body of a `discard` (or `publish`) call.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SessionScopedRequest {
    /// Target session; the caller's own session when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<SessionUuid>,
}

/// Body of a `show-task` call.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ShowTaskRequest {
    /// Task to query.
    #[serde(rename = "task-id")]
    pub task_id: TaskId,
}

/// Snapshot of an asynchronous server task.
///
/// Every field the server sent is kept. Only `status` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRecord(Map<String, Value>);

impl TaskRecord {
    /// Wraps raw task fields.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The task status, or `"in progress"` when the server sent none.
    #[must_use]
    pub fn status(&self) -> &str {
        self.0
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(TASK_IN_PROGRESS)
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status() == TASK_IN_PROGRESS
    }

    /// The task id reported in the record.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.0
            .get("task-id")
            .and_then(Value::as_str)
            .and_then(|raw| TaskId::parse_str(raw).ok())
    }

    /// Progress percentage, when reported.
    #[must_use]
    pub fn progress_percentage(&self) -> Option<u64> {
        self.0.get("progress-percentage").and_then(Value::as_u64)
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record, returning all fields.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}
