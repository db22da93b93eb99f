//! Authenticated management sessions.
//!
//! A [`Session`] is produced once by a successful login and never changes its
//! session id afterwards. Clones share the same underlying session, so the
//! keepalive scheduler and any number of in-flight calls can hold one without
//! locking. [`Session::logout`] is terminal for every clone.

use crate::keepalive::{KeepaliveHandle, KeepaliveScheduler, MIN_KEEPALIVE_PERIOD};
use crate::models::{
    endpoint, Credentials, InstallPolicyRequest, LoginResult, PolicyPushParameters,
    SessionScopedRequest,
};
use crate::task::{extract_task_id, TaskPollOptions};
use crate::transport::{ApiRequest, HttpTransport, SessionId, Transport};
use crate::Result;
use checkpoint_core::config::ManagementConfig;
use checkpoint_core::decode::decode_response;
use checkpoint_core::uuid::{PolicyPackageUuid, SessionUuid, TargetUuid, TaskId};
use checkpoint_core::Error;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

/// Per-session tuning taken from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Fixed keepalive period; half the session timeout when unset.
    pub keepalive_interval: Option<Duration>,
    /// Polling used by the `*_and_wait` helpers.
    pub task_poll: TaskPollOptions,
}

impl SessionOptions {
    /// Options derived from a [`ManagementConfig`].
    #[must_use]
    pub fn from_config(config: &ManagementConfig) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval(),
            task_poll: TaskPollOptions::from_config(config),
        }
    }
}

struct SessionInner {
    id: SessionId,
    transport: Arc<dyn Transport>,
    base_url: Url,
    server_url: Url,
    api_server_version: String,
    session_timeout: Duration,
    read_only: bool,
    username: String,
    last_login: Option<DateTime<Utc>>,
    server_uid: Option<SessionUuid>,
    options: SessionOptions,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

/// An authenticated connection to a management server.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_server_version", &self.inner.api_server_version)
            .field("username", &self.inner.username)
            .field("read_only", &self.inner.read_only)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect over HTTPS using `config` and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for an unusable configuration, a
    /// transport error when the server cannot be reached, or the decoded
    /// login failure.
    pub async fn connect(
        config: &ManagementConfig,
        credentials: &Credentials,
        read_only: bool,
    ) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
        let body = credentials.login_body(read_only);
        Self::establish(transport, body, SessionOptions::from_config(config)).await
    }

    /// Log in over an existing transport.
    ///
    /// # Errors
    ///
    /// Returns the decoded login failure, or a transport error.
    pub async fn login(
        transport: Arc<dyn Transport>,
        credentials: &Credentials,
        read_only: bool,
    ) -> Result<Self> {
        let body = credentials.login_body(read_only);
        Self::establish(transport, body, SessionOptions::default()).await
    }

    /// Log in with an arbitrary request body, bypassing the credential
    /// builder. Useful for deliberately malformed login attempts.
    ///
    /// # Errors
    ///
    /// Same as [`Session::login`].
    pub async fn login_with_body(
        transport: Arc<dyn Transport>,
        body: Map<String, Value>,
    ) -> Result<Self> {
        Self::establish(transport, body, SessionOptions::default()).await
    }

    async fn establish(
        transport: Arc<dyn Transport>,
        body: Map<String, Value>,
        options: SessionOptions,
    ) -> Result<Self> {
        info!(url = %transport.base_url(), "Logging in to management server");

        let response = transport
            .send(ApiRequest::new(
                endpoint::LOGIN,
                None,
                Value::Object(body.clone()),
            ))
            .await?;
        let bytes = decode_response(response.status, response.body)?;
        let result: LoginResult = serde_json::from_slice(&bytes)?;
        let (username, read_only) = resolve_user_data(&body, &result)?;

        info!(
            username = %username,
            read_only,
            api_server_version = %result.api_server_version,
            "Logged in to management server"
        );

        Ok(Self::from_login(
            transport, result, username, read_only, options,
        ))
    }

    pub(crate) fn from_login(
        transport: Arc<dyn Transport>,
        result: LoginResult,
        username: String,
        read_only: bool,
        options: SessionOptions,
    ) -> Self {
        let base_url = transport.base_url().clone();
        Self {
            inner: Arc::new(SessionInner {
                id: result.sid,
                transport,
                base_url,
                server_url: result.url,
                api_server_version: result.api_server_version,
                session_timeout: Duration::from_secs(result.session_timeout),
                read_only,
                username,
                last_login: result.last_login.map(|ts| ts.posix),
                server_uid: result.server_uid,
                options,
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// The server-issued session id.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.id
    }

    /// Base URL the session talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// URL the server reported for itself at login.
    #[must_use]
    pub fn server_url(&self) -> &Url {
        &self.inner.server_url
    }

    /// API version reported at login.
    #[must_use]
    pub fn api_server_version(&self) -> &str {
        &self.inner.api_server_version
    }

    /// Server-side idle timeout.
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        self.inner.session_timeout
    }

    /// Whether write calls are refused locally.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// The administrator this session belongs to.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Previous login time, when reported.
    #[must_use]
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.inner.last_login
    }

    /// Server-side UUID of this session, when reported.
    #[must_use]
    pub fn server_uid(&self) -> Option<SessionUuid> {
        self.inner.server_uid
    }

    /// Options the session was created with.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Whether [`Session::logout`] has been called on any clone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Send a command with the session id attached and decode the outcome.
    ///
    /// Every higher-level operation goes through here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after logout, a transport error, or
    /// the decoded API error.
    pub async fn make_raw_api_call(&self, endpoint: &str, body: Value) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.send(endpoint, body).await
    }

    /// Like [`Session::make_raw_api_call`], deserializing the body as `T`.
    ///
    /// # Errors
    ///
    /// As [`Session::make_raw_api_call`], plus [`Error::InvalidResponse`]
    /// when the body is not a `T`.
    pub async fn call_json<T>(&self, endpoint: &str, body: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self.make_raw_api_call(endpoint, body).await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            Error::InvalidResponse(format!("Failed to parse `{endpoint}` response: {err}"))
        })
    }

    async fn send(&self, endpoint: &str, body: Value) -> Result<Vec<u8>> {
        debug!(endpoint = %endpoint, "Calling management API");
        let response = self
            .inner
            .transport
            .send(ApiRequest::new(endpoint, Some(self.inner.id.clone()), body))
            .await?;
        decode_response(response.status, response.body)
    }

    /// Reset the server's idle timer.
    ///
    /// # Errors
    ///
    /// Failures are returned, not swallowed.
    pub async fn keepalive(&self) -> Result<()> {
        self.make_raw_api_call(endpoint::KEEPALIVE, json!({}))
            .await
            .map(|_| ())
    }

    /// Publish the changes staged in this session.
    ///
    /// Returns the publish task id when the server reports a parseable one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteCallInReadOnlySession`] on a read-only session,
    /// before any network activity.
    pub async fn publish(&self) -> Result<Option<TaskId>> {
        self.ensure_writable("publish")?;
        info!(username = %self.inner.username, "Publishing session changes");
        let bytes = self
            .make_raw_api_call(endpoint::PUBLISH, to_body(&SessionScopedRequest::default())?)
            .await?;
        extract_task_id(&bytes)
    }

    /// Discard staged changes, either this session's or those of the named
    /// session. Discarding this session's changes leaves it usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteCallInReadOnlySession`] on a read-only session,
    /// before any network activity.
    pub async fn discard(&self, session: Option<SessionUuid>) -> Result<()> {
        self.ensure_writable("discard")?;
        info!(target_session = ?session.map(|s| s.to_wire()), "Discarding session changes");
        self.make_raw_api_call(
            endpoint::DISCARD,
            to_body(&SessionScopedRequest { uid: session })?,
        )
        .await
        .map(|_| ())
    }

    /// Install a policy package on one or more gateways or clusters.
    ///
    /// For a cluster, pass only the cluster's UUID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteCallInReadOnlySession`] on a read-only session,
    /// before any network activity.
    pub async fn push_policy(
        &self,
        policy: PolicyPackageUuid,
        targets: &[TargetUuid],
        parameters: &PolicyPushParameters,
    ) -> Result<Option<TaskId>> {
        self.ensure_writable("install-policy")?;
        info!(policy = %policy, targets = targets.len(), "Installing policy");
        let request = InstallPolicyRequest {
            policy_package: policy,
            targets: targets.to_vec(),
            parameters: *parameters,
        };
        let bytes = self
            .make_raw_api_call(endpoint::INSTALL_POLICY, to_body(&request)?)
            .await?;
        extract_task_id(&bytes)
    }

    /// Log out. Terminal for this session and every clone of it: keepalive
    /// schedulers stop, and later calls fail with [`Error::SessionClosed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if already logged out, otherwise the
    /// outcome of the logout call. The session is closed either way.
    pub async fn logout(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(closed_error());
        }
        self.inner.shutdown.cancel();
        info!(username = %self.inner.username, "Logging out of management server");
        self.send(endpoint::LOGOUT, json!({})).await.map(|_| ())
    }

    /// Start a keepalive scheduler bound to this session.
    ///
    /// The period is `period`, else the configured keepalive interval, else
    /// half the session timeout, never less than one second.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start_keepalive(&self, period: Option<Duration>) -> KeepaliveHandle {
        let period = period
            .or(self.inner.options.keepalive_interval)
            .unwrap_or(self.inner.session_timeout / 2)
            .max(MIN_KEEPALIVE_PERIOD);
        KeepaliveScheduler::start(self.clone(), period)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(closed_error())
        } else {
            Ok(())
        }
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.inner.read_only {
            error!(operation, "Write call attempted in a read-only session");
            return Err(Error::WriteCallInReadOnlySession(format!(
                "`{operation}` requires a read-write session"
            )));
        }
        Ok(())
    }
}

fn closed_error() -> Error {
    Error::SessionClosed("session has been logged out".to_string())
}

fn to_body<T: Serialize>(request: &T) -> Result<Value> {
    serde_json::to_value(request)
        .map_err(|err| Error::InvalidResponse(format!("Failed to encode request: {err}")))
}

/// Determine the effective username and read-only flag for a new session.
///
/// Values in the login request win, since a caller logging in with an API key
/// may not know its username; the login response fills in the rest.
///
/// # Errors
///
/// Returns [`Error::UnknownError`] when either value is available from
/// neither source.
pub fn resolve_user_data(
    request_body: &Map<String, Value>,
    result: &LoginResult,
) -> Result<(String, bool)> {
    let username = request_body
        .get("user")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| result.username.clone());
    let read_only = request_body
        .get("read-only")
        .and_then(Value::as_bool)
        .or(result.read_only);

    match (username, read_only) {
        (Some(username), Some(read_only)) => Ok((username, read_only)),
        _ => Err(Error::UnknownError(
            "login did not identify the user and session mode".to_string(),
        )),
    }
}
