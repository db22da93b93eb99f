//! The raw call path between a session and the management server.
//!
//! A [`Transport`] sends one JSON request and hands back the status code and
//! body untouched. A non-2xx status is an ordinary return value; only failures
//! that never produced an HTTP response surface as [`Error::Transport`].
//! Classification of the response is the caller's job.

use crate::Result;
use async_trait::async_trait;
use checkpoint_core::client::HttpSettings;
use checkpoint_core::config::ManagementConfig;
use checkpoint_core::types::{SESSION_HEADER, WEB_API_PREFIX};
use checkpoint_core::Error;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("checkpoint-mgmt/", env!("CARGO_PKG_VERSION"));

/// Opaque session token issued by the server at login.
///
/// The token grants full access to the session, so it never appears in
/// `Debug` output.
pub struct SessionId(SecretString);

impl SessionId {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Returns the raw token for placing on the wire.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SessionId {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// One call to the management API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Command name relative to the web API root, e.g. `show-task`.
    pub endpoint: String,
    /// Session token, absent only for login.
    pub session_id: Option<SessionId>,
    /// JSON request body.
    pub body: Value,
}

impl ApiRequest {
    /// Build a request.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, session_id: Option<SessionId>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            session_id,
            body,
        }
    }
}

/// The untouched outcome of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Build a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends requests to a management server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL of the management server.
    fn base_url(&self) -> &Url;

    /// Perform one call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when no HTTP response was obtained.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse>;
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportBuilder {
    config: ManagementConfig,
    http: HttpSettings,
}

impl HttpTransportBuilder {
    /// Create a builder from a [`ManagementConfig`].
    #[must_use]
    pub fn new(config: ManagementConfig) -> Self {
        let http = HttpSettings::from_config(&config);
        Self { config, http }
    }

    /// Override the HTTP settings derived from the configuration.
    #[must_use]
    pub fn with_http_settings(mut self, http: HttpSettings) -> Self {
        self.http = http;
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for an invalid URL, an unreadable CA
    /// certificate, or a client that cannot be constructed.
    pub fn build(self) -> Result<HttpTransport> {
        self.config.validate_config()?;
        let base_url = with_trailing_slash(self.config.parse_url()?);
        let api_url = base_url.join(WEB_API_PREFIX)?;

        let mut builder = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.http.request_timeout)
            .connect_timeout(self.http.connect_timeout)
            .pool_idle_timeout(self.http.idle_connection_timeout)
            .pool_max_idle_per_host(self.http.max_idle_connections);

        if !self.config.tls_verify {
            warn!(url = %base_url, "TLS verification disabled for management client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &self.config.tls_ca_cert {
            debug!("loading management CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes)
                .map_err(|err| Error::ConfigError(format!("Invalid CA certificate: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpTransport {
            http,
            base_url,
            api_url,
            log_traffic: self.http.log_traffic,
        })
    }
}

/// reqwest-backed [`Transport`] speaking to `{base}/web_api/{endpoint}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    api_url: Url,
    log_traffic: bool,
}

impl HttpTransport {
    /// Construct a transport directly from the configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpTransportBuilder::build`].
    pub fn from_config(config: &ManagementConfig) -> Result<Self> {
        HttpTransportBuilder::new(config.clone()).build()
    }

    /// Start a builder pre-populated with the provided configuration.
    #[must_use]
    pub fn builder(config: ManagementConfig) -> HttpTransportBuilder {
        HttpTransportBuilder::new(config)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.api_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid endpoint `{endpoint}`: {err}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
        let url = self.endpoint_url(&request.endpoint)?;

        let mut builder = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body);

        if let Some(session_id) = &request.session_id {
            builder = builder.header(SESSION_HEADER, session_id.expose());
        }

        if self.log_traffic {
            debug!(
                endpoint = %request.endpoint,
                authenticated = request.session_id.is_some(),
                "Sending management API request"
            );
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        if self.log_traffic {
            debug!(endpoint = %request.endpoint, status, bytes = body.len(), "Received response");
        }

        Ok(RawResponse { status, body })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_transport(server: &MockServer) -> HttpTransport {
        let config = ManagementConfig::new(server.uri()).unwrap();
        HttpTransport::from_config(&config).unwrap()
    }

    #[test]
    fn test_session_id_debug_is_redacted() {
        let sid = SessionId::new("s3cr3t-token");
        assert_eq!(format!("{sid:?}"), "SessionId([REDACTED])");
        assert_eq!(sid.clone().expose(), "s3cr3t-token");
    }

    #[test]
    fn test_base_url_gains_trailing_slash() {
        let config = ManagementConfig::new("https://mgmt.example.com/sub").unwrap();
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.base_url().as_str(), "https://mgmt.example.com/sub/");
        assert_eq!(
            transport.endpoint_url("/show-task").unwrap().as_str(),
            "https://mgmt.example.com/sub/web_api/show-task"
        );
    }

    #[test]
    fn test_missing_ca_certificate_is_a_config_error() {
        let config = ManagementConfig::new("https://mgmt.example.com/")
            .unwrap()
            .with_ca_cert("/nonexistent/ca.pem".into());
        let err = HttpTransport::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_login_request_has_no_session_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web_api/login"))
            .and(body_json(json!({"user": "admin", "password": "pw", "read-only": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sid": "abc"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = test_transport(&server);
        let response = transport
            .send(ApiRequest::new(
                "login",
                None,
                json!({"user": "admin", "password": "pw", "read-only": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get(SESSION_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_authenticated_request_carries_session_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web_api/keepalive"))
            .and(header(SESSION_HEADER, "token-1"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "OK"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = test_transport(&server);
        let response = transport
            .send(ApiRequest::new(
                "/keepalive",
                Some(SessionId::new("token-1")),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_error_statuses_are_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web_api/login"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "err_login_failed",
                "message": "Authentication to server failed."
            })))
            .mount(&server)
            .await;

        let transport = test_transport(&server);
        let response = transport
            .send(ApiRequest::new("login", None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["code"], "err_login_failed");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ManagementConfig::new(format!("http://127.0.0.1:{port}/")).unwrap();
        let transport = HttpTransport::from_config(&config).unwrap();
        let err = transport
            .send(ApiRequest::new("login", None, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!err.is_api_error());
    }
}
