//! Integration tests driving whole sessions against a mock management server.

use checkpoint_core::config::ManagementConfig;
use checkpoint_core::uuid::{PolicyPackageUuid, TargetUuid, TaskId};
use checkpoint_mgmt::{
    task_status, Credentials, Error, LoginResult, PolicyPushParameters, Session, TaskPollOptions,
};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TASK: &str = "01234567-89ab-cdef-0123-456789abcdef";
const PASSWORD_SID: &str = "hLx4R0B6cVhJ0nZ2oxZbqf0aP6x8y2k3uI9Q1rTq0lA";

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> Value {
    let fixture_path = fixtures_dir().join(name);
    let json_data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", name, e))
}

fn config_for(server: &MockServer) -> ManagementConfig {
    ManagementConfig::new(server.uri()).unwrap()
}

async fn mount_login(server: &MockServer, fixture: &str) {
    Mock::given(method("POST"))
        .and(path("/web_api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture(fixture)))
        .expect(1)
        .mount(server)
        .await;
}

#[test]
fn test_deserialize_login_fixtures() {
    let password: LoginResult = serde_json::from_value(load_fixture("login_password.json")).unwrap();
    assert_eq!(password.api_server_version, "1.9.1");
    assert_eq!(password.session_timeout, 600);
    assert_eq!(password.username, None);
    assert_eq!(
        password.last_login.as_ref().map(|ts| ts.posix.timestamp()),
        Some(1_742_137_014)
    );

    let api_key: LoginResult = serde_json::from_value(load_fixture("login_api_key.json")).unwrap();
    assert_eq!(api_key.username.as_deref(), Some("automation"));
    assert_eq!(api_key.read_only, Some(true));
    let posix = api_key.last_login.map(|ts| ts.posix.timestamp()).unwrap();
    assert!((posix - 1_728_954_738).abs() <= 1);
}

#[tokio::test]
async fn test_full_write_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/web_api/login"))
        .and(body_json(json!({
            "user": "admin",
            "password": "secret",
            "read-only": false
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(load_fixture("login_password.json")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/keepalive"))
        .and(header("X-chkp-sid", PASSWORD_SID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/publish"))
        .and(header("X-chkp-sid", PASSWORD_SID))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task-id": TASK})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/show-task"))
        .and(body_json(json!({"task-id": TASK})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(load_fixture("show_task_in_progress.json")),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/show-task"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(load_fixture("show_task_succeeded.json")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/logout"))
        .and(header("X-chkp-sid", PASSWORD_SID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::connect(
        &config_for(&server),
        &Credentials::password("admin", "secret"),
        false,
    )
    .await
    .unwrap();

    assert_eq!(session.username(), "admin");
    assert!(!session.is_read_only());
    assert_eq!(session.session_timeout(), Duration::from_secs(600));

    session.keepalive().await.unwrap();

    let task_id = session.publish().await.unwrap().expect("publish returns a task");
    assert_eq!(task_id, TaskId::parse_str(TASK).unwrap());

    let record = session
        .sync_task(
            task_id,
            TaskPollOptions::new(Duration::from_millis(10), Duration::from_secs(5)),
        )
        .await
        .unwrap();
    assert_eq!(task_status(record.as_ref()), "succeeded");
    assert_eq!(record.unwrap().progress_percentage(), Some(100));

    session.logout().await.unwrap();
    assert!(matches!(
        session.keepalive().await,
        Err(Error::SessionClosed(_))
    ));
}

#[tokio::test]
async fn test_read_only_session_sends_no_writes() {
    let server = MockServer::start().await;
    mount_login(&server, "login_api_key.json").await;

    let session = Session::connect(&config_for(&server), &Credentials::api_key("key"), true)
        .await
        .unwrap();
    assert!(session.is_read_only());
    assert_eq!(session.username(), "automation");

    let params = PolicyPushParameters {
        access: true,
        ..PolicyPushParameters::default()
    };
    assert!(matches!(
        session.publish().await,
        Err(Error::WriteCallInReadOnlySession(_))
    ));
    assert!(matches!(
        session.discard(None).await,
        Err(Error::WriteCallInReadOnlySession(_))
    ));
    assert!(matches!(
        session
            .push_policy(PolicyPackageUuid::new_v4(), &[TargetUuid::new_v4()], &params)
            .await,
        Err(Error::WriteCallInReadOnlySession(_))
    ));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "only the login request reaches the server");
}

#[tokio::test]
async fn test_login_failures_are_classified() {
    let cases = [
        (
            400,
            json!({"code": "err_login_failed", "message": "Authentication to server failed."}),
            "BAD_CREDENTIALS",
        ),
        (
            400,
            json!({"code": "err_login_failed", "message": "Administrator account is locked."}),
            "ACCOUNT_LOCKED",
        ),
        (
            400,
            json!({
                "code": "err_login_failed",
                "message": "API authentication to server 10.0.1.251 failed. Check that you have permission to login through API"
            }),
            "CONNECTION_PROHIBITED",
        ),
    ];

    for (status, body, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web_api/login"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        let err = Session::connect(
            &config_for(&server),
            &Credentials::password("admin", "wrong"),
            false,
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), expected);
    }
}

#[tokio::test]
async fn test_push_policy_and_wait() {
    let server = MockServer::start().await;
    mount_login(&server, "login_password.json").await;

    Mock::given(method("POST"))
        .and(path("/web_api/install-policy"))
        .and(body_json(json!({
            "policy-package": "11111111-1111-1111-1111-111111111111",
            "targets": ["22222222-2222-2222-2222-222222222222"],
            "access": true,
            "desktop-security": false,
            "qos": false,
            "threat-prevention": false,
            "install-on-all-cluster-members-or-fail": false,
            "prepare-only": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task-id": TASK})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/show-task"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(load_fixture("show_task_succeeded.json")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::connect(
        &config_for(&server),
        &Credentials::password("admin", "secret"),
        false,
    )
    .await
    .unwrap();

    let record = session
        .push_policy_and_wait(
            PolicyPackageUuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap(),
            &[TargetUuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap()],
            &PolicyPushParameters {
                access: true,
                ..PolicyPushParameters::default()
            },
            TaskPollOptions::new(Duration::from_millis(10), Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert_eq!(task_status(record.as_ref()), "succeeded");
}

#[tokio::test]
async fn test_keepalive_scheduler_fires_against_server() {
    let server = MockServer::start().await;
    mount_login(&server, "login_password.json").await;

    Mock::given(method("POST"))
        .and(path("/web_api/keepalive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::connect(
        &config_for(&server),
        &Credentials::password("admin", "secret"),
        false,
    )
    .await
    .unwrap();

    let handle = session.start_keepalive(Some(Duration::from_secs(3600)));
    handle.fire();

    let mut keepalives = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        keepalives = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/web_api/keepalive")
            .count();
        if keepalives > 0 {
            break;
        }
    }
    assert_eq!(keepalives, 1);

    handle.shutdown().await;
}
