//! Integration tests for classifying management API errors.
//!
//! The exemplars in `fixtures/error_exemplars.json` were captured from
//! several server generations, which encode the same failure differently.

use checkpoint_mgmt::{decode_response, Error};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct Exemplar {
    name: String,
    status: u16,
    body: Value,
    expected: String,
}

impl Exemplar {
    fn raw_body(&self) -> Vec<u8> {
        if self.body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&self.body).unwrap()
        }
    }
}

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_exemplars() -> Vec<Exemplar> {
    let fixture_path = fixtures_dir().join("error_exemplars.json");
    let json_data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read error fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize error fixture: {}", e))
}

#[test]
fn test_every_exemplar_decodes_to_expected_kind() {
    for exemplar in load_exemplars() {
        let err = decode_response(exemplar.status, exemplar.raw_body())
            .expect_err(&exemplar.name);
        assert_eq!(
            err.error_code(),
            exemplar.expected,
            "exemplar `{}` decoded to {:?}",
            exemplar.name,
            err
        );
        assert!(err.is_api_error(), "exemplar `{}`", exemplar.name);
    }
}

#[test]
fn test_every_decoded_kind_has_two_exemplars() {
    let exemplars = load_exemplars();
    let kinds = [
        "BAD_CREDENTIALS",
        "ACCOUNT_LOCKED",
        "CONNECTION_PROHIBITED",
        "TOO_MANY_REQUESTS",
        "UNKNOWN_API_VERSION",
        "INVALID_OBJECT",
        "VALIDATION_FAILED",
        "POLICY_INSTALLATION_FAILED",
        "API_DOWN",
        "UNKNOWN_ERROR",
    ];
    for kind in kinds {
        let count = exemplars.iter().filter(|e| e.expected == kind).count();
        assert!(count >= 2, "only {} exemplar(s) for {}", count, kind);
    }
}

#[test]
fn test_decoding_is_stable() {
    for exemplar in load_exemplars() {
        let first = decode_response(exemplar.status, exemplar.raw_body());
        let second = decode_response(exemplar.status, exemplar.raw_body());
        assert_eq!(first, second, "exemplar `{}`", exemplar.name);
    }
}

#[test]
fn test_server_message_is_preserved() {
    let locked = load_exemplars()
        .into_iter()
        .find(|e| e.expected == "ACCOUNT_LOCKED")
        .expect("Should have a locked-account exemplar");

    let err = decode_response(locked.status, locked.raw_body()).unwrap_err();
    assert!(matches!(err, Error::AccountLocked(_)));
    assert!(err.to_string().contains("Administrator account is locked."));

    let report = err.into_report();
    assert_eq!(report.code, "ACCOUNT_LOCKED");
    assert!(report.recovery_suggestion.is_some());
}

#[test]
fn test_success_body_is_untouched() {
    for body in [b"".to_vec(), b"Hello World".to_vec(), vec![0xff, 0x00, 0x7f]] {
        assert_eq!(decode_response(200, body.clone()), Ok(body));
    }
}
