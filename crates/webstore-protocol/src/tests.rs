use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use super::*;

const WEBSTORE_PROTOCOL_FIXTURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
struct WebStoreProtocolFixture {
    schema_version: u32,
    name: String,
    messages: Vec<Value>,
    expected: Vec<Value>,
}

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("webstore-protocol")
        .join(name)
}

fn load_fixture(name: &str) -> WebStoreProtocolFixture {
    let path = fixture_path(name);
    let raw = std::fs::read_to_string(&path)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()));
    let fixture = serde_json::from_str::<WebStoreProtocolFixture>(&raw)
        .unwrap_or_else(|error| panic!("invalid fixture {}: {error}", path.display()));
    assert_eq!(
        fixture.schema_version, WEBSTORE_PROTOCOL_FIXTURE_SCHEMA_VERSION,
        "fixture '{}' has unsupported schema_version",
        fixture.name
    );
    assert_eq!(fixture.messages.len(), fixture.expected.len());
    fixture
}

fn replay_fixture(fixture: &WebStoreProtocolFixture) -> Vec<Value> {
    fixture
        .messages
        .iter()
        .map(|body| match parse_webstore_message(body, None) {
            Ok(request) => json!({ "kind": request.kind().as_str() }),
            Err(rejection) => json!({ "error": rejection.reply_error() }),
        })
        .collect()
}

fn install_data() -> Value {
    json!({
        "id": "ext-a",
        "manifest": "{\"name\":\"Ext A\",\"author\":{\"name\":\"Alice\"},\"permissions\":[\"storage\",\"tabs\"]}",
        "iconUrl": "https://store.example/icon.png",
        "localizedName": "Ext A"
    })
}

#[test]
fn unit_request_kind_round_trips_every_supported_name() {
    for name in WEBSTORE_REQUEST_KINDS {
        let kind: WebStoreRequestKind = name.parse().expect("supported kind");
        assert_eq!(kind.as_str(), *name);
    }
}

#[test]
fn unit_envelope_requires_string_name_and_object_data() {
    let envelope = parse_webstore_message_envelope(&json!({
        "name": "getAll",
        "data": { "unused": 1 }
    }))
    .expect("valid envelope");
    assert_eq!(envelope.name, "getAll");
    assert_eq!(envelope.data.get("unused"), Some(&json!(1)));

    let error = parse_webstore_message_envelope(&json!({ "name": "getAll", "data": null }))
        .expect_err("null data is rejected");
    assert_eq!(error.reply_error(), WEBSTORE_ERROR_INVALID_MESSAGE);
}

#[test]
fn unit_missing_identifier_fields_default_to_empty_strings() {
    let request = parse_webstore_message(
        &json!({ "name": "getExtensionStatus", "data": { "extension_id": 42 } }),
        None,
    )
    .expect("parse");
    assert_eq!(
        request,
        WebStoreRequest::GetExtensionStatus {
            extension_id: String::new()
        }
    );

    let request = parse_webstore_message(&json!({ "name": "completeInstall", "data": {} }), None)
        .expect("parse");
    assert_eq!(
        request,
        WebStoreRequest::CompleteInstall {
            expected_id: String::new()
        }
    );
}

#[test]
fn unit_uninstall_confirm_dialog_requires_literal_true() {
    let parse_options = |options: Value| match parse_webstore_message(
        &json!({ "name": "uninstall", "data": { "extension_id": "ext-a", "options": options } }),
        None,
    )
    .expect("parse")
    {
        WebStoreRequest::Uninstall { options, .. } => options,
        other => panic!("unexpected request {other:?}"),
    };

    assert!(parse_options(json!({ "showConfirmDialog": true })).show_confirm_dialog);
    assert!(!parse_options(json!({ "showConfirmDialog": "true" })).show_confirm_dialog);
    assert!(!parse_options(json!({})).show_confirm_dialog);
    assert!(!parse_options(json!(null)).show_confirm_dialog);
}

#[test]
fn functional_install_request_decodes_manifest_fields() {
    let request = match parse_webstore_message(
        &json!({ "name": "beginInstallWithManifest3", "data": install_data() }),
        None,
    )
    .expect("parse")
    {
        WebStoreRequest::BeginInstallWithManifest3(request) => request,
        other => panic!("unexpected request {other:?}"),
    };
    assert_eq!(request.id, "ext-a");
    assert_eq!(request.localized_name, "Ext A");
    assert_eq!(request.icon_url(), Some("https://store.example/icon.png"));

    let manifest = request.parse_manifest().expect("manifest");
    assert_eq!(manifest.author_label(), "Alice");
    assert_eq!(manifest.permissions(), ["storage", "tabs"]);
}

#[test]
fn functional_install_request_accepts_object_manifest_and_defaults_author() {
    let data = json!({
        "id": "ext-b",
        "manifest": { "name": "Ext B" },
        "localizedName": "Ext B",
        "iconUrl": "   "
    });
    let request =
        InstallRequest::from_message_data(data.as_object().expect("object")).expect("decode");
    assert_eq!(request.icon_url(), None);
    let manifest = request.parse_manifest().expect("manifest");
    assert_eq!(manifest.author_label(), MANIFEST_AUTHOR_FALLBACK);
    assert!(manifest.permissions().is_empty());
}

#[test]
fn regression_blank_manifest_author_uses_fallback_label() {
    let manifest = ExtensionManifest::parse(r#"{"author":{"name":"  "}}"#).expect("manifest");
    assert_eq!(manifest.author_name(), None);
    assert_eq!(manifest.author_label(), MANIFEST_AUTHOR_FALLBACK);
}

#[test]
fn regression_non_object_manifest_author_is_tolerated() {
    for raw in [
        r#"{"name":"Ext","author":"Alice"}"#,
        r#"{"name":"Ext","author":["Alice"]}"#,
        r#"{"name":"Ext","author":null}"#,
    ] {
        let manifest = ExtensionManifest::parse(raw).expect("manifest");
        assert_eq!(manifest.name.as_deref(), Some("Ext"));
        assert_eq!(manifest.author_label(), MANIFEST_AUTHOR_FALLBACK);
    }
}

#[test]
fn regression_install_decode_failure_uses_detailed_error_token() {
    let error = parse_webstore_message(
        &json!({ "name": "beginInstallWithManifest3", "data": { "id": "ext-a" } }),
        None,
    )
    .expect_err("missing manifest must fail");
    assert!(matches!(
        error,
        MessageRejection::InvalidInstallRequest { .. }
    ));
    let reply_error = error.reply_error();
    assert!(reply_error.starts_with(WEBSTORE_ERROR_DETAIL_PREFIX));
    assert!(reply_error.contains("manifest"));
}

#[test]
fn regression_oversized_body_is_an_invalid_message() {
    let error = parse_webstore_message(
        &json!({ "name": "getAll", "data": { "padding": "x".repeat(256) } }),
        Some(64),
    )
    .expect_err("oversized body");
    assert!(matches!(error, MessageRejection::MessageTooLarge { .. }));
    assert_eq!(error.reply_error(), WEBSTORE_ERROR_INVALID_MESSAGE);
}

#[test]
fn unit_reply_constructors_match_script_contract() {
    assert_eq!(
        WebStoreReply::empty_success(),
        WebStoreReply {
            result: Some(json!("")),
            error: None
        }
    );
    let failure = WebStoreReply::detailed_failure("boom");
    assert_eq!(failure.error.as_deref(), Some("ERROR!: boom"));
    assert!(failure.result.is_none());
    assert!(!failure.is_success());
    assert_eq!(ExtensionStatus::from_installed(true).as_str(), "enabled");
    assert_eq!(ExtensionStatus::from_installed(false).as_str(), "installable");
}

#[test]
fn functional_fixture_replays_known_operations() {
    let fixture = load_fixture("dispatch-known-operations.json");
    assert_eq!(replay_fixture(&fixture), fixture.expected);
}

#[test]
fn regression_fixture_preserves_malformed_message_contracts() {
    let fixture = load_fixture("dispatch-malformed-messages.json");
    let first = replay_fixture(&fixture);
    let second = replay_fixture(&fixture);
    assert_eq!(first, second);
    assert_eq!(first, fixture.expected);
}
