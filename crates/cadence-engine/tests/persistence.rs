//! Loading, configuration and persistence tests

use cadence_engine::{
    EchoHandler, EngineConfig, EngineError, SessionManager, SessionRecord, SessionState,
};
use cadence_scenario::{DefinitionError, Format};
use cadence_test_utils::{
    dispatcher_for, fast_config, fixture_manager, object, ScriptedHandler, BRANCH_FLOW,
    SUPPORT_FLOW,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::sync::Arc;

#[tokio::test]
async fn snapshot_survives_json_and_restores_into_new_manager() {
    let first = fixture_manager(fast_config(), dispatcher_for(&Arc::new(EchoHandler)));
    let id = first
        .start("support", object(json!({"customer": "Ada", "api_key": "k-123"})))
        .await
        .unwrap();

    let record = first.snapshot(id).await.unwrap();
    let stored = serde_json::to_string(&record).unwrap();
    let record: SessionRecord = serde_json::from_str(&stored).unwrap();
    assert_eq!(record.context.get("api_key"), Some(&json!("k-123")));

    let handler = Arc::new(ScriptedHandler::new());
    let second = fixture_manager(fast_config(), dispatcher_for(&handler));
    assert_eq!(second.restore(record).unwrap(), id);

    let status = second.resume(id, json!("yes")).await.unwrap();
    assert_eq!(status.state, SessionState::Completed);
    assert_eq!(status.history.len(), 6);
    assert!(handler.calls().is_empty());
}

#[tokio::test]
async fn restore_rejects_changed_scenario() {
    let manager = fixture_manager(fast_config(), dispatcher_for(&Arc::new(EchoHandler)));
    let id = manager
        .start("support", object(json!({"customer": "Ada"})))
        .await
        .unwrap();
    let record = manager.snapshot(id).await.unwrap();

    let changed = SUPPORT_FLOW.replace("Did that help?", "Was this useful?");
    manager.load_scenario(&changed, Format::Yaml).unwrap();

    let err = manager.restore(record).unwrap_err();
    assert!(matches!(err, EngineError::FingerprintMismatch { ref scenario, .. } if scenario == "support"));
}

#[tokio::test]
async fn status_redacts_configured_keys() {
    let manager = fixture_manager(
        fast_config().with_redact_keys(["ssn"]),
        dispatcher_for(&Arc::new(EchoHandler)),
    );
    let id = manager
        .start(
            "support",
            object(json!({"customer": "Ada", "profile": {"ssn": "123", "city": "Oslo"}, "password": "pw"})),
        )
        .await
        .unwrap();

    let status = manager.status(id).await.unwrap();
    assert_eq!(status.context.get("profile"), Some(&json!({"ssn": "[redacted]", "city": "Oslo"})));
    assert_eq!(status.context.get("password"), Some(&json!("pw")));
}

#[test]
fn directory_loading_registers_every_scenario() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a_support.yaml"), SUPPORT_FLOW).unwrap();
    fs::write(dir.path().join("b_branching.yml"), BRANCH_FLOW).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a scenario").unwrap();

    let manager =
        SessionManager::new(fast_config(), dispatcher_for(&Arc::new(EchoHandler))).unwrap();
    let loaded = manager.load_scenarios_from_dir(dir.path()).unwrap();
    assert_eq!(loaded, vec!["support".to_string(), "branching".to_string()]);
    assert_eq!(manager.scenario_ids(), vec!["branching".to_string(), "support".to_string()]);
}

#[test]
fn directory_with_invalid_file_registers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.yaml"), BRANCH_FLOW).unwrap();
    fs::write(dir.path().join("b.json"), r#"{"id": "broken", "steps": []}"#).unwrap();

    let manager =
        SessionManager::new(fast_config(), dispatcher_for(&Arc::new(EchoHandler))).unwrap();
    let err = manager.load_scenarios_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, EngineError::Definition(DefinitionError::Invalid { .. })));
    assert!(manager.scenario_ids().is_empty());
}

#[tokio::test]
async fn configured_alias_is_honoured_at_load_time() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cadence.toml");
    fs::write(
        &config_path,
        "retry_delay_ms = 1\n\n[aliases]\nnotify_customer = \"send_message\"\n",
    )
    .unwrap();
    let config = EngineConfig::from_file(&config_path).unwrap();

    let handler = Arc::new(ScriptedHandler::new());
    let manager = SessionManager::new(config, dispatcher_for(&handler)).unwrap();
    let warnings = manager
        .load_scenario(
            r#"{"id": "notify", "steps": [
                {"id": "s", "kind": "start", "next": "n"},
                {"id": "n", "kind": "notify_customer", "params": {"text": "hello"}, "next": "$end"}
            ]}"#,
            Format::Json,
        )
        .unwrap();
    assert!(warnings.is_empty());

    let id = manager.start("notify", object(json!({}))).await.unwrap();
    assert_eq!(manager.status(id).await.unwrap().state, SessionState::Completed);
    assert_eq!(handler.call_count("send_message"), 1);
}
