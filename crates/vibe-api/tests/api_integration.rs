use std::path::Path;
use std::sync::Arc;

use axum_test::TestServer;
use serde_json::json;
use vibe_api::{create_router, AppState};
use vibe_core::{GitHubConfig, GraphConfig, LlmConfig, Preferences, ServerConfig, Settings};
use vibe_llm::{LlmClient, ScriptedLlm};

fn test_settings(dir: &Path) -> Settings {
    Settings {
        server: ServerConfig::default(),
        llm: LlmConfig {
            api_key: None,
            model: "scripted-llm".to_string(),
        },
        github: GitHubConfig::default(),
        graph: GraphConfig::default(),
        preferences: Preferences::default(),
        preferences_path: dir.join("user_config.json"),
        logs_dir: dir.join("logs"),
        prompt_catalog_path: dir.join("prompt_config.json"),
    }
}

fn server_with(llm: ScriptedLlm, dir: &Path) -> TestServer {
    let state = AppState::with_llm(test_settings(dir), Arc::new(llm) as Arc<dyn LlmClient>)
        .expect("app state");
    TestServer::new(create_router(state)).expect("test server")
}

#[tokio::test]
async fn health_endpoint_reports_environment() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("ok"), dir.path());

    let resp = server.get("/api/health").await;
    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "vibe-assistant");
    assert_eq!(body["environment"]["llm_configured"], false);
}

#[tokio::test]
async fn enhance_prompt_returns_envelope_with_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("Enhanced specification text"), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({
            "prompt": "Create a login page",
            "requirements": ["Use TypeScript"],
            "selected_files": [{"name": "app.tsx", "type": "file"}],
            "enhancement_type": "enhanced_prompt"
        }))
        .await;

    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["enhanced_prompt"], "Enhanced specification text");
    assert_eq!(body["original_input"], "Create a login page");
    assert_eq!(body["enhancement_type"], "enhanced_prompt");
    assert_eq!(body["metadata"]["requirement_count"], 1);
    assert_eq!(body["metadata"]["file_count"], 1);
    assert_eq!(body["metadata"]["custom_instructions_used"], false);
    assert_eq!(body["metadata"]["model_used"], "scripted-llm");
}

#[tokio::test]
async fn legacy_enhancement_type_aliases_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("done"), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({"prompt": "anything", "enhancement_type": "maximum_detail"}))
        .await;

    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["enhancement_type"], "full_specification");
}

#[tokio::test]
async fn missing_prompt_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({"enhancement_type": "rephrase"}))
        .await;

    assert_eq!(resp.status_code(), 400);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Prompt is required"));
}

#[tokio::test]
async fn oversized_custom_instructions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({
            "prompt": "anything",
            "custom_instructions": "a".repeat(2001)
        }))
        .await;

    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn script_only_custom_instructions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({
            "prompt": "anything",
            "custom_instructions": "<script>alert(1)</script>"
        }))
        .await;

    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn custom_instructions_force_the_custom_path() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("custom result"), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({
            "prompt": "anything",
            "custom_instructions": "Answer in three bullets."
        }))
        .await;

    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["enhancement_type"], "custom");
    assert_eq!(body["metadata"]["custom_instructions_used"], true);
    assert_eq!(
        body["metadata"]["custom_instructions_length"],
        "Answer in three bullets.".len()
    );
}

#[tokio::test]
async fn failed_connectivity_probe_returns_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::disconnected(), dir.path());

    let resp = server
        .post("/api/enhance-prompt")
        .json(&json!({"prompt": "anything"}))
        .await;

    assert_eq!(resp.status_code(), 503);
    let body: serde_json::Value = resp.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("AI service temporarily unavailable"));
}

#[tokio::test]
async fn config_roundtrip_updates_preferences_and_masks_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server.get("/api/config").await;
    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["config"]["llm"]["api_key"], "");

    let resp = server
        .post("/api/config")
        .json(&json!({"preferences": {"editor_theme": "dark"}}))
        .await;
    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["config"]["preferences"]["editor_theme"], "dark");

    // The update persisted to the file store.
    let resp = server.get("/api/config").await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["config"]["preferences"]["editor_theme"], "dark");
}

#[tokio::test]
async fn requirements_endpoint_requires_task_type_on_update() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server.get("/api/requirements").await;
    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert!(body["requirements"]["development"].is_array());

    let resp = server
        .post("/api/requirements")
        .json(&json!({"requirements": ["anything"]}))
        .await;
    assert_eq!(resp.status_code(), 400);

    let resp = server
        .post("/api/requirements")
        .json(&json!({"task_type": "development", "requirements": ["Only this one"]}))
        .await;
    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["requirements"]["development"], json!(["Only this one"]));
}

#[tokio::test]
async fn analyze_prompt_reports_complexity_and_references() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/analyze-prompt")
        .json(&json!({"prompt": "Please fix the bug in `auth.py` and add a regression test."}))
        .await;

    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["analysis"]["estimated_complexity"], "low");
    assert_eq!(body["analysis"]["has_file_references"], true);
    assert!(body["file_references"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v == "auth.py"));
}

#[tokio::test]
async fn stream_response_emits_chunks_and_done_event() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("streamed answer text"), dir.path());

    let resp = server
        .post("/api/stream-response")
        .json(&json!({"prompt": "hello", "max_tokens": 100, "temperature": 0.2}))
        .await;

    assert_eq!(resp.status_code(), 200);
    let text = resp.text();
    assert!(text.contains("\"chunk\""));
    assert!(text.contains("\"done\":true"));
}

#[tokio::test]
async fn stream_response_without_prompt_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server.post("/api/stream-response").json(&json!({})).await;
    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn graph_import_validation_runs_before_the_store_is_touched() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/graph/import")
        .json(&json!({"nodes": [{"name": "missing id"}]}))
        .await;
    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn saving_a_graph_with_an_unknown_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/graph/save")
        .json(&json!({
            "name": "snapshot",
            "graph_type": "misc",
            "graph_data": {"nodes": [], "edges": []}
        }))
        .await;
    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn unknown_endpoints_return_the_standard_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server.get("/api/nope").await;
    assert_eq!(resp.status_code(), 404);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Endpoint not found"));
}

#[tokio::test]
async fn log_frontend_error_acknowledges_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(ScriptedLlm::fixed("unused"), dir.path());

    let resp = server
        .post("/api/log-frontend-error")
        .json(&json!({"message": "TypeError: x is undefined", "url": "/editor"}))
        .await;

    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["success"], true);

    let logs_dir = dir.path().join("logs");
    let has_error_log = std::fs::read_dir(&logs_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("errors_"));
    assert!(has_error_log);
}
