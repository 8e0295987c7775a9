//! End-to-end tests for the clinical translation bridge
//!
//! Each test starts the HTTP server on an ephemeral port with an in-memory
//! database and a temporary uploads directory, then drives it over HTTP the
//! way the chat frontend does. The Gemini endpoint is either mocked with
//! wiremock or left unconfigured (offline continuity mode).

use clinical_bridge::{
    config::Config,
    server::{self, AppState},
    summary::{FALLBACK_SUMMARY, OFFLINE_SUMMARY},
};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, method, query_param},
    Mock, MockServer, ResponseTemplate,
};

// ==================== Test Helpers ====================

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    uploads: TempDir,
}

fn create_test_config(gemini_url: &str, gemini_key: Option<&str>, uploads: &TempDir) -> Config {
    Config {
        gemini_api_key: gemini_key.map(str::to_string),
        gemini_api_url: gemini_url.to_string(),
        gemini_timeout_secs: 1,
        database_url: "sqlite::memory:".to_string(),
        uploads_dir: uploads.path().to_str().unwrap().to_string(),
        api_key: None,
        port: 0,
    }
}

async fn spawn_app_with(configure: impl FnOnce(&mut Config), gemini_url: &str, gemini_key: Option<&str>) -> TestApp {
    let uploads = TempDir::new().expect("temp dir");
    let mut config = create_test_config(gemini_url, gemini_key, &uploads);
    configure(&mut config);

    let state = AppState::from_config(&config).await.expect("app state");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        uploads,
    }
}

async fn spawn_offline_app() -> TestApp {
    spawn_app_with(|_| {}, "http://127.0.0.1:1/unused", None).await
}

fn create_gemini_response(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

impl TestApp {
    async fn create_conversation(&self, doctor: &str, patient: &str) -> String {
        let response: Value = self
            .client
            .post(format!("{}/api/conversations", self.base_url))
            .json(&json!({ "doctorLanguage": doctor, "patientLanguage": patient }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        response["id"].as_str().unwrap().to_string()
    }

    async fn send_text(&self, conversation_id: &str, role: &str, text: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/messages/text", self.base_url))
            .json(&json!({ "conversationId": conversation_id, "senderRole": role, "text": text }))
            .send()
            .await
            .unwrap()
    }
}

// ==================== Conversation Tests ====================

#[tokio::test]
async fn test_health() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_create_conversation_defaults() {
    let app = spawn_offline_app().await;

    let created: Value = app
        .client
        .post(format!("{}/api/conversations", app.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(created["doctorLanguage"], "English");
    assert_eq!(created["patientLanguage"], "Spanish");

    let id = created["id"].as_str().unwrap();
    let fetched: Value = app
        .client
        .get(format!("{}/api/conversations/{}", app.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn test_unknown_conversation_returns_404() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .get(format!(
            "{}/api/conversations/00000000-0000-0000-0000-000000000000",
            app.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = app
        .send_text("00000000-0000-0000-0000-000000000000", "DOCTOR", "hello")
        .await;
    assert_eq!(response.status(), 404);
}

// ==================== Offline Continuity Mode ====================

#[tokio::test]
async fn test_offline_bidirectional_translation() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Hindi").await;

    let doctor: Value = app
        .send_text(&id, "DOCTOR", "Hello, how are you?")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(doctor["senderRole"], "DOCTOR");
    assert_eq!(doctor["originalText"], "Hello, how are you?");
    assert_eq!(doctor["translatedText"], "नमस्ते");

    let patient: Value = app
        .send_text(&id, "PATIENT", "मुझे बुखार है")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(patient["translatedText"], "I have a high fever");

    let messages: Vec<Value> = app
        .client
        .get(format!("{}/api/conversations/{}/messages", app.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["senderRole"], "DOCTOR");
    assert_eq!(messages[1]["senderRole"], "PATIENT");
}

#[tokio::test]
async fn test_offline_unsupported_language_passthrough() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Spanish").await;

    let message: Value = app
        .send_text(&id, "DOCTOR", "Do you have pain?")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(message["translatedText"], "Do you have pain?");
}

#[tokio::test]
async fn test_offline_summary() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Hindi").await;

    let response: Value = app
        .client
        .post(format!("{}/api/summary/{}", app.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["summary"], OFFLINE_SUMMARY);
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Hindi").await;

    let response = app.send_text(&id, "DOCTOR", "   ").await;
    assert_eq!(response.status(), 400);
}

// ==================== Remote Provider ====================

#[tokio::test]
async fn test_remote_translation_used_when_available() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("from English to Spanish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_gemini_response("¿Tiene fiebre?")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = spawn_app_with(|_| {}, &mock_server.uri(), Some("test-key")).await;
    let id = app.create_conversation("English", "Spanish").await;

    let message: Value = app
        .send_text(&id, "DOCTOR", "Do you have a fever?")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(message["translatedText"], "¿Tiene fiebre?");
}

#[tokio::test]
async fn test_remote_failure_degrades_to_offline() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let app = spawn_app_with(|_| {}, &mock_server.uri(), Some("test-key")).await;
    let id = app.create_conversation("English", "Hindi").await;

    let response = app.send_text(&id, "PATIENT", "my heart rate is 120").await;
    assert_eq!(response.status(), 200);
    let message: Value = response.json().await.unwrap();
    assert_eq!(message["translatedText"], "My heart rate is 120");

    let summary: Value = app
        .client
        .post(format!("{}/api/summary/{}", app.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["summary"], FALLBACK_SUMMARY);
}

// ==================== Search ====================

#[tokio::test]
async fn test_search_matches_original_and_translated_text() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Hindi").await;

    app.send_text(&id, "DOCTOR", "Any FEVER today?").await;
    app.send_text(&id, "PATIENT", "मुझे दर्द है").await;

    let fever: Vec<Value> = app
        .client
        .get(format!("{}/api/search", app.base_url))
        .query(&[("query", "fever")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fever.len(), 1);
    assert_eq!(fever[0]["senderRole"], "DOCTOR");

    // Matches the stored translation of the patient's message
    let pain: Vec<Value> = app
        .client
        .get(format!("{}/api/search", app.base_url))
        .query(&[("query", "PAIN")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pain.len(), 1);
    assert_eq!(pain[0]["translatedText"], "I am feeling some pain");
}

// ==================== Audio ====================

#[tokio::test]
async fn test_audio_upload_and_download() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Hindi").await;

    let form = reqwest::multipart::Form::new()
        .text("conversationId", id.clone())
        .text("senderRole", "PATIENT")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"webm-bytes".to_vec()).file_name("note.webm"),
        );

    let message: Value = app
        .client
        .post(format!("{}/api/messages/audio", app.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(message["originalText"].is_null());
    let audio_url = message["audioUrl"].as_str().unwrap();
    assert!(audio_url.starts_with("/api/audio/"));

    let download = app
        .client
        .get(format!("{}{}", app.base_url, audio_url))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(download.headers()["content-type"], "audio/webm");
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"webm-bytes");
}

#[tokio::test]
async fn test_audio_removed_when_message_insert_fails() {
    let db_dir = TempDir::new().expect("temp dir");
    let database_url = format!("sqlite://{}?mode=rwc", db_dir.path().join("bridge.db").display());

    let url = database_url.clone();
    let app = spawn_app_with(move |c| c.database_url = url, "http://127.0.0.1:1/unused", None).await;
    let id = app.create_conversation("English", "Hindi").await;

    // Make every audio message insert fail from a second connection
    let pool = sqlx::SqlitePool::connect(&database_url).await.expect("connect");
    sqlx::query(
        "CREATE TRIGGER reject_audio BEFORE INSERT ON messages
         WHEN NEW.audio_url IS NOT NULL
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    )
    .execute(&pool)
    .await
    .expect("create trigger");
    pool.close().await;

    let form = reqwest::multipart::Form::new()
        .text("conversationId", id)
        .text("senderRole", "PATIENT")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"webm-bytes".to_vec()).file_name("note.webm"),
        );

    let response = app
        .client
        .post(format!("{}/api/messages/audio", app.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(std::fs::read_dir(app.uploads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_audio_upload_missing_file_rejected() {
    let app = spawn_offline_app().await;
    let id = app.create_conversation("English", "Hindi").await;

    let form = reqwest::multipart::Form::new()
        .text("conversationId", id)
        .text("senderRole", "DOCTOR");

    let response = app
        .client
        .post(format!("{}/api/messages/audio", app.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_missing_audio_returns_404() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .get(format!("{}/api/audio/nope.webm", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

// ==================== API Key ====================

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let app = spawn_app_with(
        |c| c.api_key = Some("secret".to_string()),
        "http://127.0.0.1:1/unused",
        None,
    )
    .await;

    let rejected = app
        .client
        .post(format!("{}/api/conversations", app.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 401);

    let accepted = app
        .client
        .post(format!("{}/api/conversations", app.base_url))
        .header("X-API-Key", "secret")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);

    // Health stays open
    let health = app
        .client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
}
