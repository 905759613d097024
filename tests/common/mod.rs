use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use madlen_chat::config::BackendConfig;
use madlen_chat::transport::http::HttpTransport;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Construct an `HttpTransport` pointing at the given mock server URL.
#[allow(dead_code)]
pub fn make_transport(base_url: &str) -> HttpTransport {
    HttpTransport::new(&BackendConfig {
        base_url: base_url.to_string(),
        connect_timeout_seconds: 2,
        user_agent: None,
    })
    .expect("valid transport")
}

/// A `POST /chat` reply streaming `body` as the assistant text.
#[allow(dead_code)]
pub fn chat_reply(body: &[u8], session_id: Option<i64>) -> ResponseTemplate {
    let template = ResponseTemplate::new(200).set_body_raw(body.to_vec(), "text/event-stream");
    match session_id {
        Some(id) => template.insert_header("X-Session-Id", id.to_string().as_str()),
        None => template,
    }
}

/// Session list as the backend serializes it.
#[allow(dead_code)]
pub fn sessions_json(sessions: &[(i64, &str)]) -> serde_json::Value {
    serde_json::Value::Array(
        sessions
            .iter()
            .map(|(id, title)| {
                json!({
                    "id": id,
                    "title": title,
                    "created_at": "2024-05-01T10:00:00.123456"
                })
            })
            .collect(),
    )
}

/// Mount `GET /sessions` answering with `sessions`.
#[allow(dead_code)]
pub async fn mount_sessions(server: &MockServer, sessions: &[(i64, &str)]) {
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sessions_json(sessions)))
        .mount(server)
        .await;
}

/// Poll `condition` until it holds or a second has passed.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
