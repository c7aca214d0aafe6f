//! Shared fixtures for tests that run against a mocked platform.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use lpr_ingest::{
    Backoff, Client, Credentials, FailurePolicy, IngestConfig, JobTemplate, PollPolicy, Session,
};

pub const TOKEN: &str = "test-token";
pub const USERNAME: &str = "ops";
pub const PASSWORD: &str = "hunter2";

pub fn client(server: &MockServer) -> Client {
    Client::new(server.uri()).expect("client builds")
}

pub fn session() -> Session {
    Session::from_token(TOKEN)
}

pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: Some(20),
        timeout: None,
        backoff: Backoff::Fixed,
    }
}

/// A temp directory holding one small fake video per name.
pub fn asset_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for name in names {
        fs::write(dir.path().join(name), format!("fake video bytes for {name}"))
            .expect("write asset");
    }
    dir
}

pub fn config(server: &MockServer, root: PathBuf) -> IngestConfig {
    IngestConfig {
        api_base: server.uri(),
        credentials: credentials(),
        camera_identifier: "gate-7".into(),
        asset_root: root,
        camera_delete: false,
        release_after_failure: true,
        failure_policy: FailurePolicy::AbortRemaining,
        poll: fast_poll(),
        job: JobTemplate::default(),
        face_categories: None,
        request_timeout: Duration::from_secs(5),
    }
}

pub async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_json(json!({ "username": USERNAME, "password": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
        .mount(server)
        .await;
}

pub async fn mount_camera_list(server: &MockServer, cameras: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/cameras"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": cameras })))
        .mount(server)
        .await;
}

/// Footage spanning one minute from 2024-03-05 08:02:09 local time.
pub fn footage_body(footage_id: u64) -> serde_json::Value {
    json!({
        "footageId": footage_id,
        "startTime": "2024-03-05T08:02:09",
        "endTime": "2024-03-05T08:03:09",
        "fileName": "clip.mp4"
    })
}

/// Matches requests whose `startTime` query value is 14 ASCII digits.
pub struct CompactStartTime;

impl Match for CompactStartTime {
    fn matches(&self, request: &Request) -> bool {
        request.url.query_pairs().any(|(k, v)| {
            k == "startTime" && v.len() == 14 && v.chars().all(|c| c.is_ascii_digit())
        })
    }
}

/// Number of requests the server saw for `method` + `path`.
pub async fn count_requests(server: &MockServer, method: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .count()
}
