use std::sync::Arc;
use std::time::Duration;

use promptdesk::AppContext;
use promptdesk::config::{Config, StorageBackend};
use promptdesk::storage::{KeyValueStore, MemoryStore, keys};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "hunter22";
pub const ACCESS_TOKEN: &str = "at-1";
pub const REFRESH_TOKEN: &str = "rt-1";

/// A client core wired to a mock backend and in-memory storage.
pub struct Harness {
    pub server: MockServer,
    pub store: MemoryStore,
    pub ctx: AppContext,
}

pub async fn harness() -> Harness {
    harness_with_store(MemoryStore::new()).await
}

pub async fn harness_with_store(store: MemoryStore) -> Harness {
    let server = MockServer::start().await;
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.storage.backend = StorageBackend::Memory;
    let ctx = AppContext::with_store(config, Arc::new(store.clone())).unwrap();
    Harness { server, store, ctx }
}

pub fn user_json() -> Value {
    json!({
        "id": "u1",
        "email": EMAIL,
        "metadata": { "name": "Ada", "organization_ids": ["o1"] }
    })
}

pub fn session_json(access_token: &str, refresh_token: &str, ttl_secs: i64) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_at": chrono::Utc::now().timestamp() + ttl_secs,
    })
}

/// Put a live session in storage as a previous run would have left it.
pub fn seed_session(store: &MemoryStore) {
    let session = session_json(ACCESS_TOKEN, REFRESH_TOKEN, 3600);
    store.set(keys::SESSION, &session.to_string()).unwrap();
    store.set(keys::AUTH_TOKEN, ACCESS_TOKEN).unwrap();
}

pub async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/sign_in"))
        .and(body_json(json!({ "email": EMAIL, "password": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json(),
            "session": session_json(ACCESS_TOKEN, REFRESH_TOKEN, 3600),
        })))
        .mount(server)
        .await;
}

pub async fn mount_me(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": user_json() })))
        .mount(server)
        .await;
}

pub async fn mount_workspace(server: &MockServer, company_id: Option<&str>, organizations: Value) {
    Mock::given(method("GET"))
        .and(path("/user/metadata"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "company_id": company_id } })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": organizations })))
        .mount(server)
        .await;
}

pub async fn sign_in(h: &Harness) {
    mount_sign_in(&h.server).await;
    h.ctx.session.sign_in(EMAIL, PASSWORD).await.unwrap();
}

/// Poll `condition` until it holds, failing after a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 1s");
}
