use promptdesk::api::GoogleCredential;
use promptdesk::api::google;
use promptdesk::error::Error;
use promptdesk::notice::Notice;
use promptdesk::session::{RefreshOutcome, Route, SignUpOutcome};
use promptdesk::storage::{KeyValueStore, keys};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, ACCESS_TOKEN, EMAIL, PASSWORD, REFRESH_TOKEN};

#[tokio::test]
async fn test_sign_in_persists_session() {
    let h = common::harness().await;
    common::sign_in(&h).await;

    assert!(h.ctx.session.is_authenticated());
    assert_eq!(h.ctx.session.user().unwrap().id, "u1");
    assert_eq!(h.store.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some(ACCESS_TOKEN));
    let stored: serde_json::Value =
        serde_json::from_str(&h.store.get(keys::SESSION).unwrap().unwrap()).unwrap();
    assert_eq!(stored["refresh_token"], REFRESH_TOKEN);
}

#[tokio::test]
async fn test_sign_in_rejection_surfaces_detail() {
    let h = common::harness().await;
    let mut notices = h.ctx.notifier.subscribe();
    Mock::given(method("POST"))
        .and(path("/auth/sign_in"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid login credentials" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.ctx.session.sign_in(EMAIL, "wrong").await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials(ref m) if m == "Invalid login credentials"));
    assert!(!h.ctx.session.is_authenticated());
    assert!(h.store.is_empty());
    assert_eq!(notices.try_recv().unwrap(), Notice::error("Invalid login credentials"));
}

#[tokio::test]
async fn test_sign_in_rejection_without_detail_uses_fallback() {
    let h = common::harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/sign_in"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let err = h.ctx.session.sign_in(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to sign in");
}

#[tokio::test]
async fn test_hydrate_validates_with_bearer() {
    let store = promptdesk::storage::MemoryStore::new();
    common::seed_session(&store);
    let h = common::harness_with_store(store).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::user_json()))
        .expect(1)
        .mount(&h.server)
        .await;

    h.ctx.session.hydrate().await;
    let snapshot = h.ctx.session.snapshot();
    assert!(snapshot.is_authenticated);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.route(), Some(Route::Home));
    assert_eq!(snapshot.user.unwrap().display_name(), "Ada");
    assert!(h.ctx.session.has_pending_refresh().await);
}

#[tokio::test]
async fn test_hydrate_clears_rejected_token() {
    let store = promptdesk::storage::MemoryStore::new();
    common::seed_session(&store);
    let h = common::harness_with_store(store).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid token" })))
        .mount(&h.server)
        .await;

    h.ctx.session.hydrate().await;
    assert!(!h.ctx.session.is_authenticated());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_refresh_exchanges_refresh_token() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh_token"))
        .and(body_json(json!({ "refresh_token": REFRESH_TOKEN })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": common::session_json("at-2", "rt-2", 3600)
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    assert_eq!(h.ctx.session.refresh().await, RefreshOutcome::Refreshed);
    assert!(h.ctx.session.is_authenticated());
    assert_eq!(h.store.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("at-2"));
    assert_eq!(h.ctx.session.session().await.unwrap().refresh_token, "rt-2");
}

#[tokio::test]
async fn test_refresh_rejection_signs_out() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh_token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid refresh token" })),
        )
        .mount(&h.server)
        .await;

    assert_eq!(h.ctx.session.refresh().await, RefreshOutcome::SignedOut);
    assert!(!h.ctx.session.is_authenticated());
    assert_eq!(h.ctx.session.snapshot().route(), Some(Route::SignIn));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_sign_up_pending_verification() {
    let h = common::harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/sign_up"))
        .and(body_json(json!({ "email": EMAIL, "password": PASSWORD, "name": "Ada" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Check your email" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.ctx.session.sign_up(EMAIL, PASSWORD, "Ada").await.unwrap();
    assert_eq!(outcome.route(), Route::SignIn);
    assert!(matches!(outcome, SignUpOutcome::VerificationPending { ref message } if message == "Check your email"));
    assert!(!h.ctx.session.is_authenticated());
}

#[tokio::test]
async fn test_sign_up_validation_makes_no_request() {
    let h = common::harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/sign_up"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.ctx.session.sign_up(EMAIL, "123", "Ada").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_google_sign_in_from_access_token() {
    let h = common::harness().await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .and(query_param("access_token", "ya29.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "g-1",
            "email": EMAIL,
            "name": "Ada",
            "verified_email": true
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/sign_in_with_google"))
        .and(body_partial_json(json!({ "access_token": "ya29.token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": common::user_json(),
            "session": common::session_json(ACCESS_TOKEN, REFRESH_TOKEN, 3600),
            "is_new_user": true
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    let mut notices = h.ctx.notifier.subscribe();

    let userinfo = format!("{}/oauth2/v2/userinfo", h.server.uri());
    let credential: GoogleCredential =
        google::credential_from_access_token(h.ctx.api.http(), &userinfo, "ya29.token")
            .await
            .unwrap();
    let result = h.ctx.session.sign_in_with_google(&credential).await.unwrap();

    assert!(result.is_new_user);
    assert!(h.ctx.session.is_authenticated());
    let notice = notices.try_recv().unwrap();
    assert!(notice.message.contains("Your account has been created"));
}

#[tokio::test]
async fn test_unauthorized_response_clears_session() {
    let store = promptdesk::storage::MemoryStore::new();
    common::seed_session(&store);
    let h = common::harness_with_store(store).await;
    common::mount_me(&h.server).await;
    common::mount_workspace(&h.server, None, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/prompts/templates/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "expired" })))
        .mount(&h.server)
        .await;

    let _background = h.ctx.start().await;
    assert!(h.ctx.session.is_authenticated());

    let err = h
        .ctx
        .api
        .list(promptdesk::api::ResourceKind::Templates, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized));

    common::eventually(|| !h.ctx.session.is_authenticated()).await;
    assert!(h.store.get(keys::SESSION).unwrap().is_none());
}

#[tokio::test]
async fn test_sign_out_twice() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    h.ctx.session.sign_out().await;
    let first = h.ctx.session.snapshot();
    h.ctx.session.sign_out().await;
    assert_eq!(h.ctx.session.snapshot(), first);
    assert!(h.store.is_empty());
}
