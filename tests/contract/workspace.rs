use promptdesk::notice::Notice;
use promptdesk::storage::{KeyValueStore, MemoryStore, keys};
use promptdesk::workspace::{Scope, Space};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, ACCESS_TOKEN};

#[tokio::test]
async fn test_load_sends_bearer_and_reads_access() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    let bearer = format!("Bearer {ACCESS_TOKEN}");
    Mock::given(method("GET"))
        .and(path("/user/metadata"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "company_id": "c1" } })),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "o1", "name": "Acme", "website_url": "https://acme.test" },
                { "id": "o2", "name": "Beta" }
            ]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.ctx.workspace.load(h.ctx.session.user().as_ref()).await;
    let state = h.ctx.workspace.state();
    assert_eq!(state.company_id.as_deref(), Some("c1"));
    assert_eq!(state.available_organizations.len(), 2);
    assert_eq!(
        state.available_organizations[0].website_url.as_deref(),
        Some("https://acme.test")
    );
    assert_eq!(state.current_space, Space::Personal);
    assert_eq!(state.scope(), Some(Scope::User("u1".into())));
}

#[tokio::test]
async fn test_partial_failure_degrades_to_personal() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("GET"))
        .and(path("/user/metadata"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "company_id": "c1" } })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    let mut notices = h.ctx.notifier.subscribe();

    h.ctx.workspace.load(h.ctx.session.user().as_ref()).await;
    let state = h.ctx.workspace.state();
    assert_eq!(state.current_space, Space::Personal);
    assert!(!state.has_company_access());
    assert!(!state.has_organization_access());
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::warning("Failed to load workspace data")
    );
}

#[tokio::test]
async fn test_start_restores_saved_organization() {
    let store = MemoryStore::new();
    common::seed_session(&store);
    store.set(keys::PREFERRED_SPACE, "organization").unwrap();
    store.set(keys::PREFERRED_ORGANIZATION_ID, "o1").unwrap();
    let h = common::harness_with_store(store).await;
    common::mount_me(&h.server).await;
    common::mount_workspace(&h.server, None, json!([{ "id": "o1", "name": "Acme" }])).await;

    let _background = h.ctx.start().await;
    let state = h.ctx.workspace.state();
    assert_eq!(state.current_space, Space::Organization);
    assert_eq!(state.current_organization.as_ref().map(|o| o.id.as_str()), Some("o1"));
    assert_eq!(h.ctx.workspace.scope(), Some(Scope::Organization("o1".into())));
    assert_eq!(h.ctx.workspace.welcome_message(), "Welcome to Acme");
}

#[tokio::test]
async fn test_switch_persists_preference() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    common::mount_workspace(&h.server, Some("c1"), json!([])).await;
    h.ctx.workspace.load(h.ctx.session.user().as_ref()).await;

    let state = h.ctx.workspace.switch_space(Space::Company, None).await.unwrap();
    assert_eq!(state.scope(), Some(Scope::Company("c1".into())));
    assert_eq!(h.store.get(keys::PREFERRED_SPACE).unwrap().as_deref(), Some("company"));

    assert!(h
        .ctx
        .workspace
        .switch_space(Space::Organization, None)
        .await
        .is_err());
    assert_eq!(h.ctx.workspace.state().current_space, Space::Company);
}

#[tokio::test]
async fn test_follows_sign_in_and_sign_out() {
    let h = common::harness().await;
    common::mount_workspace(&h.server, Some("c1"), json!([])).await;

    let _background = h.ctx.start().await;
    assert!(!h.ctx.session.is_authenticated());
    assert_eq!(h.ctx.workspace.state().user_id, None);

    common::sign_in(&h).await;
    common::eventually(|| h.ctx.workspace.state().company_id.is_some()).await;
    assert_eq!(h.ctx.workspace.state().user_id.as_deref(), Some("u1"));

    h.ctx.session.sign_out().await;
    common::eventually(|| h.ctx.workspace.state().user_id.is_none()).await;
    assert!(!h.ctx.workspace.state().has_company_access());
}

#[tokio::test]
async fn test_wait_for_user_after_sign_in() {
    let h = common::harness().await;
    common::mount_workspace(&h.server, Some("c1"), json!([{ "id": "o1", "name": "Acme" }])).await;
    let _background = h.ctx.start().await;

    common::sign_in(&h).await;
    let state = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        h.ctx.workspace.wait_for_user(Some("u1")),
    )
    .await
    .unwrap();
    assert_eq!(state.company_id.as_deref(), Some("c1"));
    assert_eq!(state.available_organizations.len(), 1);

    h.ctx.session.sign_out().await;
    let state = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        h.ctx.workspace.wait_for_user(None),
    )
    .await
    .unwrap();
    assert!(!state.has_organization_access());
}
