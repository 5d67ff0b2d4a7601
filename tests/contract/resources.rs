use promptdesk::api::ResourceKind;
use promptdesk::workspace::Scope;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, ACCESS_TOKEN};

#[tokio::test]
async fn test_list_bare_array_with_user_scope() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("GET"))
        .and(path("/prompts/templates/"))
        .and(query_param("user_id", "u1"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "t1", "title": "Weekly report" },
            { "id": "t2", "title": "Standup" }
        ])))
        .expect(1)
        .mount(&h.server)
        .await;

    let scope = Scope::User("u1".into());
    let list = h.ctx.api.list(ResourceKind::Templates, Some(&scope)).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.total(), 2);
    assert_eq!(list.data[0].title(), Some("Weekly report"));
}

#[tokio::test]
async fn test_list_wrapped_with_total() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("GET"))
        .and(path("/prompts/folders/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": 7, "name": "Drafts" }],
            "total": 12
        })))
        .mount(&h.server)
        .await;

    let list = h.ctx.api.list(ResourceKind::Folders, None).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list.total(), 12);
    assert_eq!(list.data[0].id_string(), "7");
}

#[tokio::test]
async fn test_create_tags_scope() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("POST"))
        .and(path("/prompts/blocks/"))
        .and(body_partial_json(json!({ "title": "Tone", "organization_id": "o1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": { "id": "b1", "title": "Tone", "organization_id": "o1" }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let scope = Scope::Organization("o1".into());
    let created = h
        .ctx
        .api
        .create(ResourceKind::Blocks, json!({ "title": "Tone" }), Some(&scope))
        .await
        .unwrap();
    assert_eq!(created.id_string(), "b1");
}

#[tokio::test]
async fn test_update_get_and_delete() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("PUT"))
        .and(path("/prompts/templates/t1"))
        .and(body_partial_json(json!({ "title": "Renamed" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "t1", "title": "Renamed" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/prompts/templates/t1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "t1", "title": "Renamed" })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/prompts/templates/t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let api = &h.ctx.api;
    let updated = api
        .update(ResourceKind::Templates, "t1", &json!({ "title": "Renamed" }))
        .await
        .unwrap();
    assert_eq!(updated.title(), Some("Renamed"));
    let fetched = api.get(ResourceKind::Templates, "t1").await.unwrap();
    assert_eq!(fetched, updated);
    api.delete(ResourceKind::Templates, "t1").await.unwrap();
}

#[tokio::test]
async fn test_search_passes_query_and_scope() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("GET"))
        .and(path("/prompts/search/"))
        .and(query_param("q", "weekly report"))
        .and(query_param("company_id", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&h.server)
        .await;

    let scope = Scope::Company("c1".into());
    let list = h.ctx.api.search("weekly report", Some(&scope)).await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_backend_error_detail() {
    let h = common::harness().await;
    common::sign_in(&h).await;
    Mock::given(method("GET"))
        .and(path("/prompts/templates/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Template not found" })))
        .mount(&h.server)
        .await;

    let err = h.ctx.api.get(ResourceKind::Templates, "missing").await.unwrap_err();
    assert!(matches!(
        err,
        promptdesk::error::Error::Api { status: 404, ref message } if message == "Template not found"
    ));
}
