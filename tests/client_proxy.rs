//! Client association proxy served in-process by the controller

mod common;

use serde_json::json;
use std::sync::Arc;
use trellis::client::{ApiClient, LocalTransport, Loaded};
use trellis::error::FetchError;
use trellis::graph::{AssociationDescriptor, RemoteDescriptor, ResourceGraph, ScopeDescriptor};
use trellis::query::Store;
use trellis::server::Controller;

/// Client graph: the server's graph plus declarations this deployment does
/// not serve
fn client_graph() -> ResourceGraph {
    ResourceGraph::sample()
        .unwrap()
        .to_builder()
        .update("post", |post| {
            post.scope(ScopeDescriptor::flag("liked", "liked", true))
                .association(AssociationDescriptor::has_many("spammers", "user").associated())
                .remote(RemoteDescriptor::member("top_spammers", "user"))
        })
        .build()
        .unwrap()
}

fn client() -> ApiClient<LocalTransport> {
    client_with(common::controller())
}

fn client_with(controller: Controller) -> ApiClient<LocalTransport> {
    ApiClient::new(client_graph(), LocalTransport::new(Arc::new(controller)))
}

fn insert(controller: &Controller, model: &str, row: serde_json::Value) {
    let record = row.as_object().cloned().unwrap();
    controller.store().insert(model, "id", record).unwrap();
}

#[tokio::test]
async fn test_belongs_to_fetches_once() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();
    let before = client.transport().request_count();

    let author = post.association("author").await.unwrap();
    assert_eq!(client.transport().request_count(), before + 1);
    assert_eq!(author.one().unwrap().get("name"), Some(&json!("Ada")));

    let again = post.association("author").await.unwrap();
    assert_eq!(client.transport().request_count(), before + 1);
    assert!(Arc::ptr_eq(author.one().unwrap(), again.one().unwrap()));

    assert_eq!(client.transport().requests().last().unwrap(), "GET /users/1");
}

#[tokio::test]
async fn test_reload_fetches_again() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    post.association("comments").await.unwrap();
    let before = client.transport().request_count();
    let reloaded = post.reload("comments").await.unwrap();

    assert_eq!(client.transport().request_count(), before + 1);
    assert_eq!(reloaded.len(), 3);
}

#[tokio::test]
async fn test_undeclared_server_filter_is_bad_request() {
    let client = client();
    let err = client
        .resource("post")
        .unwrap()
        .filter("liked", true)
        .all()
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::BadRequest(_)), "{err:?}");
}

#[tokio::test]
async fn test_filter_undeclared_on_client_never_sent() {
    let client = client();
    let err = client
        .resource("post")
        .unwrap()
        .filter("popular", true)
        .all()
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Undeclared { .. }));
    assert_eq!(client.transport().request_count(), 0);
}

#[tokio::test]
async fn test_scoped_collection() {
    let client = client();
    let posts = client
        .resource("post")
        .unwrap()
        .scope("published")
        .order("likes desc")
        .all()
        .await
        .unwrap();

    let titles: Vec<_> = posts.records.iter().map(|p| p.get("title").unwrap().clone()).collect();
    assert_eq!(titles, vec![json!("Archive"), json!("Hello")]);
    assert_eq!(posts.total, 2);
}

#[tokio::test]
async fn test_association_missing_on_server_is_not_found() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    let spammers = post.association("spammers").await.unwrap_err();
    assert!(spammers.is_not_found(), "{spammers:?}");

    let top_spammers = post.remote("top_spammers").await.unwrap_err();
    assert!(top_spammers.is_not_found(), "{top_spammers:?}");

    assert!(!post.is_loaded("spammers").await);
}

#[tokio::test]
async fn test_undeclared_accessor_is_typed_error() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    let err = post.association("followers").await.unwrap_err();
    assert!(matches!(err, FetchError::Undeclared { .. }));
}

#[tokio::test]
async fn test_has_many_and_through() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    let comments = post.association("comments").await.unwrap();
    assert_eq!(comments.len(), 3);

    let commenters = post.association("commenters").await.unwrap();
    let names: Vec<_> = commenters.many().iter().map(|u| u.get("name").unwrap().clone()).collect();
    assert_eq!(names, vec![json!("Grace"), json!("Linus")]);
}

#[tokio::test]
async fn test_has_one_through_reuses_hop_cache() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    let company = post.association("company").await.unwrap();
    assert_eq!(company.one().unwrap().get("name"), Some(&json!("Acme")));
    assert!(post.is_loaded("blog").await);

    let before = client.transport().request_count();
    post.association("blog").await.unwrap();
    assert_eq!(client.transport().request_count(), before);
}

#[tokio::test]
async fn test_has_many_without_nested_route_uses_foreign_key_scope() {
    let client = client();
    let blog = client.resource("blog").unwrap().find(1).await.unwrap();

    let company = blog.association("company").await.unwrap();
    let blogs = company.one().unwrap().association("blogs").await;
    // `blog` declares a `company_id` scope, so the filtered collection resolves
    assert_eq!(blogs.unwrap().len(), 1);
    assert!(client
        .transport()
        .requests()
        .iter()
        .any(|r| r == "GET /blogs"));
}

#[tokio::test]
async fn test_member_remote() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    let top = post.remote("top_comments").await.unwrap();
    let bodies: Vec<_> = top.many().iter().map(|c| c.get("body").unwrap().clone()).collect();
    assert_eq!(bodies, vec![json!("second"), json!("first")]);
}

#[tokio::test]
async fn test_collection_remote() {
    let client = client();
    let odd = client.resource("suite").unwrap().remote("odd_suites").await.unwrap();
    assert_eq!(odd.len(), 2);
}

#[tokio::test]
async fn test_eager_load_batch_reports_each_result() {
    let client = client();
    let post = client.resource("post").unwrap().find(1).await.unwrap();

    let results = post.load(&["author", "comments", "spammers"]).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].as_ref().unwrap_err().is_not_found());

    assert!(post.is_loaded("author").await);
    assert!(post.is_loaded("comments").await);
    assert!(!post.is_loaded("spammers").await);
}

#[tokio::test]
async fn test_included_associations_hydrate_cache() {
    let client = client();
    let post = client
        .resource("post")
        .unwrap()
        .include("author")
        .find(1)
        .await
        .unwrap();

    assert!(post.is_loaded("author").await);
    assert!(post.get("author").is_none());

    let before = client.transport().request_count();
    let author = post.association("author").await.unwrap();
    assert_eq!(client.transport().request_count(), before);
    assert_eq!(author.one().unwrap().get("name"), Some(&json!("Ada")));
}

#[tokio::test]
async fn test_create_update_destroy() {
    let client = client();
    let suites = client.resource("suite").unwrap();

    let created = suites.create(json!({"name": "x", "switch": true})).await.unwrap();
    assert_eq!(created.get("name"), Some(&json!("x")));
    assert_eq!(created.id(), Some(&json!(4)));

    let updated = created.update(json!({"name": "y"})).await.unwrap();
    assert_eq!(updated.get("name"), Some(&json!("y")));
    assert_eq!(updated.get("switch"), Some(&json!(true)));

    updated.destroy().await.unwrap();
    let err = suites.find(4).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_validation_is_unprocessable() {
    let client = client();
    let err = client
        .resource("post")
        .unwrap()
        .create(json!({"body": "no title"}))
        .await
        .unwrap_err();

    match err {
        FetchError::Unprocessable(fields) => {
            assert_eq!(fields["title"], vec!["can't be blank".to_string()]);
        },
        other => panic!("expected Unprocessable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_singular_association_is_none() {
    let client = client();
    let post = client.resource("post").unwrap().create(json!({"title": "orphan"})).await.unwrap();

    match post.association("author").await.unwrap() {
        Loaded::One(None) => {},
        other => panic!("expected an empty association, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nested_association_larger_than_a_page_is_complete() {
    let controller = common::controller();
    for i in 0..30 {
        insert(&controller, "comment", json!({"body": format!("c{i}"), "post_id": 3, "commenter_id": 1}));
    }
    let client = client_with(controller);

    let post = client.resource("post").unwrap().find(3).await.unwrap();
    let comments = post.association("comments").await.unwrap();
    assert_eq!(comments.len(), 30);

    let included = client
        .resource("post")
        .unwrap()
        .include("comments")
        .find(3)
        .await
        .unwrap();
    assert_eq!(included.association("comments").await.unwrap().len(), comments.len());
}

#[tokio::test]
async fn test_foreign_key_association_larger_than_a_page_is_complete() {
    let controller = common::controller();
    for i in 0..30 {
        insert(&controller, "blog", json!({"name": format!("b{i}"), "company_id": 1}));
    }
    let client = client_with(controller);

    let company = client.resource("company").unwrap().find(1).await.unwrap();
    let blogs = company.association("blogs").await.unwrap();
    assert_eq!(blogs.len(), 31);

    let mut ids: Vec<_> = blogs.many().iter().map(|b| b.id().unwrap().as_u64().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 31);
}

#[tokio::test]
async fn test_plain_attribute_named_like_association_is_not_cached() {
    let controller = common::controller();
    insert(
        &controller,
        "post",
        json!({"title": "Shadowed", "blog_id": 1, "author_id": 1, "blog": null}),
    );
    let client = client_with(controller);

    let post = client.resource("post").unwrap().find(4).await.unwrap();
    assert_eq!(post.get("blog"), Some(&json!(null)));
    assert!(!post.is_loaded("blog").await);

    let blog = post.association("blog").await.unwrap();
    assert_eq!(blog.one().unwrap().get("name"), Some(&json!("Engineering")));
}
