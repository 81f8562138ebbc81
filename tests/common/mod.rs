//! Shared fixtures: the sample blog graph served from a seeded in-memory store

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use trellis::error::ApiError;
use trellis::graph::ResourceGraph;
use trellis::query::{MemoryStore, Predicate, Query, Record, Store};
use trellis::server::{Controller, ControllerConfig, RemoteContext};

pub const MODELS: [&str; 7] = ["user", "company", "blog", "post", "comment", "suite", "case"];

fn seed(store: &MemoryStore, model: &str, primary_key: &str, rows: Value) {
    let Value::Array(rows) = rows else {
        panic!("seed rows must be an array");
    };
    for row in rows {
        let Value::Object(record) = row else {
            panic!("seed row must be an object");
        };
        store.insert(model, primary_key, record).unwrap();
    }
}

/// Ids are assigned in insertion order starting at 1
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new().with_models(MODELS);

    seed(
        &store,
        "user",
        "id",
        json!([{"name": "Ada"}, {"name": "Grace"}, {"name": "Linus"}]),
    );
    seed(&store, "company", "id", json!([{"name": "Acme"}]));
    seed(&store, "blog", "id", json!([{"name": "Engineering", "company_id": 1}]));
    seed(
        &store,
        "post",
        "id",
        json!([
            {"title": "Hello", "published": true, "recent": true, "blog_id": 1, "author_id": 1, "likes": 5},
            {"title": "Draft", "published": false, "recent": true, "blog_id": 1, "author_id": 2, "likes": 1},
            {"title": "Archive", "published": true, "recent": false, "blog_id": 1, "author_id": 1, "likes": 9},
        ]),
    );
    seed(
        &store,
        "comment",
        "id",
        json!([
            {"body": "first", "post_id": 1, "commenter_id": 2, "likes": 3},
            {"body": "second", "post_id": 1, "commenter_id": 3, "likes": 7},
            {"body": "third", "post_id": 1, "commenter_id": 2, "likes": 1},
            {"body": "elsewhere", "post_id": 2, "commenter_id": 1, "likes": 0},
        ]),
    );
    seed(&store, "suite", "id", json!([{"name": "smoke"}, {"name": "nightly"}, {"name": "weekly"}]));

    store
}

/// Two most liked comments of the owning post
pub fn top_comments(ctx: &RemoteContext<'_>) -> Result<Vec<Record>, ApiError> {
    let Some(owner) = ctx.owner else {
        return Ok(Vec::new());
    };
    let post_id = owner.get("id").cloned().unwrap_or(Value::Null);
    let query = Query::new(ctx.target.model_name())
        .apply(Predicate::eq("post_id", post_id))
        .order_by(trellis::query::Order::desc("likes"))
        .limit(2);
    Ok(ctx.store.execute(&query)?)
}

/// Suites with an odd key
pub fn odd_suites(ctx: &RemoteContext<'_>) -> Result<Vec<Record>, ApiError> {
    let suites = ctx.store.execute(&Query::new(ctx.target.model_name()))?;
    Ok(suites
        .into_iter()
        .filter(|s| s.get("id").and_then(Value::as_i64).is_some_and(|id| id % 2 == 1))
        .collect())
}

pub fn controller_for(graph: ResourceGraph) -> Controller {
    Controller::new(graph, Arc::new(seeded_store()), ControllerConfig::default())
        .unwrap()
        .bind_remote("post", "top_comments", top_comments)
        .bind_remote("suite", "odd_suites", odd_suites)
}

pub fn controller() -> Controller {
    controller_for(ResourceGraph::sample().unwrap())
}
