//! Drives the REST router in-process.

#![allow(clippy::panic)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use tailtalk::api;
use tailtalk::app_state::AppState;
use tailtalk::domain::EventBus;
use tailtalk::persistence::{GroupRegistry, MemoryRemote, MemoryStore, RemoteEventStore};
use tailtalk::service::{DogService, ManualClock};

const NOW: i64 = 1_750_000_000_000;

struct Harness {
    app: Router,
    service: Arc<DogService>,
    remote: Arc<MemoryRemote>,
}

fn harness() -> Harness {
    let remote = Arc::new(MemoryRemote::new());
    let service = Arc::new(
        DogService::new(
            EventBus::new(64),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(NOW)),
        )
        .with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>)
        .with_registry(Arc::clone(&remote) as Arc<dyn GroupRegistry>),
    );
    let app = api::build_router().with_state(AppState::new(Arc::clone(&service)));
    Harness {
        app,
        service,
        remote,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("bad request");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("unreadable body");
    };
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn onboard(app: &Router) {
    let (status, _) = call(
        app,
        "PUT",
        "/api/v1/profile",
        Some(json!({ "name": "Barnaby", "breed": "Bernese Mountain Dog", "lifeStage": "adult" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_version_and_sync() {
    let h = harness();
    let (status, body) = call(&h.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn profile_is_missing_before_onboarding() {
    let h = harness();
    let (status, body) = call(&h.app, "GET", "/api/v1/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);

    onboard(&h.app).await;
    let (status, body) = call(&h.app, "GET", "/api/v1/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifeStage"], "adult");
}

#[tokio::test]
async fn unknown_life_stage_is_rejected() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "PUT",
        "/api/v1/profile",
        Some(json!({ "name": "Rex", "breed": "Mutt", "lifeStage": "teen" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
}

#[tokio::test]
async fn logging_food_fills_the_tummy() {
    let h = harness();
    onboard(&h.app).await;

    let (status, event) = call(
        &h.app,
        "POST",
        "/api/v1/events",
        Some(json!({ "type": "food", "rawText": "breakfast", "metadata": { "amount": "1 cup" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["type"], "food");
    assert_eq!(event["timestamp"], NOW);

    let (status, stats) = call(&h.app, "GET", "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["stats"]["tummy"], 100);

    let (_, list) = call(&h.app, "GET", "/api/v1/events?type=food", None).await;
    assert_eq!(list["total"], 1);
    let (_, list) = call(&h.app, "GET", "/api/v1/events?type=water", None).await;
    assert_eq!(list["total"], 0);

    h.service.flush_mirrors().await;
    assert_eq!(h.remote.stored_events().await.len(), 1);
}

#[tokio::test]
async fn invalid_filter_and_consistency_are_bad_requests() {
    let h = harness();
    let (status, _) = call(&h.app, "GET", "/api/v1/events?type=nap", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/v1/events",
        Some(json!({ "type": "poop", "metadata": { "consistency": 9 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let h = harness();
    let (_, event) = call(
        &h.app,
        "POST",
        "/api/v1/events",
        Some(json!({ "type": "pee" })),
    )
    .await;
    let Some(id) = event["id"].as_str() else {
        panic!("event has no id");
    };

    let (status, _) = call(&h.app, "DELETE", &format!("/api/v1/events/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&h.app, "DELETE", &format!("/api/v1/events/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = call(&h.app, "GET", "/api/v1/events", None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn break_without_body_resets_urgency() {
    let h = harness();
    let (status, stats) = call(&h.app, "POST", "/api/v1/stats/break", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["stats"]["urgency"], 0.0);
    assert_eq!(stats["stats"]["energy"], 20);
    assert_eq!(stats["level"], "calm");

    let (_, list) = call(&h.app, "GET", "/api/v1/events?type=walk", None).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["data"][0]["metadata"]["urgencyReset"], true);
}

#[tokio::test]
async fn pack_can_be_created_and_resolved() {
    let h = harness();
    let (status, _) = call(&h.app, "POST", "/api/v1/pack", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    onboard(&h.app).await;
    let (status, created) = call(&h.app, "POST", "/api/v1/pack", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let Some(code) = created["code"].as_str() else {
        panic!("no code");
    };
    assert_eq!(code.len(), 6);

    let (status, pack) = call(&h.app, "GET", &format!("/api/v1/pack/{code}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pack["profile"]["name"], "Barnaby");

    let (status, _) = call(&h.app, "GET", "/api/v1/pack/AAAAAA", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&h.app, "GET", "/api/v1/pack/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_refresh_keeps_the_local_log() {
    let h = harness();
    let _ = call(&h.app, "POST", "/api/v1/events", Some(json!({ "type": "water" }))).await;
    h.service.flush_mirrors().await;

    h.remote.set_failing(true);
    let (status, body) = call(&h.app, "POST", "/api/v1/sync/refresh", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], 3001);

    let (_, list) = call(&h.app, "GET", "/api/v1/events", None).await;
    assert_eq!(list["total"], 1);
    let (_, sync) = call(&h.app, "GET", "/api/v1/sync/status", None).await;
    assert_eq!(sync["status"], "error");
    assert_eq!(sync["remoteConfigured"], true);

    h.remote.set_failing(false);
    let (status, body) = call(&h.app, "POST", "/api/v1/sync/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["status"], "synced");
}

#[tokio::test]
async fn voice_without_service_asks_to_retry() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/v1/intake/voice",
        Some(json!({ "text": "he just peed" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], 4001);

    onboard(&h.app).await;
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/v1/intake/reply",
        Some(json!({ "description": "dinner" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().is_some_and(|r| r.contains("Barnaby")));
}

#[tokio::test]
async fn users_reject_duplicates() {
    let h = harness();
    let sam = json!({ "id": "u1", "name": "Sam", "role": "admin" });
    let (status, saved) = call(&h.app, "PUT", "/api/v1/users", Some(json!([sam.clone()]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved[0]["name"], "Sam");

    let (status, _) = call(&h.app, "PUT", "/api/v1/users", Some(json!([sam.clone(), sam]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
