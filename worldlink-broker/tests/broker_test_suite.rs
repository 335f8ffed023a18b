//! End-to-end scenarios (E1-E7) driving the broker through a real HTTP/WS
//! stack via `axum-test`, grounded in the teacher's `tests/setup.rs` harness
//! shape.

mod setup;

use std::time::Duration;

use serde_json::{json, Map, Value};
use setup::{error_envelope, reply_envelope, TestBroker, API_KEY, WORLD_ID, WORLD_TOKEN};
use worldlink_types::Envelope;

#[tokio::test]
async fn e1_happy_path() {
    let broker = TestBroker::start(1000).await;
    let mut world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;

    let respond = tokio::spawn(async move {
        let request: Envelope = world.receive_json().await;
        assert_eq!(request.kind, "entity");
        assert_eq!(request.client_id.as_deref(), Some(WORLD_ID));
        let request_id = request.request_id.expect("request carries a requestId");

        let mut payload = Map::new();
        payload.insert("data".to_owned(), json!({"name": "Gandalf"}));
        world.send_json(&reply_envelope(request_id, payload)).await;
    });

    let response = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=Actor.abc"))
        .add_header("x-api-key", API_KEY)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "Gandalf");

    respond.await.unwrap();
}

#[tokio::test]
async fn e2_world_offline() {
    let broker = TestBroker::start(1000).await;

    let response = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", API_KEY)
        .await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn e3_timeout() {
    let broker = TestBroker::start(1000).await;
    // connected but never replies
    let _world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;

    let started = std::time::Instant::now();
    let response = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", API_KEY)
        .await;

    response.assert_status(axum::http::StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(2), "timeout took too long to resolve");
}

#[tokio::test]
async fn e4_macro_denylist_rejects_before_dispatch() {
    // no world connection at all: if the handler dispatched anyway this
    // would fail with WorldOffline (404) instead of the expected 400.
    let broker = TestBroker::start(1000).await;

    let body = json!({
        "clientId": WORLD_ID,
        "entityType": "Macro",
        "data": {"command": "eval('2+2')"},
    });

    let response = broker
        .server
        .post("/entity/create")
        .add_header("x-api-key", API_KEY)
        .json(&body)
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let payload: Value = response.json();
    assert_eq!(payload["error"], "Script contains forbidden patterns");
    assert_eq!(
        payload["suggestion"],
        "Ensure the script does not access localStorage, sessionStorage, or eval()"
    );
}

#[tokio::test]
async fn missing_required_query_param_returns_json_400() {
    let broker = TestBroker::start(1000).await;

    let response = broker
        .server
        .get("/entity/get?uuid=Actor.abc")
        .add_header("x-api-key", API_KEY)
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "missing parameter: clientId");
}

#[tokio::test]
async fn e5_out_of_order_replies_are_delivered_to_the_right_caller() {
    let broker = TestBroker::start(1000).await;
    let mut world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;

    let respond = tokio::spawn(async move {
        let first: Envelope = world.receive_json().await;
        let second: Envelope = world.receive_json().await;
        let first_id = first.request_id.unwrap();
        let second_id = second.request_id.unwrap();

        let mut second_payload = Map::new();
        second_payload.insert("uuid".to_owned(), json!(second.payload.get("uuid").cloned().unwrap()));
        second_payload.insert("tag".to_owned(), json!("second"));
        world.send_json(&reply_envelope(second_id, second_payload)).await;

        let mut first_payload = Map::new();
        first_payload.insert("uuid".to_owned(), json!(first.payload.get("uuid").cloned().unwrap()));
        first_payload.insert("tag".to_owned(), json!("first"));
        world.send_json(&reply_envelope(first_id, first_payload)).await;
    });

    let (first_response, second_response) = tokio::join!(
        broker
            .server
            .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=Actor.one"))
            .add_header("x-api-key", API_KEY),
        broker
            .server
            .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=Actor.two"))
            .add_header("x-api-key", API_KEY),
    );

    first_response.assert_status_ok();
    second_response.assert_status_ok();
    let first_body: Value = first_response.json();
    let second_body: Value = second_response.json();
    assert_eq!(first_body["uuid"], "Actor.one");
    assert_eq!(first_body["tag"], "first");
    assert_eq!(second_body["uuid"], "Actor.two");
    assert_eq!(second_body["tag"], "second");

    respond.await.unwrap();
}

#[tokio::test]
async fn e6_supersession_fails_the_superseded_connections_in_flight_request() {
    let broker = TestBroker::start(1000).await;
    let mut first_world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;

    let request_fut = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", API_KEY);

    let supersede_fut = async {
        let request: Envelope = first_world.receive_json().await;
        assert!(request.request_id.is_some());
        // a second connection for the same world supersedes the first
        let _second_world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
    };

    let (response, ()) = tokio::join!(request_fut, supersede_fut);
    assert!(
        response.status_code() == axum::http::StatusCode::BAD_GATEWAY
            || response.status_code() == axum::http::StatusCode::GATEWAY_TIMEOUT
    );
}

#[tokio::test]
async fn quota_exceeded_returns_429() {
    let broker = TestBroker::start(1).await;

    let first = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", API_KEY)
        .await;
    // world offline, but quota was still consumed
    first.assert_status(axum::http::StatusCode::NOT_FOUND);

    let second = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", API_KEY)
        .await;
    second.assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unauthorized_without_a_valid_api_key() {
    let broker = TestBroker::start(1000).await;
    let response = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", "not-a-real-key")
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn world_reported_error_is_surfaced_as_422() {
    let broker = TestBroker::start(1000).await;
    let mut world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;

    let respond = tokio::spawn(async move {
        let request: Envelope = world.receive_json().await;
        let request_id = request.request_id.unwrap();
        world.send_json(&error_envelope(request_id, "no such actor")).await;
    });

    let response = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=Actor.missing"))
        .add_header("x-api-key", API_KEY)
        .await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"], "no such actor");

    respond.await.unwrap();
}

#[tokio::test]
async fn e7_inactivity_sweep_evicts_a_silent_session() {
    let broker = TestBroker::start(1000).await;
    let _world = broker.connect_world(WORLD_ID, WORLD_TOKEN).await;

    // idle_threshold=200ms, sweep interval=50ms in the test config
    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = broker
        .server
        .get(&format!("/entity/get?clientId={WORLD_ID}&uuid=X"))
        .add_header("x-api-key", API_KEY)
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}
