use std::time::Duration;

use super::*;
use axum::{body, body::Body, http::Request};
use futures::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tower::ServiceExt;

async fn test_state() -> Arc<AppState> {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let (changes, _) = broadcast::channel(32);
    Arc::new(AppState {
        api: ApiContext { storage },
        changes,
    })
}

async fn test_app() -> (Router, Arc<AppState>) {
    let state = test_state().await;
    (build_router(Arc::clone(&state), 64 * 1024), state)
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn snapshot_documents(msg: WsMessage) -> Vec<Document> {
    let WsMessage::Text(text) = msg else {
        panic!("expected text frame");
    };
    match serde_json::from_str::<ServerEvent>(&text).expect("event") {
        ServerEvent::Snapshot { documents, .. } => documents,
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn create_update_delete_round_trip_through_routes() {
    let (app, _) = test_app().await;

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/collections/albums/documents",
            serde_json::json!({ "fields": { "name": "Vacation" } }),
        ))
        .await
        .expect("create");
    assert_eq!(created.status(), StatusCode::CREATED);
    let CreateDocumentResponse { id } = read_json(created).await;

    let updated = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/collections/albums/documents/{id}"),
            serde_json::json!({ "fields": { "name": "Holiday" } }),
        ))
        .await
        .expect("update");
    assert_eq!(updated.status(), StatusCode::NO_CONTENT);

    let listed = app
        .clone()
        .oneshot(
            Request::get("/collections/albums/documents")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("list");
    assert_eq!(listed.status(), StatusCode::OK);
    let documents: Vec<Document> = read_json(listed).await;
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].str_field("name"), Some("Holiday"));

    let deleted = app
        .clone()
        .oneshot(
            Request::delete(format!("/collections/albums/documents/{id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("delete");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn updating_missing_document_is_not_found() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(json_request(
            "PATCH",
            "/collections/users/documents/u404",
            serde_json::json!({ "fields": { "name": "Bob" } }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn invalid_collection_name_is_rejected() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(
            Request::get("/collections/bad.name/documents")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mutations_publish_their_collection() {
    let (app, state) = test_app().await;
    let mut changes = state.changes.subscribe();

    let response = app
        .oneshot(json_request(
            "POST",
            "/collections/users/documents",
            serde_json::json!({ "fields": { "name": "Ann", "email": "ann@x.com" } }),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    assert_eq!(changes.recv().await.expect("change"), CollectionName::USERS);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let state = test_state().await;
    let app = build_router(state, 64);
    let payload = serde_json::json!({ "fields": { "name": "x".repeat(512) } }).to_string();
    let request = Request::post("/collections/albums/documents")
        .header("content-type", "application/json")
        .header("content-length", payload.len())
        .body(Body::from(payload))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn websocket_sends_initial_snapshot_then_changes() {
    let state = test_state().await;
    let addr = serve(build_router(Arc::clone(&state), 64 * 1024)).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/collections/albums/ws"))
        .await
        .expect("connect");

    let initial = ws.next().await.expect("frame").expect("message");
    assert!(snapshot_documents(initial).is_empty());

    let mut fields = shared::domain::Fields::new();
    fields.insert("name".into(), serde_json::json!("Vacation"));
    create_document(&state.api, &CollectionName::ALBUMS, &fields)
        .await
        .expect("create");
    publish(&state, &CollectionName::ALBUMS);

    let pushed = ws.next().await.expect("frame").expect("message");
    let documents = snapshot_documents(pushed);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].str_field("name"), Some("Vacation"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_pushed_snapshot_matches_storage_after_concurrent_creates() {
    let state = test_state().await;
    let app = build_router(Arc::clone(&state), 64 * 1024);
    let addr = serve(app.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/collections/albums/ws"))
        .await
        .expect("connect");
    let initial = ws.next().await.expect("frame").expect("message");
    assert!(snapshot_documents(initial).is_empty());

    let creates = (0..20).map(|n| {
        let app = app.clone();
        tokio::spawn(async move {
            app.oneshot(json_request(
                "POST",
                "/collections/albums/documents",
                serde_json::json!({ "fields": { "name": format!("Album {n}") } }),
            ))
            .await
            .expect("create")
            .status()
        })
    });
    for status in futures::future::join_all(creates).await {
        assert_eq!(status.expect("join"), StatusCode::CREATED);
    }

    let mut last = Vec::new();
    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(500), ws.next()).await {
        last = snapshot_documents(frame.expect("message"));
    }

    let stored = list_documents(&state.api, &CollectionName::ALBUMS)
        .await
        .expect("list");
    assert_eq!(stored.len(), 20);
    assert_eq!(last, stored);
}
