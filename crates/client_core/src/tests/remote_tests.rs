use super::*;
use axum::{
    extract::{ws::Message as AxumMessage, Path, WebSocketUpgrade},
    http::StatusCode as AxumStatus,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use shared::domain::Document;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/")
}

async fn create_handler(
    Path(collection): Path<String>,
    Json(body): Json<CreateDocumentRequest>,
) -> impl IntoResponse {
    let name = body
        .fields
        .get("name")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();
    (
        AxumStatus::CREATED,
        Json(json!({ "id": format!("{collection}-{name}") })),
    )
}

async fn update_handler(Path((_, id)): Path<(String, String)>) -> impl IntoResponse {
    (
        AxumStatus::NOT_FOUND,
        Json(ApiError::not_found(format!("document {id} not found"))),
    )
}

async fn delete_handler() -> impl IntoResponse {
    (AxumStatus::BAD_GATEWAY, "upstream down")
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket| async move {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("Vacation"));
        let event = ServerEvent::Snapshot {
            collection: CollectionName::ALBUMS,
            documents: vec![Document::new("a1", fields)],
        };
        let text = serde_json::to_string(&event).expect("event");
        let _ = socket.send(AxumMessage::Text(text)).await;
        let _ = socket.send(AxumMessage::Close(None)).await;
    })
}

fn test_router() -> Router {
    Router::new()
        .route("/collections/:collection/documents", post(create_handler))
        .route(
            "/collections/:collection/documents/:id",
            patch(update_handler).delete(delete_handler),
        )
        .route("/collections/:collection/ws", get(ws_handler))
}

#[test]
fn rejects_non_http_server_urls() {
    assert!(RemoteDocumentStore::new("ftp://example.com").is_err());
    assert!(RemoteDocumentStore::new("not a url").is_err());
    let store = RemoteDocumentStore::new("http://localhost:8443/").expect("store");
    assert_eq!(store.server_url(), "http://localhost:8443");
}

#[test]
fn document_ids_are_escaped_in_paths() {
    let store = RemoteDocumentStore::new("http://localhost:8443").expect("store");
    assert_eq!(
        store.document_url(&CollectionName::USERS, &DocumentId::from("a b/c")),
        "http://localhost:8443/collections/users/documents/a%20b%2Fc"
    );
}

#[tokio::test]
async fn maps_service_responses_to_store_results() {
    let base = serve(test_router()).await;
    let store = RemoteDocumentStore::new(&base).expect("store");

    let mut fields = Fields::new();
    fields.insert("name".into(), json!("Vacation"));
    let id = store
        .create(&CollectionName::ALBUMS, fields.clone())
        .await
        .expect("create");
    assert_eq!(id, DocumentId::from("albums-Vacation"));

    let err = store
        .update(&CollectionName::ALBUMS, &DocumentId::from("u9"), fields)
        .await
        .expect_err("not found");
    assert_eq!(
        err,
        StoreError::rejected(ErrorCode::NotFound, "document u9 not found")
    );

    let err = store
        .delete(&CollectionName::ALBUMS, &DocumentId::from("a1"))
        .await
        .expect_err("bad gateway");
    assert!(matches!(
        err,
        StoreError::Rejected {
            code: ErrorCode::Internal,
            ..
        }
    ));
}

#[tokio::test]
async fn subscription_yields_snapshots_then_reports_closure() {
    let base = serve(test_router()).await;
    let store = RemoteDocumentStore::new(&base).expect("store");

    let mut stream = store
        .subscribe(&CollectionName::ALBUMS)
        .await
        .expect("subscribe");
    let documents = stream.next().await.expect("item").expect("snapshot");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].str_field("name"), Some("Vacation"));

    assert!(matches!(stream.next().await, Some(Err(_))));
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let store = RemoteDocumentStore::new(&format!("http://{addr}")).expect("store");
    assert!(matches!(
        store.delete(&CollectionName::USERS, &DocumentId::from("u1")).await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(matches!(
        store.subscribe(&CollectionName::USERS).await,
        Err(StoreError::Unavailable(_))
    ));
}
