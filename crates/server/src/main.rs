use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use server_api::{
    create_document, delete_document, list_documents, parse_collection, snapshot, update_document,
    ApiContext,
};
use shared::{
    domain::{CollectionName, Document, DocumentId},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateDocumentRequest, CreateDocumentResponse, ServerEvent, UpdateDocumentRequest,
    },
};
use storage::Storage;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let (changes, _) = broadcast::channel(settings.snapshot_buffer);

    let state = AppState {
        api: ApiContext { storage },
        changes,
    };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "document store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/collections/:collection/documents",
            get(http_list_documents).post(http_create_document),
        )
        .route(
            "/collections/:collection/documents/:id",
            patch(http_update_document).delete(http_delete_document),
        )
        .route("/collections/:collection/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| error_response(ApiError::internal(e.to_string())))?;
    Ok("ok")
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

fn collection_from_path(raw: &str) -> ApiResult<CollectionName> {
    parse_collection(raw).map_err(error_response)
}

fn publish(state: &AppState, collection: &CollectionName) {
    // No receivers simply means nobody is subscribed right now.
    let receivers = state.changes.send(collection.clone()).unwrap_or(0);
    debug!(%collection, receivers, "published change");
}

async fn http_list_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> ApiResult<Json<Vec<Document>>> {
    let collection = collection_from_path(&collection)?;
    let documents = list_documents(&state.api, &collection)
        .await
        .map_err(error_response)?;
    Ok(Json(documents))
}

async fn http_create_document(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<CreateDocumentResponse>)> {
    let collection = collection_from_path(&collection)?;
    let id = create_document(&state.api, &collection, &req.fields)
        .await
        .map_err(error_response)?;
    publish(&state, &collection);
    Ok((StatusCode::CREATED, Json(CreateDocumentResponse { id })))
}

async fn http_update_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Json(req): Json<UpdateDocumentRequest>,
) -> ApiResult<StatusCode> {
    let collection = collection_from_path(&collection)?;
    update_document(&state.api, &collection, &DocumentId(id), &req.fields)
        .await
        .map_err(error_response)?;
    publish(&state, &collection);
    Ok(StatusCode::NO_CONTENT)
}

async fn http_delete_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let collection = collection_from_path(&collection)?;
    delete_document(&state.api, &collection, &DocumentId(id))
        .await
        .map_err(error_response)?;
    publish(&state, &collection);
    Ok(StatusCode::NO_CONTENT)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let collection = collection_from_path(&collection)?;
    Ok(ws.on_upgrade(move |socket| ws_connection(state, socket, collection)))
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> bool {
    use futures::SinkExt;

    let text = match serde_json::to_string(event) {
        Ok(v) => v,
        Err(error) => {
            warn!(%error, "failed to encode server event");
            return true;
        }
    };
    sender.send(Message::Text(text)).await.is_ok()
}

/// Streams full snapshots of `collection`: one on connect, then one per change.
///
/// Each snapshot is listed after the change notice arrives, so the last frame
/// a subscriber sees always reflects every mutation published before it.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket, collection: CollectionName) {
    use futures::StreamExt;

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the initial listing so no change can fall in between.
    let mut changes_rx = state.changes.subscribe();
    info!(%collection, "subscriber connected");

    let initial = snapshot(&state.api, &collection)
        .await
        .unwrap_or_else(ServerEvent::Error);
    if !send_event(&mut sender, &initial).await {
        return;
    }

    let task_state = Arc::clone(&state);
    let task_collection = collection.clone();
    let send_task = tokio::spawn(async move {
        loop {
            match changes_rx.recv().await {
                Ok(changed) if changed == task_collection => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(collection = %task_collection, skipped, "subscriber lagged; resending snapshot");
                }
                Err(RecvError::Closed) => break,
            }
            let event = snapshot(&task_state.api, &task_collection)
                .await
                .unwrap_or_else(ServerEvent::Error);
            if !send_event(&mut sender, &event).await {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    send_task.abort();
    info!(%collection, "subscriber disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
