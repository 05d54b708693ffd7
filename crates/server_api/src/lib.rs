use shared::{
    domain::{CollectionName, Document, DocumentId, Fields},
    error::ApiError,
    protocol::ServerEvent,
};
use storage::Storage;
use tracing::info;

const MAX_FIELDS_PER_DOCUMENT: usize = 128;
const MAX_FIELD_NAME_BYTES: usize = 256;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub fn parse_collection(raw: &str) -> Result<CollectionName, ApiError> {
    CollectionName::parse(raw).map_err(|e| ApiError::validation(e.to_string()))
}

pub async fn list_documents(
    ctx: &ApiContext,
    collection: &CollectionName,
) -> Result<Vec<Document>, ApiError> {
    let stored = ctx
        .storage
        .list_documents(collection)
        .await
        .map_err(internal)?;
    Ok(stored.into_iter().map(|s| s.document).collect())
}

/// Full current contents of `collection`, as pushed to subscribers.
pub async fn snapshot(ctx: &ApiContext, collection: &CollectionName) -> Result<ServerEvent, ApiError> {
    Ok(ServerEvent::Snapshot {
        collection: collection.clone(),
        documents: list_documents(ctx, collection).await?,
    })
}

/// Stores a new document. Subscribers learn about it through a fresh
/// [`snapshot`] taken after the change is published.
pub async fn create_document(
    ctx: &ApiContext,
    collection: &CollectionName,
    fields: &Fields,
) -> Result<DocumentId, ApiError> {
    validate_fields(fields)?;
    let id = ctx
        .storage
        .create_document(collection, fields)
        .await
        .map_err(internal)?;
    info!(%collection, document_id = %id, "document created");
    Ok(id)
}

pub async fn update_document(
    ctx: &ApiContext,
    collection: &CollectionName,
    id: &DocumentId,
    fields: &Fields,
) -> Result<(), ApiError> {
    validate_fields(fields)?;
    let updated = ctx
        .storage
        .update_document(collection, id, fields)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::not_found(format!(
            "no document '{id}' in collection '{collection}'"
        )));
    }
    info!(%collection, document_id = %id, "document updated");
    Ok(())
}

/// Deleting an id that is not stored succeeds without changing anything.
pub async fn delete_document(
    ctx: &ApiContext,
    collection: &CollectionName,
    id: &DocumentId,
) -> Result<(), ApiError> {
    let removed = ctx
        .storage
        .delete_document(collection, id)
        .await
        .map_err(internal)?;
    info!(%collection, document_id = %id, removed, "document deleted");
    Ok(())
}

fn validate_fields(fields: &Fields) -> Result<(), ApiError> {
    if fields.len() > MAX_FIELDS_PER_DOCUMENT {
        return Err(ApiError::validation(format!(
            "documents may hold at most {MAX_FIELDS_PER_DOCUMENT} fields"
        )));
    }
    for name in fields.keys() {
        if name.trim().is_empty() {
            return Err(ApiError::validation("field names must not be blank"));
        }
        if name.len() > MAX_FIELD_NAME_BYTES {
            return Err(ApiError::validation(format!(
                "field name exceeds {MAX_FIELD_NAME_BYTES} bytes"
            )));
        }
    }
    Ok(())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::error::ErrorCode;

    async fn setup() -> ApiContext {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        ApiContext { storage }
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().expect("object")
    }

    fn snapshot_ids(event: &ServerEvent) -> Vec<DocumentId> {
        match event {
            ServerEvent::Snapshot { documents, .. } => {
                documents.iter().map(|d| d.id.clone()).collect()
            }
            ServerEvent::Error(err) => panic!("unexpected error event: {err:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_lists_documents_in_insertion_order() {
        let ctx = setup().await;
        let first = create_document(&ctx, &CollectionName::ALBUMS, &fields(json!({ "name": "Vacation" })))
            .await
            .expect("create");
        let second = create_document(&ctx, &CollectionName::ALBUMS, &fields(json!({ "name": "Birthday" })))
            .await
            .expect("create");

        let event = snapshot(&ctx, &CollectionName::ALBUMS).await.expect("snapshot");
        assert_eq!(snapshot_ids(&event), vec![first, second]);
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let ctx = setup().await;
        let err = update_document(
            &ctx,
            &CollectionName::USERS,
            &DocumentId::from("u404"),
            &fields(json!({ "name": "Bob" })),
        )
        .await
        .expect_err("should fail");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_of_missing_document_succeeds() {
        let ctx = setup().await;
        delete_document(&ctx, &CollectionName::USERS, &DocumentId::from("gone"))
            .await
            .expect("delete");
        let event = snapshot(&ctx, &CollectionName::USERS).await.expect("snapshot");
        assert!(snapshot_ids(&event).is_empty());
    }

    #[tokio::test]
    async fn blank_field_names_are_rejected() {
        let ctx = setup().await;
        let err = create_document(&ctx, &CollectionName::ALBUMS, &fields(json!({ " ": 1 })))
            .await
            .expect_err("should fail");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn parse_collection_maps_to_validation_error() {
        let err = parse_collection("no spaces").expect_err("invalid");
        assert_eq!(err.code, ErrorCode::Validation);
    }
}
