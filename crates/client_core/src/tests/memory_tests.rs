use std::time::Duration;

use super::*;
use crate::{
    config::ClientSettings,
    notify::Notifier,
    records::AlbumDraft,
    screen::AlbumsScreen,
};
use serde_json::json;

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().expect("object")
}

async fn next_snapshot(stream: &mut SnapshotStream) -> Vec<Document> {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("snapshot timed out")
        .expect("stream ended")
        .expect("snapshot")
}

fn names(documents: &[Document]) -> Vec<&str> {
    documents
        .iter()
        .filter_map(|doc| doc.str_field("name"))
        .collect()
}

#[tokio::test]
async fn subscription_starts_with_current_contents_then_follows_changes() {
    let store = InMemoryDocumentStore::new();
    store
        .create(&CollectionName::ALBUMS, fields(json!({ "name": "Vacation" })))
        .await
        .expect("create");

    let mut stream = store
        .subscribe(&CollectionName::ALBUMS)
        .await
        .expect("subscribe");
    assert_eq!(names(&next_snapshot(&mut stream).await), vec!["Vacation"]);

    let id = store
        .create(&CollectionName::ALBUMS, fields(json!({ "name": "Birthday" })))
        .await
        .expect("create");
    assert_eq!(
        names(&next_snapshot(&mut stream).await),
        vec!["Vacation", "Birthday"]
    );

    store
        .delete(&CollectionName::ALBUMS, &id)
        .await
        .expect("delete");
    assert_eq!(names(&next_snapshot(&mut stream).await), vec!["Vacation"]);
}

#[tokio::test]
async fn update_merges_fields_and_rejects_unknown_ids() {
    let store = InMemoryDocumentStore::new();
    let users = CollectionName::USERS;
    let id = store
        .create(
            &users,
            fields(json!({ "name": "Ann", "email": "ann@x.com", "password": "secret1" })),
        )
        .await
        .expect("create");

    store
        .update(&users, &id, fields(json!({ "name": "Bob" })))
        .await
        .expect("update");
    let documents = store.documents(&users).await;
    assert_eq!(documents[0].str_field("name"), Some("Bob"));
    assert_eq!(documents[0].str_field("email"), Some("ann@x.com"));

    let err = store
        .update(&users, &DocumentId::from("missing"), fields(json!({ "name": "X" })))
        .await
        .expect_err("missing");
    assert!(matches!(
        err,
        StoreError::Rejected {
            code: ErrorCode::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn deleting_an_unknown_id_succeeds() {
    let store = InMemoryDocumentStore::new();
    store
        .delete(&CollectionName::ALBUMS, &DocumentId::from("missing"))
        .await
        .expect("delete");
}

#[tokio::test]
async fn changes_to_other_collections_are_not_pushed() {
    let store = InMemoryDocumentStore::new();
    let mut stream = store
        .subscribe(&CollectionName::ALBUMS)
        .await
        .expect("subscribe");
    assert!(next_snapshot(&mut stream).await.is_empty());

    store
        .create(&CollectionName::USERS, fields(json!({ "name": "Ann" })))
        .await
        .expect("create");
    assert!(
        tokio::time::timeout(Duration::from_millis(50), stream.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn albums_screen_round_trip_over_memory_store() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let mut screen = AlbumsScreen::open(store.clone(), Notifier::default(), &ClientSettings::default());

    screen.begin_create();
    if let Some(draft) = screen.draft_mut() {
        *draft = AlbumDraft {
            name: "Vacation".into(),
        };
    }
    let id = screen
        .submit()
        .expect("submitted")
        .outcome()
        .await
        .expect("created")
        .expect("id");

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        screen
            .live()
            .wait_for(|s| s.records.iter().any(|album| album.id == id)),
    )
    .await
    .expect("listed")
    .expect("live");
    assert_eq!(state.records.len(), 1);
    assert_eq!(state.records[0].name, "Vacation");
    assert!(state.records[0].created_at.is_some());
}
