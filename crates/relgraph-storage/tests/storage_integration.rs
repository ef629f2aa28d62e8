//! Storage Integration Tests.
//!
//! These tests drive `MemoryDataStore` only through the `DataStore` trait,
//! the way the server crate uses it.

use std::sync::Arc;

use relgraph_storage::{
    DataStore, MemoryDataStore, StorageError, StoredAuthorizationModel, StoredTuple, TupleFilter,
};

fn tuple(object: &str, relation: &str, user: &str) -> StoredTuple {
    let (object_type, object_id) = object.split_once(':').unwrap();
    let (user_part, user_relation) = match user.split_once('#') {
        Some((u, r)) => (u, Some(r.to_string())),
        None => (user, None),
    };
    let (user_type, user_id) = user_part.split_once(':').unwrap();
    StoredTuple::new(object_type, object_id, relation, user_type, user_id, user_relation)
}

/// Helper function to run a CRUD round against any DataStore implementation.
async fn run_basic_crud_test<S: DataStore + ?Sized>(store: &S, store_id: &str) {
    store
        .create_store(store_id, "Integration Test Store")
        .await
        .unwrap();

    let s = store.get_store(store_id).await.unwrap();
    assert_eq!(s.id, store_id);

    let t = tuple("document:doc1", "viewer", "user:alice");
    store.write_tuple(store_id, t.clone()).await.unwrap();

    let tuples = store
        .read_tuples(store_id, &TupleFilter::default())
        .await
        .unwrap();
    assert_eq!(tuples, vec![t.clone()]);

    store.delete_tuple(store_id, t).await.unwrap();
    let tuples = store
        .read_tuples(store_id, &TupleFilter::default())
        .await
        .unwrap();
    assert!(tuples.is_empty());

    store.delete_store(store_id).await.unwrap();
}

#[tokio::test]
async fn test_basic_crud_through_trait_object() {
    let store: Arc<dyn DataStore> = Arc::new(MemoryDataStore::new());
    run_basic_crud_test(store.as_ref(), "integration-crud").await;
}

#[tokio::test]
async fn test_document_scenario_indexes() {
    let store = MemoryDataStore::new();
    store.create_store("docs", "Documents").await.unwrap();

    store
        .write_tuples(
            "docs",
            vec![
                tuple("document:doc-001", "owner", "user:alice"),
                tuple("document:doc-001", "editor", "team:engineering#member"),
                tuple("team:engineering", "member", "user:bob"),
                tuple("department:product", "team", "team:engineering"),
                tuple("document:doc-002", "editor", "department:product#member"),
                tuple("document:doc-003", "editor", "team:technical-support#member"),
            ],
            vec![],
        )
        .await
        .unwrap();

    let doc1_editors = store
        .read_tuples_by_object("docs", "document", "doc-001", Some("editor"))
        .await
        .unwrap();
    assert_eq!(
        doc1_editors,
        vec![tuple("document:doc-001", "editor", "team:engineering#member")]
    );

    let engineering_as_subject = store
        .read_tuples_by_user("docs", "team:engineering", None)
        .await
        .unwrap();
    assert_eq!(
        engineering_as_subject,
        vec![tuple("department:product", "team", "team:engineering")]
    );

    assert_eq!(
        store.list_objects_by_type("docs", "document").await.unwrap(),
        vec!["doc-001", "doc-002", "doc-003"]
    );
    assert_eq!(
        store
            .list_users_by_type("docs", "team", Some("member"))
            .await
            .unwrap(),
        vec!["team:engineering#member", "team:technical-support#member"]
    );

    let by_type_and_relation = store
        .read_tuples(
            "docs",
            &TupleFilter {
                object_type: Some("document".to_string()),
                relation: Some("editor".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_type_and_relation.len(), 3);
}

#[tokio::test]
async fn test_operations_on_missing_store_fail() {
    let store = MemoryDataStore::new();

    assert!(matches!(
        store.read_tuples("ghost", &TupleFilter::default()).await,
        Err(StorageError::StoreNotFound { .. })
    ));
    assert!(matches!(
        store.list_objects_by_type("ghost", "document").await,
        Err(StorageError::StoreNotFound { .. })
    ));
    assert!(matches!(
        store
            .write_authorization_model(StoredAuthorizationModel::new("m1", "ghost", "1.1", "{}"))
            .await,
        Err(StorageError::StoreNotFound { .. })
    ));
    assert!(matches!(
        store.delete_store("ghost").await,
        Err(StorageError::StoreNotFound { .. })
    ));
}

#[tokio::test]
async fn test_large_dataset_lookups() {
    let store = MemoryDataStore::new();
    store.create_store("large", "Large").await.unwrap();

    for batch in 0..10 {
        let writes = (0..1000)
            .map(|i| {
                tuple(
                    &format!("document:doc{batch}-{i}"),
                    "viewer",
                    &format!("user:user{}", i % 50),
                )
            })
            .collect();
        store.write_tuples("large", writes, vec![]).await.unwrap();
    }

    let one_doc = store
        .read_tuples_by_object("large", "document", "doc3-17", None)
        .await
        .unwrap();
    assert_eq!(one_doc, vec![tuple("document:doc3-17", "viewer", "user:user17")]);

    let one_user = store
        .read_tuples_by_user("large", "user:user7", None)
        .await
        .unwrap();
    assert_eq!(one_user.len(), 200);

    assert_eq!(
        store.list_objects_by_type("large", "document").await.unwrap().len(),
        10_000
    );
}

#[tokio::test]
async fn test_concurrent_access_across_threads() {
    let store = Arc::new(MemoryDataStore::new());
    store
        .create_store("integration-concurrent", "Concurrent Test")
        .await
        .unwrap();

    let mut handles = Vec::new();

    for i in 0..10 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for j in 0..100 {
                store
                    .write_tuple(
                        "integration-concurrent",
                        tuple(&format!("doc:doc-{i}-{j}"), "viewer", &format!("user:user-{i}")),
                    )
                    .await
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let tuples = store
        .read_tuples("integration-concurrent", &TupleFilter::default())
        .await
        .unwrap();
    assert_eq!(tuples.len(), 1000);

    store.delete_store("integration-concurrent").await.unwrap();
}
