//! End-to-end walkthrough of the document-management scenario through the
//! public service API.

use anyhow::Result;

use relgraph_domain::ErrorKind;
use relgraph_server::scenario::{run_scenario, scenario_tuples, DOCUMENT_MODEL, STORE_NAME};
use relgraph_server::service::{
    CheckParams, ListObjectsParams, ListUsersParams, ReadRequest, TupleKey, WriteRequest,
};
use relgraph_server::{AuthzService, ServerConfig};

#[tokio::test]
async fn test_walkthrough_matches_expected_answers() -> Result<()> {
    let service = AuthzService::in_memory(ServerConfig::default());
    let report = run_scenario(&service, STORE_NAME, DOCUMENT_MODEL).await?;

    assert_eq!(
        report.checks,
        vec![
            ("Can Bob edit doc-001?".to_string(), true),
            ("Can Bob edit doc-002?".to_string(), true),
            ("Can Bob edit doc-003?".to_string(), false),
            ("Can Alice edit doc-001?".to_string(), true),
        ]
    );
    assert_eq!(
        report.documents_bob_can_edit,
        vec!["document:doc-001", "document:doc-002"]
    );
    assert_eq!(
        report.teams_that_can_edit_doc_001,
        vec!["team:engineering#member"]
    );

    let store = service.get_store(&report.store_id).await?;
    assert_eq!(store.name, STORE_NAME);
    Ok(())
}

#[tokio::test]
async fn test_new_model_version_changes_answers() -> Result<()> {
    let service = AuthzService::in_memory(ServerConfig::default());
    let store = service.create_store(STORE_NAME).await?;
    let v1 = service
        .write_authorization_model(&store.id, DOCUMENT_MODEL)
        .await?
        .authorization_model_id;
    service
        .write(&store.id, WriteRequest::writes(scenario_tuples()))
        .await?;

    // v2: owners are no longer editors
    let v2_json = r#"{
        "schema_version": "1.1",
        "type_definitions": [
            {"type": "user"},
            {
                "type": "team",
                "relations": {"member": {"this": {}}, "department": {"this": {}}},
                "metadata": {"relations": {
                    "member": {"directly_related_user_types": [{"type": "user"}]},
                    "department": {"directly_related_user_types": [{"type": "department"}]}
                }}
            },
            {
                "type": "department",
                "relations": {
                    "member": {"tupleToUserset": {"tupleset": {"relation": "team"}, "computedUserset": {"relation": "member"}}},
                    "team": {"this": {}}
                },
                "metadata": {"relations": {
                    "member": {"directly_related_user_types": []},
                    "team": {"directly_related_user_types": [{"type": "team"}]}
                }}
            },
            {
                "type": "document",
                "relations": {"owner": {"this": {}}, "editor": {"this": {}}},
                "metadata": {"relations": {
                    "owner": {"directly_related_user_types": [{"type": "user"}]},
                    "editor": {"directly_related_user_types": [
                        {"type": "user"},
                        {"type": "team", "relation": "member"},
                        {"type": "department", "relation": "member"}
                    ]}
                }}
            }
        ]
    }"#;
    let v2 = service
        .write_authorization_model(&store.id, v2_json)
        .await?
        .authorization_model_id;

    let alice = || CheckParams::new("user:alice", "editor", "document:doc-001");
    assert!(!service.check(&store.id, alice()).await?.allowed);
    assert!(!service.check(&store.id, alice().with_model_id(&v2)).await?.allowed);
    assert!(service.check(&store.id, alice().with_model_id(&v1)).await?.allowed);

    let bob = CheckParams::new("user:bob", "editor", "document:doc-002");
    assert!(service.check(&store.id, bob).await?.allowed);
    Ok(())
}

#[tokio::test]
async fn test_wildcard_grants_every_user() -> Result<()> {
    let model = r#"{
        "schema_version": "1.1",
        "type_definitions": [
            {"type": "user"},
            {
                "type": "document",
                "relations": {
                    "viewer": {"this": {}},
                    "blocked": {"this": {}},
                    "reader": {"difference": {
                        "base": {"computedUserset": {"relation": "viewer"}},
                        "subtract": {"computedUserset": {"relation": "blocked"}}
                    }}
                },
                "metadata": {"relations": {
                    "viewer": {"directly_related_user_types": [{"type": "user"}, {"type": "user", "wildcard": {}}]},
                    "blocked": {"directly_related_user_types": [{"type": "user"}]}
                }}
            }
        ]
    }"#;

    let service = AuthzService::in_memory(ServerConfig::default());
    let store = service.create_store("Public docs").await?;
    service.write_authorization_model(&store.id, model).await?;
    service
        .write(
            &store.id,
            WriteRequest::writes(vec![
                TupleKey::new("user:*", "viewer", "document:handbook"),
                TupleKey::new("user:mallory", "blocked", "document:handbook"),
            ]),
        )
        .await?;

    let reader = |user: &str| CheckParams::new(user, "reader", "document:handbook");
    assert!(service.check(&store.id, reader("user:anyone")).await?.allowed);
    assert!(!service.check(&store.id, reader("user:mallory")).await?.allowed);

    let viewers = service
        .list_users(
            &store.id,
            ListUsersParams::new("document:handbook", "viewer", "user"),
        )
        .await?;
    assert_eq!(viewers.users, vec!["user:*", "user:mallory"]);

    let readable = service
        .list_objects(
            &store.id,
            ListObjectsParams::new("user:mallory", "reader", "document"),
        )
        .await?;
    assert!(readable.objects.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_mutually_nested_teams_terminate() -> Result<()> {
    let model = r#"{
        "schema_version": "1.1",
        "type_definitions": [
            {"type": "user"},
            {
                "type": "team",
                "relations": {"member": {"this": {}}},
                "metadata": {"relations": {"member": {"directly_related_user_types": [
                    {"type": "user"}, {"type": "team", "relation": "member"}
                ]}}}
            }
        ]
    }"#;

    let service = AuthzService::in_memory(ServerConfig::default());
    let store = service.create_store("Cycles").await?;
    service.write_authorization_model(&store.id, model).await?;
    service
        .write(
            &store.id,
            WriteRequest::writes(vec![
                TupleKey::new("team:a#member", "member", "team:b"),
                TupleKey::new("team:b#member", "member", "team:a"),
                TupleKey::new("user:carol", "member", "team:b"),
            ]),
        )
        .await?;

    let member = |user: &str, team: &str| CheckParams::new(user, "member", team);
    assert!(service.check(&store.id, member("user:carol", "team:a")).await?.allowed);
    assert!(!service.check(&store.id, member("user:dave", "team:a")).await?.allowed);

    let tuples = service.read(&store.id, ReadRequest::default()).await?;
    assert_eq!(tuples.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_errors_carry_kinds() -> Result<()> {
    let service = AuthzService::in_memory(ServerConfig::default());

    let err = service
        .check(
            "01HNOSUCHSTORE",
            CheckParams::new("user:bob", "editor", "document:doc-001"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let store = service.create_store(STORE_NAME).await?;
    let err = service
        .write_authorization_model(&store.id, r#"{"schema_version": "1.1"}"#)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    Ok(())
}
