//! The document-management walkthrough run by the `relgraph` binary.
//!
//! Teams hold members, departments hold teams, and documents grant
//! `editor` to users, team members and department members (owners are
//! editors too).

use std::fmt;

use relgraph_storage::DataStore;
use tracing::info;

use crate::error::ServiceResult;
use crate::service::{
    AuthzService, CheckParams, ListObjectsParams, ListUsersParams, TupleKey, WriteRequest,
};

/// The team/department/document model.
pub const DOCUMENT_MODEL: &str = include_str!("../fixtures/document_model.json");

/// Default name of the store the walkthrough creates.
pub const STORE_NAME: &str = "Document Management System";

/// Relationships written by the walkthrough.
pub fn scenario_tuples() -> Vec<TupleKey> {
    vec![
        TupleKey::new("user:alice", "owner", "document:doc-001"),
        TupleKey::new("team:engineering#member", "editor", "document:doc-001"),
        TupleKey::new("user:bob", "member", "team:engineering"),
        TupleKey::new("team:engineering", "team", "department:product"),
        TupleKey::new("department:product#member", "editor", "document:doc-002"),
        TupleKey::new("team:technical-support#member", "editor", "document:doc-003"),
    ]
}

/// Checks asked by the walkthrough, as `(question, user, object)`; the
/// relation is always `editor`.
const QUESTIONS: [(&str, &str, &str); 4] = [
    ("Can Bob edit doc-001?", "user:bob", "document:doc-001"),
    ("Can Bob edit doc-002?", "user:bob", "document:doc-002"),
    ("Can Bob edit doc-003?", "user:bob", "document:doc-003"),
    ("Can Alice edit doc-001?", "user:alice", "document:doc-001"),
];

/// Answers produced by one walkthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub store_id: String,
    pub authorization_model_id: String,
    /// `(question, allowed)` in the order asked.
    pub checks: Vec<(String, bool)>,
    pub documents_bob_can_edit: Vec<String>,
    pub teams_that_can_edit_doc_001: Vec<String>,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (question, allowed) in &self.checks {
            writeln!(f, "{question} {allowed}")?;
        }
        writeln!(
            f,
            "Documents Bob can edit: [{}]",
            self.documents_bob_can_edit.join(", ")
        )?;
        write!(
            f,
            "Teams that can edit doc-001: [{}]",
            self.teams_that_can_edit_doc_001.join(", ")
        )
    }
}

/// Creates a store, publishes `model_json`, writes the scenario tuples and
/// collects the answers. Checks and queries are pinned to the published
/// model.
pub async fn run_scenario<S: DataStore>(
    service: &AuthzService<S>,
    store_name: &str,
    model_json: &str,
) -> ServiceResult<ScenarioReport> {
    let store = service.create_store(store_name).await?;
    let model_id = service
        .write_authorization_model(&store.id, model_json)
        .await?
        .authorization_model_id;

    service
        .write(
            &store.id,
            WriteRequest::writes(scenario_tuples()).with_model_id(&model_id),
        )
        .await?;
    info!(store_id = %store.id, "scenario tuples written");

    let mut checks = Vec::with_capacity(QUESTIONS.len());
    for (question, user, object) in QUESTIONS {
        let response = service
            .check(
                &store.id,
                CheckParams::new(user, "editor", object).with_model_id(&model_id),
            )
            .await?;
        checks.push((question.to_string(), response.allowed));
    }

    let documents = service
        .list_objects(
            &store.id,
            ListObjectsParams::new("user:bob", "editor", "document").with_model_id(&model_id),
        )
        .await?;

    let teams = service
        .list_users(
            &store.id,
            ListUsersParams::new("document:doc-001", "editor", "team")
                .with_user_relation("member")
                .with_model_id(&model_id),
        )
        .await?;

    Ok(ScenarioReport {
        store_id: store.id,
        authorization_model_id: model_id,
        checks,
        documents_bob_can_edit: documents.objects,
        teams_that_can_edit_doc_001: teams.users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_scenario_answers() {
        let service = AuthzService::in_memory(ServerConfig::default());
        let report = run_scenario(&service, STORE_NAME, DOCUMENT_MODEL)
            .await
            .unwrap();

        let answers: Vec<bool> = report.checks.iter().map(|(_, allowed)| *allowed).collect();
        assert_eq!(answers, vec![true, true, false, true]);
        assert_eq!(
            report.documents_bob_can_edit,
            vec!["document:doc-001", "document:doc-002"]
        );
        assert_eq!(
            report.teams_that_can_edit_doc_001,
            vec!["team:engineering#member"]
        );
    }

    #[tokio::test]
    async fn test_report_wording() {
        let service = AuthzService::in_memory(ServerConfig::default());
        let report = run_scenario(&service, STORE_NAME, DOCUMENT_MODEL)
            .await
            .unwrap();

        let rendered = report.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Can Bob edit doc-001? true",
                "Can Bob edit doc-002? true",
                "Can Bob edit doc-003? false",
                "Can Alice edit doc-001? true",
                "Documents Bob can edit: [document:doc-001, document:doc-002]",
                "Teams that can edit doc-001: [team:engineering#member]",
            ]
        );
    }
}
