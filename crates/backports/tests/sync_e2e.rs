//! End-to-end sync runs: HTTP tracker client against a mock server, writing
//! into real stores.

use backports::domain::IssueId;
use backports::error::SyncError;
use backports::resolver::CustomFieldIds;
use backports::storage::in_memory::InMemoryStore;
use backports::storage::jsonl::JsonlStore;
use backports::storage::{Document, DocumentStore, DocumentUpdate};
use backports::sync::{SyncOptions, Syncer};
use backports::tracker::jira::JiraClient;
use backports::transport::{HttpTransport, RetryPolicy, RetryingTransport};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRACKING_JQL: &str = "project = OCPBUGS AND component = Hypershift";

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn clone_jql(key: &str) -> String {
    format!(r#"issue in linkedIssues("{key}", "is cloned by") ORDER BY created DESC"#)
}

fn client(server: &MockServer, cancel: CancellationToken) -> JiraClient {
    let transport = RetryingTransport::new(
        HttpTransport::default(),
        RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(5),
        },
        cancel,
    );
    JiraClient::new(&server.uri(), "token", Arc::new(transport)).unwrap()
}

fn options() -> SyncOptions {
    SyncOptions {
        jql: TRACKING_JQL.to_string(),
        page_size: 50,
        store_timeout: Duration::from_secs(5),
        fields: CustomFieldIds::default(),
    }
}

async fn mount_search(server: &MockServer, jql: &str, keys: &[&str]) {
    let issues: Vec<Value> = keys
        .iter()
        .map(|k| json!({"key": k, "fields": {"status": {"name": "New"}}}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .and(query_param("jql", jql))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issues": issues})))
        .mount(server)
        .await;
}

async fn mount_issue(server: &MockServer, key: &str, fields: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/api/2/issue/{key}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": key,
            "fields": fields,
        })))
        .mount(server)
        .await;
}

/// Tracker with `OCPBUGS-1` (cloned by `OCPBUGS-2`) and a broken `OCPBUGS-3`.
async fn seeded_tracker() -> MockServer {
    let server = MockServer::start().await;
    mount_search(&server, TRACKING_JQL, &["OCPBUGS-1", "OCPBUGS-3"]).await;
    mount_search(&server, &clone_jql("OCPBUGS-1"), &["OCPBUGS-2"]).await;
    mount_search(&server, &clone_jql("OCPBUGS-2"), &[]).await;
    mount_issue(
        &server,
        "OCPBUGS-1",
        json!({
            "summary": "Kubelet crash on upgrade",
            "status": {"name": "Verified"},
            "assignee": {"displayName": "Ana Lima"},
            "customfield_12319940": [{"name": "4.19.0"}],
            "customfield_12323940": [{"name": "4.17.z"}, {"name": "4.18.z"}]
        }),
    )
    .await;
    mount_issue(
        &server,
        "OCPBUGS-2",
        json!({
            "status": {"name": "ON_QA"},
            "customfield_12319940": "[map[id:1 name:4.18.z]]"
        }),
    )
    .await;
    Mock::given(path("/rest/api/2/issue/OCPBUGS-3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_sync_against_http_tracker() {
    let server = seeded_tracker().await;
    let tracker = client(&server, CancellationToken::new());
    let store = InMemoryStore::with_documents([
        doc(json!({"id": "OCPBUGS-1", "status": "New", "completed": true})),
        doc(json!({"id": "OCPBUGS-3", "status": "New"})),
        doc(json!({"id": "OCPBUGS-99", "status": "Closed"})),
    ]);

    let report = Syncer::new(&tracker, &store, options()).run().await.unwrap();

    assert_eq!(report.pages, 1);
    assert_eq!(report.upserted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.removed, 2);

    let docs = store.find_all().await.unwrap();
    assert_eq!(
        docs,
        vec![doc(json!({
            "id": "OCPBUGS-1",
            "status": "Verified",
            "target_version": "4.19.0",
            "assignee": "Ana Lima",
            "summary": "Kubelet crash on upgrade",
            "target_backport_versions": "4.18.z, 4.17.z",
            "completed": true,
            "clone": {
                "id": "OCPBUGS-2",
                "status": "ON_QA",
                "target_version": "4.18.z"
            }
        }))]
    );
}

#[tokio::test]
async fn test_resync_into_jsonl_keeps_completed_flag() {
    let server = seeded_tracker().await;
    let tracker = client(&server, CancellationToken::new());
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("backports.jsonl");

    {
        let (store, _) = JsonlStore::open(&data).await.unwrap();
        Syncer::new(&tracker, &store, options()).run().await.unwrap();
        let outcome = store
            .update(
                &IssueId::new("OCPBUGS-1"),
                DocumentUpdate::new().set("completed", json!(true)),
            )
            .await
            .unwrap();
        assert_eq!(outcome.modified, 1);
    }

    let (store, warnings) = JsonlStore::open(&data).await.unwrap();
    assert!(warnings.is_empty());
    let report = Syncer::new(&tracker, &store, options()).run().await.unwrap();

    assert_eq!(report.inserted, 0);
    let docs = store.find_all().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["completed"], json!(true));
    assert_eq!(docs[0]["clone"]["id"], json!("OCPBUGS-2"));
}

#[tokio::test]
async fn test_cancelled_sync_removes_nothing() {
    let server = MockServer::start().await;
    Mock::given(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let tracker = client(&server, cancel.clone());
    let store = InMemoryStore::with_documents([doc(json!({"id": "OCPBUGS-1"}))]);
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let err = Syncer::new(&tracker, &store, options())
        .run()
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(store.find_all().await.unwrap().len(), 1);
}
