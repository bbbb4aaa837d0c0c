//! Tool behaviour over a JSONL store shared with a sync writer.

use backports::domain::IssueId;
use backports::storage::jsonl::JsonlStore;
use backports::storage::{DocumentStore, DocumentUpdate};
use backports::sync::{SyncOptions, Syncer};
use backports::tracker::FakeTracker;
use backports_mcp::{Error, Tools};
use rstest::rstest;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn seeded(temp: &TempDir) -> (PathBuf, Tools) {
    let data = temp.path().join("backports.jsonl");
    tokio::fs::write(
        &data,
        concat!(
            r#"{"id":"OCPBUGS-1","status":"Verified","target_version":"4.19.0","clone":{"id":"OCPBUGS-2","status":"ON_QA","target_version":"4.18.z"}}"#,
            "\n",
            r#"{"id":"OCPBUGS-5","status":"New","target_version":"","completed":true}"#,
            "\n",
        ),
    )
    .await
    .unwrap();
    let tools = open_tools(&data).await;
    (data, tools)
}

async fn open_tools(data: &Path) -> Tools {
    let (store, warnings) = JsonlStore::open(data).await.unwrap();
    assert!(warnings.is_empty());
    Tools::new(Arc::new(store), Duration::from_secs(5))
}

#[tokio::test]
async fn test_list_documents_returns_all_snapshots() {
    let temp = TempDir::new().unwrap();
    let (_, tools) = seeded(&temp).await;

    let docs = tools.list_documents().await.unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["id"], json!("OCPBUGS-1"));
    assert_eq!(docs[0]["clone"]["id"], json!("OCPBUGS-2"));
    assert_eq!(docs[1]["completed"], json!(true));
}

#[tokio::test]
async fn test_mark_completed_only_touches_flag() {
    let temp = TempDir::new().unwrap();
    let (data, tools) = seeded(&temp).await;

    let response = tools.mark_completed("OCPBUGS-1", true).await.unwrap();
    assert!(response.success);
    assert_eq!(response.modified, 1);

    let reopened = open_tools(&data).await;
    let docs = reopened.list_documents().await.unwrap();
    assert_eq!(
        docs[0],
        json!({
            "id": "OCPBUGS-1",
            "status": "Verified",
            "target_version": "4.19.0",
            "clone": {"id": "OCPBUGS-2", "status": "ON_QA", "target_version": "4.18.z"},
            "completed": true
        })
        .as_object()
        .unwrap()
        .clone()
    );
}

#[rstest]
#[case::already_set("OCPBUGS-5", true, true, 0)]
#[case::cleared("OCPBUGS-5", false, true, 1)]
#[case::missing("OCPBUGS-404", true, false, 0)]
#[tokio::test]
async fn test_mark_completed_outcomes(
    #[case] id: &str,
    #[case] completed: bool,
    #[case] success: bool,
    #[case] modified: u64,
) {
    let temp = TempDir::new().unwrap();
    let (_, tools) = seeded(&temp).await;

    let response = tools.mark_completed(id, completed).await.unwrap();

    assert_eq!(response.success, success);
    assert_eq!(response.modified, modified);
    assert_eq!(response.completed, completed);
}

#[tokio::test]
async fn test_missing_id_inserts_nothing() {
    let temp = TempDir::new().unwrap();
    let (_, tools) = seeded(&temp).await;

    tools.mark_completed("OCPBUGS-404", true).await.unwrap();

    assert_eq!(tools.list_documents().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_id_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (_, tools) = seeded(&temp).await;

    let err = tools.mark_completed("  ", true).await.unwrap_err();

    assert!(matches!(err, Error::InvalidArgument { field: "id", .. }));
}

#[tokio::test]
async fn test_tools_see_writes_from_another_store() {
    let temp = TempDir::new().unwrap();
    let (data, tools) = seeded(&temp).await;
    assert_eq!(tools.list_documents().await.unwrap().len(), 2);

    // A sync run in another process holds its own handle on the same file.
    let (writer, _) = JsonlStore::open(&data).await.unwrap();
    writer
        .upsert(
            &IssueId::new("OCPBUGS-9"),
            DocumentUpdate::new().set("status", json!("POST")),
        )
        .await
        .unwrap();

    let docs = tools.list_documents().await.unwrap();
    assert_eq!(docs.len(), 3);

    // Marking must not drop the document the other writer added.
    tools.mark_completed("OCPBUGS-1", true).await.unwrap();
    let (check, _) = JsonlStore::open(&data).await.unwrap();
    assert_eq!(check.find_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_sync_store_keeps_flag_marked_after_it_opened() {
    let temp = TempDir::new().unwrap();
    let (data, tools) = seeded(&temp).await;
    // The sync side opened the file before the flag was set.
    let (sync_store, _) = JsonlStore::open(&data).await.unwrap();

    tools.mark_completed("OCPBUGS-1", true).await.unwrap();
    sync_store
        .upsert(
            &IssueId::new("OCPBUGS-9"),
            DocumentUpdate::new().set("status", json!("POST")),
        )
        .await
        .unwrap();

    let docs = open_tools(&data).await.list_documents().await.unwrap();
    let marked = docs.iter().find(|d| d["id"] == json!("OCPBUGS-1")).unwrap();
    assert_eq!(marked["completed"], json!(true));
    assert_eq!(docs.len(), 3);
}

#[tokio::test]
async fn test_sync_run_keeps_flags_marked_during_run() {
    let temp = TempDir::new().unwrap();
    let (data, tools) = seeded(&temp).await;
    let (sync_store, _) = JsonlStore::open(&data).await.unwrap();
    let tracker = FakeTracker::new()
        .with_simple_issue("OCPBUGS-1", "Verified", "4.19.0")
        .with_simple_issue("OCPBUGS-5", "ON_QA", "4.19.0")
        .tracking("OCPBUGS-1")
        .tracking("OCPBUGS-5");

    tools.mark_completed("OCPBUGS-1", true).await.unwrap();
    tools.mark_completed("OCPBUGS-5", false).await.unwrap();
    let report = Syncer::new(&tracker, &sync_store, SyncOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.upserted, 2);
    let docs = tools.list_documents().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["completed"], json!(true));
    assert_eq!(docs[0]["status"], json!("Verified"));
    assert!(docs[0].get("clone").is_none());
    assert_eq!(docs[1]["completed"], json!(false));
    assert_eq!(docs[1]["status"], json!("ON_QA"));
}
