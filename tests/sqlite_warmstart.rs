use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use dialsync::{
    contact::{ContactDraft, ContactPatch, ContactRecord},
    core::store::ContactStore,
    persist::{SnapshotStore, sqlite::SqliteSnapshotStore},
    remote::{RemoteError, RemoteResult, RemoteStore},
    sync::{
        handle::{SyncConfig, spawn_sync_engine},
        queue::MutationQueue,
    },
};

fn record(id: u64, status: &str) -> ContactRecord {
    ContactRecord {
        id,
        name: format!("contact-{id}"),
        phone: format!("+337000000{id:02}"),
        status: status.to_string(),
        comment: String::new(),
        call_ts_ms: Some(1_700_000_000_000),
        callback_ts_ms: None,
        in_call: false,
        call_duration_secs: Some(90),
    }
}

#[test]
fn snapshot_round_trips_across_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("warmstart.db");

    let mut store = ContactStore::new();
    for i in 1..=10u64 {
        store.insert(record(i, if i % 2 == 0 { "called" } else { "new" })).expect("insert");
    }
    let snapshot = store.export_snapshot();

    let mut sink = SqliteSnapshotStore::open(&db_path).expect("open sqlite");
    sink.save("contacts", &snapshot).expect("save");
    drop(sink);

    let mut reopened = SqliteSnapshotStore::open(&db_path).expect("reopen");
    let loaded = reopened.load("contacts").expect("load").expect("present");
    assert_eq!(loaded, snapshot);

    let warmed = ContactStore::from_snapshot(loaded);
    assert_eq!(warmed.export_snapshot(), snapshot);
    assert_eq!(warmed.by_status("called").len(), 5);
}

#[test]
fn collections_are_independent_keys() {
    let mut sink = SqliteSnapshotStore::open_in_memory().expect("open");

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).expect("insert");
    sink.save("contacts", &store.export_snapshot()).expect("save");

    assert!(sink.load("prospects").expect("load").is_none());
    assert!(sink.load("contacts").expect("load").is_some());
}

/// Remote that always confirms with its own copy of the record.
struct EchoStore;

#[async_trait]
impl RemoteStore for EchoStore {
    async fn list(&self) -> RemoteResult<Vec<ContactRecord>> {
        Ok(vec![record(1, "called")])
    }

    async fn create(&self, _draft: &ContactDraft) -> RemoteResult<ContactRecord> {
        Err(RemoteError::Rejected {
            message: "unsupported".to_string(),
        })
    }

    async fn fetch(&self, _id: u64) -> RemoteResult<ContactRecord> {
        Ok(record(1, "called"))
    }

    async fn update(&self, _id: u64, _patch: &ContactPatch) -> RemoteResult<ContactRecord> {
        Ok(record(1, "called"))
    }

    async fn delete(&self, _id: u64) -> RemoteResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn engine_persists_the_hydrated_cache_for_the_next_start() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("engine.db");

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).expect("insert");

    let persist = SqliteSnapshotStore::open(&db_path).expect("open sqlite");
    let handle = spawn_sync_engine(
        store,
        MutationQueue::new(),
        Arc::new(EchoStore),
        Some(Box::new(persist)),
        SyncConfig {
            throttle_ms: 1,
            ..SyncConfig::default()
        },
    );

    let receipt = handle
        .submit(dialsync::mutation::MutationRequest::new(
            1,
            ContactPatch {
                status: Some("called".to_string()),
                ..ContactPatch::default()
            },
        ))
        .await
        .expect("submit");
    receipt.done.await.expect("engine alive").expect("commit");
    handle.shutdown().await.expect("shutdown");

    let mut reopened = SqliteSnapshotStore::open(&db_path).expect("reopen");
    let loaded = reopened.load("contacts").expect("load").expect("present");
    let warmed = ContactStore::from_snapshot(loaded);
    assert_eq!(warmed.get(1).expect("record").status, "called");
}

#[test]
fn save_is_an_upsert_keeping_the_latest_snapshot() {
    let mut sink = SqliteSnapshotStore::open_in_memory().expect("open");

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).expect("insert");
    sink.save("contacts", &store.export_snapshot()).expect("first save");

    store.insert(record(2, "called")).expect("insert");
    let latest = store.export_snapshot();
    sink.save("contacts", &latest).expect("second save");

    let loaded = sink.load("contacts").expect("load").expect("present");
    assert_eq!(loaded, latest);
    assert_eq!(loaded.order, vec![1, 2]);
}
