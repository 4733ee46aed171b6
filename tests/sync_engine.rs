use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use dialsync::{
    contact::{ContactDraft, ContactPatch, ContactRecord},
    core::store::ContactStore,
    mutation::MutationRequest,
    remote::{RemoteError, RemoteResult, RemoteStore},
    retry::RetryPolicy,
    sync::{
        events::SyncEvent,
        handle::{SyncConfig, SyncError, spawn_sync_engine},
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
        call_ts_ms: None,
        callback_ts_ms: None,
        in_call: false,
        call_duration_secs: None,
    }
}

fn status_request(id: u64, status: &str) -> MutationRequest {
    MutationRequest::new(
        id,
        ContactPatch {
            status: Some(status.to_string()),
            ..ContactPatch::default()
        },
    )
}

fn fast_config() -> SyncConfig {
    SyncConfig {
        throttle_ms: 1,
        max_retries: 3,
        retry: RetryPolicy {
            base_ms: 1,
            cap_ms: 10,
        },
        ..SyncConfig::default()
    }
}

/// Remote store driven by a script of update outcomes.
struct ScriptedStore {
    update_script: Mutex<VecDeque<RemoteResult<ContactRecord>>>,
    list_response: Mutex<Vec<ContactRecord>>,
    update_calls: AtomicUsize,
    list_calls: AtomicUsize,
    update_delay: Duration,
}

impl ScriptedStore {
    fn new(
        update_script: Vec<RemoteResult<ContactRecord>>,
        list_response: Vec<ContactRecord>,
    ) -> Self {
        Self {
            update_script: Mutex::new(update_script.into()),
            list_response: Mutex::new(list_response),
            update_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            update_delay: Duration::ZERO,
        }
    }

    fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = delay;
        self
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn list(&self) -> RemoteResult<Vec<ContactRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.list_response.lock().expect("lock").clone())
    }

    async fn create(&self, _draft: &ContactDraft) -> RemoteResult<ContactRecord> {
        Err(RemoteError::Rejected {
            message: "not scripted".to_string(),
        })
    }

    async fn fetch(&self, id: u64) -> RemoteResult<ContactRecord> {
        self.list_response
            .lock()
            .expect("lock")
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(RemoteError::Rejected {
                message: "not found".to_string(),
            })
    }

    async fn update(&self, _id: u64, _patch: &ContactPatch) -> RemoteResult<ContactRecord> {
        tokio::time::sleep(self.update_delay).await;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.update_script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Err(RemoteError::Timeout))
    }

    async fn delete(&self, _id: u64) -> RemoteResult<()> {
        Ok(())
    }
}

async fn collect_until(
    sub: &mut tokio::sync::broadcast::Receiver<SyncEvent>,
    stop: impl Fn(&SyncEvent) -> bool,
) -> Vec<SyncEvent> {
    let mut seen = Vec::new();
    for _ in 0..32 {
        let evt = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("event timeout")
            .expect("recv");
        let done = stop(&evt);
        seen.push(evt);
        if done {
            break;
        }
    }
    seen
}

#[tokio::test]
async fn commit_retries_then_settles_with_remote_truth() {
    let mut settled = record(1, "called");
    settled.comment = "normalized by server".to_string();

    let remote = Arc::new(ScriptedStore::new(
        vec![
            Err(RemoteError::Http {
                status: 500,
                body: "boom".to_string(),
            }),
            Err(RemoteError::Timeout),
            Ok(settled.clone()),
        ],
        vec![settled.clone()],
    ));

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).unwrap();

    let handle = spawn_sync_engine(
        store,
        MutationQueue::new(),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        None,
        fast_config(),
    );
    let mut sub = handle.subscribe();

    let receipt = handle.submit(status_request(1, "called")).await.expect("submit");
    let outcome = receipt.done.await.expect("engine alive").expect("commit");
    assert_eq!(outcome, settled);
    assert_eq!(remote.update_calls.load(Ordering::SeqCst), 3);

    let events = collect_until(&mut sub, |e| matches!(e, SyncEvent::Refetched { .. })).await;
    assert_eq!(
        events,
        vec![
            SyncEvent::Applied {
                entry_id: receipt.entry_id,
                contact_id: 1
            },
            SyncEvent::Retrying {
                entry_id: receipt.entry_id,
                attempt: 1
            },
            SyncEvent::Retrying {
                entry_id: receipt.entry_id,
                attempt: 2
            },
            SyncEvent::Committed {
                entry_id: receipt.entry_id,
                contact_id: 1
            },
            SyncEvent::Refetched { count: 1 },
        ]
    );

    // The cache holds the remote-confirmed record, not the local patch.
    let cached = handle.get(1).await.expect("get").expect("record");
    assert_eq!(cached.comment, "normalized by server");
    assert!(remote.list_calls.load(Ordering::SeqCst) >= 1);

    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending + stats.processing, 0);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn rejection_is_terminal_on_first_attempt_and_rolls_back() {
    let baseline = vec![record(1, "new")];
    let remote = Arc::new(ScriptedStore::new(
        vec![Err(RemoteError::Rejected {
            message: "invalid status".to_string(),
        })],
        baseline.clone(),
    ));

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).unwrap();

    let handle = spawn_sync_engine(
        store,
        MutationQueue::new(),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        None,
        fast_config(),
    );
    let mut sub = handle.subscribe();

    let receipt = handle.submit(status_request(1, "called")).await.expect("submit");
    let outcome = receipt.done.await.expect("engine alive");
    assert!(matches!(
        outcome,
        Err(SyncError::Remote(RemoteError::Rejected { .. }))
    ));

    // Exactly one attempt, no retry on validation rejection.
    assert_eq!(remote.update_calls.load(Ordering::SeqCst), 1);

    let events = collect_until(&mut sub, |e| matches!(e, SyncEvent::RolledBack { .. })).await;
    assert!(events.iter().any(|e| matches!(
        e,
        SyncEvent::RolledBack {
            error: RemoteError::Rejected { .. },
            ..
        }
    )));

    let cached = handle.get(1).await.expect("get").expect("record");
    assert_eq!(cached.status, "new");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn retries_exhaust_then_roll_back_and_refetch() {
    let baseline = vec![record(1, "new")];
    let remote = Arc::new(ScriptedStore::new(
        vec![
            Err(RemoteError::Timeout),
            Err(RemoteError::Timeout),
            Err(RemoteError::Timeout),
        ],
        baseline.clone(),
    ));

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).unwrap();

    let handle = spawn_sync_engine(
        store,
        MutationQueue::new(),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        None,
        fast_config(),
    );
    let mut sub = handle.subscribe();

    let receipt = handle.submit(status_request(1, "called")).await.expect("submit");
    assert!(receipt.done.await.expect("engine alive").is_err());
    assert_eq!(remote.update_calls.load(Ordering::SeqCst), 3);

    let events = collect_until(&mut sub, |e| matches!(e, SyncEvent::Refetched { .. })).await;
    assert!(events.iter().any(|e| matches!(e, SyncEvent::RolledBack { .. })));

    let cached = handle.get(1).await.expect("get").expect("record");
    assert_eq!(cached.status, "new");

    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.failed, 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn submit_is_non_blocking_while_a_commit_is_in_flight() {
    let settled = record(1, "called");
    let remote = Arc::new(
        ScriptedStore::new(vec![Ok(settled.clone())], vec![settled.clone()])
            .with_update_delay(Duration::from_millis(250)),
    );

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).unwrap();

    let handle = spawn_sync_engine(
        store,
        MutationQueue::new(),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        None,
        fast_config(),
    );

    let receipt = handle.submit(status_request(1, "called")).await.expect("submit");

    // The optimistic patch is visible before the remote commit resolves.
    let cached = handle.get(1).await.expect("get").expect("record");
    assert_eq!(cached.status, "called");
    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.pending + stats.processing, 1);

    receipt.done.await.expect("engine alive").expect("commit");
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn refetch_after_settle_corrects_collection_drift() {
    let settled = record(1, "called");
    // The remote also knows a record this cache has never seen.
    let remote = Arc::new(ScriptedStore::new(
        vec![Ok(settled.clone())],
        vec![settled.clone(), record(2, "new")],
    ));

    let mut store = ContactStore::new();
    store.insert(record(1, "new")).unwrap();

    let handle = spawn_sync_engine(
        store,
        MutationQueue::new(),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        None,
        fast_config(),
    );
    let mut sub = handle.subscribe();

    let receipt = handle.submit(status_request(1, "called")).await.expect("submit");
    receipt.done.await.expect("engine alive").expect("commit");
    collect_until(&mut sub, |e| matches!(e, SyncEvent::Refetched { count: 2 })).await;

    let all = handle.all().await.expect("all");
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].id, 2);

    handle.shutdown().await.expect("shutdown");
}

#[test]
fn queue_lifecycle_only_readmits_failed_attempts_under_the_retry_bound() {
    use dialsync::{mutation::EntryState, sync::queue::MutationQueue};

    let mut queue = MutationQueue::new();
    let id = queue.enqueue(status_request(1, "called"), 0);

    let (begun, _, attempts) = queue.begin_next().expect("pending head");
    assert_eq!(begun, id);
    assert_eq!(attempts, 0);

    // Two failures re-queue, the third is terminal under max_retries = 3.
    assert_eq!(queue.fail_attempt(id, 3), Some(EntryState::Pending));
    queue.begin_next().expect("re-queued");
    assert_eq!(queue.fail_attempt(id, 3), Some(EntryState::Pending));
    queue.begin_next().expect("re-queued");
    assert_eq!(queue.fail_attempt(id, 3), Some(EntryState::Failed));

    // A terminal entry never goes back to pending.
    assert!(queue.begin_next().is_none());
    assert_eq!(queue.entry(id).expect("entry").attempts, 3);
    assert!(queue.is_idle());
    assert_eq!(queue.stats().failed, 1);
}

#[test]
fn completed_entries_are_purged_past_the_retention_window() {
    use dialsync::sync::queue::MutationQueue;

    let mut queue = MutationQueue::with_retention(1_000);
    let id = queue.enqueue(status_request(1, "called"), 10_000);
    queue.begin_next().expect("pending");
    queue.complete(id);

    assert_eq!(queue.purge_expired(10_500), 0);
    assert_eq!(queue.purge_expired(11_500), 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn submit_for_unknown_contact_fails_fast() {
    let remote = Arc::new(ScriptedStore::new(vec![], vec![]));
    let handle = spawn_sync_engine(
        ContactStore::new(),
        MutationQueue::new(),
        remote as Arc<dyn RemoteStore>,
        None,
        fast_config(),
    );

    let result = handle.submit(status_request(42, "called")).await;
    assert!(matches!(result, Err(SyncError::Cache(_))));

    handle.shutdown().await.expect("shutdown");
}
