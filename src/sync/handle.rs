use std::sync::Arc;

use hashbrown::HashMap;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::Duration,
};

use crate::{
    contact::ContactRecord,
    core::store::{CacheError, ContactStore},
    mutation::{EntryState, MutationRequest},
    persist::{PersistError, SnapshotStore},
    remote::{RemoteError, RemoteStore},
    retry::RetryPolicy,
    sync::queue::{MutationQueue, QueueStats},
    types::{ContactId, EntryId, now_ms},
};

use super::events::SyncEvent;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("engine channel closed")]
    ChannelClosed,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Collection name, used as the persistence key.
    pub collection: String,
    /// Fixed spacing before each commit attempt, in milliseconds.
    pub throttle_ms: u64,
    /// Maximum commit attempts per entry.
    pub max_retries: u32,
    /// Backoff between failed attempts.
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: "contacts".to_string(),
            throttle_ms: 300,
            max_retries: 3,
            retry: RetryPolicy::COMMIT,
        }
    }
}

/// Receipt for one submitted mutation.
///
/// `done` resolves once the entry reaches a terminal state: the remote-
/// confirmed record on success, the terminal error after rollback.
#[derive(Debug)]
pub struct SubmitReceipt {
    /// Id of the queued entry.
    pub entry_id: EntryId,
    /// Terminal outcome channel for this entry.
    pub done: oneshot::Receiver<Result<ContactRecord, SyncError>>,
}

pub struct SyncHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SyncEvent>,
}

impl Clone for SyncHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Submit {
        request: MutationRequest,
        resp: oneshot::Sender<Result<SubmitReceipt, SyncError>>,
    },
    Get {
        id: ContactId,
        resp: oneshot::Sender<Option<ContactRecord>>,
    },
    All {
        resp: oneshot::Sender<Vec<ContactRecord>>,
    },
    Stats {
        resp: oneshot::Sender<QueueStats>,
    },
    Refetch {
        resp: oneshot::Sender<()>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), SyncError>>,
    },
}

enum Outcome {
    Commit {
        entry_id: EntryId,
        result: Result<ContactRecord, RemoteError>,
    },
    Refetch {
        result: Result<Vec<ContactRecord>, RemoteError>,
    },
}

/// Spawns the single-writer engine loop and returns its handle.
///
/// `store` may be warm-started from a persisted snapshot; `queue` is owned
/// exclusively by the spawned engine from here on. When `persist` is given,
/// the snapshot is saved after every completed refetch and on shutdown.
pub fn spawn_sync_engine(
    store: ContactStore,
    queue: MutationQueue,
    remote: Arc<dyn RemoteStore>,
    persist: Option<Box<dyn SnapshotStore>>,
    config: SyncConfig,
) -> SyncHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<SyncEvent>(1024);
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();

    let mut engine = Engine {
        store,
        queue,
        remote,
        persist: persist.map(|p| Arc::new(Mutex::new(p))),
        config,
        events_tx: events_tx.clone(),
        outcome_tx,
        waiters: HashMap::new(),
        in_flight: false,
        refetch_pending: false,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if engine.handle_command(cmd).await {
                        break;
                    }
                }
                outcome = outcome_rx.recv() => {
                    if let Some(outcome) = outcome {
                        engine.handle_outcome(outcome).await;
                    }
                }
            }
            engine.maybe_dispatch();
        }
    });

    SyncHandle { cmd_tx, events_tx }
}

struct Engine {
    store: ContactStore,
    queue: MutationQueue,
    remote: Arc<dyn RemoteStore>,
    persist: Option<Arc<Mutex<Box<dyn SnapshotStore>>>>,
    config: SyncConfig,
    events_tx: broadcast::Sender<SyncEvent>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    waiters: HashMap<EntryId, oneshot::Sender<Result<ContactRecord, SyncError>>>,
    in_flight: bool,
    refetch_pending: bool,
}

impl Engine {
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Submit { request, resp } => {
                let _ = resp.send(self.submit(request));
            }
            Command::Get { id, resp } => {
                let _ = resp.send(self.store.get_cloned(id));
            }
            Command::All { resp } => {
                let _ = resp.send(self.store.all_cloned());
            }
            Command::Stats { resp } => {
                let _ = resp.send(self.queue.stats());
            }
            Command::Refetch { resp } => {
                self.start_refetch();
                let _ = resp.send(());
            }
            Command::Shutdown { resp } => {
                let out = self.persist_snapshot().await;
                let _ = resp.send(out);
                return true;
            }
        }
        false
    }

    fn submit(&mut self, request: MutationRequest) -> Result<SubmitReceipt, SyncError> {
        let contact_id = request.contact_id;
        let prev = self.store.apply_optimistic(&request)?;

        let entry_id = self.queue.enqueue(request, now_ms());
        self.queue.record_inverse(entry_id, prev);

        let (done_tx, done_rx) = oneshot::channel();
        self.waiters.insert(entry_id, done_tx);

        let _ = self.events_tx.send(SyncEvent::Applied {
            entry_id,
            contact_id,
        });

        Ok(SubmitReceipt {
            entry_id,
            done: done_rx,
        })
    }

    /// Starts a commit worker for the head-of-queue entry unless one is
    /// already in flight or a refetch is settling the cache.
    fn maybe_dispatch(&mut self) {
        if self.in_flight || self.refetch_pending {
            return;
        }
        let Some((entry_id, request, attempts)) = self.queue.begin_next() else {
            return;
        };
        self.in_flight = true;

        let remote = Arc::clone(&self.remote);
        let outcome_tx = self.outcome_tx.clone();
        let mut delay = Duration::from_millis(self.config.throttle_ms);
        if attempts > 0 {
            delay += self.config.retry.delay_for(attempts - 1);
        }

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = remote.update(request.contact_id, &request.patch).await;
            let _ = outcome_tx.send(Outcome::Commit { entry_id, result });
        });
    }

    async fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Commit { entry_id, result } => {
                self.in_flight = false;
                match result {
                    Ok(record) => self.commit_succeeded(entry_id, record),
                    Err(err) => self.commit_failed(entry_id, err),
                }
                let purged = self.queue.purge_expired(now_ms());
                if purged > 0 {
                    tracing::debug!(purged, "dropped expired completed entries");
                }
            }
            Outcome::Refetch { result } => {
                self.refetch_pending = false;
                match result {
                    Ok(records) => self.refetch_succeeded(records).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "collection refetch failed");
                        let _ = self.events_tx.send(SyncEvent::RefetchFailed);
                    }
                }
            }
        }
    }

    fn commit_succeeded(&mut self, entry_id: EntryId, record: ContactRecord) {
        let contact_id = record.id;
        self.queue.complete(entry_id);
        // Remote response is the source of truth, not the local patch.
        self.store.settle(record.clone());

        if let Some(waiter) = self.waiters.remove(&entry_id) {
            let _ = waiter.send(Ok(record));
        }
        let _ = self.events_tx.send(SyncEvent::Committed {
            entry_id,
            contact_id,
        });
        self.start_refetch();
    }

    fn commit_failed(&mut self, entry_id: EntryId, err: RemoteError) {
        let contact_id = self
            .queue
            .entry(entry_id)
            .map(|e| e.request.contact_id)
            .unwrap_or_default();

        let state = if err.is_retryable() {
            self.queue
                .fail_attempt(entry_id, self.config.max_retries)
                .unwrap_or(EntryState::Failed)
        } else {
            self.queue.reject(entry_id);
            EntryState::Failed
        };

        if state == EntryState::Pending {
            let attempt = self.queue.entry(entry_id).map(|e| e.attempts).unwrap_or(0);
            tracing::warn!(entry_id, attempt, error = %err, "commit failed, re-queued");
            let _ = self.events_tx.send(SyncEvent::Retrying { entry_id, attempt });
            return;
        }

        match self.store.rollback() {
            Ok(restored) => {
                tracing::warn!(entry_id, restored, error = %err, "mutation failed, cache rolled back");
            }
            Err(CacheError::NoRollbackPoint) => {
                tracing::warn!(entry_id, error = %err, "mutation failed with no rollback snapshot");
            }
            Err(other) => {
                tracing::error!(entry_id, error = %other, "rollback failed");
            }
        }

        if let Some(waiter) = self.waiters.remove(&entry_id) {
            let _ = waiter.send(Err(SyncError::Remote(err.clone())));
        }
        let _ = self.events_tx.send(SyncEvent::RolledBack {
            entry_id,
            contact_id,
            error: err,
        });
        self.start_refetch();
    }

    /// Unconditional after every terminal transition, success or failure.
    fn start_refetch(&mut self) {
        if self.refetch_pending {
            return;
        }
        self.refetch_pending = true;

        let remote = Arc::clone(&self.remote);
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = remote.list().await;
            let _ = outcome_tx.send(Outcome::Refetch { result });
        });
    }

    async fn refetch_succeeded(&mut self, records: Vec<ContactRecord>) {
        let count = records.len();
        self.store.replace_all(records);

        // Re-layer unsettled optimism on top of the fresh authoritative
        // snapshot; the first re-apply records it as the new rollback point.
        self.store.clear_rollback_point();
        let active: Vec<MutationRequest> =
            self.queue.active_requests().cloned().collect();
        for request in &active {
            if let Err(err) = self.store.apply_optimistic(request) {
                tracing::debug!(contact_id = request.contact_id, error = %err,
                    "pending mutation target missing after refetch");
            }
        }
        if self.queue.is_idle() {
            self.store.clear_rollback_point();
        }

        let _ = self.events_tx.send(SyncEvent::Refetched { count });

        if let Err(err) = self.persist_snapshot().await {
            tracing::warn!(error = %err, "snapshot persist failed");
        }
    }

    async fn persist_snapshot(&mut self) -> Result<(), SyncError> {
        let Some(persist) = self.persist.as_ref() else {
            return Ok(());
        };

        let snapshot = self.store.export_snapshot();
        let collection = self.config.collection.clone();
        let persist = Arc::clone(persist);
        tokio::task::spawn_blocking(move || {
            let mut sink = persist.blocking_lock();
            sink.save(&collection, &snapshot)
        })
        .await
        .map_err(|e| SyncError::Persist(PersistError::Message(format!("join error: {e}"))))??;
        Ok(())
    }
}

impl SyncHandle {
    /// Subscribes to the engine event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Applies `request` optimistically and queues its remote commit.
    ///
    /// Returns as soon as the cache is patched; the receipt's `done`
    /// channel carries the terminal outcome.
    pub async fn submit(&self, request: MutationRequest) -> Result<SubmitReceipt, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit { request, resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }

    /// Reads one record from the cache.
    pub async fn get(&self, id: ContactId) -> Result<Option<ContactRecord>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Get { id, resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Reads the whole cached collection in order.
    pub async fn all(&self) -> Result<Vec<ContactRecord>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::All { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Current queue counts.
    pub async fn stats(&self) -> Result<QueueStats, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Stats { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Forces a collection refetch; completion is reported on the event
    /// stream.
    pub async fn refetch(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Refetch { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Persists a final snapshot when a store is attached and stops the
    /// engine.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }
}
