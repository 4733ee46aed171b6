//! Device-state synchronization core for a contact-calling dashboard.
//!
//! Three mechanisms share the same engine problem of reconciling
//! authoritative but slow state with fast but possibly wrong local signals:
//!
//! - an optimistically-updated contact cache kept consistent with a remote
//!   store under retries, with whole-collection rollback on failure;
//! - a call-state reconciler merging two independent detection signals
//!   into one authoritative status every poll tick;
//! - a ranked-candidate fallback engine that clears ambiguous device UI
//!   states (such as a SIM chooser) one deterministic tap at a time.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::ContactStore`]:
//! ```
//! use dialsync::{
//!     contact::{ContactPatch, ContactRecord},
//!     core::store::ContactStore,
//!     mutation::MutationRequest,
//! };
//!
//! let mut store = ContactStore::new();
//! store.insert(ContactRecord {
//!     id: 1,
//!     name: "Ada".to_string(),
//!     phone: "+33766906789".to_string(),
//!     status: "new".to_string(),
//!     comment: String::new(),
//!     call_ts_ms: None,
//!     callback_ts_ms: None,
//!     in_call: false,
//!     call_duration_secs: None,
//! }).expect("insert");
//!
//! let request = MutationRequest::new(1, ContactPatch {
//!     status: Some("called".to_string()),
//!     ..ContactPatch::default()
//! });
//! store.apply_optimistic(&request).expect("patch");
//! assert_eq!(store.get(1).expect("record").status, "called");
//!
//! store.rollback().expect("rollback");
//! assert_eq!(store.get(1).expect("record").status, "new");
//! ```
//!
//! Engine usage against a remote store:
//! ```no_run
//! use std::sync::Arc;
//!
//! use dialsync::{
//!     contact::ContactPatch,
//!     core::store::ContactStore,
//!     mutation::MutationRequest,
//!     remote::http::{HttpContactStore, HttpStoreConfig},
//!     sync::{
//!         handle::{SyncConfig, spawn_sync_engine},
//!         queue::MutationQueue,
//!     },
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let remote = HttpContactStore::new(HttpStoreConfig::new("http://localhost:8000"));
//! let handle = spawn_sync_engine(
//!     ContactStore::new(),
//!     MutationQueue::new(),
//!     Arc::new(remote),
//!     None,
//!     SyncConfig::default(),
//! );
//!
//! let receipt = handle
//!     .submit(MutationRequest::new(1, ContactPatch {
//!         status: Some("called".to_string()),
//!         ..ContactPatch::default()
//!     }))
//!     .await
//!     .expect("submit");
//! let settled = receipt.done.await.expect("engine alive").expect("commit");
//! assert_eq!(settled.status, "called");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Call-state reconciliation across detection sources.
pub mod call;
/// Contact domain records and patches.
pub mod contact;
/// In-memory authoritative cache with the single rollback slot.
pub mod core;
/// Device boundary: typed commands, backend trait, automation flows.
pub mod device;
/// Ranked-candidate fallback against ambiguous UI states.
pub mod fallback;
/// Mutation request model and queue-entry lifecycle.
pub mod mutation;
/// Warm-start persistence of the last-hydrated cache.
pub mod persist;
/// Remote contact-store boundary and HTTP client.
pub mod remote;
/// Shared exponential backoff policy.
pub mod retry;
/// Single-writer synchronization engine.
pub mod sync;
/// Shared primitive types and helpers.
pub mod types;
