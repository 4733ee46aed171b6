use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    contact::{ContactPatch, ContactRecord},
    core::indices::VecIndex,
    mutation::MutationRequest,
    types::ContactId,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("contact {0} not in cache")]
    MissingContact(ContactId),
    #[error("contact {0} already in cache")]
    AlreadyExists(ContactId),
    #[error("no rollback snapshot saved")]
    NoRollbackPoint,
}

/// Versioned whole-collection snapshot.
///
/// Doubles as the single rollback slot and as the persisted warm-start
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshotV1 {
    pub order: Vec<ContactId>,
    pub records: Vec<ContactRecord>,
}

#[derive(Debug, Default)]
pub struct ContactStore {
    records: HashMap<ContactId, ContactRecord>,
    order: Vec<ContactId>,
    pos: HashMap<ContactId, usize>,
    by_phone: VecIndex<String>,
    by_status: VecIndex<String>,
    saved: Option<CacheSnapshotV1>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CacheSnapshotV1) -> Self {
        let mut store = Self::new();
        store.rebuild(snapshot);
        store
    }

    pub fn export_snapshot(&self) -> CacheSnapshotV1 {
        let records = self
            .order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();

        CacheSnapshotV1 {
            order: self.order.clone(),
            records,
        }
    }

    /// Inserts a record with a remote-assigned id, preserving arrival order.
    pub fn insert(&mut self, rec: ContactRecord) -> Result<(), CacheError> {
        if self.records.contains_key(&rec.id) {
            return Err(CacheError::AlreadyExists(rec.id));
        }
        self.insert_indices(&rec);
        self.pos.insert(rec.id, self.order.len());
        self.order.push(rec.id);
        self.records.insert(rec.id, rec);
        Ok(())
    }

    /// Applies an optimistic patch, saving the pre-patch snapshot if the
    /// rollback slot is empty. Returns the captured inverse patch.
    pub fn apply_optimistic(
        &mut self,
        request: &MutationRequest,
    ) -> Result<ContactPatch, CacheError> {
        if !self.records.contains_key(&request.contact_id) {
            return Err(CacheError::MissingContact(request.contact_id));
        }
        if self.saved.is_none() {
            self.saved = Some(self.export_snapshot());
        }
        self.patch_in_place(request.contact_id, &request.patch)
    }

    /// Replaces a record wholesale with the remote-confirmed version.
    ///
    /// Idempotent: settling the same record twice leaves the cache as
    /// settling it once. Records unknown to the cache are inserted.
    pub fn settle(&mut self, authoritative: ContactRecord) {
        if let Some(old) = self.records.get(&authoritative.id).cloned() {
            self.remove_indices(&old);
            self.insert_indices(&authoritative);
            self.records.insert(authoritative.id, authoritative);
        } else {
            // Settled after the record left the cache (e.g. a refetch
            // removed it); re-admit the remote truth.
            let _ = self.insert(authoritative);
        }
    }

    pub fn remove(&mut self, id: ContactId) -> Result<ContactRecord, CacheError> {
        let rec = self
            .records
            .remove(&id)
            .ok_or(CacheError::MissingContact(id))?;
        self.remove_indices(&rec);
        if let Some(idx) = self.pos.remove(&id) {
            self.order.remove(idx);
            for moved in &self.order[idx..] {
                if let Some(p) = self.pos.get_mut(moved) {
                    *p -= 1;
                }
            }
        }
        Ok(rec)
    }

    /// Restores the entire collection from the saved pre-mutation snapshot
    /// and clears the slot. Returns the number of restored records.
    pub fn rollback(&mut self) -> Result<usize, CacheError> {
        let snapshot = self.saved.take().ok_or(CacheError::NoRollbackPoint)?;
        let n = snapshot.records.len();
        self.rebuild(snapshot);
        Ok(n)
    }

    pub fn has_rollback_point(&self) -> bool {
        self.saved.is_some()
    }

    pub fn clear_rollback_point(&mut self) {
        self.saved = None;
    }

    /// Replaces the collection with a freshly fetched authoritative list.
    ///
    /// The rollback slot is left untouched; the engine decides its fate.
    pub fn replace_all(&mut self, records: Vec<ContactRecord>) {
        let order = records.iter().map(|r| r.id).collect();
        self.rebuild(CacheSnapshotV1 { order, records });
    }

    pub fn get(&self, id: ContactId) -> Option<&ContactRecord> {
        self.records.get(&id)
    }

    pub fn get_cloned(&self, id: ContactId) -> Option<ContactRecord> {
        self.get(id).cloned()
    }

    pub fn all_cloned(&self) -> Vec<ContactRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub fn by_phone(&self, phone: &str) -> Vec<&ContactRecord> {
        self.by_phone
            .get(phone)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    pub fn by_status(&self, status: &str) -> Vec<&ContactRecord> {
        self.by_status
            .get(status)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    pub fn ordered_ids(&self) -> &[ContactId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn patch_in_place(
        &mut self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<ContactPatch, CacheError> {
        let rec = self.records.get_mut(&id).ok_or(CacheError::MissingContact(id))?;
        let old_phone = rec.phone.clone();
        let old_status = rec.status.clone();

        let prev = patch.capture_inverse_for(rec);
        patch.apply_to(rec);

        if rec.phone != old_phone {
            Self::remove_from_vec_index(self.by_phone.entry(old_phone).or_default(), id);
            self.by_phone.entry(rec.phone.clone()).or_default().push(id);
        }

        if rec.status != old_status {
            Self::remove_from_vec_index(self.by_status.entry(old_status).or_default(), id);
            self.by_status
                .entry(rec.status.clone())
                .or_default()
                .push(id);
        }

        Ok(prev)
    }

    fn rebuild(&mut self, snapshot: CacheSnapshotV1) {
        let saved = self.saved.take();
        *self = Self::new();
        self.saved = saved;

        self.order = snapshot.order;
        for (idx, id) in self.order.iter().copied().enumerate() {
            self.pos.insert(id, idx);
        }
        for rec in snapshot.records {
            self.insert_indices(&rec);
            self.records.insert(rec.id, rec);
        }
    }

    fn insert_indices(&mut self, rec: &ContactRecord) {
        self.by_phone.entry(rec.phone.clone()).or_default().push(rec.id);
        self.by_status
            .entry(rec.status.clone())
            .or_default()
            .push(rec.id);
    }

    fn remove_indices(&mut self, rec: &ContactRecord) {
        Self::remove_from_vec_index(self.by_phone.entry(rec.phone.clone()).or_default(), rec.id);
        Self::remove_from_vec_index(
            self.by_status.entry(rec.status.clone()).or_default(),
            rec.id,
        );
    }

    fn remove_from_vec_index(v: &mut Vec<ContactId>, id: ContactId) {
        if let Some(pos) = v.iter().position(|x| *x == id) {
            v.remove(pos);
        }
    }
}
