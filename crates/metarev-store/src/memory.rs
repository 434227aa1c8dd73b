//! In-process host: records, revision chains, autosave pointers and attributes.

use crate::{
    AttributeStore, RecordCatalog, RecordId, StoreError, StoreResult, SNAPSHOT_RECORD_TYPE,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordKind {
    Live,
    Revision { parent: RecordId },
    Autosave { parent: RecordId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInfo {
    pub id: RecordId,
    pub record_type: String,
    pub kind: RecordKind,
    pub created_at: DateTime<Utc>,
}

impl RecordInfo {
    pub fn parent(&self) -> Option<RecordId> {
        match self.kind {
            RecordKind::Live => None,
            RecordKind::Revision { parent } | RecordKind::Autosave { parent } => Some(parent),
        }
    }
}

/// Serializable state of a [`MemoryHost`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostState {
    pub next_id: RecordId,
    pub records: BTreeMap<RecordId, RecordInfo>,
    /// Live record -> revision ids, oldest first.
    pub revisions: BTreeMap<RecordId, Vec<RecordId>>,
    /// Live record -> its current autosave.
    pub autosaves: BTreeMap<RecordId, RecordId>,
    pub attributes: BTreeMap<RecordId, BTreeMap<String, Vec<Value>>>,
}

/// Thread-safe in-memory host store.
pub struct MemoryHost {
    pub(crate) state: RwLock<HostState>,
    pub(crate) read_only: AtomicBool,
    /// Where `save()` writes to, when opened from a state file.
    pub(crate) path: Option<PathBuf>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::from_state(HostState::default(), None)
    }

    pub(crate) fn from_state(state: HostState, path: Option<PathBuf>) -> Self {
        Self {
            state: RwLock::new(state),
            read_only: AtomicBool::new(false),
            path,
        }
    }

    /// Reject every subsequent write with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Clone of the full state (for persistence and inspection).
    pub fn state(&self) -> HostState {
        self.state.read().clone()
    }

    // ========================================================================
    // Record lifecycle
    // ========================================================================

    /// Create a live record of `record_type`.
    pub fn create_record(&self, record_type: &str) -> RecordId {
        let mut state = self.state.write();
        let id = Self::insert(&mut state, record_type.to_string(), RecordKind::Live);
        tracing::debug!(id, record_type, "created record");
        id
    }

    /// Append a new revision to `parent`'s chain.
    pub fn create_revision(&self, parent: RecordId) -> StoreResult<RecordId> {
        let mut state = self.state.write();
        Self::require_live(&state, parent)?;
        let id = Self::insert(
            &mut state,
            SNAPSHOT_RECORD_TYPE.to_string(),
            RecordKind::Revision { parent },
        );
        state.revisions.entry(parent).or_default().push(id);
        tracing::debug!(id, parent, "created revision");
        Ok(id)
    }

    /// Create the autosave for `parent`, replacing (and purging) any previous one.
    pub fn create_autosave(&self, parent: RecordId) -> StoreResult<RecordId> {
        let mut state = self.state.write();
        Self::require_live(&state, parent)?;
        if let Some(previous) = state.autosaves.remove(&parent) {
            state.records.remove(&previous);
            state.attributes.remove(&previous);
        }
        let id = Self::insert(
            &mut state,
            SNAPSHOT_RECORD_TYPE.to_string(),
            RecordKind::Autosave { parent },
        );
        state.autosaves.insert(parent, id);
        tracing::debug!(id, parent, "created autosave");
        Ok(id)
    }

    /// Revision chain of `parent`, oldest first.
    pub fn revisions(&self, parent: RecordId) -> Vec<RecordId> {
        self.state
            .read()
            .revisions
            .get(&parent)
            .cloned()
            .unwrap_or_default()
    }

    pub fn record(&self, id: RecordId) -> Option<RecordInfo> {
        self.state.read().records.get(&id).cloned()
    }

    /// Every attribute recorded on `id`.
    pub fn attributes_of(&self, id: RecordId) -> BTreeMap<String, Vec<Value>> {
        self.state
            .read()
            .attributes
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Garbage-collect a record (live or snapshot) together with its attributes.
    ///
    /// Purging a live record also purges its revisions and autosave.
    pub fn purge(&self, id: RecordId) -> StoreResult<()> {
        let mut state = self.state.write();
        let info = state
            .records
            .remove(&id)
            .ok_or(StoreError::UnknownRecord(id))?;
        state.attributes.remove(&id);

        match info.kind {
            RecordKind::Live => {
                let mut owned = state.revisions.remove(&id).unwrap_or_default();
                owned.extend(state.autosaves.remove(&id));
                for snapshot in owned {
                    state.records.remove(&snapshot);
                    state.attributes.remove(&snapshot);
                }
            }
            RecordKind::Revision { parent } => {
                if let Some(chain) = state.revisions.get_mut(&parent) {
                    chain.retain(|r| *r != id);
                }
            }
            RecordKind::Autosave { parent } => {
                if state.autosaves.get(&parent) == Some(&id) {
                    state.autosaves.remove(&parent);
                }
            }
        }
        tracing::debug!(id, "purged record");
        Ok(())
    }

    fn insert(state: &mut HostState, record_type: String, kind: RecordKind) -> RecordId {
        state.next_id += 1;
        let id = state.next_id;
        state.records.insert(
            id,
            RecordInfo {
                id,
                record_type,
                kind,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn require_live(state: &HostState, id: RecordId) -> StoreResult<()> {
        match state.records.get(&id) {
            Some(info) if info.kind == RecordKind::Live => Ok(()),
            _ => Err(StoreError::UnknownRecord(id)),
        }
    }

    fn writable(&self, owner: RecordId, key: &str) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly {
                owner,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn with_values<R>(
        &self,
        owner: RecordId,
        key: &str,
        f: impl FnOnce(&mut BTreeMap<String, Vec<Value>>) -> R,
    ) -> StoreResult<R> {
        self.writable(owner, key)?;
        let mut state = self.state.write();
        if !state.records.contains_key(&owner) {
            return Err(StoreError::UnknownRecord(owner));
        }
        let attrs = state.attributes.entry(owner).or_default();
        let out = f(attrs);
        if attrs.is_empty() {
            state.attributes.remove(&owner);
        }
        Ok(out)
    }
}

// ============================================================================
// Collaborator impls
// ============================================================================

impl AttributeStore for MemoryHost {
    fn get_all(&self, owner: RecordId, key: &str) -> StoreResult<Vec<Value>> {
        Ok(self
            .state
            .read()
            .attributes
            .get(&owner)
            .and_then(|attrs| attrs.get(key))
            .cloned()
            .unwrap_or_default())
    }

    fn set(&self, owner: RecordId, key: &str, value: Value) -> StoreResult<()> {
        self.with_values(owner, key, |attrs| {
            attrs.insert(key.to_string(), vec![value]);
        })
    }

    fn add(&self, owner: RecordId, key: &str, value: Value) -> StoreResult<()> {
        self.with_values(owner, key, |attrs| {
            attrs.entry(key.to_string()).or_default().push(value);
        })
    }

    fn delete(&self, owner: RecordId, key: &str) -> StoreResult<()> {
        self.with_values(owner, key, |attrs| {
            attrs.remove(key);
        })
    }
}

impl RecordCatalog for MemoryHost {
    fn snapshot_parent(&self, id: RecordId) -> StoreResult<Option<RecordId>> {
        Ok(self.state.read().records.get(&id).and_then(RecordInfo::parent))
    }

    fn is_autosave(&self, id: RecordId) -> StoreResult<bool> {
        Ok(matches!(
            self.state.read().records.get(&id).map(|r| r.kind),
            Some(RecordKind::Autosave { .. })
        ))
    }

    fn current_autosave(&self, record: RecordId) -> StoreResult<Option<RecordId>> {
        Ok(self.state.read().autosaves.get(&record).copied())
    }

    fn record_type(&self, id: RecordId) -> StoreResult<Option<String>> {
        Ok(self
            .state
            .read()
            .records
            .get(&id)
            .map(|r| r.record_type.clone()))
    }
}
