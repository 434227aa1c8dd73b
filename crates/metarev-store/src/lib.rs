//! Metarev Host Store
//!
//! The record store the versioned-metadata engine runs against:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         HOST STORE                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────┐   revisions (ordered)   ┌──────────────┐           │
//! │  │ live record │────────────────────────►│  revision 1  │ ...       │
//! │  │   (post)    │                         └──────────────┘           │
//! │  │             │   current autosave      ┌──────────────┐           │
//! │  │             │────────────────────────►│   autosave   │ (0 or 1)  │
//! │  └─────────────┘                         └──────────────┘           │
//! │         │                                        │                  │
//! │         ▼                                        ▼                  │
//! │  ┌──────────────────────────────────────────────────────┐           │
//! │  │  attributes: (owner id, key) -> [value, value, ...]   │           │
//! │  └──────────────────────────────────────────────────────┘           │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine only ever talks to the [`AttributeStore`] and [`RecordCatalog`]
//! traits. [`MemoryHost`] is a complete in-process host (optionally persisted
//! to a JSON state file) used by the CLI and the tests.
//!
//! Every single get/set/add/delete is atomic on its own; nothing here offers
//! cross-key transactions.

pub mod memory;
pub mod persistence;


use serde_json::Value;

pub use memory::{HostState, MemoryHost, RecordInfo, RecordKind};
pub use persistence::StoreConfig;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier shared by live records, revisions and autosaves.
pub type RecordId = u64;

/// Record type the host reports for revisions and autosaves.
pub const SNAPSHOT_RECORD_TYPE: &str = "revision";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is read-only; refusing to write `{key}` on record {owner}")]
    ReadOnly { owner: RecordId, key: String },

    #[error("unknown record: {0}")]
    UnknownRecord(RecordId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Collaborator Contracts
// ============================================================================

/// Generic multi-valued key/value attributes attached to any record id.
pub trait AttributeStore: Send + Sync {
    /// All values of `key` on `owner`, in insertion order. Empty means "not found".
    fn get_all(&self, owner: RecordId, key: &str) -> StoreResult<Vec<Value>>;

    /// First value of `key` on `owner`, or `None` when nothing is recorded.
    ///
    /// `Some(Value::String(""))` is an explicitly recorded empty value and is
    /// not the same thing as `None`.
    fn get_single(&self, owner: RecordId, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.get_all(owner, key)?.into_iter().next())
    }

    /// Replace every value of `key` on `owner` with exactly `value`.
    fn set(&self, owner: RecordId, key: &str, value: Value) -> StoreResult<()>;

    /// Append one more value of `key` on `owner`.
    fn add(&self, owner: RecordId, key: &str, value: Value) -> StoreResult<()>;

    /// Remove every value of `key` from `owner`.
    fn delete(&self, owner: RecordId, key: &str) -> StoreResult<()>;
}

/// What the host knows about records, revisions and autosaves.
pub trait RecordCatalog: Send + Sync {
    /// The live record a revision or autosave belongs to, `None` for anything else.
    fn snapshot_parent(&self, id: RecordId) -> StoreResult<Option<RecordId>>;

    fn is_autosave(&self, id: RecordId) -> StoreResult<bool>;

    /// The autosave currently attached to `record`, if any.
    fn current_autosave(&self, record: RecordId) -> StoreResult<Option<RecordId>>;

    fn record_type(&self, id: RecordId) -> StoreResult<Option<String>>;
}

/// Everything the engine needs from the host.
pub trait HostStore: AttributeStore + RecordCatalog {}

impl<T: AttributeStore + RecordCatalog> HostStore for T {}
