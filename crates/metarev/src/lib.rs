//! Metarev: versioned metadata for revisions and autosaves
//!
//! Keeps a record's tracked metadata ("meta fields") in step with its revision
//! chain and its autosave, so previews and revision comparisons see the values
//! that were in effect at that point in history:
//!
//! ```text
//!   record saved ──────────┐
//!   snapshot created ──────┼──► SnapshotWriter ──► attributes + `_revision_meta`
//!                          │
//!   preview render ────────┼──► SnapshotReader ──► latest autosave's values
//!                          │
//!   snapshot restored ─────┼──► RestoreEngine  ──► live record's values
//!                          │
//!   comparing snapshots ───┴──► DiffEngine     ──► per-field rendered diffs
//! ```
//!
//! [`RevisionEngine`] bundles the four operations for one record type.
//! [`Revisions`] is the composition root: it owns one engine per record type
//! and turns host events into engine calls.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod field;
pub mod hooks;
pub mod reader;
pub mod render;
pub mod restore;
pub mod sanitize;
pub mod writer;

pub use config::{FieldOptions, FieldSpec, RevisionsConfig, SourcePath};
pub use diff::{DiffEngine, DiffSection, FieldDiff};
pub use engine::{RevisionEngine, SaveContext};
pub use error::{MetaRevError, Result};
pub use field::{resolve_path, DisplayFn, FieldSet, TrackedField};
pub use hooks::{HookId, HookRegistry, Revisions};
pub use reader::{MetaReader, MetadataOverride, SnapshotReader};
pub use render::{DiffRenderer, RenderOptions, TableRenderer};
pub use restore::{RestoreEngine, RestoreReport};
pub use sanitize::{IdentitySanitizer, MarkupSanitizer, Sanitize};
pub use writer::{SnapshotWrite, SnapshotWriter};

pub use metarev_store::{HostStore, RecordId};

/// Reserved key holding every tracked value of a snapshot as pretty-printed JSON.
pub const AGGREGATE_KEY: &str = "_revision_meta";

/// Label of [`AGGREGATE_KEY`] in revision comparison screens.
pub const AGGREGATE_LABEL: &str = "Meta Fields";
