//! One record type's versioned-metadata engine.
//!
//! [`RevisionEngine`] owns the field set of a record type and exposes the
//! write, read-override, restore and diff operations as plain calls. Every call
//! checks its applicability guards first and returns `Ok(None)` when one fails;
//! past the guards, store failures propagate.

use crate::diff::{DiffEngine, FieldDiff};
use crate::error::Result;
use crate::field::FieldSet;
use crate::reader::{MetaReader, SnapshotReader};
use crate::render::{DiffRenderer, RenderOptions, TableRenderer};
use crate::restore::{RestoreEngine, RestoreReport};
use crate::sanitize::{MarkupSanitizer, Sanitize};
use crate::writer::{SnapshotWrite, SnapshotWriter};
use metarev_store::{HostStore, RecordId};
use serde_json::Value;
use std::sync::Arc;

/// How a live save was triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveContext {
    /// The save is part of an autosave cycle
    pub autosave: bool,
}

impl SaveContext {
    pub fn autosave() -> Self {
        Self { autosave: true }
    }
}

pub struct RevisionEngine<S: ?Sized> {
    record_type: String,
    fields: Arc<FieldSet>,
    store: Arc<S>,
    sanitizer: Arc<dyn Sanitize>,
    renderer: Arc<dyn DiffRenderer>,
    render_options: RenderOptions,
}

impl<S: HostStore + ?Sized> RevisionEngine<S> {
    /// Engine with the markup sanitizer and the table renderer.
    pub fn new(record_type: impl Into<String>, fields: FieldSet, store: Arc<S>) -> Self {
        Self {
            record_type: record_type.into(),
            fields: Arc::new(fields),
            store,
            sanitizer: Arc::new(MarkupSanitizer::default()),
            renderer: Arc::new(TableRenderer),
            render_options: RenderOptions::default(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitize>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DiffRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Whether `id` is a record of this engine's type.
    pub fn handles(&self, id: RecordId) -> Result<bool> {
        Ok(self.store.record_type(id)?.as_deref() == Some(self.record_type.as_str()))
    }

    /// Capture tracked values onto `target`, reading fallbacks from `reference`.
    ///
    /// No-op unless `reference` is of this engine's type.
    pub fn write_snapshot(
        &self,
        incoming: &Value,
        reference: RecordId,
        target: RecordId,
    ) -> Result<Option<SnapshotWrite>> {
        if !self.handles(reference)? {
            tracing::debug!(reference, record_type = %self.record_type, "not this record type; skipping write");
            return Ok(None);
        }
        let writer = SnapshotWriter::new(self.store.as_ref(), &self.fields, self.sanitizer.as_ref());
        writer.write(incoming, reference, target).map(Some)
    }

    /// Revision or autosave call site: target is the snapshot, reference its parent.
    pub fn capture_revision(
        &self,
        snapshot: RecordId,
        incoming: &Value,
    ) -> Result<Option<SnapshotWrite>> {
        let Some(parent) = self.store.snapshot_parent(snapshot)? else {
            tracing::debug!(snapshot, "not a snapshot; skipping write");
            return Ok(None);
        };
        self.write_snapshot(incoming, parent, snapshot)
    }

    /// Live-save call site: the record is both target and reference.
    ///
    /// Autosave cycles are skipped here; they get their values through
    /// [`capture_revision`](Self::capture_revision).
    pub fn capture_live(
        &self,
        record: RecordId,
        incoming: &Value,
        ctx: SaveContext,
    ) -> Result<Option<SnapshotWrite>> {
        if ctx.autosave {
            tracing::debug!(record, "autosave cycle; skipping live write");
            return Ok(None);
        }
        self.write_snapshot(incoming, record, record)
    }

    /// The preview override for `record`, when a preview of it should be redirected.
    pub fn preview_reader(&self, record: RecordId) -> Result<Option<SnapshotReader<S>>> {
        if !self.handles(record)? {
            return Ok(None);
        }
        Ok(Some(self.snapshot_reader()))
    }

    pub fn snapshot_reader(&self) -> SnapshotReader<S> {
        SnapshotReader::new(
            self.record_type.clone(),
            Arc::clone(&self.fields),
            Arc::clone(&self.store),
        )
    }

    /// Read `key` of `record` as a preview render of `record` would see it.
    pub fn resolve_metadata(&self, record: RecordId, key: &str) -> Result<Vec<Value>> {
        let reader = self.snapshot_reader();
        MetaReader::plain(self.store.as_ref())
            .with_override(&reader)
            .get_meta(record, key)
    }

    /// Roll `destination`'s tracked values back to `source`.
    ///
    /// No-op unless `destination` is of this engine's type.
    pub fn restore(&self, destination: RecordId, source: RecordId) -> Result<Option<RestoreReport>> {
        if !self.handles(destination)? {
            tracing::debug!(destination, record_type = %self.record_type, "not this record type; skipping restore");
            return Ok(None);
        }
        RestoreEngine::new(self.store.as_ref(), &self.fields)
            .restore(destination, source)
            .map(Some)
    }

    pub fn build_diff(&self, from: Option<RecordId>, to: Option<RecordId>) -> Result<Vec<FieldDiff>> {
        DiffEngine::new(
            self.store.as_ref(),
            &self.fields,
            self.renderer.as_ref(),
            &self.render_options,
        )
        .build(from, to)
    }
}
