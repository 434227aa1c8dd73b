//! Composition root: host events in, engine calls out.
//!
//! [`Revisions`] holds one [`RevisionEngine`] per record type and routes each
//! host event to the engine of the record involved. Callbacks that do not
//! depend on a record type go through a [`HookRegistry`], so they are installed
//! once however many record types are registered.

use crate::config::RevisionsConfig;
use crate::diff::DiffSection;
use crate::engine::{RevisionEngine, SaveContext};
use crate::error::{MetaRevError, Result};
use crate::field::FieldSet;
use crate::reader::MetaReader;
use crate::render::{DiffRenderer, RenderOptions, TableRenderer};
use crate::restore::RestoreReport;
use crate::sanitize::{MarkupSanitizer, Sanitize};
use crate::writer::SnapshotWrite;
use crate::{AGGREGATE_KEY, AGGREGATE_LABEL};
use indexmap::IndexMap;
use metarev_store::{HostStore, RecordId};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Record-type independent callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookId {
    /// Adds the aggregate key to the comparable revision fields
    RevisionFields,
    /// Supplies the aggregate text of a revision
    RevisionFieldValue,
}

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    installed: BTreeSet<HookId>,
}

impl HookRegistry {
    /// Returns `true` the first time `id` is installed.
    pub fn install(&mut self, id: HookId) -> bool {
        let fresh = self.installed.insert(id);
        if fresh {
            tracing::debug!(?id, "installed shared hook");
        }
        fresh
    }

    pub fn is_installed(&self, id: HookId) -> bool {
        self.installed.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

pub struct Revisions<S: ?Sized> {
    store: Arc<S>,
    sanitizer: Arc<dyn Sanitize>,
    renderer: Arc<dyn DiffRenderer>,
    render_options: RenderOptions,
    engines: IndexMap<String, RevisionEngine<S>>,
    hooks: HookRegistry,
}

impl<S: HostStore + ?Sized> Revisions<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            sanitizer: Arc::new(MarkupSanitizer::default()),
            renderer: Arc::new(TableRenderer),
            render_options: RenderOptions::default(),
            engines: IndexMap::new(),
            hooks: HookRegistry::default(),
        }
    }

    /// One engine per configured record type.
    pub fn from_config(store: Arc<S>, config: &RevisionsConfig) -> Result<Self> {
        let mut revisions = Self::new(store).with_render_options(RenderOptions {
            split_view: config.split_view,
            ..RenderOptions::default()
        });
        for (record_type, fields) in config.field_sets()? {
            revisions.register(record_type, fields)?;
        }
        Ok(revisions)
    }

    /// Applies to engines registered afterwards.
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitize>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Applies to engines registered afterwards.
    pub fn with_renderer(mut self, renderer: Arc<dyn DiffRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Applies to engines registered afterwards.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Start tracking `fields` for `record_type`.
    pub fn register(
        &mut self,
        record_type: impl Into<String>,
        fields: FieldSet,
    ) -> Result<&RevisionEngine<S>> {
        let record_type = record_type.into();
        if self.engines.contains_key(&record_type) {
            return Err(MetaRevError::Config(format!(
                "record type `{record_type}` is already registered"
            )));
        }

        let engine = RevisionEngine::new(record_type.clone(), fields, Arc::clone(&self.store))
            .with_sanitizer(Arc::clone(&self.sanitizer))
            .with_renderer(Arc::clone(&self.renderer))
            .with_render_options(self.render_options.clone());

        self.hooks.install(HookId::RevisionFields);
        self.hooks.install(HookId::RevisionFieldValue);

        tracing::info!(record_type = %record_type, fields = engine.fields().len(), "registered record type");
        let entry = self.engines.entry(record_type).or_insert(engine);
        Ok(&*entry)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn engine(&self, record_type: &str) -> Option<&RevisionEngine<S>> {
        self.engines.get(record_type)
    }

    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    /// Engine for the type of `id` itself.
    fn engine_for(&self, id: RecordId) -> Result<Option<&RevisionEngine<S>>> {
        Ok(self
            .store
            .record_type(id)?
            .and_then(|record_type| self.engines.get(&record_type)))
    }

    /// Engine for the live record behind `id` (its parent when `id` is a snapshot).
    fn engine_for_owner(&self, id: RecordId) -> Result<Option<&RevisionEngine<S>>> {
        let owner = self.store.snapshot_parent(id)?.unwrap_or(id);
        self.engine_for(owner)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// A live record was saved.
    pub fn record_saved(
        &self,
        record: RecordId,
        incoming: &Value,
        ctx: SaveContext,
    ) -> Result<Option<SnapshotWrite>> {
        match self.engine_for(record)? {
            Some(engine) => engine.capture_live(record, incoming, ctx),
            None => Ok(None),
        }
    }

    /// A revision or autosave was created.
    pub fn snapshot_created(
        &self,
        snapshot: RecordId,
        incoming: &Value,
    ) -> Result<Option<SnapshotWrite>> {
        if self.store.snapshot_parent(snapshot)?.is_none() {
            tracing::debug!(snapshot, "not a snapshot; ignoring");
            return Ok(None);
        }
        match self.engine_for_owner(snapshot)? {
            Some(engine) => engine.capture_revision(snapshot, incoming),
            None => Ok(None),
        }
    }

    /// A snapshot was restored onto `destination`.
    pub fn snapshot_restored(
        &self,
        destination: RecordId,
        source: RecordId,
    ) -> Result<Option<RestoreReport>> {
        match self.engine_for(destination)? {
            Some(engine) => engine.restore(destination, source),
            None => Ok(None),
        }
    }

    /// Render a preview of `record`.
    ///
    /// The reader handed to `render` redirects tracked keys of `record` to its
    /// autosave. The redirection ends when `render` returns.
    pub fn render_preview<R>(
        &self,
        record: RecordId,
        render: impl FnOnce(&MetaReader<'_, S>) -> R,
    ) -> Result<R> {
        let over = match self.engine_for(record)? {
            Some(engine) => engine.preview_reader(record)?,
            None => None,
        };

        let mut reader = MetaReader::plain(self.store.as_ref());
        if let Some(over) = &over {
            tracing::debug!(record, "preview override active");
            reader = reader.with_override(over);
        }
        Ok(render(&reader))
    }

    /// Two snapshots are being compared; append the meta section if anything differs.
    pub fn compare_snapshots(
        &self,
        from: Option<RecordId>,
        to: RecordId,
        sections: &mut Vec<DiffSection>,
    ) -> Result<()> {
        let Some(engine) = self.engine_for_owner(to)? else {
            return Ok(());
        };
        let fields = engine.build_diff(from, Some(to))?;
        if fields.is_empty() {
            return Ok(());
        }
        sections.push(DiffSection {
            id: AGGREGATE_KEY.to_string(),
            name: AGGREGATE_LABEL.to_string(),
            fields,
        });
        Ok(())
    }

    /// Add the aggregate key to the host's comparable revision fields.
    pub fn revision_fields(&self, fields: &mut Vec<(String, String)>) {
        if !self.hooks.is_installed(HookId::RevisionFields) {
            return;
        }
        if !fields.iter().any(|(key, _)| key == AGGREGATE_KEY) {
            fields.push((AGGREGATE_KEY.to_string(), AGGREGATE_LABEL.to_string()));
        }
    }

    /// The aggregate text recorded on `revision`.
    pub fn revision_field_value(&self, revision: RecordId) -> Result<Option<String>> {
        if !self.hooks.is_installed(HookId::RevisionFieldValue) {
            return Ok(None);
        }
        Ok(self
            .store
            .get_single(revision, AGGREGATE_KEY)?
            .map(|value| match value {
                Value::String(text) => text,
                other => other.to_string(),
            }))
    }

    /// Whether the host may skip creating a revision when no core column changed.
    ///
    /// Tracked record types always get a revision, since only meta may have changed.
    pub fn check_for_changes(&self, current_type: &str, default: bool) -> bool {
        if self.engines.contains_key(current_type) {
            false
        } else {
            default
        }
    }
}
