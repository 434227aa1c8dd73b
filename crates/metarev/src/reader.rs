//! Preview-time metadata reads.
//!
//! A [`MetaReader`] is the read path a preview render uses. It asks its
//! overrides first and falls back to the store. Overrides live only as long as
//! the reader, which only lives as long as one render, so reads made anywhere
//! else never see them.

use crate::error::Result;
use crate::field::FieldSet;
use metarev_store::{AttributeStore, HostStore, RecordId};
use serde_json::Value;
use std::sync::Arc;

/// An interceptor on metadata reads.
pub trait MetadataOverride: Send + Sync {
    /// Answer a read of `key` on `record`, or hand back `prior` untouched.
    ///
    /// `prior` is `None` while no earlier override has answered.
    fn resolve(
        &self,
        prior: Option<Vec<Value>>,
        record: RecordId,
        key: &str,
        single: bool,
    ) -> Result<Option<Vec<Value>>>;
}

/// Redirects reads of tracked keys on a live record to its current autosave.
pub struct SnapshotReader<S: ?Sized> {
    record_type: String,
    fields: Arc<FieldSet>,
    store: Arc<S>,
}

impl<S: HostStore + ?Sized> SnapshotReader<S> {
    pub fn new(record_type: impl Into<String>, fields: Arc<FieldSet>, store: Arc<S>) -> Self {
        Self {
            record_type: record_type.into(),
            fields,
            store,
        }
    }
}

impl<S: HostStore + ?Sized> MetadataOverride for SnapshotReader<S> {
    /// `single` is ignored: the full value list comes back and the caller
    /// picks the first one if it wants a single value.
    fn resolve(
        &self,
        prior: Option<Vec<Value>>,
        record: RecordId,
        key: &str,
        _single: bool,
    ) -> Result<Option<Vec<Value>>> {
        if prior.is_some() || !self.fields.contains(key) {
            return Ok(prior);
        }
        // An autosave's own values are never redirected again.
        if self.store.is_autosave(record)? {
            return Ok(prior);
        }
        if self.store.record_type(record)?.as_deref() != Some(self.record_type.as_str()) {
            return Ok(prior);
        }
        let Some(autosave) = self.store.current_autosave(record)? else {
            return Ok(prior);
        };

        tracing::debug!(record, autosave, key, "reading tracked key from autosave");
        Ok(Some(self.store.get_all(autosave, key)?))
    }
}

/// Metadata read path with an override chain in front of the store.
pub struct MetaReader<'a, S: ?Sized> {
    store: &'a S,
    overrides: Vec<&'a dyn MetadataOverride>,
}

impl<'a, S: AttributeStore + ?Sized> MetaReader<'a, S> {
    /// Reads straight from the store.
    pub fn plain(store: &'a S) -> Self {
        Self {
            store,
            overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, over: &'a dyn MetadataOverride) -> Self {
        self.overrides.push(over);
        self
    }

    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// All values of `key` on `record`.
    pub fn get_meta(&self, record: RecordId, key: &str) -> Result<Vec<Value>> {
        self.lookup(record, key, false)
    }

    /// First value of `key` on `record`.
    pub fn get_meta_single(&self, record: RecordId, key: &str) -> Result<Option<Value>> {
        Ok(self.lookup(record, key, true)?.into_iter().next())
    }

    fn lookup(&self, record: RecordId, key: &str, single: bool) -> Result<Vec<Value>> {
        let mut answer = None;
        for over in &self.overrides {
            answer = over.resolve(answer, record, key, single)?;
        }
        match answer {
            Some(values) => Ok(values),
            None => Ok(self.store.get_all(record, key)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TrackedField;
    use metarev_store::MemoryHost;
    use serde_json::json;

    fn setup() -> (Arc<MemoryHost>, SnapshotReader<MemoryHost>, RecordId) {
        let host = Arc::new(MemoryHost::new());
        let post = host.create_record("post");
        host.set(post, "subtitle", json!("Live")).unwrap();
        host.set(post, "untracked", json!("Live")).unwrap();
        let fields = Arc::new(FieldSet::new(vec![TrackedField::new("subtitle")]).unwrap());
        let reader = SnapshotReader::new("post", fields, Arc::clone(&host));
        (host, reader, post)
    }

    #[test]
    fn test_redirects_to_autosave() {
        let (host, reader, post) = setup();
        let auto = host.create_autosave(post).unwrap();
        host.set(auto, "subtitle", json!("Draft")).unwrap();
        host.set(auto, "untracked", json!("Draft")).unwrap();

        let meta = MetaReader::plain(host.as_ref()).with_override(&reader);
        assert_eq!(meta.get_meta_single(post, "subtitle").unwrap(), Some(json!("Draft")));
        assert_eq!(meta.get_meta(post, "subtitle").unwrap(), vec![json!("Draft")]);
        assert_eq!(meta.get_meta_single(post, "untracked").unwrap(), Some(json!("Live")));
    }

    #[test]
    fn test_autosave_without_value_reads_empty() {
        let (host, reader, post) = setup();
        host.create_autosave(post).unwrap();

        let meta = MetaReader::plain(host.as_ref()).with_override(&reader);
        assert!(meta.get_meta(post, "subtitle").unwrap().is_empty());
    }

    #[test]
    fn test_pass_through_cases() {
        let (host, reader, post) = setup();

        // no autosave yet
        assert_eq!(reader.resolve(None, post, "subtitle", true).unwrap(), None);

        let auto = host.create_autosave(post).unwrap();
        host.set(auto, "subtitle", json!("Draft")).unwrap();

        // an earlier answer wins
        let prior = Some(vec![json!("earlier")]);
        assert_eq!(
            reader.resolve(prior.clone(), post, "subtitle", true).unwrap(),
            prior
        );
        // untracked key
        assert_eq!(reader.resolve(None, post, "untracked", true).unwrap(), None);
        // the autosave itself
        assert_eq!(reader.resolve(None, auto, "subtitle", true).unwrap(), None);

        // another record type
        let page = host.create_record("page");
        host.create_autosave(page).unwrap();
        assert_eq!(reader.resolve(None, page, "subtitle", true).unwrap(), None);
    }

    #[test]
    fn test_plain_reader_is_never_redirected() {
        let (host, _reader, post) = setup();
        let auto = host.create_autosave(post).unwrap();
        host.set(auto, "subtitle", json!("Draft")).unwrap();

        let meta = MetaReader::plain(host.as_ref());
        assert!(!meta.has_overrides());
        assert_eq!(meta.get_meta_single(post, "subtitle").unwrap(), Some(json!("Live")));
    }
}
