//! Capturing tracked values onto a snapshot.

use crate::error::Result;
use crate::field::{resolve_path, FieldSet};
use crate::sanitize::Sanitize;
use crate::AGGREGATE_KEY;
use metarev_store::{AttributeStore, RecordId};
use serde_json::{Map, Value};

/// What one snapshot write stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotWrite {
    pub target: RecordId,
    /// Every value written individually, in field declaration order
    pub values: Map<String, Value>,
    /// The aggregate JSON text, when at least one field produced a value
    pub aggregate: Option<String>,
}

impl SnapshotWrite {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Computes and persists the authoritative value of every tracked field.
pub struct SnapshotWriter<'a, S: ?Sized> {
    store: &'a S,
    fields: &'a FieldSet,
    sanitizer: &'a dyn Sanitize,
}

impl<'a, S: AttributeStore + ?Sized> SnapshotWriter<'a, S> {
    pub fn new(store: &'a S, fields: &'a FieldSet, sanitizer: &'a dyn Sanitize) -> Self {
        Self {
            store,
            fields,
            sanitizer,
        }
    }

    /// Capture every tracked field onto `target`.
    ///
    /// A value found in `incoming` is sanitized and used; otherwise the value
    /// already on `reference` is carried over; a field with neither is not
    /// written at all. The aggregate is written last, for exactly the fields
    /// that were written, and only if there was at least one.
    pub fn write(
        &self,
        incoming: &Value,
        reference: RecordId,
        target: RecordId,
    ) -> Result<SnapshotWrite> {
        let mut values = Map::new();

        for field in self.fields.iter() {
            let value = match resolve_path(incoming, &field.source_path) {
                Some(raw) => {
                    tracing::debug!(key = %field.key, snapshot = target, "using submitted value");
                    self.sanitizer.sanitize(raw.clone())
                }
                None => match self.store.get_single(reference, &field.key)? {
                    Some(existing) => {
                        tracing::debug!(
                            key = %field.key,
                            reference,
                            snapshot = target,
                            "carrying over existing value"
                        );
                        existing
                    }
                    None => {
                        tracing::debug!(key = %field.key, reference, "no value anywhere; skipping");
                        continue;
                    }
                },
            };

            self.store.set(target, &field.key, value.clone())?;
            values.insert(field.key.clone(), value);
        }

        if values.is_empty() {
            tracing::warn!(snapshot = target, reference, "no tracked field produced a value");
            return Ok(SnapshotWrite {
                target,
                values,
                aggregate: None,
            });
        }

        let aggregate = serde_json::to_string_pretty(&values)?;
        self.store
            .set(target, AGGREGATE_KEY, Value::String(aggregate.clone()))?;
        tracing::info!(
            snapshot = target,
            reference,
            fields = values.len(),
            "captured snapshot meta"
        );

        Ok(SnapshotWrite {
            target,
            values,
            aggregate: Some(aggregate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TrackedField;
    use crate::sanitize::{IdentitySanitizer, MarkupSanitizer};
    use metarev_store::{MemoryHost, StoreError};
    use serde_json::json;

    fn fields() -> FieldSet {
        FieldSet::new(vec![
            TrackedField::new("subtitle").with_label("Subtitle"),
            TrackedField::new("byline").with_label("Byline"),
        ])
        .unwrap()
    }

    #[test]
    fn test_incoming_wins_and_reference_fills_gaps() {
        let host = MemoryHost::new();
        let post = host.create_record("post");
        host.set(post, "subtitle", json!("Old")).unwrap();
        host.set(post, "byline", json!("Jane")).unwrap();
        let rev = host.create_revision(post).unwrap();

        let fields = fields();
        let sanitizer = MarkupSanitizer::default();
        let written = SnapshotWriter::new(&host, &fields, &sanitizer)
            .write(&json!({"subtitle": "New"}), post, rev)
            .unwrap();

        assert_eq!(host.get_single(rev, "subtitle").unwrap(), Some(json!("New")));
        assert_eq!(host.get_single(rev, "byline").unwrap(), Some(json!("Jane")));

        let aggregate = host.get_single(rev, AGGREGATE_KEY).unwrap().unwrap();
        let parsed: Value = serde_json::from_str(aggregate.as_str().unwrap()).unwrap();
        assert_eq!(parsed, json!({"subtitle": "New", "byline": "Jane"}));
        assert_eq!(
            written.aggregate.as_deref(),
            Some("{\n  \"subtitle\": \"New\",\n  \"byline\": \"Jane\"\n}")
        );
    }

    #[test]
    fn test_field_missing_everywhere_is_skipped() {
        let host = MemoryHost::new();
        let post = host.create_record("post");
        let rev = host.create_revision(post).unwrap();

        let fields = fields();
        let written = SnapshotWriter::new(&host, &fields, &IdentitySanitizer)
            .write(&json!({"subtitle": ""}), post, rev)
            .unwrap();

        assert_eq!(written.values.keys().collect::<Vec<_>>(), vec!["subtitle"]);
        assert_eq!(host.get_single(rev, "subtitle").unwrap(), Some(json!("")));
        assert_eq!(host.get_single(rev, "byline").unwrap(), None);

        let aggregate = host.get_single(rev, AGGREGATE_KEY).unwrap().unwrap();
        let parsed: Map<String, Value> = serde_json::from_str(aggregate.as_str().unwrap()).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["subtitle"]);
    }

    #[test]
    fn test_nothing_to_write_leaves_no_aggregate() {
        let host = MemoryHost::new();
        let post = host.create_record("post");
        let rev = host.create_revision(post).unwrap();

        let fields = fields();
        let written = SnapshotWriter::new(&host, &fields, &IdentitySanitizer)
            .write(&json!({}), post, rev)
            .unwrap();

        assert!(written.is_empty());
        assert_eq!(written.aggregate, None);
        assert!(host.attributes_of(rev).is_empty());
    }

    #[test]
    fn test_nested_source_path_and_sanitizing() {
        let host = MemoryHost::new();
        let post = host.create_record("post");
        let fields = FieldSet::new(vec![TrackedField::new("byline").with_source_path(["meta", "author"])])
            .unwrap();

        let sanitizer = MarkupSanitizer::default();
        SnapshotWriter::new(&host, &fields, &sanitizer)
            .write(
                &json!({"byline": "ignored", "meta": {"author": "<b>Jane</b><script>x</script>"}}),
                post,
                post,
            )
            .unwrap();

        assert_eq!(host.get_single(post, "byline").unwrap(), Some(json!("<b>Jane</b>")));
    }

    #[test]
    fn test_store_failure_is_surfaced() {
        let host = MemoryHost::new();
        let post = host.create_record("post");
        let rev = host.create_revision(post).unwrap();
        host.set_read_only(true);

        let fields = fields();
        let err = SnapshotWriter::new(&host, &fields, &IdentitySanitizer)
            .write(&json!({"subtitle": "New"}), post, rev)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::MetaRevError::Store(StoreError::ReadOnly { .. })
        ));
    }
}
