//! Rolling a live record's tracked values back to a snapshot.
//!
//! Policy for every tracked key and the aggregate key, independently:
//!
//! - the snapshot recorded a value: the destination gets exactly that one value;
//! - the snapshot recorded nothing (not found): every destination value is deleted.
//!
//! An explicitly recorded empty value counts as "recorded" and is restored as such.

use crate::error::Result;
use crate::field::FieldSet;
use crate::AGGREGATE_KEY;
use metarev_store::{AttributeStore, RecordId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Keys set from the snapshot
    pub restored: Vec<String>,
    /// Keys the snapshot never recorded, removed from the destination
    pub deleted: Vec<String>,
}

pub struct RestoreEngine<'a, S: ?Sized> {
    store: &'a S,
    fields: &'a FieldSet,
}

impl<'a, S: AttributeStore + ?Sized> RestoreEngine<'a, S> {
    pub fn new(store: &'a S, fields: &'a FieldSet) -> Self {
        Self { store, fields }
    }

    /// Tracked keys plus the aggregate key, without duplicates.
    pub fn keys(&self) -> Vec<&'a str> {
        let fields: &'a FieldSet = self.fields;
        let mut keys: Vec<&'a str> = Vec::with_capacity(fields.len() + 1);
        for key in fields.keys().chain(std::iter::once(AGGREGATE_KEY)) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn restore(&self, destination: RecordId, source: RecordId) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();

        for key in self.keys() {
            match self.store.get_single(source, key)? {
                Some(value) => {
                    self.store.set(destination, key, value)?;
                    report.restored.push(key.to_string());
                }
                None => {
                    self.store.delete(destination, key)?;
                    report.deleted.push(key.to_string());
                }
            }
        }

        tracing::info!(
            destination,
            source,
            restored = report.restored.len(),
            deleted = report.deleted.len(),
            "restored snapshot meta"
        );
        Ok(report)
    }
}
