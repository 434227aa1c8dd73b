//! Field-by-field comparison of two snapshots.

use crate::error::Result;
use crate::field::{FieldSet, TrackedField};
use crate::render::{DiffRenderer, RenderOptions};
use metarev_store::{AttributeStore, RecordId};
use serde::Serialize;
use serde_json::Value;

/// One tracked field that differs between the two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub key: String,
    pub label: String,
    /// Renderable text of the older side
    pub from: String,
    /// Renderable text of the newer side
    pub to: String,
    /// Renderer output for `from` -> `to`
    pub rendered: String,
}

/// A titled group of field diffs, as shown on a comparison screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSection {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldDiff>,
}

pub struct DiffEngine<'a, S: ?Sized> {
    store: &'a S,
    fields: &'a FieldSet,
    renderer: &'a dyn DiffRenderer,
    options: &'a RenderOptions,
}

impl<'a, S: AttributeStore + ?Sized> DiffEngine<'a, S> {
    pub fn new(
        store: &'a S,
        fields: &'a FieldSet,
        renderer: &'a dyn DiffRenderer,
        options: &'a RenderOptions,
    ) -> Self {
        Self {
            store,
            fields,
            renderer,
            options,
        }
    }

    /// Diff every tracked field, in declaration order.
    ///
    /// A missing snapshot id reads as a snapshot with nothing recorded. Fields
    /// whose two values are identical, or render to the same text, produce no
    /// entry at all.
    pub fn build(&self, from: Option<RecordId>, to: Option<RecordId>) -> Result<Vec<FieldDiff>> {
        let mut diffs = Vec::new();

        for field in self.fields.iter() {
            let old = self.read(from, &field.key)?;
            let new = self.read(to, &field.key)?;
            if identical(old.as_ref(), new.as_ref()) {
                continue;
            }

            let from_text = renderable(field, old.as_ref())?;
            let to_text = renderable(field, new.as_ref())?;
            // e.g. a recorded "" against nothing recorded
            if from_text == to_text {
                tracing::debug!(key = %field.key, "values differ but render the same; skipping");
                continue;
            }
            let rendered = self.renderer.render(&from_text, &to_text, self.options);
            diffs.push(FieldDiff {
                key: field.key.clone(),
                label: field.label.clone(),
                from: from_text,
                to: to_text,
                rendered,
            });
        }

        tracing::debug!(?from, ?to, changed = diffs.len(), "built meta diff");
        Ok(diffs)
    }

    fn read(&self, snapshot: Option<RecordId>, key: &str) -> Result<Option<Value>> {
        match snapshot {
            Some(id) => Ok(self.store.get_single(id, key)?),
            None => Ok(None),
        }
    }
}

/// Exact equality: same JSON text, object key order included.
fn identical(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.to_string() == b.to_string(),
        _ => false,
    }
}

/// Text handed to the renderer for one side of a field.
fn renderable(field: &TrackedField, value: Option<&Value>) -> Result<String> {
    if let Some(display) = &field.display {
        let empty = Value::String(String::new());
        return Ok(display(value.unwrap_or(&empty), &field.key));
    }
    Ok(match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(other) => serde_json::to_string_pretty(other)?,
    })
}
