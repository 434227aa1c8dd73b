//! Tracked fields and field sets.
//!
//! Field declarations are normalized once, when the [`FieldSet`] is built;
//! nothing downstream branches on how a field was declared.

use crate::config::{FieldOptions, FieldSpec, SourcePath};
use crate::error::{MetaRevError, Result};
use crate::AGGREGATE_KEY;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Renders a stored value for comparison screens: `(value, key) -> text`.
pub type DisplayFn = Arc<dyn Fn(&Value, &str) -> String + Send + Sync>;

/// One versioned metadata key.
#[derive(Clone)]
pub struct TrackedField {
    pub key: String,
    /// Shown in diffs
    pub label: String,
    /// Where the value lives in an incoming write; `["foo", "bar"]` reads `payload.foo.bar`
    pub source_path: Vec<String>,
    pub display: Option<DisplayFn>,
}

impl fmt::Debug for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedField")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("source_path", &self.source_path)
            .field("display", &self.display.is_some())
            .finish()
    }
}

impl TrackedField {
    /// A field labelled with its own key, read from `payload[key]`.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            source_path: vec![key.clone()],
            key,
            display: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// An empty path falls back to `[key]`.
    pub fn with_source_path<I, T>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        self.source_path = if path.is_empty() {
            vec![self.key.clone()]
        } else {
            path
        };
        self
    }

    pub fn with_display<F>(mut self, display: F) -> Self
    where
        F: Fn(&Value, &str) -> String + Send + Sync + 'static,
    {
        self.display = Some(Arc::new(display));
        self
    }

    /// Normalize a declared [`FieldSpec`].
    pub fn from_spec(key: impl Into<String>, spec: FieldSpec) -> Self {
        let field = Self::new(key);
        match spec {
            FieldSpec::Label(label) => field.with_label(label),
            FieldSpec::Options(FieldOptions { label, source_path }) => {
                let field = match label {
                    Some(label) => field.with_label(label),
                    None => field,
                };
                match source_path {
                    Some(SourcePath::Key(k)) => field.with_source_path([k]),
                    Some(SourcePath::Path(p)) => field.with_source_path(p),
                    None => field,
                }
            }
        }
    }
}

/// The tracked fields of one record type, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: Vec<TrackedField>,
}

impl FieldSet {
    /// Rejects empty keys, duplicate keys and the reserved aggregate key.
    pub fn new(fields: Vec<TrackedField>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if field.key.is_empty() {
                return Err(MetaRevError::Config("tracked field with empty key".into()));
            }
            if field.key == AGGREGATE_KEY {
                return Err(MetaRevError::Config(format!(
                    "`{AGGREGATE_KEY}` is reserved and cannot be tracked"
                )));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(MetaRevError::Config(format!(
                    "duplicate tracked field `{}`",
                    field.key
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn from_specs<I, K>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        Self::new(
            specs
                .into_iter()
                .map(|(key, spec)| TrackedField::from_spec(key, spec))
                .collect(),
        )
    }

    /// Attach a display transform to an already declared field.
    pub fn with_display<F>(mut self, key: &str, display: F) -> Result<Self>
    where
        F: Fn(&Value, &str) -> String + Send + Sync + 'static,
    {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.key == key)
            .ok_or_else(|| MetaRevError::Config(format!("unknown tracked field `{key}`")))?;
        field.display = Some(Arc::new(display));
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&TrackedField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedField> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Walk `path` through nested objects (and arrays, by numeric index).
///
/// Returns `None` when any level is missing. An explicit `null` at the end of
/// the path is found, not missing.
pub fn resolve_path<'a>(payload: &'a Value, path: &[String]) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.iter().try_fold(payload, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
