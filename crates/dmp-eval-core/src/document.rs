//! Immutable document model with path-based accessors.
//!
//! Paths are dotted keys with optional array steps:
//! `dmp.dataset[*].dataset_id.identifier`, `dmp.cost[0].value`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Where a document came from, as reported by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub file_name: String,
    /// Lowercase text after the last `.`; empty when there is none.
    pub extension: String,
}

impl SourceMeta {
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = match file_name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        };
        Self {
            file_name: file_name.to_string(),
            extension,
        }
    }
}

/// A submitted plan. Cheap to clone; never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Arc<Value>,
    source: Option<SourceMeta>,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
    Each,
}

impl Document {
    pub fn new(root: Value) -> Self {
        Self {
            root: Arc::new(root),
            source: None,
        }
    }

    pub fn with_source(mut self, source: SourceMeta) -> Self {
        self.source = Some(source);
        self
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn source(&self) -> Option<&SourceMeta> {
        self.source.as_ref()
    }

    /// Every value matching `pattern`, in document order.
    ///
    /// `[*]` fans out over an array; a step that does not match (missing key,
    /// index out of range, wrong type) contributes nothing.
    pub fn values_at(&self, pattern: &str) -> Vec<&Value> {
        let Some(steps) = parse_path(pattern) else {
            return Vec::new();
        };
        let mut current: Vec<&Value> = vec![&self.root];
        for step in &steps {
            let mut next = Vec::new();
            for value in current {
                match step {
                    Step::Key(k) => {
                        if let Some(v) = value.as_object().and_then(|o| o.get(k)) {
                            next.push(v);
                        }
                    }
                    Step::Index(i) => {
                        if let Some(v) = value.as_array().and_then(|a| a.get(*i)) {
                            next.push(v);
                        }
                    }
                    Step::Each => {
                        if let Some(items) = value.as_array() {
                            next.extend(items.iter());
                        }
                    }
                }
            }
            current = next;
        }
        current
    }

    /// First value at `path`, if any. `null` counts as absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.values_at(path).into_iter().find(|v| !v.is_null())
    }

    pub fn object_at(&self, path: &str) -> Option<&Map<String, Value>> {
        self.get(path)?.as_object()
    }

    pub fn array_at(&self, path: &str) -> Option<&Vec<Value>> {
        self.get(path)?.as_array()
    }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// String at `path` when it contains something besides whitespace.
    pub fn non_blank_str_at(&self, path: &str) -> Option<&str> {
        self.str_at(path).filter(|s| !s.trim().is_empty())
    }

    /// SHA-256 of the canonical (key-sorted) JSON encoding, hex encoded.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&canonical(&self.root)).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

impl From<Value> for Document {
    fn from(root: Value) -> Self {
        Document::new(root)
    }
}

/// Whether a JSON value carries content: non-null, and non-blank when a
/// string. Numbers and booleans always count.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn parse_path(pattern: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    if pattern.is_empty() {
        return Some(steps);
    }
    for segment in pattern.split('.') {
        let (key, mut rest) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            steps.push(Step::Key(key.to_string()));
        } else if rest.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let inner = rest.get(1..close)?;
            if inner == "*" {
                steps.push(Step::Each);
            } else {
                steps.push(Step::Index(inner.parse().ok()?));
            }
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    Some(steps)
}
