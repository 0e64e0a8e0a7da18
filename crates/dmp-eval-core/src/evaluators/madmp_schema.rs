//! Structural validation against the embedded maDMP 1.2 schema.
//!
//! Supports the keyword subset the schema uses: `type`, `required`,
//! `properties`, `items`, `enum`, `format` (`date-time`, `date`, `uri`,
//! `email`) and `pattern`. Messages follow the `#/json/pointer: message`
//! convention so they read the same as other JSON Schema tooling.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};

const SCHEMA_SOURCE: &str = include_str!("madmp-schema-1.2.json");

static SCHEMA: OnceLock<Result<Value, String>> = OnceLock::new();
static PATTERNS: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
static URI_RE: OnceLock<Option<Regex>> = OnceLock::new();
static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// The parsed embedded schema.
pub fn schema() -> Result<&'static Value, &'static str> {
    SCHEMA
        .get_or_init(|| serde_json::from_str(SCHEMA_SOURCE).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(String::as_str)
}

/// Every `pattern` in the schema, compiled once. Patterns that fail to
/// compile are absent and never produce violations.
fn patterns() -> &'static HashMap<&'static str, Regex> {
    PATTERNS.get_or_init(|| {
        let mut compiled = HashMap::new();
        if let Ok(schema) = schema() {
            collect_patterns(schema, &mut compiled);
        }
        compiled
    })
}

fn collect_patterns(node: &'static Value, out: &mut HashMap<&'static str, Regex>) {
    match node {
        Value::Object(map) => {
            if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
                if !out.contains_key(pattern) {
                    if let Ok(re) = Regex::new(pattern) {
                        out.insert(pattern, re);
                    }
                }
            }
            for child in map.values() {
                collect_patterns(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_patterns(child, out);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Required,
    Type,
    Enum,
    Format,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// JSON pointer of the offending location, `#` for the root.
    pub pointer: String,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, pointer: &str, detail: String) -> Self {
        Self {
            kind,
            pointer: pointer.to_string(),
            message: format!("{pointer}: {detail}"),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validate `instance` against the maDMP schema, in document order.
pub fn validate(instance: &Value) -> Result<Vec<Violation>, &'static str> {
    let schema = schema()?;
    let mut out = Vec::new();
    validate_node(schema, instance, "#", &mut out);
    Ok(out)
}

fn validate_node(schema: &Value, value: &Value, pointer: &str, out: &mut Vec<Violation>) {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            out.push(Violation::new(
                ViolationKind::Type,
                pointer,
                format!(
                    "expected type: {}, found: {}",
                    type_name(expected),
                    value_type_name(value)
                ),
            ));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            out.push(Violation::new(
                ViolationKind::Enum,
                pointer,
                format!("{} is not a valid enum value", display_scalar(value)),
            ));
        }
    }

    if let Some(text) = value.as_str() {
        if let Some(format) = schema.get("format").and_then(Value::as_str) {
            if !format_matches(format, text) {
                out.push(Violation::new(
                    ViolationKind::Format,
                    pointer,
                    format!("[{text}] is not a valid {format}"),
                ));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            if let Some(re) = patterns().get(pattern) {
                if !re.is_match(text) {
                    out.push(Violation::new(
                        ViolationKind::Pattern,
                        pointer,
                        format!("string [{text}] does not match pattern {pattern}"),
                    ));
                }
            }
        }
    }

    if let Some(object) = value.as_object() {
        validate_object(schema, object, pointer, out);
    }

    if let (Some(items), Some(elements)) = (schema.get("items"), value.as_array()) {
        for (i, element) in elements.iter().enumerate() {
            validate_node(items, element, &format!("{pointer}/{i}"), out);
        }
    }
}

fn validate_object(
    schema: &Value,
    object: &Map<String, Value>,
    pointer: &str,
    out: &mut Vec<Violation>,
) {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                out.push(Violation::new(
                    ViolationKind::Required,
                    pointer,
                    format!("required key [{key}] not found"),
                ));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, child_schema) in properties {
            if let Some(child) = object.get(key) {
                validate_node(child_schema, child, &format!("{pointer}/{key}"), out);
            }
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(schema_type: &str) -> &str {
    match schema_type {
        "object" => "JSONObject",
        "array" => "JSONArray",
        "string" => "String",
        "number" => "Number",
        "integer" => "Integer",
        "boolean" => "Boolean",
        "null" => "Null",
        other => other,
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "JSONObject",
        Value::Array(_) => "JSONArray",
        Value::String(_) => "String",
        Value::Number(n) if n.is_f64() => "Number",
        Value::Number(_) => "Integer",
        Value::Bool(_) => "Boolean",
        Value::Null => "Null",
    }
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_matches(format: &str, text: &str) -> bool {
    match format {
        "date-time" => {
            DateTime::parse_from_rfc3339(text).is_ok()
                || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        "date" => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        "uri" => matches_cached(&URI_RE, r"^[A-Za-z][A-Za-z0-9+.\-]*:\S+$", text),
        "email" => matches_cached(&EMAIL_RE, r"^[^@\s]+@[^@\s]+\.[^@\s]+$", text),
        _ => true,
    }
}

fn matches_cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map_or(true, |re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn minimal_plan() -> Value {
        json!({
            "dmp": {
                "title": "Plan",
                "language": "eng",
                "created": "2024-01-10T10:00:00Z",
                "modified": "2024-02-01T08:30:00",
                "ethical_issues_exist": "no",
                "dmp_id": {"identifier": "10.1/x", "type": "doi"},
                "contact": {
                    "name": "Ada",
                    "mbox": "ada@example.org",
                    "contact_id": {"identifier": "0000-0001", "type": "orcid"}
                },
                "dataset": [{
                    "title": "Data",
                    "personal_data": "no",
                    "sensitive_data": "unknown",
                    "dataset_id": {"identifier": "10.1/d", "type": "doi"}
                }]
            }
        })
    }

    fn messages(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.message.as_str()).collect()
    }

    #[test]
    fn embedded_schema_parses() {
        assert!(schema().is_ok());
    }

    #[test]
    fn schema_patterns_are_compiled_once() {
        let cached = patterns();
        let mut keys: Vec<&str> = cached.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["^[A-Z]{2}$", "^[A-Z]{3}$", "^[a-z]{3}$"]);
        assert!(std::ptr::eq(cached, patterns()));

        assert!(format_matches("uri", "https://example.org"));
        assert!(!format_matches("email", "ada"));
        assert!(URI_RE.get().is_some_and(Option::is_some));
        assert!(EMAIL_RE.get().is_some_and(Option::is_some));
    }

    #[test]
    fn minimal_plan_is_valid() {
        assert!(validate(&minimal_plan()).unwrap().is_empty());
    }

    #[test]
    fn missing_keys_are_reported_with_pointers() {
        let mut plan = minimal_plan();
        plan["dmp"].as_object_mut().unwrap().remove("title");
        plan["dmp"]["dataset"][0]
            .as_object_mut()
            .unwrap()
            .remove("personal_data");

        let violations = validate(&plan).unwrap();
        assert_eq!(
            messages(&violations),
            vec![
                "#/dmp: required key [title] not found",
                "#/dmp/dataset/0: required key [personal_data] not found",
            ]
        );
        assert!(violations.iter().all(|v| v.kind == ViolationKind::Required));
    }

    #[test]
    fn empty_object_misses_dmp() {
        let violations = validate(&json!({})).unwrap();
        assert_eq!(messages(&violations), vec!["#: required key [dmp] not found"]);
    }

    #[test]
    fn type_enum_format_and_pattern_violations() {
        let mut plan = minimal_plan();
        plan["dmp"]["created"] = json!("yesterday");
        plan["dmp"]["ethical_issues_exist"] = json!("perhaps");
        plan["dmp"]["language"] = json!("English");
        plan["dmp"]["dataset"][0]["title"] = json!(42);

        let violations = validate(&plan).unwrap();
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::Format));
        assert!(kinds.contains(&ViolationKind::Enum));
        assert!(kinds.contains(&ViolationKind::Pattern));
        assert!(kinds.contains(&ViolationKind::Type));
        assert!(messages(&violations).contains(&"#/dmp/created: [yesterday] is not a valid date-time"));
        assert!(messages(&violations).contains(&"#/dmp/ethical_issues_exist: perhaps is not a valid enum value"));
        assert!(messages(&violations)
            .contains(&"#/dmp/dataset/0/title: expected type: String, found: Integer"));
    }

    #[test]
    fn wrong_container_type_stops_descent() {
        let mut plan = minimal_plan();
        plan["dmp"]["dataset"] = json!({"title": 1});
        let violations = validate(&plan).unwrap();
        assert_eq!(
            messages(&violations),
            vec!["#/dmp/dataset: expected type: JSONArray, found: JSONObject"]
        );
    }
}
