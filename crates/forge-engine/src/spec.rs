//! Typed extraction from loosely-typed engine spec payloads.
//!
//! Engine configuration arrives as an untyped JSON object. Each helper reads
//! one value and either returns it or a [`FieldError`] carrying the full
//! field path, so callers can collect errors instead of stopping at the
//! first one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object as carried in tool arguments.
pub type JsonMap = Map<String, Value>;

/// A field-level problem in a spec payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required field is missing")
    }

    pub fn wrong_type(field: impl Into<String>, expected: &str) -> Self {
        Self::new(field, format!("must be a {expected}"))
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// `prefix.key`, or just `key` at the root.
pub fn field_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

pub fn as_string(value: &Value, field: &str) -> Result<String, FieldError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FieldError::wrong_type(field, "string"))
}

pub fn as_bool(value: &Value, field: &str) -> Result<bool, FieldError> {
    value
        .as_bool()
        .ok_or_else(|| FieldError::wrong_type(field, "boolean"))
}

pub fn as_int(value: &Value, field: &str) -> Result<i64, FieldError> {
    value
        .as_i64()
        .ok_or_else(|| FieldError::wrong_type(field, "integer"))
}

pub fn as_string_list(value: &Value, field: &str) -> Result<Vec<String>, FieldError> {
    let items = value
        .as_array()
        .ok_or_else(|| FieldError::wrong_type(field, "list of strings"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| as_string(item, &format!("{field}[{i}]")))
        .collect()
}

pub fn as_string_map(value: &Value, field: &str) -> Result<BTreeMap<String, String>, FieldError> {
    let obj = value
        .as_object()
        .ok_or_else(|| FieldError::wrong_type(field, "map of strings"))?;
    obj.iter()
        .map(|(k, v)| Ok((k.clone(), as_string(v, &field_path(field, k))?)))
        .collect()
}

pub fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a JsonMap, FieldError> {
    value
        .as_object()
        .ok_or_else(|| FieldError::wrong_type(field, "object"))
}

/// Reads keys from one object, qualifying errors with the object's path.
#[derive(Debug, Clone, Copy)]
pub struct SpecReader<'a> {
    map: &'a JsonMap,
    prefix: &'a str,
}

impl<'a> SpecReader<'a> {
    pub fn new(map: &'a JsonMap, prefix: &'a str) -> Self {
        Self { map, prefix }
    }

    pub fn path(&self, key: &str) -> String {
        field_path(self.prefix, key)
    }

    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn string(&self, key: &str) -> Result<Option<String>, FieldError> {
        self.raw(key)
            .map(|v| as_string(v, &self.path(key)))
            .transpose()
    }

    pub fn required_string(&self, key: &str) -> Result<String, FieldError> {
        self.string(key)?
            .ok_or_else(|| FieldError::missing(self.path(key)))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, FieldError> {
        self.raw(key).map(|v| as_bool(v, &self.path(key))).transpose()
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, FieldError> {
        self.raw(key).map(|v| as_int(v, &self.path(key))).transpose()
    }

    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, FieldError> {
        self.raw(key)
            .map(|v| as_string_list(v, &self.path(key)))
            .transpose()
    }

    pub fn string_map(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, FieldError> {
        self.raw(key)
            .map(|v| as_string_map(v, &self.path(key)))
            .transpose()
    }

    pub fn object(&self, key: &str) -> Result<Option<&'a JsonMap>, FieldError> {
        let path = self.path(key);
        self.raw(key).map(|v| as_object(v, &path)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_reader_reads_typed_values() {
        let map = obj(json!({
            "name": "unit",
            "parallel": true,
            "retries": 3,
            "tags": ["a", "b"],
            "env": {"CGO_ENABLED": "0"}
        }));
        let reader = SpecReader::new(&map, "spec");

        assert_eq!(reader.string("name").unwrap(), Some("unit".to_string()));
        assert_eq!(reader.bool("parallel").unwrap(), Some(true));
        assert_eq!(reader.int("retries").unwrap(), Some(3));
        assert_eq!(
            reader.string_list("tags").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            reader.string_map("env").unwrap().unwrap().get("CGO_ENABLED"),
            Some(&"0".to_string())
        );
        assert_eq!(reader.string("absent").unwrap(), None);
    }

    #[test]
    fn test_wrong_type_carries_field_path() {
        let map = obj(json!({"tags": ["a", 1]}));
        let err = SpecReader::new(&map, "spec").string_list("tags").unwrap_err();
        assert_eq!(err.field, "spec.tags[1]");
        assert_eq!(err.message, "must be a string");
    }

    #[test]
    fn test_required_string_missing() {
        let map = obj(json!({"name": null}));
        let err = SpecReader::new(&map, "spec.runners[0]")
            .required_string("name")
            .unwrap_err();
        assert_eq!(err.field, "spec.runners[0].name");
        assert_eq!(err.message, "required field is missing");
    }

    #[test]
    fn test_field_path_root() {
        assert_eq!(field_path("", "spec"), "spec");
        assert_eq!(field_path("spec", "runners"), "spec.runners");
    }
}
