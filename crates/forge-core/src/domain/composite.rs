//! Shape of composite engine specs (`builders`, `runners`).
//!
//! The same parser drives execution and validation, so a spec that
//! validates is exactly a spec that can be run.

use std::collections::HashMap;

use forge_engine::spec::{field_path, SpecReader};
use forge_engine::JsonMap;
use serde_json::Value;

use super::task::TaskSpec;
use super::validation::ValidationError;

/// Static description of one composite engine's spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeShape {
    /// Key holding the child list.
    pub list_field: &'static str,
    /// Noun used in "must contain at least one ..." messages.
    pub item_label: &'static str,
    /// Optional key naming the child whose result is primary.
    pub primary_field: Option<&'static str>,
    /// Children must carry a non-empty name.
    pub name_required: bool,
}

pub const PARALLEL_BUILDER: CompositeShape = CompositeShape {
    list_field: "builders",
    item_label: "builder",
    primary_field: None,
    name_required: false,
};

pub const PARALLEL_TEST_RUNNER: CompositeShape = CompositeShape {
    list_field: "runners",
    item_label: "runner",
    primary_field: Some("primaryCoverageRunner"),
    name_required: true,
};

impl CompositeShape {
    /// `spec.<list_field>`
    pub fn list_path(&self) -> String {
        field_path("spec", self.list_field)
    }

    /// `spec.<list_field>[index]`
    pub fn item_path(&self, index: usize) -> String {
        format!("{}[{index}]", self.list_path())
    }

    /// Path segments locating child `index`, for nesting child errors.
    pub fn child_path(&self, index: usize) -> Vec<String> {
        vec![
            "spec".to_string(),
            self.list_field.to_string(),
            format!("[{index}]"),
        ]
    }
}

/// A parsed composite spec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeSpec {
    pub children: Vec<TaskSpec>,
    pub primary: Option<String>,
}

impl CompositeSpec {
    /// Structural check. Every malformed element is reported, not just the
    /// first.
    pub fn parse(spec: &JsonMap, shape: &CompositeShape) -> Result<Self, Vec<ValidationError>> {
        let reader = SpecReader::new(spec, "spec");
        let mut errors = Vec::new();

        let primary = match shape.primary_field {
            Some(key) => reader.string(key).unwrap_or_else(|err| {
                errors.push(err.into());
                None
            }),
            None => None,
        };

        let items = match reader.raw(shape.list_field) {
            None => {
                errors.push(ValidationError::new(shape.list_path(), "required field is missing"));
                return Err(errors);
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                errors.push(ValidationError::new(shape.list_path(), "must be a list"));
                return Err(errors);
            }
        };

        if items.is_empty() {
            errors.push(ValidationError::new(
                shape.list_path(),
                format!("must contain at least one {}", shape.item_label),
            ));
            return Err(errors);
        }

        let mut children = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match parse_child(item, index, shape) {
                Ok(child) => children.push(child),
                Err(mut child_errors) => errors.append(&mut child_errors),
            }
        }

        if errors.is_empty() {
            Ok(Self { children, primary })
        } else {
            Err(errors)
        }
    }

    /// Cross-field constraints: the primary must name a child, and child
    /// names must be unique. Duplicates are reported at the later index.
    pub fn semantic_errors(&self, shape: &CompositeShape) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let (Some(key), Some(primary)) = (shape.primary_field, &self.primary) {
            if !primary.is_empty() && !self.children.iter().any(|c| &c.name == primary) {
                errors.push(ValidationError::new(
                    field_path("spec", key),
                    format!("{} {primary:?} does not match any {}", key, shape.item_label),
                ));
            }
        }

        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        for (index, child) in self.children.iter().enumerate() {
            if child.name.is_empty() {
                continue;
            }
            match first_seen.get(child.name.as_str()) {
                Some(first) => errors.push(ValidationError::new(
                    format!("{}.name", shape.item_path(index)),
                    format!(
                        "duplicate {} name {:?} (first declared at {})",
                        shape.item_label,
                        child.name,
                        shape.item_path(*first)
                    ),
                )),
                None => {
                    first_seen.insert(child.name.as_str(), index);
                }
            }
        }

        errors
    }
}

fn parse_child(item: &Value, index: usize, shape: &CompositeShape) -> Result<TaskSpec, Vec<ValidationError>> {
    let path = shape.item_path(index);
    let Value::Object(map) = item else {
        return Err(vec![ValidationError::new(path, "must be an object")]);
    };

    let reader = SpecReader::new(map, &path);
    let mut errors = Vec::new();

    let name = reader.string("name").unwrap_or_else(|err| {
        errors.push(err.into());
        None
    });
    if shape.name_required && name.as_deref().map_or(true, str::is_empty) && errors.is_empty() {
        errors.push(ValidationError::new(reader.path("name"), "required field is missing"));
    }

    let engine = match reader.required_string("engine") {
        Ok(engine) if engine.is_empty() => {
            errors.push(ValidationError::new(reader.path("engine"), "must not be empty"));
            None
        }
        Ok(engine) => Some(engine),
        Err(err) => {
            errors.push(err.into());
            None
        }
    };

    let spec = reader.object("spec").unwrap_or_else(|err| {
        errors.push(err.into());
        None
    });

    match engine {
        Some(engine) if errors.is_empty() => Ok(TaskSpec::new(name.unwrap_or_default(), engine)
            .with_spec(spec.cloned().unwrap_or_default())),
        _ => Err(errors),
    }
}
