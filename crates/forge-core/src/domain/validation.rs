//! `config-validate` payloads and the merge of child validation results.
//!
//! Paths are structured (`Vec<String>`) end to end; they are only joined
//! for display by [`ValidationError::full_path`].

use std::fmt;

use forge_engine::{FieldError, JsonMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input of the `config-validate` tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValidateInput {
    #[serde(default)]
    pub spec: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge_spec: Option<Value>,
    #[serde(default)]
    pub config_path: String,
    #[serde(default)]
    pub spec_type: String,
    #[serde(default)]
    pub spec_name: String,
}

/// One validation problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub engine: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_name: String,
    /// Containment chain from the validation root down to `field`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Path and field joined for display, e.g. `spec.runners[0].spec.src`.
    pub fn full_path(&self) -> String {
        join_path(&self.path, &self.field)
    }

    /// Fill origin fields from `context`, keeping whatever the child set.
    /// Applies to `nested` errors as well.
    pub fn stamp(&mut self, context: &ChildContext) {
        if self.engine.is_empty() {
            self.engine = context.uri.clone();
        }
        if self.spec_type.is_empty() {
            self.spec_type = context.spec_type.clone();
        }
        if self.spec_name.is_empty() {
            self.spec_name = context.spec_name.clone();
        }
        for nested in &mut self.nested {
            nested.stamp(context);
        }
    }

    /// Prefix this error's path, and every nested error's path, with `outer`.
    pub fn nest_under(&mut self, outer: &[String]) {
        let mut path = outer.to_vec();
        path.append(&mut self.path);
        self.path = path;
        for nested in &mut self.nested {
            nested.nest_under(outer);
        }
    }
}

impl From<FieldError> for ValidationError {
    fn from(err: FieldError) -> Self {
        Self::new(err.field, err.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.full_path(), self.message)?;
        if !self.engine.is_empty() {
            write!(f, " (engine {})", self.engine)?;
        }
        Ok(())
    }
}

/// Advisory note; never affects validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(field: Option<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Output of the `config-validate` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValidateOutput {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub warnings: Vec<ValidationWarning>,
    /// Set when validation could not be carried out at all.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub infra_error: String,
}

impl ConfigValidateOutput {
    pub fn valid() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            ..Default::default()
        }
    }

    pub fn infra(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            infra_error: message.into(),
            ..Default::default()
        }
    }

    /// Enforce `valid == false` whenever errors or an infra error exist.
    pub fn normalized(mut self) -> Self {
        self.valid = self.valid && self.errors.is_empty() && self.infra_error.is_empty();
        self
    }
}

/// Where a child sits and how its errors should be attributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildContext {
    pub name: String,
    pub uri: String,
    pub spec_type: String,
    pub spec_name: String,
    /// Location of the child entry inside the parent spec.
    pub path: Vec<String>,
}

impl ChildContext {
    pub fn location(&self) -> String {
        join_path(&self.path, "")
    }
}

/// One child's answer, paired with its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub context: ChildContext,
    pub output: ConfigValidateOutput,
}

/// Merge local errors with child results.
///
/// Local errors come first. Child errors are stamped with the child's
/// origin (when unset) and nested under the child's path. Warnings are
/// concatenated regardless of validity.
pub fn merge_results(local: Vec<ValidationError>, results: Vec<ValidationResult>) -> ConfigValidateOutput {
    let mut errors = local;
    let mut warnings = Vec::new();
    let mut infra = Vec::new();
    let mut children_valid = true;

    for ValidationResult { context, output } in results {
        let output = output.normalized();
        children_valid &= output.valid;

        if !output.infra_error.is_empty() {
            infra.push(format!(
                "{} ({}): {}",
                context.location(),
                context.uri,
                output.infra_error
            ));
        }

        for mut error in output.errors {
            error.stamp(&context);
            error.nest_under(&context.path);
            errors.push(error);
        }

        for mut warning in output.warnings {
            warning.field = warning.field.map(|f| join_path(&context.path, &f));
            warnings.push(warning);
        }
    }

    ConfigValidateOutput {
        valid: errors.is_empty() && infra.is_empty() && children_valid,
        errors,
        warnings,
        infra_error: infra.join("; "),
    }
}

/// Join path segments and a field.
///
/// Index segments (`[2]`) attach to the previous segment. When the path
/// already ends in `spec`, a leading `spec.` on the field is dropped. Engines
/// that report `path: ["spec"]` next to `field: "spec.src"` hit this case.
pub fn join_path(path: &[String], field: &str) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(path.len() + 1);
    for segment in path {
        match segments.last_mut() {
            Some(last) if segment.starts_with('[') => last.push_str(segment),
            _ => segments.push(segment.clone()),
        }
    }

    let field = match segments.last() {
        Some(last) if last == "spec" => field.strip_prefix("spec.").unwrap_or(field),
        _ => field,
    };
    if !field.is_empty() {
        segments.push(field.to_string());
    }
    segments.join(".")
}
