//! Recursive `config-validate` for composite engines.
//!
//! Structural check, then semantic check, then one `config-validate` call per
//! child, then merge. A local error stops before any child is called.

use forge_engine::{AliasTable, ToolInvocation, ToolResult, TOOL_CONFIG_VALIDATE};
use futures::future::join_all;
use tracing::{debug, instrument};

use crate::dispatch::Dispatcher;
use crate::domain::composite::{CompositeShape, CompositeSpec, PARALLEL_BUILDER, PARALLEL_TEST_RUNNER};
use crate::domain::task::TaskSpec;
use crate::domain::validation::{
    merge_results, ChildContext, ConfigValidateInput, ConfigValidateOutput, ValidationError,
    ValidationResult, ValidationWarning,
};
use crate::obs;

#[derive(Debug, Clone)]
pub struct RecursiveValidator {
    dispatcher: Dispatcher,
    shape: CompositeShape,
}

impl RecursiveValidator {
    pub fn new(dispatcher: Dispatcher, shape: CompositeShape) -> Self {
        Self { dispatcher, shape }
    }

    /// Validator for `builders` specs.
    pub fn builders(dispatcher: Dispatcher) -> Self {
        Self::new(dispatcher, PARALLEL_BUILDER)
    }

    /// Validator for `runners` specs.
    pub fn test_runners(dispatcher: Dispatcher) -> Self {
        Self::new(dispatcher, PARALLEL_TEST_RUNNER)
    }

    pub fn shape(&self) -> &CompositeShape {
        &self.shape
    }

    #[instrument(skip(self, input), fields(spec_name = %input.spec_name, list = self.shape.list_field))]
    pub async fn validate(&self, input: &ConfigValidateInput) -> ConfigValidateOutput {
        let output = self.validate_inner(input).await;
        obs::emit_validation_finished(
            &input.spec_name,
            output.valid,
            output.errors.len(),
            output.warnings.len(),
        );
        output
    }

    async fn validate_inner(&self, input: &ConfigValidateInput) -> ConfigValidateOutput {
        let composite = match CompositeSpec::parse(&input.spec, &self.shape) {
            Ok(composite) => composite,
            Err(errors) => return ConfigValidateOutput::from_errors(errors),
        };

        let semantic = composite.semantic_errors(&self.shape);
        if !semantic.is_empty() {
            return ConfigValidateOutput::from_errors(semantic);
        }

        let dispatcher = match &input.forge_spec {
            Some(forge_spec) => match AliasTable::from_forge_spec(forge_spec) {
                Ok(table) if table.is_empty() => self.dispatcher.clone(),
                Ok(table) => self.dispatcher.with_aliases(table),
                Err(err) => {
                    let mut error = ValidationError::from(err);
                    error.field = format!("forgeSpec.{}", error.field);
                    return ConfigValidateOutput::from_errors(vec![error]);
                }
            },
            None => self.dispatcher.clone(),
        };

        let checks = composite
            .children
            .iter()
            .enumerate()
            .map(|(index, child)| self.validate_child(&dispatcher, input, index, child));
        let results = join_all(checks).await;

        merge_results(Vec::new(), results)
    }

    async fn validate_child(
        &self,
        dispatcher: &Dispatcher,
        parent: &ConfigValidateInput,
        index: usize,
        child: &TaskSpec,
    ) -> ValidationResult {
        let context = ChildContext {
            name: child.name.clone(),
            uri: child.engine_reference.clone(),
            spec_type: parent.spec_type.clone(),
            spec_name: child_spec_name(&parent.spec_name, self.shape.list_field, index),
            path: self.shape.child_path(index),
        };
        let input = ConfigValidateInput {
            spec: child.spec.clone(),
            forge_spec: parent.forge_spec.clone(),
            config_path: parent.config_path.clone(),
            spec_type: context.spec_type.clone(),
            spec_name: context.spec_name.clone(),
        };

        debug!(child = %context.spec_name, engine = %context.uri, "validating child");
        let output = match ToolInvocation::from_args(TOOL_CONFIG_VALIDATE, &input) {
            Ok(invocation) => match dispatcher.call_one(&context.uri, &invocation).await {
                Ok(result) => child_output(&context, result),
                Err(err) => ConfigValidateOutput::infra(err.to_string()),
            },
            Err(err) => ConfigValidateOutput::infra(err.to_string()),
        };

        ValidationResult { context, output }
    }
}

/// `{parent}.{list}[{index}]`, or `{list}[{index}]` at the root.
pub fn child_spec_name(parent: &str, list_field: &str, index: usize) -> String {
    if parent.is_empty() {
        format!("{list_field}[{index}]")
    } else {
        format!("{parent}.{list_field}[{index}]")
    }
}

fn child_output(context: &ChildContext, result: ToolResult) -> ConfigValidateOutput {
    match result.decode::<ConfigValidateOutput>(&context.uri, "validation result") {
        Ok(Some(output)) if result.is_error && output.errors.is_empty() && output.infra_error.is_empty() => {
            ConfigValidateOutput::infra(result.text_summary)
        }
        Ok(Some(output)) => output,
        Ok(None) if result.is_error => ConfigValidateOutput::infra(result.text_summary),
        Ok(None) => {
            let mut output = ConfigValidateOutput::valid();
            output.warnings.push(ValidationWarning::new(
                None,
                format!(
                    "{} ({}) returned no validation result; assuming valid",
                    context.location(),
                    context.uri
                ),
            ));
            output
        }
        Err(err) => ConfigValidateOutput::infra(err.to_string()),
    }
}
