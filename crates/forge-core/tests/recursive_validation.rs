//! Recursive config validation against an in-process fake engine.

use std::sync::Arc;

use forge_core::fakes::{FakeEngine, FakeReply};
use forge_core::{ConfigValidateInput, Dispatcher, RecursiveValidator};
use forge_engine::{EngineLocator, EngineResolver, JsonMap, TOOL_CONFIG_VALIDATE};
use serde_json::{json, Value};

fn validator(fake: Arc<FakeEngine>) -> RecursiveValidator {
    let resolver = EngineResolver::new("v0.3.1", EngineLocator::default());
    RecursiveValidator::test_runners(Dispatcher::new(resolver, fake))
}

fn input(spec: Value) -> ConfigValidateInput {
    let spec: JsonMap = match spec {
        Value::Object(map) => map,
        other => panic!("spec must be an object, got {other}"),
    };
    ConfigValidateInput {
        spec,
        forge_spec: None,
        config_path: "forge.yaml".to_string(),
        spec_type: "test".to_string(),
        spec_name: "ci".to_string(),
    }
}

fn valid() -> FakeReply {
    FakeReply::payload(json!({"valid": true, "errors": [], "warnings": []}))
}

#[tokio::test]
async fn test_missing_runners_is_one_error_and_no_calls() {
    let fake = Arc::new(FakeEngine::new());
    let output = validator(fake.clone()).validate(&input(json!({}))).await;

    assert!(!output.valid);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].full_path(), "spec.runners");
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_duplicate_name_reported_at_later_index_either_order() {
    for (first, second) in [("go://go-test", "go://go-lint"), ("go://go-lint", "go://go-test")] {
        let fake = Arc::new(FakeEngine::new());
        let spec = json!({
            "runners": [
                {"name": "unit", "engine": first},
                {"name": "other", "engine": "go://go-test"},
                {"name": "unit", "engine": second}
            ]
        });
        let output = validator(fake.clone()).validate(&input(spec)).await;

        assert!(!output.valid);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].field, "spec.runners[2].name");
        assert_eq!(fake.call_count(), 0);
    }
}

#[tokio::test]
async fn test_every_malformed_element_reported() {
    let fake = Arc::new(FakeEngine::new());
    let spec = json!({"runners": [1, {"name": "ok", "engine": "go://go-test"}, "x"]});
    let output = validator(fake.clone()).validate(&input(spec)).await;

    let paths: Vec<String> = output.errors.iter().map(|e| e.full_path()).collect();
    assert_eq!(paths, vec!["spec.runners[0]", "spec.runners[2]"]);
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_child_errors_are_nested_and_stamped() {
    let fake = Arc::new(
        FakeEngine::new()
            .with_reply("go://go-test", valid())
            .with_reply(
                "go://go-lint",
                FakeReply::payload(json!({
                    "valid": false,
                    "errors": [{"field": "spec.linters", "message": "must be a list of strings"}]
                })),
            ),
    );
    let spec = json!({
        "runners": [
            {"name": "unit", "engine": "go://go-test", "spec": {"packages": ["./..."]}},
            {"name": "lint", "engine": "go://go-lint", "spec": {"linters": "all"}}
        ],
        "primaryCoverageRunner": "unit"
    });
    let output = validator(fake.clone()).validate(&input(spec)).await;

    assert!(!output.valid);
    assert_eq!(output.errors.len(), 1);
    let err = &output.errors[0];
    assert_eq!(err.full_path(), "spec.runners[1].spec.linters");
    assert_eq!(err.engine, "go://go-lint");
    assert_eq!(err.spec_type, "test");
    assert_eq!(err.spec_name, "ci.runners[1]");
    assert_eq!(fake.call_count(), 2);
}

#[tokio::test]
async fn test_child_receives_context() {
    let fake = Arc::new(FakeEngine::new().with_tool_reply("go://go-test", TOOL_CONFIG_VALIDATE, valid()));
    let spec = json!({"runners": [{"name": "unit", "engine": "go://go-test", "spec": {"race": true}}]});
    let output = validator(fake.clone()).validate(&input(spec)).await;

    assert!(output.valid);
    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool, "config-validate");
    assert_eq!(calls[0].arguments["spec"], json!({"race": true}));
    assert_eq!(calls[0].arguments["configPath"], json!("forge.yaml"));
    assert_eq!(calls[0].arguments["specType"], json!("test"));
    assert_eq!(calls[0].arguments["specName"], json!("ci.runners[0]"));
}

#[tokio::test]
async fn test_nested_composite_keeps_deepest_origin() {
    let fake = Arc::new(
        FakeEngine::new()
            .with_reply("go://go-test", valid())
            .with_reply(
                "go://parallel-test-runner",
                FakeReply::payload(json!({
                    "valid": false,
                    "errors": [{
                        "field": "spec.packages",
                        "message": "must be a list of strings",
                        "engine": "go://go-test",
                        "specName": "ci.runners[1].runners[0]",
                        "path": ["spec", "runners", "[0]"]
                    }]
                })),
            ),
    );
    let spec = json!({
        "runners": [
            {"name": "unit", "engine": "go://go-test"},
            {"name": "group", "engine": "go://parallel-test-runner", "spec": {"runners": []}}
        ]
    });
    let output = validator(fake).validate(&input(spec)).await;

    assert!(!output.valid);
    let err = &output.errors[0];
    assert_eq!(err.full_path(), "spec.runners[1].spec.runners[0].spec.packages");
    assert_eq!(err.engine, "go://go-test");
    assert_eq!(err.spec_name, "ci.runners[1].runners[0]");
    assert_eq!(err.spec_type, "test");
}

#[tokio::test]
async fn test_unreachable_child_is_infra_error() {
    let fake = Arc::new(
        FakeEngine::new()
            .with_reply("go://go-test", valid())
            .with_reply("go://broken", FakeReply::ConnectionError("process exited".to_string())),
    );
    let spec = json!({
        "runners": [
            {"name": "unit", "engine": "go://go-test"},
            {"name": "broken", "engine": "go://broken"}
        ]
    });
    let output = validator(fake.clone()).validate(&input(spec)).await;

    assert!(!output.valid);
    assert!(output.errors.is_empty());
    assert!(output.infra_error.starts_with("spec.runners[1] (go://broken)"), "{}", output.infra_error);
    assert_eq!(fake.call_count(), 2);
}

#[tokio::test]
async fn test_alias_resolved_from_forge_spec() {
    let fake = Arc::new(FakeEngine::new().with_reply("go://go-test", valid()));
    let mut request = input(json!({"runners": [{"name": "unit", "engine": "alias://unit-tests"}]}));
    request.forge_spec = Some(json!({"engines": [{"alias": "unit-tests", "uri": "go://go-test"}]}));

    let output = validator(fake.clone()).validate(&request).await;

    assert!(output.valid, "{output:?}");
    assert_eq!(fake.calls_to("go://go-test"), 1);
    assert_eq!(fake.calls()[0].uri, "alias://unit-tests");
}

#[tokio::test]
async fn test_alias_without_config_is_infra_error() {
    let fake = Arc::new(FakeEngine::new());
    let output = validator(fake.clone())
        .validate(&input(json!({"runners": [{"name": "unit", "engine": "alias://unit-tests"}]})))
        .await;

    assert!(!output.valid);
    assert!(output.infra_error.contains("requires configuration-level resolution"));
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_child_without_payload_warns() {
    let fake = Arc::new(FakeEngine::new().with_reply("go://go-test", FakeReply::empty()));
    let output = validator(fake)
        .validate(&input(json!({"runners": [{"name": "unit", "engine": "go://go-test"}]})))
        .await;

    assert!(output.valid);
    assert_eq!(output.warnings.len(), 1);
}
