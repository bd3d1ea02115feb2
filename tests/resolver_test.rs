#![allow(missing_docs)]

use serde_json::{json, Value};
use tempfile::TempDir;

use flowctl::flow::lint::Severity;
use flowctl::{lint, resolve, FlowDocument, ResolveError, Submission};

const ORDER_FLOW: &str = r#"{
    "flowId": "f-orders",
    "displayName": "Orders",
    "description": "Routes incoming orders",
    "name": "orders",
    "variables": {"region": "eu"},
    "trigger": {
        "name": "on_order",
        "type": "EVENT",
        "displayName": "New order",
        "settings": {"event": "order.created"},
        "nextAction": "check_total"
    },
    "actions": [
        {
            "name": "notify",
            "type": "CODE",
            "displayName": "Notify",
            "settings": {"artifact": "notify.zip"}
        },
        {
            "name": "check_total",
            "type": "CONDITION",
            "settings": {
                "mode": "first",
                "branches": [
                    {"conditions": [{"lhs": "total", "op": ">", "rhs": 100}], "nextAction": "big_order"},
                    {"conditions": [], "nextAction": "small_order"}
                ]
            },
            "commonAction": "notify"
        },
        {"name": "big_order", "type": "CODE", "nextAction": "notify"},
        {"name": "small_order", "type": "CODE", "input": {"discount": 0}}
    ]
}"#;

fn order_flow() -> FlowDocument {
    FlowDocument::parse(ORDER_FLOW).unwrap()
}

fn resolved_json(flow: &FlowDocument) -> Value {
    serde_json::to_value(resolve(flow).unwrap()).unwrap()
}

/// Collect every value stored under a reference field anywhere in the tree.
fn reference_values(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if matches!(
                    key.as_str(),
                    "nextAction" | "onSuccessAction" | "onFailureAction" | "commonAction"
                ) {
                    out.push(child.clone());
                }
                reference_values(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                reference_values(item, out);
            }
        }
        _ => {}
    }
}

#[test]
fn test_concrete_scenario() {
    let flow = FlowDocument::parse(
        r#"{
            "trigger": {"type": "EVENT", "nextAction": "step1"},
            "actions": [{"name": "step1", "type": "CODE", "settings": {"input": {"a": 1}}}]
        }"#,
    )
    .unwrap();

    assert_eq!(
        resolved_json(&flow),
        json!({
            "trigger": {
                "type": "EVENT",
                "nextAction": {"name": "step1", "type": "CODE", "settings": {"input": {"a": 1}}}
            }
        })
    );
}

#[test]
fn test_branch_scenario_preserves_order() {
    let value = resolved_json(&order_flow());
    let check = &value["trigger"]["nextAction"];
    assert_eq!(check["name"], "check_total");

    let branches = check["settings"]["branches"].as_array().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0]["nextAction"]["name"], "big_order");
    assert_eq!(branches[1]["nextAction"]["name"], "small_order");
    assert_eq!(branches[0]["conditions"][0]["op"], ">");
    assert_eq!(check["settings"]["mode"], "first");
}

#[test]
fn test_every_reference_is_embedded() {
    let value = resolved_json(&order_flow());

    let mut references = Vec::new();
    reference_values(&value, &mut references);

    assert!(!references.is_empty());
    for reference in &references {
        assert!(reference.is_object(), "dangling reference: {reference}");
    }
}

#[test]
fn test_shared_action_is_embedded_at_each_reference() {
    let value = resolved_json(&order_flow());
    let check = &value["trigger"]["nextAction"];

    let via_common = &check["commonAction"];
    let via_big_order = &check["settings"]["branches"][0]["nextAction"]["nextAction"];
    assert_eq!(via_common["name"], "notify");
    assert_eq!(via_common, via_big_order);
}

#[test]
fn test_metadata_and_payload_pass_through() {
    let value = resolved_json(&order_flow());

    assert_eq!(value["displayName"], "Orders");
    assert_eq!(value["description"], "Routes incoming orders");
    assert_eq!(value["name"], "orders");
    assert_eq!(value["variables"], json!({"region": "eu"}));
    assert!(value.get("actions").is_none());
    assert!(value.get("flowId").is_none());

    let trigger = &value["trigger"];
    assert_eq!(trigger["name"], "on_order");
    assert_eq!(trigger["displayName"], "New order");
    assert_eq!(trigger["settings"], json!({"event": "order.created"}));

    let small = &trigger["nextAction"]["settings"]["branches"][1]["nextAction"];
    assert_eq!(small["input"], json!({"discount": 0}));
}

#[test]
fn test_resolution_is_repeatable_and_leaves_input_untouched() {
    let flow = order_flow();
    let before = flow.clone();

    let first = resolve(&flow).unwrap();
    let second = resolve(&flow).unwrap();

    assert_eq!(first, second);
    assert_eq!(flow, before);
}

#[test]
fn test_document_order_of_actions_does_not_matter() {
    let flow = order_flow();
    let mut reversed = flow.clone();
    reversed.actions.reverse();

    assert_eq!(resolve(&flow).unwrap(), resolve(&reversed).unwrap());
}

#[test]
fn test_rejections() {
    let missing_trigger = FlowDocument::parse(r#"{"name": "f", "actions": []}"#).unwrap();
    assert!(matches!(
        resolve(&missing_trigger),
        Err(ResolveError::MissingTrigger { .. })
    ));

    let mut duplicate = order_flow();
    duplicate.actions.push(duplicate.actions[0].clone());
    assert_eq!(
        resolve(&duplicate).unwrap_err(),
        ResolveError::DuplicateActionName {
            flow: "orders".to_string(),
            name: "notify".to_string(),
        }
    );

    let mut dangling = order_flow();
    dangling.actions.retain(|a| a.name.as_deref() != Some("small_order"));
    assert_eq!(
        resolve(&dangling).unwrap_err(),
        ResolveError::UnresolvedReference {
            node: "check_total".to_string(),
            field: "settings.branches[1].nextAction".to_string(),
            target: "small_order".to_string(),
        }
    );

    let mut cyclic = order_flow();
    for action in &mut cyclic.actions {
        if action.name.as_deref() == Some("notify") {
            action.next_action = Some("check_total".to_string());
        }
    }
    match resolve(&cyclic).unwrap_err() {
        ResolveError::CyclicReference { chain } => {
            assert_eq!(chain.first(), chain.last());
            assert!(chain.contains(&"notify".to_string()));
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_load_from_file_and_submit() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("flow.json");
    std::fs::write(&path, ORDER_FLOW).unwrap();

    let flow = FlowDocument::from_path(&path).unwrap();
    assert_eq!(flow.flow_id.as_deref(), Some("f-orders"));

    let submission = Submission::prepare(&flow, vec![]).unwrap();
    let sent: Value = serde_json::from_str(&submission.flow_json).unwrap();
    assert_eq!(sent, resolved_json(&flow));
}

#[test]
fn test_missing_file_reports_path() {
    let temp_dir = TempDir::new().unwrap();
    let err = FlowDocument::from_path(temp_dir.path().join("flow.json")).unwrap_err();
    assert!(err.to_string().contains("flow.json"), "got: {err}");
}

#[test]
fn test_lint_flags_unreachable_action_that_still_resolves() {
    let mut flow = order_flow();
    flow.actions.push(
        serde_json::from_value(json!({"name": "orphan", "type": "CODE"})).unwrap(),
    );

    assert!(resolve(&flow).is_ok());

    let report = lint(&flow);
    assert_eq!(report.count(Severity::Warning), 1);
    assert!(report.findings[0].message.contains("orphan"));
}
