//! Flow lint: non-fatal checks on a flow document
//!
//! Resolution rejects documents that cannot be folded into a tree. Lint
//! catches documents that fold fine but probably do not do what the author
//! meant, such as actions that nothing links to.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;

use super::model::{FlowDocument, NodeDefinition};

/// Severity level for a lint finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Must fix
    Error,
    /// Should fix
    Warning,
    /// Suggestion
    Info,
}

/// A single lint finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Severity of the finding
    pub severity: Severity,
    /// Short code for the finding (e.g., "L001")
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Suggested fix (optional)
    pub suggestion: Option<String>,
}

/// Findings for one flow, errors first
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    /// All findings, in order of severity
    pub findings: Vec<Finding>,
}

impl LintReport {
    /// Returns true if the report has no findings at all
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of findings with the given severity
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

/// Run all lint checks on a flow document.
#[must_use]
pub fn lint(flow: &FlowDocument) -> LintReport {
    let mut findings = Vec::new();

    check_unnamed_actions(flow, &mut findings);
    check_unreachable_actions(flow, &mut findings);
    check_empty_trigger(flow, &mut findings);

    findings.sort_by_key(|f| f.severity);

    LintReport { findings }
}

/// L001: actions the trigger never reaches are dropped by resolution
fn check_unreachable_actions(flow: &FlowDocument, findings: &mut Vec<Finding>) {
    let Some(trigger) = &flow.trigger else {
        return;
    };

    let index: HashMap<&str, &NodeDefinition> = flow
        .actions
        .iter()
        .filter_map(|a| a.name.as_deref().map(|name| (name, a)))
        .collect();

    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&NodeDefinition> = VecDeque::from([trigger]);
    while let Some(node) = queue.pop_front() {
        for target in linked_names(node) {
            if let Some(&action) = index.get(target) {
                if reached.insert(target) {
                    queue.push_back(action);
                }
            }
        }
    }

    let mut first_position: HashMap<&str, usize> = HashMap::with_capacity(index.len());
    for (position, action) in flow.actions.iter().enumerate() {
        if let Some(name) = action.name.as_deref() {
            first_position.entry(name).or_insert(position);
        }
    }

    let mut unreachable: Vec<&str> = index
        .keys()
        .copied()
        .filter(|name| !reached.contains(name))
        .collect();
    // Report in document order
    unreachable.sort_by_key(|name| first_position.get(name).copied());

    for name in unreachable {
        findings.push(Finding {
            severity: Severity::Warning,
            code: "L001".to_string(),
            message: format!("Action '{name}' is not reachable from the trigger"),
            suggestion: Some(format!(
                "Link '{name}' from another action or remove it from flow.json"
            )),
        });
    }
}

/// L002: an action without a name can never be referenced
fn check_unnamed_actions(flow: &FlowDocument, findings: &mut Vec<Finding>) {
    for (position, action) in flow.actions.iter().enumerate() {
        if action.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            findings.push(Finding {
                severity: Severity::Warning,
                code: "L002".to_string(),
                message: format!("Action #{} has no name", position + 1),
                suggestion: Some("Give every action a unique `name`".to_string()),
            });
        }
    }
}

/// L003: a trigger without `nextAction` runs nothing
fn check_empty_trigger(flow: &FlowDocument, findings: &mut Vec<Finding>) {
    if let Some(trigger) = &flow.trigger {
        if trigger.next_action.is_none() {
            findings.push(Finding {
                severity: Severity::Info,
                code: "L003".to_string(),
                message: "Trigger has no nextAction; the flow does nothing".to_string(),
                suggestion: None,
            });
        }
    }
}

/// Every action name a node links to, including branch targets.
///
/// Tolerates malformed nodes: lint runs on documents that may not resolve.
fn linked_names(node: &NodeDefinition) -> Vec<&str> {
    let mut names: Vec<&str> = [
        &node.next_action,
        &node.on_success_action,
        &node.on_failure_action,
        &node.common_action,
    ]
    .into_iter()
    .filter_map(|field| field.as_deref())
    .collect();

    if let Some(branches) = node
        .settings
        .as_ref()
        .and_then(|s| s.get("branches"))
        .and_then(Value::as_array)
    {
        names.extend(
            branches
                .iter()
                .filter_map(|b| b.get("nextAction"))
                .filter_map(Value::as_str),
        );
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flow(value: &Value) -> FlowDocument {
        serde_json::from_value(value.clone()).unwrap()
    }

    #[test]
    fn test_clean_flow() {
        let report = lint(&flow(&json!({
            "trigger": {"type": "EVENT", "nextAction": "a"},
            "actions": [{"name": "a", "type": "CODE"}]
        })));
        assert!(report.is_clean());
    }

    #[test]
    fn test_unreachable_action() {
        let report = lint(&flow(&json!({
            "trigger": {"type": "EVENT", "nextAction": "a"},
            "actions": [
                {"name": "a", "type": "CODE"},
                {"name": "orphan", "type": "CODE"},
                {"name": "orphan2", "type": "CODE"}
            ]
        })));

        assert_eq!(report.count(Severity::Warning), 2);
        assert_eq!(report.findings[0].code, "L001");
        assert!(report.findings[0].message.contains("'orphan'"));
        assert!(report.findings[1].message.contains("'orphan2'"));
    }

    #[test]
    fn test_many_unreachable_actions_keep_document_order() {
        let count = 5_000;
        let mut actions = vec![json!({"name": "a", "type": "CODE"})];
        actions.extend((0..count).rev().map(|i| json!({"name": format!("orphan{i:05}"), "type": "CODE"})));
        let report = lint(&flow(&json!({
            "trigger": {"type": "EVENT", "nextAction": "a"},
            "actions": actions
        })));

        assert_eq!(report.count(Severity::Warning), count);
        assert!(report.findings[0].message.contains(&format!("'orphan{:05}'", count - 1)));
        assert!(report.findings[count - 1].message.contains("'orphan00000'"));
    }

    #[test]
    fn test_branch_targets_count_as_reachable() {
        let report = lint(&flow(&json!({
            "trigger": {"type": "EVENT", "nextAction": "check"},
            "actions": [
                {"name": "check", "type": "CONDITION", "settings": {"branches": [{"nextAction": "a"}]}},
                {"name": "a", "type": "CODE"}
            ]
        })));
        assert!(report.is_clean());
    }

    #[test]
    fn test_cycles_do_not_hang_lint() {
        let report = lint(&flow(&json!({
            "trigger": {"type": "EVENT", "nextAction": "a"},
            "actions": [
                {"name": "a", "type": "CODE", "nextAction": "b"},
                {"name": "b", "type": "CODE", "nextAction": "a"}
            ]
        })));
        assert!(report.is_clean());
    }

    #[test]
    fn test_unnamed_action() {
        let report = lint(&flow(&json!({
            "trigger": {"type": "EVENT"},
            "actions": [{"type": "CODE"}]
        })));
        let codes: Vec<&str> = report.findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["L002", "L003"]);
    }

    #[test]
    fn test_no_trigger_only_checks_names() {
        let report = lint(&flow(&json!({"actions": [{"name": "a", "type": "CODE"}]})));
        assert!(report.is_clean());
    }
}
