//! Flow document model
//!
//! Two sides of the resolver: the permissive input shape read from
//! `flow.json`, and the typed, nested output tree sent to the API.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flow as stored on disk: a trigger plus a flat list of named actions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowDocument {
    /// Remote id of the flow; read by the CLI, never part of resolved output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Machine name of the flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Flow variables, carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Entry point of the flow
    #[serde(default)]
    pub trigger: Option<NodeDefinition>,
    /// Flat collection of actions, linked by name
    #[serde(default)]
    pub actions: Vec<NodeDefinition>,
}

impl FlowDocument {
    /// Load a flow document from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read flow file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Parse a flow document from JSON text
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse flow JSON")
    }

    /// Label used in error messages to identify this flow
    #[must_use]
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or("<unnamed flow>")
    }
}

/// A trigger or action exactly as written in the document.
///
/// Every field is optional so that shape problems surface as precise
/// schema violations from the resolver rather than as parse errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Node name, unique among actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node kind (`EVENT`, `CODE`, `CONDITION`)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Name of the action that follows this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    /// Name of the action run when a condition holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success_action: Option<String>,
    /// Name of the action run when a condition does not hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure_action: Option<String>,
    /// Name of the action run after either outcome of a condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_action: Option<String>,
    /// Kind-specific settings; branching nodes keep `branches` here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Everything else (`displayName`, `input`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A flow with its action graph folded into the trigger
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFlow {
    /// Copied from the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Copied from the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Copied from the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Copied from the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// The trigger with every reachable action embedded
    pub trigger: ResolvedTrigger,
}

/// Kind of a trigger node
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    /// Event-driven trigger, the only kind a flow can start from
    Event,
}

/// Resolved trigger
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTrigger {
    /// Trigger name, when the document gives one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Trigger kind, when the document gives one
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TriggerKind>,
    /// First action of the flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<ResolvedAction>>,
    /// Trigger settings, untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Opaque payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resolved action: its own payload plus its embedded successors
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedAction {
    /// Action name
    pub name: String,
    /// Kind-specific links and settings, tagged by `type`
    #[serde(flatten)]
    pub body: ActionBody,
    /// Opaque payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-kind content of a resolved action
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ActionBody {
    /// Runs user code, then continues with `next_action`
    #[serde(rename = "CODE", rename_all = "camelCase")]
    Code {
        /// Following action
        #[serde(skip_serializing_if = "Option::is_none")]
        next_action: Option<Box<ResolvedAction>>,
        /// Code settings, untouched
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<Value>,
    },
    /// Branches on a predicate
    #[serde(rename = "CONDITION", rename_all = "camelCase")]
    Condition {
        /// Taken when the predicate holds
        #[serde(skip_serializing_if = "Option::is_none")]
        on_success_action: Option<Box<ResolvedAction>>,
        /// Taken when the predicate fails
        #[serde(skip_serializing_if = "Option::is_none")]
        on_failure_action: Option<Box<ResolvedAction>>,
        /// Taken after either outcome
        #[serde(skip_serializing_if = "Option::is_none")]
        common_action: Option<Box<ResolvedAction>>,
        /// Condition settings with resolved branches
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<ConditionSettings>,
    },
}

/// Settings of a `CONDITION` action
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConditionSettings {
    /// Branches in document order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<ResolvedBranch>>,
    /// Remaining settings keys
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One arm of a condition
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBranch {
    /// Action taken by this arm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<ResolvedAction>>,
    /// Condition payload, untouched
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ResolvedFlow {
    /// Number of action nodes embedded in the tree, counting copies
    #[must_use]
    pub fn action_count(&self) -> usize {
        let mut count = 0;
        let mut pending: Vec<&ResolvedAction> =
            self.trigger.next_action.as_deref().into_iter().collect();
        while let Some(action) = pending.pop() {
            count += 1;
            pending.extend(action.successors());
        }
        count
    }
}

impl ResolvedAction {
    /// Embedded successors in resolution order
    pub fn successors(&self) -> impl Iterator<Item = &Self> {
        let (direct, branches): (Vec<Option<&Self>>, Option<&Vec<ResolvedBranch>>) =
            match &self.body {
                ActionBody::Code { next_action, .. } => (vec![next_action.as_deref()], None),
                ActionBody::Condition {
                    on_success_action,
                    on_failure_action,
                    common_action,
                    settings,
                } => (
                    vec![
                        on_success_action.as_deref(),
                        on_failure_action.as_deref(),
                        common_action.as_deref(),
                    ],
                    settings.as_ref().and_then(|s| s.branches.as_ref()),
                ),
            };

        direct.into_iter().flatten().chain(
            branches
                .into_iter()
                .flatten()
                .filter_map(|branch| branch.next_action.as_deref()),
        )
    }
}
