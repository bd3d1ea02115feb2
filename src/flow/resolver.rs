//! Flow resolver
//!
//! Validates a flow document and folds its flat, name-linked action list
//! into a single tree rooted at the trigger. Every reference field is
//! replaced by a full copy of the referenced action.
//!
//! Resolution walks the graph with an explicit stack of frames instead of
//! recursion, so long reference chains cannot overflow the call stack.

use std::collections::{HashMap, HashSet};
use std::iter;

use serde_json::{Map, Value};

use super::error::ResolveError;
use super::model::{
    ActionBody, ConditionSettings, FlowDocument, NodeDefinition, ResolvedAction, ResolvedBranch,
    ResolvedFlow, ResolvedTrigger, TriggerKind,
};

const TRIGGER_LABEL: &str = "trigger";

/// Deepest chain of nested actions a resolved flow may contain.
///
/// Serializing, cloning and dropping the tree recurse once per level.
pub const MAX_DEPTH: usize = 128;

/// Resolve a flow document into its nested form.
///
/// The input is only read; the output shares nothing with it.
pub fn resolve(flow: &FlowDocument) -> Result<ResolvedFlow, ResolveError> {
    let index = index_actions(flow)?;

    let trigger = flow
        .trigger
        .as_ref()
        .ok_or_else(|| ResolveError::MissingTrigger {
            flow: flow.label().to_string(),
        })?;

    let (label, kind) = validate_trigger(trigger)?;

    let next_action = match trigger.next_action.as_deref() {
        Some(target) => Some(Box::new(
            Expander::new(&index).expand(label, Slot::Next, target)?,
        )),
        None => None,
    };

    Ok(ResolvedFlow {
        display_name: flow.display_name.clone(),
        description: flow.description.clone(),
        name: flow.name.clone(),
        variables: flow.variables.clone(),
        trigger: ResolvedTrigger {
            name: trigger.name.clone(),
            kind,
            next_action,
            settings: trigger.settings.clone(),
            extra: trigger.extra.clone(),
        },
    })
}

/// Build the name lookup, rejecting the document on any repeated name
fn index_actions(flow: &FlowDocument) -> Result<HashMap<&str, &NodeDefinition>, ResolveError> {
    let mut index = HashMap::with_capacity(flow.actions.len());
    for action in &flow.actions {
        let Some(name) = action.name.as_deref() else {
            continue;
        };
        if index.insert(name, action).is_some() {
            return Err(ResolveError::DuplicateActionName {
                flow: flow.label().to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(index)
}

/// Check the trigger's shape; returns its label and kind
fn validate_trigger(trigger: &NodeDefinition) -> Result<(&str, Option<TriggerKind>), ResolveError> {
    let label = trigger.name.as_deref().unwrap_or(TRIGGER_LABEL);

    let kind = match trigger.kind.as_deref() {
        None => None,
        Some("EVENT") => Some(TriggerKind::Event),
        Some(other) => {
            return Err(ResolveError::schema(
                label,
                "type",
                format!("unknown trigger type '{other}', expected EVENT"),
            ))
        }
    };

    for (field, value) in [
        ("onSuccessAction", &trigger.on_success_action),
        ("onFailureAction", &trigger.on_failure_action),
        ("commonAction", &trigger.common_action),
    ] {
        if value.is_some() {
            return Err(ResolveError::schema(label, field, "not allowed on a trigger"));
        }
    }

    if has_branches(trigger.settings.as_ref()) {
        return Err(ResolveError::schema(
            label,
            "settings.branches",
            "not allowed on a trigger",
        ));
    }

    Ok((label, kind))
}

fn has_branches(settings: Option<&Value>) -> bool {
    settings
        .and_then(Value::as_object)
        .is_some_and(|map| map.contains_key("branches"))
}

/// Position on a parent node that a resolved child is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Next,
    OnSuccess,
    OnFailure,
    Common,
    Branch(usize),
}

impl Slot {
    fn field(self) -> String {
        match self {
            Self::Next => "nextAction".to_string(),
            Self::OnSuccess => "onSuccessAction".to_string(),
            Self::OnFailure => "onFailureAction".to_string(),
            Self::Common => "commonAction".to_string(),
            Self::Branch(index) => format!("settings.branches[{index}].nextAction"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Reference<'a> {
    slot: Slot,
    target: &'a str,
}

/// An action that passed shape validation
struct ActionView<'a> {
    name: &'a str,
    extra: &'a Map<String, Value>,
    links: Links<'a>,
}

enum Links<'a> {
    Code {
        next: Option<&'a str>,
        settings: Option<Value>,
    },
    Condition {
        on_success: Option<&'a str>,
        on_failure: Option<&'a str>,
        common: Option<&'a str>,
        settings: Option<BranchingSettings<'a>>,
    },
}

struct BranchingSettings<'a> {
    branches: Option<Vec<BranchView<'a>>>,
    rest: Map<String, Value>,
}

struct BranchView<'a> {
    next: Option<&'a str>,
    rest: Map<String, Value>,
}

impl<'a> Links<'a> {
    /// Reference fields present on the node, in resolution order
    fn references(&self) -> Vec<Reference<'a>> {
        let direct: Vec<(Slot, Option<&'a str>)> = match self {
            Self::Code { next, .. } => vec![(Slot::Next, *next)],
            Self::Condition {
                on_success,
                on_failure,
                common,
                ..
            } => vec![
                (Slot::OnSuccess, *on_success),
                (Slot::OnFailure, *on_failure),
                (Slot::Common, *common),
            ],
        };

        let branches = match self {
            Self::Condition {
                settings:
                    Some(BranchingSettings {
                        branches: Some(branches),
                        ..
                    }),
                ..
            } => branches
                .iter()
                .enumerate()
                .map(|(index, branch)| (Slot::Branch(index), branch.next))
                .collect(),
            _ => Vec::new(),
        };

        direct
            .into_iter()
            .chain(branches)
            .filter_map(|(slot, target)| target.map(|target| Reference { slot, target }))
            .collect()
    }
}

/// Check an action's shape and split it into its per-kind view
fn validate_action(action: &NodeDefinition) -> Result<ActionView<'_>, ResolveError> {
    let name = action
        .name
        .as_deref()
        .ok_or_else(|| ResolveError::schema("<unnamed action>", "name", "is required"))?;

    let links = match action.kind.as_deref() {
        None => return Err(ResolveError::schema(name, "type", "is required")),
        Some("CODE") => {
            for (field, value) in [
                ("onSuccessAction", &action.on_success_action),
                ("onFailureAction", &action.on_failure_action),
                ("commonAction", &action.common_action),
            ] {
                if value.is_some() {
                    return Err(ResolveError::schema(
                        name,
                        field,
                        "not allowed on CODE actions",
                    ));
                }
            }
            if has_branches(action.settings.as_ref()) {
                return Err(ResolveError::schema(
                    name,
                    "settings.branches",
                    "not allowed on CODE actions",
                ));
            }
            Links::Code {
                next: action.next_action.as_deref(),
                settings: action.settings.clone(),
            }
        }
        Some("CONDITION") => {
            if action.next_action.is_some() {
                return Err(ResolveError::schema(
                    name,
                    "nextAction",
                    "not allowed on CONDITION actions",
                ));
            }
            let settings = match &action.settings {
                None | Some(Value::Null) => None,
                Some(Value::Object(map)) => Some(branching_settings(name, map)?),
                Some(_) => {
                    return Err(ResolveError::schema(
                        name,
                        "settings",
                        "must be an object on CONDITION actions",
                    ))
                }
            };
            Links::Condition {
                on_success: action.on_success_action.as_deref(),
                on_failure: action.on_failure_action.as_deref(),
                common: action.common_action.as_deref(),
                settings,
            }
        }
        Some(other) => {
            return Err(ResolveError::schema(
                name,
                "type",
                format!("unknown action type '{other}', expected CODE or CONDITION"),
            ))
        }
    };

    Ok(ActionView {
        name,
        extra: &action.extra,
        links,
    })
}

fn branching_settings<'a>(
    name: &str,
    settings: &'a Map<String, Value>,
) -> Result<BranchingSettings<'a>, ResolveError> {
    let branches = match settings.get("branches") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| branch_view(name, index, item))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => {
            return Err(ResolveError::schema(
                name,
                "settings.branches",
                "must be an array",
            ))
        }
    };

    let mut rest = settings.clone();
    rest.remove("branches");
    Ok(BranchingSettings { branches, rest })
}

fn branch_view<'a>(name: &str, index: usize, item: &'a Value) -> Result<BranchView<'a>, ResolveError> {
    let Value::Object(map) = item else {
        return Err(ResolveError::schema(
            name,
            &format!("settings.branches[{index}]"),
            "must be an object",
        ));
    };

    let next = match map.get("nextAction") {
        None | Some(Value::Null) => None,
        Some(Value::String(target)) => Some(target.as_str()),
        Some(_) => {
            return Err(ResolveError::schema(
                name,
                &Slot::Branch(index).field(),
                "must be an action name",
            ))
        }
    };

    let mut rest = map.clone();
    rest.remove("nextAction");
    Ok(BranchView { next, rest })
}

/// One action being expanded: its view and the children resolved so far
struct Frame<'a> {
    view: ActionView<'a>,
    references: Vec<Reference<'a>>,
    cursor: usize,
    resolved: Vec<ResolvedAction>,
}

impl<'a> Frame<'a> {
    fn enter(action: &'a NodeDefinition) -> Result<Self, ResolveError> {
        let view = validate_action(action)?;
        let references = view.links.references();
        Ok(Self {
            view,
            references,
            cursor: 0,
            resolved: Vec::new(),
        })
    }

    fn next_reference(&mut self) -> Option<Reference<'a>> {
        let reference = self.references.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(reference)
    }

    /// Build the resolved action once every reference has a resolved child
    fn assemble(self) -> ResolvedAction {
        let mut children: HashMap<Slot, ResolvedAction> = self
            .references
            .iter()
            .map(|reference| reference.slot)
            .zip(self.resolved)
            .collect();
        let mut take = |slot: Slot| children.remove(&slot).map(Box::new);

        let body = match self.view.links {
            Links::Code { settings, .. } => ActionBody::Code {
                next_action: take(Slot::Next),
                settings,
            },
            Links::Condition { settings, .. } => {
                let on_success_action = take(Slot::OnSuccess);
                let on_failure_action = take(Slot::OnFailure);
                let common_action = take(Slot::Common);
                let settings = settings.map(|settings| ConditionSettings {
                    branches: settings.branches.map(|branches| {
                        branches
                            .into_iter()
                            .enumerate()
                            .map(|(index, branch)| ResolvedBranch {
                                next_action: take(Slot::Branch(index)),
                                rest: branch.rest,
                            })
                            .collect()
                    }),
                    rest: settings.rest,
                });
                ActionBody::Condition {
                    on_success_action,
                    on_failure_action,
                    common_action,
                    settings,
                }
            }
        };

        ResolvedAction {
            name: self.view.name.to_string(),
            body,
            extra: self.view.extra.clone(),
        }
    }
}

/// Expands references into resolved subtrees
struct Expander<'i, 'a> {
    index: &'i HashMap<&'a str, &'a NodeDefinition>,
}

impl<'i, 'a> Expander<'i, 'a> {
    const fn new(index: &'i HashMap<&'a str, &'a NodeDefinition>) -> Self {
        Self { index }
    }

    fn lookup(
        &self,
        node: &str,
        slot: Slot,
        target: &str,
    ) -> Result<&'a NodeDefinition, ResolveError> {
        self.index
            .get(target)
            .copied()
            .ok_or_else(|| ResolveError::UnresolvedReference {
                node: node.to_string(),
                field: slot.field(),
                target: target.to_string(),
            })
    }

    /// Resolve the action that `node` references through `slot`.
    ///
    /// `on_path` holds the names of the frames on the stack; a reference to
    /// any of them closes a cycle.
    fn expand(&self, node: &str, slot: Slot, target: &str) -> Result<ResolvedAction, ResolveError> {
        let mut current = Frame::enter(self.lookup(node, slot, target)?)?;
        let mut parents: Vec<Frame<'a>> = Vec::new();
        let mut on_path: HashSet<&'a str> = HashSet::from([current.view.name]);

        loop {
            if let Some(reference) = current.next_reference() {
                let action = self.lookup(current.view.name, reference.slot, reference.target)?;

                if on_path.contains(reference.target) {
                    return Err(ResolveError::CyclicReference {
                        chain: cycle_chain(&parents, &current, reference.target),
                    });
                }

                // current and its parents, plus the child about to be entered
                if parents.len() + 2 > MAX_DEPTH {
                    return Err(ResolveError::TooDeep {
                        node: current.view.name.to_string(),
                        limit: MAX_DEPTH,
                    });
                }

                let child = Frame::enter(action)?;
                on_path.insert(child.view.name);
                parents.push(std::mem::replace(&mut current, child));
                continue;
            }

            let name = current.view.name;
            let resolved = current.assemble();
            on_path.remove(name);

            match parents.pop() {
                Some(parent) => {
                    current = parent;
                    current.resolved.push(resolved);
                }
                None => return Ok(resolved),
            }
        }
    }
}

/// Names along the active path from the first visit of `target` back to it
fn cycle_chain(parents: &[Frame<'_>], current: &Frame<'_>, target: &str) -> Vec<String> {
    let path: Vec<&str> = parents
        .iter()
        .map(|frame| frame.view.name)
        .chain(iter::once(current.view.name))
        .collect();
    let start = path.iter().position(|name| *name == target).unwrap_or(0);

    path[start..]
        .iter()
        .copied()
        .chain(iter::once(target))
        .map(str::to_string)
        .collect()
}
