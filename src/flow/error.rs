use thiserror::Error;

/// Reasons a flow document cannot be resolved.
///
/// All of these describe problems in the document itself; none are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The document has no trigger, or the trigger is null.
    #[error("flow '{flow}' has no trigger")]
    MissingTrigger {
        /// Flow label
        flow: String,
    },

    /// Two or more actions share a name.
    #[error("flow '{flow}' defines action '{name}' more than once")]
    DuplicateActionName {
        /// Flow label
        flow: String,
        /// The repeated action name
        name: String,
    },

    /// A node carries a field, or a field value, its kind does not allow.
    #[error("node '{node}' has invalid field '{field}': {reason}")]
    SchemaViolation {
        /// Name of the offending node (`trigger` for the trigger)
        node: String,
        /// Field that broke the rule
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A reference field names an action that does not exist.
    #[error("node '{node}' references unknown action '{target}' in '{field}'")]
    UnresolvedReference {
        /// Referencing node
        node: String,
        /// Reference field (`nextAction`, `settings.branches[1].nextAction`, ...)
        field: String,
        /// The missing action name
        target: String,
    },

    /// Actions are nested deeper than the resolved tree may go.
    #[error("node '{node}' nests actions deeper than {limit} levels")]
    TooDeep {
        /// Node whose reference would exceed the limit
        node: String,
        /// Maximum nesting depth
        limit: usize,
    },

    /// A reference chain leads back to a node that is still being expanded.
    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference {
        /// Node names along the cycle; first and last entries are equal
        chain: Vec<String>,
    },
}

impl ResolveError {
    pub(crate) fn schema(node: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            node: node.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
