//! Flow documents
//!
//! This module holds the flow model, the resolver that folds a flat action
//! list into a nested tree, and lint checks over raw documents.

pub mod error;
pub mod lint;
pub mod model;
pub mod resolver;

pub use error::ResolveError;
pub use lint::{lint, LintReport};
pub use model::{FlowDocument, NodeDefinition, ResolvedAction, ResolvedFlow};
pub use resolver::{resolve, MAX_DEPTH};
