//! flowctl - flow definition resolver and API client
//!
//! Flows are authored as a trigger plus a flat list of named actions that
//! link to each other by name. Before a flow is uploaded it is resolved into
//! one nested tree rooted at the trigger; this crate does the resolution and
//! the upload.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod api;
pub mod cli;
pub mod flow;
pub mod log;
pub mod project;
pub mod submit;

// Re-export commonly used types
pub use api::{ApiClient, ApiError};
pub use cli::StatusLine;
pub use flow::{lint, resolve, FlowDocument, LintReport, ResolveError, ResolvedFlow};
pub use log::{HistoryLog, Operation, PushRecord};
pub use project::{CliConfig, Environment, Project};
pub use submit::{Artifact, PrepareError, Submission};
