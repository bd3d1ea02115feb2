//! CLI output formatting
//!
//! Human-readable, colored rendering of resolve errors, lint findings and
//! remote operation results.

pub mod display;

pub use display::render_history;
pub use display::render_lint_report;
pub use display::render_resolve_error;
pub use display::StatusLine;
