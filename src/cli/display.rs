//! Colored CLI display
//!
//! All output goes to stderr so stdout remains clean for piping resolved
//! JSON.

use colored::Colorize;

use crate::flow::lint::{Finding, LintReport, Severity};
use crate::flow::ResolveError;
use crate::log::PushRecord;

/// One-line status message for the end of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    ok: bool,
    message: String,
}

impl StatusLine {
    /// A successful outcome
    #[must_use]
    pub fn success(message: &str) -> Self {
        Self {
            ok: true,
            message: message.to_string(),
        }
    }

    /// A failed outcome
    #[must_use]
    pub fn failure(message: &str) -> Self {
        Self {
            ok: false,
            message: message.to_string(),
        }
    }

    /// Plain text, without color
    #[must_use]
    pub fn plain(&self) -> String {
        let mark = if self.ok { "✓" } else { "✗" };
        format!("{mark} {}", self.message)
    }

    /// Print to stderr
    pub fn print(&self) {
        if self.ok {
            eprintln!("{} {}", "✓".green().bold(), self.message);
        } else {
            eprintln!("{} {}", "✗".red().bold(), self.message.red());
        }
    }
}

/// Print a resolve failure with a hint on how to fix it
pub fn render_resolve_error(file: &str, err: &ResolveError) {
    eprintln!("{} {}", "Invalid flow:".red().bold(), file.bold());
    eprintln!("  {err}");
    eprintln!("  {} {}", "Fix:".dimmed(), resolve_hint(err));
}

fn resolve_hint(err: &ResolveError) -> String {
    match err {
        ResolveError::MissingTrigger { .. } => {
            "add a `trigger` object with `\"type\": \"EVENT\"`".to_string()
        }
        ResolveError::DuplicateActionName { name, .. } => {
            format!("rename one of the actions called '{name}'")
        }
        ResolveError::SchemaViolation { node, field, .. } => {
            format!("remove or correct `{field}` on '{node}'")
        }
        ResolveError::UnresolvedReference { target, .. } => {
            format!("add an action named '{target}' or correct the reference")
        }
        ResolveError::TooDeep { node, limit } => format!(
            "shorten the chain through '{node}' to at most {limit} nested actions"
        ),
        ResolveError::CyclicReference { chain } => format!(
            "break the loop by removing one link between {}",
            chain.first().map_or("these actions", String::as_str)
        ),
    }
}

/// Print lint findings, errors first
pub fn render_lint_report(report: &LintReport) {
    if report.is_clean() {
        eprintln!("{} no lint findings", "✓".green().bold());
        return;
    }

    for finding in &report.findings {
        render_finding(finding);
    }

    eprintln!(
        "  {} {} error(s), {} warning(s), {} info",
        "Lint:".dimmed(),
        report.count(Severity::Error),
        report.count(Severity::Warning),
        report.count(Severity::Info)
    );
}

fn render_finding(finding: &Finding) {
    let label = match finding.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue().bold(),
    };
    eprintln!("  {label} [{}] {}", finding.code.dimmed(), finding.message);
    if let Some(ref suggestion) = finding.suggestion {
        eprintln!("        {} {suggestion}", "→".dimmed());
    }
}

/// Print history records, one per line
pub fn render_history(records: &[PushRecord]) {
    if records.is_empty() {
        eprintln!("{}", "No pushes or commits recorded yet".dimmed());
        return;
    }

    for record in records {
        eprintln!("{}", history_line(record));
    }
}

fn history_line(record: &PushRecord) -> String {
    let status = if record.success {
        "ok".green().to_string()
    } else {
        "failed".red().to_string()
    };
    let outcome = if record.outcome.len() > 80 {
        let cut = record
            .outcome
            .char_indices()
            .nth(77)
            .map_or(record.outcome.len(), |(i, _)| i);
        format!("{}...", &record.outcome[..cut])
    } else {
        record.outcome.clone()
    };

    format!(
        "{} {:<6} {} {} {status} {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        record.operation.as_str(),
        record.flow_id.bold(),
        record.host.dimmed(),
        outcome
    )
}
