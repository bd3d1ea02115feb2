//! flowctl - flow definition resolver and API client
//!
//! CLI entry point.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use flowctl::cli::{render_history, render_lint_report, render_resolve_error, StatusLine};
use flowctl::{
    lint, resolve, ApiClient, Artifact, CliConfig, Environment, FlowDocument, HistoryLog,
    Operation, PrepareError, Project, PushRecord, Submission,
};

/// Resolve, validate and publish flow definitions
///
/// A flow file lists its actions flat and links them by name. `resolve`
/// folds them into the nested tree the API expects; `push` uploads that
/// tree and `commit` publishes the uploaded version.
#[derive(Parser, Debug)]
#[command(name = "flowctl", version, about)]
struct Cli {
    /// Print request details and response bodies
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Talk to the staging API
    #[arg(long, global = true, conflicts_with = "local")]
    staging: bool,

    /// Talk to the local API
    #[arg(long, global = true)]
    local: bool,

    /// Path to flowctl.toml (defaults to the one in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved flow as JSON
    Resolve {
        /// Flow definition to resolve
        #[arg(long, default_value = "flow.json")]
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a flow without sending it anywhere
    Validate {
        /// Flow definition to check
        #[arg(long, default_value = "flow.json")]
        file: PathBuf,
    },

    /// Resolve a flow and upload it
    Push {
        /// Flow definition to upload
        #[arg(long, default_value = "flow.json")]
        file: PathBuf,

        /// Remote flow id (defaults to `flowId` in the flow file)
        #[arg(long)]
        flow_id: Option<String>,

        /// Packaged code to attach, one per code action
        #[arg(long = "artifact")]
        artifacts: Vec<PathBuf>,
    },

    /// Commit the uploaded version of a flow
    Commit {
        /// Flow definition to read `flowId` from
        #[arg(long, default_value = "flow.json")]
        file: PathBuf,

        /// Remote flow id (defaults to `flowId` in the flow file)
        #[arg(long)]
        flow_id: Option<String>,
    },

    /// Show recent pushes and commits
    History {
        /// Number of entries to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

/// Everything a remote command needs: API client, environment and history log.
struct Session {
    client: ApiClient,
    environment: Environment,
    history: HistoryLog,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let project = Project::discover(&cwd)?;

        let config = match &cli.config {
            Some(path) => CliConfig::from_path(path)
                .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
            None => CliConfig::load_or_default(&project.root)?,
        };
        let environment = Environment::from_flags(cli.staging, cli.local);
        let host = config.host(environment)?;

        let history =
            HistoryLog::new(project.state_dir()).context("Failed to initialize history log")?;

        Ok(Self {
            client: ApiClient::new(&host, &project.config.api_key),
            environment,
            history,
        })
    }

    fn record(
        &self,
        operation: Operation,
        flow_id: &str,
        success: bool,
        outcome: &str,
    ) -> Result<()> {
        let record = PushRecord::now(operation, flow_id, self.client.base_url(), success, outcome);
        self.history
            .append(&record)
            .context("Failed to write to history log")
    }
}

/// Pick the flow id: the flag wins, then `flowId` from the flow file.
fn select_flow_id(flag: Option<&str>, file: &Path) -> Result<String> {
    if let Some(id) = flag {
        return Ok(id.to_string());
    }

    document_flow_id(&FlowDocument::from_path(file)?, file)
}

/// `flowId` of an already loaded flow file
fn document_flow_id(document: &FlowDocument, file: &Path) -> Result<String> {
    match document.flow_id.as_deref() {
        Some(id) if !id.trim().is_empty() => Ok(id.to_string()),
        _ => bail!(
            "No flow id: pass --flow-id or set \"flowId\" in {}",
            file.display()
        ),
    }
}

/// Summary line for a commit response.
fn commit_message(flow_id: &str, version: Option<&str>) -> String {
    version.map_or_else(
        || format!("Flow '{flow_id}' committed"),
        |v| format!("Flow '{flow_id}' committed as version {v}"),
    )
}

fn print_body(body: &serde_json::Value) {
    match serde_json::to_string_pretty(body) {
        Ok(text) => eprintln!("{text}"),
        Err(_) => eprintln!("{body}"),
    }
}

fn run_resolve(file: &Path, output: Option<&Path>, verbose: bool) -> Result<()> {
    let document = FlowDocument::from_path(file)?;
    let resolved = match resolve(&document) {
        Ok(resolved) => resolved,
        Err(err) => {
            render_resolve_error(&file.display().to_string(), &err);
            std::process::exit(1);
        }
    };

    let json =
        serde_json::to_string_pretty(&resolved).context("Failed to serialize resolved flow")?;

    if verbose {
        eprintln!(
            "Resolved '{}': {} embedded action(s)",
            document.label(),
            resolved.action_count()
        );
    }

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            StatusLine::success(&format!("Resolved flow written to {}", path.display())).print();
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn run_validate(file: &Path) -> Result<()> {
    let document = FlowDocument::from_path(file)?;

    let report = lint(&document);
    render_lint_report(&report);

    match resolve(&document) {
        Ok(resolved) => {
            StatusLine::success(&format!(
                "{} is valid ({} embedded action(s))",
                file.display(),
                resolved.action_count()
            ))
            .print();
            Ok(())
        }
        Err(err) => {
            render_resolve_error(&file.display().to_string(), &err);
            std::process::exit(1);
        }
    }
}

async fn run_push(
    cli: &Cli,
    file: &Path,
    flow_id: Option<&str>,
    artifacts: &[PathBuf],
) -> Result<()> {
    let document = FlowDocument::from_path(file)?;
    let flow_id = match flow_id {
        Some(id) => id.to_string(),
        None => document_flow_id(&document, file)?,
    };
    let artifacts = artifacts
        .iter()
        .map(Artifact::from_path)
        .collect::<Result<Vec<_>>>()?;

    // Nothing is sent for a flow that does not resolve
    let submission = match Submission::prepare(&document, artifacts) {
        Ok(submission) => submission,
        Err(PrepareError::Resolve(err)) => {
            render_resolve_error(&file.display().to_string(), &err);
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let session = Session::open(cli)?;
    if cli.verbose {
        eprintln!(
            "PUT {} ({} bytes, {} artifact(s))",
            session.client.url(&format!("flows/{flow_id}")),
            submission.payload_len(),
            submission.artifacts.len()
        );
    }

    match session.client.push_flow(&flow_id, submission).await {
        Ok(body) => {
            let message = format!("Flow '{flow_id}' pushed to {}", session.environment);
            session.record(Operation::Push, &flow_id, true, &message)?;
            StatusLine::success(&message).print();
            if cli.verbose {
                print_body(&body);
            }
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            session.record(Operation::Push, &flow_id, false, &message)?;
            StatusLine::failure(&message).print();
            std::process::exit(1);
        }
    }
}

async fn run_commit(cli: &Cli, file: &Path, flow_id: Option<&str>) -> Result<()> {
    let flow_id = select_flow_id(flow_id, file)?;
    let session = Session::open(cli)?;
    if cli.verbose {
        eprintln!(
            "PUT {}",
            session.client.url(&format!("flows/{flow_id}/commit"))
        );
    }

    match session.client.commit_flow(&flow_id).await {
        Ok((body, version)) => {
            let message = commit_message(&flow_id, version.as_deref());
            session.record(Operation::Commit, &flow_id, true, &message)?;
            StatusLine::success(&message).print();
            if cli.verbose {
                print_body(&body);
            }
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            session.record(Operation::Commit, &flow_id, false, &message)?;
            StatusLine::failure(&message).print();
            std::process::exit(1);
        }
    }
}

fn run_history(limit: usize) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let project = Project::discover(&cwd)?;
    let history =
        HistoryLog::new(project.state_dir()).context("Failed to initialize history log")?;

    let records = history
        .recent(limit)
        .context("Failed to read history log")?;
    render_history(&records);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Resolve { file, output } => run_resolve(file, output.as_deref(), cli.verbose),
        Command::Validate { file } => run_validate(file),
        Command::Push {
            file,
            flow_id,
            artifacts,
        } => run_push(&cli, file, flow_id.as_deref(), artifacts).await,
        Command::Commit { file, flow_id } => run_commit(&cli, file, flow_id.as_deref()).await,
        Command::History { limit } => run_history(*limit),
    }
}
