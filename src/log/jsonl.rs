//! JSONL (JSON Lines) history of remote operations
//!
//! Provides append-only logging of push and commit attempts to
//! `.flowctl/log.jsonl` under the project root.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// Remote operation recorded in the history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Upload of a resolved flow
    Push,
    /// Commit of the current flow version
    Commit,
}

impl Operation {
    /// Name as written in the log
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Commit => "commit",
        }
    }
}

/// One push or commit attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushRecord {
    /// When the attempt finished (ISO 8601)
    pub timestamp: DateTime<Utc>,
    /// What was attempted
    pub operation: Operation,
    /// Remote flow id
    pub flow_id: String,
    /// API base URL the request went to
    pub host: String,
    /// Whether the server accepted the request
    pub success: bool,
    /// Human-readable result or error
    pub outcome: String,
}

impl PushRecord {
    /// Record stamped with the current time
    #[must_use]
    pub fn now(operation: Operation, flow_id: &str, host: &str, success: bool, outcome: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            flow_id: flow_id.to_string(),
            host: host.to_string(),
            success,
            outcome: outcome.to_string(),
        }
    }
}

/// Append-only history stored as `log.jsonl`
pub struct HistoryLog {
    log_path: PathBuf,
}

impl HistoryLog {
    /// Open the history in `log_dir`, creating the directory if needed
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        Ok(Self {
            log_path: log_dir.join("log.jsonl"),
        })
    }

    /// Append a record to the log
    pub fn append(&self, record: &PushRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let json = serde_json::to_string(record).context("Failed to serialize history record")?;

        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Read all records, oldest first
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is not a valid record
    pub fn read_all(&self) -> Result<Vec<PushRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        let mut records = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let record: PushRecord = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {} as JSON", line_num + 1))?;
            records.push(record);
        }

        Ok(records)
    }

    /// The newest `limit` records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<PushRecord>> {
        let mut records = self.read_all()?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    /// Get the path to the log file
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
