//! Project discovery and configuration
//!
//! A project is the directory holding `project.json`. Commands may run from
//! any directory below it, so the file is found by walking up.

pub mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub use config::{CliConfig, Environment};

/// File that marks the root of a project
pub const PROJECT_FILE: &str = "project.json";

/// Credentials stored in `project.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Remote project id
    pub project_id: String,
}

/// A located project: its root directory and credentials
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory containing `project.json`
    pub root: PathBuf,
    /// Parsed `project.json`
    pub config: ProjectConfig,
}

impl Project {
    /// Find and load the project enclosing `start`
    pub fn discover(start: &Path) -> Result<Self> {
        let Some(path) = find_upwards(start, PROJECT_FILE) else {
            bail!("Wrong directory, please use command inside project directory");
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ProjectConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if config.api_key.trim().is_empty() {
            bail!("{} has an empty apiKey", path.display());
        }

        let root = path
            .parent()
            .map_or_else(|| start.to_path_buf(), Path::to_path_buf);

        Ok(Self { root, config })
    }

    /// Directory for local state (`.flowctl` under the project root)
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".flowctl")
    }
}

/// Return the first `file_name` found in `start` or any of its ancestors
#[must_use]
pub fn find_upwards(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROJECT_JSON: &str = r#"{"apiKey": "secret", "projectId": "p-1"}"#;

    #[test]
    fn test_find_upwards_from_nested_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(PROJECT_FILE), PROJECT_JSON).unwrap();
        let nested = temp_dir.path().join("piece").join("flow");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_upwards(&nested, PROJECT_FILE).unwrap();
        assert_eq!(found, temp_dir.path().join(PROJECT_FILE));
    }

    #[test]
    fn test_find_upwards_ignores_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("x");
        std::fs::create_dir_all(nested.join("marker.json")).unwrap();

        assert_ne!(
            find_upwards(&nested, "marker.json"),
            Some(nested.join("marker.json"))
        );
    }

    #[test]
    fn test_discover_loads_credentials() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(PROJECT_FILE), PROJECT_JSON).unwrap();
        let nested = temp_dir.path().join("flow");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root, temp_dir.path());
        assert_eq!(project.config.api_key, "secret");
        assert_eq!(project.config.project_id, "p-1");
        assert_eq!(project.state_dir(), temp_dir.path().join(".flowctl"));
    }

    #[test]
    fn test_discover_rejects_empty_api_key() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(PROJECT_FILE),
            r#"{"apiKey": " ", "projectId": "p-1"}"#,
        )
        .unwrap();

        let err = Project::discover(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("empty apiKey"), "got: {err}");
    }

    #[test]
    fn test_discover_rejects_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(PROJECT_FILE), "{").unwrap();

        let err = Project::discover(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"), "got: {err}");
    }
}
