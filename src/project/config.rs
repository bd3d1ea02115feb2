//! Host configuration parser
//!
//! Parses `flowctl.toml`, which maps each deployment environment to the base
//! URL of its API.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// File name looked up next to `project.json`
pub const CONFIG_FILE: &str = "flowctl.toml";

/// Deployment environment the CLI talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production API
    #[default]
    Production,
    /// Staging API
    Staging,
    /// API running on this machine
    Local,
}

impl Environment {
    /// Pick the environment from the `--staging` / `--local` flags
    #[must_use]
    pub const fn from_flags(staging: bool, local: bool) -> Self {
        if staging {
            Self::Staging
        } else if local {
            Self::Local
        } else {
            Self::Production
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Local => "local",
        };
        f.write_str(name)
    }
}

/// Base URLs per environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostsConfig {
    /// Production API URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<String>,
    /// Staging API URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging: Option<String>,
    /// Local API URL (default: `http://localhost:3000`)
    #[serde(default = "default_local_host")]
    pub local: String,
}

fn default_local_host() -> String {
    "http://localhost:3000".to_string()
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            production: None,
            staging: None,
            local: default_local_host(),
        }
    }
}

/// Top-level configuration parsed from `flowctl.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    /// Host table
    #[serde(default)]
    pub hosts: HostsConfig,
}

impl CliConfig {
    /// Parse a `flowctl.toml` file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load `flowctl.toml` from `dir`, or the defaults when there is none
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse `flowctl.toml` content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse flowctl.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Base URL for an environment, without trailing slash
    pub fn host(&self, environment: Environment) -> Result<String> {
        let host = match environment {
            Environment::Production => self.hosts.production.as_deref(),
            Environment::Staging => self.hosts.staging.as_deref(),
            Environment::Local => Some(self.hosts.local.as_str()),
        };

        match host {
            Some(host) => Ok(host.trim_end_matches('/').to_string()),
            None => bail!(
                "No host configured for '{environment}'. Add `{environment} = \"https://...\"` under [hosts] in {CONFIG_FILE}"
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        let hosts = [
            ("production", self.hosts.production.as_deref()),
            ("staging", self.hosts.staging.as_deref()),
            ("local", Some(self.hosts.local.as_str())),
        ];

        for (name, host) in hosts {
            let Some(host) = host else {
                continue;
            };
            if host.trim().is_empty() {
                bail!("Host for '{name}' cannot be empty");
            }
            if !host.starts_with("http://") && !host.starts_with("https://") {
                bail!("Invalid host '{host}' for '{name}': must start with http:// or https://");
            }
        }

        Ok(())
    }
}
