//! Server configuration parsing.

use crate::nodes::{first_arg, string_prop};
use crate::{ConfigError, ConfigResult, paths};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable that points at the server configuration file.
pub const CONFIG_ENV: &str = "PULLCI_CONFIG";

/// Server-wide configuration shared by every monitored repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server database: installed repositories, enabled flag, cron status.
    pub datafile: PathBuf,
    /// Archive of processed pull requests.
    pub archive: PathBuf,
    /// Spool file that receives notifications, one JSON document per line.
    pub notifications: Option<PathBuf>,
    pub github: GitHubSettings,
    /// Custom variables available to test commands as `${NAME}`.
    pub vars: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    pub api_url: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    /// Token written directly in the file. Prefer `token_env`.
    pub token: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            token: None,
        }
    }
}

impl GitHubSettings {
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(&self.token_env).ok())
    }
}

/// Default location of the server configuration: `~/.pullci/pullci.kdl`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pullci").join("pullci.kdl"))
}

/// Read and parse the server configuration at `path`.
pub fn load_server_config(path: &Path) -> ConfigResult<ServerConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Parsing server configuration");
    parse_server_config(&content)
}

/// Parse server configuration from KDL text.
pub fn parse_server_config(kdl: &str) -> ConfigResult<ServerConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut datafile = None;
    let mut archive = None;
    let mut notifications = None;
    let mut github = GitHubSettings::default();
    let mut vars = HashMap::new();

    for node in doc.nodes() {
        match node.name().value() {
            "datafile" => datafile = Some(path_arg(node, "datafile")?),
            "archive" => archive = Some(path_arg(node, "archive")?),
            "notifications" => notifications = Some(path_arg(node, "notifications")?),
            "github" => github = parse_github(node),
            "vars" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let key = child.name().value().to_string();
                        if let Some(val) = first_arg(child) {
                            vars.insert(key, val);
                        }
                    }
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(ServerConfig {
        datafile: datafile.ok_or_else(|| ConfigError::MissingField("datafile".to_string()))?,
        archive: archive.ok_or_else(|| ConfigError::MissingField("archive".to_string()))?,
        notifications,
        github,
        vars,
    })
}

fn parse_github(node: &KdlNode) -> GitHubSettings {
    let mut github = GitHubSettings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "api-url" | "api_url" => {
                    if let Some(url) = first_arg(child) {
                        github.api_url = url.trim_end_matches('/').to_string();
                    }
                }
                "token-env" | "token_env" => {
                    if let Some(var) = first_arg(child) {
                        github.token_env = var;
                    }
                }
                "token" => github.token = first_arg(child),
                _ => {}
            }
        }
    }

    // Allow the short property form: github token-env="CI_TOKEN"
    if let Some(var) = string_prop(node, "token-env") {
        github.token_env = var;
    }

    github
}

fn path_arg(node: &KdlNode, field: &str) -> ConfigResult<PathBuf> {
    let raw = first_arg(node)
        .ok_or_else(|| ConfigError::MissingField(format!("{} path", field)))?;
    paths::resolve(&raw).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: e.to_string(),
    })
}
