//! Repository settings parsing.

use crate::nodes::{first_arg, int_prop, string_list, string_prop};
use crate::{ConfigError, ConfigResult, paths};
use kdl::{KdlDocument, KdlNode};
use pullci_core::Repository;
use pullci_core::notify::EventKind;
use pullci_core::repository::{CronSettings, StaticCopy, StaticKind, TestingSettings};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read and parse the repository settings file at `path`.
pub fn load_repository(path: &Path) -> ConfigResult<Repository> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Parsing repository settings");

    let mut repo = parse_repository(&content)?;
    repo.settings_path = Some(path.to_path_buf());
    Ok(repo)
}

/// Parse repository settings from KDL text.
pub fn parse_repository(kdl: &str) -> ConfigResult<Repository> {
    let doc: KdlDocument = kdl.parse()?;

    let mut repo: Option<Repository> = None;
    let mut testing = None;
    let mut statics = Vec::new();
    let mut cron = CronSettings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "repo" => repo = Some(parse_repo_node(node)?),
            "testing" => testing = Some(parse_testing(node)?),
            "static" => statics = parse_statics(node)?,
            "cron" => cron = parse_cron(node)?,
            _ => {} // Ignore unknown nodes
        }
    }

    let mut repo = repo.ok_or_else(|| ConfigError::MissingField("repo".to_string()))?;
    repo.testing = testing.ok_or_else(|| ConfigError::MissingField("testing".to_string()))?;
    repo.statics = statics;
    repo.cron = cron;
    Ok(repo)
}

fn parse_repo_node(node: &KdlNode) -> ConfigResult<Repository> {
    let name = first_arg(node)
        .ok_or_else(|| ConfigError::MissingField("repo name".to_string()))?;
    if !name.contains('/') {
        return Err(ConfigError::InvalidValue {
            field: "repo name".to_string(),
            message: format!("expected 'owner/name', got '{}'", name),
        });
    }

    let staging = string_prop(node, "staging")
        .ok_or_else(|| ConfigError::MissingField(format!("staging for repo '{}'", name)))?;
    let staging = paths::resolve(&staging).map_err(|e| ConfigError::InvalidValue {
        field: "staging".to_string(),
        message: e.to_string(),
    })?;

    let mut repo = Repository::new(name, staging);
    repo.user = string_prop(node, "user");
    repo.organization = string_prop(node, "organization");
    Ok(repo)
}

fn parse_testing(node: &KdlNode) -> ConfigResult<TestingSettings> {
    let timeout_minutes = int_prop(node, "timeout")
        .map(|t| {
            u32::try_from(t).map_err(|_| ConfigError::InvalidValue {
                field: "testing timeout".to_string(),
                message: format!("{} is not a valid number of minutes", t),
            })
        })
        .transpose()?;

    let mut commands = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "command" {
                if let Some(cmd) = first_arg(child) {
                    commands.push(cmd);
                }
            }
        }
    }

    if commands.is_empty() {
        return Err(ConfigError::MissingField(
            "at least one testing command".to_string(),
        ));
    }

    Ok(TestingSettings {
        commands,
        timeout_minutes,
    })
}

fn parse_statics(node: &KdlNode) -> ConfigResult<Vec<StaticCopy>> {
    let mut statics = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let kind = match child.name().value() {
                "file" => StaticKind::File,
                "folder" => StaticKind::Folder,
                _ => continue,
            };

            let source = first_arg(child)
                .ok_or_else(|| ConfigError::MissingField("static source path".to_string()))?;
            let target = string_prop(child, "target")
                .ok_or_else(|| ConfigError::MissingField(format!("target for '{}'", source)))?;

            statics.push(StaticCopy {
                kind,
                source: paths::resolve(&source)?,
                target: PathBuf::from(target),
            });
        }
    }

    Ok(statics)
}

fn parse_cron(node: &KdlNode) -> ConfigResult<CronSettings> {
    let mut cron = CronSettings::default();

    if let Some(freq) = int_prop(node, "frequency") {
        cron.frequency_minutes = u32::try_from(freq).map_err(|_| ConfigError::InvalidValue {
            field: "cron frequency".to_string(),
            message: format!("{} is not a valid number of minutes", freq),
        })?;
    }

    cron.recipients = string_list(node, "emails");
    cron.notify = string_list(node, "notify")
        .iter()
        .map(|s| {
            s.parse::<EventKind>().map_err(|message| ConfigError::InvalidValue {
                field: "cron notify".to_string(),
                message,
            })
        })
        .collect::<ConfigResult<Vec<_>>>()?;

    Ok(cron)
}
