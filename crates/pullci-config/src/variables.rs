//! `${...}` substitution in test commands.
//!
//! Names resolve in this order:
//! - `repo.key`, `repo.name`, `repo.staging` and `pull.number` for the pull
//!   request being tested
//! - `env.NAME` from the server process environment
//! - `timestamp`, `date` and `datetime`, evaluated at substitution time
//! - any other bare name from the server `vars` block
//!
//! Unknown names are left in the command untouched.

use pullci_core::Repository;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Values available to test commands.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Set once a context is scoped to a pull request.
    pub pull: Option<PullContext>,
    pub env: HashMap<String, String>,
    /// Server `vars` block.
    pub custom: HashMap<String, String>,
}

/// The repository and pull request a command runs for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullContext {
    pub repo: RepoContext,
    pub number: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoContext {
    pub key: String,
    pub name: String,
    pub staging: String,
}

impl RepoContext {
    fn of(repo: &Repository) -> Self {
        Self {
            key: repo.key.as_str().to_string(),
            name: repo.full_name.clone(),
            staging: repo.staging.display().to_string(),
        }
    }
}

// `${name}` or `${scope.name}`
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current process environment into `env.*`.
    pub fn populate_env(&mut self) {
        self.env.extend(std::env::vars());
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.custom.insert(name.to_string(), value.into());
    }

    /// A copy of this context scoped to one pull request of `repo`.
    pub fn for_pull(&self, repo: &Repository, number: u64) -> Self {
        Self {
            pull: Some(PullContext {
                repo: RepoContext::of(repo),
                number,
            }),
            ..self.clone()
        }
    }

    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let Some((scope, name)) = var_name.split_once('.') else {
            return self.resolve_bare(var_name);
        };

        match (scope, name, &self.pull) {
            ("env", name, _) => self.env.get(name).cloned(),
            ("repo", "key", Some(p)) => Some(p.repo.key.clone()),
            ("repo", "name", Some(p)) => Some(p.repo.name.clone()),
            ("repo", "staging", Some(p)) => Some(p.repo.staging.clone()),
            ("pull", "number", Some(p)) => Some(p.number.to_string()),
            _ => None,
        }
    }

    fn resolve_bare(&self, name: &str) -> Option<String> {
        let now = chrono::Utc::now();
        match name {
            "timestamp" => Some(now.timestamp().to_string()),
            "date" => Some(now.format("%Y-%m-%d").to_string()),
            "datetime" => Some(now.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            _ => self.custom.get(name).cloned(),
        }
    }

    /// Substitute every known variable in `input`.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                self.resolve(&caps[1])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    pub fn interpolate_vec(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|s| self.interpolate(s)).collect()
    }
}

/// Builder for a server-wide [`VariableContext`].
#[derive(Default)]
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.set(&key.into(), value);
        self
    }

    /// Add every entry of a server `vars` block.
    pub fn with_vars(mut self, vars: &HashMap<String, String>) -> Self {
        self.ctx
            .custom
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}
