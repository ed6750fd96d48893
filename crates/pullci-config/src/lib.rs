//! KDL configuration parsing for pullci.
//!
//! This crate handles parsing of:
//! - Server settings (pullci.kdl)
//! - Per-repository settings
//! - Variable interpolation in test commands

mod nodes;
pub mod error;
pub mod paths;
pub mod repository;
pub mod server;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use repository::{load_repository, parse_repository};
pub use server::{
    CONFIG_ENV, GitHubSettings, ServerConfig, default_config_path, load_server_config,
    parse_server_config,
};
pub use variables::{PullContext, RepoContext, VariableContext, VariableContextBuilder};
