pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

pub use crate::adapters::{LocalModuleStore, ScriptHost};
pub use crate::config::{toml_config::TomlConfig, CliConfig};
pub use crate::core::exec::{ExecOptions, ExecService};
pub use crate::utils::error::{Result, RunnerError};
