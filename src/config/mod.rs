pub mod toml_config;

use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;
use toml_config::TomlConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "page-runner")]
#[command(about = "Serve page modules submitted over HTTP with hot reload")]
pub struct CliConfig {
    #[arg(long, help = "Port to listen on")]
    pub port: Option<u16>,

    #[arg(long, help = "Optional TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Baseline module served at /")]
    pub baseline: Option<PathBuf>,

    #[arg(long, help = "Writable directory for submitted modules")]
    pub module_dir: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl CliConfig {
    /// 載入設定檔（若有指定），再套用命令列覆蓋
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(baseline) = &self.baseline {
            config.modules.baseline_path = baseline.clone();
        }
        if let Some(dir) = &self.module_dir {
            config.modules.module_dir = Some(dir.clone());
        }

        Ok(config)
    }
}
