use clap::Parser;
use page_runner::server::{self, AppState};
use page_runner::utils::{logger, validation::Validate};
use page_runner::{CliConfig, ExecService, LocalModuleStore, ScriptHost};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting page-runner");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置
    let config = match cli.resolve().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration failed ({:?}): {}", e.category(), e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let module_dir = config.module_dir();
    tracing::info!("Submitted modules will be written to {}", module_dir.display());

    let host = Arc::new(ScriptHost::new());
    let store = LocalModuleStore::new(module_dir);
    let mut service = ExecService::new(store, host.clone(), config.exec_options()?);

    // 基準頁面載入失敗時無法提供服務
    service.boot().await?;

    let state = Arc::new(AppState::new(service, host));
    server::run(&config.server.host, config.server.port, state).await?;

    Ok(())
}
