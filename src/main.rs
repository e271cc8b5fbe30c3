use clap::Parser;
use procure_flow::utils::error::{ErrorSeverity, ProcureError};
use procure_flow::utils::{logger, validation::Validate};
use procure_flow::{AppConfig, AppState, CliConfig};
use std::sync::Arc;
use tokio::net::TcpListener;

fn exit_with(e: &ProcureError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

async fn run(config: AppConfig) -> procure_flow::Result<()> {
    config.warn_missing_keys();
    let bind_addr = config.server.bind_addr();
    let state = Arc::new(AppState::from_config(config)?);
    let listener = TcpListener::bind(&bind_addr).await?;
    procure_flow::serve(listener, state).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在也沒關係
    dotenvy::dotenv().ok();
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting procure-flow v{}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    if let Err(e) = run(config).await {
        exit_with(&e);
    }

    Ok(())
}
