pub mod toml_config;

pub use toml_config::AppConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "procure-flow")]
#[command(about = "Procurement workflow API: design extraction, sourcing, plans and USDC payments")]
pub struct CliConfig {
    /// Path to TOML configuration file (optional)
    #[arg(short, long, env = "PROCURE_CONFIG")]
    pub config: Option<String>,

    /// Override server.host
    #[arg(long, env = "PROCURE_HOST")]
    pub host: Option<String>,

    /// Override server.port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Override server.output_path
    #[arg(long)]
    pub output_path: Option<String>,

    /// Use the enhanced extraction and sourcing prompts
    #[arg(long)]
    pub enhanced: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入 TOML（或預設值）並套用命令列覆寫
    pub fn load(&self) -> crate::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(output_path) = &self.output_path {
            config.server.output_path = output_path.clone();
        }
        if self.enhanced {
            config.features.enhanced_prompts = true;
        }

        Ok(config)
    }
}
