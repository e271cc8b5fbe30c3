use crate::core::retry::RetryPolicy;
use crate::utils::error::{ProcureError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub payment: PaymentConfig,
    pub scraper: ScraperConfig,
    pub features: FeatureFlags,
    pub retry: RetryPolicy,
    pub sourcing: SourcingConfig,
    pub rfq: RfqConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub output_path: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            output_path: "./output".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// 送進 prompt 的設計檔內容上限（字元）
    pub max_design_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 4096,
            timeout_seconds: 120,
            max_design_chars: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.resend.com".to_string(),
            api_key: None,
            from: "Procurement <procurement@example.com>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub tool_name: String,
    pub network: String,
    pub currency: String,
    pub timeout_seconds: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8808/mcp".to_string(),
            api_key: None,
            tool_name: "send_usdc".to_string(),
            network: "base-sepolia".to_string(),
            currency: "USDC".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub results_per_query: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.firecrawl.dev".to_string(),
            api_key: None,
            results_per_query: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enhanced_prompts: bool,
    pub web_scraping: bool,
    pub retry: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enhanced_prompts: false,
            web_scraping: false,
            retry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcingConfig {
    pub max_vendors_per_component: usize,
    pub delay_between_components_ms: u64,
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            max_vendors_per_component: 4,
            delay_between_components_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RfqConfig {
    pub response_days: i64,
    pub company: String,
    pub contact_name: String,
    pub contact_email: String,
}

impl Default for RfqConfig {
    fn default() -> Self {
        Self {
            response_days: 7,
            company: "Acme Hardware Labs".to_string(),
            contact_name: "Procurement Team".to_string(),
            contact_email: "procurement@example.com".to_string(),
        }
    }
}

/// 取得 API 金鑰：優先用配置值，否則讀環境變數
fn resolve_key(configured: &Option<String>, env_name: &str) -> Option<String> {
    configured
        .as_ref()
        .filter(|k| !k.trim().is_empty() && !k.contains("${"))
        .cloned()
        .or_else(|| std::env::var(env_name).ok().filter(|k| !k.trim().is_empty()))
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProcureError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProcureError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ANTHROPIC_API_KEY})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProcureError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn llm_api_key(&self) -> Option<String> {
        resolve_key(&self.llm.api_key, "ANTHROPIC_API_KEY")
    }

    pub fn email_api_key(&self) -> Option<String> {
        resolve_key(&self.email.api_key, "RESEND_API_KEY")
    }

    pub fn payment_api_key(&self) -> Option<String> {
        resolve_key(&self.payment.api_key, "PAYMENT_API_KEY")
    }

    pub fn scraper_api_key(&self) -> Option<String> {
        resolve_key(&self.scraper.api_key, "SCRAPER_API_KEY")
    }

    /// 取得重試策略（`features.retry` 關閉時只試一次）
    pub fn effective_retry(&self) -> RetryPolicy {
        if self.features.retry {
            self.retry
        } else {
            RetryPolicy::disabled()
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_url("llm.base_url", &self.llm.base_url)?;
        validate_url("email.base_url", &self.email.base_url)?;
        validate_url("payment.base_url", &self.payment.base_url)?;
        if self.features.web_scraping {
            validate_url("scraper.base_url", &self.scraper.base_url)?;
        }
        validate_path("server.output_path", &self.server.output_path)?;
        validate_positive_number("retry.max_attempts", self.retry.max_attempts as usize, 1)?;
        validate_positive_number(
            "sourcing.max_vendors_per_component",
            self.sourcing.max_vendors_per_component,
            1,
        )?;
        validate_positive_number("server.max_upload_bytes", self.server.max_upload_bytes, 1)?;
        validate_range("rfq.response_days", self.rfq.response_days, 1, 90)?;
        validate_range("scraper.results_per_query", self.scraper.results_per_query, 1, 20)?;

        if self.retry.multiplier < 1.0 {
            return Err(ProcureError::InvalidConfigValueError {
                field: "retry.multiplier".to_string(),
                value: self.retry.multiplier.to_string(),
                reason: "Multiplier must be at least 1.0".to_string(),
            });
        }

        if self.payment.currency.trim().is_empty() {
            return Err(ProcureError::MissingConfigError {
                field: "payment.currency".to_string(),
            });
        }

        Ok(())
    }

    /// 記錄缺少的上游金鑰；伺服器照常啟動，用到時才失敗
    pub fn warn_missing_keys(&self) {
        let checks = [
            ("llm", "ANTHROPIC_API_KEY", self.llm_api_key().is_some()),
            ("email", "RESEND_API_KEY", self.email_api_key().is_some()),
            ("payment", "PAYMENT_API_KEY", self.payment_api_key().is_some()),
        ];
        for (section, env, present) in checks {
            if !present {
                tracing::warn!("⚠️ No API key for [{}] (set {} or {}.api_key)", section, env, section);
            }
        }
        if self.features.web_scraping && self.scraper_api_key().is_none() {
            tracing::warn!("⚠️ web_scraping enabled but SCRAPER_API_KEY is not set");
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.payment.currency, "USDC");
        assert!(config.features.retry);
        assert!(!config.features.enhanced_prompts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[server]
port = 8080

[llm]
model = "claude-3-haiku-20240307"

[features]
enhanced_prompts = true
web_scraping = true

[retry]
max_attempts = 5
initial_delay_ms = 250
multiplier = 1.5
max_delay_ms = 4000
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
        assert!(config.features.enhanced_prompts);
        assert_eq!(config.effective_retry().max_attempts, 5);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PROCURE_TEST_LLM_KEY", "sk-test-123");

        let toml_content = r#"
[llm]
api_key = "${PROCURE_TEST_LLM_KEY}"

[email]
api_key = "${PROCURE_TEST_UNSET_KEY}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.llm_api_key().as_deref(), Some("sk-test-123"));
        assert_eq!(config.email.api_key.as_deref(), Some("${PROCURE_TEST_UNSET_KEY}"));

        std::env::remove_var("PROCURE_TEST_LLM_KEY");
    }

    #[test]
    fn test_retry_flag_disables_policy() {
        let config = AppConfig::from_toml_str("[features]\nretry = false\n").unwrap();
        assert_eq!(config.effective_retry().max_attempts, 1);
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::from_toml_str("[llm]\nbase_url = \"invalid-url\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[retry]\nmax_attempts = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[rfq]\nresponse_days = 365\n").unwrap();
        assert!(config.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[rfq]\ncompany = \"Orbital Robotics\"\nresponse_days = 10\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.rfq.company, "Orbital Robotics");
        assert_eq!(config.rfq.response_days, 10);
    }
}
