use crate::adapters::{AnthropicClient, HttpScraper, LocalStorage, McpPaymentClient, ResendClient};
use crate::app::services::{
    DesignProcessor, EmailSender, PaymentExecutor, PromptVariant, VendorSourcing,
};
use crate::config::AppConfig;
use crate::core::crm::OrderLog;
use crate::core::rfq::BuyerInfo;
use crate::domain::ports::{EmailProvider, LlmClient, PaymentRail, VendorScraper};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// 所有 handler 共用的狀態，包在 `Arc` 裡
pub struct AppState {
    pub config: AppConfig,
    pub design: DesignProcessor,
    pub sourcing: VendorSourcing,
    pub email: EmailSender,
    pub payments: PaymentExecutor,
    pub orders: OrderLog,
    pub storage: LocalStorage,
}

impl AppState {
    /// 依配置建立各個 HTTP adapter 並組裝服務
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let retry = config.effective_retry();

        let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::new(
            &config.llm.base_url,
            config.llm_api_key(),
            &config.llm.model,
            config.llm.max_tokens,
            Duration::from_secs(config.llm.timeout_seconds),
            retry,
        )?);

        let email: Arc<dyn EmailProvider> = Arc::new(ResendClient::new(
            &config.email.base_url,
            config.email_api_key(),
            &config.email.from,
            retry,
        ));

        let rail: Arc<dyn PaymentRail> = Arc::new(McpPaymentClient::new(
            &config.payment.base_url,
            config.payment_api_key(),
            &config.payment.tool_name,
            &config.payment.network,
            Duration::from_secs(config.payment.timeout_seconds),
        )?);

        let scraper: Option<Arc<dyn VendorScraper>> = if config.features.web_scraping {
            Some(Arc::new(HttpScraper::new(
                &config.scraper.base_url,
                config.scraper_api_key(),
                retry,
            )))
        } else {
            None
        };

        Ok(Self::with_ports(config, llm, scraper, email, rail))
    }

    /// 以現成的 port 組裝狀態（測試用）
    pub fn with_ports(
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        scraper: Option<Arc<dyn VendorScraper>>,
        email: Arc<dyn EmailProvider>,
        rail: Arc<dyn PaymentRail>,
    ) -> Self {
        let variant = PromptVariant::from_flag(config.features.enhanced_prompts);
        let orders = OrderLog::new();

        Self {
            design: DesignProcessor::new(
                Arc::clone(&llm),
                variant,
                config.server.max_upload_bytes,
                config.llm.max_design_chars,
            ),
            sourcing: VendorSourcing::new(
                llm,
                scraper,
                variant,
                config.sourcing.max_vendors_per_component,
                config.scraper.results_per_query,
                Duration::from_millis(config.sourcing.delay_between_components_ms),
            ),
            email: EmailSender::new(email),
            payments: PaymentExecutor::new(rail, orders.clone()),
            storage: LocalStorage::new(config.server.output_path.clone()),
            orders,
            config,
        }
    }

    /// 取得 `[rfq]` 區段的買方資訊
    pub fn default_buyer(&self) -> BuyerInfo {
        BuyerInfo {
            company: self.config.rfq.company.clone(),
            contact_name: self.config.rfq.contact_name.clone(),
            email: self.config.rfq.contact_email.clone(),
        }
    }
}
