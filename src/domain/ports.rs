use crate::domain::model::{DeliveryReceipt, EmailMessage, TransferRequest};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 匯出檔（RFQ 壓縮檔、訂單 CSV）的存放位置，回傳寫入後的完整路徑
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// 託管模型的文字進、文字出介面
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt>;
}

/// 遠端付款工具，回傳工具的自由格式文字輸出
#[async_trait]
pub trait PaymentRail: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<String>;
}

#[async_trait]
pub trait VendorScraper: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}
