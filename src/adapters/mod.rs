// Adapters layer: concrete implementations of the domain ports.

pub mod email;
pub mod llm;
pub mod payment;
pub mod scraper;
pub mod storage;

pub use email::ResendClient;
pub use llm::AnthropicClient;
pub use payment::McpPaymentClient;
pub use scraper::HttpScraper;
pub use storage::LocalStorage;
