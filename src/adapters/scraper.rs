use crate::core::json_extract::{array_field, str_field};
use crate::core::retry::{retry, RetryPolicy};
use crate::domain::ports::VendorScraper;
use crate::utils::error::{ProcureError, Result};
use async_trait::async_trait;
use reqwest::Client;

/// 網頁搜尋服務，為供應商建議提供依據
pub struct HttpScraper {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpScraper {
    pub fn new(base_url: &str, api_key: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry,
        }
    }

    async fn search_once(&self, api_key: &str, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/v1/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "query": query, "limit": limit }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcureError::UpstreamError {
                service: "scraper".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        let snippets = array_field(&json, &["data", "results"])
            .iter()
            .filter_map(|hit| {
                let url = str_field(hit, &["url", "link"])?;
                let title = str_field(hit, &["title"]).unwrap_or_else(|| url.clone());
                let description = str_field(hit, &["description", "snippet"]).unwrap_or_default();
                Some(format!("{} ({}): {}", title, url, description))
            })
            .take(limit)
            .collect();

        Ok(snippets)
    }
}

#[async_trait]
impl VendorScraper for HttpScraper {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProcureError::MissingConfigError {
                field: "scraper.api_key".to_string(),
            })?;

        retry(&self.retry, "vendor search", || {
            self.search_once(api_key, query, limit)
        })
        .await
    }
}
