use crate::app::services::prompts::{self, PromptVariant, JSON_ONLY_SYSTEM};
use crate::core::json_extract::{extract_json, list_or_field};
use crate::core::planning::spending_limit;
use crate::core::sourcing::{aggregate, dedupe_by_name, vendor_from_value};
use crate::domain::model::{Component, Priority, VendorComparison};
use crate::domain::ports::{LlmClient, VendorScraper};
use crate::utils::error::{ProcureError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcingRequest {
    pub components: Vec<Component>,
    pub budget: f64,
    #[serde(default)]
    pub priorities: Vec<Priority>,
    #[serde(default)]
    pub variant: Option<PromptVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcingResult {
    pub comparisons: Vec<VendorComparison>,
    pub budget: f64,
    pub spending_limit: f64,
    pub priorities: Vec<Priority>,
    pub web_grounded: bool,
}

pub struct VendorSourcing {
    llm: Arc<dyn LlmClient>,
    scraper: Option<Arc<dyn VendorScraper>>,
    default_variant: PromptVariant,
    max_vendors: usize,
    search_results: usize,
    delay: Duration,
}

impl VendorSourcing {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        scraper: Option<Arc<dyn VendorScraper>>,
        default_variant: PromptVariant,
        max_vendors: usize,
        search_results: usize,
        delay: Duration,
    ) -> Self {
        Self {
            llm,
            scraper,
            default_variant,
            max_vendors: max_vendors.max(1),
            search_results,
            delay,
        }
    }

    async fn web_results(&self, component: &Component) -> Vec<String> {
        let Some(scraper) = &self.scraper else {
            return Vec::new();
        };
        let query = format!("{} {} supplier", component.name, component.specification);
        match scraper.search(query.trim(), self.search_results).await {
            Ok(results) => results,
            Err(e) => {
                // 搜尋失敗不影響報價，只是少了佐證
                tracing::warn!("⚠️ Web search for '{}' failed: {}", component.name, e);
                Vec::new()
            }
        }
    }

    async fn source_component(
        &self,
        component: &Component,
        request: &SourcingRequest,
        variant: PromptVariant,
    ) -> Result<VendorComparison> {
        let web_results = self.web_results(component).await;
        let prompt = prompts::vendor_search(
            component,
            request.budget,
            &request.priorities,
            self.max_vendors,
            &web_results,
            variant,
        );
        let reply = self.llm.complete(JSON_ONLY_SYSTEM, &prompt).await?;
        let json = extract_json(&reply)?;

        // 先去重再截斷，重複的名稱不佔名額
        let mut vendors = dedupe_by_name(
            list_or_field(&json, &["vendors", "suppliers"])
                .iter()
                .filter_map(vendor_from_value)
                .collect(),
        );
        vendors.truncate(self.max_vendors);

        Ok(aggregate(component.clone(), vendors))
    }

    /// 逐一為每個零件比價，同時只有一個模型呼叫
    pub async fn source(&self, request: &SourcingRequest) -> Result<SourcingResult> {
        if request.components.is_empty() {
            return Err(ProcureError::validation("no components to source"));
        }
        if !request.budget.is_finite() || request.budget <= 0.0 {
            return Err(ProcureError::validation("budget must be a positive number"));
        }

        let variant = request.variant.unwrap_or(self.default_variant);
        let total = request.components.len();
        let mut comparisons = Vec::with_capacity(total);

        for (index, component) in request.components.iter().enumerate() {
            tracing::info!("🔎 Sourcing {}/{}: {}", index + 1, total, component.name);
            let comparison = self.source_component(component, request, variant).await?;
            tracing::debug!(
                "{} vendor(s) for '{}', price {:.2}-{:.2}",
                comparison.vendors.len(),
                component.name,
                comparison.price_low,
                comparison.price_high
            );
            comparisons.push(comparison);

            if index + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Ok(SourcingResult {
            comparisons,
            budget: request.budget,
            spending_limit: spending_limit(request.budget, &request.priorities),
            priorities: request.priorities.clone(),
            web_grounded: self.scraper.is_some(),
        })
    }
}
