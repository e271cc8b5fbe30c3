use crate::app::services::prompts::{self, PromptVariant, JSON_ONLY_SYSTEM};
use crate::core::json_extract::{extract_json, f64_field, list_or_field, str_field, u32_field};
use crate::core::planning::round_cents;
use crate::domain::model::{BomEstimate, BomLine, Component};
use crate::domain::ports::LlmClient;
use crate::utils::error::Result;
use serde_json::Value;
use std::sync::Arc;

pub struct BomEstimator {
    llm: Arc<dyn LlmClient>,
}

impl BomEstimator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn estimate(
        &self,
        components: &[Component],
        variant: PromptVariant,
    ) -> Result<BomEstimate> {
        let prompt = prompts::bom_estimate(components, variant);
        let reply = self.llm.complete(JSON_ONLY_SYSTEM, &prompt).await?;
        let json = extract_json(&reply)?;
        let estimate = parse_estimate(&json, components);

        tracing::info!(
            "📋 BOM estimate: {} lines, ~{:.2} {}",
            estimate.lines.len(),
            estimate.total_estimated_cost,
            estimate.currency
        );
        Ok(estimate)
    }
}

/// 寬鬆解析 BOM 明細，總額一律由明細重算
pub fn parse_estimate(json: &Value, components: &[Component]) -> BomEstimate {
    let lines: Vec<BomLine> = list_or_field(json, &["lines", "items", "bom"])
        .iter()
        .filter_map(|line| {
            let component = str_field(line, &["component", "name"])?;
            let fallback_qty = components
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&component))
                .map(Component::unit_count)
                .unwrap_or(1);
            let single = f64_field(line, &["unitCost", "unit_cost", "price"]);
            let low = f64_field(line, &["unitCostLow", "unit_cost_low", "low"])
                .or(single)
                .unwrap_or(0.0);
            let high = f64_field(line, &["unitCostHigh", "unit_cost_high", "high"])
                .or(single)
                .unwrap_or(low)
                .max(low);

            Some(BomLine {
                component,
                quantity: u32_field(line, &["quantity", "qty"])
                    .unwrap_or(fallback_qty)
                    .max(1),
                unit_cost_low: low,
                unit_cost_high: high,
            })
        })
        .collect();

    let total = round_cents(lines.iter().map(BomLine::midpoint_cost).sum());

    BomEstimate {
        lines,
        total_estimated_cost: total,
        currency: str_field(json, &["currency"]).unwrap_or_else(|| "USD".to_string()),
        notes: str_field(json, &["notes"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_recomputed_from_lines() {
        let json = json!({
            "lines": [
                {"component": "Bolt", "quantity": 10, "unitCostLow": 0.1, "unitCostHigh": 0.3},
                {"component": "Plate", "unitCost": "$12"}
            ],
            "totalEstimatedCost": 99999,
            "notes": "distributor pricing"
        });
        let components = vec![Component::new("plate", "2 pcs", "")];

        let estimate = parse_estimate(&json, &components);

        assert_eq!(estimate.lines.len(), 2);
        assert_eq!(estimate.lines[1].quantity, 2);
        assert_eq!(estimate.lines[1].unit_cost_low, 12.0);
        assert_eq!(estimate.total_estimated_cost, 2.0 + 24.0);
        assert_eq!(estimate.currency, "USD");
        assert_eq!(estimate.notes.as_deref(), Some("distributor pricing"));
    }

    #[test]
    fn test_high_never_below_low() {
        let json = json!([{"component": "Gear", "quantity": 1, "unitCostLow": 5, "unitCostHigh": 3}]);
        let estimate = parse_estimate(&json, &[]);
        assert_eq!(estimate.lines[0].unit_cost_high, 5.0);
    }
}
