use crate::domain::model::{Component, Priority};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    #[default]
    Basic,
    Enhanced,
}

impl PromptVariant {
    pub fn from_flag(enhanced: bool) -> Self {
        if enhanced {
            PromptVariant::Enhanced
        } else {
            PromptVariant::Basic
        }
    }
}

impl std::str::FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(PromptVariant::Basic),
            "enhanced" => Ok(PromptVariant::Enhanced),
            other => Err(format!("unknown prompt variant '{}'", other)),
        }
    }
}

pub const JSON_ONLY_SYSTEM: &str = "You are a hardware procurement assistant. \
Respond with a single valid JSON value and nothing else. Do not wrap it in markdown.";

pub fn component_extraction(file_name: &str, content: &str, variant: PromptVariant) -> String {
    let detail = match variant {
        PromptVariant::Basic => "",
        PromptVariant::Enhanced => {
            "\nFor every part also capture material, tolerances, finish and any standard \
(ISO/DIN/ANSI) it references inside \"specification\". Split assemblies into purchasable \
parts and merge identical parts by summing their quantities."
        }
    };

    format!(
        "Extract the bill of purchasable components from the engineering design file \"{file_name}\".\n\
Return JSON of the form {{\"components\": [{{\"name\": string, \"quantity\": string, \"specification\": string}}]}}.{detail}\n\n\
--- FILE CONTENT ---\n{content}\n--- END FILE ---"
    )
}

fn component_lines(components: &[Component]) -> String {
    components
        .iter()
        .map(|c| format!("- {} (qty {}): {}", c.name, c.quantity, c.specification))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn bom_estimate(components: &[Component], variant: PromptVariant) -> String {
    let detail = match variant {
        PromptVariant::Basic => "",
        PromptVariant::Enhanced => {
            "\nBase the ranges on current distributor pricing at the given quantity and mention \
assumptions in \"notes\"."
        }
    };

    format!(
        "Estimate the unit cost range in USD for each component below.\n\
Return JSON {{\"lines\": [{{\"component\": string, \"quantity\": number, \"unitCostLow\": number, \
\"unitCostHigh\": number}}], \"notes\": string}}.{detail}\n\n{}",
        component_lines(components)
    )
}

pub fn vendor_search(
    component: &Component,
    budget: f64,
    priorities: &[Priority],
    max_vendors: usize,
    web_results: &[String],
    variant: PromptVariant,
) -> String {
    let priorities = if priorities.is_empty() {
        "none".to_string()
    } else {
        priorities
            .iter()
            .map(Priority::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let grounding = if web_results.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nPrefer vendors that appear in these search results:\n{}",
            web_results.join("\n")
        )
    };

    let detail = match variant {
        PromptVariant::Basic => "",
        PromptVariant::Enhanced => {
            "\nScore reliabilityScore and qualityScore from 0 to 10 using certifications, \
reviews and years in business. Include shippingCost for the full quantity."
        }
    };

    format!(
        "Find up to {max_vendors} vendors that can supply this component.\n\
Component: {} (quantity {})\nSpecification: {}\nTotal project budget: {budget:.2} USD\n\
Buyer priorities: {priorities}\n\
Return JSON {{\"vendors\": [{{\"name\": string, \"pricePerUnit\": number, \"priceLow\": number, \
\"priceHigh\": number, \"leadTimeDays\": number, \"moq\": number, \"reliabilityScore\": number, \
\"qualityScore\": number, \"shippingCost\": number, \"walletAddress\": string, \"email\": string, \
\"website\": string, \"location\": string}}]}}.{detail}{grounding}",
        component.name, component.quantity, component.specification
    )
}
