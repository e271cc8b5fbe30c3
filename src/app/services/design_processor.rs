use crate::app::services::bom_estimator::BomEstimator;
use crate::app::services::prompts::{self, PromptVariant, JSON_ONLY_SYSTEM};
use crate::core::json_extract::{extract_json, list_or_field, str_field};
use crate::domain::model::{BomEstimate, Component};
use crate::domain::ports::LlmClient;
use crate::utils::error::{ProcureError, Result};
use crate::utils::validation::validate_file_extension;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 模型可直接閱讀的文字格式 CAD / BOM 匯出檔
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "csv", "json", "md", "dxf", "step", "stp", "iges", "igs", "svg", "scad",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignAnalysis {
    pub file_name: String,
    pub variant: PromptVariant,
    pub truncated: bool,
    pub components: Vec<Component>,
    pub bom: BomEstimate,
}

pub struct DesignProcessor {
    llm: Arc<dyn LlmClient>,
    bom: BomEstimator,
    default_variant: PromptVariant,
    max_bytes: usize,
    max_chars: usize,
}

impl DesignProcessor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        default_variant: PromptVariant,
        max_bytes: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            bom: BomEstimator::new(Arc::clone(&llm)),
            llm,
            default_variant,
            max_bytes,
            max_chars,
        }
    }

    pub async fn process(
        &self,
        file_name: &str,
        bytes: &[u8],
        variant: Option<PromptVariant>,
    ) -> Result<DesignAnalysis> {
        let variant = variant.unwrap_or(self.default_variant);
        validate_file_extension("file", file_name, ALLOWED_EXTENSIONS)?;
        if bytes.is_empty() {
            return Err(ProcureError::validation("uploaded file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(ProcureError::validation(format!(
                "uploaded file is {} bytes; the limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let (content, truncated) = decode_text(bytes, self.max_chars)?;
        tracing::info!(
            "📐 Processing design '{}' ({} bytes, {:?} prompts{})",
            file_name,
            bytes.len(),
            variant,
            if truncated { ", truncated" } else { "" }
        );

        let prompt = prompts::component_extraction(file_name, &content, variant);
        let reply = self.llm.complete(JSON_ONLY_SYSTEM, &prompt).await?;
        let components = parse_components(&extract_json(&reply)?);
        if components.is_empty() {
            return Err(ProcureError::model_output(
                "no components were found in the design",
            ));
        }
        tracing::info!("🔩 Extracted {} components", components.len());

        let bom = self.bom.estimate(&components, variant).await?;

        Ok(DesignAnalysis {
            file_name: file_name.to_string(),
            variant,
            truncated,
            components,
            bom,
        })
    }
}

/// 將上傳檔解碼為文字，超過 `max_chars` 字元就截斷
pub fn decode_text(bytes: &[u8], max_chars: usize) -> Result<(String, bool)> {
    let text = String::from_utf8_lossy(bytes);
    let total = text.chars().count().max(1);
    let suspicious = text
        .chars()
        .filter(|c| *c == '\u{FFFD}' || *c == '\0')
        .count();
    // 超過 5% 無法解碼的字元就視為二進位檔
    if suspicious * 20 > total {
        return Err(ProcureError::validation(
            "file looks binary; export the design as DXF, STEP, IGES or CSV",
        ));
    }

    if text.chars().count() > max_chars {
        Ok((text.chars().take(max_chars).collect(), true))
    } else {
        Ok((text.into_owned(), false))
    }
}

pub fn parse_components(json: &Value) -> Vec<Component> {
    list_or_field(json, &["components", "parts", "items"])
        .iter()
        .filter_map(|item| {
            Some(Component {
                name: str_field(item, &["name", "component", "partName"])?,
                quantity: str_field(item, &["quantity", "qty"]).unwrap_or_else(|| "1".to_string()),
                specification: str_field(item, &["specification", "spec", "description", "material"])
                    .unwrap_or_default(),
            })
        })
        .collect()
}
