use crate::core::rfq::RfqDocument;
use crate::domain::model::{DeliveryReceipt, EmailMessage};
use crate::domain::ports::EmailProvider;
use crate::utils::error::{ProcureError, Result};
use crate::utils::validation::{is_valid_email, validate_non_empty_string};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_RECIPIENTS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqDispatch {
    pub reference: String,
    pub vendor: String,
    pub receipt: Option<DeliveryReceipt>,
    pub error: Option<String>,
}

pub struct EmailSender {
    provider: Arc<dyn EmailProvider>,
}

impl EmailSender {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self { provider }
    }

    pub fn validate(message: &EmailMessage) -> Result<()> {
        if message.to.is_empty() {
            return Err(ProcureError::validation("at least one recipient is required"));
        }
        if message.to.len() > MAX_RECIPIENTS {
            return Err(ProcureError::validation(format!(
                "at most {} recipients per message",
                MAX_RECIPIENTS
            )));
        }
        if let Some(bad) = message.to.iter().find(|addr| !is_valid_email(addr)) {
            return Err(ProcureError::validation(format!(
                "invalid recipient address '{}'",
                bad
            )));
        }
        validate_non_empty_string("subject", &message.subject)?;
        validate_non_empty_string("body", &message.body)?;
        Ok(())
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt> {
        Self::validate(message)?;
        let mut normalized = message.clone();
        normalized.to = message.to.iter().map(|a| a.trim().to_string()).collect();
        self.provider.send(&normalized).await
    }

    /// 逐一寄出 RFQ；沒有信箱的供應商略過，單封失敗不影響其他
    pub async fn send_rfqs(&self, docs: &[RfqDocument]) -> Vec<RfqDispatch> {
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let outcome = if doc.recipient.is_empty() {
                Err(ProcureError::validation("vendor has no email address"))
            } else {
                let message = EmailMessage {
                    to: vec![doc.recipient.clone()],
                    subject: doc.subject.clone(),
                    body: text_to_html(&doc.body),
                };
                self.send(&message).await
            };

            if let Err(e) = &outcome {
                tracing::warn!("⚠️ RFQ {} to '{}' not sent: {}", doc.reference, doc.vendor, e);
            }
            results.push(RfqDispatch {
                reference: doc.reference.clone(),
                vendor: doc.vendor.clone(),
                error: outcome.as_ref().err().map(|e| e.user_friendly_message()),
                receipt: outcome.ok(),
            });
        }
        results
    }
}

fn text_to_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<pre style=\"font-family: sans-serif\">{}</pre>", escaped)
}
