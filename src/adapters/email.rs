use crate::core::retry::{retry, RetryPolicy};
use crate::domain::model::{DeliveryReceipt, EmailMessage};
use crate::domain::ports::EmailProvider;
use crate::utils::error::{ProcureError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// Resend 風格的交易郵件 API
pub struct ResendClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    from: String,
    retry: RetryPolicy,
}

impl ResendClient {
    pub fn new(base_url: &str, api_key: Option<String>, from: &str, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            from: from.to_string(),
            retry,
        }
    }

    async fn send_once(
        &self,
        api_key: &str,
        idempotency_key: &str,
        message: &EmailMessage,
    ) -> Result<DeliveryReceipt> {
        let url = format!("{}/emails", self.base_url);
        let payload = serde_json::json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "html": message.body,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcureError::UpstreamError {
                service: "email".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response.json().await?;
        Ok(DeliveryReceipt {
            id: parsed.id,
            recipients: message.to.len(),
        })
    }
}

#[async_trait]
impl EmailProvider for ResendClient {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProcureError::MissingConfigError {
                field: "email.api_key".to_string(),
            })?;

        // 同一封信重試時沿用同一個 key，避免重複寄送
        let idempotency_key = uuid::Uuid::new_v4().to_string();
        let receipt = retry(&self.retry, "email send", || {
            self.send_once(api_key, &idempotency_key, message)
        })
        .await?;

        tracing::info!("📧 Email {} sent to {} recipient(s)", receipt.id, receipt.recipients);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["sales@acme.test".to_string(), "ops@acme.test".to_string()],
            subject: "RFQ-001".to_string(),
            body: "<p>Please quote</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_returns_receipt() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/emails")
                .header("authorization", "Bearer re_test")
                .header_exists("idempotency-key")
                .json_body_partial(r#"{"subject": "RFQ-001", "to": ["sales@acme.test", "ops@acme.test"]}"#);
            then.status(200).json_body(serde_json::json!({"id": "email_123"}));
        });

        let client = ResendClient::new(
            &server.base_url(),
            Some("re_test".to_string()),
            "Buyer <buyer@orbital.test>",
            RetryPolicy::disabled(),
        );
        let receipt = client.send(&message()).await.unwrap();

        api_mock.assert();
        assert_eq!(receipt.id, "email_123");
        assert_eq!(receipt.recipients, 2);
    }

    #[tokio::test]
    async fn test_rejected_send_is_upstream_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/emails");
            then.status(422).body("invalid from address");
        });

        let client = ResendClient::new(
            &server.base_url(),
            Some("re_test".to_string()),
            "bad",
            RetryPolicy::disabled(),
        );
        let err = client.send(&message()).await.unwrap_err();

        match err {
            ProcureError::UpstreamError { status, body, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body, "invalid from address");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
