use crate::domain::model::TransferRequest;
use crate::domain::ports::PaymentRail;
use crate::utils::error::{ProcureError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<ToolResult>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ToolResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Deserialize)]
struct ToolContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Calls a remote MCP server's payment tool over JSON-RPC.
///
/// Each call is sent exactly once. The caller decides whether a failed item
/// may be resubmitted; the idempotency key travels as a header and argument.
pub struct McpPaymentClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    tool_name: String,
    network: String,
    next_id: AtomicU64,
}

impl McpPaymentClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        tool_name: &str,
        network: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.to_string(),
            api_key,
            tool_name: tool_name.to_string(),
            network: network.to_string(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl PaymentRail for McpPaymentClient {
    async fn transfer(&self, request: &TransferRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProcureError::MissingConfigError {
                field: "payment.api_key".to_string(),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {
                "name": self.tool_name,
                "arguments": {
                    "to": request.to_address,
                    "amount": format!("{:.2}", request.amount),
                    "currency": request.currency,
                    "network": self.network,
                    "memo": request.memo,
                    "idempotencyKey": request.idempotency_key,
                }
            }
        });

        tracing::info!(
            "💸 Submitting {:.2} {} to {} ({})",
            request.amount,
            request.currency,
            request.to_address,
            request.idempotency_key
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcureError::UpstreamError {
                service: "payment".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let rpc: RpcResponse = response.json().await?;
        if let Some(error) = rpc.error {
            return Err(ProcureError::payment(format!(
                "tool call rejected ({}): {}",
                error.code, error.message
            )));
        }

        let result = rpc
            .result
            .ok_or_else(|| ProcureError::payment("tool call returned neither result nor error"))?;
        let text = result
            .content
            .into_iter()
            .filter(|c| c.kind == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error {
            return Err(ProcureError::payment(text));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn request() -> TransferRequest {
        TransferRequest {
            to_address: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string(),
            amount: 12.5,
            currency: "USDC".to_string(),
            memo: "PO test".to_string(),
            idempotency_key: "plan-1-0".to_string(),
        }
    }

    fn client(endpoint: String) -> McpPaymentClient {
        McpPaymentClient::new(
            &endpoint,
            Some("pk_test".to_string()),
            "send_usdc",
            "base-sepolia",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transfer_returns_tool_text() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/mcp")
                .header("idempotency-key", "plan-1-0")
                .json_body_partial(
                    r#"{"method": "tools/call", "params": {"name": "send_usdc", "arguments": {"amount": "12.50", "network": "base-sepolia"}}}"#,
                );
            then.status(200).json_body(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "content": [{"type": "text", "text": "Sent! tx: 0xabc"}],
                    "isError": false
                }
            }));
        });

        let text = client(server.url("/mcp")).transfer(&request()).await.unwrap();

        api_mock.assert();
        assert_eq!(text, "Sent! tx: 0xabc");
    }

    #[tokio::test]
    async fn test_tool_error_is_payment_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/mcp");
            then.status(200).json_body(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "content": [{"type": "text", "text": "insufficient USDC balance"}],
                    "isError": true
                }
            }));
        });

        let err = client(server.url("/mcp")).transfer(&request()).await.unwrap_err();
        assert!(matches!(err, ProcureError::PaymentError { .. }));
        assert!(err.to_string().contains("insufficient USDC balance"));
    }

    #[tokio::test]
    async fn test_rpc_error_is_payment_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/mcp");
            then.status(200).json_body(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "unknown tool"}
            }));
        });

        let err = client(server.url("/mcp")).transfer(&request()).await.unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }
}
