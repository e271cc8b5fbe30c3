use crate::domain::model::Order;
use crate::utils::error::{ProcureError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 所有請求共用的記憶體內訂單紀錄，重啟後即消失
#[derive(Debug, Clone, Default)]
pub struct OrderLog {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl OrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, order: Order) {
        tracing::info!(
            "🗂️ Recording order {} ({:?}, {} tx)",
            order.id,
            order.status,
            order.transactions.len()
        );
        self.orders.write().await.push(order);
    }

    /// 最新的在前
    pub async fn list(&self) -> Vec<Order> {
        let orders = self.orders.read().await;
        orders.iter().rev().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<Order> {
        let orders = self.orders.read().await;
        orders.iter().find(|o| o.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// One CSV row per order line, oldest order first. A line settled by an
    /// earlier order of the same plan has an empty `tx_hash` and
    /// `previously_paid = true`, so each transaction appears once.
    pub async fn to_csv(&self) -> Result<String> {
        let orders = self.orders.read().await;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "order_id",
            "created_at",
            "status",
            "component",
            "vendor",
            "quantity",
            "total",
            "tx_hash",
            "previously_paid",
        ])?;

        for order in orders.iter() {
            let created_at = order.created_at.to_rfc3339();
            let status = format!("{:?}", order.status).to_lowercase();
            for line in &order.items {
                let quantity = line.quantity.to_string();
                let total = format!("{:.2}", line.total);
                writer.write_record([
                    order.id.as_str(),
                    created_at.as_str(),
                    status.as_str(),
                    line.component.as_str(),
                    line.vendor.as_str(),
                    quantity.as_str(),
                    total.as_str(),
                    line.tx_hash.as_deref().unwrap_or(""),
                    if line.previously_paid { "true" } else { "false" },
                ])?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ProcureError::ProcessingError {
                message: format!("failed to flush CSV: {}", e),
            })?;
        String::from_utf8(bytes).map_err(|e| ProcureError::ProcessingError {
            message: format!("CSV is not valid UTF-8: {}", e),
        })
    }
}
