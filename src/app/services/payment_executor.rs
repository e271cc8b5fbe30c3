use crate::core::crm::OrderLog;
use crate::core::execution::{extract_tx_hash, ExecutionStep, PaymentRun, PaymentStatus};
use crate::domain::model::{Order, ProcurementPlan};
use crate::domain::ports::PaymentRail;
use crate::utils::error::{ProcureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub run_id: String,
    pub step: ExecutionStep,
    pub statuses: Vec<PaymentStatus>,
    pub order: Order,
}

/// 透過付款通道執行採購計畫並記錄訂單，同一計畫同時只會有一個執行
pub struct PaymentExecutor {
    rail: Arc<dyn PaymentRail>,
    orders: OrderLog,
    runs: RwLock<HashMap<String, PaymentRun>>,
    in_flight: Mutex<HashSet<String>>,
}

/// 執行結束（含提早返回）時釋放該計畫的鎖
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    plan_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.plan_id);
        }
    }
}

/// 比較決定付款對象與金額的欄位
fn same_payload(a: &ProcurementPlan, b: &ProcurementPlan) -> bool {
    a.currency == b.currency
        && a.items.len() == b.items.len()
        && a.items.iter().zip(&b.items).all(|(x, y)| {
            x.vendor.wallet_address == y.vendor.wallet_address
                && x.quantity == y.quantity
                && (x.total - y.total).abs() < 0.005
        })
}

impl PaymentExecutor {
    pub fn new(rail: Arc<dyn PaymentRail>, orders: OrderLog) -> Self {
        Self {
            rail,
            orders,
            runs: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn acquire(&self, plan_id: &str) -> Result<InFlightGuard<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| ProcureError::ProcessingError {
                message: "payment lock poisoned".to_string(),
            })?;
        if !set.insert(plan_id.to_string()) {
            return Err(ProcureError::validation(format!(
                "a payment for plan {} is already in progress",
                plan_id
            )));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            plan_id: plan_id.to_string(),
        })
    }

    /// 取得計畫最近一次的執行
    pub async fn run_for(&self, plan_id: &str) -> Option<PaymentRun> {
        self.runs.read().await.get(plan_id).cloned()
    }

    pub async fn execute(&self, plan: ProcurementPlan) -> Result<ExecutionReport> {
        let _guard = self.acquire(&plan.id)?;

        let mut run = match self.runs.read().await.get(&plan.id) {
            Some(previous) if previous.all_paid() => {
                return Err(ProcureError::validation(format!(
                    "plan {} is already fully paid",
                    plan.id
                )));
            }
            Some(previous) if previous.statuses.iter().any(|s| s.tx_hash().is_some()) => {
                if !same_payload(&previous.plan, &plan) {
                    return Err(ProcureError::validation(format!(
                        "plan {} changed after a partial payment; build a new plan",
                        plan.id
                    )));
                }
                PaymentRun::resume(previous)
            }
            _ => PaymentRun::new(plan),
        };

        tracing::info!(
            "💸 Executing plan {} ({} items, {:.2} {})",
            run.plan.id,
            run.plan.items.len(),
            run.plan.total_cost,
            run.plan.currency
        );

        run.advance()?;
        if let Err(e) = run.validate() {
            run.fail(e.to_string());
            self.store(run).await;
            return Err(e);
        }
        run.advance()?;
        run.advance()?;

        for index in run.unpaid_items() {
            let Some(request) = run.transfer_request(index) else {
                continue;
            };
            match self.rail.transfer(&request).await {
                Ok(output) => match extract_tx_hash(&output) {
                    Some(tx) => run.mark_sent(index, tx),
                    None => run.mark_failed(index, "no transaction hash in payment response"),
                },
                Err(e) => {
                    tracing::error!("❌ Transfer {} failed: {}", request.idempotency_key, e);
                    run.mark_failed(index, e.to_string());
                }
            }
        }

        run.advance()?;
        if run.all_paid() {
            run.advance()?;
            tracing::info!("✅ Plan {} fully paid", run.plan.id);
        } else {
            let unpaid = run.unpaid_items().len();
            run.fail(format!("{} item(s) unpaid; execute again to retry them", unpaid));
            tracing::warn!("⚠️ Plan {} has {} unpaid item(s)", run.plan.id, unpaid);
        }

        let order = run.to_order();
        self.orders.record(order.clone()).await;

        let report = ExecutionReport {
            run_id: run.id.clone(),
            step: run.step,
            statuses: run.statuses.clone(),
            order,
        };
        self.store(run).await;
        Ok(report)
    }

    async fn store(&self, run: PaymentRun) {
        self.runs.write().await.insert(run.plan.id.clone(), run);
    }
}
