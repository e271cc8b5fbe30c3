//! Payment run bookkeeping.
//!
//! A run walks a fixed sequence of steps and never goes backwards. Item
//! payment statuses survive into a resumed run so a second execution of the
//! same plan only submits what has not been paid yet.

use crate::domain::model::{
    AuditEntry, Order, OrderLine, OrderStatus, ProcurementPlan, TransferRequest,
};
use crate::core::planning::round_cents;
use crate::utils::error::{ProcureError, Result};
use crate::utils::validation::is_valid_wallet_address;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStep {
    Pending,
    Validating,
    Approved,
    Submitting,
    Confirming,
    Completed,
    Failed,
}

impl ExecutionStep {
    pub fn next(self) -> Option<Self> {
        match self {
            ExecutionStep::Pending => Some(ExecutionStep::Validating),
            ExecutionStep::Validating => Some(ExecutionStep::Approved),
            ExecutionStep::Approved => Some(ExecutionStep::Submitting),
            ExecutionStep::Submitting => Some(ExecutionStep::Confirming),
            ExecutionStep::Confirming => Some(ExecutionStep::Completed),
            ExecutionStep::Completed | ExecutionStep::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStep::Pending => "pending",
            ExecutionStep::Validating => "validating",
            ExecutionStep::Approved => "approved",
            ExecutionStep::Submitting => "submitting",
            ExecutionStep::Confirming => "confirming",
            ExecutionStep::Completed => "completed",
            ExecutionStep::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// `Carried` 表示款項是在先前的執行中付出的，本次不再計入訂單金額
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PaymentStatus {
    Pending,
    Sent { tx_hash: String },
    Carried { tx_hash: String },
    Failed { reason: String },
}

impl PaymentStatus {
    /// Hash of the transfer that paid this item, in this run or an earlier one.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            PaymentStatus::Sent { tx_hash } | PaymentStatus::Carried { tx_hash } => Some(tx_hash),
            _ => None,
        }
    }

    pub fn is_carried(&self) -> bool {
        matches!(self, PaymentStatus::Carried { .. })
    }
}

fn tx_hash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b0x[0-9a-fA-F]{64}\b").unwrap())
}

/// First transaction hash (0x + 64 hex) found in free-form tool output.
pub fn extract_tx_hash(text: &str) -> Option<String> {
    tx_hash_regex().find(text).map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRun {
    pub id: String,
    pub plan: ProcurementPlan,
    pub step: ExecutionStep,
    pub statuses: Vec<PaymentStatus>,
    pub audit_trail: Vec<AuditEntry>,
}

impl PaymentRun {
    pub fn new(plan: ProcurementPlan) -> Self {
        let statuses = vec![PaymentStatus::Pending; plan.items.len()];
        let mut run = Self {
            id: uuid::Uuid::new_v4().to_string(),
            plan,
            step: ExecutionStep::Pending,
            statuses,
            audit_trail: Vec::new(),
        };
        let message = format!("Payment run for plan {}", run.plan.id);
        run.log("created", message);
        run
    }

    /// 為同一計畫開新的執行，已付款的項目標為 `Carried`
    pub fn resume(previous: &PaymentRun) -> Self {
        let mut run = Self::new(previous.plan.clone());
        for (status, old) in run.statuses.iter_mut().zip(&previous.statuses) {
            if let Some(tx_hash) = old.tx_hash() {
                *status = PaymentStatus::Carried {
                    tx_hash: tx_hash.to_string(),
                };
            }
        }
        let carried = run.statuses.iter().filter(|s| s.tx_hash().is_some()).count();
        run.log(
            "resumed",
            format!("Resuming after run {}; {} item(s) already paid", previous.id, carried),
        );
        run
    }

    pub fn log(&mut self, step: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("📝 [{}] {}: {}", self.id, step, message);
        self.audit_trail.push(AuditEntry {
            timestamp: Utc::now(),
            step: step.to_string(),
            message,
        });
    }

    /// 前進一步；終止狀態不能再前進
    pub fn advance(&mut self) -> Result<ExecutionStep> {
        let next = self.step.next().ok_or_else(|| {
            ProcureError::payment(format!("run {} is already {}", self.id, self.step))
        })?;
        self.step = next;
        let label = next.to_string();
        self.log(&label, format!("Entered step {}", next));
        Ok(next)
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.step = ExecutionStep::Failed;
        self.log("failed", reason);
    }

    pub fn validate(&self) -> Result<()> {
        if self.plan.items.is_empty() {
            return Err(ProcureError::payment("plan has no items"));
        }

        for item in &self.plan.items {
            if !is_valid_wallet_address(&item.vendor.wallet_address) {
                return Err(ProcureError::payment(format!(
                    "vendor '{}' has no valid wallet address",
                    item.vendor.name
                )));
            }
            if item.total <= 0.0 {
                return Err(ProcureError::payment(format!(
                    "item '{}' has a non-positive total",
                    item.component.name
                )));
            }
        }

        if self.plan.total_cost > self.plan.spending_limit {
            return Err(ProcureError::PaymentError {
                message: format!(
                    "total {:.2} exceeds spending limit {:.2}",
                    self.plan.total_cost, self.plan.spending_limit
                ),
                budget_exceeded: true,
            });
        }

        Ok(())
    }

    /// 每個計畫項目固定的冪等鍵，讓付款 API 能擋下重複請求
    pub fn idempotency_key(&self, index: usize) -> String {
        format!("{}-{}", self.plan.id, index)
    }

    pub fn transfer_request(&self, index: usize) -> Option<TransferRequest> {
        let item = self.plan.items.get(index)?;
        Some(TransferRequest {
            to_address: item.vendor.wallet_address.clone(),
            amount: item.total,
            currency: self.plan.currency.clone(),
            memo: format!(
                "PO {} / {} x{}",
                self.plan.id, item.component.name, item.quantity
            ),
            idempotency_key: self.idempotency_key(index),
        })
    }

    pub fn unpaid_items(&self) -> Vec<usize> {
        self.statuses
            .iter()
            .enumerate()
            .filter(|(_, s)| s.tx_hash().is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn mark_sent(&mut self, index: usize, tx_hash: String) {
        if let Some(status) = self.statuses.get_mut(index) {
            *status = PaymentStatus::Sent {
                tx_hash: tx_hash.clone(),
            };
            self.log("submitting", format!("Item {} paid, tx {}", index, tx_hash));
        }
    }

    pub fn mark_failed(&mut self, index: usize, reason: impl Into<String>) {
        let reason = reason.into();
        if let Some(status) = self.statuses.get_mut(index) {
            *status = PaymentStatus::Failed {
                reason: reason.clone(),
            };
            self.log("submitting", format!("Item {} failed: {}", index, reason));
        }
    }

    pub fn all_paid(&self) -> bool {
        self.statuses.iter().all(|s| s.tx_hash().is_some())
    }

    /// Order for this run. Amounts and hashes only cover transfers submitted
    /// here; items paid by an earlier run are listed as `previouslyPaid`.
    pub fn to_order(&self) -> Order {
        let items: Vec<OrderLine> = self
            .plan
            .items
            .iter()
            .zip(&self.statuses)
            .map(|(item, status)| OrderLine {
                component: item.component.name.clone(),
                vendor: item.vendor.name.clone(),
                quantity: item.quantity,
                total: item.total,
                tx_hash: match status {
                    PaymentStatus::Sent { tx_hash } => Some(tx_hash.clone()),
                    _ => None,
                },
                previously_paid: status.is_carried(),
            })
            .collect();

        let paid = items
            .iter()
            .filter(|l| l.tx_hash.is_some() || l.previously_paid)
            .count();
        let status = match paid {
            0 => OrderStatus::Failed,
            n if n == items.len() => OrderStatus::Completed,
            _ => OrderStatus::Partial,
        };

        Order {
            id: format!("ORD-{}", &self.id[..8.min(self.id.len())].to_uppercase()),
            plan_id: self.plan.id.clone(),
            created_at: Utc::now(),
            status,
            total_paid: round_cents(
                items
                    .iter()
                    .filter(|l| l.tx_hash.is_some())
                    .map(|l| l.total)
                    .sum(),
            ),
            transactions: items.iter().filter_map(|l| l.tx_hash.clone()).collect(),
            items,
            audit_trail: self.audit_trail.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Component, ProcurementItem, Vendor};

    const WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn hash(c: char) -> String {
        format!("0x{}", c.to_string().repeat(64))
    }

    fn plan(wallet: &str, price: f64, budget: f64) -> ProcurementPlan {
        let vendor = Vendor {
            name: "Acme".to_string(),
            price_per_unit: price,
            wallet_address: wallet.to_string(),
            moq: 1,
            ..Default::default()
        };
        let items = vec![
            ProcurementItem::new(Component::new("Bolt", "10", ""), vendor.clone(), 10),
            ProcurementItem::new(Component::new("Nut", "10", ""), vendor, 10),
        ];
        ProcurementPlan::new(items, budget, vec![], "USDC")
    }

    #[test]
    fn test_steps_only_move_forward() {
        let mut run = PaymentRun::new(plan(WALLET, 1.0, 100.0));
        let mut seen = vec![run.step];
        while let Ok(step) = run.advance() {
            seen.push(step);
        }
        assert_eq!(
            seen,
            vec![
                ExecutionStep::Pending,
                ExecutionStep::Validating,
                ExecutionStep::Approved,
                ExecutionStep::Submitting,
                ExecutionStep::Confirming,
                ExecutionStep::Completed,
            ]
        );
        assert!(run.advance().is_err());
    }

    #[test]
    fn test_failed_run_cannot_advance() {
        let mut run = PaymentRun::new(plan(WALLET, 1.0, 100.0));
        run.fail("operator cancelled");
        assert!(run.advance().is_err());
        assert_eq!(run.audit_trail.last().unwrap().step, "failed");
    }

    #[test]
    fn test_validate_rejects_bad_wallet_and_budget() {
        assert!(PaymentRun::new(plan("not-a-wallet", 1.0, 100.0)).validate().is_err());

        let err = PaymentRun::new(plan(WALLET, 10.0, 50.0)).validate().unwrap_err();
        assert!(matches!(
            err,
            ProcureError::PaymentError {
                budget_exceeded: true,
                ..
            }
        ));

        assert!(PaymentRun::new(plan(WALLET, 1.0, 100.0)).validate().is_ok());
    }

    #[test]
    fn test_extract_tx_hash() {
        let tx = hash('a');
        let text = format!("Transfer submitted! Transaction hash: {}. It should confirm soon.", tx);
        assert_eq!(extract_tx_hash(&text), Some(tx));
        assert_eq!(extract_tx_hash("wallet 0x742d35Cc6634C0532925a3b844Bc454e4438f44e"), None);
        assert_eq!(extract_tx_hash("no hash here"), None);
    }

    #[test]
    fn test_resume_keeps_paid_items() {
        let mut first = PaymentRun::new(plan(WALLET, 1.0, 100.0));
        first.mark_sent(0, hash('b'));
        first.mark_failed(1, "timeout");

        let second = PaymentRun::resume(&first);
        assert_ne!(second.id, first.id);
        assert_eq!(second.step, ExecutionStep::Pending);
        assert_eq!(second.unpaid_items(), vec![1]);
        assert_eq!(second.idempotency_key(0), first.idempotency_key(0));
        assert_eq!(
            second.statuses[0],
            PaymentStatus::Carried { tx_hash: hash('b') }
        );

        // 連續兩次續跑，已付款項仍然保留
        let third = PaymentRun::resume(&second);
        assert_eq!(third.unpaid_items(), vec![1]);
    }

    #[test]
    fn test_resumed_order_only_counts_its_own_transfers() {
        let mut first = PaymentRun::new(plan(WALLET, 1.5, 100.0));
        first.mark_sent(0, hash('e'));
        first.mark_failed(1, "timeout");
        let first_order = first.to_order();
        assert_eq!(first_order.total_paid, 15.0);
        assert_eq!(first_order.transactions, vec![hash('e')]);

        let mut second = PaymentRun::resume(&first);
        second.mark_sent(1, hash('f'));
        let order = second.to_order();

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total_paid, 15.0);
        assert_eq!(order.transactions, vec![hash('f')]);
        assert!(order.items[0].previously_paid);
        assert_eq!(order.items[0].tx_hash, None);
        assert!(!order.items[1].previously_paid);
        assert_eq!(order.items[1].tx_hash, Some(hash('f')));

        // 兩張訂單加總等於實際付出的金額
        assert_eq!(first_order.total_paid + order.total_paid, first.plan.total_cost);
    }

    #[test]
    fn test_to_order_status_and_totals() {
        let mut run = PaymentRun::new(plan(WALLET, 1.5, 100.0));
        assert_eq!(run.to_order().status, OrderStatus::Failed);

        run.mark_sent(0, hash('c'));
        let partial = run.to_order();
        assert_eq!(partial.status, OrderStatus::Partial);
        assert_eq!(partial.total_paid, 15.0);
        assert_eq!(partial.transactions, vec![hash('c')]);

        run.mark_sent(1, hash('d'));
        let complete = run.to_order();
        assert_eq!(complete.status, OrderStatus::Completed);
        assert_eq!(complete.total_paid, 30.0);
        assert!(complete.id.starts_with("ORD-"));
        assert!(!complete.audit_trail.is_empty());
    }

    #[test]
    fn test_transfer_request_carries_idempotency_key() {
        let run = PaymentRun::new(plan(WALLET, 2.0, 100.0));
        let req = run.transfer_request(1).unwrap();
        assert_eq!(req.amount, 20.0);
        assert_eq!(req.currency, "USDC");
        assert_eq!(req.idempotency_key, format!("{}-1", run.plan.id));
        assert!(run.transfer_request(2).is_none());
    }
}
