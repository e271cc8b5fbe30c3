use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 從設計檔擷取出的零件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    /// 保留模型原本的字串（例如 "4 pcs"）
    pub quantity: String,
    #[serde(default)]
    pub specification: String,
}

impl Component {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>, specification: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            specification: specification.into(),
        }
    }

    /// `quantity` 開頭的整數，最少為 1
    pub fn unit_count(&self) -> u32 {
        let digits: String = self
            .quantity
            .trim()
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u32>().unwrap_or(1).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    pub component: String,
    pub quantity: u32,
    pub unit_cost_low: f64,
    pub unit_cost_high: f64,
}

impl BomLine {
    pub fn midpoint_cost(&self) -> f64 {
        (self.unit_cost_low + self.unit_cost_high) / 2.0 * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomEstimate {
    pub lines: Vec<BomLine>,
    pub total_estimated_cost: f64,
    pub currency: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vendor {
    pub name: String,
    pub price_per_unit: f64,
    pub price_range: Option<PriceRange>,
    pub lead_time_days: u32,
    pub moq: u32,
    /// 0-10
    pub reliability_score: f64,
    /// 0-10
    pub quality_score: f64,
    pub shipping_cost: f64,
    pub wallet_address: String,
    pub email: String,
    pub website: Option<String>,
    pub location: Option<String>,
}

impl Vendor {
    /// 此供應商報價的最低與最高單價
    pub fn price_bounds(&self) -> (f64, f64) {
        match self.price_range {
            Some(range) => (
                range.low.min(self.price_per_unit),
                range.high.max(self.price_per_unit),
            ),
            None => (self.price_per_unit, self.price_per_unit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorComparison {
    pub component: Component,
    pub vendors: Vec<Vendor>,
    pub recommended: Option<usize>,
    pub price_low: f64,
    pub price_high: f64,
    pub fastest_lead_time_days: Option<u32>,
}

/// 採購優先順序；反序列化不分大小寫（`"Cost"`、`"SPEED"` 皆可）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Priority {
    Cost,
    Speed,
    Quality,
    Reliability,
    Sustainability,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Cost,
        Priority::Speed,
        Priority::Quality,
        Priority::Reliability,
        Priority::Sustainability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Cost => "cost",
            Priority::Speed => "speed",
            Priority::Quality => "quality",
            Priority::Reliability => "reliability",
            Priority::Sustainability => "sustainability",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Priority::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| format!("unknown priority '{}'", s))
    }
}

impl TryFrom<String> for Priority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementItem {
    pub component: Component,
    pub vendor: Vendor,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
    #[serde(default)]
    pub below_moq: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementPlan {
    pub id: String,
    pub items: Vec<ProcurementItem>,
    pub subtotal: f64,
    pub shipping_total: f64,
    pub total_cost: f64,
    pub budget: f64,
    pub spending_limit: f64,
    pub within_budget: bool,
    pub priorities: Vec<Priority>,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub component: String,
    pub vendor: String,
    pub quantity: u32,
    pub total: f64,
    pub tx_hash: Option<String>,
    /// 由同一計畫先前的訂單付款
    #[serde(default)]
    pub previously_paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub step: String,
    pub message: String,
}

/// 一次付款執行的歷史紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub plan_id: String,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub total_paid: f64,
    pub transactions: Vec<String>,
    pub audit_trail: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub id: String,
    pub recipients: usize,
}

/// 交給付款通道的一筆轉帳請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub to_address: String,
    pub amount: f64,
    pub currency: String,
    pub memo: String,
    pub idempotency_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_count_parses_leading_integer() {
        assert_eq!(Component::new("M3 screw", "12", "").unit_count(), 12);
        assert_eq!(Component::new("M3 screw", "4 pcs", "").unit_count(), 4);
        assert_eq!(Component::new("M3 screw", "x2", "").unit_count(), 2);
    }

    #[test]
    fn test_unit_count_never_below_one() {
        assert_eq!(Component::new("Housing", "", "").unit_count(), 1);
        assert_eq!(Component::new("Housing", "0", "").unit_count(), 1);
        assert_eq!(Component::new("Housing", "as needed", "").unit_count(), 1);
    }

    #[test]
    fn test_priority_parsing_is_case_insensitive() {
        assert_eq!("Cost".parse::<Priority>().unwrap(), Priority::Cost);
        assert_eq!(" SPEED ".parse::<Priority>().unwrap(), Priority::Speed);
        assert!("cheapness".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_json_is_case_insensitive_and_serializes_lowercase() {
        let priorities: Vec<Priority> =
            serde_json::from_str(r#"["Cost", "SPEED", "quality"]"#).unwrap();
        assert_eq!(
            priorities,
            vec![Priority::Cost, Priority::Speed, Priority::Quality]
        );
        assert_eq!(
            serde_json::to_string(&priorities).unwrap(),
            r#"["cost","speed","quality"]"#
        );

        let err = serde_json::from_str::<Priority>(r#""cheapness""#).unwrap_err();
        assert!(err.to_string().contains("unknown priority"));
    }

    #[test]
    fn test_vendor_price_bounds_include_unit_price() {
        let vendor = Vendor {
            price_per_unit: 4.0,
            price_range: Some(PriceRange { low: 4.5, high: 6.0 }),
            ..Default::default()
        };
        assert_eq!(vendor.price_bounds(), (4.0, 6.0));
    }
}
