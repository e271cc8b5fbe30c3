use crate::domain::model::{
    Component, Priority, ProcurementItem, ProcurementPlan, Vendor, VendorComparison,
};
use crate::utils::error::{ProcureError, Result};
use std::collections::BTreeSet;

const BASE_WEIGHT: f64 = 1.0;
const PRIORITY_WEIGHT: f64 = 2.0;

/// 單一優先順序對花費上限的調整倍率
pub fn priority_multiplier(priority: Priority) -> f64 {
    match priority {
        Priority::Cost => 0.90,
        Priority::Speed => 1.15,
        Priority::Quality => 1.10,
        Priority::Reliability => 1.05,
        Priority::Sustainability => 1.08,
    }
}

/// 所有不重複優先順序倍率的乘積
pub fn spending_multiplier(priorities: &[Priority]) -> f64 {
    priorities
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(priority_multiplier)
        .product()
}

pub fn spending_limit(budget: f64, priorities: &[Priority]) -> f64 {
    round_cents(budget * spending_multiplier(priorities))
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn normalized_inverse(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (max - value) / (max - min)
    } else {
        1.0
    }
}

/// Picks the best vendor for the given priorities.
///
/// Vendors without a positive unit price are never chosen. Price and lead
/// time are normalized across the candidates (lower is better); quality and
/// reliability use their 0-10 scores. Ties go to the earlier vendor.
pub fn select_vendor(vendors: &[Vendor], priorities: &[Priority]) -> Option<usize> {
    let candidates: Vec<(usize, &Vendor)> = vendors
        .iter()
        .enumerate()
        .filter(|(_, v)| v.price_per_unit > 0.0)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let weight = |p: Priority| {
        if priorities.contains(&p) {
            BASE_WEIGHT + PRIORITY_WEIGHT
        } else {
            BASE_WEIGHT
        }
    };

    let (min_price, max_price) = candidates.iter().fold((f64::MAX, f64::MIN), |(lo, hi), (_, v)| {
        (lo.min(v.price_per_unit), hi.max(v.price_per_unit))
    });
    let (min_lead, max_lead) = candidates.iter().fold((f64::MAX, f64::MIN), |(lo, hi), (_, v)| {
        let lead = v.lead_time_days as f64;
        (lo.min(lead), hi.max(lead))
    });

    let mut best: Option<(usize, f64)> = None;
    for (index, vendor) in candidates {
        let score = weight(Priority::Cost)
            * normalized_inverse(vendor.price_per_unit, min_price, max_price)
            + weight(Priority::Speed)
                * normalized_inverse(vendor.lead_time_days as f64, min_lead, max_lead)
            + weight(Priority::Quality) * vendor.quality_score / 10.0
            + weight(Priority::Reliability) * vendor.reliability_score / 10.0;

        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, _)| index)
}

impl ProcurementItem {
    pub fn new(component: Component, vendor: Vendor, quantity: u32) -> Self {
        let mut item = Self {
            unit_price: vendor.price_per_unit,
            shipping: vendor.shipping_cost,
            component,
            vendor,
            quantity: quantity.max(1),
            subtotal: 0.0,
            total: 0.0,
            below_moq: false,
        };
        item.recompute();
        item
    }

    pub fn recompute(&mut self) {
        self.quantity = self.quantity.max(1);
        self.subtotal = round_cents(self.unit_price * self.quantity as f64);
        self.total = round_cents(self.subtotal + self.shipping);
        self.below_moq = self.quantity < self.vendor.moq;
    }
}

impl ProcurementPlan {
    pub fn new(items: Vec<ProcurementItem>, budget: f64, priorities: Vec<Priority>, currency: &str) -> Self {
        let mut plan = Self {
            id: uuid::Uuid::new_v4().to_string(),
            items,
            subtotal: 0.0,
            shipping_total: 0.0,
            total_cost: 0.0,
            budget,
            spending_limit: 0.0,
            within_budget: false,
            priorities,
            currency: currency.to_string(),
        };
        plan.recompute();
        plan
    }

    /// 由項目重算所有合計，任何修改後都要呼叫
    pub fn recompute(&mut self) {
        for item in &mut self.items {
            item.recompute();
        }
        self.subtotal = round_cents(self.items.iter().map(|i| i.subtotal).sum());
        self.shipping_total = round_cents(self.items.iter().map(|i| i.shipping).sum());
        self.total_cost = round_cents(self.items.iter().map(|i| i.total).sum());
        self.spending_limit = spending_limit(self.budget, &self.priorities);
        self.within_budget = self.total_cost <= self.spending_limit;
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut ProcurementItem> {
        let len = self.items.len();
        self.items.get_mut(index).ok_or_else(|| {
            ProcureError::validation(format!(
                "item index {} out of range (plan has {} items)",
                index, len
            ))
        })
    }

    /// 數量最少為 1
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Result<()> {
        self.item_mut(index)?.quantity = quantity.max(1);
        self.recompute();
        Ok(())
    }

    pub fn swap_vendor(&mut self, index: usize, vendor: Vendor) -> Result<()> {
        let item = self.item_mut(index)?;
        item.unit_price = vendor.price_per_unit;
        item.shipping = vendor.shipping_cost;
        item.vendor = vendor;
        self.recompute();
        Ok(())
    }

    pub fn set_priorities(&mut self, priorities: Vec<Priority>) {
        self.priorities = priorities;
        self.recompute();
    }

    pub fn items_below_moq(&self) -> impl Iterator<Item = &ProcurementItem> {
        self.items.iter().filter(|i| i.below_moq)
    }
}

/// 建立採購計畫，每個有可選供應商的零件一個項目
pub fn build_plan(
    comparisons: &[VendorComparison],
    budget: f64,
    priorities: &[Priority],
    currency: &str,
) -> Result<ProcurementPlan> {
    if !budget.is_finite() || budget <= 0.0 {
        return Err(ProcureError::validation("budget must be a positive number"));
    }

    let mut items = Vec::with_capacity(comparisons.len());
    for comparison in comparisons {
        match select_vendor(&comparison.vendors, priorities) {
            Some(index) => items.push(ProcurementItem::new(
                comparison.component.clone(),
                comparison.vendors[index].clone(),
                comparison.component.unit_count(),
            )),
            None => tracing::warn!(
                "⚠️ No priced vendor for '{}', leaving it out of the plan",
                comparison.component.name
            ),
        }
    }

    let plan = ProcurementPlan::new(items, budget, priorities.to_vec(), currency);
    tracing::info!(
        "🧮 Plan {}: {} items, total {:.2} {} (limit {:.2})",
        plan.id,
        plan.items.len(),
        plan.total_cost,
        plan.currency,
        plan.spending_limit
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor(name: &str, price: f64, lead: u32, quality: f64, reliability: f64) -> Vendor {
        Vendor {
            name: name.to_string(),
            price_per_unit: price,
            lead_time_days: lead,
            quality_score: quality,
            reliability_score: reliability,
            moq: 1,
            ..Default::default()
        }
    }

    fn comparison(name: &str, qty: &str, vendors: Vec<Vendor>) -> VendorComparison {
        VendorComparison {
            component: Component::new(name, qty, ""),
            vendors,
            recommended: None,
            price_low: 0.0,
            price_high: 0.0,
            fastest_lead_time_days: None,
        }
    }

    #[test]
    fn test_multipliers_compose_multiplicatively() {
        let m = spending_multiplier(&[Priority::Speed, Priority::Quality]);
        assert!((m - 1.15 * 1.10).abs() < 1e-12);

        let reversed = spending_multiplier(&[Priority::Quality, Priority::Speed]);
        assert_eq!(m, reversed);

        assert_eq!(spending_multiplier(&[]), 1.0);
    }

    #[test]
    fn test_duplicate_priorities_count_once() {
        assert_eq!(
            spending_multiplier(&[Priority::Cost, Priority::Cost]),
            spending_multiplier(&[Priority::Cost])
        );
    }

    #[test]
    fn test_spending_limit() {
        assert_eq!(spending_limit(1000.0, &[Priority::Cost]), 900.0);
        assert_eq!(spending_limit(1000.0, &[]), 1000.0);
    }

    #[test]
    fn test_select_vendor_follows_priorities() {
        let vendors = vec![
            vendor("Cheap&Slow", 1.0, 30, 5.0, 5.0),
            vendor("Pricey&Fast", 3.0, 2, 5.0, 5.0),
        ];
        assert_eq!(select_vendor(&vendors, &[Priority::Cost]), Some(0));
        assert_eq!(select_vendor(&vendors, &[Priority::Speed]), Some(1));
    }

    #[test]
    fn test_select_vendor_skips_unpriced_and_breaks_ties_first() {
        let vendors = vec![
            vendor("Unknown", 0.0, 1, 10.0, 10.0),
            vendor("A", 2.0, 5, 8.0, 8.0),
            vendor("B", 2.0, 5, 8.0, 8.0),
        ];
        assert_eq!(select_vendor(&vendors, &[]), Some(1));
        assert_eq!(select_vendor(&[vendor("Unknown", 0.0, 1, 1.0, 1.0)], &[]), None);
    }

    #[test]
    fn test_total_is_sum_of_price_times_quantity_plus_shipping() {
        let mut a = vendor("A", 2.5, 5, 8.0, 8.0);
        a.shipping_cost = 10.0;
        let mut b = vendor("B", 12.0, 5, 8.0, 8.0);
        b.shipping_cost = 4.5;

        let plan = build_plan(
            &[comparison("Bolt", "4", vec![a]), comparison("Plate", "3 pcs", vec![b])],
            500.0,
            &[],
            "USDC",
        )
        .unwrap();

        assert_eq!(plan.subtotal, 2.5 * 4.0 + 12.0 * 3.0);
        assert_eq!(plan.shipping_total, 14.5);
        assert_eq!(plan.total_cost, 10.0 + 36.0 + 14.5);
        assert!(plan.within_budget);
    }

    #[test]
    fn test_quantity_edit_never_drops_below_one() {
        let plan_vendor = vendor("A", 5.0, 5, 8.0, 8.0);
        let mut plan = build_plan(
            &[comparison("Bolt", "10", vec![plan_vendor])],
            1000.0,
            &[],
            "USDC",
        )
        .unwrap();

        plan.set_quantity(0, 0).unwrap();
        assert_eq!(plan.items[0].quantity, 1);
        assert_eq!(plan.total_cost, 5.0);
        assert!(plan.set_quantity(3, 2).is_err());
    }

    #[test]
    fn test_budget_check_uses_spending_limit() {
        let plan_vendor = vendor("A", 95.0, 5, 8.0, 8.0);
        let mut plan = build_plan(
            &[comparison("Motor", "1", vec![plan_vendor])],
            100.0,
            &[],
            "USDC",
        )
        .unwrap();
        assert!(plan.within_budget);

        plan.set_priorities(vec![Priority::Cost]);
        assert_eq!(plan.spending_limit, 90.0);
        assert!(!plan.within_budget);
    }

    #[test]
    fn test_swap_vendor_and_moq_flag() {
        let mut plan = build_plan(
            &[comparison("Bolt", "10", vec![vendor("A", 1.0, 5, 8.0, 8.0)])],
            1000.0,
            &[],
            "USDC",
        )
        .unwrap();

        let mut bulk = vendor("Bulk", 0.5, 10, 7.0, 7.0);
        bulk.moq = 100;
        plan.swap_vendor(0, bulk).unwrap();

        assert_eq!(plan.items[0].vendor.name, "Bulk");
        assert_eq!(plan.total_cost, 5.0);
        assert_eq!(plan.items_below_moq().count(), 1);
    }

    #[test]
    fn test_build_plan_rejects_non_positive_budget() {
        assert!(build_plan(&[], 0.0, &[], "USDC").is_err());
        assert!(build_plan(&[], f64::NAN, &[], "USDC").is_err());
    }
}
