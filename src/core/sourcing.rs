use crate::core::json_extract::{f64_field, str_field, u32_field};
use crate::core::planning::select_vendor;
use crate::domain::model::{Component, PriceRange, Vendor, VendorComparison};
use serde_json::Value;
use std::collections::HashSet;

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 10.0)
}

/// 由模型回傳的 JSON 物件建立供應商，缺的欄位補預設值
pub fn vendor_from_value(value: &Value) -> Option<Vendor> {
    let name = str_field(value, &["name", "vendorName", "vendor", "supplier"])?;

    let low = f64_field(value, &["priceLow", "minPrice", "price_low"]);
    let high = f64_field(value, &["priceHigh", "maxPrice", "price_high"]);
    let price_range = match (low, high) {
        (Some(low), Some(high)) if low <= high => Some(PriceRange { low, high }),
        (Some(high), Some(low)) => Some(PriceRange { low, high }),
        _ => None,
    };

    let price_per_unit = f64_field(value, &["pricePerUnit", "unitPrice", "price", "price_per_unit"])
        .or_else(|| price_range.map(|r| (r.low + r.high) / 2.0))
        .unwrap_or(0.0);

    Some(Vendor {
        name,
        price_per_unit,
        price_range,
        lead_time_days: u32_field(value, &["leadTimeDays", "leadTime", "lead_time_days", "lead_time"])
            .unwrap_or(0),
        moq: u32_field(value, &["moq", "MOQ", "minimumOrderQuantity"])
            .unwrap_or(1)
            .max(1),
        reliability_score: clamp_score(
            f64_field(value, &["reliabilityScore", "reliability", "reliability_score"]).unwrap_or(0.0),
        ),
        quality_score: clamp_score(
            f64_field(value, &["qualityScore", "quality", "quality_score"]).unwrap_or(0.0),
        ),
        shipping_cost: f64_field(value, &["shippingCost", "shipping", "shipping_cost"]).unwrap_or(0.0),
        wallet_address: str_field(value, &["walletAddress", "wallet", "wallet_address"]).unwrap_or_default(),
        email: str_field(value, &["email", "contactEmail", "contact_email"]).unwrap_or_default(),
        website: str_field(value, &["website", "url"]),
        location: str_field(value, &["location", "country"]),
    })
}

/// 依名稱去重（去空白、不分大小寫），保留第一次出現的那一筆
pub fn dedupe_by_name(vendors: Vec<Vendor>) -> Vec<Vendor> {
    let mut seen = HashSet::new();
    vendors
        .into_iter()
        .filter(|v| seen.insert(v.name.trim().to_lowercase()))
        .collect()
}

/// Deduplicates vendors and computes the comparison roll-ups for one component.
///
/// Vendors are deduplicated by trimmed, case-insensitive name; the first
/// occurrence wins. The price range spans every quoted unit price and range.
pub fn aggregate(component: Component, vendors: Vec<Vendor>) -> VendorComparison {
    let vendors = dedupe_by_name(vendors);

    let priced: Vec<(f64, f64)> = vendors
        .iter()
        .filter(|v| v.price_per_unit > 0.0)
        .map(Vendor::price_bounds)
        .collect();
    let price_low = priced.iter().map(|(lo, _)| *lo).fold(f64::INFINITY, f64::min);
    let price_high = priced.iter().map(|(_, hi)| *hi).fold(0.0, f64::max);

    VendorComparison {
        recommended: select_vendor(&vendors, &[]),
        price_low: if price_low.is_finite() { price_low } else { 0.0 },
        price_high,
        fastest_lead_time_days: vendors
            .iter()
            .map(|v| v.lead_time_days)
            .filter(|d| *d > 0)
            .min(),
        component,
        vendors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vendor_from_value_fills_defaults() {
        let v = vendor_from_value(&json!({
            "name": "Acme Fasteners",
            "price": "$0.12",
            "leadTime": "7 days",
            "reliabilityScore": 14,
            "email": "sales@acme.test"
        }))
        .unwrap();

        assert_eq!(v.price_per_unit, 0.12);
        assert_eq!(v.lead_time_days, 7);
        assert_eq!(v.moq, 1);
        assert_eq!(v.reliability_score, 10.0);
        assert_eq!(v.quality_score, 0.0);
        assert_eq!(v.wallet_address, "");
    }

    #[test]
    fn test_vendor_from_value_requires_name() {
        assert!(vendor_from_value(&json!({"price": 3})).is_none());
    }

    #[test]
    fn test_price_from_range_midpoint() {
        let v = vendor_from_value(&json!({"name": "X", "priceLow": 2, "priceHigh": 4})).unwrap();
        assert_eq!(v.price_per_unit, 3.0);
        assert_eq!(v.price_range, Some(PriceRange { low: 2.0, high: 4.0 }));
    }

    #[test]
    fn test_aggregate_dedupes_and_spans_prices() {
        let vendors = vec![
            Vendor {
                name: "Acme".to_string(),
                price_per_unit: 5.0,
                price_range: Some(PriceRange { low: 4.0, high: 6.0 }),
                lead_time_days: 10,
                ..Default::default()
            },
            Vendor {
                name: " acme ".to_string(),
                price_per_unit: 1.0,
                ..Default::default()
            },
            Vendor {
                name: "Globex".to_string(),
                price_per_unit: 8.0,
                lead_time_days: 3,
                ..Default::default()
            },
            Vendor {
                name: "NoQuote".to_string(),
                price_per_unit: 0.0,
                ..Default::default()
            },
        ];

        let cmp = aggregate(Component::new("Shaft", "2", ""), vendors);

        assert_eq!(cmp.vendors.len(), 3);
        assert_eq!(cmp.vendors[0].price_per_unit, 5.0);
        assert_eq!(cmp.price_low, 4.0);
        assert_eq!(cmp.price_high, 8.0);
        assert_eq!(cmp.fastest_lead_time_days, Some(3));
        assert!(cmp.recommended.is_some());
    }

    #[test]
    fn test_aggregate_empty() {
        let cmp = aggregate(Component::new("Shaft", "2", ""), vec![]);
        assert_eq!(cmp.price_low, 0.0);
        assert_eq!(cmp.price_high, 0.0);
        assert_eq!(cmp.recommended, None);
        assert_eq!(cmp.fastest_lead_time_days, None);
    }
}
