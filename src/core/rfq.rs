use crate::domain::model::VendorComparison;
use crate::utils::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInfo {
    pub company: String,
    pub contact_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqItem {
    pub component: String,
    pub quantity: String,
    pub specification: String,
    pub target_lead_time_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqDocument {
    pub reference: String,
    pub vendor: String,
    pub recipient: String,
    pub subject: String,
    pub items: Vec<RfqItem>,
    pub issued_at: DateTime<Utc>,
    pub respond_by: DateTime<Utc>,
    pub body: String,
}

/// 每個供應商一份 RFQ，列出該供應商報價的所有零件。
///
/// 參考編號格式為 `RFQ-YYYYMMDD-XXXXXX-NNN`：`XXXXXX` 是這一批的隨機碼，
/// 同一天多次產生也不會重複；`NNN` 是批次內的序號。
pub fn generate(
    comparisons: &[VendorComparison],
    buyer: &BuyerInfo,
    response_days: i64,
) -> Vec<RfqDocument> {
    let issued_at = Utc::now();
    let respond_by = issued_at + Duration::days(response_days.max(1));
    let batch = batch_code();

    // 依供應商分組，保留第一次出現的順序
    let mut grouped: Vec<(String, String, Vec<RfqItem>)> = Vec::new();
    for comparison in comparisons {
        for vendor in &comparison.vendors {
            let item = RfqItem {
                component: comparison.component.name.clone(),
                quantity: comparison.component.quantity.clone(),
                specification: comparison.component.specification.clone(),
                target_lead_time_days: comparison.fastest_lead_time_days,
            };
            let key = vendor.name.trim().to_lowercase();
            match grouped.iter_mut().find(|(k, _, _)| *k == key) {
                Some((_, _, items)) => items.push(item),
                None => grouped.push((key, vendor.name.clone(), vec![item])),
            }
        }
    }

    let recipients: Vec<(String, String)> = comparisons
        .iter()
        .flat_map(|c| c.vendors.iter())
        .map(|v| (v.name.trim().to_lowercase(), v.email.clone()))
        .collect();

    grouped
        .into_iter()
        .enumerate()
        .map(|(index, (key, vendor, items))| {
            let recipient = recipients
                .iter()
                .find(|(k, email)| *k == key && !email.is_empty())
                .map(|(_, email)| email.clone())
                .unwrap_or_default();
            let reference = format!(
                "RFQ-{}-{}-{:03}",
                issued_at.format("%Y%m%d"),
                batch,
                index + 1
            );
            let mut doc = RfqDocument {
                subject: format!("{}: Request for Quote from {}", reference, buyer.company),
                reference,
                vendor,
                recipient,
                items,
                issued_at,
                respond_by,
                body: String::new(),
            };
            doc.body = render_text(&doc, buyer);
            doc
        })
        .collect()
}

fn batch_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

pub fn render_text(doc: &RfqDocument, buyer: &BuyerInfo) -> String {
    let mut lines = vec![
        format!("Request for Quote {}", doc.reference),
        format!("Issued: {}", doc.issued_at.format("%Y-%m-%d")),
        format!("Please respond by: {}", doc.respond_by.format("%Y-%m-%d")),
        String::new(),
        format!("Dear {} team,", doc.vendor),
        String::new(),
        format!(
            "{} requests a quotation for the following items:",
            buyer.company
        ),
        String::new(),
    ];

    for (i, item) in doc.items.iter().enumerate() {
        lines.push(format!("{}. {} (qty: {})", i + 1, item.component, item.quantity));
        if !item.specification.is_empty() {
            lines.push(format!("   Spec: {}", item.specification));
        }
        if let Some(days) = item.target_lead_time_days {
            lines.push(format!("   Target lead time: {} days", days));
        }
    }

    lines.extend([
        String::new(),
        "Please include unit price, MOQ, lead time, shipping cost and a USDC wallet address for payment.".to_string(),
        String::new(),
        "Regards,".to_string(),
        buyer.contact_name.clone(),
        format!("{} <{}>", buyer.company, buyer.email),
    ]);

    lines.join("\n")
}

/// 打包成 zip：每份 RFQ 一個文字檔，另附 JSON 清單
pub fn bundle(docs: &[RfqDocument]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for doc in docs {
        zip.start_file::<_, ()>(format!("{}.txt", doc.reference), FileOptions::default())?;
        zip.write_all(doc.body.as_bytes())?;
    }

    zip.start_file::<_, ()>("manifest.json", FileOptions::default())?;
    let manifest: Vec<serde_json::Value> = docs
        .iter()
        .map(|d| {
            serde_json::json!({
                "reference": d.reference,
                "vendor": d.vendor,
                "recipient": d.recipient,
                "items": d.items.len(),
                "respondBy": d.respond_by,
            })
        })
        .collect();
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Component, Vendor};

    fn buyer() -> BuyerInfo {
        BuyerInfo {
            company: "Orbital Robotics".to_string(),
            contact_name: "Sam Lee".to_string(),
            email: "buying@orbital.test".to_string(),
        }
    }

    fn comparison(component: &str, vendors: &[(&str, &str)]) -> VendorComparison {
        VendorComparison {
            component: Component::new(component, "20", "Stainless, M4"),
            vendors: vendors
                .iter()
                .map(|(name, email)| Vendor {
                    name: name.to_string(),
                    email: email.to_string(),
                    ..Default::default()
                })
                .collect(),
            recommended: None,
            price_low: 0.0,
            price_high: 0.0,
            fastest_lead_time_days: Some(5),
        }
    }

    #[test]
    fn test_generate_groups_by_vendor() {
        let docs = generate(
            &[
                comparison("Bolt", &[("Acme", "a@acme.test"), ("Globex", "")]),
                comparison("Nut", &[("ACME ", ""), ("Initech", "i@initech.test")]),
            ],
            &buyer(),
            7,
        );

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].vendor, "Acme");
        assert_eq!(docs[0].items.len(), 2);
        assert_eq!(docs[0].recipient, "a@acme.test");
        assert_eq!(docs[1].recipient, "");
        assert!(docs[0].body.contains("1. Bolt (qty: 20)"));
        assert!(docs[0].body.contains("2. Nut (qty: 20)"));
        assert!(docs[0].subject.contains("Orbital Robotics"));
        assert_eq!((docs[0].respond_by - docs[0].issued_at).num_days(), 7);
    }

    #[test]
    fn test_references_differ_between_batches_on_the_same_day() {
        let comparisons = [comparison("Bolt", &[("Acme", ""), ("Globex", "")])];
        let first = generate(&comparisons, &buyer(), 7);
        let second = generate(&comparisons, &buyer(), 7);

        let today = Utc::now().format("%Y%m%d").to_string();
        assert!(first[0].reference.starts_with(&format!("RFQ-{}-", today)));
        assert!(first[0].reference.ends_with("-001"));
        assert!(first[1].reference.ends_with("-002"));
        assert_eq!(first[0].reference.len(), "RFQ-YYYYMMDD-XXXXXX-001".len());

        // 同一批共用隨機碼，不同批次不會撞號
        assert_eq!(first[0].reference[..19], first[1].reference[..19]);
        assert_ne!(first[0].reference, second[0].reference);
        assert_ne!(first[1].reference, second[1].reference);
    }

    #[test]
    fn test_bundle_contains_docs_and_manifest() {
        let docs = generate(&[comparison("Bolt", &[("Acme", ""), ("Globex", "")])], &buyer(), 7);
        let bytes = bundle(&docs).unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names[2], "manifest.json");
        assert!(names[0].ends_with("-001.txt"));
    }
}
