//! Request handlers for the `/api` routes.
//!
//! Handlers stay thin: decode the request, call a service, and let
//! `ProcureError` pick the status code. Bodies and query strings are read
//! through `ApiJson` / `ApiQuery` so malformed input is a 400 as well.

use super::extract::{ApiJson, ApiQuery};
use super::state::AppState;
use crate::app::services::{
    DesignAnalysis, ExecutionReport, PromptVariant, RfqDispatch, SourcingRequest, SourcingResult,
};
use crate::core::planning::build_plan;
use crate::core::rfq::{self, BuyerInfo, RfqDocument};
use crate::domain::model::{
    DeliveryReceipt, EmailMessage, Order, Priority, ProcurementPlan, Vendor, VendorComparison,
};
use crate::domain::ports::Storage;
use crate::utils::error::{ProcureError, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

type Shared = State<Arc<AppState>>;

/// GET /health
pub async fn health(State(state): Shared) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "orders": state.orders.len().await,
        "webScraping": state.config.features.web_scraping,
        "enhancedPrompts": state.config.features.enhanced_prompts,
    }))
}

/// POST /api/upload-design
///
/// multipart 表單：`file` 為設計檔，`variant` 可選 `basic` 或 `enhanced`
pub async fn upload_design(
    State(state): Shared,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<DesignAnalysis>> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut variant: Option<PromptVariant> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload.txt").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((name, bytes.to_vec()));
            }
            Some("variant") => {
                let text = field.text().await.map_err(multipart_error)?;
                variant = Some(text.parse().map_err(ProcureError::validation)?);
            }
            _ => {}
        }
    }

    let (name, bytes) = file.ok_or_else(|| ProcureError::validation("missing 'file' field"))?;
    let analysis = state.design.process(&name, &bytes, variant).await?;
    Ok(Json(analysis))
}

fn multipart_error(e: MultipartError) -> ProcureError {
    ProcureError::validation(format!("invalid multipart body: {}", e))
}

/// POST /api/source-vendors
pub async fn source_vendors(
    State(state): Shared,
    ApiJson(request): ApiJson<SourcingRequest>,
) -> Result<Json<SourcingResult>> {
    let result = state.sourcing.source(&request).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub comparisons: Vec<VendorComparison>,
    pub budget: f64,
    #[serde(default)]
    pub priorities: Vec<Priority>,
}

/// POST /api/procurement-plan
pub async fn procurement_plan(
    State(state): Shared,
    ApiJson(request): ApiJson<PlanRequest>,
) -> Result<Json<ProcurementPlan>> {
    let plan = build_plan(
        &request.comparisons,
        request.budget,
        &request.priorities,
        &state.config.payment.currency,
    )?;
    Ok(Json(plan))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityEdit {
    pub index: usize,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSwap {
    pub index: usize,
    pub vendor: Vendor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustPlanRequest {
    pub plan: ProcurementPlan,
    #[serde(default)]
    pub quantities: Vec<QuantityEdit>,
    #[serde(default)]
    pub vendor_swaps: Vec<VendorSwap>,
    pub priorities: Option<Vec<Priority>>,
}

/// POST /api/procurement-plan/adjust
///
/// 套用買方的調整後回傳重算過的計畫
pub async fn adjust_plan(
    ApiJson(request): ApiJson<AdjustPlanRequest>,
) -> Result<Json<ProcurementPlan>> {
    let mut plan = request.plan;
    for swap in request.vendor_swaps {
        plan.swap_vendor(swap.index, swap.vendor)?;
    }
    for edit in request.quantities {
        plan.set_quantity(edit.index, edit.quantity)?;
    }
    if let Some(priorities) = request.priorities {
        plan.set_priorities(priorities);
    }
    // 用戶端送來的金額一律重算
    plan.recompute();

    let below_moq = plan.items_below_moq().count();
    if below_moq > 0 {
        tracing::info!("📦 Plan {} has {} item(s) below MOQ", plan.id, below_moq);
    }
    Ok(Json(plan))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqRequest {
    pub comparisons: Vec<VendorComparison>,
    pub buyer: Option<BuyerInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RfqOptions {
    #[serde(default)]
    pub bundle: bool,
    #[serde(default)]
    pub send: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqResponse {
    pub documents: Vec<RfqDocument>,
    pub bundle_path: Option<String>,
    pub dispatches: Vec<RfqDispatch>,
}

/// POST /api/rfq[?bundle=true][&send=true]
pub async fn rfq(
    State(state): Shared,
    ApiQuery(options): ApiQuery<RfqOptions>,
    ApiJson(request): ApiJson<RfqRequest>,
) -> Result<Json<RfqResponse>> {
    if request.comparisons.is_empty() {
        return Err(ProcureError::validation("no sourcing results to quote"));
    }
    let buyer = request.buyer.unwrap_or_else(|| state.default_buyer());
    let documents = rfq::generate(&request.comparisons, &buyer, state.config.rfq.response_days);
    tracing::info!("📨 Generated {} RFQ document(s)", documents.len());

    let bundle_path = if options.bundle {
        let bytes = rfq::bundle(&documents)?;
        let name = format!("rfq-{}.zip", Utc::now().format("%Y%m%d%H%M%S"));
        Some(state.storage.write_file(&name, &bytes).await?)
    } else {
        None
    };

    let dispatches = if options.send {
        state.email.send_rfqs(&documents).await
    } else {
        Vec::new()
    };

    Ok(Json(RfqResponse {
        documents,
        bundle_path,
        dispatches,
    }))
}

/// POST /api/send-email
pub async fn send_email(
    State(state): Shared,
    ApiJson(message): ApiJson<EmailMessage>,
) -> Result<Json<DeliveryReceipt>> {
    let receipt = state.email.send(&message).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct ExecutePaymentRequest {
    pub plan: ProcurementPlan,
}

/// POST /api/execute-payment
pub async fn execute_payment(
    State(state): Shared,
    ApiJson(request): ApiJson<ExecutePaymentRequest>,
) -> Result<Json<ExecutionReport>> {
    let mut plan = request.plan;
    // 金額與花費上限以伺服器端重算為準，不信任用戶端的數字
    plan.recompute();
    let report = state.payments.execute(plan).await?;
    Ok(Json(report))
}

/// GET /api/orders
pub async fn list_orders(State(state): Shared) -> Json<Vec<Order>> {
    Json(state.orders.list().await)
}

/// GET /api/orders/{id}
pub async fn get_order(State(state): Shared, Path(id): Path<String>) -> Result<Json<Order>> {
    state
        .orders
        .get(&id)
        .await
        .map(Json)
        .ok_or(ProcureError::NotFound {
            resource: format!("order '{}'", id),
        })
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub save: bool,
}

/// `?save=true` 時回傳存檔路徑的標頭
pub const EXPORT_PATH_HEADER: &str = "x-export-path";

/// GET /api/orders/export[?save=true]
///
/// 一律回傳 CSV；`save=true` 時另存到輸出目錄，路徑放在 `x-export-path`
pub async fn export_orders(
    State(state): Shared,
    ApiQuery(options): ApiQuery<ExportOptions>,
) -> Result<impl IntoResponse> {
    let csv = state.orders.to_csv().await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"orders.csv\""),
    );

    if options.save {
        let name = format!("orders-{}.csv", Utc::now().format("%Y%m%d%H%M%S"));
        let path = state.storage.write_file(&name, csv.as_bytes()).await?;
        tracing::info!("📁 Orders exported to {}", path);
        let value = HeaderValue::from_str(&path).map_err(|e| ProcureError::ProcessingError {
            message: format!("export path is not a valid header value: {}", e),
        })?;
        headers.insert(HeaderName::from_static(EXPORT_PATH_HEADER), value);
    }

    Ok((headers, csv))
}
