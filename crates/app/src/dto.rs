//! Wire-shaped request/response types.
//!
//! Field names are camelCase to match the JSON the dashboard frontend
//! already exchanges with the API. Monetary values travel as integer
//! minor units (`Money` serializes transparently); rendering with a
//! currency symbol and two decimals is the frontend's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_catalog::is_low_stock;
use stockbook_core::{Money, ReceiptId};
use stockbook_infra::projections::{ProductRecord, TransactionKind};
use stockbook_infra::reports::{DashboardStats, StockSummaryReport, StockSummaryRow};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub initial_quantity: u64,
    #[serde(default)]
    pub cost_price: Option<Money>,
    #[serde(default)]
    pub selling_price: Option<Money>,
    #[serde(default)]
    pub min_threshold: Option<u64>,
    #[serde(default)]
    pub max_threshold: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cost_price: Option<Money>,
    #[serde(default)]
    pub selling_price: Option<Money>,
    #[serde(default)]
    pub min_threshold: Option<u64>,
    #[serde(default)]
    pub max_threshold: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockRequest {
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLineRequest {
    pub product_id: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    pub items: Vec<ReceiptLineRequest>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub name: String,
    pub category: String,
    pub initial_quantity: u64,
    pub remaining_quantity: u64,
    pub sold_quantity: u64,
    pub cost_price: Money,
    pub selling_price: Money,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub is_low_stock: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ProductRecord> for ProductDto {
    fn from(r: &ProductRecord) -> Self {
        Self {
            id: r.product_id.to_string(),
            name: r.name.clone(),
            category: r.category.clone(),
            initial_quantity: r.initial_quantity,
            remaining_quantity: r.remaining_quantity,
            sold_quantity: r.sold_quantity(),
            cost_price: r.cost_price,
            selling_price: r.selling_price,
            min_threshold: r.min_threshold,
            max_threshold: r.max_threshold,
            is_low_stock: is_low_stock(r.remaining_quantity, r.min_threshold),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLineDto {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDto {
    pub receipt_id: ReceiptId,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<ReceiptLineDto>,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub product_id: String,
    /// Resolved from the current catalog at read time; a renamed product
    /// shows its new name in history.
    pub product_name: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub quantity: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatsDto {
    pub total_products: u64,
    pub total_quantity: u64,
    pub low_stock: u64,
}

impl From<DashboardStats> for DashboardStatsDto {
    fn from(s: DashboardStats) -> Self {
        Self {
            total_products: s.total_products,
            total_quantity: s.total_quantity,
            low_stock: s.low_stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummaryRowDto {
    pub id: String,
    pub name: String,
    pub initial_quantity: u64,
    pub remaining_quantity: u64,
    pub sold_quantity: u64,
    pub cost_price: Money,
    pub selling_price: Money,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub unit_profit: i64,
    pub total_cost_value: Money,
    pub total_sales_value: Money,
    pub profit: i64,
    pub is_low_stock: bool,
}

impl From<&StockSummaryRow> for StockSummaryRowDto {
    fn from(r: &StockSummaryRow) -> Self {
        Self {
            id: r.product_id.to_string(),
            name: r.name.clone(),
            initial_quantity: r.initial_quantity,
            remaining_quantity: r.remaining_quantity,
            sold_quantity: r.sold_quantity,
            cost_price: r.cost_price,
            selling_price: r.selling_price,
            min_threshold: r.min_threshold,
            max_threshold: r.max_threshold,
            unit_profit: r.unit_profit,
            total_cost_value: r.total_cost_value,
            total_sales_value: r.total_sales_value,
            profit: r.profit,
            is_low_stock: r.is_low_stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummarySummaryDto {
    pub total_items: u64,
    pub total_stock_value: Money,
    pub total_sales_value: Money,
    pub total_profit: i64,
    pub low_stock_items: Vec<StockSummaryRowDto>,
}

/// `GET /reports/stock-summary` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummaryResponse {
    pub data: Vec<StockSummaryRowDto>,
    pub summary: StockSummarySummaryDto,
}

impl From<&StockSummaryReport> for StockSummaryResponse {
    fn from(report: &StockSummaryReport) -> Self {
        Self {
            data: report.rows.iter().map(StockSummaryRowDto::from).collect(),
            summary: StockSummarySummaryDto {
                total_items: report.totals.total_items,
                total_stock_value: report.totals.total_stock_value,
                total_sales_value: report.totals.total_sales_value,
                total_profit: report.totals.total_profit,
                low_stock_items: report
                    .low_stock_items
                    .iter()
                    .map(StockSummaryRowDto::from)
                    .collect(),
            },
        }
    }
}
