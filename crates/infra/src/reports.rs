//! Report aggregation over the catalog read model.
//!
//! Every report here is a pure query: one pass over the current catalog
//! rows, recomputed on each call, nothing cached and nothing mutated.
//! All per-product figures go through [`stockbook_catalog::classify`] so
//! the dashboard, the low-stock page, and the stock report can never
//! disagree on what "low stock" or "profit" means.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockbook_catalog::{classify, is_low_stock, ProductId};
use stockbook_core::Money;

use crate::projections::{ProductCatalogProjection, ProductRecord};
use crate::read_model::ReadModelStore;

/// Headline dashboard figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_products: u64,
    /// Sum of remaining quantities across the catalog.
    pub total_quantity: u64,
    /// Number of products below their minimum threshold.
    pub low_stock: u64,
}

/// One row of the stock summary report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryRow {
    pub product_id: ProductId,
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

/// Aggregate totals across all rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryTotals {
    pub total_items: u64,
    /// Σ remaining × cost price.
    pub total_stock_value: Money,
    /// Σ sold × selling price.
    pub total_sales_value: Money,
    /// Σ per-row profit, in signed minor units.
    pub total_profit: i64,
}

/// The full stock summary: per-product rows, totals, and the low-stock
/// sublist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryReport {
    pub rows: Vec<StockSummaryRow>,
    pub totals: StockSummaryTotals,
    pub low_stock_items: Vec<StockSummaryRow>,
}

/// Read-only report queries over the catalog projection.
#[derive(Debug)]
pub struct ReportAggregator<S>
where
    S: ReadModelStore<ProductId, ProductRecord>,
{
    catalog: Arc<ProductCatalogProjection<S>>,
}

impl<S> ReportAggregator<S>
where
    S: ReadModelStore<ProductId, ProductRecord>,
{
    pub fn new(catalog: Arc<ProductCatalogProjection<S>>) -> Self {
        Self { catalog }
    }

    /// Dashboard stats: one O(n) pass over the catalog. An empty catalog
    /// yields all zeroes.
    pub fn dashboard_stats(&self) -> DashboardStats {
        let rows = self.catalog.list();

        let total_products = rows.len() as u64;
        let total_quantity = rows.iter().map(|r| r.remaining_quantity).sum();
        let low_stock = rows
            .iter()
            .filter(|r| is_low_stock(r.remaining_quantity, r.min_threshold))
            .count() as u64;

        DashboardStats {
            total_products,
            total_quantity,
            low_stock,
        }
    }

    /// Products currently below threshold, in catalog insertion order.
    ///
    /// An explicitly supplied `threshold` overrides every product's own
    /// `min_threshold`; otherwise each product is judged against its own.
    pub fn low_stock_list(&self, threshold: Option<u64>) -> Vec<ProductRecord> {
        self.catalog
            .list()
            .into_iter()
            .filter(|r| {
                is_low_stock(r.remaining_quantity, threshold.unwrap_or(r.min_threshold))
            })
            .collect()
    }

    /// The full valuation report: per-product rows joined through the
    /// stock classifier, plus totals and the low-stock sublist.
    ///
    /// Deterministic for a given ledger state: rows come out in catalog
    /// insertion order, and every figure is integer arithmetic.
    pub fn stock_summary_report(&self) -> StockSummaryReport {
        let rows: Vec<StockSummaryRow> = self
            .catalog
            .list()
            .into_iter()
            .map(|r| {
                let breakdown = classify(&r.stock_view());
                StockSummaryRow {
                    product_id: r.product_id,
                    name: r.name,
                    initial_quantity: r.initial_quantity,
                    remaining_quantity: r.remaining_quantity,
                    sold_quantity: breakdown.sold_quantity,
                    cost_price: r.cost_price,
                    selling_price: r.selling_price,
                    min_threshold: r.min_threshold,
                    max_threshold: r.max_threshold,
                    unit_profit: breakdown.unit_profit,
                    total_cost_value: breakdown.total_cost_value,
                    total_sales_value: breakdown.total_sales_value,
                    profit: breakdown.profit,
                    is_low_stock: breakdown.is_low_stock,
                }
            })
            .collect();

        let totals = StockSummaryTotals {
            total_items: rows.len() as u64,
            total_stock_value: rows.iter().map(|r| r.total_cost_value).sum(),
            total_sales_value: rows.iter().map(|r| r.total_sales_value).sum(),
            total_profit: rows.iter().map(|r| r.profit).sum(),
        };

        let low_stock_items = rows.iter().filter(|r| r.is_low_stock).cloned().collect();

        StockSummaryReport {
            rows,
            totals,
            low_stock_items,
        }
    }
}
