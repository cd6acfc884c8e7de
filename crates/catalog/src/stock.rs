//! Stock classification: the one place the low-stock rule and the unit
//! economics live.
//!
//! Every consumer (dashboard stats, low-stock page, stock report, alert
//! subscriber) derives these figures through [`classify`] so the rules
//! cannot drift between views.

use serde::{Deserialize, Serialize};

use stockbook_core::Money;

/// Threshold used when a product is created without one.
pub const DEFAULT_MIN_THRESHOLD: u64 = 5;

/// Upper threshold used when a product is created without one.
pub const DEFAULT_MAX_THRESHOLD: u64 = 100;

/// The fields stock classification works on, independent of whether they
/// come from the live aggregate or a read model row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockView {
    pub initial_quantity: u64,
    pub remaining_quantity: u64,
    pub cost_price: Money,
    pub selling_price: Money,
    pub min_threshold: u64,
}

/// Derived stock figures for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBreakdown {
    pub sold_quantity: u64,
    pub is_low_stock: bool,
    /// Selling price minus cost price, in signed minor units (a loss is
    /// representable).
    pub unit_profit: i64,
    /// Value of the units still on the shelf: `remaining × cost_price`.
    pub total_cost_value: Money,
    /// Revenue from the units sold: `sold × selling_price`.
    pub total_sales_value: Money,
    /// `total_sales_value − total_cost_value`, in signed minor units.
    ///
    /// Note this compares revenue on *sold* units against the cost of the
    /// units *currently held*, not cost of goods sold. The dashboard has
    /// always reported profit this way, so the formula is kept verbatim
    /// for compatibility.
    pub profit: i64,
}

/// Low stock means strictly below the threshold; sitting exactly at the
/// threshold is fine.
#[inline]
pub fn is_low_stock(remaining_quantity: u64, threshold: u64) -> bool {
    remaining_quantity < threshold
}

/// Derive the full stock breakdown for one product.
pub fn classify(view: &StockView) -> StockBreakdown {
    let sold_quantity = view.initial_quantity - view.remaining_quantity;
    let total_cost_value = view.cost_price.times(view.remaining_quantity);
    let total_sales_value = view.selling_price.times(sold_quantity);

    StockBreakdown {
        sold_quantity,
        is_low_stock: is_low_stock(view.remaining_quantity, view.min_threshold),
        unit_profit: view.selling_price.signed_diff(view.cost_price),
        total_cost_value,
        total_sales_value,
        profit: total_sales_value.signed_diff(total_cost_value),
    }
}
