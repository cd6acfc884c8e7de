//! Product catalog domain module (event-sourced).
//!
//! This crate contains the business rules for products and their stock
//! trajectory, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage). A product's event stream is its ledger: sales
//! and restocks are immutable entries, current quantities are derived.

pub mod product;
pub mod stock;

pub use product::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductCreated, ProductDeleted,
    ProductEvent, ProductId, ProductPatch, ProductRestocked, ProductUpdated, RecordSale,
    RestockProduct, SaleRecorded, UpdateProduct, PRODUCT_AGGREGATE_TYPE,
};
pub use stock::{
    classify, is_low_stock, StockBreakdown, StockView, DEFAULT_MAX_THRESHOLD,
    DEFAULT_MIN_THRESHOLD,
};
