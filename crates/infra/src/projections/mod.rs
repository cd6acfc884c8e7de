//! Projection implementations (read model builders).
//!
//! Projections consume committed ledger events and build query-optimized
//! read models. All projections here are:
//! - **Rebuildable**: reconstructed from the event streams at any time
//! - **Idempotent**: per-stream cursors skip already-applied sequence
//!   numbers, so at-least-once delivery is safe

pub mod catalog;
pub mod transactions;

pub use catalog::{CatalogProjectionError, ProductCatalogProjection, ProductRecord};
pub use transactions::{
    TransactionKind, TransactionLogProjection, TransactionProjectionError, TransactionRecord,
};
