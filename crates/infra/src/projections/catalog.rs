//! Product catalog projection.
//!
//! The queryable catalog: one row per live product, current quantities
//! included. Rows disappear when a product is tombstoned; the underlying
//! stream stays in the ledger.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockbook_catalog::{ProductEvent, ProductId, StockView, PRODUCT_AGGREGATE_TYPE};
use stockbook_core::{AggregateId, Entity, Money};
use stockbook_events::EventEnvelope;

use crate::read_model::ReadModelStore;

/// Queryable product read model (catalog row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub initial_quantity: u64,
    pub remaining_quantity: u64,
    pub cost_price: Money,
    pub selling_price: Money,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub created_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Units sold so far. Always `initial − remaining`.
    pub fn sold_quantity(&self) -> u64 {
        self.initial_quantity - self.remaining_quantity
    }

    pub fn stock_view(&self) -> StockView {
        StockView {
            initial_quantity: self.initial_quantity,
            remaining_quantity: self.remaining_quantity,
            cost_price: self.cost_price,
            selling_price: self.selling_price,
            min_threshold: self.min_threshold,
        }
    }
}

impl Entity for ProductRecord {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Catalog projection: maintains one [`ProductRecord`] per live product.
///
/// Idempotent via per-stream cursors; rebuildable from scratch.
#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductRecord>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> ProductCatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    fn clear_cursors(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductRecord> {
        self.store.get(product_id)
    }

    /// Insertion-ordered snapshot of the live catalog.
    ///
    /// Rows are sorted by `(created_at, product_id)`; product ids are
    /// UUIDv7, so the tiebreak follows creation order too and the listing
    /// is stable across calls and rebuilds.
    pub fn list(&self) -> Vec<ProductRecord> {
        let mut rows = self.store.list();
        rows.sort_by_key(|r| (r.created_at, r.product_id));
        rows
    }

    /// Apply one committed envelope into the catalog read model.
    ///
    /// Envelopes from other aggregate types and already-applied sequence
    /// numbers are skipped (idempotency under at-least-once delivery).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);
        if seq == 0 {
            return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        let product_id = ev.product_id();
        if product_id.0 != aggregate_id {
            return Err(CatalogProjectionError::StreamMismatch(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductRecord {
                        product_id: e.product_id,
                        name: e.name,
                        category: e.category,
                        initial_quantity: e.initial_quantity,
                        remaining_quantity: e.initial_quantity,
                        cost_price: e.cost_price,
                        selling_price: e.selling_price,
                        min_threshold: e.min_threshold,
                        max_threshold: e.max_threshold,
                        created_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    if let Some(name) = e.patch.name {
                        rm.name = name;
                    }
                    if let Some(category) = e.patch.category {
                        rm.category = category;
                    }
                    if let Some(cost) = e.patch.cost_price {
                        rm.cost_price = cost;
                    }
                    if let Some(selling) = e.patch.selling_price {
                        rm.selling_price = selling;
                    }
                    if let Some(min) = e.patch.min_threshold {
                        rm.min_threshold = min;
                    }
                    if let Some(max) = e.patch.max_threshold {
                        rm.max_threshold = max;
                    }
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::ProductRestocked(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.initial_quantity += e.quantity;
                    rm.remaining_quantity += e.quantity;
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::SaleRecorded(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    // The aggregate refused oversells before this entry was
                    // committed; saturate anyway rather than underflow on a
                    // corrupt replay.
                    rm.remaining_quantity = rm.remaining_quantity.saturating_sub(e.quantity);
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::ProductDeleted(e) => {
                self.store.remove(&e.product_id);
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), CatalogProjectionError> {
        self.store.clear();
        self.clear_cursors();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
