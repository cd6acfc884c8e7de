//! Transaction log projection.
//!
//! Materializes the stock-affecting ledger entries (sales and restocks)
//! for display — "recent transactions" on the dashboard. Catalog events
//! (create/update/delete) advance the cursor but produce no rows: they
//! are not stock movements.
//!
//! Product names are deliberately NOT stored here; the display name is
//! joined from the current catalog at read time, so a rename shows up in
//! history immediately.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockbook_catalog::{ProductEvent, ProductId, PRODUCT_AGGREGATE_TYPE};
use stockbook_core::{AggregateId, Entity};
use stockbook_events::EventEnvelope;

use crate::read_model::ReadModelStore;

/// Which kind of stock movement a ledger entry records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Sale,
    Restock,
}

/// One displayable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// The ledger event id (UUIDv7, so time-ordered).
    pub transaction_id: Uuid,
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
    /// Position in the product's stream.
    pub sequence_number: u64,
}

impl Entity for TransactionRecord {
    type Id = Uuid;

    fn id(&self) -> &Self::Id {
        &self.transaction_id
    }
}

#[derive(Debug, Error)]
pub enum TransactionProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Transaction log: every sale/restock entry, queryable newest-first.
#[derive(Debug)]
pub struct TransactionLogProjection<S>
where
    S: ReadModelStore<Uuid, TransactionRecord>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> TransactionLogProjection<S>
where
    S: ReadModelStore<Uuid, TransactionRecord>,
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

    /// The most recent entries, newest first.
    ///
    /// Ordered by `(occurred_at, transaction_id)` descending; UUIDv7
    /// transaction ids keep same-timestamp entries in commit order.
    pub fn list_recent(&self, limit: usize) -> Vec<TransactionRecord> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| {
            (b.occurred_at, b.transaction_id).cmp(&(a.occurred_at, a.transaction_id))
        });
        rows.truncate(limit);
        rows
    }

    /// Total number of recorded stock movements.
    pub fn len(&self) -> usize {
        self.store.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply one committed envelope into the transaction log.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), TransactionProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);
        if seq == 0 {
            return Err(TransactionProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(TransactionProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| TransactionProjectionError::Deserialize(e.to_string()))?;

        match &ev {
            ProductEvent::SaleRecorded(e) => {
                self.store.upsert(
                    envelope.event_id(),
                    TransactionRecord {
                        transaction_id: envelope.event_id(),
                        product_id: e.product_id,
                        kind: TransactionKind::Sale,
                        quantity: e.quantity,
                        occurred_at: e.occurred_at,
                        sequence_number: seq,
                    },
                );
            }
            ProductEvent::ProductRestocked(e) => {
                self.store.upsert(
                    envelope.event_id(),
                    TransactionRecord {
                        transaction_id: envelope.event_id(),
                        product_id: e.product_id,
                        kind: TransactionKind::Restock,
                        quantity: e.quantity,
                        occurred_at: e.occurred_at,
                        sequence_number: seq,
                    },
                );
            }
            // Catalog metadata events are not stock movements.
            ProductEvent::ProductCreated(_)
            | ProductEvent::ProductUpdated(_)
            | ProductEvent::ProductDeleted(_) => {}
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the transaction log from scratch.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), TransactionProjectionError> {
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
