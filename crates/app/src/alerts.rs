//! Low-stock alerting.
//!
//! The dashboard warns the operator when products fall below threshold;
//! this subscriber is the backend half of that: it watches committed sale
//! entries on the bus and emits a structured warning when a product sits
//! below its minimum threshold afterwards. Purely observational — no
//! state of its own, no effect on the ledger — and best-effort by design
//! (it reads the catalog whenever the envelope arrives).

use std::sync::Arc;
use std::thread::JoinHandle;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use stockbook_catalog::{is_low_stock, ProductEvent, ProductId, PRODUCT_AGGREGATE_TYPE};
use stockbook_events::{EventEnvelope, Subscription};
use stockbook_infra::projections::{ProductCatalogProjection, ProductRecord};
use stockbook_infra::read_model::InMemoryReadModelStore;

type CatalogStore = Arc<InMemoryReadModelStore<ProductId, ProductRecord>>;

/// Spawn the low-stock monitor thread.
///
/// The thread runs until the bus is dropped (process shutdown).
pub fn spawn_low_stock_monitor(
    subscription: Subscription<EventEnvelope<JsonValue>>,
    catalog: Arc<ProductCatalogProjection<CatalogStore>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        loop {
            match subscription.recv() {
                Ok(env) => check_envelope(&env, &catalog),
                Err(_) => break,
            }
        }
        debug!("low-stock monitor stopped (bus closed)");
    })
}

fn check_envelope(
    envelope: &EventEnvelope<JsonValue>,
    catalog: &ProductCatalogProjection<CatalogStore>,
) {
    if envelope.aggregate_type() != PRODUCT_AGGREGATE_TYPE {
        return;
    }

    let ev: ProductEvent = match serde_json::from_value(envelope.payload().clone()) {
        Ok(ev) => ev,
        Err(e) => {
            debug!("low-stock monitor skipping undecodable envelope: {e}");
            return;
        }
    };

    // Only sales can push a product below threshold.
    let ProductEvent::SaleRecorded(sale) = ev else {
        return;
    };

    if let Some(record) = catalog.get(&sale.product_id) {
        if is_low_stock(record.remaining_quantity, record.min_threshold) {
            warn!(
                product_id = %record.product_id,
                product = %record.name,
                remaining = record.remaining_quantity,
                threshold = record.min_threshold,
                "product below stock threshold"
            );
        }
    }
}
