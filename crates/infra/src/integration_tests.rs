//! Integration tests for the full ledger pipeline.
//!
//! Tests: Command → EventStore → EventBus → Projections → Reports
//!
//! Verifies:
//! - Commands produce ledger entries that update read models correctly
//! - Oversells are refused atomically (nothing committed, nothing visible)
//! - Concurrent sales against one product are serialized by the stream lock
//! - Projections are idempotent and rebuildable

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use stockbook_catalog::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductId, ProductPatch, RecordSale,
    RestockProduct, UpdateProduct, PRODUCT_AGGREGATE_TYPE,
};
use stockbook_core::{AggregateId, Money};
use stockbook_events::{EventBus, EventEnvelope, InMemoryEventBus};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{
    ProductCatalogProjection, ProductRecord, TransactionKind, TransactionLogProjection,
    TransactionRecord,
};
use crate::read_model::InMemoryReadModelStore;
use crate::reports::ReportAggregator;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type CatalogStore = Arc<InMemoryReadModelStore<ProductId, ProductRecord>>;
type TxStore = Arc<InMemoryReadModelStore<uuid::Uuid, TransactionRecord>>;

struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    store: Arc<InMemoryEventStore>,
    bus: Bus,
    catalog: Arc<ProductCatalogProjection<CatalogStore>>,
    transactions: Arc<TransactionLogProjection<TxStore>>,
    reports: ReportAggregator<CatalogStore>,
}

fn setup() -> Pipeline {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    let catalog_store: CatalogStore = Arc::new(InMemoryReadModelStore::new());
    let catalog = Arc::new(ProductCatalogProjection::new(catalog_store));

    let tx_store: TxStore = Arc::new(InMemoryReadModelStore::new());
    let transactions = Arc::new(TransactionLogProjection::new(tx_store));

    let reports = ReportAggregator::new(catalog.clone());

    Pipeline {
        dispatcher,
        store,
        bus,
        catalog,
        transactions,
        reports,
    }
}

impl Pipeline {
    /// Dispatch, then apply the committed entries to both projections
    /// (read-your-writes, as the service layer does).
    fn run(
        &self,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatcher.dispatch(
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            command,
            |id| Product::empty(ProductId::new(id)),
        )?;

        for stored in &committed {
            let env = stored.to_envelope();
            self.catalog.apply_envelope(&env).unwrap();
            self.transactions.apply_envelope(&env).unwrap();
        }

        Ok(committed)
    }

    fn create(&self, name: &str, initial: u64) -> ProductId {
        let product_id = ProductId::new(AggregateId::new());
        self.run(
            product_id,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                name: name.to_string(),
                category: "General".to_string(),
                initial_quantity: initial,
                cost_price: Some(Money::from_major(100)),
                selling_price: Some(Money::from_major(150)),
                min_threshold: Some(5),
                max_threshold: Some(100),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        product_id
    }

    fn sell(&self, product_id: ProductId, quantity: u64) -> Result<Vec<StoredEvent>, DispatchError> {
        self.run(
            product_id,
            ProductCommand::RecordSale(RecordSale {
                product_id,
                quantity,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn restock(&self, product_id: ProductId, quantity: u64) {
        self.run(
            product_id,
            ProductCommand::RestockProduct(RestockProduct {
                product_id,
                quantity,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
    }
}

#[test]
fn create_flows_through_to_the_catalog_read_model() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);

    let row = p.catalog.get(&id).expect("catalog row");
    assert_eq!(row.name, "Bag of Rice");
    assert_eq!(row.initial_quantity, 10);
    assert_eq!(row.remaining_quantity, 10);
    assert_eq!(row.sold_quantity(), 0);
}

#[test]
fn sale_updates_quantities_and_the_transaction_log() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);

    p.sell(id, 7).unwrap();

    let row = p.catalog.get(&id).unwrap();
    assert_eq!(row.remaining_quantity, 3);
    assert_eq!(row.sold_quantity(), 7);

    let recent = p.transactions.list_recent(10);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].kind, TransactionKind::Sale);
    assert_eq!(recent[0].quantity, 7);
    assert_eq!(recent[0].product_id, id);
}

#[test]
fn recent_transactions_come_back_newest_first() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);

    p.sell(id, 1).unwrap();
    p.sell(id, 2).unwrap();
    p.restock(id, 5);

    let recent = p.transactions.list_recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].kind, TransactionKind::Restock);
    assert_eq!(recent[1].quantity, 2);

    assert_eq!(p.transactions.len(), 3);
}

#[test]
fn oversell_is_refused_and_commits_nothing() {
    let p = setup();
    let id = p.create("Bag of Rice", 3);

    let err = p.sell(id, 5).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::InsufficientStock {
            requested: 5,
            remaining: 3
        }
    ));

    // Ledger: only the creation entry. Read model: untouched.
    assert_eq!(p.store.load_stream(id.0).unwrap().len(), 1);
    assert_eq!(p.catalog.get(&id).unwrap().remaining_quantity, 3);
    assert!(p.transactions.is_empty());
}

#[test]
fn restock_raises_baseline_and_remaining() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);
    p.sell(id, 6).unwrap();

    p.restock(id, 4);

    let row = p.catalog.get(&id).unwrap();
    assert_eq!(row.initial_quantity, 14);
    assert_eq!(row.remaining_quantity, 8);
    assert_eq!(row.sold_quantity(), 6);
}

#[test]
fn update_patches_metadata_without_touching_quantities() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);
    p.sell(id, 2).unwrap();

    p.run(
        id,
        ProductCommand::UpdateProduct(UpdateProduct {
            product_id: id,
            patch: ProductPatch {
                name: Some("Premium Rice".to_string()),
                selling_price: Some(Money::from_major(200)),
                ..ProductPatch::default()
            },
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();

    let row = p.catalog.get(&id).unwrap();
    assert_eq!(row.name, "Premium Rice");
    assert_eq!(row.selling_price, Money::from_major(200));
    assert_eq!(row.remaining_quantity, 8);
}

#[test]
fn update_of_unknown_product_is_not_found() {
    let p = setup();
    let ghost = ProductId::new(AggregateId::new());

    let err = p
        .run(
            ghost,
            ProductCommand::UpdateProduct(UpdateProduct {
                product_id: ghost,
                patch: ProductPatch {
                    name: Some("x".to_string()),
                    ..ProductPatch::default()
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound));
}

#[test]
fn delete_without_history_removes_the_row_but_not_the_stream() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);

    p.run(
        id,
        ProductCommand::DeleteProduct(DeleteProduct {
            product_id: id,
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();

    assert!(p.catalog.get(&id).is_none());
    // The stream keeps its history (created + deleted).
    assert_eq!(p.store.load_stream(id.0).unwrap().len(), 2);
}

#[test]
fn delete_with_ledger_history_is_a_conflict() {
    let p = setup();
    let id = p.create("Bag of Rice", 10);
    p.sell(id, 1).unwrap();

    let err = p
        .run(
            id,
            ProductCommand::DeleteProduct(DeleteProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::Conflict(_)));
    assert!(p.catalog.get(&id).is_some());
}

#[test]
fn concurrent_unit_sales_never_oversell() {
    const STOCK: u64 = 5;
    const CONTENDERS: usize = 8;

    let p = setup();
    let id = p.create("Bag of Rice", STOCK);

    let mut handles = Vec::new();
    for _ in 0..CONTENDERS {
        let dispatcher = p.dispatcher.clone();
        handles.push(std::thread::spawn(move || {
            dispatcher.dispatch(
                id.0,
                PRODUCT_AGGREGATE_TYPE,
                ProductCommand::RecordSale(RecordSale {
                    product_id: id,
                    quantity: 1,
                    occurred_at: Utc::now(),
                }),
                |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
            )
        }));
    }

    let mut successes = 0usize;
    let mut insufficient = 0usize;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => successes += 1,
            Err(DispatchError::InsufficientStock { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected dispatch error: {other:?}"),
        }
    }

    // Exactly k successes, N−k refusals; never a spurious conflict.
    assert_eq!(successes, STOCK as usize);
    assert_eq!(insufficient, CONTENDERS - STOCK as usize);

    // Rebuild the catalog from the ledger: stock drained to exactly zero.
    let envelopes: Vec<_> = p
        .store
        .load_all()
        .unwrap()
        .iter()
        .map(|e| e.to_envelope())
        .collect();
    p.catalog.rebuild_from_scratch(envelopes).unwrap();
    assert_eq!(p.catalog.get(&id).unwrap().remaining_quantity, 0);
}

#[test]
fn sales_against_different_products_do_not_interfere() {
    let p = setup();
    let a = p.create("Rice", 10);
    let b = p.create("Beans", 10);

    let mut handles = Vec::new();
    for &(id, quantity) in &[(a, 4u64), (b, 9u64)] {
        let dispatcher = p.dispatcher.clone();
        handles.push(std::thread::spawn(move || {
            dispatcher.dispatch(
                id.0,
                PRODUCT_AGGREGATE_TYPE,
                ProductCommand::RecordSale(RecordSale {
                    product_id: id,
                    quantity,
                    occurred_at: Utc::now(),
                }),
                |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
            )
        }));
    }
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let envelopes: Vec<_> = p
        .store
        .load_all()
        .unwrap()
        .iter()
        .map(|e| e.to_envelope())
        .collect();
    p.catalog.rebuild_from_scratch(envelopes).unwrap();

    assert_eq!(p.catalog.get(&a).unwrap().remaining_quantity, 6);
    assert_eq!(p.catalog.get(&b).unwrap().remaining_quantity, 1);
}

#[test]
fn projections_rebuild_deterministically_from_the_ledger() {
    let p = setup();
    let a = p.create("Rice", 10);
    let b = p.create("Beans", 8);
    p.sell(a, 3).unwrap();
    p.sell(b, 8).unwrap();
    p.restock(a, 2);

    let envelopes: Vec<_> = p
        .store
        .load_all()
        .unwrap()
        .iter()
        .map(|e| e.to_envelope())
        .collect();

    let fresh_store: CatalogStore = Arc::new(InMemoryReadModelStore::new());
    let fresh = ProductCatalogProjection::new(fresh_store);
    fresh.rebuild_from_scratch(envelopes.clone()).unwrap();

    assert_eq!(fresh.list(), p.catalog.list());

    let fresh_tx_store: TxStore = Arc::new(InMemoryReadModelStore::new());
    let fresh_tx = TransactionLogProjection::new(fresh_tx_store);
    fresh_tx.rebuild_from_scratch(envelopes).unwrap();

    assert_eq!(fresh_tx.list_recent(100), p.transactions.list_recent(100));
}

#[test]
fn reapplying_committed_envelopes_is_a_no_op() {
    let p = setup();
    let id = p.create("Rice", 10);
    let committed = p.sell(id, 4).unwrap();

    let before = p.catalog.get(&id).unwrap();
    for stored in &committed {
        // Second delivery of the same envelope (at-least-once bus).
        p.catalog.apply_envelope(&stored.to_envelope()).unwrap();
        p.transactions.apply_envelope(&stored.to_envelope()).unwrap();
    }

    assert_eq!(p.catalog.get(&id).unwrap(), before);
    assert_eq!(p.transactions.len(), 1);
}

#[test]
fn reports_reconcile_with_the_ledger() {
    let p = setup();
    let id = p.create("Rice", 10);
    p.sell(id, 7).unwrap();

    let stats = p.reports.dashboard_stats();
    assert_eq!(stats.total_products, 1);
    assert_eq!(stats.total_quantity, 3);
    assert_eq!(stats.low_stock, 1);

    let report = p.reports.stock_summary_report();
    assert_eq!(report.rows[0].profit, Money::from_major(750).minor() as i64);
    assert_eq!(report.totals.total_stock_value, Money::from_major(300));
    assert_eq!(report.totals.total_sales_value, Money::from_major(1050));
}

#[test]
fn bus_fanout_reaches_a_subscribed_projection() {
    let p = setup();

    // A second, independently-subscribed catalog fed only by the bus.
    let mirror_store: CatalogStore = Arc::new(InMemoryReadModelStore::new());
    let mirror = Arc::new(ProductCatalogProjection::new(mirror_store));

    let sub = p.bus.subscribe();
    let mirror_clone = mirror.clone();
    let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || {
        // 2 envelopes expected: created + sale.
        for _ in 0..2 {
            match sub.recv() {
                Ok(env) => {
                    mirror_clone.apply_envelope(&env).unwrap();
                }
                Err(_) => return,
            }
        }
        let _ = done_tx.send(());
    });

    let id = p.create("Rice", 10);
    p.sell(id, 4).unwrap();

    done_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("subscriber should process both envelopes");

    assert_eq!(mirror.get(&id).unwrap().remaining_quantity, 6);
}
