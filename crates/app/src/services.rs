//! Service layer: in-memory wiring + the operations the HTTP layer calls.
//!
//! Writes go through the command dispatcher; the committed ledger entries
//! are then applied to the projections *before* the call returns, so a
//! caller that writes and immediately reads sees its own write. The bus
//! carries the same envelopes to background consumers (low-stock alerts);
//! projections are idempotent, so the occasional double delivery is a
//! no-op.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use stockbook_catalog::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductId, ProductPatch, RecordSale,
    RestockProduct, UpdateProduct, PRODUCT_AGGREGATE_TYPE,
};
use stockbook_core::{AggregateId, ReceiptId};
use stockbook_events::{EventBus, EventEnvelope, InMemoryEventBus};
use stockbook_infra::command_dispatcher::CommandDispatcher;
use stockbook_infra::event_store::{InMemoryEventStore, StoredEvent};
use stockbook_infra::projections::{
    ProductCatalogProjection, ProductRecord, TransactionLogProjection, TransactionRecord,
};
use stockbook_infra::read_model::InMemoryReadModelStore;
use stockbook_infra::reports::ReportAggregator;

use crate::alerts;
use crate::dto::{
    CreateProductRequest, DashboardStatsDto, ProductDto, ReceiptDto, ReceiptLineDto,
    ReceiptRequest, RestockRequest, StockSummaryResponse, TransactionDto, UpdateProductRequest,
};
use crate::errors::ServiceError;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type CatalogStore = Arc<InMemoryReadModelStore<ProductId, ProductRecord>>;
type TxStore = Arc<InMemoryReadModelStore<Uuid, TransactionRecord>>;

/// The assembled application: one instance per process.
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    event_store: Arc<InMemoryEventStore>,
    event_bus: Bus,
    catalog: Arc<ProductCatalogProjection<CatalogStore>>,
    transactions: Arc<TransactionLogProjection<TxStore>>,
    reports: ReportAggregator<CatalogStore>,
}

/// In-memory infra wiring (dev/test): store + bus + dispatcher +
/// projections + alert subscriber.
pub fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let catalog_store: CatalogStore = Arc::new(InMemoryReadModelStore::new());
    let catalog = Arc::new(ProductCatalogProjection::new(catalog_store));

    let tx_store: TxStore = Arc::new(InMemoryReadModelStore::new());
    let transactions = Arc::new(TransactionLogProjection::new(tx_store));

    let reports = ReportAggregator::new(catalog.clone());

    // Background subscriber: bus -> low-stock alerts. Detached; it runs
    // until the bus is dropped with the services.
    let _ = alerts::spawn_low_stock_monitor(bus.subscribe(), catalog.clone());

    let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    AppServices {
        dispatcher,
        event_store: store,
        event_bus: bus,
        catalog,
        transactions,
        reports,
    }
}

impl AppServices {
    /// Read-your-writes: fold freshly committed entries into the read
    /// models before returning to the caller.
    fn apply_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let env = stored.to_envelope();
            if let Err(e) = self.catalog.apply_envelope(&env) {
                warn!(event_id = %stored.event_id, "catalog projection apply failed: {e}");
            }
            if let Err(e) = self.transactions.apply_envelope(&env) {
                warn!(event_id = %stored.event_id, "transaction projection apply failed: {e}");
            }
        }
    }

    fn dispatch(
        &self,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self.dispatcher.dispatch(
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            command,
            |id| Product::empty(ProductId::new(id)),
        )?;
        self.apply_committed(&committed);
        Ok(committed)
    }

    fn parse_product_id(id: &str) -> Result<ProductId, ServiceError> {
        let aggregate_id: AggregateId = id.parse()?;
        Ok(ProductId::new(aggregate_id))
    }

    fn product_dto(&self, product_id: ProductId) -> Result<ProductDto, ServiceError> {
        self.catalog
            .get(&product_id)
            .map(|r| ProductDto::from(&r))
            .ok_or(ServiceError::NotFound)
    }

    // -------------------------
    // Catalog operations (`/products`)
    // -------------------------

    /// `POST /products`
    #[instrument(skip(self, req), fields(name = %req.name))]
    pub fn create_product(&self, req: CreateProductRequest) -> Result<ProductDto, ServiceError> {
        let product_id = ProductId::new(AggregateId::new());

        self.dispatch(
            product_id,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                name: req.name,
                category: req.category,
                initial_quantity: req.initial_quantity,
                cost_price: req.cost_price,
                selling_price: req.selling_price,
                min_threshold: req.min_threshold,
                max_threshold: req.max_threshold,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(product_id = %product_id, "product created");
        self.product_dto(product_id)
    }

    /// `PUT /products/:id`
    #[instrument(skip(self, req))]
    pub fn update_product(
        &self,
        id: &str,
        req: UpdateProductRequest,
    ) -> Result<ProductDto, ServiceError> {
        let product_id = Self::parse_product_id(id)?;

        self.dispatch(
            product_id,
            ProductCommand::UpdateProduct(UpdateProduct {
                product_id,
                patch: ProductPatch {
                    name: req.name,
                    category: req.category,
                    cost_price: req.cost_price,
                    selling_price: req.selling_price,
                    min_threshold: req.min_threshold,
                    max_threshold: req.max_threshold,
                },
                occurred_at: Utc::now(),
            }),
        )?;

        self.product_dto(product_id)
    }

    /// `POST /products/:id/restock`
    #[instrument(skip(self))]
    pub fn restock_product(
        &self,
        id: &str,
        req: RestockRequest,
    ) -> Result<ProductDto, ServiceError> {
        let product_id = Self::parse_product_id(id)?;

        self.dispatch(
            product_id,
            ProductCommand::RestockProduct(RestockProduct {
                product_id,
                quantity: req.amount,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(product_id = %product_id, amount = req.amount, "product restocked");
        self.product_dto(product_id)
    }

    /// `DELETE /products/:id`
    #[instrument(skip(self))]
    pub fn delete_product(&self, id: &str) -> Result<(), ServiceError> {
        let product_id = Self::parse_product_id(id)?;

        self.dispatch(
            product_id,
            ProductCommand::DeleteProduct(DeleteProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(product_id = %product_id, "product deleted");
        Ok(())
    }

    /// `GET /products/:id`
    pub fn get_product(&self, id: &str) -> Result<ProductDto, ServiceError> {
        let product_id = Self::parse_product_id(id)?;
        self.product_dto(product_id)
    }

    /// `GET /products` — stable, insertion-ordered snapshot.
    pub fn list_products(&self) -> Vec<ProductDto> {
        self.catalog
            .list()
            .iter()
            .map(ProductDto::from)
            .collect()
    }

    // -------------------------
    // Receipts (`/receipts`)
    // -------------------------

    /// `POST /receipts`
    ///
    /// Each line is one sale entry, atomic for its product. Lines are
    /// validated against the current catalog up front, then recorded in
    /// order; if a line is still refused mid-receipt (a concurrent sale
    /// can drain stock between the check and the append), recording stops
    /// there and the error is returned — entries already appended stand,
    /// corrections are compensating restocks.
    #[instrument(skip(self, req), fields(lines = req.items.len()))]
    pub fn record_receipt(&self, req: ReceiptRequest) -> Result<ReceiptDto, ServiceError> {
        if req.items.is_empty() {
            return Err(ServiceError::Validation(
                "receipt must contain at least one item".to_string(),
            ));
        }

        // Upfront validation pass: ids parse, quantities are positive,
        // products exist, and stock suffices at this snapshot.
        let mut lines = Vec::with_capacity(req.items.len());
        for item in &req.items {
            let product_id = Self::parse_product_id(&item.product_id)?;
            if item.quantity == 0 {
                return Err(ServiceError::Validation(
                    "sale quantity must be positive".to_string(),
                ));
            }
            let record = self
                .catalog
                .get(&product_id)
                .ok_or(ServiceError::NotFound)?;
            if item.quantity > record.remaining_quantity {
                return Err(ServiceError::InsufficientStock {
                    requested: item.quantity,
                    remaining: record.remaining_quantity,
                });
            }
            lines.push((product_id, item.quantity));
        }

        let receipt_id = ReceiptId::new();
        let created_at = Utc::now();
        let mut receipt_lines = Vec::with_capacity(lines.len());

        for (product_id, quantity) in lines {
            self.dispatch(
                product_id,
                ProductCommand::RecordSale(RecordSale {
                    product_id,
                    quantity,
                    occurred_at: created_at,
                }),
            )?;

            // The product existed during validation and deletion is blocked
            // once it has movements, so the row is still here.
            let record = self
                .catalog
                .get(&product_id)
                .ok_or(ServiceError::NotFound)?;
            receipt_lines.push(ReceiptLineDto {
                product_id: product_id.to_string(),
                product_name: record.name.clone(),
                quantity,
                unit_price: record.selling_price,
                line_total: record.selling_price.times(quantity),
            });
        }

        let total = receipt_lines.iter().map(|l| l.line_total).sum();
        info!(receipt_id = %receipt_id, lines = receipt_lines.len(), "receipt recorded");

        Ok(ReceiptDto {
            receipt_id,
            created_at,
            lines: receipt_lines,
            total,
        })
    }

    /// `GET /transactions/recent`
    ///
    /// Newest first; product names are joined from the current catalog at
    /// read time.
    pub fn recent_transactions(&self, limit: usize) -> Vec<TransactionDto> {
        self.transactions
            .list_recent(limit)
            .into_iter()
            .map(|t| {
                let product_name = self
                    .catalog
                    .get(&t.product_id)
                    .map(|r| r.name)
                    .unwrap_or_else(|| "(unknown product)".to_string());
                TransactionDto {
                    id: t.transaction_id.to_string(),
                    product_id: t.product_id.to_string(),
                    product_name,
                    kind: t.kind,
                    quantity: t.quantity,
                    created_at: t.occurred_at,
                }
            })
            .collect()
    }

    // -------------------------
    // Reports (`/dashboard`, `/reports`)
    // -------------------------

    /// `GET /dashboard/stats`
    pub fn dashboard_stats(&self) -> DashboardStatsDto {
        self.reports.dashboard_stats().into()
    }

    /// `GET /products/low-stock?threshold=N`
    pub fn low_stock(&self, threshold: Option<u64>) -> Vec<ProductDto> {
        self.reports
            .low_stock_list(threshold)
            .iter()
            .map(ProductDto::from)
            .collect()
    }

    /// `GET /reports/stock-summary`
    pub fn stock_summary(&self) -> StockSummaryResponse {
        StockSummaryResponse::from(&self.reports.stock_summary_report())
    }

    // -------------------------
    // Wiring access (tests, maintenance tooling)
    // -------------------------

    pub fn event_store(&self) -> &Arc<InMemoryEventStore> {
        &self.event_store
    }

    pub fn event_bus(&self) -> &Bus {
        &self.event_bus
    }
}
