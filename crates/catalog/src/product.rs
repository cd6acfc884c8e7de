use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money};
use stockbook_events::Event;

use crate::stock::{StockView, DEFAULT_MAX_THRESHOLD, DEFAULT_MIN_THRESHOLD};

/// Aggregate type identifier for product streams.
pub const PRODUCT_AGGREGATE_TYPE: &str = "catalog.product";

/// Product identifier.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Product.
///
/// `initial_quantity` is the counting baseline: it only ever grows (via
/// restocks), never shrinks. `remaining_quantity` moves down on sales and
/// up on restocks, and `sold_quantity` is always the difference of the
/// two. The stream itself is the ledger; `movement_count` tracks how many
/// sale/restock entries exist so deletion can be refused once history
/// has accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    category: String,
    initial_quantity: u64,
    remaining_quantity: u64,
    cost_price: Money,
    selling_price: Money,
    min_threshold: u64,
    max_threshold: u64,
    movement_count: u64,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            category: String::new(),
            initial_quantity: 0,
            remaining_quantity: 0,
            cost_price: Money::ZERO,
            selling_price: Money::ZERO,
            min_threshold: DEFAULT_MIN_THRESHOLD,
            max_threshold: DEFAULT_MAX_THRESHOLD,
            movement_count: 0,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn initial_quantity(&self) -> u64 {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> u64 {
        self.remaining_quantity
    }

    /// Units sold so far. Always `initial − remaining`.
    pub fn sold_quantity(&self) -> u64 {
        self.initial_quantity - self.remaining_quantity
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    pub fn selling_price(&self) -> Money {
        self.selling_price
    }

    pub fn min_threshold(&self) -> u64 {
        self.min_threshold
    }

    pub fn max_threshold(&self) -> u64 {
        self.max_threshold
    }

    /// Number of ledger entries (sales + restocks) recorded against this product.
    pub fn movement_count(&self) -> u64 {
        self.movement_count
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Snapshot of the fields the stock classifier works on.
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

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Partial update of a product's mutable fields.
///
/// Quantities are deliberately absent: they move only through sale and
/// restock entries, never through an edit.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub cost_price: Option<Money>,
    pub selling_price: Option<Money>,
    pub min_threshold: Option<u64>,
    pub max_threshold: Option<u64>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.cost_price.is_none()
            && self.selling_price.is_none()
            && self.min_threshold.is_none()
            && self.max_threshold.is_none()
    }
}

/// Command: CreateProduct.
///
/// Optional fields use explicit default substitution: missing prices
/// become zero, missing thresholds become the catalog defaults (5 / 100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub initial_quantity: u64,
    pub cost_price: Option<Money>,
    pub selling_price: Option<Money>,
    pub min_threshold: Option<u64>,
    pub max_threshold: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct (metadata only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub patch: ProductPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestockProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockProduct {
    pub product_id: ProductId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub product_id: ProductId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    RestockProduct(RestockProduct),
    RecordSale(RecordSale),
    DeleteProduct(DeleteProduct),
}

/// Event: ProductCreated. Defaults are already substituted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub initial_quantity: u64,
    pub cost_price: Money,
    pub selling_price: Money,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub patch: ProductPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductRestocked — a ledger entry. Raises both the baseline and
/// the remaining quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRestocked {
    pub product_id: ProductId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleRecorded — a ledger entry. Decrements the remaining quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub product_id: ProductId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeleted (tombstone; the stream itself is never removed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductRestocked(ProductRestocked),
    SaleRecorded(SaleRecorded),
    ProductDeleted(ProductDeleted),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::ProductRestocked(e) => e.product_id,
            ProductEvent::SaleRecorded(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::ProductRestocked(_) => "catalog.product.restocked",
            ProductEvent::SaleRecorded(_) => "catalog.product.sale_recorded",
            ProductEvent::ProductDeleted(_) => "catalog.product.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductRestocked(e) => e.occurred_at,
            ProductEvent::SaleRecorded(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.initial_quantity = e.initial_quantity;
                self.remaining_quantity = e.initial_quantity;
                self.cost_price = e.cost_price;
                self.selling_price = e.selling_price;
                self.min_threshold = e.min_threshold;
                self.max_threshold = e.max_threshold;
                self.movement_count = 0;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(name) = &e.patch.name {
                    self.name = name.clone();
                }
                if let Some(category) = &e.patch.category {
                    self.category = category.clone();
                }
                if let Some(cost) = e.patch.cost_price {
                    self.cost_price = cost;
                }
                if let Some(selling) = e.patch.selling_price {
                    self.selling_price = selling;
                }
                if let Some(min) = e.patch.min_threshold {
                    self.min_threshold = min;
                }
                if let Some(max) = e.patch.max_threshold {
                    self.max_threshold = max;
                }
            }
            ProductEvent::ProductRestocked(e) => {
                self.initial_quantity += e.quantity;
                self.remaining_quantity += e.quantity;
                self.movement_count += 1;
            }
            ProductEvent::SaleRecorded(e) => {
                // handle() refuses oversells, so this cannot underflow.
                self.remaining_quantity -= e.quantity;
                self.movement_count += 1;
            }
            ProductEvent::ProductDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::RestockProduct(cmd) => self.handle_restock(cmd),
            ProductCommand::RecordSale(cmd) => self.handle_record_sale(cmd),
            ProductCommand::DeleteProduct(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::validation("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }

        // Explicit default substitution: absent prices are zero, absent
        // thresholds fall back to the catalog defaults.
        let min_threshold = cmd.min_threshold.unwrap_or(DEFAULT_MIN_THRESHOLD);
        let max_threshold = cmd.max_threshold.unwrap_or(DEFAULT_MAX_THRESHOLD);

        if min_threshold > max_threshold {
            return Err(DomainError::validation(format!(
                "min_threshold ({min_threshold}) cannot exceed max_threshold ({max_threshold})"
            )));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            initial_quantity: cmd.initial_quantity,
            cost_price: cmd.cost_price.unwrap_or(Money::ZERO),
            selling_price: cmd.selling_price.unwrap_or(Money::ZERO),
            min_threshold,
            max_threshold,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.patch.is_empty() {
            return Ok(vec![]);
        }

        if let Some(name) = &cmd.patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(category) = &cmd.patch.category {
            if category.trim().is_empty() {
                return Err(DomainError::validation("category cannot be empty"));
            }
        }

        // Validate the merged result, not the patch in isolation.
        let min = cmd.patch.min_threshold.unwrap_or(self.min_threshold);
        let max = cmd.patch.max_threshold.unwrap_or(self.max_threshold);
        if min > max {
            return Err(DomainError::validation(format!(
                "min_threshold ({min}) cannot exceed max_threshold ({max})"
            )));
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            patch: cmd.patch.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &RestockProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("restock amount must be positive"));
        }

        Ok(vec![ProductEvent::ProductRestocked(ProductRestocked {
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_sale(&self, cmd: &RecordSale) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("sale quantity must be positive"));
        }

        // All-or-nothing: an oversell is refused outright, never partially
        // fulfilled.
        if cmd.quantity > self.remaining_quantity {
            return Err(DomainError::insufficient_stock(
                cmd.quantity,
                self.remaining_quantity,
            ));
        }

        Ok(vec![ProductEvent::SaleRecorded(SaleRecorded {
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_product_id(cmd.product_id)?;

        if self.movement_count > 0 {
            return Err(DomainError::conflict(
                "product has recorded stock movements",
            ));
        }

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::AggregateId;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(product_id: ProductId, initial_quantity: u64) -> CreateProduct {
        CreateProduct {
            product_id,
            name: "Bag of Rice".to_string(),
            category: "General".to_string(),
            initial_quantity,
            cost_price: Some(Money::from_major(100)),
            selling_price: Some(Money::from_major(150)),
            min_threshold: Some(5),
            max_threshold: Some(100),
            occurred_at: test_time(),
        }
    }

    /// Handle + apply a command against a live aggregate, asserting success.
    fn drive(product: &mut Product, cmd: ProductCommand) {
        let events = product.handle(&cmd).unwrap();
        for ev in &events {
            product.apply(ev);
        }
    }

    fn created_product(initial_quantity: u64) -> Product {
        let id = test_product_id();
        let mut product = Product::empty(id);
        drive(
            &mut product,
            ProductCommand::CreateProduct(create_cmd(id, initial_quantity)),
        );
        product
    }

    #[test]
    fn create_emits_product_created_with_remaining_equal_to_initial() {
        let product = created_product(10);
        assert_eq!(product.initial_quantity(), 10);
        assert_eq!(product.remaining_quantity(), 10);
        assert_eq!(product.sold_quantity(), 0);
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn create_rejects_empty_name() {
        let id = test_product_id();
        let product = Product::empty(id);
        let mut cmd = create_cmd(id, 1);
        cmd.name = "   ".to_string();

        let err = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_inverted_thresholds() {
        let id = test_product_id();
        let product = Product::empty(id);
        let mut cmd = create_cmd(id, 1);
        cmd.min_threshold = Some(10);
        cmd.max_threshold = Some(3);

        let err = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_substitutes_defaults_for_absent_fields() {
        let id = test_product_id();
        let product = Product::empty(id);
        let cmd = CreateProduct {
            product_id: id,
            name: "Sugar".to_string(),
            category: "General".to_string(),
            initial_quantity: 3,
            cost_price: None,
            selling_price: None,
            min_threshold: None,
            max_threshold: None,
            occurred_at: test_time(),
        };

        let events = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap();
        match &events[0] {
            ProductEvent::ProductCreated(e) => {
                assert_eq!(e.cost_price, Money::ZERO);
                assert_eq!(e.selling_price, Money::ZERO);
                assert_eq!(e.min_threshold, DEFAULT_MIN_THRESHOLD);
                assert_eq!(e.max_threshold, DEFAULT_MAX_THRESHOLD);
            }
            other => panic!("expected ProductCreated, got {other:?}"),
        }
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let product = created_product(1);
        let err = product
            .handle(&ProductCommand::CreateProduct(create_cmd(
                product.id_typed(),
                1,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn sale_decrements_remaining_and_derives_sold() {
        let mut product = created_product(10);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::RecordSale(RecordSale {
                product_id: pid,
                quantity: 7,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(product.remaining_quantity(), 3);
        assert_eq!(product.sold_quantity(), 7);
        assert_eq!(product.initial_quantity(), 10);
        assert_eq!(product.movement_count(), 1);
    }

    #[test]
    fn oversell_fails_and_leaves_state_unchanged() {
        let mut product = created_product(10);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::RecordSale(RecordSale {
                product_id: pid,
                quantity: 7,
                occurred_at: test_time(),
            }),
        );

        let err = product
            .handle(&ProductCommand::RecordSale(RecordSale {
                product_id: product.id_typed(),
                quantity: 5,
                occurred_at: test_time(),
            }))
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 5,
                remaining: 3
            }
        );
        assert_eq!(product.remaining_quantity(), 3);
    }

    #[test]
    fn sale_of_exactly_remaining_drains_stock_to_zero() {
        let mut product = created_product(4);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::RecordSale(RecordSale {
                product_id: pid,
                quantity: 4,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(product.remaining_quantity(), 0);
        assert_eq!(product.sold_quantity(), 4);
    }

    #[test]
    fn zero_quantity_sale_is_rejected() {
        let product = created_product(10);
        let err = product
            .handle(&ProductCommand::RecordSale(RecordSale {
                product_id: product.id_typed(),
                quantity: 0,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn restock_raises_initial_and_remaining() {
        let mut product = created_product(10);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::RecordSale(RecordSale {
                product_id: pid,
                quantity: 6,
                occurred_at: test_time(),
            }),
        );
        drive(
            &mut product,
            ProductCommand::RestockProduct(RestockProduct {
                product_id: pid,
                quantity: 5,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(product.initial_quantity(), 15);
        assert_eq!(product.remaining_quantity(), 9);
        // Sold count is untouched by a restock.
        assert_eq!(product.sold_quantity(), 6);
    }

    #[test]
    fn zero_restock_is_rejected() {
        let product = created_product(10);
        let err = product
            .handle(&ProductCommand::RestockProduct(RestockProduct {
                product_id: product.id_typed(),
                quantity: 0,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_merges_patch_and_revalidates() {
        let mut product = created_product(10);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::UpdateProduct(UpdateProduct {
                product_id: pid,
                patch: ProductPatch {
                    name: Some("Premium Rice".to_string()),
                    selling_price: Some(Money::from_major(180)),
                    ..ProductPatch::default()
                },
                occurred_at: test_time(),
            }),
        );

        assert_eq!(product.name(), "Premium Rice");
        assert_eq!(product.selling_price(), Money::from_major(180));
        // Unpatched fields survive.
        assert_eq!(product.cost_price(), Money::from_major(100));
        assert_eq!(product.category(), "General");
    }

    #[test]
    fn update_rejects_merged_threshold_inversion() {
        let product = created_product(10);
        // max stays 100; pushing min above it must fail even though the
        // patch alone looks harmless.
        let err = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: product.id_typed(),
                patch: ProductPatch {
                    min_threshold: Some(250),
                    ..ProductPatch::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_patch_decides_no_events() {
        let product = created_product(10);
        let events = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: product.id_typed(),
                patch: ProductPatch::default(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn update_of_unknown_product_is_not_found() {
        let product = Product::empty(test_product_id());
        let err = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: product.id_typed(),
                patch: ProductPatch {
                    name: Some("x".to_string()),
                    ..ProductPatch::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn delete_without_history_tombstones_the_product() {
        let mut product = created_product(10);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::DeleteProduct(DeleteProduct {
                product_id: pid,
                occurred_at: test_time(),
            }),
        );

        assert!(product.is_deleted());

        // Everything after deletion is NotFound.
        let err = product
            .handle(&ProductCommand::RecordSale(RecordSale {
                product_id: product.id_typed(),
                quantity: 1,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn delete_with_ledger_history_is_a_conflict() {
        let mut product = created_product(10);
        let pid = product.id_typed();
        drive(
            &mut product,
            ProductCommand::RecordSale(RecordSale {
                product_id: pid,
                quantity: 1,
                occurred_at: test_time(),
            }),
        );

        let err = product
            .handle(&ProductCommand::DeleteProduct(DeleteProduct {
                product_id: product.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Sale(u64),
            Restock(u64),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1u64..20).prop_map(Op::Sale),
                (1u64..20).prop_map(Op::Restock),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: over any command sequence, the stock invariants hold:
            /// remaining never exceeds initial and sold is exactly the gap.
            #[test]
            fn stock_invariants_hold_over_any_op_sequence(
                initial in 0u64..50,
                ops in prop::collection::vec(op_strategy(), 0..40)
            ) {
                let mut product = created_product(initial);

                for op in ops {
                    let cmd = match op {
                        Op::Sale(q) => ProductCommand::RecordSale(RecordSale {
                            product_id: product.id_typed(),
                            quantity: q,
                            occurred_at: test_time(),
                        }),
                        Op::Restock(q) => ProductCommand::RestockProduct(RestockProduct {
                            product_id: product.id_typed(),
                            quantity: q,
                            occurred_at: test_time(),
                        }),
                    };

                    // Rejected commands must leave state untouched; accepted
                    // ones evolve it. Either way the invariants hold.
                    if let Ok(events) = product.handle(&cmd) {
                        for ev in &events {
                            product.apply(ev);
                        }
                    }

                    prop_assert!(product.remaining_quantity() <= product.initial_quantity());
                    prop_assert_eq!(
                        product.sold_quantity(),
                        product.initial_quantity() - product.remaining_quantity()
                    );
                }
            }

            /// Property: handle is deterministic (same state + command = same decision).
            #[test]
            fn handle_is_deterministic(initial in 0u64..50, quantity in 1u64..20) {
                let product = created_product(initial);
                let cmd = ProductCommand::RecordSale(RecordSale {
                    product_id: product.id_typed(),
                    quantity,
                    occurred_at: test_time(),
                });

                prop_assert_eq!(product.handle(&cmd), product.handle(&cmd));
            }
        }
    }
}
