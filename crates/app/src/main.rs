//! Demo entrypoint: seed a small catalog, record some receipts, print the
//! reports. Useful for eyeballing the service layer end to end without an
//! HTTP frontend.

use anyhow::Context;

use stockbook_app::dto::{
    CreateProductRequest, ReceiptLineRequest, ReceiptRequest, RestockRequest,
};
use stockbook_app::{build_in_memory_services, AppServices};
use stockbook_core::Money;

fn main() -> anyhow::Result<()> {
    stockbook_observability::init();

    let services = build_in_memory_services();
    seed(&services)?;

    let stats = services.dashboard_stats();
    println!(
        "dashboard stats:\n{}",
        serde_json::to_string_pretty(&stats)?
    );

    let summary = services.stock_summary();
    println!(
        "stock summary:\n{}",
        serde_json::to_string_pretty(&summary)?
    );

    let recent = services.recent_transactions(10);
    println!(
        "recent transactions:\n{}",
        serde_json::to_string_pretty(&recent)?
    );

    let low = services.low_stock(None);
    println!("low stock:\n{}", serde_json::to_string_pretty(&low)?);

    Ok(())
}

fn seed(services: &AppServices) -> anyhow::Result<()> {
    let rice = services
        .create_product(CreateProductRequest {
            name: "Bag of Rice (50kg)".to_string(),
            category: "Grains".to_string(),
            initial_quantity: 10,
            cost_price: Some(Money::from_major(100)),
            selling_price: Some(Money::from_major(150)),
            min_threshold: Some(5),
            max_threshold: Some(100),
        })
        .context("seeding rice")?;

    let oil = services
        .create_product(CreateProductRequest {
            name: "Vegetable Oil (5L)".to_string(),
            category: "Cooking".to_string(),
            initial_quantity: 24,
            cost_price: Some(Money::from_major(80)),
            selling_price: Some(Money::from_major(95)),
            min_threshold: None,
            max_threshold: None,
        })
        .context("seeding oil")?;

    services
        .record_receipt(ReceiptRequest {
            items: vec![ReceiptLineRequest {
                product_id: rice.id.clone(),
                quantity: 7,
            }],
        })
        .context("recording rice receipt")?;

    services
        .record_receipt(ReceiptRequest {
            items: vec![
                ReceiptLineRequest {
                    product_id: oil.id.clone(),
                    quantity: 3,
                },
                ReceiptLineRequest {
                    product_id: rice.id.clone(),
                    quantity: 1,
                },
            ],
        })
        .context("recording mixed receipt")?;

    services
        .restock_product(&oil.id, RestockRequest { amount: 12 })
        .context("restocking oil")?;

    Ok(())
}
