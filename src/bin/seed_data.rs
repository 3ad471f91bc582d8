//! Seed data script - populates the database with demo data
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - catalog entries (categories, units, brands, movement/request/reception types)
//! - a location, a department and a central warehouse
//! - 8 articles with opening stock booked as ENTRY movements
//! - 3 suppliers and one open purchase order

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use erp_api::{
    commands::procurement::PurchaseOrderLineInput,
    config, db,
    errors::ServiceError,
    events::{process_events, EventSender},
    models::{CatalogKind, OrgUnitKind},
    services::{
        accounts::CreateUserRequest,
        catalogs::CatalogEntryRequest,
        organization::OrgUnitRequest,
        procurement::{PurchaseOrderRequest, SupplierRequest},
        warehouse::{ArticleRequest, WarehouseRequest},
    },
    AppState,
};

const SEED_USERNAME: &str = "seed-admin";

/// Treats a conflict as "already seeded".
fn skip_existing<T>(result: Result<T, ServiceError>, what: &str) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ServiceError::Conflict(msg)) => {
            warn!("  Skipping {}: {}", what, msg);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn catalog(code: &str, name: &str) -> CatalogEntryRequest {
    CatalogEntryRequest {
        code: code.to_string(),
        name: name.to_string(),
        description: None,
        requires_approval: false,
        requires_order: false,
        active: true,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== ERP API Seed Data ===");

    let cfg = config::load_config()?;
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;
    let pool = Arc::new(pool);

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let processor = tokio::spawn(process_events(event_rx, pool.clone()));
    let state = AppState::new(pool, cfg.clone(), Arc::new(EventSender::new(event_tx)));
    state.services.accounts.bootstrap(&cfg).await?;

    info!("Creating seed user...");
    let actor = match skip_existing(
        state
            .services
            .accounts
            .create_user(
                Uuid::nil(),
                CreateUserRequest {
                    username: SEED_USERNAME.to_string(),
                    email: "seed-admin@localhost".to_string(),
                    first_name: "Seed".to_string(),
                    last_name: "Admin".to_string(),
                    password: "change-me-please".to_string(),
                    is_active: true,
                    is_superuser: true,
                    group_ids: Vec::new(),
                    permissions: Vec::new(),
                },
            )
            .await,
        "seed user",
    )? {
        Some(user) => user.id,
        None => {
            info!("Database already seeded, nothing to do");
            return Ok(());
        }
    };

    info!("Creating catalogs...");
    let catalogs = &state.services.catalogs;
    let tools = catalogs
        .create(actor, CatalogKind::Category, catalog("TOOLS", "Hand tools"))
        .await?;
    let consumables = catalogs
        .create(actor, CatalogKind::Category, catalog("CONS", "Consumables"))
        .await?;
    let unit = catalogs
        .create(actor, CatalogKind::UnitOfMeasure, catalog("UN", "Unit"))
        .await?;
    let box_unit = catalogs
        .create(actor, CatalogKind::UnitOfMeasure, catalog("BOX", "Box"))
        .await?;
    let brand = catalogs
        .create(actor, CatalogKind::Brand, catalog("ACME", "Acme Industrial"))
        .await?;
    for (code, name) in [("ADJ", "Inventory adjustment"), ("LOSS", "Loss or breakage")] {
        catalogs
            .create(actor, CatalogKind::MovementType, catalog(code, name))
            .await?;
    }
    catalogs
        .create(
            actor,
            CatalogKind::RequestType,
            CatalogEntryRequest {
                requires_approval: true,
                ..catalog("MAINT", "Maintenance supplies")
            },
        )
        .await?;
    catalogs
        .create(
            actor,
            CatalogKind::ReceptionType,
            CatalogEntryRequest {
                requires_order: true,
                ..catalog("PURCHASE", "Purchase reception")
            },
        )
        .await?;

    info!("Creating organisation...");
    let location = state
        .services
        .organization
        .create(
            actor,
            OrgUnitKind::Location,
            OrgUnitRequest {
                code: "HQ".to_string(),
                name: "Headquarters".to_string(),
                description: None,
                responsible_id: None,
                active: true,
            },
        )
        .await?;
    state
        .services
        .organization
        .create(
            actor,
            OrgUnitKind::Department,
            OrgUnitRequest {
                code: "MAINT".to_string(),
                name: "Maintenance".to_string(),
                description: Some("Plant maintenance crew".to_string()),
                responsible_id: Some(actor),
                active: true,
            },
        )
        .await?;

    let warehouse = state
        .services
        .warehouse
        .create_warehouse(
            actor,
            WarehouseRequest {
                code: "CENTRAL".to_string(),
                name: "Central warehouse".to_string(),
                location_id: Some(location.id),
                manager_id: Some(actor),
                active: true,
            },
        )
        .await?;

    info!("Creating articles...");
    let articles = [
        ("HAM-001", "Claw hammer", tools.id, unit.id, 25, 5),
        ("SCR-002", "Screwdriver set", tools.id, unit.id, 12, 4),
        ("WRN-003", "Adjustable wrench", tools.id, unit.id, 3, 5),
        ("GLV-004", "Work gloves", consumables.id, box_unit.id, 40, 10),
        ("TAP-005", "Insulating tape", consumables.id, unit.id, 60, 20),
        ("SCW-006", "Wood screws 4x40", consumables.id, box_unit.id, 18, 5),
        ("MSK-007", "Dust masks", consumables.id, box_unit.id, 0, 2),
        ("OIL-008", "Lubricant spray", consumables.id, unit.id, 9, 6),
    ];
    let mut created = Vec::with_capacity(articles.len());
    for (code, name, category_id, unit_id, stock, min_stock) in articles {
        let article = state
            .services
            .warehouse
            .create_article(
                actor,
                ArticleRequest {
                    code: code.to_string(),
                    name: name.to_string(),
                    description: None,
                    category_id: Some(category_id),
                    unit_id: Some(unit_id),
                    brand_id: Some(brand.id),
                    warehouse_id: Some(warehouse.id),
                    min_stock,
                    initial_stock: stock,
                    active: true,
                },
            )
            .await?;
        created.push(article);
    }
    info!("  Created {} articles", created.len());

    info!("Creating suppliers...");
    let suppliers = [
        ("20100070970", "Ferreteria Industrial SAC", "ventas@ferreteria.example"),
        ("20512345678", "Suministros Andinos SRL", "pedidos@andinos.example"),
        ("20600011122", "Distribuidora Norte EIRL", "contacto@norte.example"),
    ];
    let mut first_supplier = None;
    for (tax_id, business_name, email) in suppliers {
        let supplier = state
            .services
            .procurement
            .create_supplier(
                actor,
                SupplierRequest {
                    tax_id: tax_id.to_string(),
                    business_name: business_name.to_string(),
                    trade_name: None,
                    contact_name: None,
                    email: Some(email.to_string()),
                    phone: None,
                    address: None,
                    active: true,
                },
            )
            .await?;
        first_supplier.get_or_insert(supplier.id);
    }

    if let (Some(supplier_id), Some(article)) = (first_supplier, created.get(6)) {
        let today = Utc::now().date_naive();
        let order = state
            .services
            .procurement
            .create_order(
                actor,
                PurchaseOrderRequest {
                    supplier_id,
                    warehouse_id: Some(warehouse.id),
                    order_date: Some(today - Duration::days(10)),
                    expected_date: Some(today - Duration::days(2)),
                    notes: Some("Restock dust masks".to_string()),
                    tax_rate: Some(dec!(18)),
                    lines: vec![PurchaseOrderLineInput {
                        article_id: Some(article.id),
                        asset_id: None,
                        description: None,
                        quantity: 20,
                        unit_price: dec!(7.50),
                    }],
                },
            )
            .await?;
        info!("  Created purchase order {}", order.order.number);
    }

    // Let the processor drain the audit events before exiting.
    drop(state);
    if let Err(e) = processor.await {
        warn!("Event processor ended abnormally: {}", e);
    }

    info!("=== Seed complete ===");
    info!("Log in as '{}' with password 'change-me-please'", SEED_USERNAME);
    Ok(())
}
