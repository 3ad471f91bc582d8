use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{catalogs::ensure_entry, fetch_page, PageRequest};
use crate::{
    commands::{
        warehouse::{
            apply_movement, CreateDeliveryCommand, DeliveryLineInput, MovementInput,
            RegisterMovementCommand,
        },
        Command,
    },
    common::DateRangeParams,
    db::{flatten_txn_error, DbPool},
    entities::{
        article, asset, delivery, delivery_line, movement, org_unit, request, request_detail,
        user, warehouse,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CatalogKind, ItemKind, MovementOperation, OrgUnitKind, RequestStatus},
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct WarehouseRequest {
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub location_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ArticleRequest {
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    #[validate(range(min = 0, message = "Minimum stock cannot be negative"))]
    #[serde(default)]
    pub min_stock: i32,
    /// Create only; booked as an ENTRY movement.
    #[validate(range(min = 0, message = "Initial stock cannot be negative"))]
    #[serde(default)]
    pub initial_stock: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AssetRequest {
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MovementRequest {
    pub article_id: Uuid,
    pub movement_type_id: Option<Uuid>,
    pub operation: MovementOperation,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DeliveryRequest {
    pub kind: ItemKind,
    pub warehouse_id: Option<Uuid>,
    pub received_by: Option<Uuid>,
    #[validate(length(min = 1, max = 500, message = "A reason is required"))]
    pub reason: String,
    pub department_id: Option<Uuid>,
    pub notes: Option<String>,
    pub request_id: Option<Uuid>,
    #[validate(length(min = 1, message = "A delivery needs at least one line"))]
    #[validate]
    pub lines: Vec<DeliveryLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehouseFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleFilter {
    pub search: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub active: Option<bool>,
    /// Only articles at or below their minimum stock.
    pub low_stock: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub article_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub operation: Option<MovementOperation>,
    pub movement_type_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryFilter {
    pub kind: Option<ItemKind>,
    pub warehouse_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryDetail {
    #[schema(value_type = Object)]
    pub delivery: delivery::Model,
    #[schema(value_type = Vec<Object>)]
    pub lines: Vec<delivery_line::Model>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WarehouseSummary {
    pub warehouses: u64,
    pub articles: u64,
    pub low_stock_articles: u64,
    pub total_stock: i64,
    pub assets: u64,
    pub movements: u64,
    pub deliveries: u64,
}

fn default_active() -> bool {
    true
}

/// Warehouses, articles, assets, movements and deliveries.
#[derive(Clone)]
pub struct WarehouseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WarehouseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    // ----- warehouses -----

    #[instrument(skip(self))]
    pub async fn list_warehouses(
        &self,
        filter: WarehouseFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<warehouse::Model>, ServiceError> {
        let mut query = warehouse::Entity::find()
            .filter(warehouse::Column::Deleted.eq(false))
            .order_by_asc(warehouse::Column::Code);
        if let Some(term) = search_term(&filter.search) {
            query = query.filter(
                Condition::any()
                    .add(warehouse::Column::Code.contains(term))
                    .add(warehouse::Column::Name.contains(term)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(warehouse::Column::Active.eq(active));
        }
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_warehouse(&self, id: Uuid) -> Result<warehouse::Model, ServiceError> {
        find_warehouse(self.db_pool.as_ref(), id).await
    }

    #[instrument(skip(self, payload), fields(code = %payload.code))]
    pub async fn create_warehouse(
        &self,
        actor_id: Uuid,
        payload: WarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let code = payload.code.trim().to_uppercase();
        self.check_warehouse_refs(&payload).await?;

        let taken = warehouse::Entity::find()
            .filter(warehouse::Column::Code.eq(code.as_str()))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Warehouse code {} is already used",
                code
            )));
        }

        let created = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(payload.name.trim().to_string()),
            location_id: Set(payload.location_id),
            manager_id: Set(payload.manager_id),
            active: Set(payload.active),
            deleted: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(warehouse_id = %created.id, "Warehouse created");
        self.record(Event::RecordCreated {
            entity: "warehouse".to_string(),
            entity_id: created.id,
            actor_id,
        })
        .await?;
        Ok(created)
    }

    #[instrument(skip(self, payload))]
    pub async fn update_warehouse(
        &self,
        actor_id: Uuid,
        id: Uuid,
        payload: WarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let found = find_warehouse(db, id).await?;
        self.check_warehouse_refs(&payload).await?;

        let code = payload.code.trim().to_uppercase();
        if code != found.code {
            let taken = warehouse::Entity::find()
                .filter(warehouse::Column::Code.eq(code.as_str()))
                .count(db)
                .await?;
            if taken > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Warehouse code {} is already used",
                    code
                )));
            }
        }

        let mut active: warehouse::ActiveModel = found.into();
        active.code = Set(code);
        active.name = Set(payload.name.trim().to_string());
        active.location_id = Set(payload.location_id);
        active.manager_id = Set(payload.manager_id);
        active.active = Set(payload.active);
        let updated = active.update(db).await?;

        self.record(Event::RecordUpdated {
            entity: "warehouse".to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;
        Ok(updated)
    }

    /// Refused while live articles or open article requests use the warehouse.
    #[instrument(skip(self))]
    pub async fn delete_warehouse(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = find_warehouse(db, id).await?;

        let articles = article::Entity::find()
            .filter(article::Column::WarehouseId.eq(id))
            .filter(article::Column::Deleted.eq(false))
            .count(db)
            .await?;
        let open_requests = request::Entity::find()
            .filter(request::Column::WarehouseId.eq(id))
            .filter(request::Column::Deleted.eq(false))
            .filter(request::Column::Status.is_in([RequestStatus::Pending, RequestStatus::Approved]))
            .count(db)
            .await?;
        if articles + open_requests > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Warehouse {} still has {} article(s) and {} open request(s)",
                found.code, articles, open_requests
            )));
        }

        let mut active: warehouse::ActiveModel = found.into();
        active.deleted = Set(true);
        active.active = Set(false);
        active.update(db).await?;

        self.record(Event::RecordDeleted {
            entity: "warehouse".to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    async fn check_warehouse_refs(&self, payload: &WarehouseRequest) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        if let Some(id) = payload.location_id {
            org_unit::Entity::find_by_id(id)
                .filter(org_unit::Column::Kind.eq(OrgUnitKind::Location))
                .filter(org_unit::Column::Deleted.eq(false))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Location", id))?;
        }
        if let Some(id) = payload.manager_id {
            user::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("User", id))?;
        }
        Ok(())
    }

    // ----- articles -----

    #[instrument(skip(self))]
    pub async fn list_articles(
        &self,
        filter: ArticleFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<article::Model>, ServiceError> {
        let mut query = article::Entity::find()
            .filter(article::Column::Deleted.eq(false))
            .order_by_asc(article::Column::Code);

        if let Some(term) = search_term(&filter.search) {
            query = query.filter(
                Condition::any()
                    .add(article::Column::Code.contains(term))
                    .add(article::Column::Name.contains(term))
                    .add(article::Column::Description.contains(term)),
            );
        }
        if let Some(id) = filter.warehouse_id {
            query = query.filter(article::Column::WarehouseId.eq(id));
        }
        if let Some(id) = filter.category_id {
            query = query.filter(article::Column::CategoryId.eq(id));
        }
        if let Some(id) = filter.brand_id {
            query = query.filter(article::Column::BrandId.eq(id));
        }
        if let Some(active) = filter.active {
            query = query.filter(article::Column::Active.eq(active));
        }
        if filter.low_stock == Some(true) {
            query = query.filter(
                Expr::col(article::Column::Stock).lte(Expr::col(article::Column::MinStock)),
            );
        }

        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_article(&self, id: Uuid) -> Result<article::Model, ServiceError> {
        find_article(self.db_pool.as_ref(), id).await
    }

    #[instrument(skip(self, payload), fields(code = %payload.code))]
    pub async fn create_article(
        &self,
        actor_id: Uuid,
        payload: ArticleRequest,
    ) -> Result<article::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();

        let created = db
            .transaction::<_, article::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    check_article_refs(txn, &payload).await?;
                    let code = payload.code.trim().to_uppercase();
                    let taken = article::Entity::find()
                        .filter(article::Column::Code.eq(code.as_str()))
                        .count(txn)
                        .await?;
                    if taken > 0 {
                        return Err(ServiceError::Conflict(format!(
                            "Article code {} is already used",
                            code
                        )));
                    }

                    let created = article::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        code: Set(code),
                        name: Set(payload.name.trim().to_string()),
                        description: Set(payload.description.clone()),
                        category_id: Set(payload.category_id),
                        unit_id: Set(payload.unit_id),
                        brand_id: Set(payload.brand_id),
                        warehouse_id: Set(payload.warehouse_id),
                        stock: Set(0),
                        min_stock: Set(payload.min_stock),
                        active: Set(payload.active),
                        deleted: Set(false),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    if payload.initial_stock > 0 {
                        apply_movement(
                            txn,
                            MovementInput {
                                article_id: created.id,
                                operation: MovementOperation::Entry,
                                quantity: payload.initial_stock,
                                movement_type_id: None,
                                reason: Some("Initial stock".to_string()),
                                reference_kind: Some("initial"),
                                reference_id: None,
                                user_id: actor_id,
                            },
                        )
                        .await?;
                        return find_article(txn, created.id).await;
                    }
                    Ok(created)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        info!(article_id = %created.id, stock = created.stock, "Article created");
        self.record(Event::RecordCreated {
            entity: "article".to_string(),
            entity_id: created.id,
            actor_id,
        })
        .await?;
        Ok(created)
    }

    /// Stock is never edited here; it only moves through movements.
    #[instrument(skip(self, payload))]
    pub async fn update_article(
        &self,
        actor_id: Uuid,
        id: Uuid,
        payload: ArticleRequest,
    ) -> Result<article::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let found = find_article(db, id).await?;
        check_article_refs(db, &payload).await?;

        let code = payload.code.trim().to_uppercase();
        if code != found.code {
            let taken = article::Entity::find()
                .filter(article::Column::Code.eq(code.as_str()))
                .count(db)
                .await?;
            if taken > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Article code {} is already used",
                    code
                )));
            }
        }

        let mut active: article::ActiveModel = found.into();
        active.code = Set(code);
        active.name = Set(payload.name.trim().to_string());
        active.description = Set(payload.description.clone());
        active.category_id = Set(payload.category_id);
        active.unit_id = Set(payload.unit_id);
        active.brand_id = Set(payload.brand_id);
        active.warehouse_id = Set(payload.warehouse_id);
        active.min_stock = Set(payload.min_stock);
        active.active = Set(payload.active);
        let updated = active.update(db).await?;

        self.record(Event::RecordUpdated {
            entity: "article".to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;
        Ok(updated)
    }

    /// Refused while the article has stock or sits on an open request.
    #[instrument(skip(self))]
    pub async fn delete_article(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = find_article(db, id).await?;

        if found.stock > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Article {} still has {} in stock",
                found.code, found.stock
            )));
        }
        let open_lines = open_request_lines(db, request_detail::Column::ArticleId, id).await?;
        if open_lines > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Article {} is on {} open request line(s)",
                found.code, open_lines
            )));
        }

        let mut active: article::ActiveModel = found.into();
        active.deleted = Set(true);
        active.active = Set(false);
        active.update(db).await?;

        self.record(Event::RecordDeleted {
            entity: "article".to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    // ----- assets -----

    #[instrument(skip(self))]
    pub async fn list_assets(
        &self,
        filter: AssetFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<asset::Model>, ServiceError> {
        let mut query = asset::Entity::find()
            .filter(asset::Column::Deleted.eq(false))
            .order_by_asc(asset::Column::Code);
        if let Some(term) = search_term(&filter.search) {
            query = query.filter(
                Condition::any()
                    .add(asset::Column::Code.contains(term))
                    .add(asset::Column::Name.contains(term))
                    .add(asset::Column::SerialNumber.contains(term)),
            );
        }
        if let Some(id) = filter.category_id {
            query = query.filter(asset::Column::CategoryId.eq(id));
        }
        if let Some(active) = filter.active {
            query = query.filter(asset::Column::Active.eq(active));
        }
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_asset(&self, id: Uuid) -> Result<asset::Model, ServiceError> {
        find_asset(self.db_pool.as_ref(), id).await
    }

    #[instrument(skip(self, payload), fields(code = %payload.code))]
    pub async fn create_asset(&self, actor_id: Uuid, payload: AssetRequest) -> Result<asset::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        ensure_entry(db, CatalogKind::Category, payload.category_id).await?;

        let code = payload.code.trim().to_uppercase();
        let taken = asset::Entity::find()
            .filter(asset::Column::Code.eq(code.as_str()))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Asset code {} is already used",
                code
            )));
        }

        let created = asset::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(payload.name.trim().to_string()),
            description: Set(payload.description.clone()),
            category_id: Set(payload.category_id),
            serial_number: Set(payload.serial_number.clone()),
            active: Set(payload.active),
            deleted: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.record(Event::RecordCreated {
            entity: "asset".to_string(),
            entity_id: created.id,
            actor_id,
        })
        .await?;
        Ok(created)
    }

    #[instrument(skip(self, payload))]
    pub async fn update_asset(
        &self,
        actor_id: Uuid,
        id: Uuid,
        payload: AssetRequest,
    ) -> Result<asset::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let found = find_asset(db, id).await?;
        ensure_entry(db, CatalogKind::Category, payload.category_id).await?;

        let code = payload.code.trim().to_uppercase();
        if code != found.code {
            let taken = asset::Entity::find()
                .filter(asset::Column::Code.eq(code.as_str()))
                .count(db)
                .await?;
            if taken > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Asset code {} is already used",
                    code
                )));
            }
        }

        let mut active: asset::ActiveModel = found.into();
        active.code = Set(code);
        active.name = Set(payload.name.trim().to_string());
        active.description = Set(payload.description.clone());
        active.category_id = Set(payload.category_id);
        active.serial_number = Set(payload.serial_number.clone());
        active.active = Set(payload.active);
        let updated = active.update(db).await?;

        self.record(Event::RecordUpdated {
            entity: "asset".to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_asset(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = find_asset(db, id).await?;

        let open_lines = open_request_lines(db, request_detail::Column::AssetId, id).await?;
        if open_lines > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Asset {} is on {} open request line(s)",
                found.code, open_lines
            )));
        }

        let mut active: asset::ActiveModel = found.into();
        active.deleted = Set(true);
        active.active = Set(false);
        active.update(db).await?;

        self.record(Event::RecordDeleted {
            entity: "asset".to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    // ----- movements -----

    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<movement::Model>, ServiceError> {
        let query = movement_query(&filter)?;
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self, payload), fields(article_id = %payload.article_id))]
    pub async fn register_movement(
        &self,
        actor_id: Uuid,
        payload: MovementRequest,
    ) -> Result<movement::Model, ServiceError> {
        let command = RegisterMovementCommand {
            article_id: payload.article_id,
            movement_type_id: payload.movement_type_id,
            operation: payload.operation,
            quantity: payload.quantity,
            reason: payload.reason,
            user_id: actor_id,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    // ----- deliveries -----

    #[instrument(skip(self))]
    pub async fn list_deliveries(
        &self,
        filter: DeliveryFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<delivery::Model>, ServiceError> {
        let mut query = delivery::Entity::find().order_by_desc(delivery::Column::CreatedAt);
        if let Some(kind) = filter.kind {
            query = query.filter(delivery::Column::Kind.eq(kind));
        }
        if let Some(id) = filter.warehouse_id {
            query = query.filter(delivery::Column::WarehouseId.eq(id));
        }
        if let Some(id) = filter.request_id {
            query = query.filter(delivery::Column::RequestId.eq(id));
        }
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_delivery(&self, id: Uuid) -> Result<DeliveryDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = delivery::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery", id))?;
        let lines = delivery_line::Entity::find()
            .filter(delivery_line::Column::DeliveryId.eq(id))
            .all(db)
            .await?;
        Ok(DeliveryDetail {
            delivery: found,
            lines,
        })
    }

    #[instrument(skip(self, payload), fields(kind = %payload.kind))]
    pub async fn create_delivery(
        &self,
        actor_id: Uuid,
        payload: DeliveryRequest,
    ) -> Result<DeliveryDetail, ServiceError> {
        if let Some(id) = payload.department_id {
            org_unit::Entity::find_by_id(id)
                .filter(org_unit::Column::Kind.eq(OrgUnitKind::Department))
                .filter(org_unit::Column::Deleted.eq(false))
                .one(self.db_pool.as_ref())
                .await?
                .ok_or_else(|| ServiceError::not_found("Department", id))?;
        }

        let command = CreateDeliveryCommand {
            kind: payload.kind,
            warehouse_id: payload.warehouse_id,
            received_by: payload.received_by,
            reason: payload.reason,
            department_id: payload.department_id,
            notes: payload.notes,
            request_id: payload.request_id,
            lines: payload.lines,
            delivered_by: actor_id,
        };
        let created = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        self.get_delivery(created.id).await
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<WarehouseSummary, ServiceError> {
        let db = self.db_pool.as_ref();
        let live_articles = || article::Entity::find().filter(article::Column::Deleted.eq(false));

        let warehouses = warehouse::Entity::find()
            .filter(warehouse::Column::Deleted.eq(false))
            .filter(warehouse::Column::Active.eq(true))
            .count(db)
            .await?;
        let articles = live_articles().count(db).await?;
        let low_stock_articles = live_articles()
            .filter(Expr::col(article::Column::Stock).lte(Expr::col(article::Column::MinStock)))
            .count(db)
            .await?;
        let total_stock = total_stock(db, live_articles()).await?;
        let assets = asset::Entity::find()
            .filter(asset::Column::Deleted.eq(false))
            .count(db)
            .await?;
        let movements = movement::Entity::find().count(db).await?;
        let deliveries = delivery::Entity::find().count(db).await?;

        Ok(WarehouseSummary {
            warehouses,
            articles,
            low_stock_articles,
            total_stock,
            assets,
            movements,
            deliveries,
        })
    }

    async fn record(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}

fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

/// Filtered movements, newest first. Dates only apply when at least one end is given.
pub(crate) fn movement_query(filter: &MovementFilter) -> Result<Select<movement::Entity>, ServiceError> {
    let mut query = movement::Entity::find().order_by_desc(movement::Column::CreatedAt);

    if let Some(id) = filter.article_id {
        query = query.filter(movement::Column::ArticleId.eq(id));
    }
    if let Some(operation) = filter.operation {
        query = query.filter(movement::Column::Operation.eq(operation));
    }
    if let Some(id) = filter.movement_type_id {
        query = query.filter(movement::Column::MovementTypeId.eq(id));
    }
    if let Some(id) = filter.warehouse_id {
        query = query.filter(
            movement::Column::ArticleId.in_subquery(
                Query::select()
                    .column(article::Column::Id)
                    .from(article::Entity)
                    .and_where(article::Column::WarehouseId.eq(id))
                    .to_owned(),
            ),
        );
    }
    if filter.from.is_some() || filter.to.is_some() {
        let (from, to) = DateRangeParams::new(filter.from.as_deref(), filter.to.as_deref())
            .resolve(Utc::now().date_naive())?;
        query = query.filter(movement::Column::CreatedAt.between(from, to));
    }

    Ok(query)
}

pub(crate) async fn total_stock<C: ConnectionTrait>(
    db: &C,
    articles: Select<article::Entity>,
) -> Result<i64, ServiceError> {
    let total: Option<Option<i64>> = articles
        .select_only()
        .column_as(article::Column::Stock.sum(), "total")
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

async fn find_warehouse<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<warehouse::Model, ServiceError> {
    warehouse::Entity::find_by_id(id)
        .filter(warehouse::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Warehouse", id))
}

async fn find_article<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<article::Model, ServiceError> {
    article::Entity::find_by_id(id)
        .filter(article::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Article", id))
}

async fn find_asset<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<asset::Model, ServiceError> {
    asset::Entity::find_by_id(id)
        .filter(asset::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Asset", id))
}

async fn check_article_refs<C: ConnectionTrait>(db: &C, payload: &ArticleRequest) -> Result<(), ServiceError> {
    ensure_entry(db, CatalogKind::Category, payload.category_id).await?;
    ensure_entry(db, CatalogKind::UnitOfMeasure, payload.unit_id).await?;
    ensure_entry(db, CatalogKind::Brand, payload.brand_id).await?;
    if let Some(id) = payload.warehouse_id {
        find_warehouse(db, id).await?;
    }
    Ok(())
}

/// Live lines of PENDING or APPROVED requests that reference the item.
async fn open_request_lines<C: ConnectionTrait>(
    db: &C,
    column: request_detail::Column,
    item_id: Uuid,
) -> Result<u64, ServiceError> {
    Ok(request_detail::Entity::find()
        .filter(column.eq(item_id))
        .filter(request_detail::Column::Deleted.eq(false))
        .filter(
            request_detail::Column::RequestId.in_subquery(
                Query::select()
                    .column(request::Column::Id)
                    .from(request::Entity)
                    .and_where(request::Column::Deleted.eq(false))
                    .and_where(
                        request::Column::Status
                            .is_in([RequestStatus::Pending, RequestStatus::Approved]),
                    )
                    .to_owned(),
            ),
        )
        .count(db)
        .await?)
}
