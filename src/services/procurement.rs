use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{fetch_page, PageRequest};
use crate::{
    commands::{
        procurement::{
            CancelPurchaseOrderCommand, CancelReceptionCommand, ConfirmReceptionCommand,
            CreatePurchaseOrderCommand, CreateReceptionCommand, DeletePurchaseOrderCommand,
            PurchaseOrderLineInput, ReceptionLineInput, UpdatePurchaseOrderCommand,
        },
        Command,
    },
    db::DbPool,
    entities::{purchase_order, purchase_order_line, reception, reception_line, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{ItemKind, PurchaseOrderStatus, ReceptionStatus},
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SupplierRequest {
    #[validate(length(min = 1, max = 20, message = "Tax id is required"))]
    pub tax_id: String,
    #[validate(length(min = 1, max = 200, message = "Business name is required"))]
    pub business_name: String,
    pub trade_name: Option<String>,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Create and update body for purchase orders.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderRequest {
    pub supplier_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Percentage between 0 and 100.
    #[schema(value_type = Option<String>)]
    pub tax_rate: Option<Decimal>,
    #[validate(length(min = 1, message = "A purchase order needs at least one line"))]
    #[validate]
    pub lines: Vec<PurchaseOrderLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReceptionRequest {
    pub kind: ItemKind,
    pub purchase_order_id: Option<Uuid>,
    pub reception_type_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "A reception needs at least one line"))]
    #[validate]
    pub lines: Vec<ReceptionLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseOrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceptionFilter {
    pub status: Option<ReceptionStatus>,
    pub kind: Option<ItemKind>,
    pub purchase_order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseOrderDetail {
    #[schema(value_type = Object)]
    pub order: purchase_order::Model,
    #[schema(value_type = Vec<Object>)]
    pub lines: Vec<purchase_order_line::Model>,
    #[schema(value_type = Vec<Object>)]
    pub receptions: Vec<reception::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceptionDetail {
    #[schema(value_type = Object)]
    pub reception: reception::Model,
    #[schema(value_type = Vec<Object>)]
    pub lines: Vec<reception_line::Model>,
}

fn default_active() -> bool {
    true
}

/// Suppliers, purchase orders and receptions.
#[derive(Clone)]
pub struct ProcurementService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProcurementService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    // ----- suppliers -----

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        filter: SupplierFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<supplier::Model>, ServiceError> {
        let mut query = supplier::Entity::find()
            .filter(supplier::Column::Deleted.eq(false))
            .order_by_asc(supplier::Column::BusinessName);
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(supplier::Column::TaxId.contains(term))
                    .add(supplier::Column::BusinessName.contains(term))
                    .add(supplier::Column::TradeName.contains(term)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(supplier::Column::Active.eq(active));
        }
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, id: Uuid) -> Result<supplier::Model, ServiceError> {
        find_supplier(self.db_pool.as_ref(), id).await
    }

    #[instrument(skip(self, payload), fields(tax_id = %payload.tax_id))]
    pub async fn create_supplier(
        &self,
        actor_id: Uuid,
        payload: SupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let tax_id = payload.tax_id.trim().to_uppercase();
        ensure_tax_id_free(db, &tax_id, None).await?;

        let created = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            tax_id: Set(tax_id),
            business_name: Set(payload.business_name.trim().to_string()),
            trade_name: Set(payload.trade_name),
            contact_name: Set(payload.contact_name),
            email: Set(payload.email),
            phone: Set(payload.phone),
            address: Set(payload.address),
            active: Set(payload.active),
            deleted: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(supplier_id = %created.id, "Supplier created");
        self.record(Event::RecordCreated {
            entity: "supplier".to_string(),
            entity_id: created.id,
            actor_id,
        })
        .await?;
        Ok(created)
    }

    #[instrument(skip(self, payload))]
    pub async fn update_supplier(
        &self,
        actor_id: Uuid,
        id: Uuid,
        payload: SupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let found = find_supplier(db, id).await?;
        let tax_id = payload.tax_id.trim().to_uppercase();
        ensure_tax_id_free(db, &tax_id, Some(id)).await?;

        let mut active: supplier::ActiveModel = found.into();
        active.tax_id = Set(tax_id);
        active.business_name = Set(payload.business_name.trim().to_string());
        active.trade_name = Set(payload.trade_name);
        active.contact_name = Set(payload.contact_name);
        active.email = Set(payload.email);
        active.phone = Set(payload.phone);
        active.address = Set(payload.address);
        active.active = Set(payload.active);
        let updated = active.update(db).await?;

        self.record(Event::RecordUpdated {
            entity: "supplier".to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;
        Ok(updated)
    }

    /// Refused while the supplier has orders that are still open.
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = find_supplier(db, id).await?;

        let open_orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::SupplierId.eq(id))
            .filter(purchase_order::Column::Deleted.eq(false))
            .filter(purchase_order::Column::Status.is_in([
                PurchaseOrderStatus::Pending,
                PurchaseOrderStatus::PartiallyReceived,
            ]))
            .count(db)
            .await?;
        if open_orders > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Supplier {} has {} open purchase order(s)",
                found.business_name, open_orders
            )));
        }

        let mut active: supplier::ActiveModel = found.into();
        active.deleted = Set(true);
        active.active = Set(false);
        active.update(db).await?;

        self.record(Event::RecordDeleted {
            entity: "supplier".to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    // ----- purchase orders -----

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: PurchaseOrderFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<purchase_order::Model>, ServiceError> {
        let mut query = purchase_order::Entity::find()
            .filter(purchase_order::Column::Deleted.eq(false))
            .order_by_desc(purchase_order::Column::OrderDate)
            .order_by_desc(purchase_order::Column::Number);
        if let Some(status) = filter.status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        if let Some(id) = filter.supplier_id {
            query = query.filter(purchase_order::Column::SupplierId.eq(id));
        }
        if let Some(id) = filter.warehouse_id {
            query = query.filter(purchase_order::Column::WarehouseId.eq(id));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(purchase_order::Column::Number.contains(term));
        }
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let order = purchase_order::Entity::find_by_id(id)
            .filter(purchase_order::Column::Deleted.eq(false))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Purchase order", id))?;
        let lines = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(id))
            .all(db)
            .await?;
        let receptions = reception::Entity::find()
            .filter(reception::Column::PurchaseOrderId.eq(id))
            .order_by_asc(reception::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(PurchaseOrderDetail {
            order,
            lines,
            receptions,
        })
    }

    #[instrument(skip(self, payload), fields(supplier_id = %payload.supplier_id))]
    pub async fn create_order(
        &self,
        actor_id: Uuid,
        payload: PurchaseOrderRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let command = CreatePurchaseOrderCommand {
            supplier_id: payload.supplier_id,
            warehouse_id: payload.warehouse_id,
            order_date: payload.order_date,
            expected_date: payload.expected_date,
            notes: payload.notes,
            tax_rate: payload.tax_rate,
            lines: payload.lines,
            created_by: actor_id,
        };
        let created = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        self.get_order(created.id).await
    }

    #[instrument(skip(self, payload))]
    pub async fn update_order(
        &self,
        actor_id: Uuid,
        id: Uuid,
        payload: PurchaseOrderRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let command = UpdatePurchaseOrderCommand {
            purchase_order_id: id,
            supplier_id: payload.supplier_id,
            warehouse_id: payload.warehouse_id,
            order_date: payload.order_date,
            expected_date: payload.expected_date,
            notes: payload.notes,
            tax_rate: payload.tax_rate,
            lines: payload.lines,
            user_id: actor_id,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        self.get_order(id).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        actor_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        CancelPurchaseOrderCommand {
            purchase_order_id: id,
            reason,
            user_id: actor_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        DeletePurchaseOrderCommand {
            purchase_order_id: id,
            user_id: actor_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    // ----- receptions -----

    #[instrument(skip(self))]
    pub async fn list_receptions(
        &self,
        filter: ReceptionFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<reception::Model>, ServiceError> {
        let mut query = reception::Entity::find().order_by_desc(reception::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(reception::Column::Status.eq(status));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(reception::Column::Kind.eq(kind));
        }
        if let Some(id) = filter.purchase_order_id {
            query = query.filter(reception::Column::PurchaseOrderId.eq(id));
        }
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_reception(&self, id: Uuid) -> Result<ReceptionDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = reception::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Reception", id))?;
        let lines = reception_line::Entity::find()
            .filter(reception_line::Column::ReceptionId.eq(id))
            .all(db)
            .await?;
        Ok(ReceptionDetail {
            reception: found,
            lines,
        })
    }

    #[instrument(skip(self, payload), fields(kind = %payload.kind))]
    pub async fn create_reception(
        &self,
        actor_id: Uuid,
        payload: ReceptionRequest,
    ) -> Result<ReceptionDetail, ServiceError> {
        let command = CreateReceptionCommand {
            kind: payload.kind,
            purchase_order_id: payload.purchase_order_id,
            reception_type_id: payload.reception_type_id,
            warehouse_id: payload.warehouse_id,
            notes: payload.notes,
            lines: payload.lines,
            received_by: actor_id,
        };
        let created = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        self.get_reception(created.id).await
    }

    #[instrument(skip(self))]
    pub async fn confirm_reception(&self, actor_id: Uuid, id: Uuid) -> Result<ReceptionDetail, ServiceError> {
        ConfirmReceptionCommand {
            reception_id: id,
            user_id: actor_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.get_reception(id).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_reception(&self, actor_id: Uuid, id: Uuid) -> Result<reception::Model, ServiceError> {
        CancelReceptionCommand {
            reception_id: id,
            user_id: actor_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    async fn record(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}

async fn find_supplier<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<supplier::Model, ServiceError> {
    supplier::Entity::find_by_id(id)
        .filter(supplier::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Supplier", id))
}

async fn ensure_tax_id_free<C: ConnectionTrait>(
    db: &C,
    tax_id: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = supplier::Entity::find().filter(supplier::Column::TaxId.eq(tax_id));
    if let Some(id) = exclude {
        query = query.filter(supplier::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "A supplier with tax id {} already exists",
            tax_id
        )));
    }
    Ok(())
}
