use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{load_order, load_order_lines};
use crate::{
    commands::Command,
    common::next_document_number,
    db::{flatten_txn_error, DbPool},
    entities::{article, asset, catalog_entry, purchase_order_line, reception, reception_line, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CatalogKind, ItemKind, ReceptionStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceptionLineInput {
    /// Item is taken from the order line when given.
    pub purchase_order_line_id: Option<Uuid>,
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Records received goods as PENDING until someone confirms them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReceptionCommand {
    pub kind: ItemKind,
    pub purchase_order_id: Option<Uuid>,
    pub reception_type_id: Option<Uuid>,
    /// Falls back to the order's warehouse.
    pub warehouse_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "A reception needs at least one line"))]
    #[validate]
    pub lines: Vec<ReceptionLineInput>,
    pub received_by: Uuid,
}

#[async_trait]
impl Command for CreateReceptionCommand {
    type Result = reception::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(kind = %self.kind))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let cmd = self.clone();

        let created = db_pool
            .transaction::<_, reception::Model, ServiceError>(|txn| {
                Box::pin(async move { cmd.create_in_txn(txn).await })
            })
            .await
            .map_err(flatten_txn_error)?;

        info!(reception_id = %created.id, number = %created.number, "Reception created");

        event_sender
            .send(Event::RecordCreated {
                entity: "reception".to_string(),
                entity_id: created.id,
                actor_id: self.received_by,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }
}

impl CreateReceptionCommand {
    async fn create_in_txn<C: ConnectionTrait>(&self, txn: &C) -> Result<reception::Model, ServiceError> {
        if let Some(type_id) = self.reception_type_id {
            let reception_type = catalog_entry::Entity::find_by_id(type_id)
                .filter(catalog_entry::Column::Kind.eq(CatalogKind::ReceptionType))
                .filter(catalog_entry::Column::Deleted.eq(false))
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Reception type", type_id))?;

            if reception_type.requires_order && self.purchase_order_id.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Reception type {} requires a purchase order",
                    reception_type.code
                )));
            }
        }

        let (order, order_lines) = match self.purchase_order_id {
            Some(order_id) => {
                let order = load_order(txn, order_id).await?;
                if !order.status.is_open() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Purchase order {} is {} and cannot receive goods",
                        order.number, order.status
                    )));
                }
                let lines = load_order_lines(txn, order.id).await?;
                (Some(order), lines)
            }
            None => (None, Vec::new()),
        };

        let warehouse_id = self
            .warehouse_id
            .or_else(|| order.as_ref().and_then(|o| o.warehouse_id));
        if self.kind == ItemKind::Article {
            let id = warehouse_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Article receptions need a destination warehouse".to_string(),
                )
            })?;
            warehouse::Entity::find_by_id(id)
                .filter(warehouse::Column::Deleted.eq(false))
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Warehouse", id))?;
        }

        let mut resolved = Vec::with_capacity(self.lines.len());
        for (index, line) in self.lines.iter().enumerate() {
            resolved.push(self.resolve_line(txn, index + 1, line, &order_lines).await?);
        }

        let number = next_document_number::<reception::Entity, _>(
            txn,
            reception::Column::Number,
            "REC",
            Utc::now().date_naive(),
        )
        .await?;

        let created = reception::ActiveModel {
            id: Set(Uuid::new_v4()),
            number: Set(number),
            kind: Set(self.kind),
            purchase_order_id: Set(order.as_ref().map(|o| o.id)),
            reception_type_id: Set(self.reception_type_id),
            warehouse_id: Set(match self.kind {
                ItemKind::Article => warehouse_id,
                ItemKind::Asset => None,
            }),
            status: Set(ReceptionStatus::Pending),
            received_by: Set(self.received_by),
            notes: Set(self.notes.clone()),
            confirmed_at: Set(None),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        for line in resolved {
            reception_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                reception_id: Set(created.id),
                ..line
            }
            .insert(txn)
            .await?;
        }

        Ok(created)
    }

    async fn resolve_line<C: ConnectionTrait>(
        &self,
        txn: &C,
        position: usize,
        line: &ReceptionLineInput,
        order_lines: &[purchase_order_line::Model],
    ) -> Result<reception_line::ActiveModel, ServiceError> {
        let (article_id, asset_id) = match line.purchase_order_line_id {
            Some(order_line_id) => {
                let order_line = order_lines
                    .iter()
                    .find(|l| l.id == order_line_id)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "Line {}: order line {} does not belong to the purchase order",
                            position, order_line_id
                        ))
                    })?;
                let pending = order_line.quantity - order_line.received_quantity;
                if line.quantity > pending {
                    return Err(ServiceError::ValidationError(format!(
                        "Line {}: receiving {} would exceed the {} still pending on the order",
                        position, line.quantity, pending
                    )));
                }
                (order_line.article_id, order_line.asset_id)
            }
            None => (line.article_id, line.asset_id),
        };

        match (self.kind, article_id, asset_id) {
            (ItemKind::Article, Some(id), None) => {
                article::Entity::find_by_id(id)
                    .filter(article::Column::Deleted.eq(false))
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Article", id))?;
            }
            (ItemKind::Asset, None, Some(id)) => {
                asset::Entity::find_by_id(id)
                    .filter(asset::Column::Deleted.eq(false))
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Asset", id))?;
            }
            _ => {
                return Err(ServiceError::ValidationError(format!(
                    "Line {}: {} receptions take exactly one {} per line",
                    position,
                    self.kind.as_str().to_lowercase(),
                    self.kind.as_str().to_lowercase()
                )))
            }
        }

        Ok(reception_line::ActiveModel {
            purchase_order_line_id: Set(line.purchase_order_line_id),
            article_id: Set(article_id),
            asset_id: Set(asset_id),
            quantity: Set(line.quantity),
            ..Default::default()
        })
    }
}
