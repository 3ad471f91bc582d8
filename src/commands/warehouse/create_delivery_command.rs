use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::stock::{apply_movement, MovementInput};
use crate::{
    commands::{
        requests::{ensure_dispatchable_request, mark_dispatched, DispatchedLine},
        Command,
    },
    common::next_document_number,
    db::{flatten_txn_error, DbPool},
    entities::{asset, delivery, delivery_line, request, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{ItemKind, MovementOperation},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeliveryLineInput {
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub request_detail_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Delivery header as written to `deliveries`.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryDraft {
    pub kind: ItemKind,
    pub warehouse_id: Option<Uuid>,
    pub delivered_by: Uuid,
    pub received_by: Option<Uuid>,
    pub reason: String,
    pub department_id: Option<Uuid>,
    pub notes: Option<String>,
    pub request_id: Option<Uuid>,
}

/// Inserts a delivery with its lines; article lines take stock out with EXIT movements.
pub(crate) async fn insert_delivery<C: ConnectionTrait>(
    conn: &C,
    draft: DeliveryDraft,
    lines: &[DeliveryLineInput],
) -> Result<delivery::Model, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "A delivery needs at least one line".to_string(),
        ));
    }

    let warehouse_id = match draft.kind {
        ItemKind::Article => {
            let id = draft.warehouse_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Article deliveries need an origin warehouse".to_string(),
                )
            })?;
            warehouse::Entity::find_by_id(id)
                .filter(warehouse::Column::Deleted.eq(false))
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Warehouse", id))?;
            Some(id)
        }
        ItemKind::Asset => None,
    };

    for (index, line) in lines.iter().enumerate() {
        let valid = match draft.kind {
            ItemKind::Article => line.article_id.is_some() && line.asset_id.is_none(),
            ItemKind::Asset => line.asset_id.is_some() && line.article_id.is_none(),
        };
        if !valid {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: {} deliveries take exactly one {} per line",
                index + 1,
                draft.kind.as_str().to_lowercase(),
                draft.kind.as_str().to_lowercase()
            )));
        }
        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: quantity must be at least 1",
                index + 1
            )));
        }
    }

    let number = next_document_number::<delivery::Entity, _>(
        conn,
        delivery::Column::Number,
        "ENT",
        Utc::now().date_naive(),
    )
    .await?;

    let created = delivery::ActiveModel {
        id: Set(Uuid::new_v4()),
        number: Set(number.clone()),
        kind: Set(draft.kind),
        warehouse_id: Set(warehouse_id),
        delivered_by: Set(draft.delivered_by),
        received_by: Set(draft.received_by),
        reason: Set(draft.reason),
        department_id: Set(draft.department_id),
        notes: Set(draft.notes),
        request_id: Set(draft.request_id),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    for line in lines {
        if let Some(asset_id) = line.asset_id {
            asset::Entity::find_by_id(asset_id)
                .filter(asset::Column::Deleted.eq(false))
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Asset", asset_id))?;
        }

        delivery_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(created.id),
            article_id: Set(line.article_id),
            asset_id: Set(line.asset_id),
            quantity: Set(line.quantity),
            request_detail_id: Set(line.request_detail_id),
            notes: Set(line.notes.clone()),
        }
        .insert(conn)
        .await?;

        if let Some(article_id) = line.article_id {
            apply_movement(
                conn,
                MovementInput {
                    article_id,
                    operation: MovementOperation::Exit,
                    quantity: line.quantity,
                    movement_type_id: None,
                    reason: Some(format!("Delivery {}", number)),
                    reference_kind: Some("delivery"),
                    reference_id: Some(created.id),
                    user_id: draft.delivered_by,
                },
            )
            .await?;
        }
    }

    Ok(created)
}

/// Direct delivery from the warehouse, optionally closing an approved request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDeliveryCommand {
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
    pub delivered_by: Uuid,
}

#[async_trait]
impl Command for CreateDeliveryCommand {
    type Result = delivery::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(kind = %self.kind))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (created, dispatched) = match self.create_in_db(db_pool.as_ref()).await {
            Ok(result) => result,
            Err(e) => {
                metrics::record_failure("delivery", "create", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("delivery", "create");
        info!(delivery_id = %created.id, number = %created.number, "Delivery created");

        event_sender
            .send(Event::DeliveryCreated {
                delivery_id: created.id,
                actor_id: self.delivered_by,
            })
            .await
            .map_err(|e| {
                error!("Failed to send delivery created event: {}", e);
                ServiceError::EventError(e)
            })?;

        if let Some(request) = dispatched {
            metrics::record_transition("request", "dispatch");
            event_sender
                .send(Event::RequestDispatched {
                    request_id: request.id,
                    delivery_id: created.id,
                    actor_id: self.delivered_by,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(created)
    }
}

impl CreateDeliveryCommand {
    async fn create_in_db(
        &self,
        db: &DbPool,
    ) -> Result<(delivery::Model, Option<request::Model>), ServiceError> {
        let cmd = self.clone();

        db.transaction::<_, (delivery::Model, Option<request::Model>), ServiceError>(|txn| {
            Box::pin(async move {
                let linked = match cmd.request_id {
                    Some(request_id) => {
                        let request = ensure_dispatchable_request(txn, request_id).await?;
                        if request.kind != cmd.kind {
                            return Err(ServiceError::ValidationError(format!(
                                "Request {} is a {} request",
                                request.number, request.kind
                            )));
                        }
                        if cmd.lines.iter().any(|l| l.request_detail_id.is_none()) {
                            return Err(ServiceError::ValidationError(
                                "Every line must reference a request line when delivering against a request"
                                    .to_string(),
                            ));
                        }
                        Some(request)
                    }
                    None => None,
                };

                let warehouse_id = match linked.as_ref() {
                    Some(request) if request.kind == ItemKind::Article => {
                        request_warehouse(request, cmd.warehouse_id)?
                    }
                    _ => cmd.warehouse_id,
                };

                let draft = DeliveryDraft {
                    kind: cmd.kind,
                    warehouse_id,
                    delivered_by: cmd.delivered_by,
                    received_by: cmd.received_by,
                    reason: cmd.reason.trim().to_string(),
                    department_id: cmd.department_id,
                    notes: cmd.notes.clone(),
                    request_id: cmd.request_id,
                };
                let created = insert_delivery(txn, draft, &cmd.lines).await?;

                let dispatched = match linked {
                    Some(request) => {
                        let lines: Vec<DispatchedLine> = cmd
                            .lines
                            .iter()
                            .filter_map(|l| {
                                l.request_detail_id.map(|detail_id| DispatchedLine {
                                    detail_id,
                                    article_id: l.article_id,
                                    asset_id: l.asset_id,
                                    quantity: l.quantity,
                                })
                            })
                            .collect();
                        Some(
                            mark_dispatched(txn, request, &lines, cmd.delivered_by, cmd.notes.clone())
                                .await?,
                        )
                    }
                    None => None,
                };

                Ok((created, dispatched))
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}

/// Article deliveries against a request draw from the request's origin warehouse.
fn request_warehouse(
    request: &request::Model,
    requested: Option<Uuid>,
) -> Result<Option<Uuid>, ServiceError> {
    match (requested, request.warehouse_id) {
        (Some(given), Some(origin)) if given != origin => Err(ServiceError::ValidationError(
            format!(
                "Request {} must be delivered from its origin warehouse {}",
                request.number, origin
            ),
        )),
        (None, origin) => Ok(origin),
        (given, _) => Ok(given),
    }
}
