use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{
    auto_approve, check_references, insert_lines, load_request_type, record_history,
    RequestHeader, RequestLineInput,
};
use crate::{
    commands::Command,
    common::next_document_number,
    db::{flatten_txn_error, DbPool},
    entities::request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{ItemKind, RequestStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRequestCommand {
    pub request_type_id: Uuid,
    pub kind: ItemKind,
    pub requester_id: Uuid,
    pub required_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 1000, message = "A reason is required"))]
    pub reason: String,
    pub requesting_area: Option<String>,
    pub activity_title: Option<String>,
    pub activity_objective: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "A request needs at least one line"))]
    #[validate]
    pub lines: Vec<RequestLineInput>,
}

#[async_trait]
impl Command for CreateRequestCommand {
    type Result = request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(requester_id = %self.requester_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let created = match self.create_in_db(db_pool.as_ref()).await {
            Ok(created) => created,
            Err(e) => {
                metrics::record_failure("request", "create", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("request", "create");
        info!(request_id = %created.id, number = %created.number, status = %created.status, "Request created");

        event_sender
            .send(Event::RequestCreated {
                request_id: created.id,
                actor_id: self.requester_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send request created event: {}", e);
                ServiceError::EventError(e)
            })?;

        if created.status == RequestStatus::Approved {
            metrics::record_transition("request", "approve");
            event_sender
                .send(Event::RequestApproved {
                    request_id: created.id,
                    actor_id: self.requester_id,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(created)
    }
}

impl CreateRequestCommand {
    async fn create_in_db(&self, db: &DbPool) -> Result<request::Model, ServiceError> {
        let cmd = self.clone();

        db.transaction::<_, request::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let request_type = load_request_type(txn, cmd.request_type_id).await?;
                if !request_type.active {
                    return Err(ServiceError::ValidationError(format!(
                        "Request type {} is inactive",
                        request_type.code
                    )));
                }

                // Asset requests are never drawn from a warehouse.
                let warehouse_id = match cmd.kind {
                    ItemKind::Article => cmd.warehouse_id,
                    ItemKind::Asset => None,
                };
                let header = RequestHeader {
                    warehouse_id,
                    department_id: cmd.department_id,
                    area_id: cmd.area_id,
                };
                check_references(txn, cmd.kind, &header, &cmd.lines).await?;

                let now = Utc::now();
                let number = next_document_number::<request::Entity, _>(
                    txn,
                    request::Column::Number,
                    "SOL",
                    now.date_naive(),
                )
                .await?;

                let created = request::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    number: Set(number),
                    request_type_id: Set(cmd.request_type_id),
                    kind: Set(cmd.kind),
                    status: Set(RequestStatus::Pending),
                    requester_id: Set(cmd.requester_id),
                    approver_id: Set(None),
                    rejected_by: Set(None),
                    dispatcher_id: Set(None),
                    requested_at: Set(now),
                    required_date: Set(cmd.required_date),
                    reason: Set(cmd.reason.trim().to_string()),
                    requesting_area: Set(cmd.requesting_area.clone()),
                    activity_title: Set(cmd.activity_title.clone()),
                    activity_objective: Set(cmd.activity_objective.clone()),
                    warehouse_id: Set(warehouse_id),
                    department_id: Set(cmd.department_id),
                    area_id: Set(cmd.area_id),
                    notes: Set(cmd.notes.clone()),
                    approval_notes: Set(None),
                    dispatch_notes: Set(None),
                    rejection_reason: Set(None),
                    approved_at: Set(None),
                    rejected_at: Set(None),
                    dispatched_at: Set(None),
                    deleted: Set(false),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                record_history(
                    txn,
                    created.id,
                    None,
                    RequestStatus::Pending,
                    cmd.requester_id,
                    None,
                )
                .await?;

                let skip_approval = !request_type.requires_approval;
                insert_lines(txn, created.id, &cmd.lines, skip_approval).await?;

                if skip_approval {
                    auto_approve(txn, created).await
                } else {
                    Ok(created)
                }
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}
