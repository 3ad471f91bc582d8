use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{
    auto_approve, check_references, insert_lines, load_request, load_request_type,
    record_history, RequestHeader, RequestLineInput,
};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::{request, request_detail},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{ItemKind, RequestStatus},
};

/// Replaces the header and lines of a PENDING or REJECTED request.
///
/// A rejected request goes back to PENDING with its rejection and any earlier
/// approval cleared.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateRequestCommand {
    pub request_id: Uuid,
    pub user_id: Uuid,
    /// Caller holds `requests:change_any`.
    pub can_change_any: bool,
    pub request_type_id: Uuid,
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
impl Command for UpdateRequestCommand {
    type Result = request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let updated = match self.update_in_db(db_pool.as_ref()).await {
            Ok(updated) => updated,
            Err(e) => {
                metrics::record_failure("request", "update", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("request", "update");
        info!(request_id = %updated.id, status = %updated.status, "Request updated");

        event_sender
            .send(Event::RequestUpdated {
                request_id: updated.id,
                actor_id: self.user_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send request updated event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(updated)
    }
}

impl UpdateRequestCommand {
    async fn update_in_db(&self, db: &DbPool) -> Result<request::Model, ServiceError> {
        let cmd = self.clone();

        db.transaction::<_, request::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let request = load_request(txn, cmd.request_id).await?;

                if request.requester_id != cmd.user_id && !cmd.can_change_any {
                    return Err(ServiceError::Forbidden(
                        "Only the requester can modify this request".to_string(),
                    ));
                }
                if !request.status.is_editable() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Request {} is {}; only PENDING or REJECTED requests can be modified",
                        request.number, request.status
                    )));
                }

                let request_type = load_request_type(txn, cmd.request_type_id).await?;

                let warehouse_id = match request.kind {
                    ItemKind::Article => cmd.warehouse_id,
                    ItemKind::Asset => None,
                };
                let header = RequestHeader {
                    warehouse_id,
                    department_id: cmd.department_id,
                    area_id: cmd.area_id,
                };
                check_references(txn, request.kind, &header, &cmd.lines).await?;

                request_detail::Entity::update_many()
                    .col_expr(request_detail::Column::Deleted, Expr::value(true))
                    .filter(request_detail::Column::RequestId.eq(request.id))
                    .filter(request_detail::Column::Deleted.eq(false))
                    .exec(txn)
                    .await?;

                let reopened = request.status == RequestStatus::Rejected;
                let request_id = request.id;

                let mut active: request::ActiveModel = request.into();
                active.request_type_id = Set(cmd.request_type_id);
                active.required_date = Set(cmd.required_date);
                active.reason = Set(cmd.reason.trim().to_string());
                active.requesting_area = Set(cmd.requesting_area.clone());
                active.activity_title = Set(cmd.activity_title.clone());
                active.activity_objective = Set(cmd.activity_objective.clone());
                active.warehouse_id = Set(warehouse_id);
                active.department_id = Set(cmd.department_id);
                active.area_id = Set(cmd.area_id);
                active.notes = Set(cmd.notes.clone());
                if reopened {
                    active.status = Set(RequestStatus::Pending);
                    active.rejected_by = Set(None);
                    active.rejected_at = Set(None);
                    active.rejection_reason = Set(None);
                    active.approver_id = Set(None);
                    active.approved_at = Set(None);
                    active.approval_notes = Set(None);
                }
                let updated = active.update(txn).await?;

                if reopened {
                    record_history(
                        txn,
                        request_id,
                        Some(RequestStatus::Rejected),
                        RequestStatus::Pending,
                        cmd.user_id,
                        Some("Reopened after changes".to_string()),
                    )
                    .await?;
                }

                let skip_approval = !request_type.requires_approval;
                insert_lines(txn, request_id, &cmd.lines, skip_approval).await?;

                if skip_approval {
                    auto_approve(txn, updated).await
                } else {
                    Ok(updated)
                }
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}
