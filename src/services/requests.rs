use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Select,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{fetch_page, PageRequest};
use crate::{
    commands::{
        requests::{
            load_details, load_request, ApproveRequestCommand, CreateRequestCommand,
            DeleteRequestCommand, DispatchRequestCommand, LineQuantity, RejectRequestCommand,
            RequestLineInput, UpdateRequestCommand,
        },
        requests::dispatch_request_command::DispatchRequestResult,
        Command,
    },
    common::DateRangeParams,
    db::DbPool,
    entities::{article, asset, org_unit, request, request_detail, request_history, user, warehouse},
    errors::ServiceError,
    events::EventSender,
    models::{ItemKind, RequestStatus},
    PaginatedResponse,
};

/// Create and update body of a request.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RequestPayload {
    pub request_type_id: Uuid,
    pub kind: ItemKind,
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

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ApprovePayload {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub lines: Vec<LineQuantity>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RejectPayload {
    #[validate(length(min = 1, max = 1000, message = "A rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct DispatchPayload {
    pub received_by: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub lines: Vec<LineQuantity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub kind: Option<ItemKind>,
    pub requester_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub search: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Which requests the caller may read.
#[derive(Debug, Clone, Copy)]
pub enum Visibility {
    All,
    OwnOnly(Uuid),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestDetailView {
    #[schema(value_type = Object)]
    pub request: request::Model,
    #[schema(value_type = Vec<Object>)]
    pub lines: Vec<request_detail::Model>,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<request_history::Model>,
}

/// Header of the dispatch screen.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchHeader {
    pub id: Uuid,
    pub number: String,
    pub kind: ItemKind,
    pub status: RequestStatus,
    pub requester: String,
    /// Department name, else the free-text requesting area.
    pub department: Option<String>,
    pub reason: String,
    pub warehouse: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchLine {
    pub detail_id: Uuid,
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub requested: i32,
    pub approved: i32,
    pub dispatched: i32,
    pub pending: i32,
    /// Article lines only.
    pub stock: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchLinesView {
    pub header: DispatchHeader,
    pub lines: Vec<DispatchLine>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RequestSummary {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub dispatched: u64,
    pub article: u64,
    pub asset: u64,
    pub mine: u64,
}

/// Read side and command entry points of the request workflow.
#[derive(Clone)]
pub struct RequestService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl RequestService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: RequestFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<request::Model>, ServiceError> {
        let query = request_query(&filter)?;
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn list_mine(
        &self,
        user_id: Uuid,
        mut filter: RequestFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<request::Model>, ServiceError> {
        filter.requester_id = Some(user_id);
        self.list(filter, page).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid, visibility: Visibility) -> Result<RequestDetailView, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = self.visible_request(id, visibility).await?;
        let lines = load_details(db, found.id).await?;
        let history = load_history(db, found.id).await?;
        Ok(RequestDetailView {
            request: found,
            lines,
            history,
        })
    }

    #[instrument(skip(self))]
    pub async fn history(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Vec<request_history::Model>, ServiceError> {
        let found = self.visible_request(id, visibility).await?;
        load_history(self.db_pool.as_ref(), found.id).await
    }

    #[instrument(skip(self, payload), fields(kind = %payload.kind))]
    pub async fn create(&self, requester_id: Uuid, payload: RequestPayload) -> Result<RequestDetailView, ServiceError> {
        let created = CreateRequestCommand {
            request_type_id: payload.request_type_id,
            kind: payload.kind,
            requester_id,
            required_date: payload.required_date,
            reason: payload.reason,
            requesting_area: payload.requesting_area,
            activity_title: payload.activity_title,
            activity_objective: payload.activity_objective,
            warehouse_id: payload.warehouse_id,
            department_id: payload.department_id,
            area_id: payload.area_id,
            notes: payload.notes,
            lines: payload.lines,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.get(created.id, Visibility::All).await
    }

    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        user_id: Uuid,
        can_change_any: bool,
        id: Uuid,
        payload: RequestPayload,
    ) -> Result<RequestDetailView, ServiceError> {
        let existing = load_request(self.db_pool.as_ref(), id).await?;
        if existing.kind != payload.kind {
            return Err(ServiceError::ValidationError(format!(
                "Request {} is a {} request; its kind cannot change",
                existing.number, existing.kind
            )));
        }

        UpdateRequestCommand {
            request_id: id,
            user_id,
            can_change_any,
            request_type_id: payload.request_type_id,
            required_date: payload.required_date,
            reason: payload.reason,
            requesting_area: payload.requesting_area,
            activity_title: payload.activity_title,
            activity_objective: payload.activity_objective,
            warehouse_id: payload.warehouse_id,
            department_id: payload.department_id,
            area_id: payload.area_id,
            notes: payload.notes,
            lines: payload.lines,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.get(id, Visibility::All).await
    }

    #[instrument(skip(self, payload))]
    pub async fn approve(
        &self,
        approver_id: Uuid,
        id: Uuid,
        payload: ApprovePayload,
    ) -> Result<RequestDetailView, ServiceError> {
        ApproveRequestCommand {
            request_id: id,
            approver_id,
            notes: payload.notes,
            lines: payload.lines,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.get(id, Visibility::All).await
    }

    #[instrument(skip(self, payload))]
    pub async fn reject(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: RejectPayload,
    ) -> Result<RequestDetailView, ServiceError> {
        RejectRequestCommand {
            request_id: id,
            user_id,
            reason: payload.reason,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.get(id, Visibility::All).await
    }

    #[instrument(skip(self, payload))]
    pub async fn dispatch(
        &self,
        dispatcher_id: Uuid,
        id: Uuid,
        payload: DispatchPayload,
    ) -> Result<DispatchRequestResult, ServiceError> {
        DispatchRequestCommand {
            request_id: id,
            dispatcher_id,
            received_by: payload.received_by,
            notes: payload.notes,
            lines: payload.lines,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, can_delete_any: bool, id: Uuid) -> Result<(), ServiceError> {
        DeleteRequestCommand {
            request_id: id,
            user_id,
            can_delete_any,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Per-line quantities, current stock and header for the dispatch screen.
    #[instrument(skip(self))]
    pub async fn dispatch_lines(&self, id: Uuid) -> Result<DispatchLinesView, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = load_request(db, id).await?;
        let details = load_details(db, found.id).await?;

        let article_ids: Vec<Uuid> = details.iter().filter_map(|d| d.article_id).collect();
        let asset_ids: Vec<Uuid> = details.iter().filter_map(|d| d.asset_id).collect();

        let articles: HashMap<Uuid, article::Model> = if article_ids.is_empty() {
            HashMap::new()
        } else {
            article::Entity::find()
                .filter(article::Column::Id.is_in(article_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };
        let assets: HashMap<Uuid, asset::Model> = if asset_ids.is_empty() {
            HashMap::new()
        } else {
            asset::Entity::find()
                .filter(asset::Column::Id.is_in(asset_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };

        let lines = details
            .iter()
            .map(|detail| {
                let (code, name, stock) = match (detail.article_id, detail.asset_id) {
                    (Some(article_id), _) => articles
                        .get(&article_id)
                        .map(|a| (a.code.clone(), a.name.clone(), Some(a.stock)))
                        .unwrap_or_default(),
                    (None, Some(asset_id)) => assets
                        .get(&asset_id)
                        .map(|a| (a.code.clone(), a.name.clone(), None))
                        .unwrap_or_default(),
                    (None, None) => Default::default(),
                };
                DispatchLine {
                    detail_id: detail.id,
                    article_id: detail.article_id,
                    asset_id: detail.asset_id,
                    code,
                    name,
                    requested: detail.requested_quantity,
                    approved: detail.approved_quantity,
                    dispatched: detail.dispatched_quantity,
                    pending: pending_quantity(detail),
                    stock,
                }
            })
            .collect();

        let header = dispatch_header(db, &found).await?;
        Ok(DispatchLinesView { header, lines })
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, user_id: Uuid) -> Result<RequestSummary, ServiceError> {
        request_summary(self.db_pool.as_ref(), user_id).await
    }

    async fn visible_request(&self, id: Uuid, visibility: Visibility) -> Result<request::Model, ServiceError> {
        let found = load_request(self.db_pool.as_ref(), id).await?;
        match visibility {
            Visibility::OwnOnly(user_id) if found.requester_id != user_id => {
                Err(ServiceError::Forbidden(format!(
                    "Request {} belongs to another user",
                    found.number
                )))
            }
            _ => Ok(found),
        }
    }
}

/// Approved but not yet dispatched.
pub(crate) fn pending_quantity(detail: &request_detail::Model) -> i32 {
    (detail.approved_quantity - detail.dispatched_quantity).max(0)
}

fn request_query(filter: &RequestFilter) -> Result<Select<request::Entity>, ServiceError> {
    let mut query = request::Entity::find()
        .filter(request::Column::Deleted.eq(false))
        .order_by_desc(request::Column::RequestedAt)
        .order_by_desc(request::Column::Number);

    if let Some(status) = filter.status {
        query = query.filter(request::Column::Status.eq(status));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(request::Column::Kind.eq(kind));
    }
    if let Some(id) = filter.requester_id {
        query = query.filter(request::Column::RequesterId.eq(id));
    }
    if let Some(id) = filter.warehouse_id {
        query = query.filter(request::Column::WarehouseId.eq(id));
    }
    if let Some(id) = filter.department_id {
        query = query.filter(request::Column::DepartmentId.eq(id));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(request::Column::Number.contains(term))
                .add(request::Column::Reason.contains(term))
                .add(request::Column::ActivityTitle.contains(term)),
        );
    }
    if filter.from.is_some() || filter.to.is_some() {
        let (from, to) = DateRangeParams::new(filter.from.as_deref(), filter.to.as_deref())
            .resolve(chrono::Utc::now().date_naive())?;
        query = query.filter(request::Column::RequestedAt.between(from, to));
    }

    Ok(query)
}

async fn load_history<C: ConnectionTrait>(
    db: &C,
    request_id: Uuid,
) -> Result<Vec<request_history::Model>, ServiceError> {
    Ok(request_history::Entity::find()
        .filter(request_history::Column::RequestId.eq(request_id))
        .order_by_asc(request_history::Column::CreatedAt)
        .all(db)
        .await?)
}

async fn dispatch_header<C: ConnectionTrait>(
    db: &C,
    found: &request::Model,
) -> Result<DispatchHeader, ServiceError> {
    let requester = user::Entity::find_by_id(found.requester_id)
        .one(db)
        .await?
        .map(|u| {
            let full = format!("{} {}", u.first_name, u.last_name).trim().to_string();
            if full.is_empty() {
                u.username
            } else {
                full
            }
        })
        .unwrap_or_default();

    let department = match found.department_id {
        Some(id) => org_unit::Entity::find_by_id(id)
            .one(db)
            .await?
            .map(|unit| unit.name),
        None => None,
    }
    .or_else(|| found.requesting_area.clone());

    let warehouse = match found.warehouse_id {
        Some(id) => warehouse::Entity::find_by_id(id)
            .one(db)
            .await?
            .map(|w| w.name),
        None => None,
    };

    Ok(DispatchHeader {
        id: found.id,
        number: found.number.clone(),
        kind: found.kind,
        status: found.status,
        requester,
        department,
        reason: found.reason.clone(),
        warehouse,
    })
}

pub(crate) async fn request_summary<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<RequestSummary, ServiceError> {
    let live = || request::Entity::find().filter(request::Column::Deleted.eq(false));
    let by_status = |status: RequestStatus| live().filter(request::Column::Status.eq(status));

    Ok(RequestSummary {
        total: live().count(db).await?,
        pending: by_status(RequestStatus::Pending).count(db).await?,
        approved: by_status(RequestStatus::Approved).count(db).await?,
        rejected: by_status(RequestStatus::Rejected).count(db).await?,
        dispatched: by_status(RequestStatus::Dispatched).count(db).await?,
        article: live()
            .filter(request::Column::Kind.eq(ItemKind::Article))
            .count(db)
            .await?,
        asset: live()
            .filter(request::Column::Kind.eq(ItemKind::Asset))
            .count(db)
            .await?,
        mine: live()
            .filter(request::Column::RequesterId.eq(user_id))
            .count(db)
            .await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_approved_minus_dispatched() {
        let detail = request_detail::Model {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            article_id: Some(Uuid::new_v4()),
            asset_id: None,
            requested_quantity: 10,
            approved_quantity: 8,
            dispatched_quantity: 3,
            notes: None,
            deleted: false,
        };
        assert_eq!(pending_quantity(&detail), 5);
    }
}
