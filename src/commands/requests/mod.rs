//! Request workflow: create, update, approve, reject, dispatch and delete.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{article, asset, catalog_entry, org_unit, request, request_detail, request_history, warehouse},
    errors::ServiceError,
    models::{CatalogKind, ItemKind, OrgUnitKind, RequestStatus},
};

pub mod approve_request_command;
pub mod create_request_command;
pub mod delete_request_command;
pub mod dispatch_request_command;
pub mod reject_request_command;
pub mod update_request_command;

pub use approve_request_command::ApproveRequestCommand;
pub use create_request_command::CreateRequestCommand;
pub use delete_request_command::DeleteRequestCommand;
pub use dispatch_request_command::DispatchRequestCommand;
pub use reject_request_command::RejectRequestCommand;
pub use update_request_command::UpdateRequestCommand;

/// Requested item: an article for ARTICLE requests, an asset for ASSET requests.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RequestLineInput {
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Quantity decided for one request line during approval or dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LineQuantity {
    pub detail_id: Uuid,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

/// Header references shared by create and update.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RequestHeader {
    pub warehouse_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

pub(crate) async fn load_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<request::Model, ServiceError> {
    request::Entity::find_by_id(request_id)
        .filter(request::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Request", request_id))
}

pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<Vec<request_detail::Model>, ServiceError> {
    Ok(request_detail::Entity::find()
        .filter(request_detail::Column::RequestId.eq(request_id))
        .filter(request_detail::Column::Deleted.eq(false))
        .order_by_asc(request_detail::Column::Id)
        .all(conn)
        .await?)
}

pub(crate) async fn load_request_type<C: ConnectionTrait>(
    conn: &C,
    request_type_id: Uuid,
) -> Result<catalog_entry::Model, ServiceError> {
    catalog_entry::Entity::find_by_id(request_type_id)
        .filter(catalog_entry::Column::Kind.eq(CatalogKind::RequestType))
        .filter(catalog_entry::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Request type", request_type_id))
}

pub(crate) async fn record_history<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    previous_status: Option<RequestStatus>,
    new_status: RequestStatus,
    user_id: Uuid,
    note: Option<String>,
) -> Result<(), ServiceError> {
    request_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        request_id: Set(request_id),
        previous_status: Set(previous_status),
        new_status: Set(new_status),
        user_id: Set(user_id),
        note: Set(note),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Checks the header references and that every line matches the request kind.
pub(crate) async fn check_references<C: ConnectionTrait>(
    conn: &C,
    kind: ItemKind,
    header: &RequestHeader,
    lines: &[RequestLineInput],
) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "A request needs at least one line".to_string(),
        ));
    }

    match kind {
        ItemKind::Article => {
            let warehouse_id = header.warehouse_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Article requests need an origin warehouse".to_string(),
                )
            })?;
            warehouse::Entity::find_by_id(warehouse_id)
                .filter(warehouse::Column::Deleted.eq(false))
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Warehouse", warehouse_id))?;
        }
        ItemKind::Asset => {}
    }

    check_org_unit(conn, header.department_id, OrgUnitKind::Department).await?;
    check_org_unit(conn, header.area_id, OrgUnitKind::Area).await?;

    let mut wanted = HashSet::new();
    for (index, line) in lines.iter().enumerate() {
        let item = match (kind, line.article_id, line.asset_id) {
            (ItemKind::Article, Some(id), None) | (ItemKind::Asset, None, Some(id)) => id,
            (ItemKind::Article, _, _) => {
                return Err(ServiceError::ValidationError(format!(
                    "Line {}: article requests take exactly one article per line",
                    index + 1
                )))
            }
            (ItemKind::Asset, _, _) => {
                return Err(ServiceError::ValidationError(format!(
                    "Line {}: asset requests take exactly one asset per line",
                    index + 1
                )))
            }
        };
        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: quantity must be at least 1",
                index + 1
            )));
        }
        wanted.insert(item);
    }

    let ids: Vec<Uuid> = wanted.iter().copied().collect();
    let found = match kind {
        ItemKind::Article => article::Entity::find()
            .filter(article::Column::Id.is_in(ids))
            .filter(article::Column::Deleted.eq(false))
            .all(conn)
            .await?
            .len(),
        ItemKind::Asset => asset::Entity::find()
            .filter(asset::Column::Id.is_in(ids))
            .filter(asset::Column::Deleted.eq(false))
            .all(conn)
            .await?
            .len(),
    };

    if found != wanted.len() {
        return Err(ServiceError::ValidationError(format!(
            "Some requested {}s do not exist",
            kind.as_str().to_lowercase()
        )));
    }

    Ok(())
}

async fn check_org_unit<C: ConnectionTrait>(
    conn: &C,
    id: Option<Uuid>,
    kind: OrgUnitKind,
) -> Result<(), ServiceError> {
    let Some(id) = id else {
        return Ok(());
    };
    org_unit::Entity::find_by_id(id)
        .filter(org_unit::Column::Kind.eq(kind))
        .filter(org_unit::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found(kind_label(kind), id))?;
    Ok(())
}

fn kind_label(kind: OrgUnitKind) -> &'static str {
    match kind {
        OrgUnitKind::Location => "Location",
        OrgUnitKind::Workshop => "Workshop",
        OrgUnitKind::Area => "Area",
        OrgUnitKind::Department => "Department",
    }
}

pub(crate) async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    lines: &[RequestLineInput],
    auto_approve: bool,
) -> Result<Vec<request_detail::Model>, ServiceError> {
    let mut details = Vec::with_capacity(lines.len());
    for line in lines {
        let detail = request_detail::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_id: Set(request_id),
            article_id: Set(line.article_id),
            asset_id: Set(line.asset_id),
            requested_quantity: Set(line.quantity),
            approved_quantity: Set(if auto_approve { line.quantity } else { 0 }),
            dispatched_quantity: Set(0),
            notes: Set(line.notes.clone()),
            deleted: Set(false),
        }
        .insert(conn)
        .await?;
        details.push(detail);
    }
    Ok(details)
}

/// Approves a request whose type needs no approval, on behalf of the requester.
pub(crate) async fn auto_approve<C: ConnectionTrait>(
    conn: &C,
    request: request::Model,
) -> Result<request::Model, ServiceError> {
    let request_id = request.id;
    let requester = request.requester_id;
    let previous = request.status;

    let mut active: request::ActiveModel = request.into();
    active.status = Set(RequestStatus::Approved);
    active.approver_id = Set(Some(requester));
    active.approved_at = Set(Some(Utc::now()));
    let updated = active.update(conn).await?;

    record_history(
        conn,
        request_id,
        Some(previous),
        RequestStatus::Approved,
        requester,
        Some("Approved automatically: request type does not require approval".to_string()),
    )
    .await?;

    Ok(updated)
}

/// One delivered quantity against a request line.
#[derive(Debug, Clone)]
pub(crate) struct DispatchedLine {
    pub detail_id: Uuid,
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub quantity: i32,
}

pub(crate) fn ensure_dispatchable(request: &request::Model) -> Result<(), ServiceError> {
    match request.status {
        RequestStatus::Approved => Ok(()),
        RequestStatus::Dispatched => Err(ServiceError::InvalidOperation(format!(
            "Request {} has already been dispatched",
            request.number
        ))),
        other => Err(ServiceError::InvalidOperation(format!(
            "Request {} must be APPROVED to be dispatched; it is {}",
            request.number, other
        ))),
    }
}

pub(crate) async fn ensure_dispatchable_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<request::Model, ServiceError> {
    let request = load_request(conn, request_id).await?;
    ensure_dispatchable(&request)?;
    Ok(request)
}

/// Adds delivered quantities to the request lines and closes the request as DISPATCHED.
pub(crate) async fn mark_dispatched<C: ConnectionTrait>(
    conn: &C,
    request: request::Model,
    lines: &[DispatchedLine],
    dispatcher_id: Uuid,
    notes: Option<String>,
) -> Result<request::Model, ServiceError> {
    ensure_dispatchable(&request)?;

    let details = load_details(conn, request.id).await?;
    let mut totals: HashMap<Uuid, i32> = HashMap::new();
    for line in lines {
        let detail = details
            .iter()
            .find(|d| d.id == line.detail_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Line {} does not belong to request {}",
                    line.detail_id, request.number
                ))
            })?;

        if detail.article_id != line.article_id || detail.asset_id != line.asset_id {
            return Err(ServiceError::ValidationError(format!(
                "Line {} delivers a different item than was requested",
                line.detail_id
            )));
        }
        if line.quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: quantity cannot be negative",
                line.detail_id
            )));
        }

        *totals.entry(detail.id).or_insert(0) += line.quantity;
    }

    for detail in &details {
        let Some(&quantity) = totals.get(&detail.id) else {
            continue;
        };
        let dispatched = detail.dispatched_quantity + quantity;
        if dispatched > detail.approved_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Dispatching {} would exceed the approved quantity {} for line {}",
                quantity, detail.approved_quantity, detail.id
            )));
        }

        let mut active: request_detail::ActiveModel = detail.clone().into();
        active.dispatched_quantity = Set(dispatched);
        active.update(conn).await?;
    }

    let request_id = request.id;
    let mut active: request::ActiveModel = request.into();
    active.status = Set(RequestStatus::Dispatched);
    active.dispatcher_id = Set(Some(dispatcher_id));
    active.dispatched_at = Set(Some(Utc::now()));
    active.dispatch_notes = Set(notes.clone());
    let updated = active.update(conn).await?;

    record_history(
        conn,
        request_id,
        Some(RequestStatus::Approved),
        RequestStatus::Dispatched,
        dispatcher_id,
        notes,
    )
    .await?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: RequestStatus) -> request::Model {
        let now = Utc::now();
        request::Model {
            id: Uuid::new_v4(),
            number: "SOL-20240105-0001".into(),
            request_type_id: Uuid::new_v4(),
            kind: ItemKind::Article,
            status,
            requester_id: Uuid::new_v4(),
            approver_id: None,
            rejected_by: None,
            dispatcher_id: None,
            requested_at: now,
            required_date: None,
            reason: "Workshop supplies".into(),
            requesting_area: None,
            activity_title: None,
            activity_objective: None,
            warehouse_id: None,
            department_id: None,
            area_id: None,
            notes: None,
            approval_notes: None,
            dispatch_notes: None,
            rejection_reason: None,
            approved_at: None,
            rejected_at: None,
            dispatched_at: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_approved_requests_are_dispatchable() {
        assert!(ensure_dispatchable(&request(RequestStatus::Approved)).is_ok());

        let err = ensure_dispatchable(&request(RequestStatus::Pending)).unwrap_err();
        assert!(err.to_string().contains("must be APPROVED"));

        let err = ensure_dispatchable(&request(RequestStatus::Dispatched)).unwrap_err();
        assert!(err.to_string().contains("already been dispatched"));

        assert!(ensure_dispatchable(&request(RequestStatus::Rejected)).is_err());
    }
}
