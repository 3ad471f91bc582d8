use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDate};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};

use crate::models::{ItemKind, RequestStatus};

/// Internal request for articles or assets.
/// 
/// Actor columns are filled in as the request moves through its workflow.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub number: String,
    pub request_type_id: Uuid,
    pub kind: ItemKind,
    pub status: RequestStatus,
    pub requester_id: Uuid,
    pub approver_id: Option<Uuid>,
    pub rejected_by: Option<Uuid>,
    pub dispatcher_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
    pub required_date: Option<NaiveDate>,
    pub reason: String,
    pub requesting_area: Option<String>,
    pub activity_title: Option<String>,
    pub activity_objective: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
    pub notes: Option<String>,
    pub approval_notes: Option<String>,
    pub dispatch_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
