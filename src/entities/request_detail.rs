use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Line of a request; `dispatched <= approved <= requested`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub request_id: Uuid,
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub requested_quantity: i32,
    pub approved_quantity: i32,
    pub dispatched_quantity: i32,
    pub notes: Option<String>,
    pub deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
