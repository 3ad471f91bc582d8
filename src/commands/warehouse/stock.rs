use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    entities::{article, movement},
    errors::ServiceError,
    metrics,
    models::MovementOperation,
};

/// One stock change to record against an article.
#[derive(Debug, Clone)]
pub struct MovementInput {
    pub article_id: Uuid,
    pub operation: MovementOperation,
    pub quantity: i32,
    pub movement_type_id: Option<Uuid>,
    pub reason: Option<String>,
    pub reference_kind: Option<&'static str>,
    pub reference_id: Option<Uuid>,
    pub user_id: Uuid,
}

/// Writes a movement and the article's new stock on `conn`.
///
/// Callers pass the open transaction so the movement commits together with the
/// document that caused it.
#[instrument(skip(conn), fields(article_id = %input.article_id, operation = %input.operation))]
pub async fn apply_movement<C>(conn: &C, input: MovementInput) -> Result<movement::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if input.quantity < 1 {
        return Err(ServiceError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let article = article::Entity::find_by_id(input.article_id)
        .filter(article::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Article", input.article_id))?;

    let stock_before = article.stock;
    let stock_after = input
        .operation
        .apply(stock_before, input.quantity)
        .ok_or_else(|| {
            ServiceError::InsufficientStock(format!(
                "Article {} has {} in stock, cannot take out {}",
                article.code, stock_before, input.quantity
            ))
        })?;

    let code = article.code.clone();
    let mut article: article::ActiveModel = article.into();
    article.stock = Set(stock_after);
    article.update(conn).await?;

    let row = movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        article_id: Set(input.article_id),
        movement_type_id: Set(input.movement_type_id),
        operation: Set(input.operation),
        quantity: Set(input.quantity),
        stock_before: Set(stock_before),
        stock_after: Set(stock_after),
        reason: Set(input.reason),
        reference_kind: Set(input.reference_kind.map(str::to_string)),
        reference_id: Set(input.reference_id),
        user_id: Set(input.user_id),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    metrics::record_movement(input.operation.as_str());
    debug!(article = %code, stock_before, stock_after, "stock updated");

    Ok(row)
}
