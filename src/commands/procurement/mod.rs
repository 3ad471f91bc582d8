//! Purchase orders and receptions.

use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{article, asset, purchase_order, purchase_order_line, reception, supplier, warehouse},
    errors::ServiceError,
    models::ReceptionStatus,
};

pub mod cancel_purchase_order_command;
pub mod cancel_reception_command;
pub mod confirm_reception_command;
pub mod create_purchase_order_command;
pub mod create_reception_command;
pub mod delete_purchase_order_command;
pub mod update_purchase_order_command;

pub use cancel_purchase_order_command::CancelPurchaseOrderCommand;
pub use cancel_reception_command::CancelReceptionCommand;
pub use confirm_reception_command::ConfirmReceptionCommand;
pub use create_purchase_order_command::CreatePurchaseOrderCommand;
pub use create_reception_command::{CreateReceptionCommand, ReceptionLineInput};
pub use delete_purchase_order_command::DeletePurchaseOrderCommand;
pub use update_purchase_order_command::UpdatePurchaseOrderCommand;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderLineInput {
    pub article_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[schema(value_type = String, example = "12.50")]
    pub unit_price: Decimal,
}

/// Subtotal, tax and total of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

pub fn line_subtotal(line: &PurchaseOrderLineInput) -> Decimal {
    Decimal::from(line.quantity) * line.unit_price
}

/// `tax_rate` is a percentage; amounts are rounded to cents.
pub fn order_totals(
    lines: &[PurchaseOrderLineInput],
    tax_rate: Option<Decimal>,
) -> Result<OrderTotals, ServiceError> {
    let rate = tax_rate.unwrap_or(Decimal::ZERO);
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ServiceError::ValidationError(
            "Tax rate must be between 0 and 100".to_string(),
        ));
    }

    let subtotal: Decimal = lines.iter().map(line_subtotal).sum();
    let tax = (subtotal * rate / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(OrderTotals {
        subtotal,
        tax,
        total: subtotal + tax,
    })
}

pub(crate) async fn load_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<purchase_order::Model, ServiceError> {
    purchase_order::Entity::find_by_id(id)
        .filter(purchase_order::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Purchase order", id))
}

pub(crate) async fn load_order_lines<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    Ok(purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::PurchaseOrderId.eq(order_id))
        .all(conn)
        .await?)
}

/// Refuses changes to an order while a reception against it awaits confirmation.
pub(crate) async fn ensure_no_pending_receptions<C: ConnectionTrait>(
    conn: &C,
    order: &purchase_order::Model,
) -> Result<(), ServiceError> {
    let pending = reception::Entity::find()
        .filter(reception::Column::PurchaseOrderId.eq(order.id))
        .filter(reception::Column::Status.eq(ReceptionStatus::Pending))
        .one(conn)
        .await?;

    match pending {
        Some(found) => Err(ServiceError::InvalidOperation(format!(
            "Purchase order {} has pending reception {}",
            order.number, found.number
        ))),
        None => Ok(()),
    }
}

/// Validates the order header references and line items.
pub(crate) async fn check_order<C: ConnectionTrait>(
    conn: &C,
    supplier_id: Uuid,
    warehouse_id: Option<Uuid>,
    lines: &[PurchaseOrderLineInput],
) -> Result<(), ServiceError> {
    supplier::Entity::find_by_id(supplier_id)
        .filter(supplier::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Supplier", supplier_id))?;

    if let Some(id) = warehouse_id {
        warehouse::Entity::find_by_id(id)
            .filter(warehouse::Column::Deleted.eq(false))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Warehouse", id))?;
    }

    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "A purchase order needs at least one line".to_string(),
        ));
    }

    for (index, line) in lines.iter().enumerate() {
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: unit price cannot be negative",
                index + 1
            )));
        }
        match (line.article_id, line.asset_id) {
            (Some(id), None) => {
                article::Entity::find_by_id(id)
                    .filter(article::Column::Deleted.eq(false))
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Article", id))?;
            }
            (None, Some(id)) => {
                asset::Entity::find_by_id(id)
                    .filter(asset::Column::Deleted.eq(false))
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Asset", id))?;
            }
            _ => {
                return Err(ServiceError::ValidationError(format!(
                    "Line {}: choose either an article or an asset",
                    index + 1
                )))
            }
        }
    }

    Ok(())
}

pub(crate) async fn insert_order_lines<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    lines: &[PurchaseOrderLineInput],
) -> Result<(), ServiceError> {
    for line in lines {
        purchase_order_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_order_id: Set(order_id),
            article_id: Set(line.article_id),
            asset_id: Set(line.asset_id),
            description: Set(line.description.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            subtotal: Set(line_subtotal(line)),
            received_quantity: Set(0),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, unit_price: Decimal) -> PurchaseOrderLineInput {
        PurchaseOrderLineInput {
            article_id: Some(Uuid::new_v4()),
            asset_id: None,
            description: None,
            quantity,
            unit_price,
        }
    }

    #[test]
    fn totals_add_tax_percentage() {
        let totals =
            order_totals(&[line(3, dec!(10.00)), line(1, dec!(5.50))], Some(dec!(19))).unwrap();
        assert_eq!(totals.subtotal, dec!(35.50));
        assert_eq!(totals.tax, dec!(6.75));
        assert_eq!(totals.total, dec!(42.25));
    }

    #[test]
    fn totals_without_tax() {
        let totals = order_totals(&[line(2, dec!(1.25))], None).unwrap();
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, dec!(2.50));
    }

    #[test]
    fn tax_rate_out_of_range_is_refused() {
        assert!(order_totals(&[line(1, dec!(1))], Some(dec!(120))).is_err());
        assert!(order_totals(&[line(1, dec!(1))], Some(dec!(-1))).is_err());
    }
}
