use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Lifecycle of an internal request.
///
/// `Pending` is the only initial state; `Rejected` and `Dispatched` are final.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "DISPATCHED")]
    Dispatched,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Dispatched => "DISPATCHED",
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Dispatched)
    }

    /// Header and lines may still change.
    pub fn is_editable(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Rejected)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Rejected)
                | (Approved, Dispatched) | (Rejected, Pending)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PARTIALLY_RECEIVED")]
    PartiallyReceived,
    #[sea_orm(string_value = "RECEIVED")]
    Received,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "PENDING",
            PurchaseOrderStatus::PartiallyReceived => "PARTIALLY_RECEIVED",
            PurchaseOrderStatus::Received => "RECEIVED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still expecting goods.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Pending | PurchaseOrderStatus::PartiallyReceived
        )
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceptionStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl ReceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceptionStatus::Pending => "PENDING",
            ReceptionStatus::Confirmed => "CONFIRMED",
            ReceptionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a stock movement.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementOperation {
    #[sea_orm(string_value = "ENTRY")]
    Entry,
    #[sea_orm(string_value = "EXIT")]
    Exit,
}

impl MovementOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementOperation::Entry => "ENTRY",
            MovementOperation::Exit => "EXIT",
        }
    }

    /// Quantity with the sign this operation applies to stock.
    pub fn signed(&self, quantity: i32) -> i32 {
        match self {
            MovementOperation::Entry => quantity,
            MovementOperation::Exit => -quantity,
        }
    }

    /// Stock after applying `quantity`, or `None` when it would go negative or overflow.
    pub fn apply(&self, stock: i32, quantity: i32) -> Option<i32> {
        stock
            .checked_add(self.signed(quantity))
            .filter(|next| *next >= 0)
    }
}

impl fmt::Display for MovementOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_status_classification() {
        assert!(RequestStatus::Pending.is_initial());
        assert!(!RequestStatus::Approved.is_initial());
        assert!(RequestStatus::Rejected.is_final());
        assert!(RequestStatus::Dispatched.is_final());
        assert!(!RequestStatus::Approved.is_final());
        assert!(RequestStatus::Rejected.is_editable());
        assert!(!RequestStatus::Approved.is_editable());
    }

    #[test]
    fn request_transitions() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Dispatched));
        assert!(!Pending.can_transition_to(Dispatched));
        assert!(!Dispatched.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn movement_operation_applies_sign() {
        assert_eq!(MovementOperation::Entry.apply(5, 3), Some(8));
        assert_eq!(MovementOperation::Exit.apply(5, 3), Some(2));
        assert_eq!(MovementOperation::Exit.apply(5, 5), Some(0));
        assert_eq!(MovementOperation::Exit.apply(2, 3), None);
        assert_eq!(MovementOperation::Entry.apply(i32::MAX, 1), None);
    }

    #[test]
    fn statuses_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&PurchaseOrderStatus::PartiallyReceived).unwrap(),
            "\"PARTIALLY_RECEIVED\""
        );
        assert_eq!(
            serde_json::from_str::<RequestStatus>("\"DISPATCHED\"").unwrap(),
            RequestStatus::Dispatched
        );
    }
}
