use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::audit_log;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Business events; each one becomes an audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Request workflow
    RequestCreated { request_id: Uuid, actor_id: Uuid },
    RequestUpdated { request_id: Uuid, actor_id: Uuid },
    RequestApproved { request_id: Uuid, actor_id: Uuid },
    RequestRejected { request_id: Uuid, actor_id: Uuid, reason: String },
    RequestDispatched { request_id: Uuid, delivery_id: Uuid, actor_id: Uuid },
    RequestDeleted { request_id: Uuid, actor_id: Uuid },

    // Warehouse
    MovementRegistered {
        movement_id: Uuid,
        article_id: Uuid,
        stock_after: i32,
        actor_id: Uuid,
    },
    DeliveryCreated { delivery_id: Uuid, actor_id: Uuid },

    // Procurement
    PurchaseOrderCancelled { purchase_order_id: Uuid, actor_id: Uuid },
    ReceptionConfirmed { reception_id: Uuid, actor_id: Uuid },
    ReceptionCancelled { reception_id: Uuid, actor_id: Uuid },

    // Generic CRUD on reference data
    RecordCreated { entity: String, entity_id: Uuid, actor_id: Uuid },
    RecordUpdated { entity: String, entity_id: Uuid, actor_id: Uuid },
    RecordDeleted { entity: String, entity_id: Uuid, actor_id: Uuid },

    CatalogImported {
        catalog: String,
        created: usize,
        updated: usize,
        errors: usize,
        actor_id: Uuid,
    },
    UserLoggedIn { user_id: Uuid },
}

/// Flattened view of an event as stored in `audit_logs`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: &'static str,
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<String>,
}

impl Event {
    pub fn audit_entry(&self) -> AuditEntry {
        let entry = |actor: Uuid, action, entity: &str, id: Uuid| AuditEntry {
            actor_id: Some(actor),
            action,
            entity: entity.to_string(),
            entity_id: Some(id),
            details: None,
        };

        match self {
            Event::RequestCreated { request_id, actor_id } => {
                entry(*actor_id, "create", "request", *request_id)
            }
            Event::RequestUpdated { request_id, actor_id } => {
                entry(*actor_id, "update", "request", *request_id)
            }
            Event::RequestApproved { request_id, actor_id } => {
                entry(*actor_id, "approve", "request", *request_id)
            }
            Event::RequestRejected {
                request_id,
                actor_id,
                reason,
            } => AuditEntry {
                details: Some(reason.clone()),
                ..entry(*actor_id, "reject", "request", *request_id)
            },
            Event::RequestDispatched {
                request_id,
                delivery_id,
                actor_id,
            } => AuditEntry {
                details: Some(format!("delivery {}", delivery_id)),
                ..entry(*actor_id, "dispatch", "request", *request_id)
            },
            Event::RequestDeleted { request_id, actor_id } => {
                entry(*actor_id, "delete", "request", *request_id)
            }
            Event::MovementRegistered {
                movement_id,
                article_id,
                stock_after,
                actor_id,
            } => AuditEntry {
                details: Some(format!("article {} stock {}", article_id, stock_after)),
                ..entry(*actor_id, "create", "movement", *movement_id)
            },
            Event::DeliveryCreated {
                delivery_id,
                actor_id,
            } => entry(*actor_id, "create", "delivery", *delivery_id),
            Event::PurchaseOrderCancelled {
                purchase_order_id,
                actor_id,
            } => entry(*actor_id, "cancel", "purchase_order", *purchase_order_id),
            Event::ReceptionConfirmed {
                reception_id,
                actor_id,
            } => entry(*actor_id, "confirm", "reception", *reception_id),
            Event::ReceptionCancelled {
                reception_id,
                actor_id,
            } => entry(*actor_id, "cancel", "reception", *reception_id),
            Event::RecordCreated {
                entity,
                entity_id,
                actor_id,
            } => entry(*actor_id, "create", entity, *entity_id),
            Event::RecordUpdated {
                entity,
                entity_id,
                actor_id,
            } => entry(*actor_id, "update", entity, *entity_id),
            Event::RecordDeleted {
                entity,
                entity_id,
                actor_id,
            } => entry(*actor_id, "delete", entity, *entity_id),
            Event::CatalogImported {
                catalog,
                created,
                updated,
                errors,
                actor_id,
            } => AuditEntry {
                actor_id: Some(*actor_id),
                action: "import",
                entity: catalog.clone(),
                entity_id: None,
                details: Some(format!(
                    "created={} updated={} errors={}",
                    created, updated, errors
                )),
            },
            Event::UserLoggedIn { user_id } => entry(*user_id, "login", "user", *user_id),
        }
    }
}

/// Drains the event channel, writing one audit row per event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, db: Arc<DbPool>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);
        let entry = event.audit_entry();

        let row = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(entry.actor_id),
            action: Set(entry.action.to_string()),
            entity: Set(entry.entity),
            entity_id: Set(entry.entity_id),
            details: Set(entry.details),
            created_at: Set(Utc::now()),
        };

        if let Err(e) = row.insert(db.as_ref()).await {
            error!(error = %e, "Failed to persist audit log entry");
        }
    }

    info!("Event channel closed; event processing stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reason_lands_in_details() {
        let actor = Uuid::new_v4();
        let request = Uuid::new_v4();
        let entry = Event::RequestRejected {
            request_id: request,
            actor_id: actor,
            reason: "no budget".into(),
        }
        .audit_entry();

        assert_eq!(entry.action, "reject");
        assert_eq!(entry.entity, "request");
        assert_eq!(entry.entity_id, Some(request));
        assert_eq!(entry.details.as_deref(), Some("no budget"));
    }

    #[test]
    fn import_has_no_entity_id() {
        let entry = Event::CatalogImported {
            catalog: "brands".into(),
            created: 2,
            updated: 1,
            errors: 0,
            actor_id: Uuid::new_v4(),
        }
        .audit_entry();
        assert_eq!(entry.entity_id, None);
        assert_eq!(entry.details.as_deref(), Some("created=2 updated=1 errors=0"));
    }

    #[tokio::test]
    async fn sender_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::UserLoggedIn {
                user_id: Uuid::new_v4()
            })
            .await
            .is_err());
    }
}
