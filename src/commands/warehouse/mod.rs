//! Stock movements and deliveries.

pub mod create_delivery_command;
pub mod register_movement_command;
pub mod stock;

pub use create_delivery_command::{CreateDeliveryCommand, DeliveryLineInput};
pub use register_movement_command::RegisterMovementCommand;
pub use stock::{apply_movement, MovementInput};
