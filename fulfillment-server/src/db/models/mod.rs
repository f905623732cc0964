//! Database Models
//!
//! SurrealDB entities. IDs round-trip as "table:id" strings via
//! [`serde_helpers`].

pub mod medication;
pub mod order;
pub mod serde_helpers;
pub mod shipment;
pub mod subscription;
pub mod user;

pub use medication::Medication;
pub use order::{Order, OrderItem, OrderStatus};
pub use shipment::{Shipment, ShipmentStatus, TrackingEvent};
pub use subscription::{PlanSnapshot, Subscription, SubscriptionStatus};
pub use user::UserProfile;
