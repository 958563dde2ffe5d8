pub mod models;

pub use models::events::{RouteSelectedEvent, ShipmentStatusChangedEvent};
