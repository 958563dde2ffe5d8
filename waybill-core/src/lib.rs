pub mod shipment;
pub mod timeline;
pub mod ports;

pub use shipment::{
    ExceptionKind, Location, ShipmentStatus, TrackingEvent, TrackingEventType, TrackingPayload,
    UnknownStatus,
};
pub use timeline::ShipmentTimeline;
pub use ports::{CarrierCatalog, PortError, StatusNotifier, TimelineRepository};
