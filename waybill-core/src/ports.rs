use crate::shipment::{ShipmentStatus, TrackingEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use waybill_catalog::Carrier;

/// Error type returned by collaborators; propagated unmodified by the core.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Read access to carrier reference data
#[async_trait]
pub trait CarrierCatalog: Send + Sync {
    async fn carriers_for_lane(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Vec<Carrier>, PortError>;
}

/// Durable storage of shipment timelines
#[async_trait]
pub trait TimelineRepository: Send + Sync {
    /// Append one accepted event. The event is durable once this returns Ok.
    async fn append_timeline_event(
        &self,
        shipment_id: Uuid,
        event: &TrackingEvent,
    ) -> Result<(), PortError>;

    /// Events in source-timestamp order
    async fn load_timeline(
        &self,
        shipment_id: Uuid,
    ) -> Result<Vec<TrackingEvent>, PortError>;
}

/// Receives one call per accepted status transition
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn on_status_changed(
        &self,
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PortError>;
}
