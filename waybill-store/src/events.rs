use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;
use waybill_core::{PortError, ShipmentStatus, StatusNotifier};
use waybill_shared::ShipmentStatusChangedEvent;

/// Fans status transitions out to in-process subscribers.
///
/// Publishing with nobody subscribed is not an error; the event is simply
/// dropped, like a topic without consumers.
#[derive(Clone)]
pub struct StatusBroadcaster {
    tx: broadcast::Sender<ShipmentStatusChangedEvent>,
}

impl StatusBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShipmentStatusChangedEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ShipmentStatusChangedEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!("Status change delivered to {} subscribers", receivers),
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for status change of shipment {}", event.shipment_id)
            }
        }
    }
}

#[async_trait]
impl StatusNotifier for StatusBroadcaster {
    async fn on_status_changed(
        &self,
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.publish(ShipmentStatusChangedEvent {
            shipment_id,
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
            occurred_at: timestamp.timestamp(),
            published_at: Utc::now().timestamp(),
        });
        Ok(())
    }
}
