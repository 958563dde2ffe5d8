use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;
use waybill_core::{PortError, TimelineRepository, TrackingEvent};

/// Timeline storage for tests and single-process deployments.
/// Events are kept per shipment in (occurred_at, ingested_at) order.
#[derive(Default)]
pub struct InMemoryTimelineRepository {
    timelines: RwLock<HashMap<Uuid, Vec<TrackingEvent>>>,
}

impl InMemoryTimelineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self, shipment_id: Uuid) -> usize {
        self.timelines
            .read()
            .get(&shipment_id)
            .map_or(0, Vec::len)
    }

    pub fn shipment_count(&self) -> usize {
        self.timelines.read().len()
    }
}

#[async_trait]
impl TimelineRepository for InMemoryTimelineRepository {
    async fn append_timeline_event(
        &self,
        shipment_id: Uuid,
        event: &TrackingEvent,
    ) -> Result<(), PortError> {
        if event.shipment_id != shipment_id {
            return Err(format!(
                "event {} belongs to shipment {}, not {}",
                event.id, event.shipment_id, shipment_id
            )
            .into());
        }

        let mut timelines = self.timelines.write();
        let events = timelines.entry(shipment_id).or_default();
        let key = (event.occurred_at, event.ingested_at);
        let index = events.partition_point(|e| (e.occurred_at, e.ingested_at) <= key);
        events.insert(index, event.clone());
        Ok(())
    }

    async fn load_timeline(&self, shipment_id: Uuid) -> Result<Vec<TrackingEvent>, PortError> {
        Ok(self
            .timelines
            .read()
            .get(&shipment_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use waybill_core::{ShipmentStatus, TrackingPayload};

    fn status_event(shipment_id: Uuid, status: ShipmentStatus, hour: u32) -> TrackingEvent {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap();
        TrackingEvent::new(shipment_id, "canonical", at, at + Duration::seconds(5), TrackingPayload::StatusChanged(status))
    }

    #[tokio::test]
    async fn test_append_keeps_source_order() {
        let repo = InMemoryTimelineRepository::new();
        let shipment = Uuid::new_v4();

        repo.append_timeline_event(shipment, &status_event(shipment, ShipmentStatus::InTransit, 12))
            .await
            .unwrap();
        repo.append_timeline_event(shipment, &status_event(shipment, ShipmentStatus::Created, 8))
            .await
            .unwrap();

        let events = repo.load_timeline(shipment).await.unwrap();
        let statuses: Vec<_> = events.iter().filter_map(|e| e.status()).collect();
        assert_eq!(statuses, vec![ShipmentStatus::Created, ShipmentStatus::InTransit]);
        assert_eq!(repo.event_count(shipment), 2);
    }

    #[tokio::test]
    async fn test_unknown_shipment_is_empty() {
        let repo = InMemoryTimelineRepository::new();
        assert!(repo.load_timeline(Uuid::new_v4()).await.unwrap().is_empty());
        assert_eq!(repo.shipment_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_event_refused() {
        let repo = InMemoryTimelineRepository::new();
        let event = status_event(Uuid::new_v4(), ShipmentStatus::Created, 8);

        assert!(repo.append_timeline_event(Uuid::new_v4(), &event).await.is_err());
        assert_eq!(repo.shipment_count(), 0);
    }
}
