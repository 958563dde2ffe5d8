use crate::shipment::{Location, ShipmentStatus, TrackingEvent, TrackingPayload};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only, time-ordered record of a shipment's accepted tracking events.
///
/// Events are kept sorted by `(occurred_at, ingested_at)`. Late events are
/// inserted at their ordering position; nothing is ever replaced or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentTimeline {
    shipment_id: Uuid,
    events: Vec<TrackingEvent>,
}

impl ShipmentTimeline {
    pub fn new(shipment_id: Uuid) -> Self {
        Self {
            shipment_id,
            events: Vec::new(),
        }
    }

    /// Rebuild a timeline from persisted events. Events for other shipments are dropped.
    pub fn from_events(shipment_id: Uuid, events: Vec<TrackingEvent>) -> Self {
        let mut events: Vec<TrackingEvent> = events
            .into_iter()
            .filter(|e| e.shipment_id == shipment_id)
            .collect();
        events.sort_by_key(|e| (e.occurred_at, e.ingested_at));
        Self { shipment_id, events }
    }

    pub fn shipment_id(&self) -> Uuid {
        self.shipment_id
    }

    pub fn events(&self) -> &[TrackingEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains_occurrence(&self, event: &TrackingEvent) -> bool {
        self.events.iter().any(|e| e.is_same_occurrence(event))
    }

    /// Index the event would take if inserted now
    pub fn position_for(&self, event: &TrackingEvent) -> usize {
        let key = (event.occurred_at, event.ingested_at);
        self.events
            .partition_point(|e| (e.occurred_at, e.ingested_at) <= key)
    }

    /// Ingestion stamp strictly later than any already on the timeline.
    /// Events stamped this way sort after every event sharing their
    /// source timestamp.
    pub fn next_ingested_at(&self, candidate: DateTime<Utc>) -> DateTime<Utc> {
        match self.events.iter().map(|e| e.ingested_at).max() {
            Some(last) if last >= candidate => last + Duration::microseconds(1),
            _ => candidate,
        }
    }

    /// Insert at the ordering position and return it
    pub fn insert(&mut self, event: TrackingEvent) -> usize {
        let position = self.position_for(&event);
        self.events.insert(position, event);
        position
    }

    /// Status implied by replaying accepted status events up to and including `at`
    pub fn status_at(&self, at: DateTime<Utc>) -> ShipmentStatus {
        self.events
            .iter()
            .take_while(|e| e.occurred_at <= at)
            .filter_map(TrackingEvent::status)
            .last()
            .unwrap_or_default()
    }

    pub fn current_status(&self) -> ShipmentStatus {
        self.events
            .iter()
            .filter_map(TrackingEvent::status)
            .last()
            .unwrap_or_default()
    }

    pub fn latest_status_event(&self) -> Option<&TrackingEvent> {
        self.events.iter().rev().find(|e| e.status().is_some())
    }

    pub fn latest_location(&self) -> Option<&Location> {
        self.events.iter().rev().find_map(|e| match &e.payload {
            TrackingPayload::LocationUpdated(location) => Some(location),
            TrackingPayload::StatusChanged(_) => None,
        })
    }

    /// Status progression as (source timestamp, status) pairs
    pub fn status_history(&self) -> Vec<(DateTime<Utc>, ShipmentStatus)> {
        self.events
            .iter()
            .filter_map(|e| e.status().map(|s| (e.occurred_at, s)))
            .collect()
    }
}
