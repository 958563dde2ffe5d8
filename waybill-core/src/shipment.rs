use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reasons a shipment can leave the happy path. All of them are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Damaged,
    Lost,
    Refused,
    ReturnedToSender,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 4] = [
        ExceptionKind::Damaged,
        ExceptionKind::Lost,
        ExceptionKind::Refused,
        ExceptionKind::ReturnedToSender,
    ];

    fn code(&self) -> &'static str {
        match self {
            ExceptionKind::Damaged => "DAMAGED",
            ExceptionKind::Lost => "LOST",
            ExceptionKind::Refused => "REFUSED",
            ExceptionKind::ReturnedToSender => "RETURNED_TO_SENDER",
        }
    }
}

/// Shipment status in the delivery lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ShipmentStatus {
    /// Virtual state before the first accepted status report; never reported by a carrier
    #[default]
    Unknown,
    Created,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception(ExceptionKind),
}

impl ShipmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Exception(_))
    }

    /// Whether a carrier may name this status in a report
    pub fn is_reportable(&self) -> bool {
        !matches!(self, ShipmentStatus::Unknown)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipmentStatus::Unknown => f.write_str("UNKNOWN"),
            ShipmentStatus::Created => f.write_str("CREATED"),
            ShipmentStatus::PickedUp => f.write_str("PICKED_UP"),
            ShipmentStatus::InTransit => f.write_str("IN_TRANSIT"),
            ShipmentStatus::OutForDelivery => f.write_str("OUT_FOR_DELIVERY"),
            ShipmentStatus::Delivered => f.write_str("DELIVERED"),
            ShipmentStatus::Exception(kind) => write!(f, "EXCEPTION_{}", kind.code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown shipment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ShipmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let status = match normalized.as_str() {
            "UNKNOWN" => ShipmentStatus::Unknown,
            "CREATED" => ShipmentStatus::Created,
            "PICKED_UP" => ShipmentStatus::PickedUp,
            "IN_TRANSIT" => ShipmentStatus::InTransit,
            "OUT_FOR_DELIVERY" => ShipmentStatus::OutForDelivery,
            "DELIVERED" => ShipmentStatus::Delivered,
            other => {
                let kind = other
                    .strip_prefix("EXCEPTION_")
                    .and_then(|code| ExceptionKind::ALL.into_iter().find(|k| k.code() == code))
                    .ok_or_else(|| UnknownStatus(s.to_string()))?;
                ShipmentStatus::Exception(kind)
            }
        };
        Ok(status)
    }
}

impl From<ShipmentStatus> for String {
    fn from(status: ShipmentStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for ShipmentStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Where a shipment was last seen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    /// A location needs a city, a country or a full coordinate pair,
    /// and coordinates must be in range.
    pub fn validate(&self) -> Result<(), String> {
        let has_name = [&self.city, &self.country]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()));

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(format!("coordinates out of range: {lat},{lon}"));
                }
                Ok(())
            }
            (None, None) if has_name => Ok(()),
            (None, None) => Err("location has neither a place name nor coordinates".to_string()),
            _ => Err("latitude and longitude must be given together".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingEventType {
    StatusChanged,
    LocationUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingPayload {
    StatusChanged(ShipmentStatus),
    LocationUpdated(Location),
}

/// Canonical, source-agnostic tracking event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub source_id: String,
    /// Timestamp reported by the source; drives timeline ordering
    pub occurred_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub payload: TrackingPayload,
}

impl TrackingEvent {
    pub fn new(
        shipment_id: Uuid,
        source_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        ingested_at: DateTime<Utc>,
        payload: TrackingPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shipment_id,
            source_id: source_id.into(),
            occurred_at,
            ingested_at,
            payload,
        }
    }

    pub fn event_type(&self) -> TrackingEventType {
        match self.payload {
            TrackingPayload::StatusChanged(_) => TrackingEventType::StatusChanged,
            TrackingPayload::LocationUpdated(_) => TrackingEventType::LocationUpdated,
        }
    }

    pub fn status(&self) -> Option<ShipmentStatus> {
        match self.payload {
            TrackingPayload::StatusChanged(status) => Some(status),
            TrackingPayload::LocationUpdated(_) => None,
        }
    }

    /// Two reports describe the same occurrence when shipment, type,
    /// source timestamp and payload all match. Ids, source and ingestion
    /// time are ignored.
    pub fn is_same_occurrence(&self, other: &TrackingEvent) -> bool {
        self.shipment_id == other.shipment_id
            && self.event_type() == other.event_type()
            && self.occurred_at == other.occurred_at
            && self.payload == other.payload
    }
}
