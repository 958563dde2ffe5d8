use uuid::Uuid;

/// Published once per accepted status transition.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ShipmentStatusChangedEvent {
    pub shipment_id: Uuid,
    pub old_status: String,
    pub new_status: String,
    pub occurred_at: i64,
    pub published_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct RouteSelectedEvent {
    pub decision_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub carrier_code: String,
    pub service_level: String,
    pub objective: String,
    pub cost: String, // Decimal as string, no float rounding on the wire
    pub transit_hours: u32,
    pub timestamp: i64,
}
