//! Raw payload formats understood by the normalizer, one module per source.
//!
//! Each module exposes `recognizes` (cheap shape check, no field validation)
//! and `parse` (full validation, error string on any missing/invalid field).

use chrono::{DateTime, Utc};
use waybill_core::{Location, ShipmentStatus, TrackingPayload};

/// A fully validated report, not yet bound to a shipment
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub occurred_at: DateTime<Utc>,
    pub payload: TrackingPayload,
}

fn json_object(raw: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn status_payload(status: ShipmentStatus) -> Result<TrackingPayload, String> {
    if !status.is_reportable() {
        return Err(format!("status {status} cannot be reported"));
    }
    Ok(TrackingPayload::StatusChanged(status))
}

fn location_payload(location: Location) -> Result<TrackingPayload, String> {
    location.validate()?;
    Ok(TrackingPayload::LocationUpdated(location))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Our own webhook format.
///
/// ```json
/// {"event": "status_changed", "status": "IN_TRANSIT", "occurred_at": "2024-03-01T08:00:00Z"}
/// {"event": "location_updated", "location": {"city": "Gary", "country": "US"}, "occurred_at": "..."}
/// ```
pub mod canonical {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(tag = "event", rename_all = "snake_case")]
    enum CanonicalReport {
        StatusChanged {
            status: String,
            occurred_at: DateTime<Utc>,
        },
        LocationUpdated {
            location: Location,
            occurred_at: DateTime<Utc>,
        },
    }

    pub fn recognizes(raw: &str) -> bool {
        json_object(raw).is_some_and(|map| map.get("event").is_some_and(|v| v.is_string()))
    }

    pub fn parse(raw: &str) -> Result<ParsedReport, String> {
        let report: CanonicalReport = serde_json::from_str(raw).map_err(|e| e.to_string())?;

        match report {
            CanonicalReport::StatusChanged { status, occurred_at } => {
                let status = status.parse::<ShipmentStatus>().map_err(|e| e.to_string())?;
                Ok(ParsedReport {
                    occurred_at,
                    payload: status_payload(status)?,
                })
            }
            CanonicalReport::LocationUpdated { location, occurred_at } => Ok(ParsedReport {
                occurred_at,
                payload: location_payload(location)?,
            }),
        }
    }
}

/// ParcelJet scan webhooks: status codes plus facility arrival/departure scans.
///
/// ```json
/// {"trackingNumber": "PJ123", "scan": {"code": "PU", "timestamp": 1709280000,
///  "facility": {"city": "Chicago", "state": "IL", "countryCode": "US"}}}
/// ```
pub mod parcel_jet {
    use super::*;
    use serde::Deserialize;
    use waybill_core::ExceptionKind;

    #[derive(Deserialize)]
    struct Envelope {
        scan: Scan,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Scan {
        code: String,
        timestamp: i64,
        facility: Option<Facility>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Facility {
        city: Option<String>,
        state: Option<String>,
        country_code: Option<String>,
        lat: Option<f64>,
        lng: Option<f64>,
    }

    impl From<Facility> for Location {
        fn from(f: Facility) -> Self {
            Location {
                city: non_empty(f.city),
                region: non_empty(f.state),
                country: non_empty(f.country_code),
                latitude: f.lat,
                longitude: f.lng,
            }
        }
    }

    fn status_for(code: &str) -> Option<ShipmentStatus> {
        let status = match code {
            "MN" => ShipmentStatus::Created,
            "PU" => ShipmentStatus::PickedUp,
            "IT" => ShipmentStatus::InTransit,
            "OD" => ShipmentStatus::OutForDelivery,
            "DL" => ShipmentStatus::Delivered,
            "XD" => ShipmentStatus::Exception(ExceptionKind::Damaged),
            "XL" => ShipmentStatus::Exception(ExceptionKind::Lost),
            "XR" => ShipmentStatus::Exception(ExceptionKind::Refused),
            "RS" => ShipmentStatus::Exception(ExceptionKind::ReturnedToSender),
            _ => return None,
        };
        Some(status)
    }

    pub fn recognizes(raw: &str) -> bool {
        json_object(raw).is_some_and(|map| map.get("scan").is_some_and(|v| v.is_object()))
    }

    pub fn parse(raw: &str) -> Result<ParsedReport, String> {
        let envelope: Envelope = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let scan = envelope.scan;

        let occurred_at = DateTime::from_timestamp(scan.timestamp, 0)
            .ok_or_else(|| format!("timestamp out of range: {}", scan.timestamp))?;
        let code = scan.code.trim().to_ascii_uppercase();

        let payload = match code.as_str() {
            "AR" | "DP" => {
                let facility = scan
                    .facility
                    .ok_or_else(|| format!("{code} scan without facility"))?;
                location_payload(facility.into())?
            }
            other => {
                let status = status_for(other).ok_or_else(|| format!("unknown scan code {other}"))?;
                status_payload(status)?
            }
        };

        Ok(ParsedReport { occurred_at, payload })
    }
}

/// Pipe-delimited batch feed: `FF|<yyyymmddHHMMSS UTC>|<code>|<city>|<country>`.
pub mod flat_file {
    use super::*;
    use chrono::NaiveDateTime;
    use waybill_core::ExceptionKind;

    const PREFIX: &str = "FF|";
    const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

    fn status_for(code: &str) -> Option<ShipmentStatus> {
        let status = match code {
            "CR" => ShipmentStatus::Created,
            "PU" => ShipmentStatus::PickedUp,
            "IT" => ShipmentStatus::InTransit,
            "OFD" => ShipmentStatus::OutForDelivery,
            "DEL" => ShipmentStatus::Delivered,
            "EXC-DMG" => ShipmentStatus::Exception(ExceptionKind::Damaged),
            "EXC-LOST" => ShipmentStatus::Exception(ExceptionKind::Lost),
            "EXC-REF" => ShipmentStatus::Exception(ExceptionKind::Refused),
            "EXC-RTS" => ShipmentStatus::Exception(ExceptionKind::ReturnedToSender),
            _ => return None,
        };
        Some(status)
    }

    pub fn recognizes(raw: &str) -> bool {
        raw.trim_start().starts_with(PREFIX)
    }

    pub fn parse(raw: &str) -> Result<ParsedReport, String> {
        let fields: Vec<&str> = raw.trim().split('|').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(format!("expected at least 3 fields, got {}", fields.len()));
        }

        let occurred_at = NaiveDateTime::parse_from_str(fields[1], TIMESTAMP_FORMAT)
            .map_err(|e| format!("invalid timestamp {:?}: {e}", fields[1]))?
            .and_utc();
        let code = fields[2].to_ascii_uppercase();

        let payload = if code == "LOC" {
            let field = |i: usize| non_empty(fields.get(i).map(|s| s.to_string()));
            location_payload(Location {
                city: field(3),
                country: field(4),
                ..Default::default()
            })?
        } else {
            let status = status_for(&code).ok_or_else(|| format!("unknown status code {code}"))?;
            status_payload(status)?
        };

        Ok(ParsedReport { occurred_at, payload })
    }
}
