use crate::sources::{self, ParsedReport};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use waybill_core::TrackingEvent;

/// Tracking sources the normalizer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingSource {
    /// Our own JSON webhook format
    Canonical,
    /// ParcelJet scan webhooks
    ParcelJet,
    /// Pipe-delimited batch feed
    FlatFile,
}

impl TrackingSource {
    pub const ALL: [TrackingSource; 3] = [
        TrackingSource::Canonical,
        TrackingSource::ParcelJet,
        TrackingSource::FlatFile,
    ];

    /// Map a caller-supplied source identifier to a known source
    pub fn from_source_id(source_id: &str) -> Option<Self> {
        match source_id.trim().to_ascii_lowercase().as_str() {
            "canonical" | "waybill" => Some(TrackingSource::Canonical),
            "parceljet" | "parcel-jet" => Some(TrackingSource::ParcelJet),
            "flatfile" | "flat-file" | "ff" => Some(TrackingSource::FlatFile),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackingSource::Canonical => "canonical",
            TrackingSource::ParcelJet => "parceljet",
            TrackingSource::FlatFile => "flatfile",
        }
    }

    pub fn recognizes(&self, raw: &str) -> bool {
        match self {
            TrackingSource::Canonical => sources::canonical::recognizes(raw),
            TrackingSource::ParcelJet => sources::parcel_jet::recognizes(raw),
            TrackingSource::FlatFile => sources::flat_file::recognizes(raw),
        }
    }

    fn parse(&self, raw: &str) -> Result<ParsedReport, String> {
        match self {
            TrackingSource::Canonical => sources::canonical::parse(raw),
            TrackingSource::ParcelJet => sources::parcel_jet::parse(raw),
            TrackingSource::FlatFile => sources::flat_file::parse(raw),
        }
    }
}

/// Turns raw per-source payloads into canonical [`TrackingEvent`]s.
///
/// A known source id selects its format directly; an unknown id falls back
/// to asking every format whether it recognizes the payload. Either a
/// complete event comes out or an error does.
#[derive(Debug, Clone, Default)]
pub struct TrackingNormalizer;

impl TrackingNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Which source would handle this payload, if any
    pub fn detect(&self, source_id: &str, raw: &str) -> Option<TrackingSource> {
        match TrackingSource::from_source_id(source_id) {
            Some(source) => Some(source).filter(|s| s.recognizes(raw)),
            None => TrackingSource::ALL.into_iter().find(|s| s.recognizes(raw)),
        }
    }

    pub fn normalize(
        &self,
        shipment_id: Uuid,
        source_id: &str,
        raw: &str,
        ingested_at: DateTime<Utc>,
    ) -> Result<TrackingEvent, NormalizeError> {
        let source = self
            .detect(source_id, raw)
            .ok_or_else(|| NormalizeError::Unrecognized {
                source_id: source_id.to_string(),
            })?;

        let report = source.parse(raw).map_err(|reason| NormalizeError::Malformed {
            format: source.name(),
            reason,
        })?;

        Ok(TrackingEvent::new(
            shipment_id,
            source_id.trim(),
            report.occurred_at,
            ingested_at,
            report.payload,
        ))
    }
}

/// Normalization errors. The payload is discarded in both cases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("Unrecognized tracking payload from source {source_id}")]
    Unrecognized { source_id: String },

    #[error("Malformed {format} payload: {reason}")]
    Malformed { format: &'static str, reason: String },
}
