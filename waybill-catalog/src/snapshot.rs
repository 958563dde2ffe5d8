use crate::carrier::Carrier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Immutable view of the carrier catalog at one point in time.
///
/// Optimization runs against a snapshot instead of live shared state, so
/// the same snapshot and request always produce the same decision.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CatalogSnapshot {
    carriers: Vec<Carrier>,
}

#[derive(Deserialize)]
struct CatalogDocument {
    carriers: Vec<Carrier>,
}

impl CatalogSnapshot {
    /// Build a validated snapshot
    pub fn new(carriers: Vec<Carrier>) -> Result<Self, CatalogError> {
        let mut codes = HashSet::new();

        for carrier in &carriers {
            if carrier.code.trim().is_empty() {
                return Err(CatalogError::InvalidCarrier {
                    code: carrier.code.clone(),
                    reason: "carrier code is empty".to_string(),
                });
            }

            if !codes.insert(carrier.code.to_ascii_uppercase()) {
                return Err(CatalogError::DuplicateCarrier(carrier.code.clone()));
            }

            Self::validate_tariffs(carrier)?;
        }

        Ok(Self { carriers })
    }

    /// Parse a `{"carriers": [...]}` document
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::new(document.carriers)
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// Carriers with at least one offered service level on the lane
    pub fn carriers_for_lane(&self, origin: &str, destination: &str) -> Vec<&Carrier> {
        self.carriers
            .iter()
            .filter(|c| c.serves_lane(origin, destination))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }

    fn validate_tariffs(carrier: &Carrier) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidCarrier {
            code: carrier.code.clone(),
            reason,
        };
        let mut lanes = HashSet::new();

        for tariff in &carrier.tariffs {
            if tariff.origin.trim().is_empty() || tariff.destination.trim().is_empty() {
                return Err(invalid("tariff lane has an empty endpoint".to_string()));
            }
            if tariff.base_cost.is_sign_negative() || tariff.surcharge_percent.is_sign_negative() {
                return Err(invalid(format!(
                    "negative cost on {}->{}",
                    tariff.origin, tariff.destination
                )));
            }
            if tariff.transit_hours == 0 {
                return Err(invalid(format!(
                    "zero transit time on {}->{}",
                    tariff.origin, tariff.destination
                )));
            }

            let key = (
                tariff.origin.trim().to_ascii_uppercase(),
                tariff.destination.trim().to_ascii_uppercase(),
                tariff.service_level,
            );
            if !lanes.insert(key) {
                return Err(invalid(format!(
                    "duplicate {} tariff on {}->{}",
                    tariff.service_level, tariff.origin, tariff.destination
                )));
            }
        }

        Ok(())
    }
}

/// Catalog-related errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Duplicate carrier code: {0}")]
    DuplicateCarrier(String),

    #[error("Invalid carrier {code}: {reason}")]
    InvalidCarrier { code: String, reason: String },

    #[error("Catalog document could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}
