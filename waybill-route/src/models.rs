use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use waybill_catalog::ServiceLevel;
use waybill_shared::RouteSelectedEvent;

/// Optimization objective selecting which strategy scores candidates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteOptimization {
    Fastest,
    Cheapest,
    Balanced,
}

impl fmt::Display for RouteOptimization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteOptimization::Fastest => "FASTEST",
            RouteOptimization::Cheapest => "CHEAPEST",
            RouteOptimization::Balanced => "BALANCED",
        };
        f.write_str(s)
    }
}

/// What the order-placement side asks for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub service_level: Option<ServiceLevel>,
    pub objective: RouteOptimization,
}

impl RouteRequest {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        service_level: Option<ServiceLevel>,
        objective: RouteOptimization,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            service_level,
            objective,
        }
    }
}

/// One (carrier, service level) option for a lane. Lives only for one optimization call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteCandidate {
    pub carrier_id: Uuid,
    pub carrier_code: String,
    pub service_level: ServiceLevel,
    pub cost: Decimal,
    pub transit_hours: u32,
    /// Lower is better; meaning depends on the strategy that ranked it
    pub score: Decimal,
}

/// The accepted outcome of an optimization. Never mutated; re-optimizing yields a new decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteDecision {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub objective: RouteOptimization,
    pub chosen: RouteCandidate,
    /// Remaining candidates, best first
    pub alternatives: Vec<RouteCandidate>,
    pub decided_at: DateTime<Utc>,
}

impl RouteDecision {
    pub fn new(
        request: &RouteRequest,
        chosen: RouteCandidate,
        alternatives: Vec<RouteCandidate>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        // Derived from the inputs so that replaying a decision reproduces its id
        let name = format!(
            "{}|{}|{}|{}|{}|{}",
            request.origin.trim().to_ascii_uppercase(),
            request.destination.trim().to_ascii_uppercase(),
            request.objective,
            chosen.carrier_code,
            chosen.service_level,
            decided_at.timestamp_micros(),
        );

        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            objective: request.objective,
            chosen,
            alternatives,
            decided_at,
        }
    }

    pub fn runner_up(&self) -> Option<&RouteCandidate> {
        self.alternatives.first()
    }

    pub fn to_event(&self) -> RouteSelectedEvent {
        RouteSelectedEvent {
            decision_id: self.id,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            carrier_code: self.chosen.carrier_code.clone(),
            service_level: self.chosen.service_level.to_string(),
            objective: self.objective.to_string(),
            cost: self.chosen.cost.to_string(),
            transit_hours: self.chosen.transit_hours,
            timestamp: self.decided_at.timestamp(),
        }
    }
}
