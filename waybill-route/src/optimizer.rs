use crate::models::{RouteCandidate, RouteDecision, RouteRequest};
use crate::strategy::{BalancedWeights, RouteStrategy};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use waybill_catalog::{CatalogError, CatalogSnapshot, ServiceLevel};
use waybill_core::{CarrierCatalog, PortError};

/// Selects a carrier and service level for a lane.
///
/// Stateless apart from its configuration: every call works on the snapshot
/// it is handed, so one optimizer can serve any number of concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct RouteOptimizer {
    weights: BalancedWeights,
}

impl RouteOptimizer {
    pub fn new(weights: BalancedWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> BalancedWeights {
        self.weights
    }

    /// Optimize against a snapshot, stamping the decision with the current time
    pub fn optimize(
        &self,
        snapshot: &CatalogSnapshot,
        request: &RouteRequest,
    ) -> Result<RouteDecision, RouteError> {
        self.optimize_at(snapshot, request, Utc::now())
    }

    /// Same as [`optimize`](Self::optimize) with an explicit decision time.
    /// Identical inputs always produce an identical decision.
    pub fn optimize_at(
        &self,
        snapshot: &CatalogSnapshot,
        request: &RouteRequest,
        decided_at: DateTime<Utc>,
    ) -> Result<RouteDecision, RouteError> {
        let candidates = Self::candidates(snapshot, request);
        if candidates.is_empty() {
            return Err(RouteError::NoRouteAvailable {
                origin: request.origin.clone(),
                destination: request.destination.clone(),
                service_level: request.service_level,
            });
        }

        let strategy = RouteStrategy::for_objective(request.objective, self.weights);
        debug!(
            "Ranking {} candidates for {} -> {} with {:?}",
            candidates.len(),
            request.origin,
            request.destination,
            strategy
        );

        let mut ranked = strategy.rank(candidates)?;
        let chosen = ranked.remove(0);
        let decision = RouteDecision::new(request, chosen, ranked, decided_at);

        info!(
            "Route selected for {} -> {}: {} {} (cost {}, {}h, objective {})",
            decision.origin,
            decision.destination,
            decision.chosen.carrier_code,
            decision.chosen.service_level,
            decision.chosen.cost,
            decision.chosen.transit_hours,
            decision.objective
        );

        Ok(decision)
    }

    /// Read the lane through the catalog port, then optimize on that read
    pub async fn optimize_lane(
        &self,
        catalog: &dyn CarrierCatalog,
        request: &RouteRequest,
    ) -> Result<RouteDecision, RouteError> {
        let carriers = catalog
            .carriers_for_lane(&request.origin, &request.destination)
            .await
            .map_err(RouteError::Catalog)?;

        let snapshot = CatalogSnapshot::new(carriers)?;
        self.optimize(&snapshot, request)
    }

    /// One unscored candidate per (carrier, service level) quoted on the lane
    pub fn candidates(snapshot: &CatalogSnapshot, request: &RouteRequest) -> Vec<RouteCandidate> {
        let levels: Vec<ServiceLevel> = match request.service_level {
            Some(level) => vec![level],
            None => ServiceLevel::ALL.to_vec(),
        };

        snapshot
            .carriers_for_lane(&request.origin, &request.destination)
            .into_iter()
            .flat_map(|carrier| {
                levels.iter().filter_map(move |&level| {
                    carrier
                        .quote(&request.origin, &request.destination, level)
                        .map(|quote| RouteCandidate {
                            carrier_id: carrier.id,
                            carrier_code: carrier.code.clone(),
                            service_level: level,
                            cost: quote.cost,
                            transit_hours: quote.transit_hours,
                            score: Decimal::ZERO,
                        })
                })
            })
            .collect()
    }
}

/// Route optimization errors
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("No route candidates to rank")]
    NoCandidates,

    #[error("No route available for {origin} -> {destination} (service level: {})", level_label(.service_level))]
    NoRouteAvailable {
        origin: String,
        destination: String,
        service_level: Option<ServiceLevel>,
    },

    #[error("Invalid balanced weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid catalog data: {0}")]
    InvalidCatalog(#[from] CatalogError),

    #[error("Carrier catalog unavailable: {0}")]
    Catalog(#[source] PortError),
}

fn level_label(level: &Option<ServiceLevel>) -> String {
    level.map_or_else(|| "any".to_string(), |l| l.to_string())
}
