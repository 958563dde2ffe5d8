use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use waybill_catalog::{Carrier, CatalogSnapshot, LaneTariff, ServiceLevel};
use waybill_core::{CarrierCatalog, PortError};
use waybill_route::{RouteError, RouteOptimization, RouteOptimizer, RouteRequest};

const OBJECTIVES: [RouteOptimization; 3] = [
    RouteOptimization::Fastest,
    RouteOptimization::Cheapest,
    RouteOptimization::Balanced,
];

fn tariff(origin: &str, destination: &str, level: ServiceLevel, cost: &str, hours: u32) -> LaneTariff {
    LaneTariff {
        origin: origin.to_string(),
        destination: destination.to_string(),
        service_level: level,
        base_cost: cost.parse().expect("Invalid decimal"),
        transit_hours: hours,
        surcharge_percent: Decimal::ZERO,
    }
}

fn carriers() -> Vec<Carrier> {
    vec![
        Carrier::new("ACME", "Acme Freight")
            .with_tariff(tariff("CHI", "NYC", ServiceLevel::Standard, "120.00", 48))
            .with_tariff(tariff("CHI", "NYC", ServiceLevel::Economy, "80.00", 96)),
        Carrier::new("BOLT", "Bolt Express")
            .with_tariff(tariff("CHI", "NYC", ServiceLevel::Express, "210.50", 16))
            .with_tariff(tariff("CHI", "NYC", ServiceLevel::Standard, "120.00", 40)),
        Carrier::new("CRATE", "Crate Logistics")
            .with_tariff(tariff("CHI", "NYC", ServiceLevel::Economy, "80.00", 96))
            .with_tariff(tariff("CHI", "LAX", ServiceLevel::Standard, "300.00", 72)),
    ]
}

struct StaticCatalog(Vec<Carrier>);

#[async_trait]
impl CarrierCatalog for StaticCatalog {
    async fn carriers_for_lane(&self, origin: &str, destination: &str) -> Result<Vec<Carrier>, PortError> {
        Ok(self
            .0
            .iter()
            .filter(|c| c.serves_lane(origin, destination))
            .cloned()
            .collect())
    }
}

struct UnavailableCatalog;

#[async_trait]
impl CarrierCatalog for UnavailableCatalog {
    async fn carriers_for_lane(&self, _origin: &str, _destination: &str) -> Result<Vec<Carrier>, PortError> {
        Err("catalog service timed out".into())
    }
}

#[test]
fn test_optimize_is_deterministic_for_every_objective() {
    let snapshot = CatalogSnapshot::new(carriers()).unwrap();
    let optimizer = RouteOptimizer::default();
    let decided_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    for objective in OBJECTIVES {
        let request = RouteRequest::new("CHI", "NYC", None, objective);
        let first = optimizer.optimize_at(&snapshot, &request, decided_at).unwrap();

        for _ in 0..10 {
            let again = optimizer.optimize_at(&snapshot.clone(), &request, decided_at).unwrap();
            assert_eq!(again, first);
        }
    }
}

#[test]
fn test_ties_resolved_by_carrier_code() {
    let snapshot = CatalogSnapshot::new(carriers()).unwrap();
    let optimizer = RouteOptimizer::default();

    // ACME and CRATE both quote 80.00 / 96h economy
    let request = RouteRequest::new("CHI", "NYC", Some(ServiceLevel::Economy), RouteOptimization::Cheapest);
    let decision = optimizer.optimize(&snapshot, &request).unwrap();

    assert_eq!(decision.chosen.carrier_code, "ACME");
    assert_eq!(decision.alternatives[0].carrier_code, "CRATE");
}

#[test]
fn test_objectives_on_shared_lane() {
    let snapshot = CatalogSnapshot::new(carriers()).unwrap();
    let optimizer = RouteOptimizer::default();

    let fastest = optimizer
        .optimize(&snapshot, &RouteRequest::new("CHI", "NYC", None, RouteOptimization::Fastest))
        .unwrap();
    assert_eq!(fastest.chosen.carrier_code, "BOLT");
    assert_eq!(fastest.chosen.service_level, ServiceLevel::Express);

    // Same price for standard, BOLT is 8h quicker
    let standard = optimizer
        .optimize(
            &snapshot,
            &RouteRequest::new("CHI", "NYC", Some(ServiceLevel::Standard), RouteOptimization::Cheapest),
        )
        .unwrap();
    assert_eq!(standard.chosen.carrier_code, "BOLT");
    assert_eq!(standard.alternatives.len(), 1);
}

#[tokio::test]
async fn test_optimize_lane_through_catalog_port() {
    let optimizer = RouteOptimizer::default();
    let catalog = StaticCatalog(carriers());

    let decision = optimizer
        .optimize_lane(&catalog, &RouteRequest::new("CHI", "LAX", None, RouteOptimization::Balanced))
        .await
        .unwrap();
    assert_eq!(decision.chosen.carrier_code, "CRATE");
    assert!(decision.alternatives.is_empty());

    let event = decision.to_event();
    assert_eq!(event.carrier_code, "CRATE");
    assert_eq!(event.cost.parse::<Decimal>().unwrap(), Decimal::from(300));
}

#[tokio::test]
async fn test_catalog_failure_is_surfaced() {
    let optimizer = RouteOptimizer::default();
    let request = RouteRequest::new("CHI", "NYC", None, RouteOptimization::Fastest);

    let err = optimizer.optimize_lane(&UnavailableCatalog, &request).await.unwrap_err();
    assert!(matches!(err, RouteError::Catalog(_)));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_parallel_requests_share_one_optimizer() {
    let optimizer = Arc::new(RouteOptimizer::default());
    let snapshot = Arc::new(CatalogSnapshot::new(carriers()).unwrap());

    let mut handles = Vec::new();
    for i in 0..24 {
        let optimizer = optimizer.clone();
        let snapshot = snapshot.clone();
        handles.push(tokio::spawn(async move {
            let objective = OBJECTIVES[i % OBJECTIVES.len()];
            let request = RouteRequest::new("CHI", "NYC", None, objective);
            let decision = optimizer.optimize(&snapshot, &request).unwrap();
            (objective, decision.chosen.carrier_code, decision.chosen.service_level)
        }));
    }

    for handle in handles {
        let (objective, code, level) = handle.await.unwrap();
        match objective {
            RouteOptimization::Fastest => assert_eq!((code.as_str(), level), ("BOLT", ServiceLevel::Express)),
            RouteOptimization::Cheapest => assert_eq!((code.as_str(), level), ("ACME", ServiceLevel::Economy)),
            RouteOptimization::Balanced => assert!(!code.is_empty()),
        }
    }
}
