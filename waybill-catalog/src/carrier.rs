use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Service levels a carrier can offer on a lane
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceLevel {
    Express,
    Standard,
    Economy,
}

impl ServiceLevel {
    pub const ALL: [ServiceLevel; 3] = [ServiceLevel::Express, ServiceLevel::Standard, ServiceLevel::Economy];
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceLevel::Express => "EXPRESS",
            ServiceLevel::Standard => "STANDARD",
            ServiceLevel::Economy => "ECONOMY",
        };
        f.write_str(s)
    }
}

/// Priced offering of one carrier on one lane at one service level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaneTariff {
    pub origin: String,
    pub destination: String,
    pub service_level: ServiceLevel,
    pub base_cost: Decimal,
    pub transit_hours: u32,

    /// Fuel/peak surcharge applied on top of the base cost (e.g. 12.5 = +12.5%)
    #[serde(default)]
    pub surcharge_percent: Decimal,
}

impl LaneTariff {
    pub fn serves(&self, origin: &str, destination: &str) -> bool {
        lane_eq(&self.origin, origin) && lane_eq(&self.destination, destination)
    }

    /// Total cost including surcharge, rounded to cents
    pub fn total_cost(&self) -> Decimal {
        let surcharge = self.base_cost * self.surcharge_percent / Decimal::ONE_HUNDRED;
        (self.base_cost + surcharge).round_dp(2)
    }
}

/// Cost and transit time quoted for a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub cost: Decimal,
    pub transit_hours: u32,
}

/// A carrier and everything it offers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carrier {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub service_levels: Vec<ServiceLevel>,
    pub tariffs: Vec<LaneTariff>,
}

impl Carrier {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            service_levels: Vec::new(),
            tariffs: Vec::new(),
        }
    }

    /// Builder-style helper used when assembling catalogs by hand
    pub fn with_tariff(mut self, tariff: LaneTariff) -> Self {
        if !self.service_levels.contains(&tariff.service_level) {
            self.service_levels.push(tariff.service_level);
        }
        self.tariffs.push(tariff);
        self
    }

    pub fn offers(&self, level: ServiceLevel) -> bool {
        self.service_levels.contains(&level)
    }

    pub fn serves_lane(&self, origin: &str, destination: &str) -> bool {
        self.tariffs
            .iter()
            .any(|t| self.offers(t.service_level) && t.serves(origin, destination))
    }

    /// Per-lane cost/time function. None when the carrier does not offer
    /// the level or has no tariff for the lane.
    pub fn quote(&self, origin: &str, destination: &str, level: ServiceLevel) -> Option<Quote> {
        if !self.offers(level) {
            return None;
        }

        self.tariffs
            .iter()
            .find(|t| t.service_level == level && t.serves(origin, destination))
            .map(|t| Quote {
                cost: t.total_cost(),
                transit_hours: t.transit_hours,
            })
    }
}

fn lane_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
