use crate::models::{RouteCandidate, RouteOptimization};
use crate::optimizer::RouteError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weights for the balanced strategy. Each term is normalized against the
/// largest value in the evaluated set, so the weights are unit-free.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BalancedWeights {
    cost: Decimal,
    time: Decimal,
}

impl BalancedWeights {
    pub fn new(cost: Decimal, time: Decimal) -> Result<Self, RouteError> {
        if cost.is_sign_negative() || time.is_sign_negative() {
            return Err(RouteError::InvalidWeights(format!(
                "weights must be non-negative (cost {cost}, time {time})"
            )));
        }
        if cost.is_zero() && time.is_zero() {
            return Err(RouteError::InvalidWeights("at least one weight must be positive".to_string()));
        }
        Ok(Self { cost, time })
    }

    /// Convenience for configuration values
    pub fn from_f64(cost: f64, time: f64) -> Result<Self, RouteError> {
        let convert = |v: f64| {
            Decimal::try_from(v).map_err(|e| RouteError::InvalidWeights(format!("{v}: {e}")))
        };
        Self::new(convert(cost)?, convert(time)?)
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    pub fn time(&self) -> Decimal {
        self.time
    }
}

impl Default for BalancedWeights {
    fn default() -> Self {
        let half = Decimal::new(5, 1);
        Self { cost: half, time: half }
    }
}

/// One scoring strategy per optimization objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteStrategy {
    /// Transit hours, then cost
    Fastest,
    /// Cost, then transit hours
    Cheapest,
    /// Weighted normalized cost and time, then cost, then transit hours
    Balanced(BalancedWeights),
}

impl RouteStrategy {
    pub fn for_objective(objective: RouteOptimization, weights: BalancedWeights) -> Self {
        match objective {
            RouteOptimization::Fastest => RouteStrategy::Fastest,
            RouteOptimization::Cheapest => RouteStrategy::Cheapest,
            RouteOptimization::Balanced => RouteStrategy::Balanced(weights),
        }
    }

    pub fn objective(&self) -> RouteOptimization {
        match self {
            RouteStrategy::Fastest => RouteOptimization::Fastest,
            RouteStrategy::Cheapest => RouteOptimization::Cheapest,
            RouteStrategy::Balanced(_) => RouteOptimization::Balanced,
        }
    }

    /// Score every candidate and sort best first
    pub fn rank(&self, mut candidates: Vec<RouteCandidate>) -> Result<Vec<RouteCandidate>, RouteError> {
        if candidates.is_empty() {
            return Err(RouteError::NoCandidates);
        }

        self.score_all(&mut candidates);
        candidates.sort_by(|a, b| self.compare(a, b));
        Ok(candidates)
    }

    /// Total order over scored candidates. Carrier code and service level
    /// settle whatever the objective's own tie-breaks leave open.
    pub fn compare(&self, a: &RouteCandidate, b: &RouteCandidate) -> Ordering {
        let by_cost = || a.cost.cmp(&b.cost);
        let by_time = || a.transit_hours.cmp(&b.transit_hours);

        a.score
            .cmp(&b.score)
            .then_with(|| match self {
                RouteStrategy::Fastest => by_cost(),
                RouteStrategy::Cheapest => by_time(),
                RouteStrategy::Balanced(_) => by_cost().then_with(by_time),
            })
            .then_with(|| a.carrier_code.cmp(&b.carrier_code))
            .then_with(|| a.service_level.cmp(&b.service_level))
    }

    fn score_all(&self, candidates: &mut [RouteCandidate]) {
        match self {
            RouteStrategy::Fastest => {
                for c in candidates.iter_mut() {
                    c.score = Decimal::from(c.transit_hours);
                }
            }
            RouteStrategy::Cheapest => {
                for c in candidates.iter_mut() {
                    c.score = c.cost;
                }
            }
            RouteStrategy::Balanced(weights) => {
                let max_cost = candidates.iter().map(|c| c.cost).max().unwrap_or_default();
                let max_hours = candidates
                    .iter()
                    .map(|c| Decimal::from(c.transit_hours))
                    .max()
                    .unwrap_or_default();

                for c in candidates.iter_mut() {
                    c.score = weights.cost * normalize(c.cost, max_cost)
                        + weights.time * normalize(Decimal::from(c.transit_hours), max_hours);
                }
            }
        }
    }
}

fn normalize(value: Decimal, max: Decimal) -> Decimal {
    if max.is_zero() {
        Decimal::ZERO
    } else {
        value / max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use waybill_catalog::ServiceLevel;

    fn candidate(code: &str, level: ServiceLevel, cost: i64, hours: u32) -> RouteCandidate {
        RouteCandidate {
            carrier_id: Uuid::new_v4(),
            carrier_code: code.to_string(),
            service_level: level,
            cost: Decimal::from(cost),
            transit_hours: hours,
            score: Decimal::ZERO,
        }
    }

    fn codes(ranked: &[RouteCandidate]) -> Vec<&str> {
        ranked.iter().map(|c| c.carrier_code.as_str()).collect()
    }

    #[test]
    fn test_fastest_breaks_ties_on_cost() {
        let ranked = RouteStrategy::Fastest
            .rank(vec![
                candidate("SLOW", ServiceLevel::Economy, 10, 96),
                candidate("PRICEY", ServiceLevel::Express, 120, 24),
                candidate("FAIR", ServiceLevel::Express, 80, 24),
            ])
            .unwrap();

        assert_eq!(codes(&ranked), vec!["FAIR", "PRICEY", "SLOW"]);
        assert_eq!(ranked[0].score, Decimal::from(24));
    }

    #[test]
    fn test_cheapest_breaks_ties_on_time() {
        let ranked = RouteStrategy::Cheapest
            .rank(vec![
                candidate("LATE", ServiceLevel::Economy, 40, 120),
                candidate("SOON", ServiceLevel::Standard, 40, 48),
                candidate("EXPENSIVE", ServiceLevel::Express, 99, 12),
            ])
            .unwrap();

        assert_eq!(codes(&ranked), vec!["SOON", "LATE", "EXPENSIVE"]);
    }

    #[test]
    fn test_balanced_normalizes_against_max() {
        let ranked = RouteStrategy::Balanced(BalancedWeights::default())
            .rank(vec![
                candidate("X", ServiceLevel::Standard, 50, 48),
                candidate("Y", ServiceLevel::Express, 90, 20),
            ])
            .unwrap();

        // Y: 0.5 * 90/90 + 0.5 * 20/48 = 0.7083..., X: 0.5 * 50/90 + 0.5 * 48/48 = 0.7777...
        assert_eq!(codes(&ranked), vec!["Y", "X"]);
        assert_eq!(ranked[0].score.round_dp(4), Decimal::new(7083, 4));
        assert_eq!(ranked[1].score.round_dp(4), Decimal::new(7778, 4));
    }

    #[test]
    fn test_balanced_weights_shift_the_choice() {
        let cost_heavy = BalancedWeights::new(Decimal::new(9, 1), Decimal::new(1, 1)).unwrap();
        let ranked = RouteStrategy::Balanced(cost_heavy)
            .rank(vec![
                candidate("X", ServiceLevel::Standard, 50, 48),
                candidate("Y", ServiceLevel::Express, 90, 20),
            ])
            .unwrap();

        assert_eq!(ranked[0].carrier_code, "X");
    }

    #[test]
    fn test_balanced_handles_zero_maxima() {
        let ranked = RouteStrategy::Balanced(BalancedWeights::default())
            .rank(vec![
                candidate("B", ServiceLevel::Standard, 0, 10),
                candidate("A", ServiceLevel::Standard, 0, 10),
            ])
            .unwrap();

        assert_eq!(codes(&ranked), vec!["A", "B"]);
    }

    #[test]
    fn test_identical_numbers_still_totally_ordered() {
        for strategy in [
            RouteStrategy::Fastest,
            RouteStrategy::Cheapest,
            RouteStrategy::Balanced(BalancedWeights::default()),
        ] {
            let ranked = strategy
                .rank(vec![
                    candidate("ACME", ServiceLevel::Economy, 50, 48),
                    candidate("ACME", ServiceLevel::Standard, 50, 48),
                    candidate("BOLT", ServiceLevel::Express, 50, 48),
                ])
                .unwrap();

            for pair in ranked.windows(2) {
                assert_eq!(strategy.compare(&pair[0], &pair[1]), Ordering::Less);
            }
            assert_eq!(ranked[0].service_level, ServiceLevel::Standard);
        }
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let result = RouteStrategy::Cheapest.rank(Vec::new());
        assert!(matches!(result, Err(RouteError::NoCandidates)));
    }

    #[test]
    fn test_invalid_weights() {
        assert!(BalancedWeights::new(Decimal::ZERO, Decimal::ZERO).is_err());
        assert!(BalancedWeights::from_f64(-0.1, 0.5).is_err());
        assert!(BalancedWeights::from_f64(f64::NAN, 0.5).is_err());
        assert_eq!(BalancedWeights::from_f64(0.5, 0.5).unwrap(), BalancedWeights::default());
    }
}
