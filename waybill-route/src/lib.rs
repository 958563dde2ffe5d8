pub mod models;
pub mod strategy;
pub mod optimizer;

pub use models::{RouteCandidate, RouteDecision, RouteOptimization, RouteRequest};
pub use strategy::{BalancedWeights, RouteStrategy};
pub use optimizer::{RouteError, RouteOptimizer};
