pub mod sources;
pub mod normalizer;
pub mod state_machine;
pub mod pipeline;

pub use normalizer::{NormalizeError, TrackingNormalizer, TrackingSource};
pub use state_machine::{Evaluation, RejectedTransition, ShipmentStateMachine, TransitionTable, TransitionTableError};
pub use pipeline::{IngestOutcome, PipelineConfig, Rejection, TrackingError, TrackingPipeline};
