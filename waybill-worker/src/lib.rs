pub mod worker;

pub use worker::{run, spawn_notification_logger, WorkerCommand, WorkerContext, WorkerResponse, WorkerStats};
