use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waybill_route::{BalancedWeights, RouteOptimizer};
use waybill_store::{app_config::Config, InMemoryCarrierCatalog, InMemoryTimelineRepository, StatusBroadcaster};
use waybill_tracking::{PipelineConfig, ShipmentStateMachine, TrackingPipeline, TransitionTable};
use waybill_worker::{run, spawn_notification_logger, WorkerContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries responses
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waybill_worker=debug,waybill_tracking=info,waybill_route=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Waybill worker with catalog {}", config.catalog.path);

    let catalog = Arc::new(InMemoryCarrierCatalog::from_json_file(&config.catalog.path).await?);
    let weights = BalancedWeights::from_f64(config.routing.cost_weight, config.routing.time_weight)?;

    let broadcaster = StatusBroadcaster::new(config.worker.notification_capacity);
    let logger = spawn_notification_logger(broadcaster.subscribe());

    let pipeline = TrackingPipeline::new(Arc::new(InMemoryTimelineRepository::new()), Arc::new(broadcaster))
        .with_state_machine(ShipmentStateMachine::new(TransitionTable::standard(
            config.tracking.allow_skipped_statuses,
        )))
        .with_config(PipelineConfig {
            max_recorded_rejections: config.tracking.max_recorded_rejections,
            max_cached_shipments: config.tracking.max_cached_shipments,
        });

    let ctx = WorkerContext {
        pipeline: Arc::new(pipeline),
        optimizer: RouteOptimizer::new(weights),
        catalog,
    };

    let stats = run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), &ctx).await?;

    // Dropping the pipeline drops the last sender so the logger drains and exits
    drop(ctx);
    logger.await?;

    tracing::info!("Worker finished: {} processed, {} failed", stats.processed, stats.failed);
    Ok(())
}
