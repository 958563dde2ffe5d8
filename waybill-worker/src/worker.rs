use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use waybill_core::CarrierCatalog;
use waybill_route::{RouteDecision, RouteOptimizer, RouteRequest};
use waybill_shared::ShipmentStatusChangedEvent;
use waybill_tracking::{IngestOutcome, TrackingPipeline};

/// One line of worker input
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    Track {
        shipment_id: Uuid,
        #[serde(default)]
        source: String,
        /// Raw carrier payload; JSON payloads may be embedded as-is
        payload: serde_json::Value,
    },
    Optimize(RouteRequest),
}

/// One line of worker output
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WorkerResponse {
    Tracked {
        shipment_id: Uuid,
        outcome: IngestOutcome,
    },
    Routed {
        decision: RouteDecision,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub failed: usize,
}

pub struct WorkerContext {
    pub pipeline: Arc<TrackingPipeline>,
    pub optimizer: RouteOptimizer,
    pub catalog: Arc<dyn CarrierCatalog>,
}

impl WorkerContext {
    pub async fn handle(&self, command: WorkerCommand) -> WorkerResponse {
        match command {
            WorkerCommand::Track {
                shipment_id,
                source,
                payload,
            } => {
                let raw = match payload {
                    serde_json::Value::String(raw) => raw,
                    other => other.to_string(),
                };

                match self.pipeline.ingest_event(shipment_id, &source, &raw).await {
                    Ok(outcome) => WorkerResponse::Tracked { shipment_id, outcome },
                    Err(e) => {
                        error!("Tracking failed for shipment {}: {}", shipment_id, e);
                        WorkerResponse::Error { message: e.to_string() }
                    }
                }
            }
            WorkerCommand::Optimize(request) => {
                match self.optimizer.optimize_lane(self.catalog.as_ref(), &request).await {
                    Ok(decision) => {
                        match serde_json::to_string(&decision.to_event()) {
                            Ok(event) => debug!("route.selected {}", event),
                            Err(e) => warn!("Failed to serialize route event for decision {}: {}", decision.id, e),
                        }
                        WorkerResponse::Routed { decision }
                    }
                    Err(e) => {
                        warn!("Route optimization failed: {}", e);
                        WorkerResponse::Error { message: e.to_string() }
                    }
                }
            }
        }
    }
}

/// Process newline-delimited JSON commands until the reader is exhausted,
/// writing one JSON response per command.
pub async fn run<R, W>(reader: R, mut writer: W, ctx: &WorkerContext) -> anyhow::Result<WorkerStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = WorkerStats::default();

    info!("Worker started, reading commands...");

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<WorkerCommand>(input) {
            Ok(command) => ctx.handle(command).await,
            Err(e) => {
                warn!("Invalid command: {}", e);
                WorkerResponse::Error {
                    message: format!("invalid command: {e}"),
                }
            }
        };

        stats.processed += 1;
        if matches!(response, WorkerResponse::Error { .. }) {
            stats.failed += 1;
        }

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    info!("Input closed after {} commands ({} failed)", stats.processed, stats.failed);
    Ok(stats)
}

/// Log every status transition published on the channel
pub fn spawn_notification_logger(
    mut rx: broadcast::Receiver<ShipmentStatusChangedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(
                    "Shipment {} changed {} -> {}",
                    event.shipment_id, event.old_status, event.new_status
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Notification logger lagged, {} events skipped", skipped)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
