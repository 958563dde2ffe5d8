use crate::normalizer::{NormalizeError, TrackingNormalizer};
use crate::state_machine::{Evaluation, RejectedTransition, ShipmentStateMachine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use waybill_core::{
    PortError, ShipmentStatus, ShipmentTimeline, StatusNotifier, TimelineRepository, TrackingEvent,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rejections kept per shipment for operational lookups; oldest dropped first
    pub max_recorded_rejections: usize,
    /// Idle shipments beyond this many are evicted, least recently used first
    pub max_cached_shipments: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_recorded_rejections: 64,
            max_cached_shipments: 1024,
        }
    }
}

/// What happened to one ingested event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Accepted {
        event: TrackingEvent,
        position: usize,
        previous_status: ShipmentStatus,
        status: ShipmentStatus,
    },
    Duplicate {
        event: TrackingEvent,
    },
    Rejected {
        event: TrackingEvent,
        reason: RejectedTransition,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }

    pub fn event(&self) -> &TrackingEvent {
        match self {
            IngestOutcome::Accepted { event, .. }
            | IngestOutcome::Duplicate { event }
            | IngestOutcome::Rejected { event, .. } => event,
        }
    }

    pub fn status_changed(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { previous_status, status, .. } if previous_status != status)
    }
}

/// A report the state machine declined
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub event: TrackingEvent,
    pub reason: RejectedTransition,
    pub recorded_at: DateTime<Utc>,
}

/// Per-shipment state guarded by the shipment's lock.
///
/// `timeline` is `None` until first loaded, and is taken out while a
/// persistence call is in flight: if that call fails or the ingesting task
/// is cancelled, the next caller reloads from the repository instead of
/// trusting a cache that may disagree with durable state.
#[derive(Default)]
struct ShipmentSlot {
    timeline: Option<ShipmentTimeline>,
    rejections: VecDeque<Rejection>,
}

impl ShipmentSlot {
    fn record_rejection(&mut self, rejection: Rejection, limit: usize) {
        if limit == 0 {
            return;
        }
        while self.rejections.len() >= limit {
            self.rejections.pop_front();
        }
        self.rejections.push_back(rejection);
    }
}

type SlotHandle = Arc<tokio::sync::Mutex<ShipmentSlot>>;

struct SlotEntry {
    slot: SlotHandle,
    last_used: u64,
}

impl SlotEntry {
    // Handles are only cloned under the table lock, so a count of one means idle
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.slot) == 1
    }
}

/// Cached shipment slots with least-recently-used eviction of idle entries
#[derive(Default)]
struct SlotTable {
    entries: HashMap<Uuid, SlotEntry>,
    clock: u64,
}

impl SlotTable {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn checkout(&mut self, shipment_id: Uuid) -> SlotHandle {
        let now = self.tick();
        let entry = self.entries.entry(shipment_id).or_insert_with(|| SlotEntry {
            slot: SlotHandle::default(),
            last_used: now,
        });
        entry.last_used = now;
        entry.slot.clone()
    }

    fn get(&mut self, shipment_id: Uuid) -> Option<SlotHandle> {
        let now = self.tick();
        let entry = self.entries.get_mut(&shipment_id)?;
        entry.last_used = now;
        Some(entry.slot.clone())
    }

    fn remove_idle(&mut self, shipment_id: Uuid) -> Option<SlotHandle> {
        if self.entries.get(&shipment_id)?.is_idle() {
            self.entries.remove(&shipment_id).map(|entry| entry.slot)
        } else {
            None
        }
    }

    /// Evict idle entries, oldest first, until at most `capacity` remain.
    /// Busy entries are never evicted, so the table may stay above capacity.
    fn evict_idle(&mut self, capacity: usize) -> Vec<(Uuid, SlotHandle)> {
        let mut evicted = Vec::new();
        if self.entries.len() <= capacity {
            return evicted;
        }

        let mut idle: Vec<(u64, Uuid)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_idle())
            .map(|(id, entry)| (entry.last_used, *id))
            .collect();
        idle.sort_unstable();

        for (_, shipment_id) in idle {
            if self.entries.len() <= capacity {
                break;
            }
            if let Some(entry) = self.entries.remove(&shipment_id) {
                evicted.push((shipment_id, entry.slot));
            }
        }
        evicted
    }
}

/// Number of rejections held by a slot nobody else can reach any more
fn dropped_rejections(slot: &SlotHandle) -> usize {
    slot.try_lock().map_or(0, |slot| slot.rejections.len())
}

/// Ingests raw carrier events into per-shipment timelines.
///
/// All work for one shipment id is serialized behind that shipment's lock;
/// different shipments proceed in parallel. Up to `max_cached_shipments`
/// idle shipments stay cached; the rest are reloaded from the repository
/// when next touched.
pub struct TrackingPipeline {
    normalizer: TrackingNormalizer,
    machine: ShipmentStateMachine,
    repository: Arc<dyn TimelineRepository>,
    notifier: Arc<dyn StatusNotifier>,
    config: PipelineConfig,
    slots: parking_lot::Mutex<SlotTable>,
}

impl TrackingPipeline {
    pub fn new(repository: Arc<dyn TimelineRepository>, notifier: Arc<dyn StatusNotifier>) -> Self {
        Self {
            normalizer: TrackingNormalizer::new(),
            machine: ShipmentStateMachine::default(),
            repository,
            notifier,
            config: PipelineConfig::default(),
            slots: parking_lot::Mutex::new(SlotTable::default()),
        }
    }

    pub fn with_state_machine(mut self, machine: ShipmentStateMachine) -> Self {
        self.machine = machine;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Normalize a raw payload and apply it to the shipment's timeline.
    ///
    /// Returns only after the accepted event is durable and, for status
    /// transitions, the notifier has been called.
    pub async fn ingest_event(
        &self,
        shipment_id: Uuid,
        source_id: &str,
        raw_payload: &str,
    ) -> Result<IngestOutcome, TrackingError> {
        let event = self
            .normalizer
            .normalize(shipment_id, source_id, raw_payload, Utc::now())
            .map_err(|e| {
                warn!("Discarding tracking payload for shipment {} from {}: {}", shipment_id, source_id, e);
                e
            })?;

        self.apply_event(event).await
    }

    /// Apply an already-normalized event.
    ///
    /// `ingested_at` is restamped under the shipment lock so that it is
    /// later than every event already on the timeline; the returned outcome
    /// carries the stamped event.
    pub async fn apply_event(&self, event: TrackingEvent) -> Result<IngestOutcome, TrackingError> {
        let shipment_id = event.shipment_id;
        let slot = self.slots.lock().checkout(shipment_id);

        let result = {
            let mut guard = slot.lock().await;
            self.apply_locked(&mut guard, event).await
        };

        drop(slot);
        self.evict_idle();
        result
    }

    async fn apply_locked(
        &self,
        slot: &mut ShipmentSlot,
        mut event: TrackingEvent,
    ) -> Result<IngestOutcome, TrackingError> {
        let shipment_id = event.shipment_id;

        let mut timeline = match slot.timeline.take() {
            Some(timeline) => timeline,
            None => self.load(shipment_id).await?,
        };
        event.ingested_at = timeline.next_ingested_at(event.ingested_at);

        match self.machine.evaluate(&timeline, &event) {
            Evaluation::Duplicate => {
                debug!("Duplicate {:?} for shipment {} ignored", event.event_type(), shipment_id);
                slot.timeline = Some(timeline);
                Ok(IngestOutcome::Duplicate { event })
            }
            Evaluation::Rejected(reason) => {
                warn!("Rejected tracking event {} for shipment {}: {}", event.id, shipment_id, reason);
                slot.record_rejection(
                    Rejection {
                        event: event.clone(),
                        reason: reason.clone(),
                        recorded_at: Utc::now(),
                    },
                    self.config.max_recorded_rejections,
                );
                slot.timeline = Some(timeline);
                Ok(IngestOutcome::Rejected { event, reason })
            }
            Evaluation::Accepted {
                position,
                previous_status,
                status,
            } => {
                if let Err(e) = self.repository.append_timeline_event(shipment_id, &event).await {
                    // Slot stays empty: the repository decides what the timeline is on next access
                    error!("Failed to persist tracking event {} for shipment {}: {}", event.id, shipment_id, e);
                    return Err(TrackingError::Persistence(e));
                }

                timeline.insert(event.clone());
                slot.timeline = Some(timeline);

                if event.status().is_some() && previous_status != status {
                    info!("Shipment {} status {} -> {}", shipment_id, previous_status, status);
                    self.notifier
                        .on_status_changed(shipment_id, previous_status, status, event.occurred_at)
                        .await
                        .map_err(|e| {
                            error!(
                                "Status notification failed for shipment {} ({} -> {}): {}",
                                shipment_id, previous_status, status, e
                            );
                            TrackingError::Notification(e)
                        })?;
                } else {
                    debug!("Shipment {} location updated at position {}", shipment_id, position);
                }

                Ok(IngestOutcome::Accepted {
                    event,
                    position,
                    previous_status,
                    status,
                })
            }
        }
    }

    /// Snapshot of the shipment's timeline.
    /// Shipments that are not cached are read straight from the repository.
    pub async fn timeline(&self, shipment_id: Uuid) -> Result<ShipmentTimeline, TrackingError> {
        let cached = self.slots.lock().get(shipment_id);
        let Some(slot) = cached else {
            return self.load(shipment_id).await;
        };
        let mut slot = slot.lock().await;

        if slot.timeline.is_none() {
            slot.timeline = Some(self.load(shipment_id).await?);
        }
        Ok(slot
            .timeline
            .clone()
            .unwrap_or_else(|| ShipmentTimeline::new(shipment_id)))
    }

    pub async fn current_status(&self, shipment_id: Uuid) -> Result<ShipmentStatus, TrackingError> {
        Ok(self.timeline(shipment_id).await?.current_status())
    }

    /// Most recent rejections recorded for the shipment, oldest first.
    ///
    /// The log lives with the cached shipment: it is discarded when the
    /// shipment is released or evicted from the cache.
    pub async fn rejections(&self, shipment_id: Uuid) -> Vec<Rejection> {
        let cached = self.slots.lock().get(shipment_id);
        let Some(slot) = cached else {
            return Vec::new();
        };
        let slot = slot.lock().await;
        slot.rejections.iter().cloned().collect()
    }

    /// Number of shipments with cached state
    pub fn tracked_shipments(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// Drop cached state, rejection log included, for a shipment nobody is
    /// currently working on. Returns false when the shipment is busy or unknown.
    pub fn release(&self, shipment_id: Uuid) -> bool {
        let removed = self.slots.lock().remove_idle(shipment_id);
        let Some(slot) = removed else {
            return false;
        };
        debug!(
            "Released shipment {} ({} recorded rejections dropped)",
            shipment_id,
            dropped_rejections(&slot)
        );
        true
    }

    fn evict_idle(&self) {
        let evicted = self.slots.lock().evict_idle(self.config.max_cached_shipments);
        for (shipment_id, slot) in evicted {
            debug!(
                "Evicted shipment {} from cache ({} recorded rejections dropped)",
                shipment_id,
                dropped_rejections(&slot)
            );
        }
    }

    async fn load(&self, shipment_id: Uuid) -> Result<ShipmentTimeline, TrackingError> {
        let events = self.repository.load_timeline(shipment_id).await.map_err(|e| {
            error!("Failed to load timeline for shipment {}: {}", shipment_id, e);
            TrackingError::Persistence(e)
        })?;
        debug!("Loaded {} timeline events for shipment {}", events.len(), shipment_id);
        Ok(ShipmentTimeline::from_events(shipment_id, events))
    }
}

/// Tracking pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Timeline persistence failed: {0}")]
    Persistence(#[source] PortError),

    /// The event is durable; only the notification was lost
    #[error("Status notification failed: {0}")]
    Notification(#[source] PortError),
}
