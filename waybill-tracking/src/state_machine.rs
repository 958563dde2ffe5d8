use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use waybill_core::{ExceptionKind, ShipmentStatus, ShipmentTimeline, TrackingEvent, TrackingPayload};

/// Allowed status edges. Must form a DAG whose sinks are the terminal statuses.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: HashMap<ShipmentStatus, Vec<ShipmentStatus>>,
    /// Accept any status reachable through the graph, not only direct successors.
    /// Carriers routinely skip scans (no pickup scan before the first hub scan).
    allow_skips: bool,
}

impl TransitionTable {
    /// Build a table from explicit edges
    pub fn new(
        edges: impl IntoIterator<Item = (ShipmentStatus, ShipmentStatus)>,
        allow_skips: bool,
    ) -> Result<Self, TransitionTableError> {
        let mut map: HashMap<ShipmentStatus, Vec<ShipmentStatus>> = HashMap::new();

        for (from, to) in edges {
            if from.is_terminal() {
                return Err(TransitionTableError::TerminalHasSuccessor(from));
            }
            if !to.is_reportable() {
                return Err(TransitionTableError::UnreportableTarget(to));
            }
            let successors = map.entry(from).or_default();
            if !successors.contains(&to) {
                successors.push(to);
            }
        }

        let table = Self { edges: map, allow_skips };
        table.check_acyclic()?;
        Ok(table)
    }

    /// Created → PickedUp → InTransit → OutForDelivery → Delivered, with
    /// every non-terminal status able to fall into any exception.
    pub fn standard(allow_skips: bool) -> Self {
        use ShipmentStatus::*;

        let happy_path = [
            (Unknown, Created),
            (Created, PickedUp),
            (PickedUp, InTransit),
            (InTransit, OutForDelivery),
            (OutForDelivery, Delivered),
        ];
        let exceptions = [Created, PickedUp, InTransit, OutForDelivery].into_iter().flat_map(|from| {
            ExceptionKind::ALL
                .into_iter()
                .map(move |kind| (from, Exception(kind)))
        });

        let mut edges: HashMap<ShipmentStatus, Vec<ShipmentStatus>> = HashMap::new();
        for (from, to) in happy_path.into_iter().chain(exceptions) {
            edges.entry(from).or_default().push(to);
        }

        Self { edges, allow_skips }
    }

    pub fn allow_skips(&self) -> bool {
        self.allow_skips
    }

    pub fn successors(&self, from: ShipmentStatus) -> &[ShipmentStatus] {
        self.edges.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn allows(&self, from: ShipmentStatus, to: ShipmentStatus) -> bool {
        if self.allow_skips {
            self.reachable(from, to)
        } else {
            self.successors(from).contains(&to)
        }
    }

    /// Next status after `event` from `current`, and whether the move is allowed.
    /// Location reports are always accepted and never move the status.
    pub fn apply(&self, current: ShipmentStatus, event: &TrackingEvent) -> (ShipmentStatus, bool) {
        match event.payload {
            TrackingPayload::LocationUpdated(_) => (current, true),
            TrackingPayload::StatusChanged(to) if self.allows(current, to) => (to, true),
            TrackingPayload::StatusChanged(_) => (current, false),
        }
    }

    fn reachable(&self, from: ShipmentStatus, to: ShipmentStatus) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();

        while let Some(status) = stack.pop() {
            for &next in self.successors(status) {
                if next == to {
                    return true;
                }
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    fn check_acyclic(&self) -> Result<(), TransitionTableError> {
        for &start in self.edges.keys() {
            if self.reachable(start, start) {
                return Err(TransitionTableError::Cycle(start));
            }
        }
        Ok(())
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionTableError {
    #[error("Transition graph has a cycle through {0}")]
    Cycle(ShipmentStatus),

    #[error("Terminal status {0} cannot have successors")]
    TerminalHasSuccessor(ShipmentStatus),

    #[error("Status {0} cannot be a transition target")]
    UnreportableTarget(ShipmentStatus),
}

/// Why a report was not applied. Returned as a value, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectedTransition {
    #[error("Transition {from} -> {to} is not allowed")]
    Unreachable { from: ShipmentStatus, to: ShipmentStatus },

    #[error("Shipment is already {current}; no status may follow")]
    Terminal { current: ShipmentStatus, to: ShipmentStatus },

    #[error("{to} reported at {reported_at} is older than the latest status report at {latest_at}")]
    Stale {
        to: ShipmentStatus,
        reported_at: DateTime<Utc>,
        latest_at: DateTime<Utc>,
    },
}

/// Result of evaluating one event against a shipment's timeline
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Already on the timeline; nothing to do
    Duplicate,
    /// Insert at `position`; `status == previous_status` for location reports
    Accepted {
        position: usize,
        previous_status: ShipmentStatus,
        status: ShipmentStatus,
    },
    Rejected(RejectedTransition),
}

impl Evaluation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Evaluation::Accepted { .. })
    }
}

/// Applies canonical events to a shipment timeline
#[derive(Debug, Clone, Default)]
pub struct ShipmentStateMachine {
    table: TransitionTable,
}

impl ShipmentStateMachine {
    pub fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn apply(&self, current: ShipmentStatus, event: &TrackingEvent) -> (ShipmentStatus, bool) {
        self.table.apply(current, event)
    }

    /// Decide what to do with `event` given everything accepted so far.
    ///
    /// Order of checks: duplicate occurrence, location report, stale status
    /// report, terminal status, transition table. Pure; the caller applies
    /// the outcome.
    pub fn evaluate(&self, timeline: &ShipmentTimeline, event: &TrackingEvent) -> Evaluation {
        if timeline.contains_occurrence(event) {
            return Evaluation::Duplicate;
        }

        let position = timeline.position_for(event);

        let Some(to) = event.status() else {
            let current = timeline.current_status();
            return Evaluation::Accepted {
                position,
                previous_status: current,
                status: current,
            };
        };

        // A status report ordering before the newest accepted one would be
        // inserted behind it and rewrite history.
        if let Some(latest) = timeline.latest_status_event() {
            if (event.occurred_at, event.ingested_at) < (latest.occurred_at, latest.ingested_at) {
                return Evaluation::Rejected(RejectedTransition::Stale {
                    to,
                    reported_at: event.occurred_at,
                    latest_at: latest.occurred_at,
                });
            }
        }

        let prior = timeline.status_at(event.occurred_at);
        if prior.is_terminal() {
            return Evaluation::Rejected(RejectedTransition::Terminal { current: prior, to });
        }

        match self.table.apply(prior, event) {
            (status, true) => Evaluation::Accepted {
                position,
                previous_status: prior,
                status,
            },
            (_, false) => Evaluation::Rejected(RejectedTransition::Unreachable { from: prior, to }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;
    use waybill_core::Location;
    use ShipmentStatus::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn status_event(shipment_id: Uuid, hour: u32, status: ShipmentStatus) -> TrackingEvent {
        TrackingEvent::new(shipment_id, "canonical", at(hour), at(hour), TrackingPayload::StatusChanged(status))
    }

    fn location_event(shipment_id: Uuid, hour: u32) -> TrackingEvent {
        let location = Location { city: Some("Toledo".to_string()), ..Default::default() };
        TrackingEvent::new(shipment_id, "canonical", at(hour), at(hour), TrackingPayload::LocationUpdated(location))
    }

    fn timeline_of(shipment_id: Uuid, steps: &[(u32, ShipmentStatus)]) -> ShipmentTimeline {
        ShipmentTimeline::from_events(
            shipment_id,
            steps.iter().map(|&(h, s)| status_event(shipment_id, h, s)).collect(),
        )
    }

    #[test]
    fn test_apply_follows_edges() {
        let table = TransitionTable::standard(false);
        let id = Uuid::new_v4();

        assert_eq!(table.apply(Unknown, &status_event(id, 8, Created)), (Created, true));
        assert_eq!(table.apply(Created, &status_event(id, 8, PickedUp)), (PickedUp, true));
        // Direct edges only
        assert_eq!(table.apply(Created, &status_event(id, 8, InTransit)), (Created, false));
        assert_eq!(table.apply(InTransit, &status_event(id, 8, PickedUp)), (InTransit, false));
        assert_eq!(table.apply(Delivered, &location_event(id, 8)), (Delivered, true));
    }

    #[test]
    fn test_skips_allowed_by_default() {
        let table = TransitionTable::default();

        assert!(table.allows(Unknown, InTransit));
        assert!(table.allows(Created, Delivered));
        assert!(table.allows(Unknown, Exception(ExceptionKind::Lost)));
        assert!(!table.allows(OutForDelivery, PickedUp));
        assert!(!table.allows(InTransit, InTransit));
        assert!(!table.allows(Delivered, Exception(ExceptionKind::Damaged)));
        assert!(!table.allows(Created, Unknown));
    }

    #[test]
    fn test_custom_tables_validated() {
        assert!(matches!(
            TransitionTable::new([(Created, PickedUp), (PickedUp, Created)], true),
            Err(TransitionTableError::Cycle(_))
        ));
        assert!(matches!(
            TransitionTable::new([(Delivered, InTransit)], true),
            Err(TransitionTableError::TerminalHasSuccessor(Delivered))
        ));

        let short = TransitionTable::new([(Unknown, Created), (Created, Delivered)], false).unwrap();
        assert!(short.allows(Created, Delivered));
        assert!(!short.allows(Created, PickedUp));
    }

    #[test]
    fn test_stale_status_rejected() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let timeline = timeline_of(id, &[(8, Created), (9, PickedUp), (12, Delivered)]);

        let late = status_event(id, 10, InTransit);
        match machine.evaluate(&timeline, &late) {
            Evaluation::Rejected(RejectedTransition::Stale { to, latest_at, .. }) => {
                assert_eq!(to, InTransit);
                assert_eq!(latest_at, at(12));
            }
            other => panic!("expected stale rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_same_timestamp_ingested_earlier_is_stale() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let mut created = status_event(id, 8, Created);
        created.ingested_at = at(8) + chrono::Duration::seconds(5);
        let timeline = ShipmentTimeline::from_events(id, vec![created]);

        let mut picked_up = status_event(id, 8, PickedUp);
        picked_up.ingested_at = at(8) + chrono::Duration::seconds(1);

        assert!(matches!(
            machine.evaluate(&timeline, &picked_up),
            Evaluation::Rejected(RejectedTransition::Stale { to: PickedUp, .. })
        ));

        picked_up.ingested_at = timeline.next_ingested_at(picked_up.ingested_at);
        assert_eq!(
            machine.evaluate(&timeline, &picked_up),
            Evaluation::Accepted { position: 1, previous_status: Created, status: PickedUp }
        );
    }

    #[test]
    fn test_terminal_rejects_later_reports() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let timeline = timeline_of(id, &[(8, Created), (12, Delivered)]);

        let evaluation = machine.evaluate(&timeline, &status_event(id, 13, Exception(ExceptionKind::Lost)));
        assert!(matches!(
            evaluation,
            Evaluation::Rejected(RejectedTransition::Terminal { current: Delivered, .. })
        ));
    }

    #[test]
    fn test_backwards_report_rejected() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let timeline = timeline_of(id, &[(8, Created), (10, OutForDelivery)]);

        let evaluation = machine.evaluate(&timeline, &status_event(id, 11, InTransit));
        assert_eq!(
            evaluation,
            Evaluation::Rejected(RejectedTransition::Unreachable { from: OutForDelivery, to: InTransit })
        );
    }

    #[test]
    fn test_duplicate_detected_before_transition_table() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let timeline = timeline_of(id, &[(8, Created), (12, Delivered)]);

        // Same occurrence, re-delivered later by another channel
        let mut again = status_event(id, 12, Delivered);
        again.ingested_at = at(18);
        again.source_id = "parceljet".to_string();

        assert_eq!(machine.evaluate(&timeline, &again), Evaluation::Duplicate);
    }

    #[test]
    fn test_location_accepted_anywhere() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let timeline = timeline_of(id, &[(8, Created), (12, Delivered)]);

        assert_eq!(
            machine.evaluate(&timeline, &location_event(id, 10)),
            Evaluation::Accepted { position: 1, previous_status: Delivered, status: Delivered }
        );
    }

    #[test]
    fn test_status_after_later_location_is_positioned() {
        let id = Uuid::new_v4();
        let machine = ShipmentStateMachine::default();
        let mut timeline = timeline_of(id, &[(8, Created)]);
        timeline.insert(location_event(id, 11));

        assert_eq!(
            machine.evaluate(&timeline, &status_event(id, 10, PickedUp)),
            Evaluation::Accepted { position: 1, previous_status: Created, status: PickedUp }
        );
    }
}
