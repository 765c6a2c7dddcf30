//! Persistable slot state, so a host can resume after a restart.
//!
//! A snapshot carries the bound procedure and activation time rather than
//! the timeline itself; the timeline is rebuilt on restore, which yields the
//! identical schedule because construction is pure.

use chrono::{DateTime, Utc};
use rts_types::{ConcreteProcedure, SlotId, SlotStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::{DispatchFailure, ExecutionSlot};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot encoding error: {0}")]
    Binary(#[from] postcard::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub slot: SlotId,
    pub priority: u32,
    pub procedure: ConcreteProcedure,
    pub activation: DateTime<Utc>,
    pub cursor: usize,
    pub status: SlotStatus,
    pub failure: Option<DispatchFailure>,
}

impl SlotSnapshot {
    pub(crate) fn capture(slot: &ExecutionSlot) -> Self {
        Self {
            slot: slot.id(),
            priority: slot.priority(),
            procedure: slot.procedure().clone(),
            activation: slot.activation(),
            cursor: slot.cursor(),
            status: slot.status(),
            failure: slot.failure().cloned(),
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Compact binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(postcard::to_stdvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{AcknowledgingSubsystem, Dispatcher, Scheduler, SchedulerSettings};
    use crate::procedure::{bind, parse_procedure};
    use chrono::{TimeDelta, TimeZone};
    use indexmap::indexmap;
    use std::{sync::Arc, time::Duration};

    const CTI: &str = "\
PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00
PARAM, MODE, ENUM, VALUES=TE|CC, DEFAULT=TE
/CMD, OORMPEN
ACIS, WSPOW0CF3F, MODE=&MODE&, DELTA=00:00:01.000
/CMD, OORMPDS, DELTA=&NUM_HOURS&
ACIS, WSPOW00000, DELTA=00:00:01.000
";

    async fn running_scheduler(start: DateTime<Utc>) -> (Scheduler, SlotId) {
        let procedure = parse_procedure("1_CTI06", CTI).expect("parse");
        let concrete = bind(&procedure, &indexmap! {"NUM_HOURS".into() => "000:04:00:00".into()}).expect("bind");
        let dispatcher = Dispatcher::new(Duration::from_secs(1)).with_fallback(Arc::new(AcknowledgingSubsystem::new()));
        let mut scheduler = Scheduler::new(SchedulerSettings::default(), dispatcher);
        let slot = scheduler.load_into(SlotId(135), concrete, start, None).expect("load");
        scheduler.tick(start + TimeDelta::seconds(1)).await;
        (scheduler, slot)
    }

    #[tokio::test]
    async fn binary_snapshot_restores_identical_remaining_timeline() {
        let start = Utc.with_ymd_and_hms(2017, 9, 8, 20, 45, 0).unwrap();
        let (scheduler, slot) = running_scheduler(start).await;
        let snapshot = scheduler.snapshot(slot).expect("snapshot");
        assert_eq!(snapshot.status, SlotStatus::Running);
        assert_eq!(snapshot.cursor, 2);

        let decoded = SlotSnapshot::from_bytes(&snapshot.to_bytes().expect("encode")).expect("decode");
        assert_eq!(decoded, snapshot);

        let mut restored = Scheduler::new(SchedulerSettings::default(), Dispatcher::new(Duration::from_secs(1)));
        restored.restore(decoded).expect("restore");

        let original = scheduler.slot(slot).expect("original slot");
        let resumed = restored.slot(slot).expect("restored slot");
        assert_eq!(resumed.timeline(), original.timeline());
        assert_eq!(resumed.cursor(), original.cursor());
        assert_eq!(restored.next_due_time(), scheduler.next_due_time());
        assert_eq!(restored.next_due_time(), Some(start + TimeDelta::seconds(1) + TimeDelta::hours(4)));
    }

    #[tokio::test]
    async fn json_snapshot_is_readable() {
        let start = Utc.with_ymd_and_hms(2017, 9, 8, 20, 45, 0).unwrap();
        let (scheduler, slot) = running_scheduler(start).await;
        let json = scheduler.snapshot(slot).expect("snapshot").to_json().expect("json");

        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["slot"], 135);
        assert_eq!(value["status"], "running");
        assert_eq!(SlotSnapshot::from_json(&json).expect("decode").cursor, 2);
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        assert!(matches!(SlotSnapshot::from_bytes(&[0xff, 0xff, 0xff]), Err(SnapshotError::Binary(_))));
    }
}
