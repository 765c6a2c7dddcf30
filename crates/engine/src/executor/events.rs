//! Observable scheduler output: lifecycle events, tick reports, and slot status.

use chrono::{DateTime, Utc};
use rts_types::{DispatchResult, SlotId, SlotStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a slot entered [`SlotStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("slot {slot} entry {entry} ({mnemonic}) {reason} after {attempts} attempt(s)")]
pub struct DispatchFailure {
    pub slot: SlotId,
    /// Zero-based entry index.
    pub entry: usize,
    pub mnemonic: String,
    pub reason: DispatchResult,
    pub attempts: u32,
}

/// Lifecycle notifications, emitted in the order they happen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    SlotLoaded {
        slot: SlotId,
        procedure: String,
        activation: DateTime<Utc>,
        entries: usize,
    },
    SlotStarted {
        slot: SlotId,
    },
    CommandDispatched {
        slot: SlotId,
        entry: usize,
        target: String,
        mnemonic: String,
        scheduled: DateTime<Utc>,
        released: DateTime<Utc>,
        result: DispatchResult,
        attempts: u32,
    },
    SlotCompleted {
        slot: SlotId,
    },
    SlotFailed {
        failure: DispatchFailure,
    },
    SlotAborted {
        slot: SlotId,
        cursor: usize,
    },
}

impl SchedulerEvent {
    pub fn slot(&self) -> SlotId {
        match self {
            SchedulerEvent::SlotLoaded { slot, .. }
            | SchedulerEvent::SlotStarted { slot }
            | SchedulerEvent::CommandDispatched { slot, .. }
            | SchedulerEvent::SlotCompleted { slot }
            | SchedulerEvent::SlotAborted { slot, .. } => *slot,
            SchedulerEvent::SlotFailed { failure } => failure.slot,
        }
    }
}

/// Everything that happened during one [`Scheduler::tick`](super::Scheduler::tick).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub events: Vec<SchedulerEvent>,
}

impl TickReport {
    /// `(slot, mnemonic)` of every released command, in release order.
    pub fn dispatched(&self) -> Vec<(SlotId, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SchedulerEvent::CommandDispatched { slot, mnemonic, .. } => Some((*slot, mnemonic.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchFailure> {
        self.events.iter().filter_map(|event| match event {
            SchedulerEvent::SlotFailed { failure } => Some(failure),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub slot: SlotId,
    pub procedure: String,
    pub status: SlotStatus,
    /// Index of the next entry to release; equals the entry count once complete.
    pub cursor: usize,
    pub next_scheduled_time: Option<DateTime<Utc>>,
    pub failure: Option<DispatchFailure>,
}
