//! One running procedure instance.

use chrono::{DateTime, Utc};
use rts_types::{ConcreteProcedure, SlotId, SlotStatus};

use super::{
    events::{DispatchFailure, SlotReport},
    queue::ScheduledEvent,
};
use crate::timeline::{Timeline, TimelineEntry};

/// Holds the timeline, cursor, and status of one loaded procedure.
///
/// The cursor only moves forward and only when the entry under it is
/// acknowledged. A terminal status is final.
#[derive(Debug, Clone)]
pub struct ExecutionSlot {
    id: SlotId,
    priority: u32,
    procedure: ConcreteProcedure,
    timeline: Timeline,
    cursor: usize,
    status: SlotStatus,
    failure: Option<DispatchFailure>,
}

impl ExecutionSlot {
    pub(crate) fn new(id: SlotId, priority: u32, procedure: ConcreteProcedure, timeline: Timeline) -> Self {
        let status = if timeline.is_empty() { SlotStatus::Completed } else { SlotStatus::Loaded };
        Self {
            id,
            priority,
            procedure,
            timeline,
            cursor: 0,
            status,
            failure: None,
        }
    }

    /// Rebuilds a slot at a saved position.
    pub(crate) fn resume(
        id: SlotId,
        priority: u32,
        procedure: ConcreteProcedure,
        timeline: Timeline,
        cursor: usize,
        status: SlotStatus,
        failure: Option<DispatchFailure>,
    ) -> Self {
        Self {
            id,
            priority,
            procedure,
            timeline,
            cursor,
            status,
            failure,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn procedure(&self) -> &ConcreteProcedure {
        &self.procedure
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn activation(&self) -> DateTime<Utc> {
        self.timeline.activation()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&DispatchFailure> {
        self.failure.as_ref()
    }

    /// Entry under the cursor, if the slot is still active.
    pub fn current_entry(&self) -> Option<&TimelineEntry> {
        if self.status.is_terminal() {
            return None;
        }
        self.timeline.get(self.cursor)
    }

    /// Queue event for the entry under the cursor.
    pub fn pending_event(&self) -> Option<ScheduledEvent> {
        self.current_entry().map(|entry| ScheduledEvent {
            at: entry.at,
            priority: self.priority,
            index: entry.index,
            slot: self.id,
        })
    }

    pub fn next_scheduled_time(&self) -> Option<DateTime<Utc>> {
        self.current_entry().map(|entry| entry.at)
    }

    /// Moves `Loaded` to `Running`. Returns true on that transition.
    pub(crate) fn begin(&mut self) -> bool {
        if self.status == SlotStatus::Loaded {
            self.status = SlotStatus::Running;
            return true;
        }
        false
    }

    /// Advances past the acknowledged entry. Returns the next event, or `None`
    /// once the last entry has been acknowledged and the slot is complete.
    pub(crate) fn acknowledge(&mut self) -> Option<ScheduledEvent> {
        self.cursor += 1;
        if self.cursor >= self.timeline.len() {
            self.status = SlotStatus::Completed;
            return None;
        }
        self.pending_event()
    }

    pub(crate) fn fail(&mut self, failure: DispatchFailure) {
        self.status = SlotStatus::Failed;
        self.failure = Some(failure);
    }

    pub(crate) fn abort(&mut self) {
        self.status = SlotStatus::Aborted;
    }

    pub fn report(&self) -> SlotReport {
        SlotReport {
            slot: self.id,
            procedure: self.procedure.identifier.clone(),
            status: self.status,
            cursor: self.cursor,
            next_scheduled_time: self.next_scheduled_time(),
            failure: self.failure.clone(),
        }
    }
}
