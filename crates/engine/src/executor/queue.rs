//! Time-ordered queue of pending command releases.

use std::{cmp::Reverse, collections::BinaryHeap};

use chrono::{DateTime, Utc};
use rts_types::SlotId;

/// Next entry of one slot waiting to be released.
///
/// The derived ordering compares fields in declaration order: earliest time
/// first, then lower priority number, then lower entry index. The slot id
/// comes last and only separates events equal on all three, so release order
/// never depends on insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduledEvent {
    pub at: DateTime<Utc>,
    pub priority: u32,
    pub index: usize,
    pub slot: SlotId,
}

/// Min-heap of [`ScheduledEvent`]s. Each slot keeps at most one event queued.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
}

impl EventQueue {
    pub fn push(&mut self, event: ScheduledEvent) {
        self.heap.push(Reverse(event));
    }

    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.heap.peek().map(|Reverse(event)| event)
    }

    /// Removes and returns the head if it is due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ScheduledEvent> {
        if self.peek()?.at > now {
            return None;
        }
        self.heap.pop().map(|Reverse(event)| event)
    }

    /// Drops every event belonging to `slot`, returning how many were removed.
    pub fn remove_slot(&mut self, slot: SlotId) -> usize {
        let before = self.heap.len();
        self.heap.retain(|Reverse(event)| event.slot != slot);
        before - self.heap.len()
    }

    pub fn contains_slot(&self, slot: SlotId) -> bool {
        self.heap.iter().any(|Reverse(event)| event.slot == slot)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
