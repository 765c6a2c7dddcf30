//! Event-driven scheduler over any number of execution slots.
//!
//! Every loaded slot contributes at most one event to a single time-ordered
//! queue: the entry under its cursor. `tick` pops due events in
//! (time, priority, slot, index) order, awaits the dispatcher, and on
//! acknowledgement pushes the slot's next pre-computed event. Because the next
//! event is queued before the loop looks at the heap again, a single tick far
//! in the future still releases everything in global time order.

use std::collections::{BTreeMap, btree_map::Entry};

use chrono::{DateTime, Utc};
use rts_types::{ConcreteProcedure, SlotId, SlotStatus};
use rts_util::{EngineSettings, SlotRange};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::{
    dispatcher::Dispatcher,
    events::{DispatchFailure, SchedulerEvent, SlotReport, TickReport},
    queue::{EventQueue, ScheduledEvent},
    slot::ExecutionSlot,
};
use crate::{
    error::LoadError,
    procedure::validate,
    snapshot::SlotSnapshot,
    timeline::{Timeline, TimelineError, build_timeline},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("slot {0} is not loaded")]
    UnknownSlot(SlotId),
    #[error("slot {slot} has already finished ({status})")]
    SlotTerminal { slot: SlotId, status: SlotStatus },
    #[error("slot {slot} is still {status}")]
    SlotActive { slot: SlotId, status: SlotStatus },
    #[error("internal scheduler invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub slot_range: SlotRange,
    /// Priority used when a load does not name one. Lower runs first on ties.
    pub default_priority: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for SchedulerSettings {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            slot_range: settings.slot_range,
            default_priority: settings.default_priority,
        }
    }
}

#[derive(Debug)]
pub struct Scheduler {
    settings: SchedulerSettings,
    dispatcher: Dispatcher,
    slots: BTreeMap<SlotId, ExecutionSlot>,
    queue: EventQueue,
    events: Option<UnboundedSender<SchedulerEvent>>,
}

impl Scheduler {
    pub fn new(settings: SchedulerSettings, dispatcher: Dispatcher) -> Self {
        Self {
            settings,
            dispatcher,
            slots: BTreeMap::new(),
            queue: EventQueue::default(),
            events: None,
        }
    }

    pub fn from_settings(settings: &EngineSettings, dispatcher: Dispatcher) -> Self {
        Self::new(SchedulerSettings::from(settings), dispatcher)
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Streams every subsequent [`SchedulerEvent`]. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SchedulerEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    /// Loads `procedure` into the lowest free slot number.
    ///
    /// The procedure is validated again and its timeline built before any slot
    /// is taken, so a failed load leaves the scheduler untouched.
    pub fn load(
        &mut self,
        procedure: ConcreteProcedure,
        activation: DateTime<Utc>,
        priority: Option<u32>,
    ) -> Result<SlotId, LoadError> {
        let timeline = prepare(&procedure, activation)?;
        let slot = self.allocate()?;
        self.admit(slot, procedure, timeline, priority)
    }

    /// Loads `procedure` into a specific slot number.
    pub fn load_into(
        &mut self,
        slot: SlotId,
        procedure: ConcreteProcedure,
        activation: DateTime<Utc>,
        priority: Option<u32>,
    ) -> Result<SlotId, LoadError> {
        self.ensure_free(slot)?;
        let timeline = prepare(&procedure, activation)?;
        self.admit(slot, procedure, timeline, priority)
    }

    /// Releases every event due at or before `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        while let Some(event) = self.queue.pop_due(now) {
            self.release(event, now, &mut report).await;
        }
        if !report.is_empty() {
            debug!(now = %now, events = report.events.len(), pending = self.queue.len(), "tick finished");
        }
        report
    }

    /// Aborts `slot`. Its pending event is dropped; commands already released stay released.
    pub fn cancel(&mut self, slot: SlotId) -> Result<(), SchedulerError> {
        let execution = self.slots.get_mut(&slot).ok_or(SchedulerError::UnknownSlot(slot))?;
        if execution.status().is_terminal() {
            return Err(SchedulerError::SlotTerminal {
                slot,
                status: execution.status(),
            });
        }
        execution.abort();
        let cursor = execution.cursor();
        let removed = self.queue.remove_slot(slot);
        info!(slot = %slot, procedure = %execution.procedure().identifier, cursor, removed, "slot aborted");
        publish(&self.events, &SchedulerEvent::SlotAborted { slot, cursor });
        Ok(())
    }

    pub fn status(&self, slot: SlotId) -> Result<SlotReport, SchedulerError> {
        self.slots
            .get(&slot)
            .map(ExecutionSlot::report)
            .ok_or(SchedulerError::UnknownSlot(slot))
    }

    /// Frees a finished slot number for reuse.
    pub fn unload(&mut self, slot: SlotId) -> Result<ExecutionSlot, SchedulerError> {
        let execution = self.slots.get(&slot).ok_or(SchedulerError::UnknownSlot(slot))?;
        if execution.status().is_active() {
            return Err(SchedulerError::SlotActive {
                slot,
                status: execution.status(),
            });
        }
        if self.queue.contains_slot(slot) {
            error!(slot = %slot, status = %execution.status(), "terminal slot still has a queued event");
            return Err(SchedulerError::Invariant(format!("terminal slot {slot} still has a queued event")));
        }
        debug!(slot = %slot, "slot unloaded");
        self.slots.remove(&slot).ok_or(SchedulerError::UnknownSlot(slot))
    }

    pub fn slot(&self, slot: SlotId) -> Option<&ExecutionSlot> {
        self.slots.get(&slot)
    }

    /// Loaded slots in slot-number order.
    pub fn slots(&self) -> impl Iterator<Item = &ExecutionSlot> {
        self.slots.values()
    }

    pub fn next_due_time(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|event| event.at)
    }

    /// True when nothing is waiting to be released.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn snapshot(&self, slot: SlotId) -> Result<SlotSnapshot, SchedulerError> {
        self.slots
            .get(&slot)
            .map(SlotSnapshot::capture)
            .ok_or(SchedulerError::UnknownSlot(slot))
    }

    pub fn snapshots(&self) -> Vec<SlotSnapshot> {
        self.slots.values().map(SlotSnapshot::capture).collect()
    }

    /// Reinstates a slot from a snapshot, resuming at its saved cursor.
    ///
    /// The timeline is rebuilt from the procedure and original activation
    /// time, so the remaining entries keep their original absolute times.
    pub fn restore(&mut self, snapshot: SlotSnapshot) -> Result<SlotId, LoadError> {
        self.ensure_free(snapshot.slot)?;
        let timeline = prepare(&snapshot.procedure, snapshot.activation)?;
        let exhausted = snapshot.cursor >= timeline.len();
        if snapshot.cursor > timeline.len() || (snapshot.status.is_active() && exhausted) {
            error!(
                slot = %snapshot.slot,
                cursor = snapshot.cursor,
                entries = timeline.len(),
                status = %snapshot.status,
                "snapshot cursor is inconsistent with its timeline"
            );
            return Err(LoadError::Invariant(format!(
                "snapshot of slot {} has cursor {} for {} entries while {}",
                snapshot.slot,
                snapshot.cursor,
                timeline.len(),
                snapshot.status
            )));
        }
        let execution = ExecutionSlot::resume(
            snapshot.slot,
            snapshot.priority,
            snapshot.procedure,
            timeline,
            snapshot.cursor,
            snapshot.status,
            snapshot.failure,
        );
        self.install(execution)
    }

    fn allocate(&self) -> Result<SlotId, LoadError> {
        let range = self.settings.slot_range;
        (range.first..=range.last)
            .map(SlotId)
            .find(|slot| !self.slots.contains_key(slot))
            .ok_or(LoadError::SlotLimitExceeded {
                capacity: range.capacity(),
            })
    }

    fn ensure_free(&self, slot: SlotId) -> Result<(), LoadError> {
        let range = self.settings.slot_range;
        if !range.contains(slot.number()) {
            return Err(LoadError::SlotOutOfRange {
                slot,
                first: range.first,
                last: range.last,
            });
        }
        if self.slots.contains_key(&slot) {
            return Err(LoadError::SlotOccupied(slot));
        }
        Ok(())
    }

    fn admit(
        &mut self,
        slot: SlotId,
        procedure: ConcreteProcedure,
        timeline: Timeline,
        priority: Option<u32>,
    ) -> Result<SlotId, LoadError> {
        let priority = priority.unwrap_or(self.settings.default_priority);
        let execution = ExecutionSlot::new(slot, priority, procedure, timeline);
        let completed = execution.status() == SlotStatus::Completed;
        let slot = self.install(execution)?;
        if completed {
            info!(slot = %slot, "procedure has no entries; slot completed on load");
            publish(&self.events, &SchedulerEvent::SlotCompleted { slot });
        }
        Ok(slot)
    }

    fn install(&mut self, execution: ExecutionSlot) -> Result<SlotId, LoadError> {
        let slot = execution.id();
        let pending = execution.pending_event();
        let loaded = SchedulerEvent::SlotLoaded {
            slot,
            procedure: execution.procedure().identifier.clone(),
            activation: execution.activation(),
            entries: execution.timeline().len(),
        };
        match self.slots.entry(slot) {
            Entry::Occupied(_) => {
                error!(slot = %slot, "slot id registered twice");
                return Err(LoadError::Invariant(format!("slot {slot} registered twice")));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(execution);
            }
        }
        if let Some(event) = pending {
            self.queue.push(event);
        }
        info!(slot = %slot, pending = pending.is_some(), next = ?pending.map(|event| event.at), "slot loaded");
        publish(&self.events, &loaded);
        Ok(slot)
    }

    async fn release(&mut self, event: ScheduledEvent, now: DateTime<Utc>, report: &mut TickReport) {
        let Some(execution) = self.slots.get_mut(&event.slot) else {
            error!(slot = %event.slot, index = event.index, "queued event refers to an unloaded slot; dropping it");
            return;
        };
        let scheduled = match execution.current_entry() {
            Some(current) if current.index == event.index => current.clone(),
            _ => {
                error!(
                    slot = %event.slot,
                    index = event.index,
                    cursor = execution.cursor(),
                    status = %execution.status(),
                    "queued event does not match the slot cursor; dropping it"
                );
                return;
            }
        };

        if execution.begin() {
            info!(slot = %event.slot, procedure = %execution.procedure().identifier, "slot started");
            record(&self.events, report, SchedulerEvent::SlotStarted { slot: event.slot });
        }

        let outcome = self.dispatcher.dispatch(&scheduled.entry).await;
        debug!(
            slot = %event.slot,
            index = scheduled.index,
            mnemonic = %scheduled.entry.mnemonic,
            scheduled = %scheduled.at,
            released = %now,
            result = %outcome.result,
            "entry released"
        );
        record(
            &self.events,
            report,
            SchedulerEvent::CommandDispatched {
                slot: event.slot,
                entry: scheduled.index,
                target: scheduled.entry.target.clone(),
                mnemonic: scheduled.entry.mnemonic.clone(),
                scheduled: scheduled.at,
                released: now,
                result: outcome.result.clone(),
                attempts: outcome.attempts,
            },
        );

        if outcome.result.is_acknowledged() {
            match execution.acknowledge() {
                Some(next) => self.queue.push(next),
                None => {
                    info!(slot = %event.slot, procedure = %execution.procedure().identifier, "slot completed");
                    record(&self.events, report, SchedulerEvent::SlotCompleted { slot: event.slot });
                }
            }
            return;
        }

        let failure = DispatchFailure {
            slot: event.slot,
            entry: scheduled.index,
            mnemonic: scheduled.entry.mnemonic,
            reason: outcome.result,
            attempts: outcome.attempts,
        };
        warn!(slot = %event.slot, entry = failure.entry, mnemonic = %failure.mnemonic, reason = %failure.reason, "dispatch failed; slot failed");
        execution.fail(failure.clone());
        self.queue.remove_slot(event.slot);
        record(&self.events, report, SchedulerEvent::SlotFailed { failure });
    }
}

fn prepare(procedure: &ConcreteProcedure, activation: DateTime<Utc>) -> Result<Timeline, LoadError> {
    validate(procedure)?;
    build_timeline(procedure, activation).map_err(|timeline_error| {
        if let TimelineError::NonMonotonic { index } = timeline_error {
            error!(procedure = %procedure.identifier, index, "timeline is not monotonic");
        }
        LoadError::from(timeline_error)
    })
}

fn publish(sender: &Option<UnboundedSender<SchedulerEvent>>, event: &SchedulerEvent) {
    if let Some(sender) = sender
        && sender.send(event.clone()).is_err()
    {
        debug!("event subscriber dropped");
    }
}

fn record(sender: &Option<UnboundedSender<SchedulerEvent>>, report: &mut TickReport, event: SchedulerEvent) {
    publish(sender, &event);
    report.events.push(event);
}
