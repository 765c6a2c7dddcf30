use std::sync::Arc;

use chrono::{DateTime, Utc};
use rts_types::{ConcreteProcedure, SlotId};
use tokio::sync::{Mutex, MutexGuard};

use super::{Scheduler, SchedulerError, SlotReport, TickReport};
use crate::error::LoadError;

/// Cloneable handle that serializes access to one [`Scheduler`].
///
/// Lets a host tick from one task while others load or cancel. Every call
/// takes the same lock, so ticks, loads, and cancels never interleave.
#[derive(Debug, Clone)]
pub struct SharedScheduler {
    inner: Arc<Mutex<Scheduler>>,
}

impl SharedScheduler {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scheduler)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.inner.lock().await
    }

    pub async fn load(
        &self,
        procedure: ConcreteProcedure,
        activation: DateTime<Utc>,
        priority: Option<u32>,
    ) -> Result<SlotId, LoadError> {
        self.inner.lock().await.load(procedure, activation, priority)
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        self.inner.lock().await.tick(now).await
    }

    pub async fn cancel(&self, slot: SlotId) -> Result<(), SchedulerError> {
        self.inner.lock().await.cancel(slot)
    }

    pub async fn status(&self, slot: SlotId) -> Result<SlotReport, SchedulerError> {
        self.inner.lock().await.status(slot)
    }

    pub async fn next_due_time(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.next_due_time()
    }
}
