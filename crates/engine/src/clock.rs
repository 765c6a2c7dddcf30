//! Time sources for driving a [`Scheduler`].
//!
//! The scheduler itself never reads a clock; hosts pass `now` to `tick`.
//! [`drive_until_idle`] is the usual loop: wait for the next due time, tick,
//! repeat until nothing is pending.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::executor::{Scheduler, TickReport};

#[async_trait]
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;

    /// Returns once `now()` has reached `deadline`.
    async fn sleep_until(&mut self, deadline: DateTime<Utc>);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&mut self, deadline: DateTime<Utc>) {
        let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Clock that jumps straight to each deadline.
///
/// Runs a multi-hour procedure instantly; used for dry runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedClock {
    now: DateTime<Utc>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: start }
    }

    pub fn advance_to(&mut self, instant: DateTime<Utc>) {
        if instant > self.now {
            self.now = instant;
        }
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn sleep_until(&mut self, deadline: DateTime<Utc>) {
        self.advance_to(deadline);
    }
}

/// Ticks `scheduler` at every due time until its queue is empty.
///
/// Returns the events of every tick, concatenated in order.
pub async fn drive_until_idle<C>(scheduler: &mut Scheduler, clock: &mut C) -> TickReport
where
    C: Clock + ?Sized,
{
    let mut combined = scheduler.tick(clock.now()).await;
    while let Some(due) = scheduler.next_due_time() {
        clock.sleep_until(due).await;
        let report = scheduler.tick(clock.now()).await;
        combined.events.extend(report.events);
    }
    debug!(events = combined.events.len(), "scheduler idle");
    combined
}
