//! Execution engine: slots, the event queue, and command dispatch.
//!
//! - `scheduler::Scheduler` owns every slot and the single time-ordered queue
//! - `dispatcher::Dispatcher` routes a released entry to a `Subsystem` under a deadline
//! - `subsystem::Subsystem` abstracts the command path; `AcknowledgingSubsystem`
//!   and `RejectingSubsystem` are host-free stand-ins
//! - `shared::SharedScheduler` serializes access from several tasks

pub mod dispatcher;
pub mod events;
pub mod queue;
pub mod scheduler;
pub mod shared;
pub mod slot;
pub mod subsystem;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use events::{DispatchFailure, SchedulerEvent, SlotReport, TickReport};
pub use queue::ScheduledEvent;
pub use scheduler::{Scheduler, SchedulerError, SchedulerSettings};
pub use shared::SharedScheduler;
pub use slot::ExecutionSlot;
pub use subsystem::{AcknowledgingSubsystem, RejectingSubsystem, Submission, Subsystem};
