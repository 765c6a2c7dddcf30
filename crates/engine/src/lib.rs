//! # RTS Engine
//!
//! Loads, schedules, and dispatches Relative Time Sequences: ordered command
//! lists where each command waits a fixed offset after the one before it.
//!
//! ## Pipeline
//!
//! 1. **Parse** procedure text into a [`Procedure`](rts_types::Procedure) template
//! 2. **Bind** load-time parameters, producing a [`ConcreteProcedure`](rts_types::ConcreteProcedure)
//! 3. **Validate** every bound value against its declared domain
//! 4. **Build** the absolute [`Timeline`] from the activation time
//! 5. **Schedule** the timeline into an execution slot and **dispatch** each
//!    entry to its subsystem when it falls due
//!
//! ## Usage
//!
//! ```rust
//! use std::{sync::Arc, time::Duration};
//!
//! use chrono::{TimeZone, Utc};
//! use rts_engine::{
//!     AcknowledgingSubsystem, Dispatcher, LoadRequest, ProcedureCatalog, Scheduler, SchedulerSettings, SimulatedClock,
//!     drive_until_idle, rtsload,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = ProcedureCatalog::new();
//! catalog.insert_source(
//!     "1_CTI06",
//!     "PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00\n\
//!      /CMD, OORMPEN\n\
//!      /CMD, OORMPDS, DELTA=&NUM_HOURS&",
//! );
//!
//! let subsystem = Arc::new(AcknowledgingSubsystem::new());
//! let dispatcher = Dispatcher::new(Duration::from_secs(5)).with_fallback(subsystem.clone());
//! let mut scheduler = Scheduler::new(SchedulerSettings::default(), dispatcher);
//!
//! let start = Utc.with_ymd_and_hms(2017, 9, 8, 20, 45, 0).unwrap();
//! let request = LoadRequest::new("1_CTI06").with_binding("NUM_HOURS", "000:04:00:00");
//! rtsload(&mut scheduler, &catalog, &request, start)?;
//!
//! drive_until_idle(&mut scheduler, &mut SimulatedClock::new(start)).await;
//! assert_eq!(subsystem.opcodes(), vec!["OORMPEN", "OORMPDS"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`procedure`**: parser, renderer, binder, and validator
//! - **`timeline`**: absolute schedule construction and export records
//! - **`executor`**: slots, the event queue, the scheduler, and dispatch
//! - **`request`** / **`catalog`** / **`load`**: the `RTSLOAD` surface
//! - **`clock`**: wall and simulated time sources plus the drive loop
//! - **`snapshot`**: persistable slot state for restart recovery

pub mod catalog;
pub mod clock;
pub mod error;
pub mod executor;
pub mod load;
pub mod procedure;
pub mod request;
pub mod snapshot;
pub mod timeline;

// Re-export commonly used types for convenience
pub use catalog::ProcedureCatalog;
pub use clock::{Clock, SimulatedClock, SystemClock, drive_until_idle};
pub use error::LoadError;
pub use executor::{
    AcknowledgingSubsystem, DispatchFailure, DispatchOutcome, Dispatcher, ExecutionSlot, RejectingSubsystem, Scheduler, SchedulerError,
    SchedulerEvent, SchedulerSettings, SharedScheduler, SlotReport, Subsystem, TickReport,
};
pub use load::{resolve_request, rtsload};
pub use procedure::{
    BindingError, ConstraintViolation, ParseError, ParseErrorKind, bind, parse_procedure, render_procedure, validate,
};
pub use request::{LoadRequest, RequestError, RequestErrorKind, load_request_file, parse_load_request, parse_request_file};
pub use snapshot::{SlotSnapshot, SnapshotError};
pub use timeline::{Timeline, TimelineEntry, TimelineError, TimelineRecord, build_timeline};
