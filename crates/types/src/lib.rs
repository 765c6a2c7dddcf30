//! Shared data model for Relative Time Sequence procedures.
//!
//! The parser produces [`Procedure`] templates, the binder turns them into
//! [`ConcreteProcedure`]s, and the scheduler tracks them by [`SlotId`]. Every
//! type here is plain data with serde support so hosts can persist snapshots.

mod duration;
mod execution;
mod procedure;

pub use duration::{DurationParseError, RtsDuration};
pub use execution::{DispatchResult, RetryPolicy, SlotId, SlotStatus};
pub use procedure::{
    ArgumentValue, BoundValue, CommandEntry, ConcreteEntry, ConcreteProcedure, OffsetSpec, ParameterDeclaration, ParameterDomain,
    Procedure,
};
