//! Errors surfaced by `RTSLOAD` and the scheduler's load operations.

use rts_types::SlotId;
use thiserror::Error;

use crate::{
    procedure::{BindingError, ConstraintViolation, ParseError},
    timeline::TimelineError,
};

/// Reason a load request was refused. Nothing is scheduled when any of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("unknown procedure '{0}'")]
    UnknownProcedure(String),
    #[error("procedure '{procedure}' failed to parse: {source}")]
    Parse {
        procedure: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),
    #[error("all {capacity} execution slots are in use")]
    SlotLimitExceeded { capacity: usize },
    #[error("slot {0} is already occupied")]
    SlotOccupied(SlotId),
    #[error("slot {slot} is outside the configured range {first}..={last}")]
    SlotOutOfRange { slot: SlotId, first: u32, last: u32 },
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error("internal scheduler invariant violated: {0}")]
    Invariant(String),
}
