//! Runtime vocabulary shared by the scheduler, dispatcher, and hosts.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Slot number a procedure instance runs in (for example SCS 135).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl SlotId {
    pub const fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an execution slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Timeline built, nothing dispatched yet.
    Loaded,
    /// At least one entry has been released to the dispatcher.
    Running,
    /// Every entry was acknowledged.
    Completed,
    /// Cancelled by request.
    Aborted,
    /// A dispatch was rejected or timed out.
    Failed,
}

impl SlotStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Aborted | SlotStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SlotStatus::Loaded => "loaded",
            SlotStatus::Running => "running",
            SlotStatus::Completed => "completed",
            SlotStatus::Aborted => "aborted",
            SlotStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of submitting one command to a subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchResult {
    Acknowledged,
    Rejected(String),
    Timeout,
}

impl DispatchResult {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, DispatchResult::Acknowledged)
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchResult::Acknowledged => f.write_str("acknowledged"),
            DispatchResult::Rejected(reason) => write!(f, "rejected: {reason}"),
            DispatchResult::Timeout => f.write_str("timed out"),
        }
    }
}

/// Per-entry retry configuration applied before a slot is declared failed.
///
/// The default performs a single attempt; physical actuation commands are
/// only retried when a host opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}
