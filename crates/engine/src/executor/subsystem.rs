use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use rts_types::DispatchResult;
use tracing::{debug, warn};

/// Receives commands released by the scheduler.
///
/// Hosts implement this for each command path (instrument processor, bus, and
/// so on). The call resolves once the subsystem has acknowledged, rejected, or
/// given up on the command; the dispatcher applies its own deadline on top.
#[async_trait]
pub trait Subsystem: Send + Sync {
    async fn submit(&self, tag: &str, opcode: &str, arguments: &IndexMap<String, String>) -> DispatchResult;
}

/// One command as seen by an [`AcknowledgingSubsystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub tag: String,
    pub opcode: String,
    pub arguments: IndexMap<String, String>,
}

/// Subsystem that acknowledges every command and keeps a log of what it saw.
///
/// Used for dry runs and previews, where nothing should reach hardware.
#[derive(Debug, Default)]
pub struct AcknowledgingSubsystem {
    submissions: Mutex<Vec<Submission>>,
}

impl AcknowledgingSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, in arrival order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().expect("submission log lock poisoned").clone()
    }

    pub fn opcodes(&self) -> Vec<String> {
        self.submissions().into_iter().map(|submission| submission.opcode).collect()
    }
}

#[async_trait]
impl Subsystem for AcknowledgingSubsystem {
    async fn submit(&self, tag: &str, opcode: &str, arguments: &IndexMap<String, String>) -> DispatchResult {
        debug!(tag = %tag, opcode = %opcode, argument_count = arguments.len(), "acknowledging command");
        self.submissions.lock().expect("submission log lock poisoned").push(Submission {
            tag: tag.to_string(),
            opcode: opcode.to_string(),
            arguments: arguments.clone(),
        });
        DispatchResult::Acknowledged
    }
}

/// Acknowledges every command except the listed opcodes, which it rejects.
///
/// Lets dry runs rehearse a failure at a chosen entry.
#[derive(Debug, Default)]
pub struct RejectingSubsystem {
    rejected: HashSet<String>,
    log: AcknowledgingSubsystem,
}

impl RejectingSubsystem {
    pub fn new<I, S>(opcodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected: opcodes.into_iter().map(Into::into).collect(),
            log: AcknowledgingSubsystem::new(),
        }
    }

    /// Every command received, including rejected ones.
    pub fn submissions(&self) -> Vec<Submission> {
        self.log.submissions()
    }

    pub fn opcodes(&self) -> Vec<String> {
        self.log.opcodes()
    }
}

#[async_trait]
impl Subsystem for RejectingSubsystem {
    async fn submit(&self, tag: &str, opcode: &str, arguments: &IndexMap<String, String>) -> DispatchResult {
        self.log.submit(tag, opcode, arguments).await;
        if self.rejected.contains(opcode) {
            warn!(tag = %tag, opcode = %opcode, "rejecting command");
            return DispatchResult::Rejected(format!("{opcode} refused by {tag}"));
        }
        DispatchResult::Acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[tokio::test]
    async fn records_submissions_in_order() {
        let subsystem = AcknowledgingSubsystem::new();
        let arguments = indexmap! {"2S2STHV2".to_string() => "0".to_string()};

        assert_eq!(subsystem.submit("/CMD", "2S2STHV", &arguments).await, DispatchResult::Acknowledged);
        assert_eq!(subsystem.submit("ACIS", "WSPOW00000", &IndexMap::new()).await, DispatchResult::Acknowledged);

        let submissions = subsystem.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].arguments, arguments);
        assert_eq!(subsystem.opcodes(), vec!["2S2STHV", "WSPOW00000"]);
    }

    #[tokio::test]
    async fn rejects_only_listed_opcodes() {
        let subsystem = RejectingSubsystem::new(["OORMPDS"]);
        assert_eq!(subsystem.submit("/CMD", "OORMPEN", &IndexMap::new()).await, DispatchResult::Acknowledged);
        assert_eq!(
            subsystem.submit("/CMD", "OORMPDS", &IndexMap::new()).await,
            DispatchResult::Rejected("OORMPDS refused by /CMD".into())
        );
        assert_eq!(subsystem.opcodes(), vec!["OORMPEN", "OORMPDS"]);
    }
}
