//! Routes released commands to subsystems and enforces the per-entry deadline.

use std::{fmt, sync::Arc, time::Duration};

use indexmap::IndexMap;
use rts_types::{ConcreteEntry, DispatchResult, RetryPolicy};
use rts_util::EngineSettings;
use tracing::{debug, warn};

use super::subsystem::Subsystem;

/// Final result of dispatching one entry, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub result: DispatchResult,
    /// Submissions made; zero when no subsystem routes the entry's tag.
    pub attempts: u32,
}

/// Maps subsystem tags to [`Subsystem`] implementations.
///
/// Each attempt is bounded by `timeout`. An attempt that does not resolve in
/// time counts as [`DispatchResult::Timeout`]. Unacknowledged attempts are
/// retried per the [`RetryPolicy`] before the last result is returned.
#[derive(Clone)]
pub struct Dispatcher {
    routes: IndexMap<String, Arc<dyn Subsystem>>,
    fallback: Option<Arc<dyn Subsystem>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            routes: IndexMap::new(),
            fallback: None,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Dispatcher with the timeout and retry policy from `settings` and no routes.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.dispatch_timeout()).with_retry(settings.retry)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Routes commands whose target equals `tag` to `subsystem`.
    pub fn with_route(mut self, tag: impl Into<String>, subsystem: Arc<dyn Subsystem>) -> Self {
        self.routes.insert(tag.into(), subsystem);
        self
    }

    /// Receives commands for tags without an explicit route.
    pub fn with_fallback(mut self, subsystem: Arc<dyn Subsystem>) -> Self {
        self.fallback = Some(subsystem);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn route(&self, tag: &str) -> Option<&Arc<dyn Subsystem>> {
        self.routes.get(tag).or(self.fallback.as_ref())
    }

    pub async fn dispatch(&self, entry: &ConcreteEntry) -> DispatchOutcome {
        let Some(subsystem) = self.route(&entry.target) else {
            warn!(tag = %entry.target, mnemonic = %entry.mnemonic, "no subsystem routes tag");
            return DispatchOutcome {
                result: DispatchResult::Rejected(format!("no subsystem routes tag '{}'", entry.target)),
                attempts: 0,
            };
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let submission = subsystem.submit(&entry.target, &entry.mnemonic, &entry.arguments);
            let result = tokio::time::timeout(self.timeout, submission)
                .await
                .unwrap_or(DispatchResult::Timeout);
            debug!(tag = %entry.target, mnemonic = %entry.mnemonic, attempt = attempts, result = %result, "dispatch attempt finished");

            if result.is_acknowledged() || attempts >= max_attempts {
                return DispatchOutcome { result, attempts };
            }
            warn!(
                mnemonic = %entry.mnemonic,
                attempt = attempts,
                max_attempts,
                result = %result,
                "dispatch not acknowledged; retrying"
            );
            let backoff = self.retry.backoff();
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
