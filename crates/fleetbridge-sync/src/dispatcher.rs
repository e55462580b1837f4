//! Sequential, rate-limited payload dispatch.
//!
//! Replays a payload list against the Target API one item at a time under a
//! fixed request budget. The Target's rate ceiling is a low single-digit
//! requests/second, so there is no intra-run parallelism at all; ordering
//! of the input list is preserved.
//!
//! Both retry cases (401 token expiry, 403 rate limiting) run through one
//! bounded retry loop parameterized by [`RetryPolicy`]. Any other non-2xx
//! or transport failure marks the item failed immediately and the run
//! moves on; only token-refresh failure aborts the run as a whole.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::error::SyncResult;
use crate::gateway::{SendStatus, TargetGateway};
use crate::lock::JobLock;
use crate::payload::SyncPayloadItem;
use crate::token::TokenManager;

/// Retry and pacing knobs for a dispatch run.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Send attempts allowed per item when the token keeps expiring.
    pub max_auth_attempts: u32,
    /// Send attempts allowed per item under rate limiting.
    pub max_rate_limit_attempts: u32,
    /// Rate-limit backoff grows linearly by this step per attempt...
    pub rate_limit_base: Duration,
    /// ...capped at this ceiling.
    pub rate_limit_cap: Duration,
    /// Pause after a token refresh before resending.
    pub auth_retry_delay: Duration,
    /// Fixed pause between items.
    pub inter_request_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_auth_attempts: 3,
            max_rate_limit_attempts: 6,
            rate_limit_base: Duration::from_secs(1),
            rate_limit_cap: Duration::from_secs(5),
            auth_retry_delay: Duration::from_millis(200),
            // ~3-4 requests/second keeps the Target happy.
            inter_request_delay: Duration::from_millis(280),
        }
    }
}

impl RetryPolicy {
    /// Linearly increasing, capped backoff after the `attempt`-th send was
    /// rate limited.
    #[must_use]
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        (self.rate_limit_base * attempt).min(self.rate_limit_cap)
    }
}

/// Counts for one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The run stopped early (authentication exhausted); unprocessed items
    /// are neither succeeded nor failed.
    pub aborted: bool,
}

impl DispatchSummary {
    fn empty(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            aborted: false,
        }
    }
}

/// Outcome of invoking the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The run processed its items (possibly aborting partway).
    Completed(DispatchSummary),
    /// Another run holds this job's lock; nothing was processed.
    LockHeld,
}

/// Sequential dispatcher over a [`TargetGateway`].
pub struct Dispatcher<G> {
    gateway: Arc<G>,
    tokens: TokenManager<G>,
    policy: RetryPolicy,
}

impl<G: TargetGateway> Dispatcher<G> {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(gateway: Arc<G>, tokens: TokenManager<G>, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            tokens,
            policy,
        }
    }

    /// Dispatch `items` under the named job's lock.
    ///
    /// Returns [`DispatchOutcome::LockHeld`] without touching anything when
    /// another run is active for the job.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn run(
        &self,
        job: &str,
        lock_dir: &Path,
        items: &[SyncPayloadItem],
    ) -> SyncResult<DispatchOutcome> {
        let Some(_lock) = JobLock::acquire(lock_dir, job)? else {
            return Ok(DispatchOutcome::LockHeld);
        };

        let mut summary = DispatchSummary::empty(items.len());
        if items.is_empty() {
            info!(job, "nothing to dispatch");
            return Ok(DispatchOutcome::Completed(summary));
        }

        let Some(mut token) = self.tokens.get_token().await else {
            error!(job, "no valid token available; aborting run");
            summary.aborted = true;
            return Ok(DispatchOutcome::Completed(summary));
        };

        info!(job, total = summary.total, "dispatch started");

        'items: for (position, item) in items.iter().enumerate() {
            let key = item.log_key();
            let mut attempts = 0u32;

            loop {
                attempts += 1;
                let result = match item {
                    SyncPayloadItem::Create(create) => {
                        self.gateway.create_equipment(&token, create).await
                    }
                    SyncPayloadItem::Update(update) => {
                        self.gateway
                            .update_equipment(&token, update.id, &update.patch)
                            .await
                    }
                };

                match result {
                    Ok(SendStatus::Accepted) => {
                        summary.succeeded += 1;
                        debug!(job, key = %key, attempts, "item applied");
                        break;
                    }
                    Ok(SendStatus::TokenExpired)
                        if attempts < self.policy.max_auth_attempts =>
                    {
                        match self.tokens.refresh().await {
                            Some(fresh) => {
                                token = fresh;
                                tokio::time::sleep(self.policy.auth_retry_delay).await;
                            }
                            None => {
                                summary.failed += 1;
                                summary.aborted = true;
                                error!(job, key = %key, "token refresh failed; aborting run");
                                break 'items;
                            }
                        }
                    }
                    Ok(SendStatus::RateLimited)
                        if attempts < self.policy.max_rate_limit_attempts =>
                    {
                        let wait = self.policy.rate_limit_backoff(attempts);
                        debug!(job, key = %key, attempts, wait_ms = wait.as_millis() as u64, "rate limited, backing off");
                        tokio::time::sleep(wait).await;
                    }
                    Ok(status) => {
                        summary.failed += 1;
                        warn!(job, key = %key, ?status, "item failed");
                        break;
                    }
                    Err(error) => {
                        summary.failed += 1;
                        warn!(job, key = %key, %error, "item failed with transport error");
                        break;
                    }
                }
            }

            if position + 1 < items.len() {
                tokio::time::sleep(self.policy.inter_request_delay).await;
            }
        }

        if summary.failed > 0 || summary.aborted {
            warn!(
                job,
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                aborted = summary.aborted,
                "dispatch finished with failures"
            );
        } else {
            info!(
                job,
                total = summary.total,
                succeeded = summary.succeeded,
                "dispatch finished"
            );
        }

        Ok(DispatchOutcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_backoff(1), Duration::from_secs(1));
        assert_eq!(policy.rate_limit_backoff(3), Duration::from_secs(3));
        assert_eq!(policy.rate_limit_backoff(5), Duration::from_secs(5));
        // Capped past the ceiling.
        assert_eq!(policy.rate_limit_backoff(9), Duration::from_secs(5));
    }

    #[test]
    fn test_default_policy_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_auth_attempts, 3);
        assert_eq!(policy.max_rate_limit_attempts, 6);
        assert_eq!(policy.inter_request_delay, Duration::from_millis(280));
    }
}
