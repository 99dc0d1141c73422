//! Bounded poll-until-predicate primitive

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::E2eResult;
use crate::wait::{WaitPolicy, WaitTier};

/// Attempts remaining plus the tier each attempt's backoff is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBudget {
    pub attempts: u32,
    pub tier: WaitTier,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            attempts: 3,
            tier: WaitTier::Short,
        }
    }
}

impl RetryBudget {
    pub fn new(attempts: u32, tier: WaitTier) -> Self {
        Self { attempts, tier }
    }

    /// Linear backoff: attempt `n` (1-based) waits `n` times the tier
    /// duration, saturating at [`Duration::MAX`]
    pub fn backoff(&self, attempt: u32, waits: &WaitPolicy) -> Duration {
        waits
            .duration(self.tier)
            .checked_mul(attempt.max(1))
            .unwrap_or(Duration::MAX)
    }
}

/// How a poll ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Predicate held; `attempts` is the number of actions it took (0 on the fast path)
    Satisfied { attempts: u32 },
    /// Budget exhausted with the predicate still false
    TimedOut { attempts: u32 },
    /// The predicate itself raised an error
    ProbeFailed { attempt: u32, error: String },
}

impl PollOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }
}

/// Check `check`; while it is false, wait, run `act` and check again, at most
/// `budget.attempts` times.
///
/// Errors from `act` propagate. Errors from `check` end the poll as
/// [`PollOutcome::ProbeFailed`].
pub async fn poll_until<C, CF, A, AF>(
    label: &str,
    budget: RetryBudget,
    waits: &WaitPolicy,
    mut check: C,
    mut act: A,
) -> E2eResult<PollOutcome>
where
    C: FnMut() -> CF,
    CF: Future<Output = E2eResult<bool>>,
    A: FnMut(u32) -> AF,
    AF: Future<Output = E2eResult<()>>,
{
    match check().await {
        Ok(true) => {
            debug!(label, "Already satisfied");
            return Ok(PollOutcome::Satisfied { attempts: 0 });
        }
        Ok(false) => {}
        Err(e) => {
            return Ok(PollOutcome::ProbeFailed {
                attempt: 0,
                error: e.to_string(),
            })
        }
    }

    for attempt in 1..=budget.attempts {
        let delay = budget.backoff(attempt, waits);
        debug!(
            label,
            attempt,
            max_attempts = budget.attempts,
            delay_ms = delay.as_millis() as u64,
            "Polling"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        act(attempt).await?;

        match check().await {
            Ok(true) => return Ok(PollOutcome::Satisfied { attempts: attempt }),
            Ok(false) => {}
            Err(e) => {
                return Ok(PollOutcome::ProbeFailed {
                    attempt,
                    error: e.to_string(),
                })
            }
        }
    }

    warn!(label, attempts = budget.attempts, "Retry budget exhausted");
    Ok(PollOutcome::TimedOut {
        attempts: budget.attempts,
    })
}
