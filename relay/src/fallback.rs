//! Fallback control.
//!
//! Drives one operation's candidate list through the attempt executor,
//! strictly sequentially, under a shared wall-clock deadline. Sequential
//! execution is deliberate: a hard fail from a reachable backend is
//! authoritative and must stop the operation before any further
//! candidate is tried, and the probed route variants are mutually
//! exclusive so parallel probing would waste a call in the common case.

use crate::attempt::{self, AttemptOutcome, TransportCause};
use crate::candidates::{Candidate, redacted_url};
use crate::config::BackendConfig;
use crate::metrics_defs::{RELAY_ATTEMPTS, RELAY_BUDGET_EXHAUSTED, RELAY_FALLBACKS, RELAY_HARD_FAILS};
use http::StatusCode;
use hyper::body::Bytes;
use shared::counter;
use std::time::Duration;
use tokio::time::Instant;

/// Time budgets for one operation: a global deadline shared by all
/// candidates, and the per-attempt timeout nested inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayBudget {
    pub deadline: Duration,
    pub attempt_timeout: Duration,
}

impl RelayBudget {
    /// Minimum remaining budget worth starting another attempt for:
    /// a tenth of the per-attempt timeout (1s at default settings).
    fn min_attempt_budget(&self) -> Duration {
        self.attempt_timeout / 10
    }
}

impl From<&BackendConfig> for RelayBudget {
    fn from(config: &BackendConfig) -> Self {
        Self {
            deadline: config.deadline(),
            attempt_timeout: config.attempt_timeout(),
        }
    }
}

/// Terminal state of one operation's candidate run.
#[derive(Clone, Debug, PartialEq)]
pub enum FinalState {
    Succeeded {
        status: StatusCode,
        body: Bytes,
        content_type: Option<String>,
    },
    StoppedOnHardFail {
        status: StatusCode,
        body: Bytes,
    },
    ExhaustedCandidates,
    DeadlineExceeded,
}

/// Outcome of driving a candidate list, with the redacted URL of every
/// candidate that was attempted, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayAttempts {
    pub state: FinalState,
    pub tried: Vec<String>,
}

/// Tries candidates in order until one succeeds, the backend rejects
/// the operation, the list runs out, or the deadline does.
///
/// The deadline is only checked between attempts; an attempt already in
/// flight may overrun it by up to one per-attempt timeout.
pub async fn run_candidates(
    client: &reqwest::Client,
    candidates: &[Candidate],
    budget: &RelayBudget,
) -> RelayAttempts {
    let deadline = Instant::now() + budget.deadline;
    let mut tried = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining < budget.min_attempt_budget() {
            counter!(RELAY_BUDGET_EXHAUSTED).increment(1);
            tracing::warn!(tried = tried.len(), "deadline exhausted before next attempt");
            return RelayAttempts {
                state: FinalState::DeadlineExceeded,
                tried,
            };
        }

        tried.push(redacted_url(&candidate.url));
        counter!(RELAY_ATTEMPTS).increment(1);

        // Clamp so the accepted deadline overrun stays within one attempt
        let attempt_timeout = budget.attempt_timeout.min(remaining);

        match attempt::execute(client, candidate, attempt_timeout).await {
            AttemptOutcome::Success {
                status,
                body,
                content_type,
            } => {
                return RelayAttempts {
                    state: FinalState::Succeeded {
                        status,
                        body,
                        content_type,
                    },
                    tried,
                };
            }
            AttemptOutcome::HardFail { status, body } => {
                counter!(RELAY_HARD_FAILS).increment(1);
                tracing::warn!(
                    status = %status,
                    url = %tried.last().map(String::as_str).unwrap_or(""),
                    "backend rejected operation, not trying further candidates"
                );
                return RelayAttempts {
                    state: FinalState::StoppedOnHardFail { status, body },
                    tried,
                };
            }
            AttemptOutcome::SoftFail { status, .. } => {
                counter!(RELAY_FALLBACKS).increment(1);
                tracing::debug!(status = %status, "route mismatch, advancing to next candidate");
                if deadline.saturating_duration_since(Instant::now()).is_zero() {
                    break;
                }
            }
            AttemptOutcome::TransportError(cause) => {
                counter!(RELAY_FALLBACKS).increment(1);
                tracing::debug!(cause = ?cause, "transport failure, advancing to next candidate");
                if deadline.saturating_duration_since(Instant::now()).is_zero() {
                    counter!(RELAY_BUDGET_EXHAUSTED).increment(1);
                    let timed_out = matches!(cause, TransportCause::Timeout);
                    tracing::warn!(tried = tried.len(), timed_out, "deadline exceeded");
                    return RelayAttempts {
                        state: FinalState::DeadlineExceeded,
                        tried,
                    };
                }
            }
        }
    }

    counter!(RELAY_BUDGET_EXHAUSTED).increment(1);
    tracing::warn!(tried = tried.len(), "no candidate produced a response");
    RelayAttempts {
        state: FinalState::ExhaustedCandidates,
        tried,
    }
}
