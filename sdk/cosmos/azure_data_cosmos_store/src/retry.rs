// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Back-off decisions for throttled and transiently failed requests.

use std::time::Duration;

use crate::{Error, ErrorKind, RetryOptions};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Decides whether, and how long, to wait before retrying a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Returns the delay before the next attempt, or `None` if `error` should be surfaced.
    ///
    /// `attempt` is the number of retries already made and `waited` the back-off already
    /// spent on this request. The cumulative wait never exceeds `max_wait`.
    pub fn next_delay(&self, error: &Error, attempt: u32, waited: Duration) -> Option<Duration> {
        if attempt >= self.options.max_attempts {
            return None;
        }
        let delay = match error.kind() {
            ErrorKind::RateLimited { retry_after } => {
                retry_after.unwrap_or_else(|| backoff(attempt))
            }
            ErrorKind::ServiceUnavailable => backoff(attempt),
            _ => return None,
        };
        let remaining = self.options.max_wait.checked_sub(waited)?;
        if remaining.is_zero() {
            return None;
        }
        Some(delay.min(remaining))
    }
}

/// Exponential back-off starting at 100 ms, capped at 5 s.
fn backoff(attempt: u32) -> Duration {
    INITIAL_BACKOFF
        .checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}
