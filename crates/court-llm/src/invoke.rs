//! Resilient invocation wrapper
//!
//! Bounded retry around one external structured-output call:
//!
//! - up to `max_attempts` calls, the last one with the simplified request
//! - a failure carrying raw generated text is salvaged when it validates
//! - rate limiting sleeps, then restarts from attempt 1 at most
//!   `rate_limit_restarts` times
//! - exhaustion yields [`ExternalServiceError`] with the final failure
//!
//! Every call goes through the shared [`CallGate`]. Pacing between
//! successive invocations is the caller's job.

use crate::failure::{ExternalServiceError, ServiceFailure};
use crate::gate::CallGate;
use crate::salvage::salvage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Calls per pass (the final one is simplified)
    pub max_attempts: u32,
    /// Sleep after a rate-limit failure
    #[serde(with = "secs")]
    pub rate_limit_pause: Duration,
    /// Full restarts allowed after rate limiting
    pub rate_limit_restarts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_pause: Duration::from_secs(60),
            rate_limit_restarts: 1,
        }
    }
}

impl RetryPolicy {
    /// Set the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the rate-limit pause
    #[must_use]
    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Which request variant an attempt should send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVariant {
    /// Full request
    Original,
    /// Shortened request used on the final attempt
    Simplified,
}

impl RequestVariant {
    /// Variant for a 1-based attempt number
    #[must_use]
    pub fn for_attempt(attempt: u32, max_attempts: u32) -> Self {
        if max_attempts > 1 && attempt >= max_attempts {
            Self::Simplified
        } else {
            Self::Original
        }
    }
}

/// Successful invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<T> {
    /// Validated result
    pub value: T,
    /// Calls made, including restarts
    pub attempts: u32,
    /// Whether the value was recovered from a failure payload
    pub salvaged: bool,
}

/// Retry driver bound to the shared call gate
#[derive(Debug, Clone)]
pub struct Invoker {
    gate: CallGate,
    policy: RetryPolicy,
}

impl Invoker {
    /// Create an invoker
    #[inline]
    #[must_use]
    pub fn new(gate: CallGate, policy: RetryPolicy) -> Self {
        Self { gate, policy }
    }

    /// Shared gate
    #[must_use]
    pub fn gate(&self) -> &CallGate {
        &self.gate
    }

    /// Active policy
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Drive `call` until it yields a valid `T` or the budget is spent
    ///
    /// `call` receives the variant to send and performs exactly one
    /// external request.
    ///
    /// # Errors
    /// Returns [`ExternalServiceError`] carrying the final failure once
    /// every attempt (and the permitted restart) has failed.
    pub async fn invoke<T, F, Fut>(&self, label: &str, mut call: F) -> Result<Invocation<T>, ExternalServiceError>
    where
        T: DeserializeOwned,
        F: FnMut(RequestVariant) -> Fut,
        Fut: Future<Output = Result<T, ServiceFailure>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut restarts_left = self.policy.rate_limit_restarts;
        let mut total = 0u32;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            total += 1;
            let variant = RequestVariant::for_attempt(attempt, max_attempts);

            let failure = match self.gate.run(call(variant)).await {
                Ok(value) => {
                    tracing::debug!(label, attempts = total, "external call succeeded");
                    return Ok(Invocation {
                        value,
                        attempts: total,
                        salvaged: false,
                    });
                }
                Err(failure) => failure,
            };

            if let Some(value) = failure.raw_payload().and_then(salvage::<T>) {
                tracing::info!(label, attempts = total, "recovered structured output from failure payload");
                return Ok(Invocation {
                    value,
                    attempts: total,
                    salvaged: true,
                });
            }

            tracing::warn!(label, attempt, max_attempts, error = %failure, "external call failed");

            if failure.is_rate_limited() {
                tokio::time::sleep(self.policy.rate_limit_pause).await;
                if restarts_left > 0 {
                    restarts_left -= 1;
                    attempt = 0;
                    tracing::info!(label, "restarting after rate limit");
                    continue;
                }
            }

            if attempt >= max_attempts {
                return Err(ExternalServiceError::new(total, failure));
            }
        }
    }
}
