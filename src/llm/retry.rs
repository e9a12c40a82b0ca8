//! Bounded retry for model calls.
//!
//! One logical analysis call gets a fixed attempt budget. Between attempts
//! the policy sleeps briefly and lowers the sampling temperature, stepping
//! linearly from the configured base down to zero on the final attempt, so
//! a model that produced malformed output gets progressively more
//! deterministic chances to comply.

use std::time::Duration;

use tracing::warn;

use super::{ModelCommunicationFailure, ModelError};
use crate::config::ModelConfig;

/// One slot in the attempt budget, passed to the operation so it can use
/// the scheduled temperature.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub base_temperature: f32,
}

impl RetryPolicy {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay,
            base_temperature: config.temperature,
        }
    }

    /// Temperature scheduled for a 1-based attempt number: base on the
    /// first attempt, zero on the last, linear in between.
    pub fn temperature(&self, attempt: u32) -> f32 {
        if self.attempts <= 1 || attempt >= self.attempts {
            return if self.attempts <= 1 {
                self.base_temperature
            } else {
                0.0
            };
        }
        let remaining = (self.attempts - attempt) as f32;
        let span = (self.attempts - 1) as f32;
        self.base_temperature * remaining / span
    }

    /// Run `op` up to `attempts` times, sleeping `delay` between failures.
    /// Exhaustion yields the last error wrapped with the attempt count.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(Attempt) -> Result<T, ModelError>,
    ) -> Result<T, ModelCommunicationFailure> {
        let mut last_error: Option<ModelError> = None;
        for number in 1..=self.attempts {
            let attempt = Attempt {
                number,
                temperature: self.temperature(number),
            };
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(attempt = number, budget = self.attempts, error = %err, "model call attempt failed");
                    last_error = Some(err);
                    if number < self.attempts {
                        std::thread::sleep(self.delay);
                    }
                }
            }
        }
        // attempts >= 1, so last_error is set by the time we get here
        let last_error = last_error.unwrap_or(ModelError::NoModelAvailable);
        Err(ModelCommunicationFailure {
            attempts: self.attempts,
            kind: last_error.kind(),
            last_error,
        })
    }
}
