// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Reconnect delay policy with exponential growth and jitter.
//!
//! The multiplexed client waits for the configured reconnect delay, measured from the
//! last connect attempt, before reconnecting after a connection-breaking error. When a
//! reconnect attempt itself fails, the next wait grows by `factor` up to `delay_max`.
//! With the default factor of `1.0` and no jitter the delay stays constant. A successful
//! connect resets the policy.

use std::time::Duration;

use rand::Rng;
use wiremux_core::correctness::{
    check_in_range_inclusive_f64, check_in_range_inclusive_u64, check_predicate_true,
};

/// Computes successive reconnect delays.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// The delay used for the first attempt after a successful connection.
    delay_initial: Duration,
    /// The maximum delay to cap the growth.
    delay_max: Duration,
    /// The base delay for the next attempt.
    delay_current: Duration,
    /// The factor to multiply the delay on each failed attempt.
    factor: f64,
    /// The maximum random jitter to add (in milliseconds).
    jitter_ms: u64,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `factor` is not within [1.0, 100.0], `jitter_ms` exceeds
    /// one minute, or `delay_max` is less than `delay_initial`.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
    ) -> anyhow::Result<Self> {
        check_in_range_inclusive_f64(factor, 1.0, 100.0, "factor")?;
        check_in_range_inclusive_u64(jitter_ms, 0, 60_000, "jitter_ms")?;
        check_predicate_true(
            delay_max >= delay_initial,
            "delay_max must be greater than or equal to delay_initial",
        )?;

        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
        })
    }

    /// Returns the next delay (with jitter) and grows the base delay for the attempt after.
    pub fn next_duration(&mut self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms)
        };
        let delay_with_jitter = self.delay_current + Duration::from_millis(jitter);

        let current_nanos = self.delay_current.as_nanos() as f64;
        let max_nanos = self.delay_max.as_nanos() as u64;
        let next_nanos = (current_nanos * self.factor) as u64;
        self.delay_current = Duration::from_nanos(next_nanos.min(max_nanos));

        delay_with_jitter
    }

    /// Resets the policy to its initial delay.
    pub const fn reset(&mut self) {
        self.delay_current = self.delay_initial;
    }

    /// Returns the base delay for the next call to [`Self::next_duration`], before jitter.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }
}
