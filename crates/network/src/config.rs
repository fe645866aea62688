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

//! Configuration for the multiplexed client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wiremux_core::correctness::{
    check_in_range_inclusive_f64, check_in_range_inclusive_u64, check_predicate_true,
};

use crate::{backoff::ExponentialBackoff, error::MuxError};

/// Configuration for a [`crate::client::MultiplexClient`].
///
/// All durations are in milliseconds. A zero duration disables the associated policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiplexConfig {
    /// The delay (milliseconds) between the last connect attempt and a reconnect after a
    /// connection-breaking error. `None` disables automatic reconnection.
    pub reconnect_delay_ms: Option<u64>,
    /// The maximum reconnect delay (milliseconds) when the delay grows after failed attempts.
    /// Defaults to the reconnect delay when unset.
    pub reconnect_delay_max_ms: Option<u64>,
    /// The factor to grow the reconnect delay by after each failed reconnect attempt.
    pub reconnect_backoff_factor: f64,
    /// The maximum jitter (milliseconds) added to each reconnect delay.
    pub reconnect_jitter_ms: u64,
    /// The window (milliseconds) in which at least one message must arrive.
    pub no_message_timeout_ms: u64,
    /// The interval (milliseconds) between client heartbeat messages.
    pub heartbeat_interval_ms: u64,
    /// The window (milliseconds) in which a heartbeat response must arrive.
    pub no_heartbeat_response_timeout_ms: u64,
}

impl Default for MultiplexConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: None,
            reconnect_delay_max_ms: None,
            reconnect_backoff_factor: 1.0,
            reconnect_jitter_ms: 0,
            no_message_timeout_ms: 0,
            heartbeat_interval_ms: 0,
            no_heartbeat_response_timeout_ms: 0,
        }
    }
}

impl MultiplexConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if the backoff factor is outside [1.0, 100.0],
    /// the reconnect jitter exceeds one minute, or the maximum reconnect delay is below
    /// the reconnect delay.
    pub fn validate(&self) -> Result<(), MuxError> {
        check_in_range_inclusive_f64(
            self.reconnect_backoff_factor,
            1.0,
            100.0,
            "reconnect_backoff_factor",
        )
        .map_err(invalid)?;

        check_in_range_inclusive_u64(self.reconnect_jitter_ms, 0, 60_000, "reconnect_jitter_ms")
            .map_err(invalid)?;

        if let (Some(delay), Some(max)) = (self.reconnect_delay_ms, self.reconnect_delay_max_ms) {
            check_predicate_true(
                max >= delay,
                "reconnect_delay_max_ms must be greater than or equal to reconnect_delay_ms",
            )
            .map_err(invalid)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect_delay_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub const fn no_message_timeout(&self) -> Duration {
        Duration::from_millis(self.no_message_timeout_ms)
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub const fn no_heartbeat_response_timeout(&self) -> Duration {
        Duration::from_millis(self.no_heartbeat_response_timeout_ms)
    }

    /// Builds the reconnect backoff policy, or `None` when reconnection is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if the backoff parameters are invalid.
    pub fn reconnect_backoff(&self) -> Result<Option<ExponentialBackoff>, MuxError> {
        let Some(delay) = self.reconnect_delay() else {
            return Ok(None);
        };
        let delay_max = self
            .reconnect_delay_max_ms
            .map_or(delay, Duration::from_millis);

        ExponentialBackoff::new(
            delay,
            delay_max.max(delay),
            self.reconnect_backoff_factor,
            self.reconnect_jitter_ms,
        )
        .map(Some)
        .map_err(invalid)
    }
}

fn invalid(error: anyhow::Error) -> MuxError {
    MuxError::InvalidConfig(format!("{error:#}"))
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_default_disables_everything() {
        let config = MultiplexConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.reconnect_delay(), None);
        assert_eq!(config.no_message_timeout(), Duration::ZERO);
        assert_eq!(config.heartbeat_interval(), Duration::ZERO);
        assert_eq!(config.no_heartbeat_response_timeout(), Duration::ZERO);
        assert!(config.reconnect_backoff().unwrap().is_none());
    }

    #[rstest]
    fn test_deserialize_partial_json() {
        let json = r#"{"reconnect_delay_ms": 100, "heartbeat_interval_ms": 200}"#;
        let config: MultiplexConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.reconnect_delay(), Some(Duration::from_millis(100)));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(200));
        assert_eq!(config.reconnect_backoff_factor, 1.0);
    }

    #[rstest]
    fn test_deserialize_rejects_unknown_fields() {
        let json = r#"{"reconnect_delay": 100}"#;
        assert!(serde_json::from_str::<MultiplexConfig>(json).is_err());
    }

    #[rstest]
    fn test_backoff_defaults_max_to_delay() {
        let config = MultiplexConfig {
            reconnect_delay_ms: Some(250),
            ..Default::default()
        };

        let mut backoff = config.reconnect_backoff().unwrap().unwrap();
        assert_eq!(backoff.next_duration(), Duration::from_millis(250));
        assert_eq!(backoff.next_duration(), Duration::from_millis(250));
    }

    #[rstest]
    #[case(0.9, None, 0)]
    #[case(1.5, Some(10), 0)]
    #[case(1.0, None, 120_000)]
    fn test_validate_rejects(
        #[case] factor: f64,
        #[case] max: Option<u64>,
        #[case] jitter_ms: u64,
    ) {
        let config = MultiplexConfig {
            reconnect_delay_ms: Some(100),
            reconnect_delay_max_ms: max,
            reconnect_backoff_factor: factor,
            reconnect_jitter_ms: jitter_ms,
            ..Default::default()
        };

        let result = config.validate();
        assert!(matches!(result, Err(MuxError::InvalidConfig(_))));
    }
}
