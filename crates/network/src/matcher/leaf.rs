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

//! Leaf matchers deciding on a single field.

use std::sync::Arc;

use regex::Regex;

use super::{FieldMatcher, MatchStatus};

/// Matches every message as soon as it begins.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyMatcher;

impl FieldMatcher for AnyMatcher {
    fn begin(&mut self) -> MatchStatus {
        MatchStatus::Matched
    }

    fn on_field(&mut self, _name: &str, _value: &str) -> MatchStatus {
        MatchStatus::Matched
    }

    fn reset(&mut self) {}
}

/// Decides on the first occurrence of `field` by exact text comparison.
#[derive(Clone, Debug)]
pub struct ValueMatcher {
    field: Arc<str>,
    expected: Arc<str>,
    status: MatchStatus,
}

impl ValueMatcher {
    #[must_use]
    pub const fn new(field: Arc<str>, expected: Arc<str>) -> Self {
        Self {
            field,
            expected,
            status: MatchStatus::Undecided,
        }
    }
}

impl FieldMatcher for ValueMatcher {
    fn begin(&mut self) -> MatchStatus {
        self.status
    }

    fn on_field(&mut self, name: &str, value: &str) -> MatchStatus {
        if self.status.is_decided() || name != &*self.field {
            return self.status;
        }

        self.status = if value == &*self.expected {
            MatchStatus::Matched
        } else {
            MatchStatus::CannotMatch
        };
        self.status
    }

    fn reset(&mut self) {
        self.status = MatchStatus::Undecided;
    }
}

/// Decides on the first occurrence of `field` by whole-value regular expression match.
#[derive(Clone, Debug)]
pub struct RegexpMatcher {
    field: Arc<str>,
    regex: Regex,
    status: MatchStatus,
}

impl RegexpMatcher {
    /// Creates a new matcher. `regex` is expected to be anchored already.
    #[must_use]
    pub const fn new(field: Arc<str>, regex: Regex) -> Self {
        Self {
            field,
            regex,
            status: MatchStatus::Undecided,
        }
    }
}

impl FieldMatcher for RegexpMatcher {
    fn begin(&mut self) -> MatchStatus {
        self.status
    }

    fn on_field(&mut self, name: &str, value: &str) -> MatchStatus {
        if self.status.is_decided() || name != &*self.field {
            return self.status;
        }

        self.status = if self.regex.is_match(value) {
            MatchStatus::Matched
        } else {
            MatchStatus::CannotMatch
        };
        self.status
    }

    fn reset(&mut self) {
        self.status = MatchStatus::Undecided;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn value_matcher(field: &str, expected: &str) -> ValueMatcher {
        ValueMatcher::new(Arc::from(field), Arc::from(expected))
    }

    #[rstest]
    fn test_value_ignores_other_fields() {
        let mut matcher = value_matcher("channel", "trades");

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("op", "trades"), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("channel", "trades"), MatchStatus::Matched);
    }

    #[rstest]
    fn test_value_first_occurrence_decides() {
        let mut matcher = value_matcher("channel", "trades");

        assert_eq!(matcher.on_field("channel", "book"), MatchStatus::CannotMatch);
        assert_eq!(
            matcher.on_field("channel", "trades"),
            MatchStatus::CannotMatch
        );
    }

    #[rstest]
    fn test_value_compares_literal_text() {
        let mut matcher = value_matcher("code", "0");
        assert_eq!(matcher.on_field("code", "0.0"), MatchStatus::CannotMatch);
    }

    #[rstest]
    fn test_value_reset_behaves_like_fresh() {
        let mut matcher = value_matcher("channel", "trades");
        matcher.on_field("channel", "book");

        matcher.reset();

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("channel", "trades"), MatchStatus::Matched);
    }

    #[rstest]
    #[case("BTC-USDT", MatchStatus::Matched)]
    #[case("ETH-USDT", MatchStatus::CannotMatch)]
    fn test_regexp_matches_whole_value(#[case] value: &str, #[case] expected: MatchStatus) {
        let regex = Regex::new("^(?:BTC-.*)$").unwrap();
        let mut matcher = RegexpMatcher::new(Arc::from("instId"), regex);

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("instId", value), expected);
    }

    #[rstest]
    fn test_any_matches_at_begin() {
        let mut matcher = AnyMatcher;
        assert_eq!(matcher.begin(), MatchStatus::Matched);
    }
}
