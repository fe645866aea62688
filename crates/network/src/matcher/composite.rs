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

//! Composite matchers combining child decisions.

use super::{FieldMatcher, MatchStatus};

/// A child matcher together with its last known decision for the current message.
#[derive(Debug)]
struct Child {
    matcher: Box<dyn FieldMatcher>,
    status: MatchStatus,
}

#[derive(Debug)]
struct Children(Vec<Child>);

impl Children {
    fn new(matchers: Vec<Box<dyn FieldMatcher>>) -> Self {
        Self(
            matchers
                .into_iter()
                .map(|matcher| Child {
                    matcher,
                    status: MatchStatus::Undecided,
                })
                .collect(),
        )
    }

    fn begin(&mut self) {
        for child in &mut self.0 {
            child.status = child.matcher.begin();
        }
    }

    // Decided children are not fed further fields
    fn on_field(&mut self, name: &str, value: &str) {
        for child in self.0.iter_mut().filter(|c| !c.status.is_decided()) {
            child.status = child.matcher.on_field(name, value);
        }
    }

    fn reset(&mut self) {
        for child in &mut self.0 {
            child.matcher.reset();
            child.status = MatchStatus::Undecided;
        }
    }

    fn all(&self, status: MatchStatus) -> bool {
        self.0.iter().all(|c| c.status == status)
    }

    fn any(&self, status: MatchStatus) -> bool {
        self.0.iter().any(|c| c.status == status)
    }
}

/// Matches when every child has matched; fails as soon as one child cannot match.
#[derive(Debug)]
pub struct AndMatcher {
    children: Children,
    status: MatchStatus,
}

impl AndMatcher {
    #[must_use]
    pub fn new(children: Vec<Box<dyn FieldMatcher>>) -> Self {
        Self {
            children: Children::new(children),
            status: MatchStatus::Undecided,
        }
    }

    fn evaluate(&mut self) -> MatchStatus {
        self.status = if self.children.any(MatchStatus::CannotMatch) {
            MatchStatus::CannotMatch
        } else if self.children.all(MatchStatus::Matched) {
            MatchStatus::Matched
        } else {
            MatchStatus::Undecided
        };
        self.status
    }
}

impl FieldMatcher for AndMatcher {
    fn begin(&mut self) -> MatchStatus {
        self.children.begin();
        self.evaluate()
    }

    fn on_field(&mut self, name: &str, value: &str) -> MatchStatus {
        if self.status.is_decided() {
            return self.status;
        }
        self.children.on_field(name, value);
        self.evaluate()
    }

    fn reset(&mut self) {
        self.children.reset();
        self.status = MatchStatus::Undecided;
    }
}

/// Matches as soon as one child has matched; fails once every child cannot match.
#[derive(Debug)]
pub struct OrMatcher {
    children: Children,
    status: MatchStatus,
}

impl OrMatcher {
    #[must_use]
    pub fn new(children: Vec<Box<dyn FieldMatcher>>) -> Self {
        Self {
            children: Children::new(children),
            status: MatchStatus::Undecided,
        }
    }

    fn evaluate(&mut self) -> MatchStatus {
        self.status = if self.children.any(MatchStatus::Matched) {
            MatchStatus::Matched
        } else if self.children.all(MatchStatus::CannotMatch) {
            MatchStatus::CannotMatch
        } else {
            MatchStatus::Undecided
        };
        self.status
    }
}

impl FieldMatcher for OrMatcher {
    fn begin(&mut self) -> MatchStatus {
        self.children.begin();
        self.evaluate()
    }

    fn on_field(&mut self, name: &str, value: &str) -> MatchStatus {
        if self.status.is_decided() {
            return self.status;
        }
        self.children.on_field(name, value);
        self.evaluate()
    }

    fn reset(&mut self) {
        self.children.reset();
        self.status = MatchStatus::Undecided;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;
    use crate::matcher::{AnyMatcher, ValueMatcher};

    fn value(field: &str, expected: &str) -> Box<dyn FieldMatcher> {
        Box::new(ValueMatcher::new(Arc::from(field), Arc::from(expected)))
    }

    #[rstest]
    fn test_empty_and_matches_at_begin() {
        let mut matcher = AndMatcher::new(vec![]);
        assert_eq!(matcher.begin(), MatchStatus::Matched);
    }

    #[rstest]
    fn test_empty_or_cannot_match_at_begin() {
        let mut matcher = OrMatcher::new(vec![]);
        assert_eq!(matcher.begin(), MatchStatus::CannotMatch);
    }

    #[rstest]
    fn test_and_requires_all_children() {
        let mut matcher = AndMatcher::new(vec![value("a", "1"), value("b", "2")]);

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("b", "2"), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("a", "1"), MatchStatus::Matched);
    }

    #[rstest]
    fn test_and_fails_fast() {
        let mut matcher = AndMatcher::new(vec![value("a", "1"), value("b", "2")]);

        matcher.begin();
        assert_eq!(matcher.on_field("a", "9"), MatchStatus::CannotMatch);
    }

    #[rstest]
    fn test_and_does_not_refeed_decided_child() {
        let mut matcher = AndMatcher::new(vec![value("a", "1"), value("b", "2")]);

        matcher.begin();
        matcher.on_field("a", "1");
        // A later `a` must not flip the already matched child
        assert_eq!(matcher.on_field("a", "9"), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("b", "2"), MatchStatus::Matched);
    }

    #[rstest]
    fn test_and_with_any_child() {
        let mut matcher = AndMatcher::new(vec![Box::new(AnyMatcher), value("a", "1")]);

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("a", "1"), MatchStatus::Matched);
    }

    #[rstest]
    fn test_or_matches_on_first_match() {
        let mut matcher = OrMatcher::new(vec![value("a", "1"), value("b", "2")]);

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("b", "2"), MatchStatus::Matched);
    }

    #[rstest]
    fn test_or_fails_once_all_children_fail() {
        let mut matcher = OrMatcher::new(vec![value("a", "1"), value("b", "2")]);

        matcher.begin();
        assert_eq!(matcher.on_field("a", "0"), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("b", "0"), MatchStatus::CannotMatch);
    }

    #[rstest]
    fn test_or_with_any_child_matches_at_begin() {
        let mut matcher = OrMatcher::new(vec![value("a", "1"), Box::new(AnyMatcher)]);
        assert_eq!(matcher.begin(), MatchStatus::Matched);
    }

    #[rstest]
    fn test_reset_clears_children() {
        let mut matcher = OrMatcher::new(vec![value("a", "1")]);
        matcher.begin();
        assert_eq!(matcher.on_field("a", "0"), MatchStatus::CannotMatch);

        matcher.reset();

        assert_eq!(matcher.begin(), MatchStatus::Undecided);
        assert_eq!(matcher.on_field("a", "1"), MatchStatus::Matched);
    }
}
