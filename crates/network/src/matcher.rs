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

//! Streaming field matchers used to route messages to topics.
//!
//! A matcher observes the `(field, value)` pairs of one message in document order and
//! decides, as early as possible, whether the message belongs to its topic. Matchers are
//! stateful per message and reused across messages through [`FieldMatcher::reset`].
//!
//! Matchers are built from a [`MatcherTemplate`], either directly through the
//! constructors in this module or from a declarative [`MatcherSpec`]:
//!
//! ```
//! use wiremux_network::matcher::{self, MatcherFactory, MatchStatus};
//!
//! let template = matcher::and(vec![
//!     matcher::value("channel", "trades"),
//!     matcher::regexp("symbol", "BTC-.*").unwrap(),
//! ]);
//!
//! let mut m = template.create();
//! assert_eq!(m.begin(), MatchStatus::Undecided);
//! assert_eq!(m.on_field("channel", "trades"), MatchStatus::Undecided);
//! assert_eq!(m.on_field("symbol", "BTC-USD"), MatchStatus::Matched);
//! ```

mod composite;
mod leaf;
mod spec;

use std::{fmt::Debug, sync::Arc};

use regex::Regex;
use strum::{AsRefStr, Display};

pub use self::{
    composite::{AndMatcher, OrMatcher},
    leaf::{AnyMatcher, RegexpMatcher, ValueMatcher},
    spec::MatcherSpec,
};
use crate::error::{MuxError, MuxResult};

/// The decision state of a matcher for the current message.
#[derive(Clone, Copy, Debug, Display, AsRefStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum MatchStatus {
    /// The message belongs to the topic.
    Matched,
    /// The message cannot belong to the topic whatever fields follow.
    CannotMatch,
    /// More fields are needed to decide.
    Undecided,
}

impl MatchStatus {
    /// Returns `true` once the matcher has reached a final decision for the message.
    #[inline]
    #[must_use]
    pub const fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

/// A stateful, streaming predicate over the fields of one message.
pub trait FieldMatcher: Send + Debug {
    /// Called once per message before any field is observed.
    fn begin(&mut self) -> MatchStatus;

    /// Observes one field. `value` is the scalar text (strings unescaped, numbers as
    /// written, `true`/`false`/`null` literally).
    fn on_field(&mut self, name: &str, value: &str) -> MatchStatus;

    /// Clears all per-message state so the matcher behaves like a fresh instance.
    fn reset(&mut self);
}

/// Produces fresh matcher instances for a topic.
pub trait MatcherFactory: Send + Sync {
    /// Creates a new matcher in its initial state.
    fn create(&self) -> Box<dyn FieldMatcher>;
}

impl<F> MatcherFactory for F
where
    F: Fn() -> Box<dyn FieldMatcher> + Send + Sync,
{
    fn create(&self) -> Box<dyn FieldMatcher> {
        self()
    }
}

/// A compiled, cheaply cloneable description of a matcher tree.
#[derive(Clone, Debug)]
pub enum MatcherTemplate {
    Any,
    Value { field: Arc<str>, value: Arc<str> },
    Regexp { field: Arc<str>, regex: Regex },
    And(Arc<[Self]>),
    Or(Arc<[Self]>),
}

impl MatcherFactory for MatcherTemplate {
    fn create(&self) -> Box<dyn FieldMatcher> {
        match self {
            Self::Any => Box::new(AnyMatcher),
            Self::Value { field, value } => {
                Box::new(ValueMatcher::new(field.clone(), value.clone()))
            }
            Self::Regexp { field, regex } => {
                Box::new(RegexpMatcher::new(field.clone(), regex.clone()))
            }
            Self::And(children) => {
                Box::new(AndMatcher::new(children.iter().map(Self::create).collect()))
            }
            Self::Or(children) => {
                Box::new(OrMatcher::new(children.iter().map(Self::create).collect()))
            }
        }
    }
}

/// Matches every message.
#[must_use]
pub const fn any() -> MatcherTemplate {
    MatcherTemplate::Any
}

/// Matches messages whose `field` equals `value` exactly.
#[must_use]
pub fn value(field: &str, value: &str) -> MatcherTemplate {
    MatcherTemplate::Value {
        field: Arc::from(field),
        value: Arc::from(value),
    }
}

/// Matches messages whose whole `field` value matches the regular expression `pattern`.
///
/// # Errors
///
/// Returns [`MuxError::InvalidMatcher`] if `pattern` is not a valid regular expression.
pub fn regexp(field: &str, pattern: &str) -> MuxResult<MatcherTemplate> {
    let regex = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| MuxError::InvalidMatcher(format!("field '{field}': {e}")))?;

    Ok(MatcherTemplate::Regexp {
        field: Arc::from(field),
        regex,
    })
}

/// Matches messages matched by all `children`. An empty list matches every message.
#[must_use]
pub fn and(children: Vec<MatcherTemplate>) -> MatcherTemplate {
    MatcherTemplate::And(children.into())
}

/// Matches messages matched by at least one of `children`. An empty list matches nothing.
#[must_use]
pub fn or(children: Vec<MatcherTemplate>) -> MatcherTemplate {
    MatcherTemplate::Or(children.into())
}
