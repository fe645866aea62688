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

//! Declarative matcher descriptions, loadable from configuration.

use serde::{Deserialize, Serialize};

use super::MatcherTemplate;
use crate::error::MuxResult;

/// A serializable description of a matcher tree.
///
/// Compile it with [`MatcherSpec::compile`] to obtain a [`MatcherTemplate`] which
/// produces matcher instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherSpec {
    Any,
    Value { field: String, value: String },
    Regexp { field: String, pattern: String },
    And { children: Vec<Self> },
    Or { children: Vec<Self> },
}

impl MatcherSpec {
    /// Compiles the description, validating every regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MuxError::InvalidMatcher`] if any pattern is invalid.
    pub fn compile(&self) -> MuxResult<MatcherTemplate> {
        Ok(match self {
            Self::Any => super::any(),
            Self::Value { field, value } => super::value(field, value),
            Self::Regexp { field, pattern } => super::regexp(field, pattern)?,
            Self::And { children } => super::and(compile_all(children)?),
            Self::Or { children } => super::or(compile_all(children)?),
        })
    }
}

fn compile_all(children: &[MatcherSpec]) -> MuxResult<Vec<MatcherTemplate>> {
    children.iter().map(MatcherSpec::compile).collect()
}
