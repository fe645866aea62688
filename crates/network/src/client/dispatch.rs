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

//! Content-based routing of inbound messages to topic handlers.

use std::ops::ControlFlow;

use super::registry::{ActiveMatcher, Registry};
use crate::{matcher::MatchStatus, scan::scan_fields};

/// Routes `text` to every topic whose matcher accepts it.
///
/// System managers are evaluated first and are exclusive: once one matches, no further
/// handler is called for the message. Returns the number of handlers called.
pub(crate) fn dispatch(registry: &Registry, text: &str) -> usize {
    let mut active = registry.acquire();
    let delivered = route(&mut active, text);
    registry.release(active);
    delivered
}

fn route(active: &mut [ActiveMatcher], text: &str) -> usize {
    let mut delivered = 0;
    let mut undecided = 0;

    for entry in active.iter_mut() {
        entry.status = entry.matcher.begin();
        match entry.status {
            MatchStatus::Matched => {
                entry.manager.deliver(text);
                delivered += 1;
                if entry.manager.is_system() {
                    return delivered;
                }
            }
            MatchStatus::Undecided => undecided += 1,
            MatchStatus::CannotMatch => {}
        }
    }

    if undecided == 0 {
        return delivered;
    }

    let result = scan_fields(text, |name, value| {
        for entry in active
            .iter_mut()
            .filter(|e| e.status == MatchStatus::Undecided)
        {
            entry.status = entry.matcher.on_field(name, value);
            match entry.status {
                MatchStatus::Matched => {
                    entry.manager.deliver(text);
                    delivered += 1;
                    undecided -= 1;
                    if entry.manager.is_system() {
                        return ControlFlow::Break(());
                    }
                }
                MatchStatus::CannotMatch => undecided -= 1,
                MatchStatus::Undecided => {}
            }
        }

        if undecided == 0 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    if let Err(e) = result {
        tracing::warn!("Malformed message, routing stopped: {e}");
    }

    delivered
}
