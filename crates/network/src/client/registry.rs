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

//! Topic managers and the subscription registry read by dispatch.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use ahash::AHashMap;
use wiremux_core::MUTEX_POISONED;

use crate::{
    matcher::{FieldMatcher, MatchStatus, MatcherFactory},
    pool::ObjectPool,
    types::MessageHandler,
};

/// Routing state for one topic: how to recognize its messages and where to deliver them.
pub(crate) struct TopicManager {
    topic: String,
    factory: Arc<dyn MatcherFactory>,
    handler: MessageHandler,
    system: bool,
    matchers: ObjectPool<Box<dyn FieldMatcher>>,
}

impl Debug for TopicManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(TopicManager))
            .field("topic", &self.topic)
            .field("system", &self.system)
            .field("matchers", &self.matchers)
            .finish_non_exhaustive()
    }
}

impl TopicManager {
    pub(crate) fn new(
        topic: String,
        factory: Arc<dyn MatcherFactory>,
        handler: MessageHandler,
        system: bool,
    ) -> Self {
        Self {
            topic,
            factory,
            handler,
            system,
            matchers: ObjectPool::default(),
        }
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) const fn is_system(&self) -> bool {
        self.system
    }

    pub(crate) fn deliver(&self, text: &str) {
        (self.handler)(text);
    }

    fn acquire(&self) -> Box<dyn FieldMatcher> {
        self.matchers.acquire_or_else(|| self.factory.create())
    }

    fn release(&self, mut matcher: Box<dyn FieldMatcher>) {
        matcher.reset();
        self.matchers.release(matcher);
    }
}

/// A manager paired with one matcher instance for the duration of one dispatch.
#[derive(Debug)]
pub(crate) struct ActiveMatcher {
    pub(crate) manager: Arc<TopicManager>,
    pub(crate) matcher: Box<dyn FieldMatcher>,
    pub(crate) status: MatchStatus,
}

#[derive(Debug, Default)]
struct RegistryState {
    business: AHashMap<String, Arc<TopicManager>>,
    system: Vec<Arc<TopicManager>>,
}

/// Business subscriptions by topic plus the permanent system managers.
///
/// Mutated by the worker (business) and hook initialization (system), read by dispatch.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
    lists: ObjectPool<Vec<ActiveMatcher>>,
}

impl Registry {
    /// Registers a business manager, returning `false` if the topic is already taken.
    pub(crate) fn insert(&self, manager: Arc<TopicManager>) -> bool {
        let mut state = self.state.lock().expect(MUTEX_POISONED);
        if state.business.contains_key(manager.topic()) {
            return false;
        }
        state.business.insert(manager.topic().to_string(), manager);
        true
    }

    pub(crate) fn remove(&self, topic: &str) -> Option<Arc<TopicManager>> {
        self.state
            .lock()
            .expect(MUTEX_POISONED)
            .business
            .remove(topic)
    }

    pub(crate) fn add_system(&self, manager: Arc<TopicManager>) {
        self.state
            .lock()
            .expect(MUTEX_POISONED)
            .system
            .push(manager);
    }

    /// Returns the registered business topics, in no particular order.
    pub(crate) fn topics(&self) -> Vec<String> {
        self.state
            .lock()
            .expect(MUTEX_POISONED)
            .business
            .keys()
            .cloned()
            .collect()
    }

    /// Pairs every manager with a matcher, system managers first.
    pub(crate) fn acquire(&self) -> Vec<ActiveMatcher> {
        let mut list = self.lists.acquire_or_else(Vec::new);
        let state = self.state.lock().expect(MUTEX_POISONED);

        for manager in state.system.iter().chain(state.business.values()) {
            list.push(ActiveMatcher {
                manager: manager.clone(),
                matcher: manager.acquire(),
                status: MatchStatus::Undecided,
            });
        }
        list
    }

    /// Resets and returns every matcher to its manager, then pools the list.
    pub(crate) fn release(&self, mut list: Vec<ActiveMatcher>) {
        for active in list.drain(..) {
            active.manager.release(active.matcher);
        }
        self.lists.release(list);
    }
}
