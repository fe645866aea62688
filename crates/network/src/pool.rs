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

//! Free lists for objects reused on the dispatch hot path.

use std::{fmt::Debug, sync::Mutex};

use wiremux_core::MUTEX_POISONED;

/// A thread-safe free list of reusable objects.
///
/// Objects are created on demand when the pool is empty and returned with
/// [`ObjectPool::release`]. The pool never shrinks below its high-water mark unless a
/// `max_idle` bound is set.
pub struct ObjectPool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T> Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ObjectPool))
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl<T> ObjectPool<T> {
    /// Creates a new pool keeping at most `max_idle` released objects.
    #[must_use]
    pub const fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Takes an idle object, or creates one with `create` when none is available.
    pub fn acquire_or_else<F>(&self, create: F) -> T
    where
        F: FnOnce() -> T,
    {
        let idle = self.idle.lock().expect(MUTEX_POISONED).pop();
        idle.unwrap_or_else(create)
    }

    /// Returns an object to the pool. The caller is responsible for clearing its state.
    pub fn release(&self, item: T) {
        let mut idle = self.idle.lock().expect(MUTEX_POISONED);
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }

    /// Returns the number of idle objects.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect(MUTEX_POISONED).len()
    }
}
