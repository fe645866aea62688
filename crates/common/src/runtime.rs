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

//! The centralized Tokio runtime for wiremux clients.

use std::{future::Future, sync::OnceLock};

use tokio::{
    runtime::{Handle, Runtime},
    task::JoinHandle,
};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Retrieves a reference to a globally shared Tokio runtime.
/// The runtime is lazily initialized on the first call and reused thereafter.
///
/// This global runtime is intended for use cases where passing a runtime
/// around is impractical. It uses default configuration values.
///
/// # Panics
///
/// Panics if the runtime could not be created, which typically indicates
/// an inability to spawn threads or allocate necessary resources.
pub fn get_runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::new().expect("Failed to create tokio runtime"))
}

/// Spawns `future` on the runtime of the calling context, falling back to the
/// shared runtime when called from outside of any Tokio runtime.
///
/// Spawning on the caller's runtime keeps timers consistent with that runtime's
/// clock, which matters for tests running with a paused clock.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => handle.spawn(future),
        Err(_) => get_runtime().spawn(future),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_spawn_outside_runtime_uses_shared_runtime() {
        let handle = spawn(async { 40 + 2 });
        let value = get_runtime().block_on(handle).unwrap();
        assert_eq!(value, 42);
    }

    #[rstest]
    #[tokio::test]
    async fn test_spawn_inside_runtime_uses_current_runtime() {
        let handle = spawn(async { "done" });
        assert_eq!(handle.await.unwrap(), "done");
    }

    #[rstest]
    fn test_get_runtime_is_shared() {
        let first = get_runtime() as *const Runtime;
        let second = get_runtime() as *const Runtime;
        assert_eq!(first, second);
    }
}
