//! Named-timer registry owned by the engine
//!
//! Each loop-scheduled timeout lives under a stable name so cancellation and
//! session teardown stay deterministic; no handle outlives the session it
//! belongs to. Cancelling means aborting the pending task, never
//! interrupting an in-flight native call.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;

/// Names for the engine's pending timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Bounded countdown confirming a seek resumes playback
    SeekTracker,
    /// Progress-stall watchdog while playing
    StallWatchdog,
}

/// Registry of pending timer tasks
#[derive(Debug, Default)]
pub struct TimerRegistry {
    handles: Mutex<HashMap<TimerKey, JoinHandle<()>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer, aborting any previous one under the same name
    pub fn insert(&self, key: TimerKey, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.lock().unwrap().insert(key, handle) {
            previous.abort();
        }
    }

    /// Cancel a timer; returns true when one was still pending
    pub fn cancel(&self, key: TimerKey) -> bool {
        match self.handles.lock().unwrap().remove(&key) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Cancel everything; used on session teardown
    pub fn cancel_all(&self) {
        for (_, handle) in self.handles.lock().unwrap().drain() {
            handle.abort();
        }
    }
}
