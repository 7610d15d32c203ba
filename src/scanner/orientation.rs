// SPDX-License-Identifier: GPL-3.0-only

//! Display orientation notifications
//!
//! The scanner subscribes when a session starts and unsubscribes when it
//! stops. A notification racing with `unsubscribe` may still be delivered
//! once, so callbacks must tolerate arriving after the session ended.

use crate::geometry::DisplayOrientation;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Callback invoked with the new orientation
pub type OrientationCallback = Arc<dyn Fn(DisplayOrientation) + Send + Sync>;

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Source of display orientation changes
pub trait OrientationSource: Send + Sync {
    fn current_orientation(&self) -> DisplayOrientation;

    fn subscribe(&self, callback: OrientationCallback) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

struct BroadcasterState {
    current: DisplayOrientation,
    next_id: u64,
    subscribers: Vec<(SubscriptionId, OrientationCallback)>,
}

/// Orientation source driven by [`OrientationBroadcaster::set_orientation`]
///
/// Used by hosts that learn about rotation from their own event loop, and
/// with a fixed orientation by the command line.
pub struct OrientationBroadcaster {
    state: Mutex<BroadcasterState>,
}

impl Default for OrientationBroadcaster {
    fn default() -> Self {
        Self::new(DisplayOrientation::default())
    }
}

impl OrientationBroadcaster {
    pub fn new(initial: DisplayOrientation) -> Self {
        Self {
            state: Mutex::new(BroadcasterState {
                current: initial,
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BroadcasterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a new orientation and notify subscribers if it changed
    pub fn set_orientation(&self, orientation: DisplayOrientation) {
        let callbacks: Vec<OrientationCallback> = {
            let mut state = self.lock();
            if state.current == orientation {
                return;
            }
            state.current = orientation;
            state.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };

        debug!(%orientation, subscribers = callbacks.len(), "Orientation changed");
        // Called without the lock so callbacks may unsubscribe
        for callback in callbacks {
            callback(orientation);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl OrientationSource for OrientationBroadcaster {
    fn current_orientation(&self) -> DisplayOrientation {
        self.lock().current
    }

    fn subscribe(&self, callback: OrientationCallback) -> SubscriptionId {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.push((id, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.retain(|(sub, _)| *sub != id);
    }
}
