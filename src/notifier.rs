//! Hands newly created activities to the real-time update layer.
//!
//! The store never waits on a notifier: `notify` is fire-and-forget and a
//! notifier with nobody listening simply drops the message.

use log::{debug, trace};
use tokio::sync::broadcast;

use crate::activities::Activity;

pub trait Notifier: Send + Sync {
    fn notify(&self, activity: &Activity);
}

/// Fans activities out over a tokio broadcast channel. The real-time layer
/// holds receivers obtained from [`BroadcastNotifier::subscribe`].
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Activity>,
}

impl BroadcastNotifier {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Activity> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, activity: &Activity) {
        match self.sender.send(activity.clone()) {
            Ok(receivers) => {
                debug!(
                    "Broadcast activity {} to {} subscriber(s)",
                    activity.id, receivers
                );
            }
            Err(_) => {
                // No receivers at the moment
                trace!("No subscribers for activity {}", activity.id);
            }
        }
    }
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _activity: &Activity) {}
}

#[cfg(test)]
pub mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Keeps every activity it is handed, in order
    #[derive(Default)]
    pub struct RecordingNotifier {
        seen: Mutex<Vec<Activity>>,
    }

    impl RecordingNotifier {
        pub fn seen(&self) -> Vec<Activity> {
            self.seen.lock().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, activity: &Activity) {
            self.seen.lock().push(activity.clone());
        }
    }
}
