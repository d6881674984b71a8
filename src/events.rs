//! Lifecycle events published by the core.
//!
//! UI collaborators subscribe to these to show expiry warnings, return to the
//! unlock prompt, or refresh the trash view. Publishing never blocks and nobody
//! is required to listen.

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::records::RecordId;
use std::time::Duration;
use tokio::sync::broadcast;

/// Something observable happened to the session or the trash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The session will expire in `remaining` unless activity extends it.
    SessionExpiring {
        /// Time left before the key is cleared
        remaining: Duration,
    },
    /// The session timed out and the key was cleared.
    SessionExpired,
    /// A soft-deleted record was permanently removed by a purge or bulk empty.
    TrashItemPurged {
        /// The removed record
        id: RecordId,
    },
}

/// Sending half of the lifecycle channel.
pub type EventSender = broadcast::Sender<LifecycleEvent>;
/// Receiving half of the lifecycle channel.
pub type EventReceiver = broadcast::Receiver<LifecycleEvent>;

/// Creates a lifecycle event channel with the default capacity.
pub fn channel() -> (EventSender, EventReceiver) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Publishes `event`, ignoring the "no subscribers" case.
pub(crate) fn publish(sender: Option<&EventSender>, event: LifecycleEvent) {
    if let Some(sender) = sender {
        let _ = sender.send(event);
    }
}
