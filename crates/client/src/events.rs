//! Session lifecycle events backed by a `tokio::sync::broadcast` channel.
//!
//! [`SessionEvents`] is shared via `Arc` between the HTTP adapter (which
//! publishes [`SessionEvent::Expired`]) and the session controller (which
//! publishes logins and logouts and listens for expiry).

use pomgmt_core::session::UserId;
use tokio::sync::broadcast;

/// Something that changed the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login succeeded and a credential was saved.
    LoggedIn { user_id: UserId },
    /// The user signed out explicitly.
    LoggedOut,
    /// The server rejected the active credential with a 401.
    Expired,
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// In-process fan-out bus for [`SessionEvent`]s.
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when there are none.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
