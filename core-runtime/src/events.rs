//! # Session Event Bus
//!
//! Broadcasts session state changes using `tokio::sync::broadcast` so hosts
//! can update UI (signed-in badge, "working anonymously" hints) without
//! polling the session manager.
//!
//! ```rust
//! use core_runtime::events::{EventBus, SessionEvent};
//!
//! let bus = EventBus::new(16);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(SessionEvent::LoggedOut);
//! assert_eq!(receiver.try_recv().unwrap(), SessionEvent::LoggedOut);
//! ```

use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 32;

/// Session lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was established (`origin` is `token`, `credentials` or `anonymous`)
    Connected { origin: String },
    /// The cached session token was refused and discarded
    TokenInvalidated,
    /// New credentials were accepted from the login prompt
    CredentialsStored { anonymous: bool },
    /// The user dismissed the login prompt
    PromptCancelled,
    LoggedOut,
    /// The backend dropped an established session
    SessionLost,
    /// No non-interactive strategy produced a session
    Unavailable { reason: String },
}

/// Broadcast channel for [`SessionEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Subscribers lagging by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers reached.
    pub fn emit(&self, event: SessionEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "No subscribers for session event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
