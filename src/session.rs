//! Session termination as an explicit event.
//!
//! The refresh coordinator clears the credential store and then hands a
//! [`SessionEvent`] to its [`SessionTerminator`] exactly once per failed
//! cycle. Routing the user back to a sign-in screen is up to whoever
//! subscribes.

use jiff::Timestamp;
use tokio::sync::broadcast;
use tracing::{Level, debug, event};
use uuid::Uuid;

use crate::errors::RefreshError;

#[derive(Clone, Debug)]
pub enum SessionEvent {
    Terminated {
        cycle_id: Uuid,
        reason: RefreshError,
        at: Timestamp,
    },
}

pub trait SessionTerminator: Send + Sync {
    fn terminate(&self, event: SessionEvent);
}

/// Broadcasts session events to any number of subscribers.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(16)
    }
}

impl SessionTerminator for SessionEvents {
    fn terminate(&self, session_event: SessionEvent) {
        let SessionEvent::Terminated {
            cycle_id, reason, ..
        } = &session_event;
        event!(
            Level::WARN,
            cycle_id = %cycle_id,
            reason = %reason,
            "session.terminated"
        );
        if self.sender.send(session_event).is_err() {
            debug!("no session subscribers");
        }
    }
}
