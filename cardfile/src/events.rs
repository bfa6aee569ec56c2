//! Authentication state notifications
//!
//! Auth changes are published on a broadcast channel. Anything that renders
//! the current user subscribes; the auth service knows nothing about them.

use crate::database::User;
use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging
pub const DEFAULT_CAPACITY: usize = 64;

/// Public view of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    AuthStateChanged {
        user: Option<UserSummary>,
        is_authenticated: bool,
    },
}

/// Broadcast bus for [`AuthEvent`]s
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send to every subscriber. Dropped silently when nobody listens.
    pub fn emit(&self, event: AuthEvent) {
        tracing::debug!(
            subscriber_count = self.tx.receiver_count(),
            ?event,
            "Auth event"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
