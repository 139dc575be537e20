//! Session state shared between foreground calls and the heartbeat task.
//!
//! The state lives behind a single lock. Writers replace it in one
//! acquisition and readers always receive a cloned snapshot, so a caller
//! can never observe a half-applied update.

use crate::types::AuthStatus;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Connection and authentication status of the brokerage session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// The gateway holds a brokerage connection.
    pub connected: bool,

    /// The brokerage session is authenticated. Never true while `connected` is false.
    pub authenticated: bool,

    /// Another session holds the brokerage lock.
    pub competing: bool,

    /// Free-form status message from the gateway.
    pub message: Option<String>,

    /// When the last successful status, tickle or logout call was applied.
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Builds a state from a gateway status report.
    #[must_use]
    pub fn from_status(status: &AuthStatus, checked_at: DateTime<Utc>) -> Self {
        Self {
            connected: status.connected,
            authenticated: status.connected && status.authenticated,
            competing: status.competing,
            message: status.message.clone().filter(|m| !m.is_empty()),
            last_checked_at: Some(checked_at),
        }
    }

    /// Returns true if the session can serve brokerage requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.connected && self.authenticated
    }
}

/// Shared cell owning a client's [`SessionState`].
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedSession {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current state.
    pub(crate) fn snapshot(&self) -> SessionState {
        self.inner.lock().clone()
    }

    /// Overwrites the state wholesale from a status report.
    pub(crate) fn apply_status(&self, status: &AuthStatus) -> SessionState {
        let next = SessionState::from_status(status, Utc::now());
        *self.inner.lock() = next.clone();
        next
    }

    /// Records a completed logout.
    pub(crate) fn mark_logged_out(&self) -> SessionState {
        let next = SessionState {
            last_checked_at: Some(Utc::now()),
            ..SessionState::default()
        };
        *self.inner.lock() = next.clone();
        next
    }
}
