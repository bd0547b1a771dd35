//! Call control
//!
//! The [`CallController`] owns the single call slot of a session: placing
//! outbound calls (with the gateway redial policy), taking inbound calls,
//! mute, DTMF, hangup and forwarding. Call snapshots ([`Call`]) are plain
//! values handed out to callers and broadcast on every state change.

pub mod address;
pub mod controller;
pub mod state;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use address::{Destination, CLIENT_PREFIX, INVALID_DESTINATION_HINT};
pub use controller::CallController;
pub use state::{CallState, CallTrigger};

/// Local identifier of a call
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallDirection {
    Outbound,
    Inbound,
}

/// Snapshot of the call in the slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    /// Destination for outbound calls, caller for inbound ones
    pub remote: String,
    pub direction: CallDirection,
    pub state: CallState,
    pub muted: bool,
    /// Provider call identifier, known once accepted
    pub call_sid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl Call {
    fn new(remote: impl Into<String>, direction: CallDirection) -> Self {
        Self {
            id: CallId::new(),
            remote: remote.into(),
            direction,
            state: CallState::Idle,
            muted: false,
            call_sid: None,
            created_at: Utc::now(),
            connected_at: None,
        }
    }

    pub(crate) fn outbound(destination: &Destination) -> Self {
        Self::new(destination.as_str(), CallDirection::Outbound)
    }

    pub(crate) fn inbound(from: impl Into<String>, call_sid: Option<String>) -> Self {
        Self {
            call_sid,
            ..Self::new(from, CallDirection::Inbound)
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == CallState::Active
    }

    /// Time since the call was accepted
    pub fn talk_time(&self) -> Option<chrono::Duration> {
        self.connected_at.map(|at| Utc::now() - at)
    }
}

/// Symbols the keypad can send: `0-9 * # A-D` and `w` (half-second pause)
pub fn is_dtmf_symbol(c: char) -> bool {
    matches!(c, '0'..='9' | '*' | '#' | 'A'..='D' | 'w')
}
