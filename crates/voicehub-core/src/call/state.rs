//! Call state machine
//!
//! Every state change of a call goes through [`CallState::next`], which looks
//! the `(state, trigger)` pair up in a single transition table. Pairs missing
//! from the table are not transitions; the controller ignores them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the call slot
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallState {
    /// No call
    #[default]
    Idle,
    /// Outbound connection requested, retry window included
    Placing,
    /// Outbound call dialed, or inbound call offered
    Ringing,
    /// Media flowing
    Active,
    /// Local hangup requested, waiting for the disconnect event
    Disconnecting,
}

/// Inputs that drive [`CallState`]
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum CallTrigger {
    /// Operator started an outbound call
    Place,
    /// SDK returned a call object for the outbound request
    Dialed,
    /// SDK offered an inbound call
    Incoming,
    /// Remote (or local, for inbound) side accepted
    Accept,
    /// Operator hung up
    Hangup,
    /// SDK reported the call gone
    Disconnect,
    /// Placement failed for good
    Fail,
}

const TRANSITIONS: &[(CallState, CallTrigger, CallState)] = &[
    // Idle -> Placing: start an outbound call
    (CallState::Idle, CallTrigger::Place, CallState::Placing),
    // Idle -> Ringing: inbound call offered
    (CallState::Idle, CallTrigger::Incoming, CallState::Ringing),
    // Placing -> Ringing: the SDK accepted the connect request
    (CallState::Placing, CallTrigger::Dialed, CallState::Ringing),
    // Placing -> Idle: every attempt failed
    (CallState::Placing, CallTrigger::Fail, CallState::Idle),
    (CallState::Ringing, CallTrigger::Accept, CallState::Active),
    (CallState::Ringing, CallTrigger::Hangup, CallState::Disconnecting),
    (CallState::Ringing, CallTrigger::Disconnect, CallState::Idle),
    (CallState::Active, CallTrigger::Hangup, CallState::Disconnecting),
    (CallState::Active, CallTrigger::Disconnect, CallState::Idle),
    (CallState::Disconnecting, CallTrigger::Disconnect, CallState::Idle),
];

impl CallState {
    /// Next state for `trigger`, or `None` when the pair is not a transition
    pub fn next(self, trigger: CallTrigger) -> Option<CallState> {
        TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == self && *on == trigger)
            .map(|(_, _, to)| *to)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CallState::Idle)
    }

    /// A call object exists and can carry media or DTMF
    pub fn has_call(&self) -> bool {
        matches!(self, CallState::Ringing | CallState::Active | CallState::Disconnecting)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::Placing => "placing",
            CallState::Ringing => "ringing",
            CallState::Active => "active",
            CallState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}
