//! Event broadcasting for UI integration
//!
//! Everything a front-end needs to re-render flows through [`HubEvent`]:
//! session status transitions, activity-log lines, call state changes,
//! refreshed history, device lists and connectivity. Events are fanned out
//! over a tokio broadcast channel; slow subscribers lose the oldest events
//! rather than blocking the producers.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::call::{Call, CallState};
use crate::devices::DeviceLists;
use crate::logging::LogEntry;
use crate::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Calls,
    Messages,
}

#[derive(Debug, Clone)]
pub enum HubEvent {
    /// Session status badge changed
    StatusChanged(SessionStatus),

    /// New activity-log line
    Log(LogEntry),

    CallStateChanged {
        call: Call,
        previous_state: Option<CallState>,
    },

    IncomingCall {
        from: String,
    },

    HistoryUpdated {
        kind: HistoryKind,
        count: usize,
    },

    DevicesChanged(DeviceLists),

    NetworkChanged {
        online: bool,
    },

    MessageSent {
        sid: String,
        to: String,
    },
}

pub type EventStream = BroadcastStream<HubEvent>;

pub struct EventIterator {
    stream: EventStream,
}

impl EventIterator {
    pub fn new(stream: EventStream) -> Self {
        Self { stream }
    }

    /// Next event, skipping over lag notifications. `None` once the emitter
    /// is gone.
    pub async fn next(&mut self) -> Option<HubEvent> {
        use tokio_stream::StreamExt;
        loop {
            match self.stream.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(_lagged)) => continue,
                None => return None,
            }
        }
    }
}

#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<HubEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: HubEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn subscribe_simple(&self) -> EventIterator {
        EventIterator::new(self.subscribe())
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}
