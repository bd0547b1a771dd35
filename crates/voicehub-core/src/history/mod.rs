//! Call and message history
//!
//! [`HistoryStore`] keeps the last successfully fetched lists. A refresh
//! replaces a list wholesale; a failed refresh keeps the previous list and is
//! only logged, never surfaced to the operator.

pub mod filter;
pub mod stats;

use std::sync::Arc;

use chrono::FixedOffset;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::backend::{Backend, CallRecord, MessageRecord};
use crate::events::{EventEmitter, HistoryKind, HubEvent};

pub use filter::{filter_calls, filter_messages, DateRange, Direction, DurationBucket, HistoryFilter};
pub use stats::HistoryStats;

struct HistoryInner {
    backend: Arc<dyn Backend>,
    events: EventEmitter,
    offset: FixedOffset,
    calls: RwLock<Vec<CallRecord>>,
    messages: RwLock<Vec<MessageRecord>>,
}

#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<HistoryInner>,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn Backend>, offset: FixedOffset, events: EventEmitter) -> Self {
        Self {
            inner: Arc::new(HistoryInner {
                backend,
                events,
                offset,
                calls: RwLock::new(Vec::new()),
                messages: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Refresh the call list. Returns whether the list was replaced.
    pub async fn fetch_call_history(&self, limit: u32) -> bool {
        match self.inner.backend.call_logs(limit).await {
            Ok(calls) => {
                let count = calls.len();
                *self.inner.calls.write() = calls;
                debug!(count, limit, "call history refreshed");
                self.inner.events.emit(HubEvent::HistoryUpdated {
                    kind: HistoryKind::Calls,
                    count,
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "error fetching call logs, keeping previous list");
                false
            }
        }
    }

    /// Refresh the message list. Returns whether the list was replaced.
    pub async fn fetch_message_history(&self) -> bool {
        match self.inner.backend.message_logs().await {
            Ok(messages) => {
                let count = messages.len();
                *self.inner.messages.write() = messages;
                debug!(count, "message history refreshed");
                self.inner.events.emit(HubEvent::HistoryUpdated {
                    kind: HistoryKind::Messages,
                    count,
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "error fetching message logs, keeping previous list");
                false
            }
        }
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.inner.calls.read().clone()
    }

    pub fn messages(&self) -> Vec<MessageRecord> {
        self.inner.messages.read().clone()
    }

    /// Offset used to read calendar days in date filters
    pub fn utc_offset(&self) -> FixedOffset {
        self.inner.offset
    }

    /// Date range for `start..=end` in the store's offset
    pub fn date_range(&self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> crate::ClientResult<DateRange> {
        Ok(DateRange::new(start, end)?.with_offset(self.inner.offset))
    }

    pub fn filtered_calls(&self, filter: &HistoryFilter) -> Vec<CallRecord> {
        filter_calls(&self.inner.calls.read(), filter)
    }

    pub fn filtered_messages(&self, filter: &HistoryFilter) -> Vec<MessageRecord> {
        filter_messages(&self.inner.messages.read(), filter)
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats::from_records(&self.inner.calls.read(), &self.inner.messages.read())
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("calls", &self.inner.calls.read().len())
            .field("messages", &self.inner.messages.read().len())
            .field("offset", &self.inner.offset)
            .finish()
    }
}
