use serde::{Deserialize, Serialize};

use crate::backend::{CallRecord, MessageRecord};

/// Dashboard counters over the current history lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_calls: usize,
    pub completed_calls: usize,
    pub failed_calls: usize,
    pub total_messages: usize,
    /// Sum of call durations in seconds
    pub talk_time_secs: u64,
}

impl HistoryStats {
    pub fn from_records(calls: &[CallRecord], messages: &[MessageRecord]) -> Self {
        let status_count = |wanted: &str| calls.iter().filter(|c| c.status.eq_ignore_ascii_case(wanted)).count();
        Self {
            total_calls: calls.len(),
            completed_calls: status_count("completed"),
            failed_calls: status_count("failed"),
            total_messages: messages.len(),
            talk_time_secs: calls.iter().map(CallRecord::duration_secs).sum(),
        }
    }

    /// Completed calls as a percentage of all calls
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.completed_calls as f64 * 100.0 / self.total_calls as f64
        }
    }
}
