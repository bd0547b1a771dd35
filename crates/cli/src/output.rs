//! Table rendering for history listings

use chrono::{DateTime, FixedOffset, Utc};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use voicehub_core::backend::{CallRecord, MessageRecord};

#[derive(Tabled)]
struct CallRow {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "SID")]
    sid: String,
}

#[derive(Tabled)]
struct MessageRow {
    #[tabled(rename = "Sent")]
    sent: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Body")]
    body: String,
}

const BODY_PREVIEW_CHARS: usize = 40;

/// `m:ss`, or `h:mm:ss` past an hour
pub fn format_duration(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn format_time(parsed: Option<DateTime<Utc>>, raw: Option<&str>, offset: FixedOffset) -> String {
    match (parsed, raw) {
        (Some(at), _) => at.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string(),
        (None, Some(raw)) => raw.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn preview(body: &str) -> String {
    let flat = body.replace(['\r', '\n'], " ");
    if flat.chars().count() <= BODY_PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(BODY_PREVIEW_CHARS - 1).collect();
        format!("{}…", cut)
    }
}

pub fn calls_table(calls: &[CallRecord], offset: FixedOffset) -> String {
    let rows = calls.iter().map(|call| CallRow {
        started: format_time(call.started_at(), call.start_time.as_deref(), offset),
        from: call.from.clone(),
        to: call.to.clone(),
        direction: call.direction.clone().unwrap_or_else(|| "-".to_string()),
        status: call.status.clone(),
        duration: format_duration(call.duration_secs()),
        sid: call.sid.clone(),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn messages_table(messages: &[MessageRecord], offset: FixedOffset) -> String {
    let rows = messages.iter().map(|message| MessageRow {
        sent: format_time(message.sent_at(), message.date_sent.as_deref(), offset),
        from: message.from.clone(),
        to: message.to.clone(),
        status: message.status.clone(),
        body: preview(&message.body),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}
