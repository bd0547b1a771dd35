//! Wire types exchanged with the HTTP backend
//!
//! History records are read-only snapshots. Fields the client does not
//! interpret are kept in `extra` so nothing the backend sends is lost when a
//! record is re-serialized (for example by the CLI's JSON output).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `GET /token`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /send-sms` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsRequest {
    pub to: String,
    pub message: String,
}

impl SmsRequest {
    pub fn new(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            message: body.into(),
        }
    }
}

/// `POST /send-sms` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /call-logs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallLogsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub calls: Vec<CallRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /message-logs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageLogsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /calls/forward` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardRequest {
    #[serde(rename = "ConferenceSid")]
    pub conference_sid: String,
    pub core_call_number: String,
    #[serde(rename = "NewNumber")]
    pub new_number: String,
}

/// One past call as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub direction: Option<String>,
    /// Seconds; the backend sends it as a string or a number
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: Option<String>,
    #[serde(default)]
    pub price_unit: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallRecord {
    /// Duration in whole seconds; anything unparsable counts as 0
    pub fn duration_secs(&self) -> u64 {
        self.duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d as u64)
            .unwrap_or(0)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.as_deref().and_then(parse_timestamp)
    }
}

/// One past SMS as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub date_sent: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: Option<String>,
    #[serde(default)]
    pub price_unit: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageRecord {
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.date_sent.as_deref().and_then(parse_timestamp)
    }
}

/// Parse RFC 3339 (`2024-05-01T12:00:00Z`) or RFC 2822
/// (`Wed, 01 May 2024 12:00:00 +0000`) timestamps
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Accept strings, numbers and null for fields the backend is loose about
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
