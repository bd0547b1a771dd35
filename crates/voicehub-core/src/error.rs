//! Error types for voicehub-core
//!
//! Every fallible operation in the crate returns [`ClientResult`]. Errors are
//! caught at the boundary where they occur and turned into activity-log lines
//! and status updates; none of them is allowed to tear down the session.

use thiserror::Error;

/// Gateway error code reported by the voice provider for transient
/// signalling failures. Call placement retries once on this code.
pub const GATEWAY_ERROR_CODE: u32 = 31005;

/// Provider code for an invalid or rejected access token.
pub const INVALID_TOKEN_CODE: u32 = 31000;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The backend did not hand out a usable credential
    #[error("Token fetch failed: {reason}")]
    CredentialFetch { reason: String },

    /// The voice device could not be constructed or registered
    #[error("Device initialization failed: {reason}")]
    SessionInit { reason: String },

    /// Destination is neither a +E.164 number nor a client identity
    #[error("Invalid number format '{address}'. Use +countrycode or client:identity")]
    InvalidAddress { address: String },

    /// The provider refused or failed to set up the call
    #[error("Call failed{}: {message}", code_suffix(.code))]
    CallPlacement { code: Option<u32>, message: String },

    /// Backend rejected an outbound SMS
    #[error("SMS failed: {message}")]
    SmsSend { message: String },

    /// Call or message history could not be retrieved
    #[error("History fetch failed: {reason}")]
    HistoryFetch { reason: String },

    /// Platform audio device enumeration failed
    #[error("Device enumeration failed: {reason}")]
    DeviceEnumeration { reason: String },

    /// A device could not be selected or applied
    #[error("Device selection failed: {reason}")]
    DeviceSelection { reason: String },

    /// Forwarding the in-progress call failed
    #[error("Call forward failed: {reason}")]
    CallForward { reason: String },

    /// Not a DTMF symbol
    #[error("Invalid DTMF digit: {digit:?}")]
    InvalidDtmf { digit: char },

    /// Operation not valid in the current state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Transport-level failure talking to the backend
    #[error("Network error: {message}")]
    Network { message: String },

    /// Persisted client state could not be read or written
    #[error("Storage error: {message}")]
    Storage { message: String },
}

fn code_suffix(code: &Option<u32>) -> String {
    code.map(|c| format!(" ({})", c)).unwrap_or_default()
}

impl ClientError {
    pub fn credential_fetch(reason: impl Into<String>) -> Self {
        Self::CredentialFetch { reason: reason.into() }
    }

    pub fn session_init(reason: impl Into<String>) -> Self {
        Self::SessionInit { reason: reason.into() }
    }

    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress { address: address.into() }
    }

    pub fn call_placement(code: Option<u32>, message: impl Into<String>) -> Self {
        Self::CallPlacement { code, message: message.into() }
    }

    pub fn sms_send(message: impl Into<String>) -> Self {
        Self::SmsSend { message: message.into() }
    }

    pub fn history_fetch(reason: impl Into<String>) -> Self {
        Self::HistoryFetch { reason: reason.into() }
    }

    pub fn device_enumeration(reason: impl Into<String>) -> Self {
        Self::DeviceEnumeration { reason: reason.into() }
    }

    pub fn device_selection(reason: impl Into<String>) -> Self {
        Self::DeviceSelection { reason: reason.into() }
    }

    pub fn call_forward(reason: impl Into<String>) -> Self {
        Self::CallForward { reason: reason.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Provider error code carried by this error, if any
    pub fn provider_code(&self) -> Option<u32> {
        match self {
            Self::CallPlacement { code, .. } => *code,
            _ => None,
        }
    }

    /// True for the gateway error that call placement retries on
    pub fn is_gateway_error(&self) -> bool {
        self.provider_code() == Some(GATEWAY_ERROR_CODE)
    }

    /// Check if retrying the failed operation can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::CredentialFetch { .. }
            | Self::HistoryFetch { .. }
            | Self::DeviceEnumeration { .. } => true,

            Self::CallPlacement { .. } => self.is_gateway_error(),

            Self::SessionInit { .. }
            | Self::InvalidAddress { .. }
            | Self::SmsSend { .. }
            | Self::DeviceSelection { .. }
            | Self::CallForward { .. }
            | Self::InvalidDtmf { .. }
            | Self::InvalidState { .. }
            | Self::Configuration { .. }
            | Self::Storage { .. } => false,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialFetch { .. } | Self::SessionInit { .. } => ErrorCategory::Session,

            Self::InvalidAddress { .. }
            | Self::CallPlacement { .. }
            | Self::CallForward { .. }
            | Self::InvalidDtmf { .. } => ErrorCategory::Call,

            Self::SmsSend { .. } => ErrorCategory::Messaging,

            Self::HistoryFetch { .. } => ErrorCategory::History,

            Self::DeviceEnumeration { .. } | Self::DeviceSelection { .. } => ErrorCategory::Device,

            Self::Network { .. } => ErrorCategory::Network,

            Self::InvalidState { .. } | Self::Configuration { .. } | Self::Storage { .. } => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Session,
    Call,
    Messaging,
    History,
    Device,
    Network,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Session => "session",
            ErrorCategory::Call => "call",
            ErrorCategory::Messaging => "messaging",
            ErrorCategory::History => "history",
            ErrorCategory::Device => "device",
            ErrorCategory::Network => "network",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("request timed out: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}
