//! Client configuration
//!
//! [`HubConfig`] gathers every tunable of the client in one serde structure
//! that can be loaded from TOML, overridden from the environment and
//! adjusted with builder-style `with_*` methods. Defaults reproduce the
//! behaviour operators are used to: a single redial after two seconds on a
//! gateway error, a 1.5 second pause before the SMS history refresh, ten
//! second device polling and a 500 entry call-log page.
//!
//! # Example
//!
//! ```rust
//! use voicehub_core::config::HubConfig;
//!
//! let config = HubConfig::from_toml_str(r#"
//!     [backend]
//!     base_url = "https://backend.example.com"
//!     identity = "operator"
//!
//!     [calls]
//!     auto_answer = false
//! "#).unwrap();
//!
//! assert_eq!(config.backend.identity.as_deref(), Some("operator"));
//! assert_eq!(config.calls.redial_attempts, 2);
//! assert!(!config.calls.auto_answer);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::logging::DEFAULT_LOG_CAPACITY;

pub const ENV_BACKEND_URL: &str = "VOICEHUB_BACKEND_URL";
pub const ENV_IDENTITY: &str = "VOICEHUB_IDENTITY";
pub const ENV_FORWARD_TOKEN: &str = "VOICEHUB_FORWARD_TOKEN";

/// HTTP backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL shared by every endpoint
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Identity passed to `/token`, if the backend issues per-user tokens
    pub identity: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 15,
            identity: None,
        }
    }
}

/// Feature flags handed to the voice SDK when the device is constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub codec_preferences: Vec<String>,
    pub close_protection: bool,
    pub fake_local_dtmf: bool,
    pub sdk_log_level: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            codec_preferences: vec!["opus".to_string(), "pcmu".to_string()],
            close_protection: true,
            fake_local_dtmf: true,
            sdk_log_level: 1,
        }
    }
}

/// Out-of-band call forwarding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Keypad digit that also triggers a forward request. Disabled unless set.
    pub trigger_digit: Option<char>,

    /// Number the call is forwarded to when no explicit target is given
    pub default_target: Option<String>,

    /// Number reported as `core_call_number`; defaults to the remote party
    pub core_number: Option<String>,

    /// Bearer token for `/calls/forward`
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Total placement attempts on a gateway error, first try included
    pub redial_attempts: u32,

    /// Pause before redialing
    pub redial_delay_ms: u64,

    /// Accept inbound calls as soon as they ring
    pub auto_answer: bool,

    /// Token refresh attempts before the session is flagged
    pub token_refresh_attempts: u32,

    pub forward: ForwardConfig,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            redial_attempts: 2,
            redial_delay_ms: 2000,
            auto_answer: true,
            token_refresh_attempts: 3,
            forward: ForwardConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Delay between a successful send and the history refresh
    pub refresh_delay_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self { refresh_delay_ms: 1500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Page size for `/call-logs`
    pub call_limit: u32,

    /// Offset from UTC, in minutes, used for day boundaries in date filters
    pub utc_offset_minutes: i32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            call_limit: 500,
            utc_offset_minutes: 0,
        }
    }
}

impl HistoryConfig {
    pub fn utc_offset(&self) -> ClientResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ClientError::config(format!("utc_offset_minutes out of range: {}", self.utc_offset_minutes))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Re-enumeration interval when the platform has no change notifications
    pub poll_interval_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 10 }
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub backend: BackendConfig,
    pub media: MediaConfig,
    pub calls: CallConfig,
    pub messaging: MessagingConfig,
    pub history: HistoryConfig,
    pub devices: DeviceConfig,

    /// Where the last dialed destination is kept. `None` uses the platform
    /// data directory.
    pub state_file: Option<PathBuf>,

    /// Activity entries retained
    pub log_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            media: MediaConfig::default(),
            calls: CallConfig::default(),
            messaging: MessagingConfig::default(),
            history: HistoryConfig::default(),
            devices: DeviceConfig::default(),
            state_file: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl HubConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location: `<config_dir>/voicehub/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voicehub").join("config.toml"))
    }

    pub fn from_toml_str(raw: &str) -> ClientResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> ClientResult<String> {
        toml::to_string_pretty(self).map_err(|e| ClientError::config(e.to_string()))
    }

    /// Apply `VOICEHUB_*` environment overrides
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_BACKEND_URL) {
            if !url.trim().is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(identity) = std::env::var(ENV_IDENTITY) {
            if !identity.trim().is_empty() {
                self.backend.identity = Some(identity);
            }
        }
        if let Ok(token) = std::env::var(ENV_FORWARD_TOKEN) {
            if !token.trim().is_empty() {
                self.calls.forward.auth_token = Some(token);
            }
        }
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        let url = url::Url::parse(&self.backend.base_url)
            .map_err(|e| ClientError::config(format!("invalid backend.base_url '{}': {}", self.backend.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::config(format!(
                "backend.base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ClientError::config("backend.request_timeout_secs must be positive"));
        }
        if self.calls.redial_attempts == 0 {
            return Err(ClientError::config("calls.redial_attempts must be at least 1"));
        }
        if self.calls.token_refresh_attempts == 0 {
            return Err(ClientError::config("calls.token_refresh_attempts must be at least 1"));
        }
        if let Some(digit) = self.calls.forward.trigger_digit {
            if !crate::call::is_dtmf_symbol(digit) {
                return Err(ClientError::config(format!("calls.forward.trigger_digit {:?} is not a DTMF symbol", digit)));
            }
        }
        if self.devices.poll_interval_secs == 0 {
            return Err(ClientError::config("devices.poll_interval_secs must be positive"));
        }
        self.history.utc_offset()?;
        Ok(())
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = url.into();
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.backend.identity = Some(identity.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.backend.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_redial(mut self, attempts: u32, delay: Duration) -> Self {
        self.calls.redial_attempts = attempts;
        self.calls.redial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_auto_answer(mut self, auto_answer: bool) -> Self {
        self.calls.auto_answer = auto_answer;
        self
    }

    pub fn with_forward(mut self, forward: ForwardConfig) -> Self {
        self.calls.forward = forward;
        self
    }

    pub fn with_sms_refresh_delay(mut self, delay: Duration) -> Self {
        self.messaging.refresh_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_device_poll_interval(mut self, interval: Duration) -> Self {
        self.devices.poll_interval_secs = interval.as_secs().max(1);
        self
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn redial_delay(&self) -> Duration {
        Duration::from_millis(self.calls.redial_delay_ms)
    }

    pub fn sms_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.messaging.refresh_delay_ms)
    }

    pub fn device_poll_interval(&self) -> Duration {
        Duration::from_secs(self.devices.poll_interval_secs)
    }
}
