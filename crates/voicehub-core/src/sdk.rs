//! Voice SDK boundary
//!
//! Call setup, media negotiation and DTMF signalling belong to an external
//! voice SDK. This module defines the narrow surface the client drives:
//! a factory ([`VoiceSdk`]) that constructs a registered-able device from a
//! credential, the device itself ([`VoiceDevice`]) and per-call handles
//! ([`CallHandle`]). Asynchronous SDK notifications are delivered in emission
//! order over unbounded channels handed out together with the objects they
//! belong to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::MediaConfig;
use crate::error::ClientError;

/// Error reported by the SDK, carrying the provider code when there is one
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct SdkError {
    pub code: Option<u32>,
    pub message: String,
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl SdkError {
    pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self::new(Some(code), message)
    }
}

impl From<SdkError> for ClientError {
    fn from(err: SdkError) -> Self {
        ClientError::call_placement(err.code, err.message)
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

/// Construction options for the SDK device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOptions {
    pub codec_preferences: Vec<String>,
    /// Warn before the page/process closes with a live call
    pub close_protection: bool,
    /// Play DTMF tones locally
    pub fake_local_dtmf: bool,
    pub log_level: u8,
}

impl From<&MediaConfig> for DeviceOptions {
    fn from(media: &MediaConfig) -> Self {
        Self {
            codec_preferences: media.codec_preferences.clone(),
            close_protection: media.close_protection,
            fake_local_dtmf: media.fake_local_dtmf,
            log_level: media.sdk_log_level,
        }
    }
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

/// Custom parameters sent with an outbound connection request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectParams {
    pub params: HashMap<String, String>,
}

impl ConnectParams {
    /// `{ To: destination }`
    pub fn to(destination: impl Into<String>) -> Self {
        let mut params = HashMap::new();
        params.insert("To".to_string(), destination.into());
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Provider-side parameters of a call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParameters {
    /// Provider call identifier, known once the call is accepted
    pub call_sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Notifications emitted by the device
#[derive(Debug)]
pub enum DeviceEvent {
    Ready,
    Registered,
    Unregistered,
    Error(SdkError),
    Incoming(CallConnection),
    TokenWillExpire,
    TokenExpired,
}

/// Notifications emitted by a single call
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Ringing,
    Accept,
    Disconnect,
    Error(SdkError),
}

/// A call handle together with its event stream
pub struct CallConnection {
    pub call: Arc<dyn CallHandle>,
    pub events: mpsc::UnboundedReceiver<CallEvent>,
}

impl fmt::Debug for CallConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallConnection")
            .field("call", &self.call)
            .finish_non_exhaustive()
    }
}

/// A freshly constructed device together with its event stream
pub struct SdkDevice {
    pub device: Arc<dyn VoiceDevice>,
    pub events: mpsc::UnboundedReceiver<DeviceEvent>,
}

/// Factory for SDK devices
#[async_trait]
pub trait VoiceSdk: Send + Sync {
    /// Construct a device with a credential. The device is not registered.
    async fn create_device(&self, token: &str, options: &DeviceOptions) -> SdkResult<SdkDevice>;
}

/// The live voice-session object
#[async_trait]
pub trait VoiceDevice: Send + Sync + fmt::Debug {
    /// Network registration so the device can receive calls
    async fn register(&self) -> SdkResult<()>;

    /// Request an outbound connection
    async fn connect(&self, params: ConnectParams) -> SdkResult<CallConnection>;

    /// Install a refreshed credential on the live device
    fn update_token(&self, token: &str) -> SdkResult<()>;

    /// Tear down the device and every call it owns
    fn destroy(&self) -> SdkResult<()>;

    async fn set_input_device(&self, device_id: &str) -> SdkResult<()>;

    /// Output routing; some platforms refuse this without a user gesture
    async fn set_output_devices(&self, device_ids: &[String]) -> SdkResult<()>;
}

/// One call owned by a device
#[async_trait]
pub trait CallHandle: Send + Sync + fmt::Debug {
    fn parameters(&self) -> CallParameters;

    async fn accept(&self) -> SdkResult<()>;

    async fn reject(&self) -> SdkResult<()>;

    fn disconnect(&self) -> SdkResult<()>;

    fn mute(&self, muted: bool);

    fn is_muted(&self) -> bool;

    fn send_digits(&self, digits: &str) -> SdkResult<()>;
}
