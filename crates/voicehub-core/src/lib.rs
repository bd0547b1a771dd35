//! # VoiceHub Core - Operator Telephony Client
//!
//! Client side of a small operator console for placing and receiving voice
//! calls, sending SMS and browsing call/message history over an HTTP backend.
//!
//! - **session**: credential fetch, voice device lifecycle and token refresh
//! - **call**: destination validation, the call state machine, redial on
//!   gateway errors, mute, DTMF and forwarding
//! - **messaging**: SMS send with a compose draft
//! - **history**: call/message history retrieval, filters and statistics
//! - **devices**: microphone/speaker enumeration and selection
//!
//! The voice SDK and the host platform are reached through traits
//! ([`sdk::VoiceSdk`], [`devices::Platform`]); the backend through
//! [`backend::Backend`], with [`backend::HttpBackend`] as the default.
//!
//! ## Quick Start
//!
//! ```rust
//! use voicehub_core::history::{filter_calls, DurationBucket, HistoryFilter};
//! use voicehub_core::backend::CallRecord;
//!
//! let calls = vec![CallRecord {
//!     sid: "CA1".into(),
//!     status: "completed".into(),
//!     duration: Some("301".into()),
//!     ..Default::default()
//! }];
//! let long = filter_calls(&calls, &HistoryFilter::new().with_duration(DurationBucket::Long));
//! assert_eq!(long.len(), 1);
//! ```

pub mod backend;
pub mod call;
pub mod config;
pub mod devices;
pub mod error;
pub mod events;
pub mod history;
pub mod hub;
pub mod logging;
pub mod messaging;
pub mod network;
pub mod recovery;
pub mod sdk;
pub mod session;
pub mod store;

pub use call::{Call, CallController, CallDirection, CallId, CallState, Destination};
pub use config::HubConfig;
pub use error::{ClientError, ClientResult, ErrorCategory};
pub use events::{EventEmitter, EventStream, HubEvent};
pub use hub::{VoiceHub, VoiceHubBuilder};
pub use session::{SessionManager, SessionStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
