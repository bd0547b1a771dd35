//! Voice session adapter
//!
//! [`SessionManager`] owns the single live voice device of the process. It
//! fetches a credential from the backend, constructs and registers the SDK
//! device, reacts to device events (status transitions, incoming calls,
//! credential expiry) and tears everything down on [`SessionManager::release`].
//!
//! Other components never hold the device themselves; they go through the
//! manager's pass-through operations (`connect`, `set_input_device`,
//! `set_output_devices`) which fail with `InvalidState` once the session is
//! gone.
//!
//! # Lifecycle
//!
//! ```text
//!   acquire()                      device events
//!  ───────────►  Connecting ──registered──► Ready ◄──┐
//!                    ▲                        │      │ token refreshed
//!                    └─────unregistered───────┘      │
//!                                             error ─┴─► Error <code> <message>
//!  release() ──► Disconnected
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult, GATEWAY_ERROR_CODE, INVALID_TOKEN_CODE};
use crate::events::{EventEmitter, HubEvent};
use crate::logging::ActivityLog;
use crate::recovery::{retry_with_backoff, RetryPolicy};
use crate::sdk::{CallConnection, ConnectParams, DeviceEvent, DeviceOptions, SdkDevice, SdkError, VoiceDevice, VoiceSdk};

/// Status badge of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Ready,
    Calling,
    Reconnecting,
    /// Full operator-facing text, e.g. `Error 31005 Gateway HANGUP`
    Error(String),
    Disconnected,
}

impl SessionStatus {
    pub fn from_device_error(err: &SdkError) -> Self {
        let code = err.code.map(|c| c.to_string()).unwrap_or_default();
        SessionStatus::Error(format!("Error {} {}", code, err.message))
    }

    pub fn token_refresh_failed() -> Self {
        SessionStatus::Error("Error: token refresh failed".to_string())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SessionStatus::Error(_))
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Connecting => f.write_str("Connecting…"),
            SessionStatus::Ready => f.write_str("Ready"),
            SessionStatus::Calling => f.write_str("Calling..."),
            SessionStatus::Reconnecting => f.write_str("Reconnecting..."),
            SessionStatus::Error(text) => f.write_str(text),
            SessionStatus::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// A registered voice device and the credential it runs on
pub struct Session {
    id: Uuid,
    identity: Option<String>,
    device: Arc<dyn VoiceDevice>,
    credential: Mutex<String>,
    created_at: DateTime<Utc>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn new(identity: Option<String>, device: Arc<dyn VoiceDevice>, credential: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            device,
            credential: Mutex::new(credential),
            created_at: Utc::now(),
            pump: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn credential(&self) -> String {
        self.credential.lock().clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn install_credential(&self, token: String) -> ClientResult<()> {
        self.device
            .update_token(&token)
            .map_err(|e| ClientError::credential_fetch(format!("device rejected refreshed token: {}", e)))?;
        *self.credential.lock() = token;
        Ok(())
    }

    fn teardown(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        if let Err(e) = self.device.destroy() {
            warn!(session = %self.id, error = %e, "error destroying device");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// State shared between the manager and its device event pump
struct SessionShared {
    backend: Arc<dyn Backend>,
    identity: Option<String>,
    refresh_policy: RetryPolicy,
    status: watch::Sender<SessionStatus>,
    log: ActivityLog,
    events: EventEmitter,
    incoming_tx: mpsc::UnboundedSender<CallConnection>,
}

impl SessionShared {
    fn set_status(&self, status: SessionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current != status {
                *current = status.clone();
                true
            } else {
                false
            }
        });
        if changed {
            debug!(status = %status, "session status changed");
            self.events.emit(HubEvent::StatusChanged(status));
        }
    }

    async fn fetch_credential(&self) -> ClientResult<String> {
        let result = self.backend.fetch_token(self.identity.as_deref()).await;
        if let Err(e) = &result {
            self.log.push(e.to_string());
        }
        result
    }

    async fn handle_device_event(&self, session: &Session, event: DeviceEvent) {
        match event {
            DeviceEvent::Ready => {
                self.log.push("Device ready");
                self.set_status(SessionStatus::Ready);
            }
            DeviceEvent::Registered => {
                self.log.push("Device registered");
                self.set_status(SessionStatus::Ready);
            }
            DeviceEvent::Unregistered => {
                self.log.push("Device unregistered");
                self.set_status(SessionStatus::Connecting);
            }
            DeviceEvent::Error(err) => {
                let status = SessionStatus::from_device_error(&err);
                self.log.push(status.to_string());
                self.set_status(status);
                match err.code {
                    Some(GATEWAY_ERROR_CODE) => self.log.push("Gateway error detected - this is usually temporary"),
                    Some(INVALID_TOKEN_CODE) => self.log.push("Invalid access token - check the backend credentials"),
                    _ => {}
                }
            }
            DeviceEvent::Incoming(connection) => {
                let from = connection.call.parameters().from.unwrap_or_else(|| "unknown".to_string());
                self.log.push(format!("Incoming call from: {}", from));
                self.events.emit(HubEvent::IncomingCall { from });
                if let Err(mpsc::error::SendError(connection)) = self.incoming_tx.send(connection) {
                    self.log.push("No call handler attached, rejecting incoming call");
                    if let Err(e) = connection.call.reject().await {
                        warn!(error = %e, "failed to reject unhandled incoming call");
                    }
                }
            }
            DeviceEvent::TokenWillExpire => {
                self.log.push("Token will expire, refreshing");
                self.refresh_credential(session).await;
            }
            DeviceEvent::TokenExpired => {
                self.log.push("Token expired, attempting to refresh");
                self.refresh_credential(session).await;
            }
        }
    }

    /// Re-fetch and install a credential. On failure the session stays up and
    /// only the status reflects the problem.
    async fn refresh_credential(&self, session: &Session) -> bool {
        let result = retry_with_backoff("token_refresh", &self.refresh_policy, || self.fetch_credential()).await;
        match result.and_then(|token| session.install_credential(token)) {
            Ok(()) => {
                info!(session = %session.id, "credential refreshed");
                self.log.push("Token refreshed successfully");
                true
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, "credential refresh failed");
                let status = SessionStatus::token_refresh_failed();
                self.log.push(status.to_string());
                self.set_status(status);
                false
            }
        }
    }
}

async fn run_device_events(
    shared: Arc<SessionShared>,
    session: Arc<Session>,
    mut events: mpsc::UnboundedReceiver<DeviceEvent>,
) {
    while let Some(event) = events.recv().await {
        shared.handle_device_event(&session, event).await;
    }
    debug!(session = %session.id, "device event stream closed");
}

/// Owner of the process-wide voice session
pub struct SessionManager {
    shared: Arc<SessionShared>,
    sdk: Arc<dyn VoiceSdk>,
    options: DeviceOptions,
    current: RwLock<Option<Arc<Session>>>,
    acquire_lock: tokio::sync::Mutex<()>,
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<CallConnection>>>,
}

impl SessionManager {
    pub fn new(
        sdk: Arc<dyn VoiceSdk>,
        backend: Arc<dyn Backend>,
        options: DeviceOptions,
        identity: Option<String>,
        refresh_policy: RetryPolicy,
        log: ActivityLog,
        events: EventEmitter,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Connecting);
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(SessionShared {
                backend,
                identity,
                refresh_policy,
                status,
                log,
                events,
                incoming_tx,
            }),
            sdk,
            options,
            current: RwLock::new(None),
            acquire_lock: tokio::sync::Mutex::new(()),
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Return the live session, creating and registering one if needed.
    /// A second call while a session is live returns the same session
    /// without touching the backend or the SDK.
    pub async fn acquire(&self) -> ClientResult<Arc<Session>> {
        let _guard = self.acquire_lock.lock().await;
        if let Some(session) = self.current() {
            debug!(session = %session.id, "reusing live session");
            return Ok(session);
        }

        self.shared.set_status(SessionStatus::Connecting);
        match self.create_session().await {
            Ok(session) => {
                *self.current.write() = Some(session.clone());
                info!(session = %session.id, identity = ?session.identity, "voice session registered");
                Ok(session)
            }
            Err(e) => {
                self.shared.log.push(format!("Init failed: {}", e));
                self.shared.set_status(SessionStatus::Error(format!("Error {}", e)));
                Err(e)
            }
        }
    }

    async fn create_session(&self) -> ClientResult<Arc<Session>> {
        let token = self.shared.fetch_credential().await?;

        let SdkDevice { device, events } = self
            .sdk
            .create_device(&token, &self.options)
            .await
            .map_err(|e| ClientError::session_init(e.to_string()))?;

        let session = Arc::new(Session::new(self.shared.identity.clone(), device, token));
        let pump = tokio::spawn(run_device_events(self.shared.clone(), session.clone(), events));
        *session.pump.lock() = Some(pump);

        if let Err(e) = session.device.register().await {
            session.teardown();
            return Err(ClientError::session_init(format!("registration failed: {}", e)));
        }
        Ok(session)
    }

    /// Destroy the live session, if any. Safe to call repeatedly.
    pub fn release(&self) {
        let session = self.current.write().take();
        if let Some(session) = session {
            session.teardown();
            info!(session = %session.id, "voice session released");
            self.shared.log.push("Device destroyed");
            self.shared.set_status(SessionStatus::Disconnected);
        }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    pub fn is_live(&self) -> bool {
        self.current.read().is_some()
    }

    fn require_session(&self) -> ClientResult<Arc<Session>> {
        self.current().ok_or_else(|| ClientError::invalid_state("Device not ready"))
    }

    /// Request an outbound connection on the live device
    pub async fn connect(&self, params: ConnectParams) -> ClientResult<CallConnection> {
        let session = self.require_session()?;
        session.device.connect(params).await.map_err(ClientError::from)
    }

    pub async fn set_input_device(&self, device_id: &str) -> ClientResult<()> {
        let session = self.require_session()?;
        session
            .device
            .set_input_device(device_id)
            .await
            .map_err(|e| ClientError::device_selection(e.to_string()))
    }

    pub async fn set_output_devices(&self, device_ids: &[String]) -> ClientResult<()> {
        let session = self.require_session()?;
        session
            .device
            .set_output_devices(device_ids)
            .await
            .map_err(|e| ClientError::device_selection(e.to_string()))
    }

    /// Force a credential refresh outside the expiry events
    pub async fn refresh_credential(&self) -> ClientResult<()> {
        let session = self.require_session()?;
        if self.shared.refresh_credential(&session).await {
            Ok(())
        } else {
            Err(ClientError::credential_fetch("token refresh failed"))
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn set_status(&self, status: SessionStatus) {
        self.shared.set_status(status);
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Inbound calls. The receiver can be taken once; later calls get `None`.
    pub fn incoming_calls(&self) -> Option<mpsc::UnboundedReceiver<CallConnection>> {
        self.incoming_rx.lock().take()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.shared.log
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(session) = self.current.get_mut().take() {
            session.teardown();
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}
