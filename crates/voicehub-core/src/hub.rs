//! Operator console facade
//!
//! [`VoiceHub`] wires every component to one configuration, one activity log
//! and one event stream, and owns the background tasks that keep them fed.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use voicehub_core::{HubConfig, VoiceHubBuilder};
//! # use voicehub_core::devices::Platform;
//! # use voicehub_core::sdk::VoiceSdk;
//! # async fn example(sdk: Arc<dyn VoiceSdk>, platform: Arc<dyn Platform>) -> voicehub_core::ClientResult<()> {
//! let hub = VoiceHubBuilder::new(HubConfig::new().with_backend_url("https://backend.example.com"))
//!     .with_sdk(sdk)
//!     .with_platform(platform)
//!     .build()?;
//! hub.start().await?;
//! hub.set_destination("+15551234567");
//! let call = hub.dial().await?;
//! println!("calling {}", call.remote);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{Backend, HttpBackend};
use crate::call::{Call, CallController};
use crate::config::HubConfig;
use crate::devices::{DeviceManager, Platform};
use crate::error::{ClientError, ClientResult};
use crate::events::{EventEmitter, EventStream};
use crate::history::HistoryStore;
use crate::logging::ActivityLog;
use crate::messaging::MessageDispatcher;
use crate::network::ConnectivityMonitor;
use crate::recovery::RetryPolicy;
use crate::sdk::{DeviceOptions, VoiceSdk};
use crate::session::SessionManager;
use crate::store::ClientStateStore;

/// Builder for [`VoiceHub`]
pub struct VoiceHubBuilder {
    config: HubConfig,
    sdk: Option<Arc<dyn VoiceSdk>>,
    platform: Option<Arc<dyn Platform>>,
    backend: Option<Arc<dyn Backend>>,
    event_capacity: usize,
}

impl VoiceHubBuilder {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            sdk: None,
            platform: None,
            backend: None,
            event_capacity: 1000,
        }
    }

    pub fn with_sdk(mut self, sdk: Arc<dyn VoiceSdk>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Use a custom backend instead of HTTP against `backend.base_url`
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ClientResult<VoiceHub> {
        let config = self.config;
        config.validate()?;

        let sdk = self.sdk.ok_or_else(|| ClientError::config("a voice SDK is required"))?;
        let platform = self.platform.ok_or_else(|| ClientError::config("a platform is required"))?;
        let backend: Arc<dyn Backend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpBackend::new(&config.backend)?),
        };

        let events = EventEmitter::new(self.event_capacity);
        let log = ActivityLog::new(config.log_capacity, events.clone());

        let session = Arc::new(SessionManager::new(
            sdk,
            backend.clone(),
            DeviceOptions::from(&config.media),
            config.backend.identity.clone(),
            RetryPolicy::token_refresh(config.calls.token_refresh_attempts),
            log.clone(),
            events.clone(),
        ));
        let calls = CallController::new(session.clone(), backend.clone(), &config.calls, log.clone(), events.clone());
        let history = HistoryStore::new(backend.clone(), config.history.utc_offset()?, events.clone());
        let messages = MessageDispatcher::new(
            backend,
            history.clone(),
            config.sms_refresh_delay(),
            log.clone(),
            events.clone(),
        );
        let devices = DeviceManager::new(
            platform.clone(),
            session.clone(),
            config.device_poll_interval(),
            log.clone(),
            events.clone(),
        );
        let network = ConnectivityMonitor::new(platform.is_online(), log.clone(), events.clone());
        let store = config
            .state_file
            .clone()
            .or_else(ClientStateStore::default_path)
            .map(ClientStateStore::new);

        Ok(VoiceHub {
            config,
            platform,
            session,
            calls,
            messages,
            history,
            devices,
            network,
            store,
            destination: RwLock::new(String::new()),
            log,
            events,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }
}

/// All client components behind one handle
pub struct VoiceHub {
    config: HubConfig,
    platform: Arc<dyn Platform>,
    session: Arc<SessionManager>,
    calls: CallController,
    messages: MessageDispatcher,
    history: HistoryStore,
    devices: DeviceManager,
    network: ConnectivityMonitor,
    store: Option<ClientStateStore>,
    destination: RwLock<String>,
    log: ActivityLog,
    events: EventEmitter,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl VoiceHub {
    /// Bring the console up. Only configuration problems are errors; a
    /// session that cannot be established shows up in the status and the
    /// activity log instead. Calling it again before
    /// [`shutdown`](Self::shutdown) does nothing.
    pub async fn start(&self) -> ClientResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("voice hub already started");
            return Ok(());
        }

        if let Some(store) = &self.store {
            match store.last_destination() {
                Ok(Some(last)) => *self.destination.write() = last,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "could not restore last destination"),
            }
        }

        match self.session.acquire().await {
            Ok(session) => {
                info!(session = %session.id(), "voice session ready");
                self.log.push("Voice SDK ready");
            }
            Err(e) => warn!(error = %e, "voice session unavailable"),
        }

        if let Err(e) = self.devices.refresh().await {
            debug!(error = %e, "initial device enumeration failed");
        }

        let mut tasks = Vec::new();
        tasks.push(self.devices.watch());
        if let Some(task) = self.network.start(&self.platform) {
            tasks.push(task);
        }
        if let Some(mut incoming) = self.session.incoming_calls() {
            let calls = self.calls.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(connection) = incoming.recv().await {
                    calls.handle_incoming(connection).await;
                }
            }));
        }
        self.tasks.lock().extend(tasks);

        self.history.fetch_call_history(self.config.history.call_limit).await;
        self.history.fetch_message_history().await;
        Ok(())
    }

    pub fn destination(&self) -> String {
        self.destination.read().clone()
    }

    /// Set the destination used by [`dial`](Self::dial) and SMS, persisting
    /// it as the last dialed value
    pub fn set_destination(&self, to: impl Into<String>) {
        let to = to.into();
        *self.destination.write() = to.clone();
        if to.is_empty() {
            return;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.set_last_destination(&to) {
                warn!(error = %e, "could not persist last destination");
            }
        }
    }

    /// Call the current destination
    pub async fn dial(&self) -> ClientResult<Call> {
        let to = self.destination();
        self.calls.place(&to).await
    }

    /// Send the compose draft to the current destination
    pub async fn send_sms(&self) -> ClientResult<String> {
        let to = self.destination();
        self.messages.send_draft(&to).await
    }

    /// Stop background tasks, drop the call and release the session
    pub fn shutdown(&self) {
        self.calls.reset();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.session.release();
        self.started.store(false, Ordering::SeqCst);
        info!("voice hub shut down");
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn calls(&self) -> &CallController {
        &self.calls
    }

    pub fn messages(&self) -> &MessageDispatcher {
        &self.messages
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn network(&self) -> &ConnectivityMonitor {
        &self.network
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }
}

impl Drop for VoiceHub {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for VoiceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceHub")
            .field("status", &self.session.status())
            .field("destination", &self.destination())
            .field("call", &self.calls.current_call())
            .finish_non_exhaustive()
    }
}
