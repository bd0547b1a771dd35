//! Connectivity indicator
//!
//! Mirrors the platform's online/offline notifications into a watch channel
//! and the event stream. Purely informational: nothing is torn down or
//! retried when the network drops.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::devices::Platform;
use crate::events::{EventEmitter, HubEvent};
use crate::logging::ActivityLog;

#[derive(Clone)]
pub struct ConnectivityMonitor {
    online: Arc<watch::Sender<bool>>,
    log: ActivityLog,
    events: EventEmitter,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool, log: ActivityLog, events: EventEmitter) -> Self {
        let (online, _) = watch::channel(initially_online);
        Self {
            online: Arc::new(online),
            log,
            events,
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Record a connectivity change. Repeats of the current value are ignored.
    pub fn set_online(&self, online: bool) {
        if !self.online.send_if_modified(|current| std::mem::replace(current, online) != online) {
            return;
        }
        info!(online, "connectivity changed");
        self.log.push(if online { "Network connection restored" } else { "Network connection lost" });
        self.events.emit(HubEvent::NetworkChanged { online });
    }

    /// Follow the platform's notifications. `None` when it offers none.
    pub fn start(&self, platform: &Arc<dyn Platform>) -> Option<JoinHandle<()>> {
        let mut changes = platform.connectivity_changes()?;
        self.set_online(platform.is_online());
        let monitor = self.clone();
        Some(tokio::spawn(async move {
            while let Some(online) = changes.recv().await {
                monitor.set_online(online);
            }
            debug!("connectivity notifications closed");
        }))
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}
