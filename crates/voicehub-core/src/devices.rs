//! Audio device enumeration and selection
//!
//! The [`Platform`] trait is the seam to whatever hosts the client: it lists
//! media devices and, where it can, pushes device and connectivity change
//! notifications. [`DeviceManager`] keeps the latest microphone and speaker
//! lists, keeps one selection per kind pointing at a device that exists, and
//! applies selections to the live voice session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::events::{EventEmitter, HubEvent};
use crate::logging::ActivityLog;
use crate::session::SessionManager;

/// Kind of media device as reported by the platform
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Microphone
    AudioInput,
    /// Speaker or headset
    AudioOutput,
    /// Cameras are listed by platforms but never selected
    VideoInput,
}

/// One enumerated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    /// May be empty until the platform grants media permission
    pub label: String,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }

    /// Label for display, `Default` when the platform gave none
    pub fn display_label(&self) -> &str {
        short_label(&self.label)
    }
}

fn short_label(label: &str) -> &str {
    if label.trim().is_empty() { "Default" } else { label }
}

/// Latest enumeration and the current selections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLists {
    pub inputs: Vec<DeviceDescriptor>,
    pub outputs: Vec<DeviceDescriptor>,
    pub selected_input: Option<String>,
    pub selected_output: Option<String>,
}

impl DeviceLists {
    pub fn input(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.inputs.iter().find(|d| d.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.outputs.iter().find(|d| d.id == id)
    }
}

/// Host services the client depends on
#[async_trait]
pub trait Platform: Send + Sync {
    /// All media devices currently visible
    async fn enumerate_devices(&self) -> ClientResult<Vec<DeviceDescriptor>>;

    /// Device change notifications, or `None` when the platform cannot push
    /// them and the caller has to poll
    fn device_changes(&self) -> Option<mpsc::UnboundedReceiver<()>>;

    /// Online/offline notifications, or `None` when unavailable
    fn connectivity_changes(&self) -> Option<mpsc::UnboundedReceiver<bool>>;

    fn is_online(&self) -> bool;
}

/// Keep `current` when it is still listed, otherwise fall back to the first
/// listed device (or nothing)
fn reconcile(current: Option<&String>, devices: &[DeviceDescriptor]) -> Option<String> {
    match current {
        Some(id) if devices.iter().any(|d| &d.id == id) => Some(id.clone()),
        _ => devices.first().map(|d| d.id.clone()),
    }
}

fn reason(err: &ClientError) -> String {
    match err {
        ClientError::DeviceSelection { reason } | ClientError::DeviceEnumeration { reason } => reason.clone(),
        other => other.to_string(),
    }
}

struct DeviceInner {
    platform: Arc<dyn Platform>,
    session: Arc<SessionManager>,
    log: ActivityLog,
    events: EventEmitter,
    poll_interval: Duration,
    lists: RwLock<DeviceLists>,
}

#[derive(Clone)]
pub struct DeviceManager {
    inner: Arc<DeviceInner>,
}

impl DeviceManager {
    pub fn new(
        platform: Arc<dyn Platform>,
        session: Arc<SessionManager>,
        poll_interval: Duration,
        log: ActivityLog,
        events: EventEmitter,
    ) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                platform,
                session,
                log,
                events,
                poll_interval,
                lists: RwLock::new(DeviceLists::default()),
            }),
        }
    }

    pub fn lists(&self) -> DeviceLists {
        self.inner.lists.read().clone()
    }

    /// Re-enumerate devices and repair selections that no longer exist
    pub async fn refresh(&self) -> ClientResult<DeviceLists> {
        let inner = &self.inner;
        let devices = match inner.platform.enumerate_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                let err = ClientError::device_enumeration(reason(&e));
                inner.log.push(format!("enumerateDevices failed: {}", reason(&e)));
                warn!(error = %e, "device enumeration failed");
                return Err(err);
            }
        };

        let (inputs, rest): (Vec<_>, Vec<_>) = devices.into_iter().partition(|d| d.kind == DeviceKind::AudioInput);
        let outputs: Vec<_> = rest.into_iter().filter(|d| d.kind == DeviceKind::AudioOutput).collect();

        let (lists, input_changed, output_changed) = {
            let mut lists = inner.lists.write();
            let selected_input = reconcile(lists.selected_input.as_ref(), &inputs);
            let selected_output = reconcile(lists.selected_output.as_ref(), &outputs);
            let input_changed = selected_input != lists.selected_input;
            let output_changed = selected_output != lists.selected_output;
            let changed = input_changed || output_changed || lists.inputs != inputs || lists.outputs != outputs;

            *lists = DeviceLists {
                inputs,
                outputs,
                selected_input,
                selected_output,
            };
            if changed {
                inner.events.emit(HubEvent::DevicesChanged(lists.clone()));
            }
            (lists.clone(), input_changed, output_changed)
        };

        debug!(
            inputs = lists.inputs.len(),
            outputs = lists.outputs.len(),
            "devices enumerated"
        );

        // A reassigned selection only matters to a live session
        if inner.session.is_live() {
            if let (true, Some(id)) = (input_changed, lists.selected_input.as_deref()) {
                if let Err(e) = inner.session.set_input_device(id).await {
                    inner.log.push(format!("Mic set failed: {}", reason(&e)));
                }
            }
            if let (true, Some(id)) = (output_changed, lists.selected_output.as_deref()) {
                if let Err(e) = inner.session.set_output_devices(&[id.to_string()]).await {
                    inner.log.push(format!("Speaker set failed: {}", reason(&e)));
                }
            }
        }

        Ok(lists)
    }

    /// Select and apply a microphone. Failures are logged and returned.
    pub async fn apply_input(&self, id: &str) -> ClientResult<()> {
        let inner = &self.inner;
        let label = {
            let mut lists = inner.lists.write();
            let label = lists
                .input(id)
                .map(|d| d.display_label().to_string())
                .ok_or_else(|| ClientError::device_selection(format!("unknown microphone '{}'", id)))?;
            lists.selected_input = Some(id.to_string());
            label
        };

        match inner.session.set_input_device(id).await {
            Ok(()) => {
                info!(device = id, "microphone selected");
                inner.log.push(format!("Mic set: {}", label));
                Ok(())
            }
            Err(e) => {
                inner.log.push(format!("Mic set failed: {}", reason(&e)));
                Err(e)
            }
        }
    }

    /// Select and apply a speaker. Unknown ids are refused; platform
    /// refusals are logged and swallowed.
    pub async fn apply_output(&self, id: &str) -> ClientResult<()> {
        let inner = &self.inner;
        let label = {
            let mut lists = inner.lists.write();
            let label = lists
                .output(id)
                .map(|d| d.display_label().to_string())
                .ok_or_else(|| ClientError::device_selection(format!("unknown speaker '{}'", id)))?;
            lists.selected_output = Some(id.to_string());
            label
        };

        match inner.session.set_output_devices(&[id.to_string()]).await {
            Ok(()) => {
                info!(device = id, "speaker selected");
                inner.log.push(format!("Speaker set: {}", label));
            }
            Err(e) => {
                warn!(device = id, error = %e, "speaker selection refused");
                inner.log.push(format!("Speaker set failed: {}", reason(&e)));
            }
        }
        Ok(())
    }

    /// Keep the lists current: follow platform notifications when offered,
    /// otherwise poll.
    pub fn watch(&self) -> JoinHandle<()> {
        let manager = self.clone();
        match self.inner.platform.device_changes() {
            Some(mut changes) => tokio::spawn(async move {
                debug!("watching platform device notifications");
                while changes.recv().await.is_some() {
                    if let Err(e) = manager.refresh().await {
                        debug!(error = %e, "refresh after device change failed");
                    }
                }
            }),
            None => {
                let period = self.inner.poll_interval;
                tokio::spawn(async move {
                    debug!(period_secs = period.as_secs(), "polling devices");
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // The first tick completes immediately
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if let Err(e) = manager.refresh().await {
                            debug!(error = %e, "periodic device refresh failed");
                        }
                    }
                })
            }
        }
    }
}

impl fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceManager")
            .field("lists", &*self.inner.lists.read())
            .field("poll_interval", &self.inner.poll_interval)
            .finish_non_exhaustive()
    }
}
