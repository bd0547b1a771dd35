//! Common test helpers
//!
//! In-memory stand-ins for the voice SDK, the host platform and the HTTP
//! backend. Each fake records what it was asked to do and can be scripted to
//! fail, so component tests run without network or audio hardware.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use voicehub_core::backend::{Backend, CallRecord, ForwardRequest, MessageRecord, SmsRequest};
use voicehub_core::config::CallConfig;
use voicehub_core::devices::{DeviceDescriptor, DeviceKind, DeviceManager, Platform};
use voicehub_core::logging::ActivityLog;
use voicehub_core::recovery::RetryPolicy;
use voicehub_core::sdk::{
    CallConnection, CallEvent, CallHandle, CallParameters, ConnectParams, DeviceEvent, DeviceOptions, SdkDevice,
    SdkError, SdkResult, VoiceDevice, VoiceSdk,
};
use voicehub_core::{CallController, ClientError, ClientResult, EventEmitter, SessionManager, SessionStatus};

// ===== SDK =====

#[derive(Debug)]
pub struct FakeCall {
    params: CallParameters,
    events: mpsc::UnboundedSender<CallEvent>,
    pub muted: AtomicBool,
    pub digits: Mutex<String>,
    pub accepted: AtomicBool,
    pub rejected: AtomicBool,
    pub disconnected: AtomicBool,
}

impl FakeCall {
    pub fn new(params: CallParameters) -> (Arc<Self>, mpsc::UnboundedReceiver<CallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let call = Arc::new(Self {
            params,
            events: tx,
            muted: AtomicBool::new(false),
            digits: Mutex::new(String::new()),
            accepted: AtomicBool::new(false),
            rejected: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        });
        (call, rx)
    }

    /// Build an inbound connection as the SDK would offer it
    pub fn incoming(from: &str, sid: &str) -> (Arc<Self>, CallConnection) {
        let (call, events) = Self::new(CallParameters {
            call_sid: Some(sid.to_string()),
            from: Some(from.to_string()),
            to: Some("client:operator".to_string()),
        });
        let connection = CallConnection {
            call: call.clone(),
            events,
        };
        (call, connection)
    }

    pub fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }

    pub fn sent_digits(&self) -> String {
        self.digits.lock().clone()
    }
}

#[async_trait]
impl CallHandle for FakeCall {
    fn parameters(&self) -> CallParameters {
        self.params.clone()
    }

    async fn accept(&self) -> SdkResult<()> {
        self.accepted.store(true, Ordering::SeqCst);
        self.emit(CallEvent::Accept);
        Ok(())
    }

    async fn reject(&self) -> SdkResult<()> {
        self.rejected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> SdkResult<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        self.emit(CallEvent::Disconnect);
        Ok(())
    }

    fn mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn send_digits(&self, digits: &str) -> SdkResult<()> {
        self.digits.lock().push_str(digits);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeDevice {
    events: mpsc::UnboundedSender<DeviceEvent>,
    pub token: Mutex<String>,
    pub options: DeviceOptions,
    pub registered: AtomicBool,
    pub destroyed: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_output: AtomicBool,
    /// Scripted outcomes of `connect`, consumed in order; empty means success
    pub connect_script: Mutex<VecDeque<SdkError>>,
    pub connects: Mutex<Vec<(ConnectParams, Instant)>>,
    pub calls: Mutex<Vec<Arc<FakeCall>>>,
    pub input: Mutex<Option<String>>,
    pub outputs: Mutex<Vec<String>>,
}

impl FakeDevice {
    fn new(token: &str, options: DeviceOptions, events: mpsc::UnboundedSender<DeviceEvent>) -> Self {
        Self {
            events,
            token: Mutex::new(token.to_string()),
            options,
            registered: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            fail_output: AtomicBool::new(false),
            connect_script: Mutex::new(VecDeque::new()),
            connects: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            input: Mutex::new(None),
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub fn emit(&self, event: DeviceEvent) {
        let _ = self.events.send(event);
    }

    pub fn fail_next_connect(&self, error: SdkError) {
        self.connect_script.lock().push_back(error);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().iter().map(|(_, at)| *at).collect()
    }

    pub fn last_call(&self) -> Option<Arc<FakeCall>> {
        self.calls.lock().last().cloned()
    }

    pub fn current_token(&self) -> String {
        self.token.lock().clone()
    }
}

#[async_trait]
impl VoiceDevice for FakeDevice {
    async fn register(&self) -> SdkResult<()> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(SdkError::with_code(31204, "JWT is invalid"));
        }
        self.registered.store(true, Ordering::SeqCst);
        self.emit(DeviceEvent::Registered);
        Ok(())
    }

    async fn connect(&self, params: ConnectParams) -> SdkResult<CallConnection> {
        self.connects.lock().push((params.clone(), Instant::now()));
        if let Some(error) = self.connect_script.lock().pop_front() {
            return Err(error);
        }
        let sid = format!("CA{:03}", self.calls.lock().len() + 1);
        let (call, events) = FakeCall::new(CallParameters {
            call_sid: Some(sid),
            from: Some("client:operator".to_string()),
            to: params.get("To").map(str::to_string),
        });
        self.calls.lock().push(call.clone());
        Ok(CallConnection { call, events })
    }

    fn update_token(&self, token: &str) -> SdkResult<()> {
        *self.token.lock() = token.to_string();
        Ok(())
    }

    fn destroy(&self) -> SdkResult<()> {
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_input_device(&self, device_id: &str) -> SdkResult<()> {
        *self.input.lock() = Some(device_id.to_string());
        Ok(())
    }

    async fn set_output_devices(&self, device_ids: &[String]) -> SdkResult<()> {
        if self.fail_output.load(Ordering::SeqCst) {
            return Err(SdkError::new(None, "NotAllowedError: user gesture required"));
        }
        *self.outputs.lock() = device_ids.to_vec();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeSdk {
    pub devices: Mutex<Vec<Arc<FakeDevice>>>,
    pub fail_create: AtomicBool,
    /// Applied to every device right after construction
    pub fail_register: AtomicBool,
}

impl FakeSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn device(&self) -> Arc<FakeDevice> {
        self.devices.lock().last().cloned().expect("no device was created")
    }
}

#[async_trait]
impl VoiceSdk for FakeSdk {
    async fn create_device(&self, token: &str, options: &DeviceOptions) -> SdkResult<SdkDevice> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SdkError::new(None, "device construction failed"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let device = Arc::new(FakeDevice::new(token, options.clone(), tx));
        device
            .fail_register
            .store(self.fail_register.load(Ordering::SeqCst), Ordering::SeqCst);
        self.devices.lock().push(device.clone());
        Ok(SdkDevice { device, events: rx })
    }
}

// ===== Backend =====

#[derive(Debug, Default)]
pub struct FakeBackend {
    /// Scripted token outcomes, consumed in order; empty means `token-N`
    pub token_script: Mutex<VecDeque<ClientResult<String>>>,
    pub token_requests: AtomicU32,
    pub sms_script: Mutex<VecDeque<ClientResult<String>>>,
    pub sms_requests: Mutex<Vec<SmsRequest>>,
    pub call_records: Mutex<Vec<CallRecord>>,
    pub message_records: Mutex<Vec<MessageRecord>>,
    pub fail_history: AtomicBool,
    pub call_log_limits: Mutex<Vec<u32>>,
    pub message_fetches: AtomicU32,
    pub forwards: Mutex<Vec<(ForwardRequest, String)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_token(&self, outcome: ClientResult<String>) {
        self.token_script.lock().push_back(outcome);
    }

    pub fn script_sms(&self, outcome: ClientResult<String>) {
        self.sms_script.lock().push_back(outcome);
    }

    pub fn token_count(&self) -> u32 {
        self.token_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_token(&self, _identity: Option<&str>) -> ClientResult<String> {
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.token_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("token-{}", n)))
    }

    async fn send_sms(&self, request: &SmsRequest) -> ClientResult<String> {
        self.sms_requests.lock().push(request.clone());
        self.sms_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("SM{:03}", self.sms_requests.lock().len())))
    }

    async fn call_logs(&self, limit: u32) -> ClientResult<Vec<CallRecord>> {
        self.call_log_limits.lock().push(limit);
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(ClientError::history_fetch("HTTP 500"));
        }
        Ok(self.call_records.lock().clone())
    }

    async fn message_logs(&self) -> ClientResult<Vec<MessageRecord>> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(ClientError::history_fetch("HTTP 500"));
        }
        Ok(self.message_records.lock().clone())
    }

    async fn forward_call(&self, request: &ForwardRequest, bearer_token: &str) -> ClientResult<Value> {
        self.forwards.lock().push((request.clone(), bearer_token.to_string()));
        Ok(json!({"success": true}))
    }
}

// ===== Platform =====

#[derive(Debug)]
pub struct FakePlatform {
    pub devices: Mutex<Vec<DeviceDescriptor>>,
    pub fail_enumeration: AtomicBool,
    pub enumerations: AtomicU32,
    pub pushes_changes: bool,
    device_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    connectivity_tx: Mutex<Option<mpsc::UnboundedSender<bool>>>,
    online: AtomicBool,
}

impl FakePlatform {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Arc<Self> {
        Arc::new(Self::with_notifications(devices, true))
    }

    /// A platform without change notifications, forcing the poll fallback
    pub fn polling(devices: Vec<DeviceDescriptor>) -> Arc<Self> {
        Arc::new(Self::with_notifications(devices, false))
    }

    fn with_notifications(devices: Vec<DeviceDescriptor>, pushes_changes: bool) -> Self {
        Self {
            devices: Mutex::new(devices),
            fail_enumeration: AtomicBool::new(false),
            enumerations: AtomicU32::new(0),
            pushes_changes,
            device_tx: Mutex::new(None),
            connectivity_tx: Mutex::new(None),
            online: AtomicBool::new(true),
        }
    }

    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        *self.devices.lock() = devices;
    }

    pub fn notify_device_change(&self) {
        if let Some(tx) = self.device_tx.lock().as_ref() {
            let _ = tx.send(());
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        if let Some(tx) = self.connectivity_tx.lock().as_ref() {
            let _ = tx.send(online);
        }
    }

    pub fn enumeration_count(&self) -> u32 {
        self.enumerations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn enumerate_devices(&self) -> ClientResult<Vec<DeviceDescriptor>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(ClientError::device_enumeration("NotAllowedError: permission denied"));
        }
        Ok(self.devices.lock().clone())
    }

    fn device_changes(&self) -> Option<mpsc::UnboundedReceiver<()>> {
        if !self.pushes_changes {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.device_tx.lock() = Some(tx);
        Some(rx)
    }

    fn connectivity_changes(&self) -> Option<mpsc::UnboundedReceiver<bool>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.connectivity_tx.lock() = Some(tx);
        Some(rx)
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

pub fn mic(id: &str, label: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(id, label, DeviceKind::AudioInput)
}

pub fn speaker(id: &str, label: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(id, label, DeviceKind::AudioOutput)
}

// ===== Wiring =====

/// One session wired to fakes, plus the shared log and event stream
pub struct Harness {
    pub sdk: Arc<FakeSdk>,
    pub backend: Arc<FakeBackend>,
    pub log: ActivityLog,
    pub events: EventEmitter,
    pub session: Arc<SessionManager>,
}

impl Harness {
    pub fn new() -> Self {
        let sdk = FakeSdk::new();
        let backend = FakeBackend::new();
        let events = EventEmitter::new(256);
        let log = ActivityLog::new(200, events.clone());
        let session = Arc::new(SessionManager::new(
            sdk.clone(),
            backend.clone(),
            DeviceOptions::default(),
            None,
            RetryPolicy::token_refresh(2),
            log.clone(),
            events.clone(),
        ));
        Self {
            sdk,
            backend,
            log,
            events,
            session,
        }
    }

    /// Acquire the session and return its device once the registration
    /// event has been pumped
    pub async fn live_device(&self) -> Arc<FakeDevice> {
        self.session.acquire().await.expect("session should come up");
        self.session
            .subscribe_status()
            .wait_for(SessionStatus::is_ready)
            .await
            .expect("status channel open");
        self.sdk.device()
    }

    pub fn calls(&self, config: &CallConfig) -> CallController {
        CallController::new(
            self.session.clone(),
            self.backend.clone(),
            config,
            self.log.clone(),
            self.events.clone(),
        )
    }

    pub fn devices(&self, platform: Arc<FakePlatform>, poll: Duration) -> DeviceManager {
        DeviceManager::new(platform, self.session.clone(), poll, self.log.clone(), self.events.clone())
    }
}

/// Poll `condition` until it holds, yielding to spawned tasks in between
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {}", what);
}
