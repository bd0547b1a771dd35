//! Call slot management
//!
//! One call at a time. Placement reserves the slot synchronously, so a
//! second `place` (or an inbound call) arriving while the slot is taken is
//! refused instead of racing the first. Call events are consumed by one pump
//! task per call; events from a call that has since left the slot are dropped
//! by comparing the slot generation.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::address::{Destination, INVALID_DESTINATION_HINT};
use super::state::{CallState, CallTrigger};
use super::{is_dtmf_symbol, Call, CallDirection};
use crate::backend::{Backend, ForwardRequest};
use crate::config::{CallConfig, ForwardConfig};
use crate::error::{ClientError, ClientResult};
use crate::events::{EventEmitter, HubEvent};
use crate::logging::ActivityLog;
use crate::recovery::{retry_with_notify, RetryPolicy};
use crate::sdk::{CallConnection, CallEvent, CallHandle, ConnectParams};
use crate::session::{SessionManager, SessionStatus};

#[derive(Default)]
struct CallSlot {
    state: CallState,
    call: Option<Call>,
    handle: Option<Arc<dyn CallHandle>>,
    pump: Option<JoinHandle<()>>,
    generation: u64,
}

impl CallSlot {
    fn clear(&mut self) {
        self.state = CallState::Idle;
        self.call = None;
        self.handle = None;
        self.pump = None;
    }
}

struct ControllerShared {
    session: Arc<SessionManager>,
    backend: Arc<dyn Backend>,
    log: ActivityLog,
    events: EventEmitter,
    redial: RetryPolicy,
    auto_answer: bool,
    forward: ForwardConfig,
    slot: Mutex<CallSlot>,
}

impl ControllerShared {
    /// Apply `trigger` to the slot. Returns false (and changes nothing) when
    /// the pair is not in the transition table.
    fn transition(&self, slot: &mut CallSlot, trigger: CallTrigger) -> bool {
        let previous = slot.state;
        let Some(next) = previous.next(trigger) else {
            debug!(state = %previous, trigger = ?trigger, "ignoring invalid call transition");
            return false;
        };
        slot.state = next;
        if let Some(call) = slot.call.as_mut() {
            call.state = next;
            self.events.emit(HubEvent::CallStateChanged {
                call: call.clone(),
                previous_state: Some(previous),
            });
        }
        debug!(from = %previous, to = %next, "call state transition");
        true
    }

    fn handle_call_event(&self, generation: u64, event: CallEvent) {
        match event {
            CallEvent::Ringing => debug!(generation, "call ringing"),
            CallEvent::Accept => {
                let mut slot = self.slot.lock();
                if slot.generation != generation || !self.transition(&mut slot, CallTrigger::Accept) {
                    return;
                }
                let (muted, call_sid) = match slot.handle.as_ref() {
                    Some(handle) => (handle.is_muted(), handle.parameters().call_sid),
                    None => (false, None),
                };
                if let Some(call) = slot.call.as_mut() {
                    call.muted = muted;
                    call.connected_at = Some(Utc::now());
                    if call_sid.is_some() {
                        call.call_sid = call_sid;
                    }
                    let sid = call.call_sid.clone().unwrap_or_else(|| "pending".to_string());
                    info!(call_id = %call.id, call_sid = %sid, "call accepted");
                    self.log.push(format!("Call accepted (CallSid: {})", sid));
                }
            }
            CallEvent::Disconnect => {
                {
                    let mut slot = self.slot.lock();
                    if slot.generation != generation || !self.transition(&mut slot, CallTrigger::Disconnect) {
                        return;
                    }
                    slot.clear();
                }
                info!(generation, "call ended");
                self.session.set_status(SessionStatus::Ready);
                self.log.push("Call ended");
            }
            CallEvent::Error(err) => {
                warn!(generation, error = %err, "call error");
                self.log.push(format!("Call error: {}", err.message));
            }
        }
    }
}

async fn run_call_events(
    shared: Arc<ControllerShared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<CallEvent>,
) {
    while let Some(event) = events.recv().await {
        shared.handle_call_event(generation, event);
    }
    debug!(generation, "call event stream closed");
}

/// Places, answers and controls the session's call
#[derive(Clone)]
pub struct CallController {
    shared: Arc<ControllerShared>,
}

impl CallController {
    pub fn new(
        session: Arc<SessionManager>,
        backend: Arc<dyn Backend>,
        config: &CallConfig,
        log: ActivityLog,
        events: EventEmitter,
    ) -> Self {
        let redial = RetryPolicy::gateway_redial(
            config.redial_attempts,
            std::time::Duration::from_millis(config.redial_delay_ms),
        );
        Self {
            shared: Arc::new(ControllerShared {
                session,
                backend,
                log,
                events,
                redial,
                auto_answer: config.auto_answer,
                forward: config.forward.clone(),
                slot: Mutex::new(CallSlot::default()),
            }),
        }
    }

    /// Snapshot of the call in the slot
    pub fn current_call(&self) -> Option<Call> {
        self.shared.slot.lock().call.clone()
    }

    pub fn state(&self) -> CallState {
        self.shared.slot.lock().state
    }

    /// Place an outbound call. The destination is validated before anything
    /// else happens; a gateway error is redialed according to the redial
    /// policy.
    pub async fn place(&self, destination: &str) -> ClientResult<Call> {
        let shared = &self.shared;
        let destination = match Destination::parse(destination) {
            Ok(destination) => destination,
            Err(e) => {
                shared.log.push(INVALID_DESTINATION_HINT);
                return Err(e);
            }
        };
        if !shared.session.is_live() {
            shared.log.push("Device not ready");
            return Err(ClientError::invalid_state("Device not ready"));
        }

        let generation = {
            let mut slot = shared.slot.lock();
            if !slot.state.is_idle() {
                return Err(ClientError::invalid_state(format!("a call is already {}", slot.state)));
            }
            slot.generation += 1;
            slot.call = Some(Call::outbound(&destination));
            shared.transition(&mut slot, CallTrigger::Place);
            slot.generation
        };

        shared.log.push(format!("Making call to: {}", destination));
        shared.session.set_status(SessionStatus::Calling);

        let mut redialed = false;
        let result = retry_with_notify(
            "place_call",
            &shared.redial,
            || shared.session.connect(ConnectParams::to(destination.as_str())),
            |err, _attempt, _delay| {
                redialed = true;
                let message = match err {
                    ClientError::CallPlacement { message, .. } => message.as_str(),
                    _ => "",
                };
                shared.log.push(format!("Gateway error ({}): {}", crate::error::GATEWAY_ERROR_CODE, message));
                shared.log.push("Attempting to reconnect...");
                shared.session.set_status(SessionStatus::Reconnecting);
            },
        )
        .await;

        match result {
            Ok(connection) => self.install_outbound(generation, connection),
            Err(e) => {
                {
                    let mut slot = shared.slot.lock();
                    if slot.generation == generation {
                        shared.transition(&mut slot, CallTrigger::Fail);
                        slot.clear();
                    }
                }
                let message = match &e {
                    ClientError::CallPlacement { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                if redialed {
                    shared.log.push(format!("Reconnection failed: {}", message));
                } else {
                    shared.log.push(format!("Call failed: {}", message));
                }
                shared.session.set_status(SessionStatus::Ready);
                Err(e)
            }
        }
    }

    fn install_outbound(&self, generation: u64, connection: CallConnection) -> ClientResult<Call> {
        let shared = &self.shared;
        let CallConnection { call: handle, events } = connection;

        let mut slot = shared.slot.lock();
        if slot.generation != generation || slot.state != CallState::Placing {
            drop(slot);
            warn!(generation, "call slot reset while placing, dropping new call");
            if let Err(e) = handle.disconnect() {
                warn!(error = %e, "failed to disconnect orphaned call");
            }
            return Err(ClientError::invalid_state("call was cancelled while placing"));
        }

        shared.transition(&mut slot, CallTrigger::Dialed);
        slot.handle = Some(handle);
        slot.pump = Some(tokio::spawn(run_call_events(shared.clone(), generation, events)));
        shared.log.push("Call initiated, waiting for response...");
        slot.call
            .clone()
            .ok_or_else(|| ClientError::invalid_state("call slot emptied while placing"))
    }

    /// Take an inbound call offered by the session. A busy slot rejects it.
    pub async fn handle_incoming(&self, connection: CallConnection) {
        let shared = &self.shared;
        let CallConnection { call: handle, events } = connection;
        let params = handle.parameters();
        let from = params.from.clone().unwrap_or_else(|| "unknown".to_string());

        let accepted = {
            let mut slot = shared.slot.lock();
            if slot.state.is_idle() {
                slot.generation += 1;
                slot.call = Some(Call::inbound(from.clone(), params.call_sid));
                shared.transition(&mut slot, CallTrigger::Incoming);
                slot.handle = Some(handle.clone());
                slot.pump = Some(tokio::spawn(run_call_events(shared.clone(), slot.generation, events)));
                true
            } else {
                false
            }
        };

        if !accepted {
            shared.log.push(format!("Busy, rejecting incoming call from: {}", from));
            if let Err(e) = handle.reject().await {
                warn!(error = %e, "failed to reject incoming call");
            }
            return;
        }

        if shared.auto_answer {
            if let Err(e) = self.answer().await {
                warn!(error = %e, "auto-answer failed");
            }
        }
    }

    /// Accept the ringing inbound call
    pub async fn answer(&self) -> ClientResult<()> {
        let handle = {
            let slot = self.shared.slot.lock();
            match (&slot.call, &slot.handle) {
                (Some(call), Some(handle)) if call.direction == CallDirection::Inbound && slot.state == CallState::Ringing => {
                    handle.clone()
                }
                _ => return Err(ClientError::invalid_state("no ringing inbound call")),
            }
        };
        handle.accept().await.map_err(|e| {
            self.shared.log.push(format!("Call error: {}", e.message));
            ClientError::from(e)
        })
    }

    /// Disconnect the current call; no-op without one
    pub fn hangup(&self) {
        let handle = {
            let mut slot = self.shared.slot.lock();
            if !slot.state.has_call() {
                return;
            }
            self.shared.transition(&mut slot, CallTrigger::Hangup);
            slot.handle.clone()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.disconnect() {
                warn!(error = %e, "disconnect failed");
                self.shared.log.push(format!("Call error: {}", e.message));
            }
        }
    }

    /// Flip the mute flag of the active call. `None` without an active call.
    pub fn toggle_mute(&self) -> Option<bool> {
        let muted = {
            let mut slot = self.shared.slot.lock();
            if slot.state != CallState::Active {
                return None;
            }
            let handle = slot.handle.clone()?;
            let call = slot.call.as_mut()?;
            let next = !call.muted;
            handle.mute(next);
            call.muted = next;
            next
        };
        self.shared.log.push(if muted { "Muted" } else { "Unmuted" });
        Some(muted)
    }

    /// Send one DTMF symbol on the active call; no-op without one.
    ///
    /// When `calls.forward.trigger_digit` is configured and pressed, the call
    /// is also forwarded to `calls.forward.default_target`.
    pub async fn send_digit(&self, digit: char) -> ClientResult<()> {
        if !is_dtmf_symbol(digit) {
            return Err(ClientError::InvalidDtmf { digit });
        }
        let handle = {
            let slot = self.shared.slot.lock();
            if slot.state != CallState::Active {
                return Ok(());
            }
            match slot.handle.clone() {
                Some(handle) => handle,
                None => return Ok(()),
            }
        };

        if let Err(e) = handle.send_digits(&digit.to_string()) {
            self.shared.log.push(format!("Call error: {}", e.message));
            return Err(e.into());
        }
        self.shared.log.push(format!("DTMF sent: {}", digit));

        if self.shared.forward.trigger_digit == Some(digit) {
            match self.shared.forward.default_target.clone() {
                Some(target) => {
                    if let Err(e) = self.forward_call(&target).await {
                        debug!(error = %e, "forward on trigger digit failed");
                    }
                }
                None => self.shared.log.push("Forward digit pressed but no forward target is configured"),
            }
        }
        Ok(())
    }

    /// Ask the backend to move the active call to `new_number`. Every
    /// failure lands in the activity log.
    pub async fn forward_call(&self, new_number: &str) -> ClientResult<Value> {
        let result = self.request_forward(new_number).await;
        if let Err(e) = &result {
            self.shared.log.push(e.to_string());
        }
        result
    }

    async fn request_forward(&self, new_number: &str) -> ClientResult<Value> {
        let shared = &self.shared;
        let target = Destination::parse(new_number)?;
        let call = self
            .current_call()
            .filter(Call::is_active)
            .ok_or_else(|| ClientError::invalid_state("no active call to forward"))?;
        let conference_sid = call
            .call_sid
            .clone()
            .ok_or_else(|| ClientError::invalid_state("active call has no provider sid yet"))?;
        let bearer = shared
            .forward
            .auth_token
            .clone()
            .ok_or_else(|| ClientError::config("calls.forward.auth_token is not set"))?;

        let request = ForwardRequest {
            conference_sid,
            core_call_number: shared.forward.core_number.clone().unwrap_or_else(|| call.remote.clone()),
            new_number: target.to_string(),
        };

        shared.log.push(format!("Forwarding call to: {}", target));
        let payload = shared.backend.forward_call(&request, &bearer).await?;
        info!(call_id = %call.id, target = %target, "call forwarded");
        shared.log.push(format!("Call forwarded to: {}", target));
        Ok(payload)
    }

    /// Drop the call slot, disconnecting any live call. Used on shutdown.
    pub fn reset(&self) {
        let (handle, pump) = {
            let mut slot = self.shared.slot.lock();
            slot.generation += 1;
            let handle = slot.handle.take();
            let pump = slot.pump.take();
            slot.clear();
            (handle, pump)
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.disconnect() {
                warn!(error = %e, "disconnect on reset failed");
            }
        }
        if let Some(pump) = pump {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("state", &self.state())
            .field("call", &self.current_call())
            .finish_non_exhaustive()
    }
}
