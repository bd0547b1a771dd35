//! Outbound SMS
//!
//! Sends go straight to the backend with no retry. The compose draft lives
//! here so that a failed send leaves it intact for the operator to fix and
//! resend.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::backend::{Backend, SmsRequest};
use crate::error::{ClientError, ClientResult};
use crate::events::{EventEmitter, HubEvent};
use crate::history::HistoryStore;
use crate::logging::ActivityLog;

#[derive(Clone)]
pub struct MessageDispatcher {
    backend: Arc<dyn Backend>,
    history: HistoryStore,
    log: ActivityLog,
    events: EventEmitter,
    refresh_delay: Duration,
    draft: Arc<Mutex<String>>,
}

impl MessageDispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        history: HistoryStore,
        refresh_delay: Duration,
        log: ActivityLog,
        events: EventEmitter,
    ) -> Self {
        Self {
            backend,
            history,
            log,
            events,
            refresh_delay,
            draft: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Send one SMS and return the provider sid
    pub async fn send(&self, to: &str, body: &str) -> ClientResult<String> {
        if body.trim().is_empty() {
            return Err(ClientError::sms_send("message body is empty"));
        }

        match self.backend.send_sms(&SmsRequest::new(to, body)).await {
            Ok(sid) => {
                info!(to, sid = %sid, "sms sent");
                self.log.push(format!("Message sent! SID: {}", sid));
                self.events.emit(HubEvent::MessageSent {
                    sid: sid.clone(),
                    to: to.to_string(),
                });
                Ok(sid)
            }
            Err(e) => {
                warn!(to, error = %e, "sms failed");
                self.log.push(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_draft(&self, body: impl Into<String>) {
        *self.draft.lock() = body.into();
    }

    pub fn draft(&self) -> String {
        self.draft.lock().clone()
    }

    /// Send the draft. After a successful send, wait the refresh delay, clear
    /// the draft (unless it was edited meanwhile) and refresh message history.
    pub async fn send_draft(&self, to: &str) -> ClientResult<String> {
        let body = self.draft();
        let sid = self.send(to, &body).await?;

        sleep(self.refresh_delay).await;
        {
            let mut draft = self.draft.lock();
            if *draft == body {
                draft.clear();
            }
        }
        self.history.fetch_message_history().await;
        Ok(sid)
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("refresh_delay", &self.refresh_delay)
            .field("draft_len", &self.draft.lock().len())
            .finish_non_exhaustive()
    }
}
