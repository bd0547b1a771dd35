//! HTTP backend client
//!
//! Credential issuance, SMS delivery, history and call forwarding all live
//! behind a plain HTTP backend reached through one configured base URL.
//! Components depend on the [`Backend`] trait; [`HttpBackend`] is the
//! `reqwest` implementation used in production.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::{ClientError, ClientResult};

pub use types::{
    CallLogsResponse, CallRecord, ForwardRequest, MessageLogsResponse, MessageRecord, SmsRequest, SmsResponse,
    TokenResponse,
};

/// Operations offered by the backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /token`: a fresh session credential
    async fn fetch_token(&self, identity: Option<&str>) -> ClientResult<String>;

    /// `POST /send-sms`, returning the provider message sid
    async fn send_sms(&self, request: &SmsRequest) -> ClientResult<String>;

    /// `GET /call-logs?limit=N`
    async fn call_logs(&self, limit: u32) -> ClientResult<Vec<CallRecord>>;

    /// `GET /message-logs`
    async fn message_logs(&self) -> ClientResult<Vec<MessageRecord>>;

    /// `POST /calls/forward` with bearer authorization
    async fn forward_call(&self, request: &ForwardRequest, bearer_token: &str) -> ClientResult<Value>;
}

/// `reqwest` implementation of [`Backend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("voicehub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Body text of a failed response, for error messages
async fn error_text(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_token(&self, identity: Option<&str>) -> ClientResult<String> {
        let mut request = self.client.get(self.endpoint("/token"));
        if let Some(identity) = identity {
            request = request.query(&[("identity", identity)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::credential_fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::credential_fetch(format!("Token {}", error_text(response).await)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::credential_fetch(format!("malformed token response: {}", e)))?;
        if body.success == Some(false) {
            let reason = body.message.unwrap_or_else(|| "Failed to fetch token".to_string());
            return Err(ClientError::credential_fetch(reason));
        }
        match body.token {
            Some(token) if !token.trim().is_empty() => {
                debug!(identity = ?body.identity, "token issued");
                Ok(token)
            }
            _ => Err(ClientError::credential_fetch("No token in response")),
        }
    }

    async fn send_sms(&self, request: &SmsRequest) -> ClientResult<String> {
        let response = self
            .client
            .post(self.endpoint("/send-sms"))
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::sms_send(e.to_string()))?;
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| ClientError::sms_send(e.to_string()))?;

        // Failures still come back as `{success: false, error}`, often with a
        // non-2xx status, so parse before looking at the status code.
        let body: SmsResponse = match serde_json::from_str(&raw) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(ClientError::sms_send(format!("HTTP {}: {}", status, raw.trim())));
            }
            Err(e) => return Err(ClientError::sms_send(format!("malformed response: {}", e))),
        };

        if body.success {
            Ok(body.sid.unwrap_or_default())
        } else {
            Err(ClientError::sms_send(
                body.error.unwrap_or_else(|| format!("HTTP {}", status)),
            ))
        }
    }

    async fn call_logs(&self, limit: u32) -> ClientResult<Vec<CallRecord>> {
        let response = self
            .client
            .get(self.endpoint("/call-logs"))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| ClientError::history_fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::history_fetch(error_text(response).await));
        }
        let body: CallLogsResponse = response
            .json()
            .await
            .map_err(|e| ClientError::history_fetch(format!("malformed call logs: {}", e)))?;
        if !body.success {
            return Err(ClientError::history_fetch(
                body.error.unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }
        Ok(body.calls)
    }

    async fn message_logs(&self) -> ClientResult<Vec<MessageRecord>> {
        let response = self
            .client
            .get(self.endpoint("/message-logs"))
            .send()
            .await
            .map_err(|e| ClientError::history_fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::history_fetch(error_text(response).await));
        }
        let body: MessageLogsResponse = response
            .json()
            .await
            .map_err(|e| ClientError::history_fetch(format!("malformed message logs: {}", e)))?;
        if !body.success {
            return Err(ClientError::history_fetch(
                body.error.unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }
        Ok(body.messages)
    }

    async fn forward_call(&self, request: &ForwardRequest, bearer_token: &str) -> ClientResult<Value> {
        let response = self
            .client
            .post(self.endpoint("/calls/forward"))
            .bearer_auth(bearer_token)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::call_forward(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::call_forward(error_text(response).await));
        }
        let raw = response
            .text()
            .await
            .map_err(|e| ClientError::call_forward(e.to_string()))?;
        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&raw).map_err(|e| ClientError::call_forward(format!("malformed response: {}", e)))
    }
}
