//! HTTP backend against a mock server

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicehub_core::backend::{Backend, ForwardRequest, HttpBackend, SmsRequest};
use voicehub_core::config::BackendConfig;
use voicehub_core::ClientError;

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        base_url: format!("{}/", server.uri()),
        ..BackendConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_token_passes_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .and(query_param("identity", "operator-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "eyJ.token",
            "identity": "operator-7"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = backend(&server).fetch_token(Some("operator-7")).await.unwrap();
    assert_eq!(token, "eyJ.token");
}

#[tokio::test]
async fn test_fetch_token_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "no such identity"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    let backend = backend(&server);

    let ClientError::CredentialFetch { reason } = backend.fetch_token(None).await.unwrap_err() else {
        panic!("expected a credential error");
    };
    assert!(reason.starts_with("Token HTTP 500"), "{reason}");
    assert!(reason.ends_with("boom"), "{reason}");

    let err = backend.fetch_token(None).await.unwrap_err();
    assert_eq!(err, ClientError::credential_fetch("no such identity"));

    let err = backend.fetch_token(None).await.unwrap_err();
    assert_eq!(err, ClientError::credential_fetch("No token in response"));
}

#[tokio::test]
async fn test_send_sms_posts_body_and_reads_sid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-sms"))
        .and(body_json(json!({"to": "+15551234567", "message": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "sid": "SM123"})))
        .expect(1)
        .mount(&server)
        .await;

    let sid = backend(&server)
        .send_sms(&SmsRequest::new("+15551234567", "hello"))
        .await
        .unwrap();
    assert_eq!(sid, "SM123");
}

#[tokio::test]
async fn test_send_sms_surfaces_backend_error_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-sms"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"success": false, "error": "invalid number"})))
        .mount(&server)
        .await;

    let err = backend(&server)
        .send_sms(&SmsRequest::new("+1", "hello"))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::sms_send("invalid number"));
    assert_eq!(err.to_string(), "SMS failed: invalid number");
}

#[tokio::test]
async fn test_call_logs_sends_limit_and_parses_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call-logs"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "calls": [
                {
                    "sid": "CA1",
                    "from": "+15550001111",
                    "to": "+15551234567",
                    "status": "completed",
                    "direction": "outbound-api",
                    "duration": "42",
                    "startTime": "2024-05-01T12:00:00Z",
                    "answeredBy": "human"
                },
                {"sid": "CA2", "from": "+1", "to": "+2", "status": "no-answer", "duration": 0}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let calls = backend(&server).call_logs(20).await.unwrap();

    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].duration_secs(), 42);
    assert!(calls[0].started_at().is_some());
    assert_eq!(calls[0].extra.get("answeredBy"), Some(&json!("human")));
    assert_eq!(calls[1].duration.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_history_failures_map_to_history_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/call-logs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/message-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "provider down"})))
        .mount(&server)
        .await;
    let backend = backend(&server);

    assert!(matches!(
        backend.call_logs(20).await,
        Err(ClientError::HistoryFetch { .. })
    ));
    assert_eq!(
        backend.message_logs().await.unwrap_err(),
        ClientError::history_fetch("provider down")
    );
}

#[tokio::test]
async fn test_message_logs_parses_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/message-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "messages": [{
                "sid": "SM1",
                "from": "+15550001111",
                "to": "+15551234567",
                "body": "see you at 5",
                "status": "delivered",
                "dateSent": "Wed, 01 May 2024 12:00:00 +0000"
            }]
        })))
        .mount(&server)
        .await;

    let messages = backend(&server).message_logs().await.unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "see you at 5");
    assert!(messages[0].sent_at().is_some());
}

#[tokio::test]
async fn test_forward_call_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calls/forward"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({
            "ConferenceSid": "CA001",
            "core_call_number": "+15550009999",
            "NewNumber": "+15550003333"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calls/forward"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;
    let backend = backend(&server);
    let request = ForwardRequest {
        conference_sid: "CA001".into(),
        core_call_number: "+15550009999".into(),
        new_number: "+15550003333".into(),
    };

    let payload = backend.forward_call(&request, "secret").await.unwrap();
    assert_eq!(payload, json!({"success": true}));

    let err = backend.forward_call(&request, "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::CallForward { .. }));
}

#[tokio::test]
async fn test_unreachable_backend_keeps_operation_errors() {
    let backend = HttpBackend::new(&BackendConfig {
        base_url: "http://127.0.0.1:9/".to_string(),
        ..BackendConfig::default()
    })
    .unwrap();
    let sms = SmsRequest::new("+15551234567", "hello");

    assert!(matches!(backend.send_sms(&sms).await, Err(ClientError::SmsSend { .. })));
    assert!(matches!(backend.call_logs(20).await, Err(ClientError::HistoryFetch { .. })));
    assert!(matches!(backend.message_logs().await, Err(ClientError::HistoryFetch { .. })));
    assert!(matches!(backend.fetch_token(None).await, Err(ClientError::CredentialFetch { .. })));
}
