//! Tests for the client module.
//!
//! These run against a scripted transport and a recording sleeper, covering:
//! - stop orchestration and the closed session
//! - lifecycle polling bounds
//! - verification outcomes
//! - expectation payload shapes
//! - retrieval, clearing and port binding

use super::*;
use crate::error::TransportError;
use crate::events::EventType;
use crate::model::{
    ClearType, Expectation, Format, HttpRequest, HttpResponse, OpenApiExpectation, Verification,
    VerificationSequence, VerificationTimes, LOG_SEPARATOR,
};
use crate::poller::testing::RecordingSleep;
use crate::transport::testing::ScriptedTransport;
use crate::transport::{ControlRequest, ControlResponse};
use assert_json_diff::{assert_json_eq, assert_json_include};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_test::traced_test;

fn client_with(transport: &Arc<ScriptedTransport>, sleeper: &Arc<RecordingSleep>) -> MockServerClient {
    MockServerClient::builder()
        .host("localhost")
        .port(1080)
        .transport(transport.clone())
        .sleeper(sleeper.clone())
        .build()
        .unwrap()
}

fn scripted() -> (Arc<ScriptedTransport>, Arc<RecordingSleep>, MockServerClient) {
    let transport = Arc::new(ScriptedTransport::ok());
    let sleeper = Arc::new(RecordingSleep::default());
    let client = client_with(&transport, &sleeper);
    (transport, sleeper, client)
}

fn refused(_: &ControlRequest) -> std::result::Result<ControlResponse, TransportError> {
    Err(TransportError::Connection("connection refused".to_string()))
}

/// 200 for everything except status probes, which are refused.
fn server_going_down(request: &ControlRequest) -> std::result::Result<ControlResponse, TransportError> {
    if request.path.ends_with("/status") {
        refused(request)
    } else {
        Ok(ControlResponse::new(200))
    }
}

fn body_json(request: &ControlRequest) -> serde_json::Value {
    let body = request.body.as_ref().expect("request has a body");
    serde_json::from_str(&body.content).unwrap()
}

// ===== Construction =====

#[test]
fn test_blank_host_is_rejected() {
    let result = MockServerClient::builder().host("  ").port(1080).build();
    assert!(matches!(result, Err(ClientError::InvalidArgument(_))));

    let result = MockServerClient::builder().port(1080).build();
    assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
}

#[test]
fn test_missing_port_is_rejected() {
    let result = MockServerClient::builder().host("localhost").build();
    assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_pending_port_resolves_once() {
    let transport = Arc::new(ScriptedTransport::ok());
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    let client = MockServerClient::builder()
        .host("localhost")
        .port_future(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            1090
        })
        .transport(transport.clone())
        .build()
        .unwrap();

    assert_eq!(client.port().await.unwrap(), 1090);
    assert_eq!(client.port().await.unwrap(), 1090);
    assert_eq!(polls.load(Ordering::SeqCst), 1);

    client.reset().await.unwrap();
    assert_eq!(
        transport.last().unwrap().header("Host"),
        Some("localhost:1090")
    );
}

#[tokio::test]
async fn test_pending_port_times_out() {
    let client = MockServerClient::builder()
        .host("localhost")
        .port_future(futures::future::pending::<u16>())
        .config(ClientConfig {
            max_future_timeout_ms: 20,
            ..Default::default()
        })
        .transport(Arc::new(ScriptedTransport::ok()))
        .build()
        .unwrap();

    assert!(matches!(
        client.port().await,
        Err(ClientError::PortResolution(_))
    ));
}

#[tokio::test]
async fn test_context_path_prefixes_requests() {
    let transport = Arc::new(ScriptedTransport::ok());
    let client = MockServerClient::builder()
        .host("localhost")
        .port(1080)
        .context_path("/ctx/")
        .transport(transport.clone())
        .build()
        .unwrap();

    client.reset().await.unwrap();
    assert_eq!(transport.last().unwrap().path, "/ctx/mockserver/reset");
}

// ===== Stop =====

#[tokio::test]
async fn test_dispatch_after_stop_fails_with_client_closed() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(server_going_down);

    let stopped = client.stop_async().await;
    assert!(stopped.is_stopped());

    assert!(matches!(client.reset().await, Err(ClientError::ClientClosed)));
    assert!(matches!(
        client.verify_zero_interactions().await,
        Err(ClientError::Assertion(_))
    ));
    assert!(matches!(
        client.retrieve_log_messages(None).await,
        Err(ClientError::ClientClosed)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stop_tears_down_once() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(server_going_down);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.stop_async().await })
        })
        .collect();
    for handle in handles {
        let stopped = handle.await.unwrap();
        assert!(stopped.is_stopped());
    }

    assert_eq!(transport.sent_to("/mockserver/stop").len(), 1);
    assert_eq!(transport.shutdown_calls(), 1);
}

#[tokio::test]
async fn test_stop_handle_is_shared() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(server_going_down);

    let first = client.stop_async();
    let second = client.stop_async();
    first.wait().await;
    assert!(second.is_done());
}

#[tokio::test]
async fn test_stop_publishes_and_removes_bus() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(server_going_down);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let observer = transport.clone();
    client
        .events()
        .bus_for(1080)
        .subscribe(&[EventType::Stop], move |event| {
            recorder.lock().push((event, observer.sent().len()));
        });

    client.stop().await;

    assert_eq!(*seen.lock(), vec![(EventType::Stop, 0)]);
    assert!(client.events().get(1080).is_none());
}

#[tokio::test]
async fn test_stop_confirmation_is_bounded() {
    let (_transport, sleeper, client) = scripted();

    // Server keeps answering 200, so confirmation runs out of attempts
    client.stop().await;

    assert!(client.is_stopped());
    assert_eq!(sleeper.count(), 50);
    assert_eq!(sleeper.total(), Duration::from_millis(250));
}

#[tokio::test]
#[traced_test]
async fn test_stop_failure_is_logged_not_raised() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(|request| {
        if request.path.ends_with("/stop") {
            Err(TransportError::Timeout(20000))
        } else {
            refused(request)
        }
    });

    client.stop().await;

    assert!(client.is_stopped());
    assert!(logs_contain("Failed to send stop request"));
    assert_eq!(transport.shutdown_calls(), 1);
}

// ===== Lifecycle =====

#[tokio::test]
async fn test_has_stopped_gives_up_after_ten_attempts() {
    let (transport, sleeper, client) = scripted();

    assert!(!client.has_stopped().await.unwrap());
    assert_eq!(sleeper.count(), 10);
    assert_eq!(sleeper.total(), Duration::from_secs(5));
    assert_eq!(transport.sent_to("/mockserver/status").len(), 11);
}

#[tokio::test]
async fn test_has_stopped_when_connection_refused() {
    let (transport, sleeper, client) = scripted();
    transport.set_fallback(refused);

    assert!(client.has_stopped().await.unwrap());
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_is_running_waits_for_server() {
    let (transport, sleeper, client) = scripted();
    transport
        .push(refused(&ControlRequest::put("/")))
        .push(refused(&ControlRequest::put("/")));

    assert!(client.is_running().await.unwrap());
    assert_eq!(sleeper.count(), 2);
}

#[tokio::test]
async fn test_is_running_false_when_unreachable() {
    let (transport, sleeper, client) = scripted();
    transport.set_fallback(refused);

    assert!(!client
        .is_running_with(3, Duration::from_millis(100))
        .await
        .unwrap());
    assert_eq!(sleeper.count(), 3);
    assert_eq!(sleeper.total(), Duration::from_millis(300));
}

#[tokio::test]
async fn test_has_started_treats_refused_connection_as_not_yet() {
    let (transport, sleeper, client) = scripted();
    transport.push(refused(&ControlRequest::put("/")));

    assert!(client.has_started().await.unwrap());
    assert_eq!(sleeper.count(), 1);
}

#[tokio::test]
async fn test_non_200_status_is_not_running() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(|_| Ok(ControlResponse::new(404)));

    assert!(!client.is_running_with(0, Duration::ZERO).await.unwrap());
    assert!(client.has_stopped_with(0, Duration::ZERO).await.unwrap());
}

#[tokio::test]
async fn test_rejected_token_is_not_an_answer() {
    let (transport, sleeper, client) = scripted();
    transport.set_fallback(|_| Ok(ControlResponse::new(401).with_body("bad jwt")));

    assert!(matches!(
        client.is_running().await,
        Err(ClientError::Authentication(message)) if message == "bad jwt"
    ));
    assert!(matches!(
        client.has_stopped().await,
        Err(ClientError::Authentication(_))
    ));
    assert!(matches!(
        client.has_started().await,
        Err(ClientError::Authentication(_))
    ));
    assert_eq!(sleeper.count(), 0);
    assert_eq!(transport.sent_to("/mockserver/status").len(), 3);
}

#[tokio::test]
async fn test_version_mismatch_during_polling_is_returned() {
    let transport = Arc::new(ScriptedTransport::ok());
    transport.set_fallback(|_| Ok(ControlResponse::new(200).with_header("version", "5.3.0")));
    let sleeper = Arc::new(RecordingSleep::default());
    let client = MockServerClient::builder()
        .host("localhost")
        .port(1080)
        .client_version("5.4.0")
        .transport(transport.clone())
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    assert!(matches!(
        client.has_stopped().await,
        Err(ClientError::VersionMismatch { .. })
    ));
    assert!(matches!(
        client.is_running().await,
        Err(ClientError::VersionMismatch { .. })
    ));
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_status_timeout_is_returned() {
    let (transport, sleeper, client) = scripted();
    transport.push(Err(TransportError::Timeout(20000)));

    assert!(matches!(
        client.has_started().await,
        Err(ClientError::Transport(TransportError::Timeout(20000)))
    ));
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_reset_without_listeners_creates_no_bus() {
    let (_transport, _sleeper, client) = scripted();

    client.reset().await.unwrap();

    assert!(client.events().get(1080).is_none());
}

// ===== Verification =====

#[tokio::test]
async fn test_invalid_verification_never_reaches_network() {
    let (transport, _sleeper, client) = scripted();

    let missing_times = Verification::request(HttpRequest::new().with_path("/a"));
    assert!(matches!(
        client.verify(missing_times).await,
        Err(ClientError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.verify(Verification::default()).await,
        Err(ClientError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.verify_sequence(VerificationSequence::default()).await,
        Err(ClientError::InvalidArgument(_))
    ));
    assert!(matches!(
        client
            .verify_requests_in_order(Vec::<HttpRequest>::new())
            .await,
        Err(ClientError::InvalidArgument(_))
    ));

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_verify_empty_body_passes() {
    let (transport, _sleeper, client) = scripted();
    transport.push(Ok(ControlResponse::new(202)));

    client
        .verify_request(
            HttpRequest::new().with_path("/orders"),
            VerificationTimes::at_least(2),
        )
        .await
        .unwrap();

    let sent = transport.last().unwrap();
    assert_eq!(sent.path, "/mockserver/verify");
    assert_json_eq!(
        body_json(&sent),
        json!({"httpRequest": {"path": "/orders"}, "times": {"atLeast": 2}})
    );
}

#[tokio::test]
async fn test_verify_failure_body_is_the_assertion() {
    let (transport, _sleeper, client) = scripted();
    let explanation = "Request not found exactly once, expected:<{\n  \"path\" : \"/orders\"\n}>";
    transport.push(Ok(ControlResponse::new(406).with_body(explanation)));

    match client
        .verify_request(
            HttpRequest::new().with_path("/orders"),
            VerificationTimes::once(),
        )
        .await
    {
        Err(ClientError::Assertion(message)) => assert_eq!(message, explanation),
        other => panic!("expected assertion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_verify_keeps_authentication_failures() {
    let (transport, _sleeper, client) = scripted();
    transport
        .push(Ok(ControlResponse::new(401).with_body("jwt expired")))
        .push(Ok(ControlResponse::new(400).with_body("incorrect verification json")));

    match client.verify_zero_interactions().await {
        Err(ClientError::Authentication(message)) => assert_eq!(message, "jwt expired"),
        other => panic!("expected authentication failure, got {:?}", other),
    }
    match client.verify_zero_interactions().await {
        Err(ClientError::Assertion(message)) => {
            assert_eq!(message, "incorrect verification json")
        }
        other => panic!("expected assertion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_verify_zero_interactions_payload() {
    let (transport, _sleeper, client) = scripted();

    client.verify_zero_interactions().await.unwrap();

    assert_json_eq!(
        body_json(&transport.last().unwrap()),
        json!({"httpRequest": {}, "times": {"atLeast": 0, "atMost": 0}})
    );
}

#[tokio::test]
async fn test_verify_expectations_in_order() {
    let (transport, _sleeper, client) = scripted();

    client
        .verify_expectations_in_order(["first", "second"])
        .await
        .unwrap();

    let sent = transport.last().unwrap();
    assert_eq!(sent.path, "/mockserver/verifySequence");
    assert_json_eq!(
        body_json(&sent),
        json!({"expectationIds": [{"id": "first"}, {"id": "second"}]})
    );
}

// ===== Expectations =====

#[tokio::test]
async fn test_upsert_nothing_sends_nothing() {
    let (transport, _sleeper, client) = scripted();
    assert!(client.upsert(&[]).await.unwrap().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_upsert_single_is_object_and_batch_is_array() {
    let (transport, _sleeper, client) = scripted();
    transport.set_fallback(|request| {
        let body = request.body.as_ref().map(|b| b.content.clone()).unwrap_or_default();
        Ok(ControlResponse::new(201).with_body(body))
    });

    let a = Expectation::new(HttpRequest::new().with_path("/a")).respond(HttpResponse::new(200));
    let b = Expectation::new(HttpRequest::new().with_path("/b")).respond(HttpResponse::new(404));

    let stored = client.upsert(std::slice::from_ref(&a)).await.unwrap();
    let single = body_json(&transport.last().unwrap());
    assert!(single.is_object());
    assert_json_include!(
        actual: single,
        expected: json!({"httpRequest": {"path": "/a"}, "httpResponse": {"statusCode": 200}})
    );
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].http_request, a.http_request);

    let stored = client.upsert(&[a, b]).await.unwrap();
    let batch = body_json(&transport.last().unwrap());
    assert_eq!(batch.as_array().map(Vec::len), Some(2));
    assert_eq!(stored.len(), 2);
    assert_eq!(
        stored[1].http_response.as_ref().and_then(|r| r.status_code),
        Some(404)
    );
}

#[tokio::test]
async fn test_upsert_requires_created() {
    let (transport, _sleeper, client) = scripted();
    transport.push(Ok(ControlResponse::new(200).with_body("not stored")));

    let expectation = Expectation::new(HttpRequest::new().with_path("/a"));
    match client.upsert(&[expectation]).await {
        Err(ClientError::Client(message)) => {
            assert!(message.starts_with("error:not stored while submitted expectation(s):"));
            assert!(message.contains("\"/a\""));
        }
        other => panic!("expected client error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upsert_openapi_uses_openapi_path() {
    let (transport, _sleeper, client) = scripted();
    transport.push(Ok(ControlResponse::new(201)));

    let stored = client
        .upsert_openapi(&[OpenApiExpectation::new("https://example.com/petstore.yaml")
            .with_operation("listPets", "200")])
        .await
        .unwrap();

    assert!(stored.is_empty());
    let sent = transport.last().unwrap();
    assert_eq!(sent.path, "/mockserver/openapi");
    assert_json_eq!(
        body_json(&sent),
        json!({
            "specUrlOrPayload": "https://example.com/petstore.yaml",
            "operationsAndResponses": {"listPets": "200"}
        })
    );
}

#[tokio::test]
async fn test_when_respond_registers_and_touches_bus() {
    let (transport, _sleeper, client) = scripted();
    transport.push(Ok(ControlResponse::new(201)));
    assert!(client.events().get(1080).is_none());

    client
        .when(HttpRequest::new().with_method("GET").with_path("/health"))
        .priority(10)
        .respond(HttpResponse::new(204))
        .await
        .unwrap();

    assert!(client.events().get(1080).is_some());
    assert_json_include!(
        actual: body_json(&transport.last().unwrap()),
        expected: json!({
            "priority": 10,
            "httpRequest": {"method": "GET", "path": "/health"},
            "httpResponse": {"statusCode": 204}
        })
    );
}

// ===== Housekeeping =====

#[tokio::test]
async fn test_reset_publishes_before_request() {
    let (transport, _sleeper, client) = scripted();
    let sent_when_notified = Arc::new(Mutex::new(None));
    let recorder = sent_when_notified.clone();
    let observer = transport.clone();
    client
        .events()
        .bus_for(1080)
        .subscribe(&[EventType::Reset], move |_| {
            *recorder.lock() = Some(observer.sent().len());
        });

    client.reset().await.unwrap();

    assert_eq!(*sent_when_notified.lock(), Some(0));
    assert_eq!(transport.last().unwrap().path, "/mockserver/reset");
}

#[tokio::test]
async fn test_clear_with_type_and_empty_body() {
    let (transport, _sleeper, client) = scripted();

    client.clear(None, Some(ClearType::Log)).await.unwrap();
    let sent = transport.last().unwrap();
    assert_eq!(sent.path, "/mockserver/clear");
    assert_eq!(sent.query_value("type"), Some("log"));
    assert_eq!(sent.body.as_ref().map(|b| b.content.as_str()), Some(""));

    client.clear_expectation("abc", None).await.unwrap();
    let sent = transport.last().unwrap();
    assert_eq!(sent.query_value("type"), None);
    assert_json_eq!(body_json(&sent), json!({"id": "abc"}));
}

#[tokio::test]
async fn test_bind_returns_bound_ports() {
    let (transport, _sleeper, client) = scripted();
    transport.push(Ok(ControlResponse::new(200).with_body(r#"{"ports": [1081, 1082]}"#)));

    assert_eq!(client.bind(&[1081, 0]).await.unwrap(), vec![1081, 1082]);
    assert_json_eq!(
        body_json(&transport.last().unwrap()),
        json!({"ports": [1081, 0]})
    );
}

#[tokio::test]
async fn test_retrieve_query_and_empty_results() {
    let (transport, _sleeper, client) = scripted();
    transport
        .push(Ok(ControlResponse::new(200).with_body("[]")))
        .push(Ok(ControlResponse::new(200).with_body("")))
        .push(Ok(ControlResponse::new(200).with_body(
            r#"[{"httpRequest": {"path": "/a"}, "httpResponse": {"statusCode": 200}}]"#,
        )));

    let requests = client
        .retrieve_recorded_requests(Some(HttpRequest::new().with_path("/a").into()))
        .await
        .unwrap();
    assert!(requests.is_empty());
    let sent = transport.last().unwrap();
    assert_eq!(sent.path, "/mockserver/retrieve");
    assert_eq!(sent.query_value("type"), Some("REQUESTS"));
    assert_eq!(sent.query_value("format"), Some("JSON"));
    assert_json_eq!(body_json(&sent), json!({"path": "/a"}));

    assert!(client
        .retrieve_active_expectations(None)
        .await
        .unwrap()
        .is_empty());

    let exchanges = client
        .retrieve_recorded_requests_and_responses(None)
        .await
        .unwrap();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].http_request.path.as_deref(), Some("/a"));
}

#[tokio::test]
async fn test_retrieve_as_format_returns_raw_body() {
    let (transport, _sleeper, client) = scripted();
    transport.push(Ok(ControlResponse::new(200).with_body("new Expectation(...)")));

    let raw = client
        .retrieve_recorded_expectations_as(None, Format::Java)
        .await
        .unwrap();
    assert_eq!(raw, "new Expectation(...)");
    let sent = transport.last().unwrap();
    assert_eq!(sent.query_value("type"), Some("RECORDED_EXPECTATIONS"));
    assert_eq!(sent.query_value("format"), Some("JAVA"));
}

#[tokio::test]
async fn test_retrieve_log_messages_split() {
    let (transport, _sleeper, client) = scripted();
    let log = format!("first message{}second message{}", LOG_SEPARATOR, LOG_SEPARATOR);
    transport.push(Ok(ControlResponse::new(200).with_body(log)));

    let messages = client.retrieve_log_messages_array(None).await.unwrap();
    assert_eq!(messages, vec!["first message", "second message"]);

    let sent = transport.last().unwrap();
    assert_eq!(sent.query_value("type"), Some("LOGS"));
    assert_eq!(sent.query_value("format"), None);
}
