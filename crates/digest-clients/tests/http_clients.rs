//! Integration tests for the Loggly and Slack clients against a fake HTTP server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use digest_clients::{LogglyClient, LogglyConfig, SlackConfig, SlackWebhook};
use digest_pipeline::{
    EventFetcher, JobRunner, NotificationFormatter, NotificationPayload, Notifier, PipelineError,
    RunState, SearchSpec, TimeWindow, send_all,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> TimeWindow {
    let end = DateTime::parse_from_rfc3339("2024-05-01T10:30:00Z")
        .unwrap()
        .with_timezone(&Utc);
    TimeWindow::ending_at(end, 30)
}

fn loggly(server: &MockServer) -> LogglyClient {
    let config = LogglyConfig::new("acme", "secret")
        .unwrap()
        .with_base_url(server.uri());
    LogglyClient::new(config).unwrap()
}

fn slack(server: &MockServer) -> SlackWebhook {
    let config = SlackConfig::new(format!("{}/hook", server.uri())).unwrap();
    SlackWebhook::new(config).unwrap()
}

fn event(msg: &str, tags: &[&str]) -> serde_json::Value {
    json!({
        "logmsg": json!({ "msg": msg, "lvl": "eror" }).to_string(),
        "tags": tags,
    })
}

async fn mount_search(server: &MockServer, events: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/apiv2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rsid": { "id": "728480292" } })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/apiv2/events"))
        .and(query_param("rsid", "728480292"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_events": events.len(),
            "page": 0,
            "events": events,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn loggly_fetch_decodes_events() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apiv2/search"))
        .and(query_param("q", "level:error"))
        .and(query_param("from", "2024-05-01T10:00:00+00:00"))
        .and(query_param("until", "2024-05-01T10:30:00+00:00"))
        .and(query_param("size", "5000"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rsid": { "id": "42" } })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/apiv2/events"))
        .and(query_param("rsid", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [event("db timeout", &["api", "prod-syslog"]), event("refused", &[])],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = loggly(&server)
        .fetch("level:error", &window(), 5000)
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message, "db timeout");
    assert_eq!(events[0].environment(), "prod");
    assert_eq!(events[1].message, "refused");
}

#[tokio::test]
async fn loggly_error_status_is_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apiv2/search"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = loggly(&server).fetch("*", &window(), 10).await;

    assert!(
        matches!(&result, Err(PipelineError::BackendQuery { reason }) if reason.contains("401")),
        "expected backend error, got {result:?}"
    );
}

#[tokio::test]
async fn loggly_malformed_event_is_backend_error() {
    let server = MockServer::start().await;
    mount_search(&server, vec![json!({ "logmsg": "plain text" })]).await;

    let result = loggly(&server).fetch("*", &window(), 10).await;

    assert!(matches!(result, Err(PipelineError::BackendQuery { .. })));
}

#[tokio::test]
async fn loggly_truncates_to_max_results() {
    let server = MockServer::start().await;
    mount_search(&server, (0..5).map(|i| event(&format!("m{i}"), &[])).collect()).await;

    let events = loggly(&server).fetch("*", &window(), 3).await.unwrap();

    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn slack_posts_attachment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "username": "logdigest",
            "channel": "#ops",
            "attachments": [{ "title": "Errors 3", "color": "#ff0000" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let payload = NotificationPayload {
        title: "Errors 3".to_string(),
        body: "```\na 2\nb 1```".to_string(),
        text: "a 2\nb 1".to_string(),
        color: "#ff0000".to_string(),
        deep_link: "https://acme.loggly.com/search#terms=x".to_string(),
        channel: "#ops".to_string(),
    };

    slack(&server).send(&payload).await.unwrap();
}

#[tokio::test]
async fn slack_failure_stops_send_loop() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("invalid_payload"))
        .expect(1)
        .mount(&server)
        .await;

    let formatter = NotificationFormatter::new("acme").with_lines_per_message(1);
    let payloads = formatter.format("one\ntwo\nthree", "q", &window(), "t", "");
    assert_eq!(payloads.len(), 3);

    let err = send_all(&slack(&server), &payloads).await.unwrap_err();

    match err {
        PipelineError::NotificationSend { index, reason } => {
            assert_eq!(index, 1);
            assert!(reason.contains("500"), "unexpected reason: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn runner_retries_flaky_backend_and_notifies() {
    let loggly_server = MockServer::start().await;
    let slack_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apiv2/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&loggly_server)
        .await;
    mount_search(
        &loggly_server,
        vec![event("a", &[]), event("b", &[]), event("a", &[])],
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "attachments": [{ "title": "Errors 3", "fields": [{ "value": "```\na 2\nb 1```" }] }],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&slack_server)
        .await;

    let runner = JobRunner::new(
        Arc::new(loggly(&loggly_server)),
        Arc::new(slack(&slack_server)),
        NotificationFormatter::new("acme"),
    );
    let spec = SearchSpec::builder("errors", "level:error", "Errors")
        .window_minutes(30)
        .threshold(2)
        .build()
        .unwrap();

    let report = runner.run(&spec).await;

    assert_eq!(report.state, RunState::Sent);
    assert_eq!(report.fetch_attempts, 2);
    assert_eq!(report.total, 3);
    assert_eq!(report.payloads_sent, 1);
}
