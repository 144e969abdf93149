// Integration tests for `InfluxClient` using wiremock.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ocstream_api::{Error, InfluxClient, InfluxConfig, Point, Precision};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(username: Option<&str>) -> (MockServer, InfluxClient) {
    let server = MockServer::start().await;
    let config = InfluxConfig {
        url: Url::parse(&server.uri()).unwrap(),
        database: "ot".into(),
        username: username.map(str::to_owned),
        password: username.map(|_| SecretString::from("s3cret".to_owned())),
        precision: Precision::Milliseconds,
        timeout: Duration::from_secs(5),
    };
    let client = InfluxClient::with_client(reqwest::Client::new(), config).unwrap();
    (server, client)
}

fn point(name: &str, octets: i64) -> Point {
    Point::new("phy_interface", Utc.timestamp_millis_opt(1_000).unwrap())
        .tag("name", name)
        .tag("host", "mx1")
        .field("in_octets", octets)
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_write_posts_line_protocol_batch() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/write"))
        .and(query_param("db", "ot"))
        .and(query_param("precision", "ms"))
        .and(body_string(
            "phy_interface,host=mx1,name=ge-0/0/0 in_octets=100i 1000\n\
             phy_interface,host=mx1,name=ge-0/0/1 in_octets=7i 1000",
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .write(&[point("ge-0/0/0", 100), point("ge-0/0/1", 7)])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_write_sends_basic_auth_when_configured() {
    let (server, client) = setup(Some("telegraf")).await;

    Mock::given(method("POST"))
        .and(path("/write"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.write(&[point("ge-0/0/0", 1)]).await.unwrap();
}

#[tokio::test]
async fn test_empty_batch_makes_no_request() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    client.write(&[]).await.unwrap();
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_write_reports_status_and_body() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/write"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"unable to parse"}"#),
        )
        .mount(&server)
        .await;

    let err = client.write(&[point("ge-0/0/0", 1)]).await.unwrap_err();
    match &err {
        Error::SinkRejected { status, body } => {
            assert_eq!(*status, 400);
            assert!(body.contains("unable to parse"));
        }
        other => panic!("expected SinkRejected, got {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.write(&[point("ge-0/0/0", 1)]).await.unwrap_err();
    assert!(err.is_transient());
}
