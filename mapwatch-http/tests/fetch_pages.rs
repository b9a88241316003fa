mod common;

use mapwatch_http::{HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use std::borrow::Cow;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<div class="mapname">cp_granary</div> Players: 9/24"#;

#[tokio::test]
async fn returns_page_body_as_text() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let body = client
        .get_text(&format!("{}/server/1", server.uri()), RequestOpts::default())
        .await
        .unwrap();

    assert_eq!(body, PAGE);
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server/2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap().with_retries(2);
    let body = client
        .get_text(&format!("{}/server/2", server.uri()), RequestOpts::default())
        .await
        .unwrap();

    assert!(body.contains("cp_granary"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such server"))
        .expect(1)
        .mount(&server)
        .await;

    let err = HttpClient::new()
        .unwrap()
        .get_text(&format!("{}/gone", server.uri()), RequestOpts::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    match err {
        HttpError::Api { message, .. } => assert_eq!(message, "no such server"),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn gives_up_after_retry_budget() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let err = HttpClient::new()
        .unwrap()
        .with_retries(1)
        .get_text(&format!("{}/flaky", server.uri()), RequestOpts::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn forwards_query_params() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server"))
        .and(query_param("id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        query: Some(vec![("id", Cow::Borrowed("42"))]),
        ..Default::default()
    };
    let body = HttpClient::new()
        .unwrap()
        .get_text(&format!("{}/server", server.uri()), opts)
        .await
        .unwrap();

    assert_eq!(body, PAGE);
}

#[tokio::test]
async fn per_request_headers_and_retry_budget_apply() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .and(header("accept-language", "en"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert("accept-language", HeaderValue::from_static("en"));
    let opts = RequestOpts {
        headers: Some(headers),
        retries: Some(0),
        ..Default::default()
    };
    let err = HttpClient::new()
        .unwrap()
        .with_retries(5)
        .get_text(&format!("{}/busy", server.uri()), opts)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
}

#[tokio::test]
async fn long_retry_after_is_cut_to_the_timeout() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow-down"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "3600"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow-down"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .mount(&server)
        .await;

    let client = HttpClient::new()
        .unwrap()
        .with_timeout(std::time::Duration::from_millis(300))
        .with_retries(1);
    let body = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        client.get_text(&format!("{}/slow-down", server.uri()), RequestOpts::default()),
    )
    .await
    .expect("retry waits no longer than the request timeout")
    .unwrap();

    assert_eq!(body, PAGE);
}

#[tokio::test]
async fn rejects_non_http_urls() {
    let client = HttpClient::new().unwrap();

    let err = client
        .get_text("not a url", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Url(_)));

    let err = client
        .get_text("ftp://example.com/page", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Url(_)));
}
