//! Retry behaviour of the rate-limit aware transport against a mock server.

use backports::error::TransportError;
use backports::transport::{HttpTransport, RetryPolicy, RetryingTransport, Transport};
use reqwest::{Method, Request, StatusCode, Url};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn retrying(max_retries: u32, initial_backoff: Duration) -> RetryingTransport<HttpTransport> {
    RetryingTransport::new(
        HttpTransport::default(),
        RetryPolicy {
            max_retries,
            initial_backoff,
        },
        CancellationToken::new(),
    )
}

fn get(server: &MockServer) -> Request {
    Request::new(
        Method::GET,
        Url::parse(&format!("{}/limited", server.uri())).unwrap(),
    )
}

async fn mount_rate_limit(server: &MockServer, times: u64, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(template)
        .up_to_n_times(times)
        .mount(server)
        .await;
}

async fn mount_ok(server: &MockServer) {
    Mock::given(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_retry_after_header_is_honoured() {
    let server = MockServer::start().await;
    mount_rate_limit(
        &server,
        1,
        ResponseTemplate::new(429).insert_header("Retry-After", "1"),
    )
    .await;
    mount_ok(&server).await;

    let transport = retrying(5, Duration::from_millis(1));
    let started = Instant::now();
    let response = transport.execute(get(&server)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_exponential_backoff_without_retry_after() {
    let server = MockServer::start().await;
    mount_rate_limit(&server, 3, ResponseTemplate::new(429)).await;
    mount_ok(&server).await;

    let transport = retrying(5, Duration::from_millis(20));
    let started = Instant::now();
    let response = transport.execute(get(&server)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // 20ms + 40ms + 80ms
    assert!(started.elapsed() >= Duration::from_millis(140));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_zero_or_garbage_retry_after_falls_back_to_backoff() {
    let server = MockServer::start().await;
    mount_rate_limit(
        &server,
        1,
        ResponseTemplate::new(429).insert_header("Retry-After", "0"),
    )
    .await;
    mount_rate_limit(
        &server,
        1,
        ResponseTemplate::new(429).insert_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT"),
    )
    .await;
    mount_ok(&server).await;

    let transport = retrying(5, Duration::from_millis(10));
    let started = Instant::now();
    let response = transport.execute(get(&server)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_budget_returns_last_429() {
    let server = MockServer::start().await;
    Mock::given(path("/limited"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let transport = retrying(2, Duration::from_millis(5));
    let response = transport.execute(get(&server)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.text().await.unwrap(), "slow down");
}

#[tokio::test]
async fn test_cancellation_during_wait_returns_promptly() {
    let server = MockServer::start().await;
    mount_rate_limit(
        &server,
        1,
        ResponseTemplate::new(429).insert_header("Retry-After", "30"),
    )
    .await;
    mount_ok(&server).await;

    let cancel = CancellationToken::new();
    let transport = RetryingTransport::new(
        HttpTransport::default(),
        RetryPolicy::default(),
        cancel.clone(),
    );
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result = transport.execute(get(&server)).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(TransportError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(path("/limited"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let response = retrying(5, Duration::from_millis(5))
        .execute(get(&server))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_connection_failure_is_not_retried() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = Request::new(
        Method::GET,
        Url::parse(&format!("http://{addr}/limited")).unwrap(),
    );
    let started = Instant::now();
    let result = retrying(5, Duration::from_secs(1)).execute(request).await;

    assert!(matches!(result, Err(TransportError::Connection(_))));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_request_body_is_replayed_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/limited"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let mut request = Request::new(
        Method::POST,
        Url::parse(&format!("{}/limited", server.uri())).unwrap(),
    );
    *request.body_mut() = Some("payload".into());

    let response = retrying(5, Duration::from_millis(5))
        .execute(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|r| r.body == b"payload"));
}
