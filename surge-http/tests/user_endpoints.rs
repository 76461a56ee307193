use bytes::Bytes;
use surge_http::{HttpClient, HttpRequest};
use surge_testserver::TestServer;

#[tokio::test]
async fn get_user_returns_ok() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("failed to start test server: {e}"));
    let client = HttpClient::default();

    let res = client
        .get(&format!("{}/user", server.base_url()))
        .await
        .unwrap_or_else(|e| panic!("request failed: {e}"));

    assert_eq!(res.status, 200);
    assert_eq!(res.body_utf8(), Some("[]"));
    assert!(
        res.header("Content-Type")
            .is_some_and(|v| v.starts_with("application/json"))
    );
    assert_eq!(server.stats().users_read(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn post_user_returns_created() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("failed to start test server: {e}"));
    let client = HttpClient::default();
    let url = format!("{}/user", server.base_url());

    let req = HttpRequest::post(
        &url,
        Bytes::from_static(br#"{"first_name":"john","last_name":"smith"}"#),
    )
    .with_header("content-type", "application/json");
    let res = client
        .request(req)
        .await
        .unwrap_or_else(|e| panic!("request failed: {e}"));
    assert_eq!(res.status, 201);

    // Non-2xx statuses are ordinary responses, not transport errors.
    let res = client
        .post(&url, Bytes::from_static(b"not json"))
        .await
        .unwrap_or_else(|e| panic!("request failed: {e}"));
    assert_eq!(res.status, 400);

    assert_eq!(server.stats().users_created(), 1);
    assert_eq!(server.stats().rejected_bodies(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn status_route_echoes_requested_code() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("failed to start test server: {e}"));
    let client = HttpClient::default();

    let res = client
        .get(&format!("{}/status/503", server.base_url()))
        .await
        .unwrap_or_else(|e| panic!("request failed: {e}"));
    assert_eq!(res.status, 503);

    server.shutdown().await;
}
