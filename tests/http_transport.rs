use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use dojo_sync::application::coordinator::DataLayer;
use dojo_sync::application::transport::{ApiRequest, Connectivity, Transport, TransportError};
use dojo_sync::cache::EntityCache;
use dojo_sync::infra::connectivity::ConnectivityFlag;
use dojo_sync::infra::http::{HttpTransport, StaticToken};
use httpmock::MockServer;
use reqwest::Url;

fn transport(base: &str, token: Option<&str>, flag: &ConnectivityFlag) -> HttpTransport {
    transport_with_timeout(base, token, flag, Duration::from_secs(2))
}

fn transport_with_timeout(
    base: &str,
    token: Option<&str>,
    flag: &ConnectivityFlag,
    timeout: Duration,
) -> HttpTransport {
    HttpTransport::new(
        Url::parse(base).expect("base url"),
        timeout,
        Arc::new(StaticToken::new(token.map(str::to_string))),
        flag.clone(),
    )
    .expect("transport")
}

#[tokio::test]
async fn sends_bearer_token_and_user_agent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/public/clubs")
            .header("authorization", "Bearer secret-token")
            .header("user-agent", HttpTransport::user_agent());
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"id":"c1","name":"Knights","owner":"alice"}]"#);
    });

    let flag = ConnectivityFlag::default();
    let http = transport(&server.base_url(), Some("secret-token"), &flag);
    let body = http
        .call(ApiRequest::new(["public", "clubs"]))
        .await
        .expect("response");

    assert_eq!(body[0]["name"], "Knights");
    mock.assert();
}

#[tokio::test]
async fn non_success_status_carries_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/public/clubs/missing");
        then.status(404).body("club not found");
    });

    let flag = ConnectivityFlag::default();
    let http = transport(&server.base_url(), None, &flag);
    let err = http
        .call(ApiRequest::new(["public", "clubs", "missing"]))
        .await
        .expect_err("404");

    assert_eq!(
        err,
        TransportError::Status {
            status: 404,
            body: "club not found".to_string(),
        }
    );
    assert!(flag.is_online());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/users");
        then.status(200).body("not json");
    });

    let flag = ConnectivityFlag::default();
    let http = transport(&server.base_url(), None, &flag);
    let err = http.call(ApiRequest::new(["users"])).await.expect_err("decode");

    assert!(matches!(err, TransportError::Decode { .. }));
}

#[tokio::test]
async fn refused_connection_marks_offline() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let flag = ConnectivityFlag::default();
    let http = transport(&format!("http://127.0.0.1:{port}"), None, &flag);
    let err = http.call(ApiRequest::new(["users"])).await.expect_err("offline");

    assert!(err.is_offline());
    assert!(!flag.is_online());
}

#[tokio::test]
async fn stalled_body_is_not_a_connectivity_loss() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = [0u8; 1024];
        let _ = stream.read(&mut request);
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n[{\"id\"")
            .expect("write head");
        stream.flush().expect("flush");
        std::thread::sleep(Duration::from_millis(800));
    });

    let flag = ConnectivityFlag::default();
    let http = transport_with_timeout(
        &format!("http://127.0.0.1:{port}"),
        None,
        &flag,
        Duration::from_millis(200),
    );
    let err = http.call(ApiRequest::new(["users"])).await.expect_err("stalled body");

    assert!(matches!(err, TransportError::Decode { .. }), "{err:?}");
    assert!(flag.is_online());
    server.join().expect("server thread");
}

#[tokio::test]
async fn coordinator_follows_start_key_over_http() {
    let server = MockServer::start();
    // Defined first so the cursor request matches it before the bare path.
    let second = server.mock(|when, then| {
        when.method("GET")
            .path("/api/games/1500-1600")
            .query_param("startKey", r#"{"id":"g2"}"#);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"items":[{"cohort":"1500-1600","id":"g3","white":"a","black":"b","date":"2024-02-01","result":"0-1"}]}"#);
    });
    let first = server.mock(|when, then| {
        when.method("GET").path("/api/games/1500-1600");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"items":[{"cohort":"1500-1600","id":"g1","white":"a","black":"b","date":"2024-01-01","result":"1-0"},{"cohort":"1500-1600","id":"g2","white":"a","black":"b","date":"2024-01-02","result":"1/2-1/2"}],"lastEvaluatedKey":{"id":"g2"}}"#);
    });

    let flag = ConnectivityFlag::default();
    let http = transport(&format!("{}/api/", server.base_url()), None, &flag);
    let layer = DataLayer::new(
        Arc::new(EntityCache::new()),
        Arc::new(http),
        Arc::new(flag),
    );

    let loaded = layer.games("1500-1600").load().await;

    assert!(loaded.request.is_success());
    let ids: Vec<_> = loaded.data.iter().map(|game| game.id.as_str()).collect();
    assert_eq!(ids, vec!["g3", "g2", "g1"]);
    first.assert();
    second.assert();
}
