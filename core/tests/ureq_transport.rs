//! The blocking ureq engine against the live mock server.

#![cfg(feature = "ureq-transport")]

use std::fs;

use mock_server::Echo;
use netclient::{
    ApiRequest, ClientConfiguration, DownloadOptions, EmptyResponse, Endpoint, NetworkClient,
    NetworkError, Scheme, UreqTransport,
};

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr.to_string()
}

fn client() -> NetworkClient {
    let config = ClientConfiguration::new();
    let transport = UreqTransport::new(&config);
    NetworkClient::builder()
        .configuration(config.session(transport))
        .build()
        .unwrap()
}

#[tokio::test]
async fn echoes_through_ureq() {
    let host = start_server();
    let request = ApiRequest::post(&host, "/anything")
        .scheme(Scheme::Http)
        .query("page", "1")
        .raw_body("hello")
        .content_type("text/plain")
        .make_request()
        .unwrap();

    let echo: Echo = client().request(request).await.unwrap();
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.query.as_deref(), Some("page=1"));
    assert_eq!(echo.body, "hello");
    assert_eq!(echo.headers["cache-control"], "no-cache");
}

#[tokio::test]
async fn error_statuses_are_classified() {
    let host = start_server();
    let request = ApiRequest::get(&host, "/status/404")
        .scheme(Scheme::Http)
        .make_request()
        .unwrap();

    let err = client().request::<EmptyResponse>(request).await.unwrap_err();
    assert!(matches!(err, NetworkError::BadRequest { status: 404, .. }));
}

#[tokio::test]
async fn buffers_bodies_above_ten_mebibytes() {
    let host = start_server();
    let size = 11 * 1024 * 1024;
    let request = ApiRequest::get(&host, format!("/bytes/{size}"))
        .scheme(Scheme::Http)
        .make_request()
        .unwrap();

    let body = client().send(request).await.unwrap();
    assert_eq!(body.len(), size);
    assert_eq!(body[251], 0);
}

#[tokio::test]
async fn downloads_through_ureq() {
    let host = start_server();
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("payload.bin");
    let request = ApiRequest::get(&host, "/bytes/1024")
        .scheme(Scheme::Http)
        .make_request()
        .unwrap();

    client()
        .download(request, &destination, DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(fs::read(&destination).unwrap().len(), 1024);
}
