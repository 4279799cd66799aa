use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use http::StatusCode;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use courier::client::transport::{TcpTransport, TransportError};
use courier::decode::{Discard, Json, Text};
use courier::{Client, Config, Error, Request};

#[derive(Debug, Deserialize, PartialEq)]
struct StatusMessage {
    code: u32,
    description: String,
}

fn response_with_body(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Serve exactly one connection, answering with the given literal response.
/// The request head is reported through the returned channel.
async fn serve_once(response: String) -> (std::net::SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head = read_head(&mut stream).await;
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        let _ = tx.send(head);
    });

    (addr, rx)
}

/// Serve one connection that reads the request and then never answers.
async fn serve_stalled() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_head(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });

    addr
}

fn plain_client() -> Client<TcpTransport> {
    Client::with_transport(TcpTransport::default(), Config::new(Handle::current()))
}

#[tokio::test]
async fn get_plain_text() {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, head) = serve_once(response_with_body("text/plain", "OK")).await;
    let client = plain_client();

    let request = Request::get(format!("http://{addr}/"))
        .header("Accept", "text/plain; charset=utf-8")
        .build()
        .unwrap();
    let response = client.send_async(request, Text).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header_all("content-type"), ["text/plain"]);
    assert_eq!(response.body(), "OK");

    let head = head.await.unwrap();
    assert!(head.starts_with("GET / HTTP/1.1\r\n"), "head: {head:?}");
    assert!(head.contains(&format!("host: {addr}")), "head: {head:?}");
}

#[tokio::test]
async fn get_json_record() {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, _head) = serve_once(response_with_body(
        "application/json",
        r#"{"code":200,"description":"OK"}"#,
    ))
    .await;
    let client = plain_client();

    let request = Request::get(format!("http://{addr}/")).build().unwrap();
    let response = client
        .send_async(request, Json::<StatusMessage>::new())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *response.body(),
        StatusMessage {
            code: 200,
            description: "OK".to_owned()
        }
    );
}

#[tokio::test]
async fn json_shape_mismatch_is_a_decode_error() {
    let _ = tracing_subscriber::fmt::try_init();

    let body = r#"{"code":"not a number"}"#;
    let (addr, _head) = serve_once(response_with_body("application/json", body)).await;
    let client = plain_client();

    let request = Request::get(format!("http://{addr}/")).build().unwrap();
    let err = client
        .send_async(request, Json::<StatusMessage>::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { bytes, .. } if bytes == body.len()));
}

#[tokio::test]
async fn post_with_body() {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, head) = serve_once("HTTP/1.1 204 No Content\r\n\r\n".to_owned()).await;
    let client = plain_client();

    let request = Request::post(format!("http://{addr}/submit"), "Hello")
        .header("Content-Type", "text/plain; charset=utf-8")
        .build()
        .unwrap();
    let response = client.send_async(request, Discard).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let head = head.await.unwrap();
    assert!(head.starts_with("POST /submit HTTP/1.1\r\n"), "head: {head:?}");
    assert!(
        head.to_ascii_lowercase()
            .contains("content-type: text/plain"),
        "head: {head:?}"
    );
}

#[tokio::test]
async fn duplicate_response_headers_keep_wire_order() {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, _head) = serve_once(
        "HTTP/1.1 200 OK\r\nX-Tag: one\r\nX-Tag: two\r\nContent-Length: 0\r\n\r\n".to_owned(),
    )
    .await;
    let client = plain_client();

    let request = Request::get(format!("http://{addr}/")).build().unwrap();
    let response = client.send_async(request, Discard).await.unwrap();

    assert_eq!(response.header_all("x-tag"), ["one", "two"]);
    assert_eq!(response.header_all("X-TAG"), ["one", "two"]);
}

#[tokio::test]
async fn send_many_is_positional_and_isolates_failures() {
    let _ = tracing_subscriber::fmt::try_init();

    let (first, _h1) = serve_once(response_with_body("text/plain", "one")).await;
    let (second, _h2) = serve_once(response_with_body("text/plain", "two")).await;

    // A port with nothing listening: bind, note the port, drop the listener.
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client = plain_client();
    let requests = vec![
        Request::get(format!("http://{first}/")).build().unwrap(),
        Request::get(format!("http://{dead}/")).build().unwrap(),
        Request::get(format!("http://{second}/")).build().unwrap(),
    ];

    let pending = client.send_many(requests, Text);
    assert_eq!(pending.len(), 3);

    let mut results = join_all(pending).await;
    assert_eq!(results.len(), 3);

    let third = results.pop().unwrap().unwrap();
    let failed = results.pop().unwrap().unwrap_err();
    let first_result = results.pop().unwrap().unwrap();

    assert_eq!(first_result.body(), "one");
    assert!(matches!(failed, Error::Transport(_)));
    assert_eq!(third.body(), "two");
}

#[tokio::test]
async fn request_timeout_overrides_config_default() {
    let _ = tracing_subscriber::fmt::try_init();

    let addr = serve_stalled().await;
    let client = plain_client();

    let request = Request::get(format!("http://{addr}/"))
        .timeout(Duration::from_millis(150))
        .build()
        .unwrap();

    let start = Instant::now();
    let err = client.send_async(request, Text).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        matches!(err, Error::RequestTimeout { timeout } if timeout == Duration::from_millis(150))
    );
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

/// A transport whose connect future never resolves.
#[derive(Debug, Clone)]
struct StallTransport;

impl tower::Service<http::Uri> for StallTransport {
    type Response = TcpStream;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<TcpStream, TransportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: http::Uri) -> Self::Future {
        Box::pin(std::future::pending())
    }
}

#[tokio::test]
async fn connect_timeout_fires_for_unresponsive_transport() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = Config::new(Handle::current()).with_connect_timeout(Duration::from_millis(100));
    let client = Client::with_transport(StallTransport, config);

    let request = Request::get("http://unreachable.test/").build().unwrap();

    let start = Instant::now();
    let err = client.send_async(request, Text).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        matches!(err, Error::ConnectTimeout { timeout } if timeout == Duration::from_millis(100))
    );
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[test]
fn blocking_send_on_an_owned_runtime() {
    let _ = tracing_subscriber::fmt::try_init();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (addr, _head) = runtime.block_on(serve_once(response_with_body("text/plain", "OK")));

    let client = Client::with_transport(
        TcpTransport::default(),
        Config::new(runtime.handle().clone()),
    );

    let request = Request::get(format!("http://{addr}/")).build().unwrap();
    let response = client.send(request, Text).unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "OK");

    // The runtime is ours, so draining it is our job too.
    runtime.shutdown_timeout(Duration::from_secs(1));
}
