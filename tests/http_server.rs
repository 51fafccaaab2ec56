//! End-to-end request handling over loopback TCP

use rust_mjpeg_http::http::digest::authorization_value;
use rust_mjpeg_http::http::response::{SNAPSHOT_HEADER, STREAM_HEADER, STREAM_PART_HEADER};
use rust_mjpeg_http::http::DigestChallenge;
use rust_mjpeg_http::server::ServerError;
use rust_mjpeg_http::{FramePipeline, MjpegServer, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const JPEG_LEN: usize = 8;
const WAIT: Duration = Duration::from_secs(5);

fn fake_jpeg(n: u8) -> [u8; JPEG_LEN] {
    [0xFF, 0xD8, 0xFF, 0xE0, n, n, 0xFF, 0xD9]
}

struct TestServer {
    addr: SocketAddr,
    pipeline: Arc<FramePipeline>,
    server: Arc<MjpegServer>,
    handle: JoinHandle<Result<(), ServerError>>,
}

async fn start(password: Option<&str>, max_clients: usize) -> TestServer {
    let pipeline = Arc::new(FramePipeline::new(1, 64));
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        username: "u".into(),
        password: password.map(Into::into),
        max_clients,
        read_timeout: Duration::from_secs(2),
        shutdown_grace: Duration::from_millis(200),
    };

    let server = Arc::new(MjpegServer::new(config, Arc::clone(&pipeline)));
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = {
        let server = Arc::clone(&server);
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { server.serve(listener, pipeline.stopped()).await })
    };

    // Stand-in for the producer thread
    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let mut n = 0u8;
            while !pipeline.is_stopped() {
                pipeline.publish(&fake_jpeg(n));
                n = n.wrapping_add(1);
                sleep(Duration::from_millis(10)).await;
            }
        });
    }

    TestServer {
        addr,
        pipeline,
        server,
        handle,
    }
}

impl TestServer {
    async fn stop(self) {
        self.pipeline.shutdown();
        timeout(WAIT, self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Sends `request` and reads until the server closes the connection
async fn fetch(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut response))
        .await
        .expect("connection was not closed")
        .unwrap();
    response
}

#[tokio::test]
async fn test_snapshot_without_password() {
    let server = start(None, 0).await;

    let response = fetch(server.addr, "GET /snapshot.jpeg HTTP/1.0\r\n\r\n").await;

    assert!(response.starts_with(SNAPSHOT_HEADER.as_bytes()));
    let body = &response[SNAPSHOT_HEADER.len()..];
    assert_eq!(body.len(), JPEG_LEN);
    assert_eq!(&body[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);

    server.stop().await;
}

#[tokio::test]
async fn test_stream_sends_parts_until_disconnect() {
    let server = start(None, 0).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /stream.mjpeg HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    let part_len = STREAM_PART_HEADER.len() + JPEG_LEN;
    let wanted = STREAM_HEADER.len() + 3 * part_len;
    let mut received = vec![0u8; wanted];
    timeout(WAIT, stream.read_exact(&mut received))
        .await
        .expect("stream stalled")
        .unwrap();

    assert!(received.starts_with(STREAM_HEADER.as_bytes()));
    for part in received[STREAM_HEADER.len()..].chunks(part_len) {
        assert!(part.starts_with(STREAM_PART_HEADER.as_bytes()));
        let jpeg = &part[STREAM_PART_HEADER.len()..];
        assert_eq!(&jpeg[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(&jpeg[6..], &[0xFF, 0xD9]);
    }

    drop(stream);

    // The session notices the disconnect on its next write
    timeout(WAIT, async {
        while server.server.stats().sessions_active > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session outlived its client");

    assert!(server.server.stats().frames_sent >= 3);
    server.stop().await;
}

#[tokio::test]
async fn test_missing_credentials_get_challenge() {
    let server = start(Some("p"), 0).await;

    let response = fetch(server.addr, "GET /snapshot.jpeg HTTP/1.0\r\n\r\n").await;
    let text = String::from_utf8(response).unwrap();

    let challenge = DigestChallenge::get();
    assert!(text.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
    assert!(text.contains(&format!(
        "WWW-Authenticate: Digest realm=\"Private\", algorithm=MD5, nonce=\"{}\", opaque=\"{}\"",
        challenge.nonce, challenge.opaque
    )));
    assert!(!text.contains("image/jpeg"));

    server.stop().await;
}

#[tokio::test]
async fn test_digest_credentials_unlock_snapshot() {
    let server = start(Some("p"), 0).await;
    let challenge = DigestChallenge::get();

    let good = authorization_value(challenge, "u", "p", "GET", "/snapshot.jpeg");
    let request = format!(
        "GET /snapshot.jpeg HTTP/1.0\r\nAuthorization: {}\r\n\r\n",
        good
    );
    let response = fetch(server.addr, &request).await;
    assert!(response.starts_with(SNAPSHOT_HEADER.as_bytes()));
    assert_eq!(response.len(), SNAPSHOT_HEADER.len() + JPEG_LEN);

    let bad = authorization_value(challenge, "u", "guess", "GET", "/snapshot.jpeg");
    let request = format!(
        "GET /snapshot.jpeg HTTP/1.0\r\nAuthorization: {}\r\n\r\n",
        bad
    );
    let text = String::from_utf8(fetch(server.addr, &request).await).unwrap();
    assert!(text.starts_with("HTTP/1.0 401 Unauthorized"));
    assert!(text.contains("Invalid credentials."));
    assert_eq!(server.server.stats().auth_failures, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_uri_is_not_found() {
    let server = start(None, 0).await;

    let response = fetch(server.addr, "GET /unknown.txt HTTP/1.0\r\n\r\n").await;
    let text = String::from_utf8(response).unwrap();

    assert!(text.starts_with("HTTP/1.1 404 Not Found"));
    assert!(text.contains("/unknown.txt"));

    server.stop().await;
}

#[tokio::test]
async fn test_missing_uri_is_bad_request() {
    let server = start(None, 0).await;

    let text = String::from_utf8(fetch(server.addr, "GET\r\n\r\n").await).unwrap();
    assert!(text.starts_with("HTTP/1.0 400 Bad Request"));

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_ends_streams() {
    let server = start(None, 0).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /stream.mjpeg HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    let mut header = vec![0u8; STREAM_HEADER.len()];
    timeout(WAIT, stream.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();

    let TestServer {
        pipeline, handle, ..
    } = server;
    pipeline.shutdown();

    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    // Whatever was in flight, the connection ends
    let mut rest = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut rest))
        .await
        .expect("stream still open after shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_client_limit_rejects_extra_connections() {
    let server = start(None, 1).await;

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    first
        .write_all(b"GET /stream.mjpeg HTTP/1.0\r\n\r\n")
        .await
        .unwrap();
    let mut header = vec![0u8; STREAM_HEADER.len()];
    timeout(WAIT, first.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();

    // Over the limit: dropped at accept without a response. The close may
    // surface as EOF or as a reset depending on timing.
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    let _ = second.write_all(b"GET /snapshot.jpeg HTTP/1.0\r\n\r\n").await;
    let mut response = Vec::new();
    let _ = timeout(WAIT, second.read_to_end(&mut response))
        .await
        .expect("rejected connection left open");
    assert!(response.is_empty());
    assert_eq!(server.server.stats().sessions_rejected, 1);

    drop(first);
    server.stop().await;
}
