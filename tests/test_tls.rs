use bytes::Bytes;
use hitprobe::http::request::ProbeRequest;
use hitprobe::probe::{PayloadSink, Probe, ProbeSettings, RetryPolicy};
use hitprobe::transport::tls::client_config;
use hitprobe::transport::{Connector, TlsConnector, TransportError, WatchConnectivity};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use url::Url;

#[derive(Default)]
struct Collect(Vec<Bytes>);

impl PayloadSink for Collect {
    fn deliver(&mut self, payload: Bytes) {
        self.0.push(payload);
    }
}

/// Self-signed `localhost` certificate: the acceptor serving it and a PEM
/// file the client can trust.
fn localhost_tls(tag: &str) -> (TlsAcceptor, PathBuf) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let path = std::env::temp_dir().join(format!("tls-{tag}-{}.pem", std::process::id()));
    std::fs::write(&path, cert.pem()).unwrap();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    (TlsAcceptor::from(Arc::new(config)), path)
}

/// Accept one TLS connection, read the request head, send `response` and
/// close with close_notify.
async fn serve_tls_once(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    response: Vec<u8>,
) -> Vec<u8> {
    let (socket, _) = listener.accept().await.unwrap();
    let mut stream = acceptor.accept(socket).await.unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    while !received.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending request");
        received.extend_from_slice(&buf[..n]);
    }
    stream.write_all(&response).await.unwrap();
    stream.shutdown().await.unwrap();
    received
}

/// Run one attempt against a local TLS server returning `body`.
async fn fetch_over_tls(tag: &str, body: Vec<u8>) -> (Vec<u8>, Vec<Bytes>) {
    let (acceptor, ca_path) = localhost_tls(tag);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut response = b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\n".to_vec();
    response.extend_from_slice(&body);
    let server = tokio::spawn(serve_tls_once(listener, acceptor, response));

    let url = Url::parse(&format!("https://localhost:{port}/quote")).unwrap();
    let request = ProbeRequest::render("GET {path} HTTP/1.0\r\nHost: {host}\r\n\r\n", url);
    let (_tx, connectivity) = WatchConnectivity::channel(true);
    let config = client_config(Some(&ca_path)).unwrap();

    let mut driver = Probe::new(
        TlsConnector::new(config, Duration::from_secs(5)),
        connectivity,
        Collect::default(),
        request,
        ProbeSettings {
            max_payload: body.len() + 1,
            idle_timeout: Some(Duration::from_secs(10)),
            retry: RetryPolicy::Fixed {
                delay_secs: 0,
                max_attempts: Some(1),
            },
            ..ProbeSettings::default()
        },
    );

    let stats = driver.run().await;
    std::fs::remove_file(&ca_path).unwrap();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.truncated, 0);

    let received = server.await.unwrap();
    (received, driver.into_sink().0)
}

#[tokio::test]
async fn test_tls_loopback_small_body() {
    let (received, payloads) = fetch_over_tls("small", b"hello".to_vec()).await;

    assert_eq!(received, b"GET /quote HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert_eq!(payloads, vec![Bytes::from_static(b"hello")]);
}

#[tokio::test]
async fn test_tls_loopback_body_spanning_many_records() {
    // Far larger than both the read buffer and a single TLS record.
    let body: Vec<u8> = (0..200_000u32).map(|i| b'a' + (i % 26) as u8).collect();
    let (_, payloads) = fetch_over_tls("large", body.clone()).await;

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].len(), body.len());
    assert_eq!(&payloads[0][..], &body[..]);
}

#[tokio::test]
async fn test_tls_rejects_untrusted_server() {
    let (acceptor, own_ca) = localhost_tls("untrusted-server");
    let (_, other_ca) = localhost_tls("untrusted-client");
    std::fs::remove_file(&own_ca).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        acceptor.accept(socket).await.is_err()
    });

    let config = client_config(Some(&other_ca)).unwrap();
    std::fs::remove_file(&other_ca).unwrap();
    let mut connector = TlsConnector::new(config, Duration::from_secs(5));
    let err = connector
        .open("localhost", port)
        .await
        .err()
        .expect("handshake must fail");
    assert!(matches!(err, TransportError::Tls(_)), "{err}");
    assert!(server.await.unwrap());
}
