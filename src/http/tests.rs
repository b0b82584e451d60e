use super::conn::Conn;
use super::error::{BodyError, HttpProtocolError};
use super::request::BodyFraming;
use crate::common::ServerConfig;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[tokio::test]
async fn test_conn_reads_head_and_body_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Spawn server task
    let server_handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Conn::new(stream, &ServerConfig::default());

        let head = conn.read_head().await.unwrap().unwrap();
        assert_eq!(head.method, http::Method::POST);
        assert_eq!(head.uri.path(), "/upload");

        let framing = head.framing().unwrap();
        assert_eq!(framing, BodyFraming::Length(5));

        let mut request = conn.begin_request(head, framing);
        let body = request.body_mut().read_to_end().await.unwrap();
        assert!(request.body().is_consumed());
        body
    });

    // Client sends the head and body in separate writes
    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-")
        .await
        .unwrap();
    client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"Length: 5\r\n\r\nhel").await.unwrap();
    client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"lo").await.unwrap();

    let body = server_handle.await.unwrap();
    assert_eq!(body.as_ref(), b"hello");
}

#[tokio::test]
async fn test_read_head_returns_none_on_clean_close() {
    let (client, server) = tokio::io::duplex(1024);
    drop(client);

    let mut conn = Conn::new(server, &ServerConfig::default());
    assert!(conn.read_head().await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_head_incomplete_request() {
    let (mut client, server) = tokio::io::duplex(1024);
    client.write_all(b"GET / HTTP/1.1\r\nHost: lo").await.unwrap();
    drop(client);

    let mut conn = Conn::new(server, &ServerConfig::default());
    assert!(matches!(
        conn.read_head().await,
        Err(HttpProtocolError::IncompleteRequest)
    ));
}

#[tokio::test]
async fn test_read_head_times_out() {
    let (_client, server) = tokio::io::duplex(1024);
    let config = ServerConfig::default().with_read_timeout(Duration::from_millis(50));

    let mut conn = Conn::new(server, &config);
    match conn.read_head().await {
        Err(HttpProtocolError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_can_only_be_read_once() {
    let (mut client, server) = tokio::io::duplex(1024);
    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi")
        .await
        .unwrap();

    let mut conn = Conn::new(server, &ServerConfig::default());
    let head = conn.read_head().await.unwrap().unwrap();
    let framing = head.framing().unwrap();
    let mut request = conn.begin_request(head, framing);

    assert_eq!(request.body_mut().read_to_end().await.unwrap().as_ref(), b"hi");
    assert!(matches!(
        request.body_mut().read_to_end().await,
        Err(BodyError::AlreadyRead)
    ));
}

#[tokio::test]
async fn test_release_drains_unread_body() {
    let (mut client, server) = tokio::io::duplex(1024);
    client
        .write_all(b"POST /a HTTP/1.1\r\nContent-Length: 4\r\n\r\nskipGET /b HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let mut conn = Conn::new(server, &ServerConfig::default());
    let head = conn.read_head().await.unwrap().unwrap();
    let framing = head.framing().unwrap();
    drop(conn.begin_request(head, framing));

    assert!(conn.release_body().await);
    let next = conn.read_head().await.unwrap().unwrap();
    assert_eq!(next.uri.path(), "/b");
}

#[tokio::test]
async fn test_release_gives_up_on_large_unread_body() {
    let (mut client, server) = tokio::io::duplex(1024);
    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 10000000\r\n\r\n")
        .await
        .unwrap();

    let mut conn = Conn::new(server, &ServerConfig::default());
    let head = conn.read_head().await.unwrap().unwrap();
    let framing = head.framing().unwrap();
    drop(conn.begin_request(head, framing));

    assert!(!conn.release_body().await);
}

#[tokio::test]
async fn test_truncated_chunked_body() {
    let (mut client, server) = tokio::io::duplex(1024);
    client
        .write_all(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhe")
        .await
        .unwrap();
    drop(client);

    let mut conn = Conn::new(server, &ServerConfig::default());
    let head = conn.read_head().await.unwrap().unwrap();
    let framing = head.framing().unwrap();
    let mut request = conn.begin_request(head, framing);

    assert!(matches!(
        request.body_mut().read_to_end().await,
        Err(BodyError::TruncatedChunked)
    ));
    drop(request);
    assert!(!conn.release_body().await);
}

#[tokio::test]
async fn test_write_response_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Conn::new(stream, &ServerConfig::default());
        let outgoing = super::Outgoing {
            response: super::plain_text(http::StatusCode::NOT_FOUND, "Invalid status code range"),
            request_version: http::Version::HTTP_11,
            head_request: false,
            close: true,
        };
        let close = conn.write_response(outgoing).await.unwrap();
        conn.shutdown().await.unwrap();
        close
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);

    assert!(server_handle.await.unwrap());
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.contains("content-type: text/plain; charset=utf-8\r\n"));
    assert!(response.contains("x-content-type-options: nosniff\r\n"));
    assert!(response.ends_with("\r\n\r\nInvalid status code range"));
}
