//! HttpTransport against a scripted local HTTP server
//!
//! Each test starts a listener that answers a fixed list of responses, one
//! per connection, and records the raw requests it received.

use divan_core::{Document, TransportError};
use divan_gateway::{ConnectionConfig, CouchTransport, DocumentGateway, HttpRequest, HttpTransport};
use serde_json::json;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

fn read_request(stream: &mut impl Read) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let length = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= head_end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

/// Serve `responses` in order; returns the base URL and the recorded requests.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            seen.push(read_request(&mut stream));
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        seen
    });
    (url, handle)
}

#[tokio::test]
async fn test_get_sends_basic_auth() {
    let (url, server) = serve(vec![(200, r#"{"db_name":"app","doc_count":3,"doc_del_count":1}"#)]);
    let transport = HttpTransport::new(&ConnectionConfig::new(&url).with_credentials("admin", "secret"));

    let value = transport.execute(HttpRequest::get("app")).await.unwrap();
    assert_eq!(value["doc_count"], json!(3));

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /app HTTP/1.1"));
    assert!(requests[0].contains("Basic YWRtaW46c2VjcmV0"));
}

#[tokio::test]
async fn test_error_body_maps_to_status() {
    let (url, server) = serve(vec![(
        412,
        r#"{"error":"file_exists","reason":"The database could not be created."}"#,
    )]);
    let transport = HttpTransport::new(&ConnectionConfig::new(&url));

    let err = transport
        .execute(HttpRequest::put("app", json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::Status {
            status: 412,
            error: "file_exists".to_string(),
            reason: "The database could not be created.".to_string(),
        }
    );
    server.join().unwrap();
}

#[tokio::test]
async fn test_gateway_over_http() {
    let (url, server) = serve(vec![
        (201, r#"{"ok":true,"id":"_design/by","rev":"1-abc"}"#),
        (404, r#"{"error":"not_found","reason":"missing"}"#),
    ]);
    let gateway = DocumentGateway::new("app", Arc::new(HttpTransport::new(&ConnectionConfig::new(&url))));

    let written = gateway
        .upsert(Document::with_id("_design/by").field("views", json!({})))
        .await
        .unwrap();
    assert_eq!(written.revision.as_deref(), Some("1-abc"));
    assert_eq!(gateway.get("a b").await.unwrap(), None);

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("PUT /app/_design/by HTTP/1.1"));
    assert!(requests[0].contains(r#""_id":"_design/by""#));
    assert!(requests[1].starts_with("GET /app/a%20b HTTP/1.1"));
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let (url, server) = serve(vec![(200, "not json")]);
    let transport = HttpTransport::new(&ConnectionConfig::new(&url));
    let err = transport.execute(HttpRequest::get("app")).await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
    server.join().unwrap();
}
