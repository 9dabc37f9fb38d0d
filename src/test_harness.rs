//! Integration test harness for a mock classification endpoint
//!
//! This module provides utilities for running upload tests against a mock
//! server instead of a real classifier.

use mockito::{Matcher, Mock, Server, ServerGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A test harness that sets up a mock classification server
pub struct TestHarness {
    pub server: ServerGuard,
}

impl TestHarness {
    /// Create a new test harness with a mock server
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        Self { server }
    }

    /// Get the mock server URL
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Full endpoint URL for `path` on the mock server
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server.url(), path)
    }

    /// Mock a classifier that answers every multipart upload with `body`
    pub fn mock_classification(&mut self, path: &str, body: &str) -> Mock {
        self.mock_classification_times(path, body, 1)
    }

    /// Same as `mock_classification`, but expects exactly `hits` requests
    pub fn mock_classification_times(&mut self, path: &str, body: &str, hits: usize) -> Mock {
        self.server.mock("POST", path)
            .match_header(
                "content-type",
                Matcher::Regex(r"^multipart/form-data; boundary=.+".to_string()),
            )
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body(body)
            .expect(hits)
            .create()
    }

    /// Mock that only matches when both form fields arrive as expected
    pub fn mock_multipart_fields(&mut self, path: &str, crop: &str, body: &str) -> Mock {
        self.server.mock("POST", path)
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="image"; filename="input\.jpg""#.to_string()),
                Matcher::Regex(r"(?i)content-type: image/\*".to_string()),
                Matcher::Regex(format!(r#"(?s)name="crop".*?\r\n\r\n{}\r\n"#, crop)),
            ]))
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body(body)
            .expect(1)
            .create()
    }

    /// Mock a classifier that fails with `status`
    pub fn mock_upload_failure(&mut self, path: &str, status: usize) -> Mock {
        self.server.mock("POST", path)
            .with_status(status)
            .with_header("content-type", "text/plain")
            .with_body("classifier crashed")
            .expect(1)
            .create()
    }

    /// Mock that fails the test if any request reaches it
    pub fn mock_never_called(&mut self, path: &str) -> Mock {
        self.server.mock("POST", path)
            .with_status(200)
            .expect(0)
            .create()
    }

    /// URL of a local port nothing is listening on
    pub async fn unreachable_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/upload", addr)
    }

    /// URL of a server that accepts connections but never answers
    ///
    /// Keep the returned listener alive for as long as the endpoint is used.
    pub async fn silent_endpoint() -> (String, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (format!("http://{}/upload", addr), listener)
    }

    /// URL of a one-shot server that answers with `status_line` verbatim
    ///
    /// mockito always sends the canonical reason phrase; this lets a test
    /// control the exact status line, e.g. `HTTP/1.1 500 Model Crashed`.
    pub async fn raw_response_endpoint(status_line: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "{}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            status_line
        );

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}/upload", addr)
    }
}

/// Drain one HTTP request so the client never sees a reset mid-upload
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(header_end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok());
            match body_len {
                Some(len) if request.len() >= header_end + 4 + len => return,
                None if request.ends_with(b"0\r\n\r\n") => return,
                _ => {}
            }
        }

        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_endpoint_joins_path() {
        let harness = TestHarness::new().await;
        assert_eq!(harness.endpoint("/upload"), format!("{}/upload", harness.url()));
    }

    #[tokio::test]
    async fn test_raw_response_endpoint_sends_status_line() {
        let url = TestHarness::raw_response_endpoint("HTTP/1.1 503 Warming Up").await;
        let response = reqwest::Client::new().post(&url).body("x").send().await.unwrap();
        assert_eq!(response.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_refuses_connections() {
        let url = TestHarness::unreachable_endpoint().await;
        let result = reqwest::Client::new().post(&url).send().await;
        assert!(result.is_err());
    }
}
