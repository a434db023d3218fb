//! A tiny HTTP/1.1 server on 127.0.0.1 serving canned pages to the fetch-driven tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// A canned response body with its `Content-Type`.
#[derive(Debug, Clone)]
pub struct Page {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            body: body.into(),
        }
    }
}

/// Serves `pages` by request path. Unknown paths answer `404 Not Found`.
pub struct FixtureServer {
    base: Url,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub async fn start(pages: Vec<(&str, Page)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Expected a free local port.");
        let addr = listener.local_addr().expect("Expected a bound address.");

        let pages: Arc<HashMap<String, Page>> = Arc::new(
            pages
                .into_iter()
                .map(|(path, page)| (path.to_string(), page))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(respond(stream, Arc::clone(&pages), Arc::clone(&log)));
            }
        });

        Self {
            base: Url::parse(&format!("http://{addr}/")).expect("Expected a valid base url."),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).expect("Expected a valid fixture url.")
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .expect("Expected the request log.")
            .iter()
            .filter(|requested| *requested == path)
            .count()
    }
}

async fn respond(
    mut stream: TcpStream,
    pages: Arc<HashMap<String, Page>>,
    log: Arc<Mutex<Vec<String>>>,
) {
    let mut request = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => request.extend_from_slice(&chunk[..read]),
        }
    }

    let path = String::from_utf8_lossy(&request)
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();
    log.lock().expect("Expected the request log.").push(path.clone());

    let (status, page) = match pages.get(&path) {
        Some(page) => ("200 OK", page.clone()),
        None => ("404 Not Found", Page::new("text/plain", "not found")),
    };
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        page.content_type,
        page.body.len()
    );

    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&page.body).await;
    let _ = stream.shutdown().await;
}
