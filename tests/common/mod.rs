//! Shared utilities for integration tests.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warden::{Logger, Router};

/// Logger writing into memory, plus a parser for what it wrote.
#[derive(Clone, Default)]
pub struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
}

#[derive(Debug)]
pub struct Record {
    pub level: String,
    pub message: String,
    pub fields: Map<String, Value>,
    pub stack: Option<String>,
}

impl Capture {
    pub fn logger(&self) -> Logger {
        let buf = Arc::clone(&self.buf);
        Logger::with_writer(move || Sink(Arc::clone(&buf)))
    }

    pub fn records(&self) -> Vec<Record> {
        let raw = String::from_utf8(self.buf.lock().unwrap().clone()).unwrap();
        parse(&raw)
    }
}

struct Sink(Arc<Mutex<Vec<u8>>>);

impl io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parses log text: tab-separated records, stack frames on tab-indented lines
/// joined with `\n`, as the crate's own unit-test capture does.
pub fn parse(raw: &str) -> Vec<Record> {
    let mut records: Vec<Record> = Vec::new();
    for line in raw.lines() {
        if let Some(frame) = line.strip_prefix('\t') {
            let record = records.last_mut().unwrap();
            let stack = record.stack.get_or_insert_with(String::new);
            if !stack.is_empty() {
                stack.push('\n');
            }
            stack.push_str(frame);
            continue;
        }
        let columns: Vec<&str> = line.splitn(6, '\t').collect();
        records.push(Record {
            level: columns[1].to_owned(),
            message: columns[4].to_owned(),
            fields: columns.get(5).map(|json| serde_json::from_str(json).unwrap()).unwrap_or_default(),
            stack: None,
        });
    }
    records
}

/// A server running on an ephemeral port until dropped or stopped.
pub struct TestServer {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), warden::Error>>,
}

impl TestServer {
    pub async fn start(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(warden::serve_listener(listener, router, async {
            let _ = stopped.await;
        }));
        Self { addr, stop: Some(stop), task }
    }

    pub async fn send(&self, method: &str, path: &str) -> String {
        send(self.addr, method, path).await
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

/// Sends one `Connection: close` request and reads until the server closes.
/// An empty string means nothing was written back.
pub async fn send(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nUser-Agent: itest/1.0\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    // A reset after a dropped connection reads as end of stream here.
    let _ = stream.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response).into_owned()
}
