//! End-to-end tests over real TCP connections.

use std::io;
use std::panic;
use std::time::Duration;

use warden::middleware::{FaultRecovery, RequestLogger};
use warden::{Logger, Request, Response, Router, SinkConfig, StatusCode};

mod common;
use common::{Capture, TestServer};

async fn hello(_req: Request) -> Response {
    Response::text("hello gin zap")
}

async fn explode(_req: Request) -> Response {
    let users: Vec<&str> = Vec::new();
    Response::text(users[3])
}

async fn hang_up(_req: Request) -> Response {
    panic::panic_any(io::Error::new(io::ErrorKind::BrokenPipe, "write: broken pipe"))
}

async fn nap(_req: Request) -> Response {
    tokio::time::sleep(Duration::from_millis(5)).await;
    Response::status(StatusCode::NO_CONTENT)
}

fn app(logger: Logger) -> Router {
    Router::new()
        .with(RequestLogger::new(logger.clone()))
        .with(FaultRecovery::new(logger, true))
        .get("/hello", hello)
        .get("/panic", explode)
        .get("/broken-pipe", hang_up)
        .get("/nap", nap)
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

#[tokio::test]
async fn hello_is_served_and_logged() {
    let capture = Capture::default();
    let server = TestServer::start(app(capture.logger())).await;

    let response = server.send("GET", "/hello?lang=en").await;
    server.stop().await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert_eq!(body(&response), "hello gin zap");

    let records = capture.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.level, "info");
    assert_eq!(record.message, "/hello");
    assert_eq!(record.fields["status"], 200);
    assert_eq!(record.fields["path"], "/hello");
    assert_eq!(record.fields["query"], "lang=en");
    assert_eq!(record.fields["ip"], "127.0.0.1");
    assert_eq!(record.fields["user_agent"], "itest/1.0");
    assert!(record.fields["duration"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn application_panic_is_contained() {
    let capture = Capture::default();
    let server = TestServer::start(app(capture.logger())).await;

    let response = server.send("GET", "/panic").await;
    let after = server.send("GET", "/hello").await;
    server.stop().await;

    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error"), "{response}");
    assert_eq!(body(&response), "");
    assert!(after.starts_with("HTTP/1.1 200 OK"), "{after}");

    let records = capture.records();
    let faults: Vec<_> = records.iter().filter(|r| r.level == "error").collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].message, "recovery from fault");
    assert!(faults[0].fields["error"].as_str().unwrap().contains("index out of bounds"));
    assert!(faults[0].fields["request"].as_str().unwrap().starts_with("GET /panic HTTP/1.1\r\n"));
    assert!(faults[0].stack.is_some());

    let statuses: Vec<_> = records
        .iter()
        .filter(|r| r.level == "info")
        .map(|r| r.fields["status"].as_u64().unwrap())
        .collect();
    assert_eq!(statuses, [500, 200]);
}

#[tokio::test]
async fn client_disconnect_closes_without_status() {
    let capture = Capture::default();
    let server = TestServer::start(app(capture.logger())).await;

    let response = server.send("GET", "/broken-pipe").await;
    let after = server.send("GET", "/hello").await;
    server.stop().await;

    assert_eq!(response, "", "no status line may be written");
    assert!(after.starts_with("HTTP/1.1 200 OK"), "{after}");

    let records = capture.records();
    let faults: Vec<_> = records.iter().filter(|r| r.level == "error").collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].message, "/broken-pipe");
    assert_eq!(faults[0].fields["error"], "write: broken pipe");
    assert!(faults[0].fields["request"].as_str().unwrap().contains("User-Agent: itest/1.0\r\n"));
    assert!(faults[0].stack.is_none());

    let access = records
        .iter()
        .find(|r| r.level == "info" && r.message == "/broken-pipe")
        .unwrap();
    assert_eq!(access.fields["errors"], "Error #01: write: broken pipe\n");
}

#[tokio::test]
async fn unmatched_route_is_logged_as_not_found() {
    let capture = Capture::default();
    let server = TestServer::start(app(capture.logger())).await;

    let response = server.send("POST", "/hello").await;
    server.stop().await;

    assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
    let records = capture.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields["status"], 404);
    assert_eq!(records[0].fields["method"], "POST");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_record_per_concurrent_request() {
    let capture = Capture::default();
    let server = TestServer::start(app(capture.logger())).await;

    let mut clients = tokio::task::JoinSet::new();
    for _ in 0..32 {
        let addr = server.addr;
        clients.spawn(async move { common::send(addr, "GET", "/nap").await });
    }
    while let Some(response) = clients.join_next().await {
        assert!(response.unwrap().starts_with("HTTP/1.1 204 No Content"));
    }
    server.stop().await;

    let records = capture.records();
    assert_eq!(records.len(), 32);
    assert!(records.iter().all(|r| r.message == "/nap" && r.fields["status"] == 204));
}

#[tokio::test]
async fn records_reach_the_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = SinkConfig { filename: dir.path().join("logs/access.log"), ..SinkConfig::default() };
    let logger = Logger::new(&config).unwrap();
    let server = TestServer::start(app(logger.clone())).await;

    server.send("GET", "/hello").await;
    server.send("GET", "/panic").await;
    server.stop().await;
    drop(logger);

    let raw = std::fs::read_to_string(&config.filename).unwrap();
    let records = common::parse(&raw);
    let levels: Vec<_> = records.iter().map(|r| r.level.as_str()).collect();
    assert_eq!(levels, ["info", "error", "info"]);
    assert_eq!(records[1].message, "recovery from fault");
}

#[test]
fn stack_frames_are_joined_line_by_line() {
    let raw = "ts\terror\tsvc\tmain.rs:1\tboom\t{\"error\":\"x\"}\n\tframe one\n\tframe two\nts\tinfo\tsvc\tmain.rs:2\t/\n";
    let records = common::parse(raw);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].stack.as_deref(), Some("frame one\nframe two"));
    assert!(records[1].stack.is_none());
}
