//! Minimal service wired with request logging and fault recovery.
//!
//! ```text
//! cargo run --example hello
//! curl localhost:8080/hello        # 200 "hello gin zap"
//! curl localhost:8080/panic        # 500, error record with stack in ./app.log
//! curl localhost:8080/broken-pipe  # connection closed, no status
//! ```

use std::io;
use std::panic;

use warden::middleware::{FaultRecovery, RequestLogger};
use warden::{debugf, Logger, Request, Response, Router, Server, SinkConfig};

#[tokio::main]
async fn main() -> Result<(), warden::Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => SinkConfig::load(path)?,
        None => SinkConfig::default(),
    };
    let logger = Logger::new(&config)?;

    let app = Router::new()
        .with(RequestLogger::new(logger.clone()))
        .with(FaultRecovery::new(logger.clone(), true))
        .get("/hello", hello)
        .get("/panic", explode)
        .get("/broken-pipe", hang_up);

    debugf!(logger, "starting on :8080, logging to {}", config.filename.display());
    Server::bind("0.0.0.0:8080").serve(app).await
}

async fn hello(_req: Request) -> Response {
    Response::text("hello gin zap")
}

async fn explode(_req: Request) -> Response {
    let missing: Option<&str> = None;
    Response::text(missing.unwrap().to_owned())
}

async fn hang_up(_req: Request) -> Response {
    panic::panic_any(io::Error::new(io::ErrorKind::BrokenPipe, "write: broken pipe"))
}
