//! # warden
//!
//! Request logging and panic containment for a small hyper-based HTTP
//! framework.
//!
//! - [`RequestLogger`](middleware::RequestLogger) writes one structured
//!   record per request once the handler chain has finished.
//! - [`FaultRecovery`](middleware::FaultRecovery) turns a panic anywhere
//!   downstream into a logged event. The client gets an empty `500`, or
//!   nothing at all when the panic came from the client hanging up.
//! - [`Logger`] is the structured-logging facade both of them write
//!   through, backed by a size-rotated file ([`SinkConfig`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use warden::middleware::{FaultRecovery, RequestLogger};
//! use warden::{Logger, Request, Response, Router, Server, SinkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), warden::Error> {
//!     let logger = Logger::new(&SinkConfig::default())?;
//!
//!     let app = Router::new()
//!         .with(RequestLogger::new(logger.clone()))
//!         .with(FaultRecovery::new(logger, true))
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:8080").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```

mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod logging;
pub mod middleware;

pub use context::{Context, ContextError, ErrorType, Errors, ErrorsOfType};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use logging::{Logger, SinkConfig};
pub use request::Request;
pub use response::{BoxError, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{Server, serve_listener};
