//! Middleware layer.
//!
//! Middleware wraps the rest of the chain and observes it from the outside:
//! it can act before calling [`Next::run`], after it returns, or around it.
//! Registration order is invocation order, so the first middleware added to
//! a [`Router`](crate::Router) is the outermost.
//!
//! Built-in middleware:
//! - [`RequestLogger`] writes one structured record per request.
//! - [`FaultRecovery`] turns a handler panic into a logged event and a
//!   `500`, or drops the connection if the client is already gone.
//!
//! ```rust,no_run
//! use warden::middleware::{FaultRecovery, RequestLogger};
//! use warden::{Logger, Request, Response, Router, SinkConfig};
//!
//! # fn main() -> Result<(), warden::Error> {
//! let logger = Logger::new(&SinkConfig::default())?;
//! let app = Router::new()
//!     .with(RequestLogger::new(logger.clone()))
//!     .with(FaultRecovery::new(logger, true))
//!     .get("/hello", hello);
//! # Ok(()) }
//! # async fn hello(_: Request) -> Response { Response::text("hello") }
//! ```

mod logger;
mod recovery;

use std::sync::Arc;

pub use logger::RequestLogger;
pub use recovery::{Fault, FaultClass, FaultRecovery};

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler};

/// A link in the request pipeline.
///
/// Implementations receive the request [`Context`] and the remainder of the
/// chain. Not calling `next.run(ctx)` short-circuits everything downstream.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()>;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The downstream part of the chain: the middleware not yet run, then the
/// route handler.
pub struct Next<'a> {
    chain: &'a [BoxedMiddleware],
    endpoint: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [BoxedMiddleware], endpoint: &'a BoxedHandler) -> Self {
        Self { chain, endpoint }
    }

    /// Runs the rest of the chain to completion. Does nothing once the
    /// context is aborted.
    pub async fn run(self, ctx: &mut Context) {
        if ctx.is_aborted() {
            return;
        }
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(ctx, Next::new(rest, self.endpoint)).await,
            None => {
                let response = self.endpoint.call(ctx.request().clone()).await;
                ctx.set_response(response);
            }
        }
    }
}
