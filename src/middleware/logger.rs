//! Per-request access logging.

use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::context::{Context, ErrorType};
use crate::handler::BoxFuture;
use crate::logging::Logger;

/// Emits one `info` record per request once the rest of the chain returns.
///
/// The record's message is the request path. Fields: `status`, `method`,
/// `path`, `query`, `ip`, `user_agent`, `errors` (private errors, one
/// `Error #NN:` line each) and `duration` in seconds.
///
/// Request attributes are captured before the chain runs. Register it ahead
/// of [`FaultRecovery`](super::FaultRecovery) so a contained panic still
/// produces a record with the `500` that recovery wrote.
#[derive(Clone)]
pub struct RequestLogger {
    logger: Logger,
}

impl RequestLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl Middleware for RequestLogger {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let start = Instant::now();
            let req = ctx.request();
            let method = req.method().clone();
            let path = req.path().to_owned();
            let query = req.query().to_owned();
            let ip = req.client_ip();
            let user_agent = req.user_agent().to_owned();

            next.run(ctx).await;

            let duration = start.elapsed();
            let errors = ctx.errors().by_type(ErrorType::Private).to_string();
            self.logger.scope(|| {
                info!(
                    status = ctx.status().as_u16(),
                    method = %method,
                    path = %path,
                    query = %query,
                    ip = %ip,
                    user_agent = %user_agent,
                    errors = %errors,
                    duration = duration.as_secs_f64(),
                    "{path}"
                );
            });
        })
    }
}
