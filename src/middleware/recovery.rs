//! Panic containment.
//!
//! A panic inside a handler unwinds through the request future. Left alone,
//! hyper's connection task dies with it and the client sees a reset. The
//! [`FaultRecovery`] middleware catches the unwind at a single boundary per
//! request, classifies it, logs it, and picks the terminal outcome:
//!
//! | Class | Log message | Outcome |
//! |---|---|---|
//! | [`FaultClass::ClientDisconnect`] | request path | private error, connection dropped, no status |
//! | [`FaultClass::ApplicationFault`] | `recovery from fault` | `500`, empty body |

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::iter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::{Middleware, Next};
use crate::context::Context;
use crate::handler::BoxFuture;
use crate::logging::Logger;
use crate::response::BoxError;

/// Longest cause chain inspected during classification.
const MAX_CAUSE_DEPTH: usize = 16;

/// Lowercased message fragments of a peer that hung up mid-response.
const DISCONNECT_SIGNATURES: [&str; 2] = ["broken pipe", "connection reset by peer"];

// ── Fault ─────────────────────────────────────────────────────────────────────

/// How a contained panic is treated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultClass {
    /// The peer closed the connection; nothing can be written back.
    ClientDisconnect,
    /// Anything else.
    ApplicationFault,
}

/// A panic payload turned back into an error value.
///
/// Payloads that are errors (`std::io::Error`, `Box<dyn Error + Send + Sync>`,
/// `hyper::Error`) keep their cause chain, reachable through
/// [`Error::source`](std::error::Error::source). String payloads from
/// `panic!` become message-only faults. The class is fixed at construction.
#[derive(Debug)]
pub struct Fault {
    message: String,
    cause: Option<BoxError>,
    class: FaultClass,
}

impl Fault {
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<io::Error>() {
            Ok(err) => return Self::from_error(*err),
            Err(other) => other,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(err) => return Self::from_error(*err),
            Err(other) => other,
        };
        let payload = match payload.downcast::<hyper::Error>() {
            Ok(err) => return Self::from_error(*err),
            Err(other) => other,
        };

        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        Self { message, cause: None, class: FaultClass::ApplicationFault }
    }

    pub fn from_error(err: impl Into<BoxError>) -> Self {
        let err = err.into();
        Self { message: err.to_string(), class: classify(err.as_ref()), cause: Some(err) }
    }

    pub fn class(&self) -> FaultClass { self.class }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Walks the cause chain of `err`, itself included, looking for an I/O error
/// that says the peer went away.
pub(crate) fn classify(err: &(dyn StdError + 'static)) -> FaultClass {
    let disconnected = iter::successors(Some(err), |e| (*e).source())
        .take(MAX_CAUSE_DEPTH)
        .filter_map(|e| e.downcast_ref::<io::Error>())
        .any(is_disconnect);

    if disconnected { FaultClass::ClientDisconnect } else { FaultClass::ApplicationFault }
}

/// Matches on the message only. The kind alone does not say who hung up.
fn is_disconnect(err: &io::Error) -> bool {
    let message = err.to_string().to_lowercase();
    DISCONNECT_SIGNATURES.iter().any(|sig| message.contains(sig))
}

// ── Panic-site backtraces ─────────────────────────────────────────────────────

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Chains a panic hook that stashes a backtrace of the panicking thread.
///
/// The hook runs on the panicking thread before unwinding starts, and
/// `catch_unwind` returns on that same thread within the same poll, so a
/// thread-local hands the trace over.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            let _ = PANIC_TRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(trace);
                }
            });
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// Contains panics raised anywhere downstream.
///
/// With `stack` set, application-fault records carry a `stack` field holding
/// the backtrace of the panicking thread. Building such an instance installs
/// a process-wide panic hook once; the previously installed hook keeps
/// running after it.
#[derive(Clone)]
pub struct FaultRecovery {
    logger: Logger,
    stack: bool,
}

impl FaultRecovery {
    pub fn new(logger: Logger, stack: bool) -> Self {
        if stack {
            install_trace_hook();
        }
        Self { logger, stack }
    }

    fn recover(&self, ctx: &mut Context, payload: Box<dyn Any + Send>) {
        // Taken unconditionally so a trace never outlives its panic.
        let trace = take_panic_trace();
        let fault = Fault::from_panic(payload);
        let request = ctx.request().dump();

        match fault.class() {
            FaultClass::ClientDisconnect => {
                let path = ctx.request().path();
                self.logger.scope(|| {
                    error!(error = %fault, request = %request, "{path}");
                });
                ctx.error(fault);
                ctx.abort();
                ctx.abandon();
            }
            FaultClass::ApplicationFault => {
                if self.stack {
                    let stack = trace.unwrap_or_else(Backtrace::force_capture).to_string();
                    self.logger.scope(|| {
                        error!(error = %fault, request = %request, stack = %stack, "recovery from fault");
                    });
                } else {
                    self.logger.scope(|| {
                        error!(error = %fault, request = %request, "recovery from fault");
                    });
                }
                ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

impl Middleware for FaultRecovery {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(ctx)).catch_unwind().await;
            if let Err(payload) = outcome {
                self.recover(ctx, payload);
            }
        })
    }
}
