//! Per-request context threaded through the middleware chain.
//!
//! A [`Context`] owns one request for its whole trip through the pipeline:
//! the request itself, the response slot, the errors collected along the way,
//! and the control flags middleware use to stop the chain early.

use std::fmt;

use http::StatusCode;

use crate::request::Request;
use crate::response::{BoxError, Response};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Visibility of an error recorded on a [`Context`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorType {
    /// Server-internal: logged, never rendered to the client.
    Private,
    /// May be rendered to the client by application code.
    Public,
}

/// One error recorded on a [`Context`].
#[derive(Debug)]
pub struct ContextError {
    pub error: BoxError,
    pub kind: ErrorType,
}

/// The errors accumulated while handling one request, in recording order.
#[derive(Debug, Default)]
pub struct Errors(Vec<ContextError>);

impl Errors {
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }

    pub fn iter(&self) -> impl Iterator<Item = &ContextError> {
        self.0.iter()
    }

    /// Errors of one visibility, in recording order.
    pub fn by_type(&self, kind: ErrorType) -> ErrorsOfType<'_> {
        ErrorsOfType { errors: &self.0, kind }
    }

    fn push(&mut self, error: BoxError, kind: ErrorType) {
        self.0.push(ContextError { error, kind });
    }
}

/// A filtered view over [`Errors`]. Its `Display` output is one
/// `Error #NN: <message>` line per error, or empty.
pub struct ErrorsOfType<'a> {
    errors: &'a [ContextError],
    kind: ErrorType,
}

impl ErrorsOfType<'_> {
    pub fn iter(&self) -> impl Iterator<Item = &ContextError> {
        let kind = self.kind;
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

impl fmt::Display for ErrorsOfType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, entry.error)?;
        }
        Ok(())
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// State of one request/response cycle.
///
/// The response slot starts as an empty `200 OK` that nothing has written
/// yet. Handlers fill it through the router; middleware may overwrite it.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    written: bool,
    aborted: bool,
    abandoned: bool,
    errors: Errors,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::status(StatusCode::OK),
            written: false,
            aborted: false,
            abandoned: false,
            errors: Errors::default(),
        }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn response(&self) -> &Response { &self.response }
    pub fn errors(&self) -> &Errors { &self.errors }

    /// Status currently held by the response slot.
    pub fn status(&self) -> StatusCode { self.response.status_code() }

    /// Whether anything has set a status or response yet.
    pub fn is_written(&self) -> bool { self.written }

    pub fn set_status(&mut self, code: StatusCode) {
        self.response.set_status(code);
        self.written = true;
    }

    /// Stores the handler's response. Private errors it carries move onto
    /// the context.
    pub fn set_response(&mut self, mut response: Response) {
        for err in response.take_errors() {
            self.errors.push(err, ErrorType::Private);
        }
        self.response = response;
        self.written = true;
    }

    /// Records a private error.
    pub fn error(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into(), ErrorType::Private);
    }

    /// Records an error with an explicit visibility.
    pub fn error_with_type(&mut self, err: impl Into<BoxError>, kind: ErrorType) {
        self.errors.push(err.into(), kind);
    }

    /// Stops the chain: links that have not run yet are skipped.
    /// Links already running finish normally.
    pub fn abort(&mut self) { self.aborted = true; }

    pub fn is_aborted(&self) -> bool { self.aborted }

    /// Aborts and replaces whatever was written with an empty response.
    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.response = Response::status(code);
        self.written = true;
        self.aborted = true;
    }

    /// Marks the connection as unusable. The server then closes it instead
    /// of writing a response.
    pub fn abandon(&mut self) { self.abandoned = true; }

    pub fn is_abandoned(&self) -> bool { self.abandoned }

    /// The response to write, or `None` if the connection was abandoned.
    pub fn into_response(self) -> Option<Response> {
        (!self.abandoned).then_some(self.response)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::request::build_request;

    fn context() -> Context {
        Context::new(build_request(http::Request::builder().method(Method::GET).uri("/"), ""))
    }

    #[test]
    fn starts_unwritten_with_ok() {
        let ctx = context();

        assert_eq!(ctx.status(), StatusCode::OK);
        assert!(!ctx.is_written());
        assert!(!ctx.is_aborted());
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn private_errors_render_numbered_lines() {
        let mut ctx = context();
        ctx.error("db timeout");
        ctx.error_with_type("bad input", ErrorType::Public);
        ctx.error("cache miss");

        let rendered = ctx.errors().by_type(ErrorType::Private).to_string();

        assert_eq!(rendered, "Error #01: db timeout\nError #02: cache miss\n");
        assert_eq!(ctx.errors().by_type(ErrorType::Public).to_string(), "Error #01: bad input\n");
        assert_eq!(ctx.errors().len(), 3);
    }

    #[test]
    fn handler_errors_move_onto_context() {
        let mut ctx = context();
        ctx.set_response(Response::text("ok").with_error("stale read"));

        assert!(ctx.is_written());
        assert_eq!(ctx.errors().by_type(ErrorType::Private).iter().count(), 1);
    }

    #[test]
    fn abort_with_status_discards_body() {
        let mut ctx = context();
        ctx.set_response(Response::text("half a page"));
        ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);

        let res = ctx.into_response().unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
    }

    #[test]
    fn abandoned_context_yields_no_response() {
        let mut ctx = context();
        ctx.abort();
        ctx.abandon();

        assert!(!ctx.is_written());
        assert!(ctx.into_response().is_none());
    }
}
