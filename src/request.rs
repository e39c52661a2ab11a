//! Incoming HTTP request type.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::header::{HeaderMap, HOST, USER_AGENT};
use http::{Method, Uri, Version};

/// An incoming HTTP request with its body already collected.
///
/// Cloning is cheap for the body (`Bytes` is reference counted); the head is
/// copied. The router keeps one copy on the [`Context`](crate::Context) so
/// middleware can still inspect the request after the handler consumed its
/// own.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: SocketAddr,
}

impl Request {
    /// Assembles a request from its `http` parts, the collected body, and the
    /// peer address of the connection it arrived on.
    pub fn from_parts(parts: http::request::Parts, body: Bytes, remote_addr: SocketAddr) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr,
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// The raw query string without the leading `?`, or `""`.
    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    /// Header lookup. Values that are not visible ASCII read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `User-Agent` header, or `""`.
    pub fn user_agent(&self) -> &str {
        self.headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Best-effort address of the client that originated the request.
    ///
    /// Behind a reverse proxy the TCP peer is the proxy, so the first entry of
    /// `X-Forwarded-For` wins, then `X-Real-IP`, then the peer address.
    pub fn client_ip(&self) -> IpAddr {
        let forwarded: Option<IpAddr> = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        let real = || self.header("x-real-ip").and_then(|v| v.trim().parse().ok());

        forwarded.or_else(real).unwrap_or_else(|| self.remote_addr.ip())
    }

    /// Wire-format dump of the request head: request line, headers, and the
    /// terminating blank line. The body is never included.
    pub fn dump(&self) -> String {
        let target = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut out = String::with_capacity(128);
        let _ = write!(out, "{} {} {:?}\r\n", self.method, target, self.version);

        // HTTP/2 carries the host in the URI authority rather than a header.
        if !self.headers.contains_key(HOST) {
            if let Some(authority) = self.uri.authority() {
                let _ = write!(out, "Host: {authority}\r\n");
            }
        }
        for (name, value) in &self.headers {
            let value = String::from_utf8_lossy(value.as_bytes());
            let _ = write!(out, "{}: {}\r\n", canonical(name.as_str()), value);
        }
        out.push_str("\r\n");
        out
    }
}

/// `user-agent` → `User-Agent`. `http` stores names lowercased.
fn canonical(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
pub(crate) fn build_request(builder: http::request::Builder, body: &'static str) -> Request {
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    Request::from_parts(parts, Bytes::from_static(body.as_bytes()), "10.0.0.9:5000".parse().unwrap())
}
