//! Unified error type.

use std::io;

/// The error type returned by warden's fallible operations.
///
/// Application-level failures (404, 500, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, and handler panics are contained by
/// [`FaultRecovery`](crate::middleware::FaultRecovery). This type surfaces
/// infrastructure failures: binding a port, reading a request body, opening
/// the log sink, or loading its configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The client went away mid-request; hyper closes the connection
    /// instead of writing a response.
    #[error("connection abandoned after client disconnect")]
    Abandoned,
}
