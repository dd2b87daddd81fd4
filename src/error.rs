//! Unified error type.

use std::fmt;

/// The error type returned by filament's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures, split along how the caller should react:
///
/// - [`Io`](Error::Io) and [`Setup`](Error::Setup) are fatal to startup.
///   A server must not come up half-configured.
/// - [`Transport`](Error::Transport) is a normal result error for outbound
///   calls; the span around the call is closed before it is returned.
/// - [`SpanFinished`](Error::SpanFinished) and [`Id`](Error::Id) are
///   instrumentation defects. They are reported to the caller so tests can
///   see them, but request processing always continues: tracing is
///   best-effort and never becomes an HTTP-visible failure.
#[derive(Debug)]
pub enum Error {
    /// Socket-level failure: binding the listener or accepting a connection.
    Io(std::io::Error),
    /// Tracer or collector could not be constructed (bad endpoint, empty
    /// service name). Reported to the caller at startup, never deferred.
    Setup(String),
    /// An outbound HTTP call failed below the status-code level.
    Transport(reqwest::Error),
    /// An operation was attempted on a span that is already finished.
    /// Carries the name of the late operation.
    SpanFinished(&'static str),
    /// Correlation-identifier generation failed.
    Id(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Setup(reason) => write!(f, "setup: {reason}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::SpanFinished(op) => write!(f, "span already finished: {op} dropped"),
            Self::Id(reason) => write!(f, "id generation: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}
