//! Error types for OSD sessions

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Convenience alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The windowing connection could not be opened. No session exists.
    #[error("failed to connect to the X server: {0}")]
    Connection(#[from] ConnectError),

    /// Poll instance, waker or worker thread could not be allocated during construction.
    #[error("failed to allocate session resources: {0}")]
    ResourceExhausted(#[source] std::io::Error),

    /// A request, reply or multiplexed wait failed.
    #[error("window system protocol error: {0}")]
    Protocol(String),

    /// The event-loop thread has exited; the session can only be destroyed.
    #[error("the event loop thread is no longer running")]
    EventLoopStopped,

    #[error("a flash animation is already running on this session")]
    FlashInProgress,
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<ReplyError> for Error {
    fn from(err: ReplyError) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<ReplyOrIdError> for Error {
    fn from(err: ReplyOrIdError) -> Self {
        Error::Protocol(err.to_string())
    }
}
