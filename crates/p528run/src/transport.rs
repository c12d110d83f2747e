//! # Channel Transport
//!
//! Moves opaque byte buffers between a caller and an isolated context. Call
//! and result messages, and the correlation between them, live one layer up
//! in `peer` and `registry`.

/// Failures of the channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The other end is gone: the context exited or dropped its end.
    ConnectionLost(String),
    /// This end was closed with `Transport::close` and can no longer send.
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Closed => write!(f, "Transport closed on this end"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// One end of a duplex message channel, usable as `Arc<dyn Transport>`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Posts a payload to the other end.
    ///
    /// Fails once the other end can no longer receive.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Waits for the next payload. `Ok(None)` means the other end closed and
    /// everything it sent has been read.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;

    /// Stops sending. The other end drains what is queued, then sees `None`.
    fn close(&self) {}
}
