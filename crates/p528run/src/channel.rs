//! In-process duplex channel between a caller and a context thread.

use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use crate::transport;
use crate::transport::Transport;

/// One end of an unbounded in-process channel.
///
/// The two ends of a `pair` may live on different threads and be driven by
/// different runtimes, which is how a context thread talks to its caller.
pub struct ChannelTransport {
    outbox: StdMutex<Option<UnboundedSender<Vec<u8>>>>,
    inbox: Mutex<UnboundedReceiver<Vec<u8>>>,
}

impl ChannelTransport {
    /// Two connected ends: what one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (to_context, from_caller) = unbounded_channel();
        let (to_caller, from_context) = unbounded_channel();

        let caller = Self::new(to_context, from_context);
        let context = Self::new(to_caller, from_caller);
        (caller, context)
    }

    fn new(outbox: UnboundedSender<Vec<u8>>, inbox: UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            outbox: StdMutex::new(Some(outbox)),
            inbox: Mutex::new(inbox),
        }
    }

    fn outbox(&self) -> Option<UnboundedSender<Vec<u8>>> {
        self.outbox.lock().ok().and_then(|outbox| outbox.clone())
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let outbox = self.outbox().ok_or(transport::Error::Closed)?;
        outbox
            .send(payload.to_vec())
            .map_err(|_| transport::Error::ConnectionLost("receiving end dropped".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(self.inbox.lock().await.recv().await)
    }

    fn close(&self) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.take();
        }
    }
}
