//! # Caller-Side Peer with Async Pump
//!
//! The `Peer` turns call messages into futures. It owns the caller end of a
//! transport, spawns a pump task that reads result messages, and correlates
//! them with pending calls through the call id.
//!
//! ## Invariants
//!
//! - Ids come from a monotonically increasing counter and are never reused.
//! - A pending entry is removed exactly once: by its result, by a timeout,
//!   by a failed send, or by the sweep when the channel closes.
//! - Once the peer is closed, every pending call and every later call fails
//!   with `ChannelClosed`.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use p528rpc::CallId;
use p528rpc::CallMessage;
use p528rpc::FailureReason;
use p528rpc::RpcError;
use p528rpc::decode_result;

use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Error {
    /// A message could not be encoded, or a result value did not decode.
    Rpc(RpcError),
    /// The context answered with a failure.
    Remote(FailureReason),
    /// No result arrived within the configured call timeout.
    Timeout,
    /// The context went away before answering.
    ChannelClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc(e) => write!(f, "RPC error: {}", e),
            Self::Remote(reason) => write!(f, "Remote failure: {}", reason),
            Self::Timeout => write!(f, "Call timed out"),
            Self::ChannelClosed => write!(f, "Channel closed before a result arrived"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Rpc(RpcError::from(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

type PendingTable = DashMap<CallId, oneshot::Sender<Result<Value>>>;

/// Caller end of a channel with a message pump for concurrent calls.
///
/// Must be created inside a tokio runtime; the pump is spawned onto it.
pub struct Peer {
    peer_name: String,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    closed: Arc<AtomicBool>,
    seq_gen: AtomicU64,
    call_timeout: Option<Duration>,
    pump: JoinHandle<()>,
}

impl Peer {
    /// Creates a new peer and spawns the background pump task.
    /// The peer_name is used for logging and diagnostics.
    pub fn new(peer_name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        let peer_name = peer_name.into();
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let pending = Arc::new(PendingTable::new());
        let closed = Arc::new(AtomicBool::new(false));

        let pump_name = peer_name.clone();
        let pump_transport = transport.clone();
        let pump_pending = pending.clone();
        let pump_closed = closed.clone();

        let pump = tokio::spawn(async move {
            loop {
                match pump_transport.recv().await {
                    Ok(Some(msg)) => {
                        if let Err(e) = Self::handle_message(&msg, &pump_pending) {
                            tracing::warn!(peer = %pump_name, error = %e, "dropping malformed message");
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(peer = %pump_name, "channel closed by context");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(peer = %pump_name, error = %e, "transport failure in pump");
                        break;
                    }
                }
            }

            Self::sweep(&pump_name, &pump_pending, &pump_closed);
        });

        Self {
            peer_name,
            transport,
            pending,
            closed,
            seq_gen: AtomicU64::new(1),
            call_timeout: None,
            pump,
        }
    }

    /// Sets how long a call may wait for its result. `None` waits forever.
    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    /// Number of calls still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Rejects every pending call with `ChannelClosed` and refuses new ones.
    fn sweep(peer_name: &str, pending: &PendingTable, closed: &AtomicBool) {
        closed.store(true, Ordering::SeqCst);

        let keys: Vec<CallId> = pending.iter().map(|e| *e.key()).collect();
        if !keys.is_empty() {
            tracing::debug!(peer = %peer_name, count = keys.len(), "rejecting pending calls");
        }
        for key in keys {
            if let Some((_, tx)) = pending.remove(&key) {
                let _ = tx.send(Err(Error::ChannelClosed));
            }
        }
    }

    /// Handles one incoming payload. Results for unknown ids are dropped.
    fn handle_message(msg: &[u8], pending: &PendingTable) -> std::result::Result<(), RpcError> {
        let result = decode_result(msg)?;
        let id = result.id;

        let Some((_, tx)) = pending.remove(&id) else {
            // duplicate, or the caller already gave up on it
            tracing::debug!(id, "discarding result with no pending call");
            return Ok(());
        };

        let _ = tx.send(result.into_result().map_err(Error::Remote));
        Ok(())
    }

    /// Allocates an id and registers a pending entry for it.
    pub fn prepare_call(&self) -> (CallId, oneshot::Receiver<Result<Value>>) {
        let id = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, rx)
    }

    /// Posts an already encoded call and awaits its result.
    pub async fn send_and_await(
        &self,
        id: CallId,
        payload: Vec<u8>,
        rx: oneshot::Receiver<Result<Value>>,
    ) -> Result<Value> {
        // the sweep may have run between registration and now
        if self.is_closed() {
            self.pending.remove(&id);
            return Err(Error::ChannelClosed);
        }

        if let Err(e) = self.transport.send(&payload).await {
            tracing::debug!(peer = %self.peer_name, id, error = %e, "send failed");
            self.pending.remove(&id);
            // both transport failures mean the context can no longer be reached
            return Err(Error::ChannelClosed);
        }

        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.remove(&id);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.pending.remove(&id);
                Err(Error::ChannelClosed)
            }
        }
    }

    /// Invokes `path` on the remote object and awaits the raw JSON result.
    pub async fn call(&self, path: Vec<String>, args: Vec<Value>) -> Result<Value> {
        let (id, rx) = self.prepare_call();

        let payload = match CallMessage::new(id, path, args).encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(&id);
                return Err(e.into());
            }
        };

        tracing::debug!(peer = %self.peer_name, id, "posting call");
        self.send_and_await(id, payload, rx).await
    }

    /// Closes the caller end and rejects everything still pending.
    pub fn close(&self) {
        self.transport.close();
        self.pump.abort();
        Self::sweep(&self.peer_name, &self.pending, &self.closed);
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
