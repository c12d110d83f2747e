//! # Error Definitions
//!
//! Two ledgers of failure: `RpcError` is the local codec failing, `FailureReason`
//! is the remote side reporting that a call could not be completed.

use serde::Deserialize;
use serde::Serialize;

/// Operational failures within the message codec itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The payload could not be serialized or deserialized as JSON.
    Serialization(String),
    /// The payload decoded, but not into the message kind expected here.
    ProtocolViolation(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Reasons for a remote failure (the `failure` side of a result message).
///
/// These travel over the wire. They describe the exposed object failing to
/// produce a value, whereas `RpcError` describes bytes failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum FailureReason {
    /// The target path does not name a method on the exposed object.
    MethodNotFound(String),
    /// The method ran and failed, or panicked.
    InvocationError(String),
    /// The arguments did not decode into the method's parameter types.
    BadArguments(String),
    /// The call message itself was malformed.
    ProtocolViolation(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MethodNotFound(name) => write!(f, "method not found: {}", name),
            Self::InvocationError(msg) => write!(f, "invocation failed: {}", msg),
            Self::BadArguments(msg) => write!(f, "bad arguments: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
        }
    }
}
