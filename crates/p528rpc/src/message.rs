//! # Wire Messages
//!
//! Every payload on the channel is one JSON `Message`: either a call travelling
//! from the caller into the context, or a result travelling back.
//!
//! ```text
//! {"kind":"call","id":7,"path":["calc"],"args":["{...}"]}
//! {"kind":"result","id":7,"result":{"status":"success","value":"{...}"}}
//! {"kind":"result","id":8,"result":{"status":"failure","value":{"kind":"MethodNotFound","message":"nope"}}}
//! ```
//!
//! ## Invariants
//!
//! - A result carries the id of the call it answers, nothing else correlates them.
//! - Each side accepts only the kind the other side sends; anything else is a
//!   protocol violation.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::FailureReason;
use crate::error::Result;
use crate::error::RpcError;

/// Correlation id linking a call to its result.
pub type CallId = u64;

/// The envelope carried by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Message {
    Call(CallMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A request to invoke `path` on the exposed object with `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMessage {
    pub id: CallId,
    pub path: Vec<String>,
    pub args: Vec<Value>,
}

impl CallMessage {
    pub fn new(id: CallId, path: Vec<String>, args: Vec<Value>) -> Self {
        Self { id, path, args }
    }

    /// The method name, if the path is a single direct property.
    pub fn method(&self) -> Option<&str> {
        match self.path.as_slice() {
            [name] => Some(name.as_str()),
            _ => None,
        }
    }

    /// Dotted rendering of the path, for errors and logs.
    pub fn target(&self) -> String {
        self.path.join(".")
    }

    pub fn encode(self) -> Result<Vec<u8>> {
        Message::Call(self).encode()
    }
}

/// The answer to exactly one `CallMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub id: CallId,
    pub result: Outcome,
}

/// `status: success|failure` plus the value or the error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Outcome {
    Success(Value),
    Failure(FailureReason),
}

impl ResultMessage {
    pub fn success(id: CallId, value: Value) -> Self {
        Self { id, result: Outcome::Success(value) }
    }

    pub fn failure(id: CallId, reason: FailureReason) -> Self {
        Self { id, result: Outcome::Failure(reason) }
    }

    pub fn into_result(self) -> std::result::Result<Value, FailureReason> {
        match self.result {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(reason) => Err(reason),
        }
    }

    pub fn encode(self) -> Result<Vec<u8>> {
        Message::Result(self).encode()
    }
}

/// Decodes a payload that must be a call (context side).
pub fn decode_call(bytes: &[u8]) -> Result<CallMessage> {
    match Message::decode(bytes)? {
        Message::Call(call) => Ok(call),
        Message::Result(result) => Err(RpcError::ProtocolViolation(format!(
            "Received result {} where a call was expected",
            result.id
        ))),
    }
}

/// Decodes a payload that must be a result (caller side).
pub fn decode_result(bytes: &[u8]) -> Result<ResultMessage> {
    match Message::decode(bytes)? {
        Message::Result(result) => Ok(result),
        Message::Call(call) => Err(RpcError::ProtocolViolation(format!(
            "Received call {} where a result was expected",
            call.id
        ))),
    }
}

/// Best-effort extraction of the id from a payload that failed to decode, so
/// the context can still answer it with a failure.
pub fn recover_id(bytes: &[u8]) -> Option<CallId> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    value.get("id")?.as_u64()
}
