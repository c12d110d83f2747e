//! # Exposure Registry
//!
//! The context-side half of the proxy. An exposed object is flattened into an
//! explicit table of method names to typed handlers when the context starts;
//! incoming calls are resolved against that table and nothing else.
//!
//! ## Invariants
//!
//! - Every decodable call gets exactly one result, success or failure.
//! - Handler errors and handler panics become `InvocationError` results; they
//!   never unwind out of `dispatch`.

use std::collections::HashMap;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use p528rpc::CallMessage;
use p528rpc::FailureReason;
use p528rpc::ResultMessage;
use p528rpc::decode_call;
use p528rpc::recover_id;

use crate::transport;
use crate::transport::Transport;

type Handler = Box<dyn FnMut(Vec<Value>) -> Result<Value, FailureReason>>;

/// Method table of the object exposed in a context.
pub struct Registry {
    methods: HashMap<String, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Registers `handler` under `name`, replacing any earlier handler.
    ///
    /// The JSON argument array is decoded into `A`, so a method taking one
    /// string is registered with `|(s,): (String,)| ...`. A method taking no
    /// arguments may use `()`.
    pub fn method<A, R, E, F>(mut self, name: impl Into<String>, mut handler: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        E: Display,
        F: FnMut(A) -> Result<R, E> + 'static,
    {
        let name = name.into();

        let boxed: Handler = Box::new(move |args: Vec<Value>| {
            let args = decode_args::<A>(args)?;
            let ret = handler(args).map_err(|e| FailureReason::InvocationError(e.to_string()))?;
            serde_json::to_value(ret).map_err(|e| {
                FailureReason::InvocationError(format!("return value is not serializable: {}", e))
            })
        });

        if self.methods.insert(name.clone(), boxed).is_some() {
            tracing::warn!(method = %name, "replacing previously registered handler");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Names of all registered methods, in no particular order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Resolves and invokes one call, producing its result message.
    pub fn dispatch(&mut self, call: CallMessage) -> ResultMessage {
        let id = call.id;

        let handler = match call.method() {
            Some(name) => self.methods.get_mut(name),
            None => None,
        };
        let Some(handler) = handler else {
            tracing::warn!(id, path = %call.target(), "method not found");
            return ResultMessage::failure(id, FailureReason::MethodNotFound(call.target()));
        };

        tracing::debug!(id, path = %call.target(), "invoking");
        let args = call.args;

        match std::panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(Ok(value)) => ResultMessage::success(id, value),
            Ok(Err(reason)) => {
                tracing::warn!(id, reason = %reason, "call failed");
                ResultMessage::failure(id, reason)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(id, panic = %message, "handler panicked");
                ResultMessage::failure(id, FailureReason::InvocationError(message))
            }
        }
    }

    /// Handles one raw payload and returns the encoded reply, if any.
    ///
    /// Payloads that do not decode are answered with `ProtocolViolation` when
    /// their id can be recovered, and dropped otherwise.
    pub fn handle(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        let reply = match decode_call(payload) {
            Ok(call) => self.dispatch(call),
            Err(e) => {
                let Some(id) = recover_id(payload) else {
                    tracing::warn!(error = %e, "dropping undecodable payload");
                    return None;
                };
                tracing::warn!(id, error = %e, "malformed call");
                ResultMessage::failure(id, FailureReason::ProtocolViolation(e.to_string()))
            }
        };

        let id = reply.id;
        match reply.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!(id, error = %e, "failed to encode result");
                ResultMessage::failure(id, FailureReason::InvocationError(e.to_string()))
                    .encode()
                    .ok()
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_args<A: DeserializeOwned>(args: Vec<Value>) -> Result<A, FailureReason> {
    let empty = args.is_empty();
    match serde_json::from_value(Value::Array(args)) {
        Ok(decoded) => Ok(decoded),
        // `()` only decodes from null
        Err(_) if empty => serde_json::from_value(Value::Null)
            .map_err(|e| FailureReason::BadArguments(e.to_string())),
        Err(e) => Err(FailureReason::BadArguments(e.to_string())),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// An object that can be served from a context.
pub trait Expose {
    /// Flattens the object into its method table.
    fn expose(self) -> Registry;
}

impl Expose for Registry {
    fn expose(self) -> Registry {
        self
    }
}

/// Registers `object` as the exposed target of a context.
pub fn expose(object: impl Expose) -> Registry {
    object.expose()
}

/// Answers calls arriving on `transport` until the caller closes it.
///
/// Calls are handled one at a time; a slow method blocks this loop, and only
/// this loop.
pub async fn serve(transport: &dyn Transport, mut registry: Registry) -> transport::Result<()> {
    while let Some(payload) = transport.recv().await? {
        if let Some(reply) = registry.handle(&payload) {
            transport.send(&reply).await?;
        }
    }
    Ok(())
}
