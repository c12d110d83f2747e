//! # p528rpc
//!
//! The JSON message protocol spoken between a caller and an isolated context.
//!
//! ## Architecture
//!
//! A caller posts `CallMessage`s naming a method on the object exposed inside
//! the context; the context answers each with a `ResultMessage` carrying the
//! same id. Both travel inside the `Message` envelope so either side can tell
//! at a glance whether it is looking at the wrong direction of traffic.

pub mod error;
pub mod message;
pub mod schema;

pub use error::FailureReason;
pub use error::Result;
pub use error::RpcError;
pub use message::CallId;
pub use message::CallMessage;
pub use message::Message;
pub use message::Outcome;
pub use message::ResultMessage;
pub use message::decode_call;
pub use message::decode_result;
pub use message::recover_id;
pub use schema::P528Request;
pub use schema::P528Response;

#[cfg(test)]
mod tests;
