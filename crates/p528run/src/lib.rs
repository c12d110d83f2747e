//! # p528run
//!
//! Runs the propagation kernel in an isolated context and calls it from async
//! code without blocking the caller.
//!
//! - `worker` starts the context thread and builds its exposed object.
//! - `registry` is the context side: method table, dispatch, serve loop.
//! - `peer` and `proxy` are the caller side: pending calls, pump, stand-ins.
//! - `kernel` and `wasm` adapt the kernel's `calcP528` entry point.

pub mod channel;
pub mod kernel;
pub mod peer;
pub mod proxy;
pub mod registry;
pub mod transport;
pub mod wasm;
pub mod worker;

pub use channel::ChannelTransport;
pub use kernel::KernelAdapter;
pub use kernel::KernelModule;
pub use peer::Peer;
pub use proxy::Args;
pub use proxy::KernelClient;
pub use proxy::MethodProxy;
pub use proxy::Remote;
pub use proxy::wrap;
pub use registry::Expose;
pub use registry::Registry;
pub use registry::expose;
pub use registry::serve;
pub use transport::Transport;
pub use wasm::WasmKernel;
pub use worker::Worker;
pub use worker::WorkerBuilder;
pub use worker::WorkerConfig;
