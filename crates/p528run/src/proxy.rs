//! # Proxy Factory
//!
//! `wrap` turns a `Worker` into a `Remote`: a cheap, cloneable stand-in whose
//! methods are futures resolved by the context.
//!
//! ```ignore
//! let remote = wrap(worker);
//! let output: String = remote.method("calc").call((input,)).await?;
//! ```
//!
//! Arguments are passed as a tuple of `Serialize` values, one element per
//! argument, so `()` is a call with no arguments and `(None::<i64>,)` is a call
//! with one `null` argument. A `Vec` sends each element as its own argument.
//! Types that are not plain JSON cross the boundary by implementing
//! `Serialize` and `Deserialize`.
//!
//! Submitted calls cannot be cancelled. Dropping the future only discards the
//! result; the context still does the work.

use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use p528rpc::P528Request;
use p528rpc::P528Response;

use crate::kernel::CALC_METHOD;
use crate::peer::Peer;
use crate::peer::Result;
use crate::worker;
use crate::worker::Worker;

/// Builds the caller-side stand-in for the object exposed by `handle`.
///
/// Must be called inside a tokio runtime.
pub fn wrap(handle: Worker) -> Remote {
    let (config, transport, thread) = handle.into_parts();
    let peer = Peer::new(config.name, Box::new(transport)).with_call_timeout(config.call_timeout);

    Remote {
        inner: Arc::new(RemoteInner {
            peer,
            thread: Mutex::new(Some(thread)),
        }),
    }
}

struct RemoteInner {
    peer: Peer,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Stand-in for a remote object. Clones share one context.
#[derive(Clone)]
pub struct Remote {
    inner: Arc<RemoteInner>,
}

impl Remote {
    /// Returns the proxy for the method `name`. Nothing is checked until the
    /// first call.
    pub fn method(&self, name: impl Into<String>) -> MethodProxy {
        MethodProxy {
            remote: self.clone(),
            path: vec![name.into()],
        }
    }

    /// Typed proxy for the kernel's `calc` method.
    pub fn kernel(&self) -> KernelClient {
        KernelClient {
            calc: self.method(CALC_METHOD),
        }
    }

    /// Invokes `path` with already encoded arguments.
    pub async fn call_raw(&self, path: Vec<String>, args: Vec<Value>) -> Result<Value> {
        self.inner.peer.call(path, args).await
    }

    pub fn name(&self) -> &str {
        self.inner.peer.peer_name()
    }

    /// Number of calls still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.inner.peer.pending_count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.peer.is_closed()
    }

    /// Tears the context down from the caller side.
    ///
    /// Every pending call rejects with `ChannelClosed` immediately. The
    /// context thread finishes the call it is running, if any, then exits.
    pub fn terminate(&self) {
        tracing::info!(peer = %self.name(), "terminating context");
        self.inner.peer.close();
    }

    /// Waits for the context thread to exit. Returns immediately if it was
    /// already joined.
    pub async fn join(&self) -> worker::Result<()> {
        let thread = self.inner.thread.lock().ok().and_then(|mut thread| thread.take());
        let Some(thread) = thread else {
            return Ok(());
        };

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => Ok(()),
            _ => Err(worker::Error::Panicked),
        }
    }
}

/// One method of a `Remote`.
#[derive(Clone)]
pub struct MethodProxy {
    remote: Remote,
    path: Vec<String>,
}

impl MethodProxy {
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Calls the method and decodes its return value as `R`.
    pub async fn call<A, R>(&self, args: A) -> Result<R>
    where
        A: Args,
        R: DeserializeOwned,
    {
        let args = args.into_args()?;
        let value = self.remote.call_raw(self.path.clone(), args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// An argument list for `MethodProxy::call`.
pub trait Args {
    fn into_args(self) -> serde_json::Result<Vec<Value>>;
}

impl Args for () {
    fn into_args(self) -> serde_json::Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

impl<T: Serialize> Args for Vec<T> {
    fn into_args(self) -> serde_json::Result<Vec<Value>> {
        self.into_iter().map(serde_json::to_value).collect()
    }
}

macro_rules! impl_args_for_tuple {
    ($($arg:ident),+) => {
        impl<$($arg: Serialize),+> Args for ($($arg,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> serde_json::Result<Vec<Value>> {
                let ($($arg,)+) = self;
                Ok(vec![$(serde_json::to_value($arg)?),+])
            }
        }
    };
}

impl_args_for_tuple!(A);
impl_args_for_tuple!(A, B);
impl_args_for_tuple!(A, B, C);
impl_args_for_tuple!(A, B, C, D);
impl_args_for_tuple!(A, B, C, D, E);
impl_args_for_tuple!(A, B, C, D, E, F);
impl_args_for_tuple!(A, B, C, D, E, F, G);
impl_args_for_tuple!(A, B, C, D, E, F, G, H);

/// Typed client for the exposed kernel.
#[derive(Clone)]
pub struct KernelClient {
    calc: MethodProxy,
}

impl KernelClient {
    /// Runs the kernel on a JSON string and returns its JSON string.
    pub async fn calc(&self, input_json: &str) -> Result<String> {
        self.calc.call((input_json,)).await
    }

    /// Same as `calc`, with the request and response schemas applied.
    pub async fn calc_request(&self, request: &P528Request) -> Result<P528Response> {
        let input = serde_json::to_string(request)?;
        let output = self.calc(&input).await?;
        Ok(serde_json::from_str(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tuple_args() {
        assert_eq!(("a", 1).into_args().unwrap(), vec![json!("a"), json!(1)]);
        assert_eq!(().into_args().unwrap(), Vec::<Value>::new());
        assert_eq!((vec![1, 2],).into_args().unwrap(), vec![json!([1, 2])]);
        assert_eq!(vec!["x", "y"].into_args().unwrap(), vec![json!("x"), json!("y")]);
    }

    #[test]
    fn test_null_is_still_an_argument() {
        assert_eq!((None::<i64>,).into_args().unwrap(), vec![Value::Null]);
        assert_eq!((Value::Null,).into_args().unwrap(), vec![Value::Null]);
        assert_eq!(((), 1).into_args().unwrap(), vec![Value::Null, json!(1)]);
    }
}
