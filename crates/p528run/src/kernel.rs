//! # Kernel Adapter
//!
//! The one object worth exposing: a `calc` method that hands a JSON string to
//! the propagation kernel and hands back whatever string the kernel returns.
//! The adapter does not look inside either string.

use crate::registry::Expose;
use crate::registry::Registry;

/// Exported name of the kernel's string-in/string-out entry point.
pub const ENTRY_POINT: &str = "calcP528";

/// Method name under which the adapter is exposed.
pub const CALC_METHOD: &str = "calc";

#[derive(Debug)]
pub enum Error {
    /// The module does not export a required symbol.
    MissingExport(String),
    /// The kernel trapped, or the module failed to load or link.
    Wasmtime(wasmtime::Error),
    /// A string could not be moved in or out of kernel memory.
    Memory(String),
    /// The kernel returned bytes that are not UTF-8.
    Utf8(std::string::FromUtf8Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingExport(name) => write!(f, "Kernel does not export '{}'", name),
            Self::Wasmtime(e) => write!(f, "Wasmtime error: {}", e),
            Self::Memory(msg) => write!(f, "Kernel memory error: {}", msg),
            Self::Utf8(e) => write!(f, "Kernel returned invalid UTF-8: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<wasmtime::Error> for Error {
    fn from(e: wasmtime::Error) -> Self {
        Self::Wasmtime(e)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::Utf8(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A loaded kernel reachable through C-style string calls.
///
/// `ccall(function, arg)` passes one string to the named export and returns
/// its string result, the same contract as emscripten's
/// `ccall(name, "string", ["string"], [arg])`.
pub trait KernelModule {
    fn ccall(&mut self, function: &str, arg: &str) -> Result<String>;
}

impl<F> KernelModule for F
where
    F: FnMut(&str, &str) -> Result<String>,
{
    fn ccall(&mut self, function: &str, arg: &str) -> Result<String> {
        self(function, arg)
    }
}

/// Wraps a kernel module as the `calc` object.
pub struct KernelAdapter<M> {
    module: M,
}

impl<M: KernelModule> KernelAdapter<M> {
    pub fn new(module: M) -> Self {
        Self { module }
    }

    /// Runs the kernel on `input_json`, unchanged in both directions.
    pub fn calc(&mut self, input_json: &str) -> Result<String> {
        self.module.ccall(ENTRY_POINT, input_json)
    }

    pub fn into_inner(self) -> M {
        self.module
    }
}

impl<M: KernelModule + 'static> Expose for KernelAdapter<M> {
    fn expose(self) -> Registry {
        let mut adapter = self;
        Registry::new().method(CALC_METHOD, move |(input,): (String,)| adapter.calc(&input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use p528rpc::CallMessage;
    use p528rpc::FailureReason;
    use serde_json::json;

    #[test]
    fn test_calc_passes_strings_through() {
        let mut seen = Vec::new();
        let mut adapter = KernelAdapter::new(|function: &str, arg: &str| -> Result<String> {
            seen.push(function.to_string());
            Ok(format!("<{}>", arg))
        });

        // not JSON, and the adapter does not care
        assert_eq!(adapter.calc("abc").unwrap(), "<abc>");
        drop(adapter);
        assert_eq!(seen, vec![ENTRY_POINT.to_string()]);
    }

    #[test]
    fn test_exposed_adapter_answers_calc() {
        let adapter = KernelAdapter::new(|_: &str, arg: &str| -> Result<String> { Ok(arg.len().to_string()) });
        let mut registry = adapter.expose();

        assert!(registry.contains(CALC_METHOD));

        let call = CallMessage::new(1, vec!["calc".into()], vec![json!("{\"a\":1}")]);
        let result = registry.dispatch(call).into_result();
        assert_eq!(result, Ok(json!("7")));
    }

    #[test]
    fn test_kernel_error_becomes_invocation_error() {
        let adapter = KernelAdapter::new(|function: &str, _: &str| -> Result<String> {
            Err(Error::MissingExport(function.to_string()))
        });
        let mut registry = adapter.expose();

        let call = CallMessage::new(5, vec!["calc".into()], vec![json!("{}")]);
        let result = registry.dispatch(call).into_result();

        match result {
            Err(FailureReason::InvocationError(msg)) => assert!(msg.contains("calcP528")),
            other => panic!("expected invocation error, got {:?}", other),
        }
    }

    #[test]
    fn test_calc_rejects_non_string_argument() {
        let adapter = KernelAdapter::new(|_: &str, arg: &str| -> Result<String> { Ok(arg.to_string()) });
        let mut registry = adapter.expose();

        let call = CallMessage::new(2, vec!["calc".into()], vec![json!(42)]);
        let result = registry.dispatch(call).into_result();
        assert!(matches!(result, Err(FailureReason::BadArguments(_))));
    }
}
