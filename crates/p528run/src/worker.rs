//! # Isolated Contexts
//!
//! A `Worker` is the caller's handle on one isolated context: a dedicated OS
//! thread running its own single-threaded executor, holding the exposed
//! object, and reachable only through a `ChannelTransport`.
//!
//! Context state is built exactly once, on the context thread, by the init
//! closure given to `WorkerBuilder::spawn`. It is dropped when the thread
//! exits, which happens once the caller closes its end of the channel.

use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::channel::ChannelTransport;
use crate::registry::Expose;
use crate::registry::expose;
use crate::registry::serve;

#[derive(Debug)]
pub enum Error {
    /// The OS refused to start the context thread.
    Spawn(std::io::Error),
    /// The init closure failed; the context never served a call.
    Init(anyhow::Error),
    /// The context thread died before reporting readiness.
    Exited,
    /// The context thread panicked.
    Panicked,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "Failed to spawn context thread: {}", e),
            Self::Init(e) => write!(f, "Context initialization failed: {:#}", e),
            Self::Exited => write!(f, "Context exited before it was ready"),
            Self::Panicked => write!(f, "Context thread panicked"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings for one context.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Thread name, also used in logs.
    pub name: String,
    /// How long a call may wait for its result. `None` waits forever.
    pub call_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "p528-worker".to_string(),
            call_timeout: None,
        }
    }
}

/// Fluent builder for spawning contexts.
#[derive(Debug, Clone, Default)]
pub struct WorkerBuilder {
    config: WorkerConfig,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Starts the context thread, runs `init` on it, and waits until the
    /// returned object is exposed and serving.
    pub async fn spawn<F, T>(self, init: F) -> Result<Worker>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Expose,
    {
        Worker::spawn(self.config, init).await
    }
}

/// Caller-side handle on an isolated context.
pub struct Worker {
    config: WorkerConfig,
    transport: ChannelTransport,
    thread: JoinHandle<()>,
}

impl Worker {
    pub async fn spawn<F, T>(config: WorkerConfig, init: F) -> Result<Self>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Expose,
    {
        let (caller_end, context_end) = ChannelTransport::pair();
        let (ready_tx, ready_rx) = oneshot::channel();

        let name = config.name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_context(name, context_end, init, ready_tx))
            .map_err(Error::Spawn)?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                config,
                transport: caller_end,
                thread,
            }),
            Ok(Err(e)) => Err(Error::Init(e)),
            Err(_) => Err(Error::Exited),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub(crate) fn into_parts(self) -> (WorkerConfig, ChannelTransport, JoinHandle<()>) {
        (self.config, self.transport, self.thread)
    }
}

/// Body of the context thread.
fn run_context<F, T>(
    name: String,
    transport: ChannelTransport,
    init: F,
    ready: oneshot::Sender<anyhow::Result<()>>,
) where
    F: FnOnce() -> anyhow::Result<T>,
    T: Expose,
{
    let span = tracing::info_span!("context", worker = %name);
    let _guard = span.enter();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to build context runtime");
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    let registry = match init() {
        Ok(object) => expose(object),
        Err(e) => {
            tracing::error!(error = %e, "context initialization failed");
            let _ = ready.send(Err(e));
            return;
        }
    };

    tracing::info!(methods = ?registry.method_names().collect::<Vec<_>>(), "context ready");
    if ready.send(Ok(())).is_err() {
        // the caller stopped waiting for us
        return;
    }

    match runtime.block_on(serve(&transport, registry)) {
        Ok(()) => tracing::info!("context stopped"),
        Err(e) => tracing::warn!(error = %e, "context stopped on transport failure"),
    }
}
