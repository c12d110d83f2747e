//! # WebAssembly Kernel
//!
//! Loads the compiled propagation kernel as a core WebAssembly module and
//! drives it through its C ABI.
//!
//! Only WASI preview1 imports are provided. The kernel therefore has to be a
//! standalone build without JS glue or threads, for example:
//!
//! ```text
//! emcc ... -sSTANDALONE_WASM --no-entry \
//!     -sEXPORTED_FUNCTIONS=_malloc,_free,_calcP528
//! ```
//!
//! built without `-pthread`, so the kernel's parallel loops run serially.
//! The module must export `memory`, `malloc`, `free` and the entry point as
//! `(i32) -> i32` over NUL-terminated strings, under those exact names. An
//! exported `_initialize` is run once after instantiation.

use std::path::Path;
use std::path::PathBuf;

use wasmtime::Engine;
use wasmtime::Instance;
use wasmtime::Linker;
use wasmtime::Memory;
use wasmtime::Module;
use wasmtime::Store;
use wasmtime::TypedFunc;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::p1::WasiP1Ctx;

use crate::kernel::Error;
use crate::kernel::KernelAdapter;
use crate::kernel::KernelModule;
use crate::kernel::Result;
use crate::proxy::Remote;
use crate::proxy::wrap;
use crate::worker;
use crate::worker::WorkerBuilder;

/// A kernel instance living in its own wasmtime store.
///
/// Owns its store and instance; build it in the init closure so it lives and
/// dies with the context that calls it.
pub struct WasmKernel {
    store: Store<WasiP1Ctx>,
    instance: Instance,
    memory: Memory,
    malloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
}

impl WasmKernel {
    /// Compiles and instantiates a kernel from a `.wasm` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::from_file(&engine, path)?;
        Self::instantiate(&engine, &module)
    }

    /// Compiles and instantiates a kernel from binary or text WebAssembly.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes)?;
        Self::instantiate(&engine, &module)
    }

    pub fn instantiate(engine: &Engine, module: &Module) -> Result<Self> {
        let mut linker: Linker<WasiP1Ctx> = Linker::new(engine);
        wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |ctx: &mut WasiP1Ctx| ctx)?;

        let wasi = WasiCtxBuilder::new().inherit_stdio().build_p1();
        let mut store = Store::new(engine, wasi);
        let instance = linker.instantiate(&mut store, module)?;

        if let Ok(init) = instance.get_typed_func::<(), ()>(&mut store, "_initialize") {
            init.call(&mut store, ())?;
        }

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| Error::MissingExport("memory".into()))?;
        let malloc = instance
            .get_typed_func::<i32, i32>(&mut store, "malloc")
            .map_err(|_| Error::MissingExport("malloc".into()))?;
        let free = instance
            .get_typed_func::<i32, ()>(&mut store, "free")
            .map_err(|_| Error::MissingExport("free".into()))?;

        Ok(Self {
            store,
            instance,
            memory,
            malloc,
            free,
        })
    }

    /// Spawns a context that loads the kernel at `path` and exposes it as
    /// `calc`, returning the caller's proxy.
    pub async fn spawn(path: impl Into<PathBuf>, builder: WorkerBuilder) -> worker::Result<Remote> {
        let path = path.into();
        let worker = builder
            .spawn(move || {
                let kernel = WasmKernel::from_file(&path)?;
                Ok(KernelAdapter::new(kernel))
            })
            .await?;
        Ok(wrap(worker))
    }

    /// Copies `s` into freshly allocated guest memory, NUL-terminated.
    fn write_c_string(&mut self, s: &str) -> Result<i32> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);

        let len = i32::try_from(bytes.len())
            .map_err(|_| Error::Memory(format!("argument of {} bytes is too large", bytes.len())))?;
        let ptr = self.malloc.call(&mut self.store, len)?;
        if ptr == 0 {
            return Err(Error::Memory("malloc returned null".into()));
        }

        self.memory
            .write(&mut self.store, ptr as u32 as usize, &bytes)
            .map_err(|e| Error::Memory(e.to_string()))?;
        Ok(ptr)
    }

    /// Reads the NUL-terminated string at `ptr`.
    fn read_c_string(&self, ptr: i32) -> Result<String> {
        let data = self.memory.data(&self.store);
        let start = ptr as u32 as usize;

        let tail = data
            .get(start..)
            .ok_or_else(|| Error::Memory(format!("result pointer {:#x} is out of bounds", start)))?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Memory("result string is not terminated".into()))?;

        Ok(String::from_utf8(tail[..len].to_vec())?)
    }
}

impl KernelModule for WasmKernel {
    fn ccall(&mut self, function: &str, arg: &str) -> Result<String> {
        let func = self
            .instance
            .get_typed_func::<i32, i32>(&mut self.store, function)
            .map_err(|_| Error::MissingExport(function.to_string()))?;

        let arg_ptr = self.write_c_string(arg)?;
        let output = match func.call(&mut self.store, arg_ptr) {
            Ok(ret) => self.read_c_string(ret),
            Err(e) => Err(Error::Wasmtime(e)),
        };

        // the result string belongs to the kernel, only the argument is ours
        if let Err(e) = self.free.call(&mut self.store, arg_ptr) {
            tracing::warn!(error = %e, "failed to release kernel argument buffer");
        }

        output
    }
}
