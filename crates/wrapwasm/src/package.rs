//! # Wasm Package
//!
//! Module bytes waiting to be compiled. Packages created without an explicit
//! engine share one process-wide default engine.

use std::sync::Arc;
use std::sync::OnceLock;

use wasmtime::Engine;
use wrapcore::error::Result;
use wrapcore::resolver::ModuleLoader;
use wrapcore::wrapper::Package;
use wrapcore::wrapper::Wrapper;

use crate::wrapper::WasmWrapper;

pub fn default_engine() -> Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(Engine::default).clone()
}

#[derive(Clone)]
pub struct WasmPackage {
    engine: Engine,
    bytes: Arc<[u8]>,
    manifest: Option<Vec<u8>>,
}

impl WasmPackage {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_engine(default_engine(), bytes)
    }

    pub fn with_engine(engine: Engine, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            engine,
            bytes: bytes.into(),
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: Vec<u8>) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Loader that turns module bytes fetched by a resolver extension into a package.
    pub fn loader() -> ModuleLoader {
        Arc::new(|bytes: Vec<u8>| -> Result<Arc<dyn Package>> { Ok(Arc::new(WasmPackage::new(bytes))) })
    }
}

impl Package for WasmPackage {
    fn create_wrapper(&self) -> Result<Arc<dyn Wrapper>> {
        Ok(Arc::new(WasmWrapper::new(&self.engine, &self.bytes)?))
    }

    fn manifest(&self) -> Option<&[u8]> {
        self.manifest.as_deref()
    }
}
