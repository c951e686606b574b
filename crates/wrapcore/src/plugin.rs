//! # Plugins
//!
//! Native modules that run in-process without sandboxing. A plugin is any
//! `PluginModule`; closures qualify, and `MethodTable` dispatches by method
//! name for the common case.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::error::Result;
use crate::invoker::Invoker;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

pub trait PluginModule: Send + Sync {
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>>;
}

impl<F> PluginModule for F
where
    F: Fn(&str, &[u8], Option<&[u8]>, Arc<dyn Invoker>) -> Result<Vec<u8>> + Send + Sync,
{
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>> {
        self(method, args, env, invoker)
    }
}

type Handler = Box<dyn Fn(&[u8], Option<&[u8]>, Arc<dyn Invoker>) -> Result<Vec<u8>> + Send + Sync>;

/// Plugin module that routes each method name to its own handler.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<String, Handler>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler over raw msgpack bytes.
    pub fn method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[u8], Option<&[u8]>, Arc<dyn Invoker>) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Box::new(handler));
        self
    }

    /// Registers a handler whose arguments and result go through msgpack serde.
    pub fn typed<A, R, F>(self, name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A, Arc<dyn Invoker>) -> Result<R> + Send + Sync + 'static,
    {
        self.method(name, move |args, _env, invoker| {
            let args = wrappack::from_slice(args)?;
            let result = handler(args, invoker)?;
            Ok(wrappack::to_vec(&result)?)
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl PluginModule for MethodTable {
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>> {
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| Error::execution(format!("Method not found: {}", method)))?;
        handler(args, env, invoker)
    }
}

#[derive(Clone)]
pub struct PluginWrapper {
    module: Arc<dyn PluginModule>,
}

impl PluginWrapper {
    pub fn new(module: impl PluginModule + 'static) -> Self {
        Self {
            module: Arc::new(module),
        }
    }

    pub fn from_arc(module: Arc<dyn PluginModule>) -> Self {
        Self { module }
    }
}

impl Wrapper for PluginWrapper {
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>> {
        tracing::trace!(method, args_len = args.len(), "plugin invoke");
        self.module.invoke(method, args, env, invoker)
    }
}

/// Every wrapper created from one package shares the same module.
#[derive(Clone)]
pub struct PluginPackage {
    module: Arc<dyn PluginModule>,
    manifest: Option<Vec<u8>>,
}

impl PluginPackage {
    pub fn new(module: impl PluginModule + 'static) -> Self {
        Self::from_arc(Arc::new(module))
    }

    pub fn from_arc(module: Arc<dyn PluginModule>) -> Self {
        Self {
            module,
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: Vec<u8>) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

impl Package for PluginPackage {
    fn create_wrapper(&self) -> Result<Arc<dyn Wrapper>> {
        Ok(Arc::new(PluginWrapper::from_arc(self.module.clone())))
    }

    fn manifest(&self) -> Option<&[u8]> {
        self.manifest.as_deref()
    }
}
