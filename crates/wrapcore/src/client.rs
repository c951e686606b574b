//! # Client
//!
//! Immutable entry point for resolution and invocation. A `Client` is a cheap
//! handle around shared state (config, compiled resolver chain, load cache)
//! and can be cloned into threads freely.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::LoadCache;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::error::Result;
use crate::invoker::ClientInvoker;
use crate::invoker::Invoker;
use crate::resolver::Resolution;
use crate::resolver::ResolverChain;
use crate::uri::Uri;

struct Inner {
    config: ClientConfig,
    chain: ResolverChain,
    cache: LoadCache,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let chain = config.resolver_chain();
        debug!(resolvers = chain.len(), "client created");
        Self {
            inner: Arc::new(Inner {
                config,
                chain,
                cache: LoadCache::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &LoadCache {
        &self.inner.cache
    }

    /// Invoker bound to this client with an empty call stack.
    pub fn invoker(&self) -> Arc<dyn Invoker> {
        Arc::new(ClientInvoker::new(self.clone(), Vec::new()))
    }

    pub fn resolve(&self, uri: &Uri) -> Result<Resolution> {
        let invoker = ClientInvoker::new(self.clone(), vec![uri.clone()]);
        self.inner.chain.resolve(uri, &invoker, &self.inner.cache)
    }

    pub fn implementations(&self, interface: &Uri) -> Vec<Uri> {
        self.inner.config.implementations(interface).to_vec()
    }

    pub fn env(&self, uri: &Uri) -> Option<&[u8]> {
        self.inner.config.env(uri)
    }

    pub fn invoke(
        &self,
        uri: &Uri,
        method: &str,
        args: Option<&[u8]>,
        env: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.invoke_in(&[], uri, method, args, env)
    }

    /// Invokes with msgpack-encoded `args` and decodes the result.
    pub fn invoke_typed<A, R>(&self, uri: &Uri, method: &str, args: &A, env: Option<&[u8]>) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = wrappack::to_vec(args)?;
        let result = self.invoke(uri, method, Some(&args), env)?;
        Ok(wrappack::from_slice(&result)?)
    }

    /// Invokes `uri` on behalf of the frames in `stack`.
    pub(crate) fn invoke_in(
        &self,
        stack: &[Uri],
        uri: &Uri,
        method: &str,
        args: Option<&[u8]>,
        env: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let reentrant = |uri: &Uri| Error::ReentrantInvoke {
            uri: uri.clone(),
            stack: stack.to_vec(),
        };

        if stack.contains(uri) {
            return Err(reentrant(uri));
        }

        let mut frames = stack.to_vec();
        frames.push(uri.clone());
        let resolving = ClientInvoker::new(self.clone(), frames.clone());
        let resolution = self.inner.chain.resolve(uri, &resolving, &self.inner.cache)?;

        for hop in resolution.history.iter().skip(1) {
            if stack.contains(hop) {
                return Err(reentrant(hop));
            }
            frames.push(hop.clone());
        }

        let env = env.or_else(|| self.env_along(&resolution.history));
        debug!(%uri, resolved = %resolution.uri, method, depth = stack.len(), "invoke");

        let invoker = Arc::new(ClientInvoker::new(self.clone(), frames));
        resolution
            .wrapper
            .invoke(method, args.unwrap_or_default(), env, invoker)
            .map_err(|e| attribute(e, &resolution.uri, method))
    }

    /// First env registered for any Uri on the resolution path.
    fn env_along(&self, history: &[Uri]) -> Option<&[u8]> {
        history.iter().find_map(|uri| self.inner.config.env(uri))
    }
}

/// Tags a wrapper failure with the Uri and method that raised it.
///
/// Reentrant-invoke errors keep their own identity so a cycle deep in a call
/// tree still reads as a cycle at the top.
fn attribute(error: Error, uri: &Uri, method: &str) -> Error {
    let message = match error {
        Error::ReentrantInvoke { .. } => return error,
        Error::ModuleExecution {
            uri: None, message, ..
        } => message,
        other => other.to_string(),
    };
    Error::ModuleExecution {
        uri: Some(uri.clone()),
        method: Some(method.to_string()),
        message,
    }
}
