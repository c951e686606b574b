//! # Extendable Resolver
//!
//! Delegates resolution to resolver extensions: modules registered as
//! implementations of the uri-resolver interface. Each extension is asked
//! `tryResolveUri { authority, path }` in registration order and may answer
//! with a Uri to follow or a manifest, in which case the module bytes are
//! fetched with `getFile` and turned into a package by the `ModuleLoader`.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_bytes::ByteBuf;
use tracing::debug;
use tracing::trace;

use crate::error::Error;
use crate::error::Result;
use crate::invoker::Invoker;
use crate::resolver::ResolutionStep;
use crate::resolver::Resolver;
use crate::uri::Uri;
use crate::wrapper::Package;

pub const URI_RESOLVER_INTERFACE: &str = "wrap://ens/uri-resolver.core.polywrap.eth";

/// Turns module bytes returned by an extension into a package.
pub type ModuleLoader = Arc<dyn Fn(Vec<u8>) -> Result<Arc<dyn Package>> + Send + Sync>;

#[derive(Serialize)]
struct TryResolveArgs<'a> {
    authority: &'a str,
    path: &'a str,
}

#[derive(Deserialize)]
struct MaybeUriOrManifest {
    uri: Option<String>,
    manifest: Option<ByteBuf>,
}

#[derive(Serialize)]
struct GetFileArgs {
    path: String,
}

pub struct ExtendableResolver {
    interface: Uri,
    loader: Option<ModuleLoader>,
}

impl ExtendableResolver {
    pub fn new() -> Result<Self> {
        Ok(Self::with_interface(Uri::parse(URI_RESOLVER_INTERFACE)?))
    }

    pub fn with_interface(interface: Uri) -> Self {
        Self {
            interface,
            loader: None,
        }
    }

    pub fn with_loader(mut self, loader: ModuleLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn interface(&self) -> &Uri {
        &self.interface
    }

    fn load_module(
        &self,
        extension: &Uri,
        uri: &Uri,
        invoker: &dyn Invoker,
    ) -> Result<Arc<dyn Package>> {
        let load_error = |message: String| Error::Load {
            uri: Some(uri.clone()),
            message,
        };

        let Some(loader) = &self.loader else {
            return Err(load_error(format!(
                "{} returned a manifest but no module loader is installed",
                extension
            )));
        };

        let args = wrappack::to_vec(&GetFileArgs {
            path: format!("{}/wrap.wasm", uri.path()),
        })?;
        let reply = invoker
            .invoke(extension, "getFile", Some(&args), None)
            .map_err(|e| load_error(format!("{}.getFile failed: {}", extension, e)))?;
        let module: Option<ByteBuf> = wrappack::from_slice(&reply)?;
        let Some(module) = module else {
            return Err(load_error(format!("{} has no module for it", extension)));
        };

        loader(module.into_vec()).map_err(|e| match e {
            Error::Load { message, .. } => load_error(message),
            other => other,
        })
    }
}

impl Resolver for ExtendableResolver {
    fn try_resolve(&self, uri: &Uri, invoker: &dyn Invoker) -> Result<ResolutionStep> {
        let args = wrappack::to_vec(&TryResolveArgs {
            authority: uri.authority(),
            path: uri.path(),
        })?;

        for extension in invoker.implementations(&self.interface) {
            if invoker.is_active(&extension) {
                trace!(%extension, "skipping active extension");
                continue;
            }

            let reply = invoker
                .invoke(&extension, "tryResolveUri", Some(&args), None)
                .map_err(|e| Error::Load {
                    uri: Some(uri.clone()),
                    message: format!("{}.tryResolveUri failed: {}", extension, e),
                })?;

            let Some(reply) = wrappack::from_slice::<Option<MaybeUriOrManifest>>(&reply)? else {
                continue;
            };

            if let Some(next) = reply.uri {
                let next = Uri::parse(&next)?;
                if next != *uri {
                    debug!(%extension, from = %uri, to = %next, "extension redirect");
                    return Ok(ResolutionStep::Uri(next));
                }
            }

            if reply.manifest.is_some() {
                debug!(%extension, %uri, "extension resolved package");
                let package = self.load_module(&extension, uri, invoker)?;
                return Ok(ResolutionStep::Package(package));
            }
        }

        Ok(ResolutionStep::NotFound)
    }
}
