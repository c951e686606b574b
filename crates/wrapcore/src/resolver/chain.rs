//! # Resolver Chain
//!
//! Ordered composite of resolvers. Members are queried in configured order and
//! the first one that does not answer `NotFound` decides the step. Order is the
//! only source of precedence.
//!
//! `resolve` drives the full walk: redirects are followed with a visited set
//! and a hop limit, packages are loaded through the client's load cache. A Uri
//! already in the cache is answered from it without asking the resolvers.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::cache::LoadCache;
use crate::error::Error;
use crate::error::Result;
use crate::invoker::Invoker;
use crate::resolver::ResolutionStep;
use crate::resolver::Resolver;
use crate::uri::Uri;
use crate::wrapper::Wrapper;

/// Redirect hops allowed before a resolution gives up with `UriNotFound`.
pub const MAX_HOPS: usize = 256;

/// Outcome of a successful resolution.
pub struct Resolution {
    /// Uri the wrapper was found at.
    pub uri: Uri,
    pub wrapper: Arc<dyn Wrapper>,
    /// Every Uri visited, starting Uri first and `uri` last.
    pub history: Vec<Uri>,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("uri", &self.uri)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolves `uri` all the way to a wrapper.
    pub fn resolve(&self, uri: &Uri, invoker: &dyn Invoker, cache: &LoadCache) -> Result<Resolution> {
        let mut visited = HashSet::new();
        let mut history = vec![uri.clone()];
        let mut current = uri.clone();

        for _ in 0..=MAX_HOPS {
            if let Some(wrapper) = cache.get(&current) {
                debug!(uri = %current, hops = history.len() - 1, "load cache hit");
                return Ok(Resolution {
                    uri: current,
                    wrapper,
                    history,
                });
            }

            match self.try_resolve(&current, invoker)? {
                ResolutionStep::Uri(next) => {
                    debug!(from = %current, to = %next, "redirect");
                    visited.insert(current);
                    if visited.contains(&next) {
                        history.push(next.clone());
                        return Err(Error::CircularRedirect { uri: next, history });
                    }
                    history.push(next.clone());
                    current = next;
                }
                ResolutionStep::Wrapper(wrapper) => {
                    debug!(uri = %current, hops = history.len() - 1, "resolved wrapper");
                    return Ok(Resolution {
                        uri: current,
                        wrapper,
                        history,
                    });
                }
                ResolutionStep::Package(package) => {
                    let wrapper = cache.get_or_load(&current, package.as_ref())?;
                    debug!(uri = %current, hops = history.len() - 1, "resolved package");
                    return Ok(Resolution {
                        uri: current,
                        wrapper,
                        history,
                    });
                }
                ResolutionStep::NotFound => {
                    return Err(Error::UriNotFound {
                        uri: current,
                        history,
                    });
                }
            }
        }

        debug!(uri = %uri, "hop limit exceeded");
        Err(Error::UriNotFound {
            uri: current,
            history,
        })
    }
}

impl Resolver for ResolverChain {
    fn try_resolve(&self, uri: &Uri, invoker: &dyn Invoker) -> Result<ResolutionStep> {
        for resolver in &self.resolvers {
            match resolver.try_resolve(uri, invoker)? {
                ResolutionStep::NotFound => continue,
                step => return Ok(step),
            }
        }
        Ok(ResolutionStep::NotFound)
    }
}
