//! # Resolvers
//!
//! A resolver inspects one Uri and answers with a single step: another Uri to
//! follow, a wrapper, a package, or "not mine". Following redirects and loading
//! packages is the chain's job, not the resolver's.

use std::sync::Arc;

use crate::error::Result;
use crate::invoker::Invoker;
use crate::uri::Uri;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

mod basic;
mod chain;
mod extendable;
mod table;

pub use basic::PackageResolver;
pub use basic::RedirectResolver;
pub use basic::WrapperResolver;
pub use chain::MAX_HOPS;
pub use chain::Resolution;
pub use chain::ResolverChain;
pub use extendable::ExtendableResolver;
pub use extendable::ModuleLoader;
pub use extendable::URI_RESOLVER_INTERFACE;
pub use table::StaticEntry;
pub use table::StaticResolver;

pub enum ResolutionStep {
    Uri(Uri),
    Wrapper(Arc<dyn Wrapper>),
    Package(Arc<dyn Package>),
    NotFound,
}

impl std::fmt::Debug for ResolutionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri(uri) => write!(f, "Uri({})", uri),
            Self::Wrapper(_) => f.write_str("Wrapper"),
            Self::Package(_) => f.write_str("Package"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

pub trait Resolver: Send + Sync {
    /// Resolves one step. Errors abort the whole resolution.
    fn try_resolve(&self, uri: &Uri, invoker: &dyn Invoker) -> Result<ResolutionStep>;
}

/// One configured member of the resolver chain.
#[derive(Clone)]
pub enum ResolverEntry {
    Static(Arc<StaticResolver>),
    Redirect { from: Uri, to: Uri },
    Package { uri: Uri, package: Arc<dyn Package> },
    Wrapper { uri: Uri, wrapper: Arc<dyn Wrapper> },
    Resolver(Arc<dyn Resolver>),
}

impl ResolverEntry {
    pub fn to_resolver(&self) -> Arc<dyn Resolver> {
        match self {
            Self::Static(table) => table.clone(),
            Self::Redirect { from, to } => Arc::new(RedirectResolver::new(from.clone(), to.clone())),
            Self::Package { uri, package } => {
                Arc::new(PackageResolver::new(uri.clone(), package.clone()))
            }
            Self::Wrapper { uri, wrapper } => {
                Arc::new(WrapperResolver::new(uri.clone(), wrapper.clone()))
            }
            Self::Resolver(resolver) => resolver.clone(),
        }
    }
}

impl PartialEq for ResolverEntry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => Arc::ptr_eq(a, b),
            (Self::Redirect { from: fa, to: ta }, Self::Redirect { from: fb, to: tb }) => {
                fa == fb && ta == tb
            }
            (Self::Package { uri: ua, package: pa }, Self::Package { uri: ub, package: pb }) => {
                ua == ub && Arc::ptr_eq(pa, pb)
            }
            (Self::Wrapper { uri: ua, wrapper: wa }, Self::Wrapper { uri: ub, wrapper: wb }) => {
                ua == ub && Arc::ptr_eq(wa, wb)
            }
            (Self::Resolver(a), Self::Resolver(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for ResolverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(table) => write!(f, "Static({} entries)", table.len()),
            Self::Redirect { from, to } => write!(f, "Redirect({} -> {})", from, to),
            Self::Package { uri, .. } => write!(f, "Package({})", uri),
            Self::Wrapper { uri, .. } => write!(f, "Wrapper({})", uri),
            Self::Resolver(_) => f.write_str("Resolver"),
        }
    }
}
