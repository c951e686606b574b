//! # Client Config
//!
//! Frozen snapshot produced by `BuilderConfig::build`. Nothing in here can be
//! mutated after construction; a client compiles its resolver chain from it
//! once.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::resolver::ResolverChain;
use crate::resolver::ResolverEntry;
use crate::resolver::Resolver;
use crate::resolver::StaticEntry;
use crate::resolver::StaticResolver;
use crate::uri::Uri;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub from: Uri,
    pub to: Uri,
}

#[derive(Clone, Default)]
pub struct ClientConfig {
    pub(crate) envs: BTreeMap<Uri, Vec<u8>>,
    pub(crate) interfaces: BTreeMap<Uri, Vec<Uri>>,
    pub(crate) wrappers: BTreeMap<Uri, Arc<dyn Wrapper>>,
    pub(crate) packages: BTreeMap<Uri, Arc<dyn Package>>,
    pub(crate) redirects: Vec<Redirect>,
    pub(crate) resolvers: Vec<ResolverEntry>,
}

impl ClientConfig {
    pub fn envs(&self) -> &BTreeMap<Uri, Vec<u8>> {
        &self.envs
    }

    pub fn env(&self, uri: &Uri) -> Option<&[u8]> {
        self.envs.get(uri).map(Vec::as_slice)
    }

    pub fn interfaces(&self) -> &BTreeMap<Uri, Vec<Uri>> {
        &self.interfaces
    }

    pub fn implementations(&self, interface: &Uri) -> &[Uri] {
        self.interfaces
            .get(interface)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn wrappers(&self) -> &BTreeMap<Uri, Arc<dyn Wrapper>> {
        &self.wrappers
    }

    pub fn packages(&self) -> &BTreeMap<Uri, Arc<dyn Package>> {
        &self.packages
    }

    pub fn redirects(&self) -> &[Redirect] {
        &self.redirects
    }

    pub fn resolvers(&self) -> &[ResolverEntry] {
        &self.resolvers
    }

    /// Compiles the chain: direct registrations first, then resolver entries in order.
    pub fn resolver_chain(&self) -> ResolverChain {
        let mut members: Vec<Arc<dyn Resolver>> = Vec::with_capacity(self.resolvers.len() + 1);

        let table: StaticResolver = self
            .wrappers
            .iter()
            .map(|(uri, wrapper)| (uri.clone(), StaticEntry::Wrapper(wrapper.clone())))
            .chain(
                self.packages
                    .iter()
                    .map(|(uri, package)| (uri.clone(), StaticEntry::Package(package.clone()))),
            )
            .chain(
                self.redirects
                    .iter()
                    .map(|r| (r.from.clone(), StaticEntry::Redirect(r.to.clone()))),
            )
            .collect();
        if !table.is_empty() {
            members.push(Arc::new(table));
        }

        members.extend(self.resolvers.iter().map(ResolverEntry::to_resolver));
        ResolverChain::new(members)
    }
}

fn same_entries<T: ?Sized>(a: &BTreeMap<Uri, Arc<T>>, b: &BTreeMap<Uri, Arc<T>>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((ua, va), (ub, vb))| ua == ub && Arc::ptr_eq(va, vb))
}

/// Registered wrappers, packages and resolvers compare by identity.
impl PartialEq for ClientConfig {
    fn eq(&self, other: &Self) -> bool {
        self.envs == other.envs
            && self.interfaces == other.interfaces
            && same_entries(&self.wrappers, &other.wrappers)
            && same_entries(&self.packages, &other.packages)
            && self.redirects == other.redirects
            && self.resolvers == other.resolvers
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("envs", &self.envs.keys().collect::<Vec<_>>())
            .field("interfaces", &self.interfaces)
            .field("wrappers", &self.wrappers.keys().collect::<Vec<_>>())
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .field("redirects", &self.redirects)
            .field("resolvers", &self.resolvers)
            .finish()
    }
}
