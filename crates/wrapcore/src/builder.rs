//! # Builder Config
//!
//! Mutable accumulator for client configuration. Every mutation targets one
//! key and is infallible:
//!
//! - A Uri has at most one direct registration (wrapper, package or
//!   redirect). Registering any of them replaces what the Uri was bound to.
//! - Interface implementations are sets that keep insertion order.
//! - Resolver entries are append-only; the chain can only be reset as a whole.
//!
//! `build()` snapshots the state into a `ClientConfig` without touching the
//! builder, so a builder can be mutated and rebuilt freely.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::config::Redirect;
use crate::error::Error;
use crate::error::Result;
use crate::resolver::Resolver;
use crate::resolver::ResolverEntry;
use crate::resolver::StaticResolver;
use crate::uri::Uri;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

#[derive(Clone, Default)]
pub struct BuilderConfig {
    envs: BTreeMap<Uri, Vec<u8>>,
    interfaces: BTreeMap<Uri, Vec<Uri>>,
    wrappers: BTreeMap<Uri, Arc<dyn Wrapper>>,
    packages: BTreeMap<Uri, Arc<dyn Package>>,
    redirects: Vec<Redirect>,
    resolvers: Vec<ResolverEntry>,
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Environments ---

    /// Merges `env` into the existing env for `uri`, key by key.
    ///
    /// Falls back to replacing when either side is not a msgpack map.
    pub fn add_env(&mut self, uri: Uri, env: Vec<u8>) -> &mut Self {
        let merged = match self.envs.get(&uri) {
            Some(existing) => wrappack::merge_maps(existing, &env).unwrap_or(env),
            None => env,
        };
        self.envs.insert(uri, merged);
        self
    }

    pub fn set_env(&mut self, uri: Uri, env: Vec<u8>) -> &mut Self {
        self.envs.insert(uri, env);
        self
    }

    pub fn remove_env(&mut self, uri: &Uri) -> &mut Self {
        self.envs.remove(uri);
        self
    }

    // --- Interfaces ---

    pub fn add_interface_implementation(&mut self, interface: Uri, implementation: Uri) -> &mut Self {
        let implementations = self.interfaces.entry(interface).or_default();
        if !implementations.contains(&implementation) {
            implementations.push(implementation);
        }
        self
    }

    pub fn add_interface_implementations(
        &mut self,
        interface: Uri,
        implementations: impl IntoIterator<Item = Uri>,
    ) -> &mut Self {
        for implementation in implementations {
            self.add_interface_implementation(interface.clone(), implementation);
        }
        self
    }

    pub fn remove_interface_implementation(&mut self, interface: &Uri, implementation: &Uri) -> &mut Self {
        if let Some(implementations) = self.interfaces.get_mut(interface) {
            implementations.retain(|uri| uri != implementation);
            if implementations.is_empty() {
                self.interfaces.remove(interface);
            }
        }
        self
    }

    // --- Direct registrations ---

    fn unbind(&mut self, uri: &Uri) {
        self.wrappers.remove(uri);
        self.packages.remove(uri);
        self.redirects.retain(|r| r.from != *uri);
    }

    pub fn add_wrapper(&mut self, uri: Uri, wrapper: Arc<dyn Wrapper>) -> &mut Self {
        self.unbind(&uri);
        self.wrappers.insert(uri, wrapper);
        self
    }

    pub fn add_wrappers(&mut self, wrappers: impl IntoIterator<Item = (Uri, Arc<dyn Wrapper>)>) -> &mut Self {
        for (uri, wrapper) in wrappers {
            self.add_wrapper(uri, wrapper);
        }
        self
    }

    pub fn remove_wrapper(&mut self, uri: &Uri) -> &mut Self {
        self.wrappers.remove(uri);
        self
    }

    pub fn add_package(&mut self, uri: Uri, package: Arc<dyn Package>) -> &mut Self {
        self.unbind(&uri);
        self.packages.insert(uri, package);
        self
    }

    pub fn add_packages(&mut self, packages: impl IntoIterator<Item = (Uri, Arc<dyn Package>)>) -> &mut Self {
        for (uri, package) in packages {
            self.add_package(uri, package);
        }
        self
    }

    pub fn remove_package(&mut self, uri: &Uri) -> &mut Self {
        self.packages.remove(uri);
        self
    }

    /// Redirects keep their original position when replaced.
    pub fn add_redirect(&mut self, from: Uri, to: Uri) -> &mut Self {
        self.wrappers.remove(&from);
        self.packages.remove(&from);
        match self.redirects.iter_mut().find(|r| r.from == from) {
            Some(existing) => existing.to = to,
            None => self.redirects.push(Redirect { from, to }),
        }
        self
    }

    pub fn add_redirects(&mut self, redirects: impl IntoIterator<Item = (Uri, Uri)>) -> &mut Self {
        for (from, to) in redirects {
            self.add_redirect(from, to);
        }
        self
    }

    pub fn remove_redirect(&mut self, from: &Uri) -> &mut Self {
        self.redirects.retain(|r| r.from != *from);
        self
    }

    // --- Resolver chain ---

    pub fn add_resolver(&mut self, entry: ResolverEntry) -> &mut Self {
        self.resolvers.push(entry);
        self
    }

    pub fn add_wrapper_resolver(&mut self, uri: Uri, wrapper: Arc<dyn Wrapper>) -> &mut Self {
        self.add_resolver(ResolverEntry::Wrapper { uri, wrapper })
    }

    pub fn add_package_resolver(&mut self, uri: Uri, package: Arc<dyn Package>) -> &mut Self {
        self.add_resolver(ResolverEntry::Package { uri, package })
    }

    pub fn add_redirect_resolver(&mut self, from: Uri, to: Uri) -> &mut Self {
        self.add_resolver(ResolverEntry::Redirect { from, to })
    }

    pub fn add_static_resolver(&mut self, table: Arc<StaticResolver>) -> &mut Self {
        self.add_resolver(ResolverEntry::Static(table))
    }

    pub fn add_generic_resolver(&mut self, resolver: Arc<dyn Resolver>) -> &mut Self {
        self.add_resolver(ResolverEntry::Resolver(resolver))
    }

    pub fn reset_resolvers(&mut self) -> &mut Self {
        self.resolvers.clear();
        self
    }

    /// Folds `other` into this builder using the same per-key rules as the
    /// individual mutations. Resolver entries of `other` are appended.
    pub fn merge(&mut self, other: &BuilderConfig) -> &mut Self {
        for (uri, env) in &other.envs {
            self.add_env(uri.clone(), env.clone());
        }
        for (interface, implementations) in &other.interfaces {
            self.add_interface_implementations(interface.clone(), implementations.iter().cloned());
        }
        for (uri, wrapper) in &other.wrappers {
            self.add_wrapper(uri.clone(), wrapper.clone());
        }
        for (uri, package) in &other.packages {
            self.add_package(uri.clone(), package.clone());
        }
        for redirect in &other.redirects {
            self.add_redirect(redirect.from.clone(), redirect.to.clone());
        }
        self.resolvers.extend(other.resolvers.iter().cloned());
        self
    }

    /// Freezes the current state.
    ///
    /// Fails on a redirect from a Uri to itself, and on a cycle made only of
    /// direct redirects. Cycles that pass through resolver entries depend on
    /// entry order and are reported at resolution time instead.
    pub fn build(&self) -> Result<ClientConfig> {
        let raw = self.redirects.iter().map(|r| (&r.from, &r.to));
        let chained = self.resolvers.iter().filter_map(|entry| match entry {
            ResolverEntry::Redirect { from, to } => Some((from, to)),
            _ => None,
        });
        if let Some((from, _)) = raw.chain(chained).find(|(from, to)| from == to) {
            return Err(Error::Config(format!("{} redirects to itself", from)));
        }
        self.check_redirect_cycles()?;

        tracing::debug!(
            envs = self.envs.len(),
            wrappers = self.wrappers.len(),
            packages = self.packages.len(),
            redirects = self.redirects.len(),
            resolvers = self.resolvers.len(),
            "building client config"
        );

        Ok(ClientConfig {
            envs: self.envs.clone(),
            interfaces: self.interfaces.clone(),
            wrappers: self.wrappers.clone(),
            packages: self.packages.clone(),
            redirects: self.redirects.clone(),
            resolvers: self.resolvers.clone(),
        })
    }

    fn check_redirect_cycles(&self) -> Result<()> {
        let targets: BTreeMap<&Uri, &Uri> =
            self.redirects.iter().map(|r| (&r.from, &r.to)).collect();

        for start in targets.keys() {
            let mut path = vec![*start];
            let mut current = *start;
            while let Some(&next) = targets.get(current) {
                if path.contains(&next) {
                    path.push(next);
                    let cycle: Vec<String> = path.iter().map(|u| u.to_string()).collect();
                    return Err(Error::Config(format!("redirect cycle: {}", cycle.join(" -> "))));
                }
                path.push(next);
                current = next;
            }
        }
        Ok(())
    }
}
