//! # Wrapcore
//!
//! Resolves logical module addresses to invocable modules and dispatches
//! method calls to them.
//!
//! A `BuilderConfig` accumulates environments, interface implementations,
//! direct registrations and resolver entries. `build()` freezes it into a
//! `ClientConfig`, from which a `Client` compiles its `ResolverChain`.
//! `Client::invoke` resolves the Uri (following redirects and loading
//! packages through the load cache), then calls the resulting `Wrapper` with
//! an `Invoker` bound to the same client.

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod invoker;
pub mod plugin;
pub mod resolver;
pub mod uri;
pub mod wrapper;
