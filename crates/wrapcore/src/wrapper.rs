//! # Wrappers and Packages
//!
//! A `Package` is an un-instantiated module; a `Wrapper` is what it loads
//! into. Both variants (wasm and plugin) expose the same call contract, so the
//! client never needs to know which one it is talking to.

use std::sync::Arc;

use crate::error::Result;
use crate::invoker::Invoker;

/// An instantiated, invocable module.
pub trait Wrapper: Send + Sync {
    /// Calls `method` with msgpack `args` and an optional msgpack `env`.
    ///
    /// `invoker` is bound to the calling client and call stack, letting the
    /// module invoke other Uris while it runs.
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>>;
}

/// An immutable module descriptor that can be loaded any number of times.
pub trait Package: Send + Sync {
    fn create_wrapper(&self) -> Result<Arc<dyn Wrapper>>;

    /// Raw manifest bytes, when the package carries one.
    fn manifest(&self) -> Option<&[u8]> {
        None
    }
}
