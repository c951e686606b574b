//! # Invoker
//!
//! Narrow capability handed to every wrapper invocation. It lets a running
//! module call back into the client that invoked it, and carries the call
//! stack so reentrant calls are caught instead of deadlocking.

use crate::client::Client;
use crate::error::Result;
use crate::uri::Uri;

pub trait Invoker: Send + Sync {
    fn invoke(
        &self,
        uri: &Uri,
        method: &str,
        args: Option<&[u8]>,
        env: Option<&[u8]>,
    ) -> Result<Vec<u8>>;

    /// Registered implementations of an interface Uri, in insertion order.
    fn implementations(&self, interface: &Uri) -> Vec<Uri>;

    /// Whether `uri` is already executing further up this call stack.
    fn is_active(&self, _uri: &Uri) -> bool {
        false
    }
}

/// Invoker bound to a `Client` and the stack of Uris above the current call.
#[derive(Clone)]
pub struct ClientInvoker {
    client: Client,
    stack: Vec<Uri>,
}

impl ClientInvoker {
    pub(crate) fn new(client: Client, stack: Vec<Uri>) -> Self {
        Self { client, stack }
    }

    pub fn stack(&self) -> &[Uri] {
        &self.stack
    }
}

impl Invoker for ClientInvoker {
    fn invoke(
        &self,
        uri: &Uri,
        method: &str,
        args: Option<&[u8]>,
        env: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.client.invoke_in(&self.stack, uri, method, args, env)
    }

    fn implementations(&self, interface: &Uri) -> Vec<Uri> {
        self.client.implementations(interface)
    }

    fn is_active(&self, uri: &Uri) -> bool {
        self.stack.contains(uri)
    }
}
