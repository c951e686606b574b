//! # Invocation State
//!
//! Store data for one `_wrap_invoke` call. Host functions read the request
//! from here and leave their results here for the module to copy out.

use std::sync::Arc;

use wasmtime::Memory;
use wrapcore::invoker::Invoker;

/// Result slot of a call made on the module's behalf.
#[derive(Default)]
pub struct Outcome {
    pub result: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn set(&mut self, outcome: wrapcore::error::Result<Vec<u8>>) -> bool {
        match outcome {
            Ok(bytes) => {
                self.result = Some(bytes);
                self.error = None;
                true
            }
            Err(e) => {
                self.result = None;
                self.error = Some(e.to_string());
                false
            }
        }
    }
}

pub struct WrapState {
    pub method: String,
    pub args: Vec<u8>,
    pub env: Vec<u8>,
    pub invoker: Arc<dyn Invoker>,
    pub memory: Option<Memory>,
    /// What the module reported through `__wrap_invoke_result` / `__wrap_invoke_error`.
    pub invoke: Outcome,
    pub abort: Option<String>,
    pub subinvoke: Outcome,
    pub subinvoke_implementation: Outcome,
    pub implementations: Option<Vec<u8>>,
}

impl WrapState {
    pub fn new(method: &str, args: &[u8], env: Option<&[u8]>, invoker: Arc<dyn Invoker>) -> Self {
        Self {
            method: method.to_string(),
            args: args.to_vec(),
            env: env.map(<[u8]>::to_vec).unwrap_or_default(),
            invoker,
            memory: None,
            invoke: Outcome::default(),
            abort: None,
            subinvoke: Outcome::default(),
            subinvoke_implementation: Outcome::default(),
            implementations: None,
        }
    }
}
