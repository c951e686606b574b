//! # Wrapwasm
//!
//! WebAssembly variant of wrapcore's `Package` and `Wrapper`.
//!
//! A wrap module is a core wasm module that imports its linear memory as
//! `env.memory`, exports `_wrap_invoke(method_len, args_len, env_len) -> i32`
//! and talks to the host through functions imported from the `wrap` module
//! (see `imports`). Every invocation runs in a fresh store.

pub mod imports;
pub mod package;
pub mod state;
pub mod wrapper;

#[cfg(test)]
mod tests;
