//! # wrapffi
//!
//! C ABI over wrapcore and wrapwasm. Every exported function takes borrowed
//! inputs and returns either a status or an owned result the caller releases.
//!
//! Ownership:
//! - `Buffer`s returned by this library belong to the caller and are released
//!   with `wrap_buffer_free` (or `wrap_result_free` / `wrap_status_free`).
//! - `Buffer`s and strings passed in are only borrowed for the duration of the call.
//! - Builder, client and resolver handles are released with their `_free`
//!   function. A resolver handle passed to `wrap_builder_add_resolver` is
//!   consumed and must not be freed afterwards.

pub mod buffer;
pub mod builder;
pub mod client;
pub mod codec;
pub mod logging;
pub mod plugin;
pub mod resolver;
pub mod status;
