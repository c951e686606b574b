//! # Logging
//!
//! Installs a `tracing-subscriber` formatter for the whole process.

use std::os::raw::c_char;

use tracing_subscriber::EnvFilter;

use crate::buffer::read_str;
use crate::status::FfiError;
use crate::status::WrapCode;
use crate::status::WrapStatus;
use crate::status::guard;

/// Installs the global subscriber. `filter` uses `RUST_LOG` syntax; null
/// falls back to the `RUST_LOG` environment variable.
///
/// Fails with `ConfigError` if a subscriber is already installed.
///
/// # Safety
/// `filter` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_init_logging(filter: *const c_char) -> WrapStatus {
    guard(|| {
        let filter = if filter.is_null() {
            EnvFilter::from_default_env()
        } else {
            let directives = unsafe { read_str(filter, "filter") }?;
            EnvFilter::try_new(directives)
                .map_err(|e| FfiError::invalid_input(format!("invalid log filter: {}", e)))?
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| FfiError::new(WrapCode::ConfigError, e.to_string()))
    })
    .into()
}
