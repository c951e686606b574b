//! # Status Codes
//!
//! Every failure is reported as a stable `WrapCode` plus a utf-8 message.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use wrapcore::error::Error;
use wrapcore::error::ErrorKind;

use crate::buffer::Buffer;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WrapCode {
    Ok = 0,
    InvalidUri = 1,
    UriNotFound = 2,
    CircularRedirect = 3,
    ReentrantInvoke = 4,
    LoadError = 5,
    ModuleExecution = 6,
    ConfigError = 7,
    InvalidInput = 8,
    Codec = 9,
}

impl From<ErrorKind> for WrapCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidUri => Self::InvalidUri,
            ErrorKind::UriNotFound => Self::UriNotFound,
            ErrorKind::CircularRedirect => Self::CircularRedirect,
            ErrorKind::ReentrantInvoke => Self::ReentrantInvoke,
            ErrorKind::Load => Self::LoadError,
            ErrorKind::ModuleExecution => Self::ModuleExecution,
            ErrorKind::Config => Self::ConfigError,
            ErrorKind::Codec => Self::Codec,
        }
    }
}

/// A failure on its way out through the boundary.
#[derive(Debug)]
pub struct FfiError {
    pub code: WrapCode,
    pub message: String,
}

impl FfiError {
    pub fn new(code: WrapCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(WrapCode::InvalidInput, message)
    }
}

impl std::fmt::Display for FfiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for FfiError {}

impl From<Error> for FfiError {
    fn from(e: Error) -> Self {
        Self::new(e.kind().into(), e.to_string())
    }
}

impl From<wrappack::Error> for FfiError {
    fn from(e: wrappack::Error) -> Self {
        Self::new(WrapCode::Codec, e.to_string())
    }
}

/// Runs `f`, turning a panic into a `ModuleExecution` failure instead of
/// unwinding into foreign code.
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, FfiError>) -> Result<T, FfiError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let message = panic_message(&*panic);
        tracing::error!(%message, "panic at ffi boundary");
        Err(FfiError::new(WrapCode::ModuleExecution, format!("panic: {}", message)))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Outcome of a call that produces no value.
#[repr(C)]
#[derive(Debug)]
pub struct WrapStatus {
    pub code: WrapCode,
    pub error: Buffer,
}

impl From<Result<(), FfiError>> for WrapStatus {
    fn from(result: Result<(), FfiError>) -> Self {
        match result {
            Ok(()) => Self {
                code: WrapCode::Ok,
                error: Buffer::empty(),
            },
            Err(e) => Self {
                code: e.code,
                error: Buffer::from_vec(e.message.into_bytes()),
            },
        }
    }
}

/// Outcome of a call that produces bytes. Exactly one of `value` and `error`
/// is meaningful, depending on `code`.
#[repr(C)]
#[derive(Debug)]
pub struct WrapResult {
    pub code: WrapCode,
    pub value: Buffer,
    pub error: Buffer,
}

impl WrapResult {
    /// Takes back a result whose buffers were allocated by this library.
    ///
    /// # Safety
    /// Both buffers must come from `Buffer::from_vec` or `wrap_buffer_new`.
    pub unsafe fn into_result(self) -> Result<Vec<u8>, FfiError> {
        let value = unsafe { self.value.into_vec() };
        let error = unsafe { self.error.into_vec() };
        match self.code {
            WrapCode::Ok => Ok(value),
            code => Err(FfiError::new(code, String::from_utf8_lossy(&error))),
        }
    }
}

impl From<Result<Vec<u8>, FfiError>> for WrapResult {
    fn from(result: Result<Vec<u8>, FfiError>) -> Self {
        match result {
            Ok(value) => Self {
                code: WrapCode::Ok,
                value: Buffer::from_vec(value),
                error: Buffer::empty(),
            },
            Err(e) => Self {
                code: e.code,
                value: Buffer::empty(),
                error: Buffer::from_vec(e.message.into_bytes()),
            },
        }
    }
}

/// # Safety
/// `status` must come from this library and not have been released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_status_free(status: WrapStatus) {
    drop(unsafe { status.error.into_vec() });
}

/// # Safety
/// `result` must come from this library and not have been released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_result_free(result: WrapResult) {
    drop(unsafe { result.into_result() });
}
