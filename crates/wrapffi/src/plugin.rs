//! # Native Plugins
//!
//! Plugins implemented in the host language, called through a function
//! pointer. A plugin receives the method name, the msgpack args and an opaque
//! invoker it may pass to `wrap_invoker_invoke` for the duration of the call.
//! Its `WrapResult` buffers must be allocated with `wrap_buffer_new`; the
//! library releases them once read.

use std::ffi::CString;
use std::os::raw::c_char;
use std::os::raw::c_void;
use std::sync::Arc;

use wrapcore::error::Error;
use wrapcore::error::Result;
use wrapcore::invoker::Invoker;
use wrapcore::plugin::PluginModule;

use crate::buffer::Buffer;
use crate::buffer::FfiOption;
use crate::buffer::read_option;
use crate::buffer::read_str;
use crate::buffer::read_uri;
use crate::status::FfiError;
use crate::status::WrapResult;
use crate::status::guard;

pub type PluginFn = unsafe extern "C" fn(
    method_name: *const c_char,
    params: *const u8,
    params_len: usize,
    invoker: *const c_void,
    user_data: *mut c_void,
) -> WrapResult;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct FfiPlugin {
    pub invoke: PluginFn,
    pub user_data: *mut c_void,
}

// SAFETY: registering a plugin asserts that `invoke` may be called with
// `user_data` from any thread, concurrently.
unsafe impl Send for FfiPlugin {}
unsafe impl Sync for FfiPlugin {}

impl PluginModule for FfiPlugin {
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        _env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>> {
        let method_name = CString::new(method)
            .map_err(|_| Error::execution(format!("method name {:?} contains a nul byte", method)))?;
        let handle: *const Arc<dyn Invoker> = &invoker;

        // SAFETY: every pointer handed out stays alive until the call returns.
        let result = unsafe {
            (self.invoke)(
                method_name.as_ptr(),
                args.as_ptr(),
                args.len(),
                handle.cast::<c_void>(),
                self.user_data,
            )
        };

        // SAFETY: plugin results are allocated with `wrap_buffer_new`.
        unsafe { result.into_result() }.map_err(|e| Error::execution(e.message))
    }
}

/// Invokes a module from inside a native plugin, on behalf of that plugin.
///
/// # Safety
/// `invoker` must be the pointer the library passed to the running plugin
/// call. `uri` and `method` must be valid C strings and a `Some` `args` must
/// describe readable memory.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_invoker_invoke(
    invoker: *const c_void,
    uri: *const c_char,
    method: *const c_char,
    args: FfiOption<Buffer>,
) -> WrapResult {
    guard(|| {
        if invoker.is_null() {
            return Err(FfiError::invalid_input("invoker is null"));
        }
        let invoker = unsafe { &*invoker.cast::<Arc<dyn Invoker>>() };
        let uri = unsafe { read_uri(uri, "uri") }?;
        let method = unsafe { read_str(method, "method") }?;
        let args = unsafe { read_option(args) };
        Ok(invoker.invoke(&uri, method, args, None)?)
    })
    .into()
}
