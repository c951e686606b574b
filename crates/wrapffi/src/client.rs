//! # Client Calls

use std::os::raw::c_char;
use std::ptr;

use wrapcore::builder::BuilderConfig;
use wrapcore::client::Client;

use crate::buffer::Buffer;
use crate::buffer::FfiOption;
use crate::buffer::read_option;
use crate::buffer::read_str;
use crate::buffer::read_uri;
use crate::status::FfiError;
use crate::status::WrapCode;
use crate::status::WrapResult;
use crate::status::guard;

#[repr(C)]
#[derive(Debug)]
pub struct WrapClientResult {
    pub code: WrapCode,
    /// Null unless `code` is `Ok`.
    pub client: *mut Client,
    pub error: Buffer,
}

/// Freezes the builder into a client. The builder stays usable and must still
/// be freed by the caller.
///
/// # Safety
/// `builder` must be a live handle from `wrap_builder_new`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_build_client(builder: *const BuilderConfig) -> WrapClientResult {
    let built = guard(|| {
        let builder = unsafe { builder.as_ref() }.ok_or_else(|| FfiError::invalid_input("builder is null"))?;
        Ok(Client::new(builder.build()?))
    });

    match built {
        Ok(client) => WrapClientResult {
            code: WrapCode::Ok,
            client: Box::into_raw(Box::new(client)),
            error: Buffer::empty(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "failed to build client");
            WrapClientResult {
                code: e.code,
                client: ptr::null_mut(),
                error: Buffer::from_vec(e.message.into_bytes()),
            }
        }
    }
}

/// Invokes `method` on the module at `uri`.
///
/// # Safety
/// `client` must be a live handle, `uri` and `method` valid C strings, and
/// `Some` buffers readable for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_invoke(
    client: *const Client,
    uri: *const c_char,
    method: *const c_char,
    args: FfiOption<Buffer>,
    env: FfiOption<Buffer>,
) -> WrapResult {
    guard(|| {
        let client = unsafe { client.as_ref() }.ok_or_else(|| FfiError::invalid_input("client is null"))?;
        let uri = unsafe { read_uri(uri, "uri") }?;
        let method = unsafe { read_str(method, "method") }?;
        let args = unsafe { read_option(args) };
        let env = unsafe { read_option(env) };
        Ok(client.invoke(&uri, method, args, env)?)
    })
    .into()
}

/// # Safety
/// `client` must be null or a handle from `wrap_build_client` not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_client_free(client: *mut Client) {
    if client.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(client) });
}
