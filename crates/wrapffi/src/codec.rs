//! # Codec Calls
//!
//! JSON to msgpack and back, for hosts without a msgpack library.

use std::os::raw::c_char;

use crate::buffer::Buffer;
use crate::buffer::read_str;
use crate::status::WrapResult;
use crate::status::guard;

/// Encodes a JSON document as msgpack.
///
/// # Safety
/// `json` must be a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_encode(json: *const c_char) -> WrapResult {
    guard(|| {
        let json = unsafe { read_str(json, "json") }?;
        Ok(wrappack::encode(json)?)
    })
    .into()
}

/// Decodes msgpack into a utf-8 JSON document (not nul-terminated).
///
/// # Safety
/// `bytes` must be readable for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_decode(bytes: Buffer) -> WrapResult {
    guard(|| {
        let bytes = unsafe { bytes.as_slice() };
        Ok(wrappack::decode(bytes)?.into_bytes())
    })
    .into()
}
