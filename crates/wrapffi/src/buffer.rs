//! # Buffers
//!
//! Byte buffers, optional values and C strings as they cross the boundary.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use wrapcore::uri::Uri;

use crate::status::FfiError;

#[repr(C)]
#[derive(Debug)]
pub struct Buffer {
    pub data: *mut u8,
    pub len: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl Buffer {
    pub fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
        }
    }

    /// Hands `bytes` over to the caller.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        let len = bytes.len();
        let data = Box::into_raw(bytes.into_boxed_slice()).cast::<u8>();
        Self { data, len }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.len == 0
    }

    /// Views the bytes without taking ownership.
    ///
    /// # Safety
    /// `data` must be null or point to `len` readable bytes that outlive `'a`.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.is_empty() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.data, self.len) }
    }

    /// Takes back a buffer produced by `from_vec`.
    ///
    /// # Safety
    /// The buffer must come from `Buffer::from_vec` and not have been released.
    pub unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        let raw = ptr::slice_from_raw_parts_mut(self.data, self.len);
        unsafe { Box::from_raw(raw) }.into_vec()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptionTag {
    None,
    Some,
}

/// `Option<T>` with a C layout. `value` is ignored when `tag` is `None`.
#[repr(C)]
#[derive(Debug)]
pub struct FfiOption<T> {
    pub tag: OptionTag,
    pub value: T,
}

impl<T> FfiOption<T> {
    pub fn some(value: T) -> Self {
        Self {
            tag: OptionTag::Some,
            value,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self.tag {
            OptionTag::Some => Some(self.value),
            OptionTag::None => None,
        }
    }
}

impl<T: Default> FfiOption<T> {
    pub fn none() -> Self {
        Self {
            tag: OptionTag::None,
            value: T::default(),
        }
    }
}

/// Allocates a library-owned copy of `len` bytes at `data`.
///
/// Plugins return their results in buffers made here, so the library can
/// release them after reading.
///
/// # Safety
/// `data` must be null or point to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_buffer_new(data: *const u8, len: usize) -> Buffer {
    if data.is_null() || len == 0 {
        return Buffer::empty();
    }
    Buffer::from_vec(unsafe { slice::from_raw_parts(data, len) }.to_vec())
}

/// # Safety
/// `buffer` must come from this library and not have been released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_buffer_free(buffer: Buffer) {
    drop(unsafe { buffer.into_vec() });
}

/// Reads a borrowed, nul-terminated utf-8 string.
///
/// # Safety
/// `ptr` must be null or a valid C string that outlives `'a`.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::invalid_input(format!("{} is null", what)));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiError::invalid_input(format!("{} is not valid utf-8", what)))
}

/// # Safety
/// Same as `read_str`.
pub(crate) unsafe fn read_uri(ptr: *const c_char, what: &str) -> Result<Uri, FfiError> {
    let raw = unsafe { read_str(ptr, what) }?;
    Ok(Uri::parse(raw)?)
}

/// # Safety
/// A `Some` buffer must satisfy `Buffer::as_slice`.
pub(crate) unsafe fn read_option<'a>(option: FfiOption<Buffer>) -> Option<&'a [u8]> {
    option.into_option().map(|buffer| unsafe { buffer.as_slice() })
}
