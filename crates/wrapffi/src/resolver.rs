//! # Resolver Handles
//!
//! Static tables and extendable resolvers built on the C side and attached to
//! a builder with `wrap_builder_add_resolver`.

use std::os::raw::c_char;
use std::os::raw::c_void;
use std::ptr;
use std::slice;
use std::sync::Arc;

use wrapcore::plugin::PluginPackage;
use wrapcore::plugin::PluginWrapper;
use wrapcore::resolver::ExtendableResolver;
use wrapcore::resolver::ResolverEntry;
use wrapcore::resolver::StaticResolver;
use wrapcore::uri::Uri;
use wrapwasm::package::WasmPackage;
use wrapwasm::package::default_engine;
use wrapwasm::wrapper::WasmWrapper;

use crate::buffer::Buffer;
use crate::buffer::read_uri;
use crate::plugin::FfiPlugin;
use crate::status::FfiError;
use crate::status::WrapCode;
use crate::status::guard;

/// What `StaticEntry::data` points to.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// A C string holding the target Uri.
    Redirect,
    /// A `Buffer` holding module bytes.
    WasmPackage,
    /// An `FfiPlugin`.
    PluginPackage,
    /// A `Buffer` holding module bytes, compiled immediately.
    WasmWrapper,
    /// An `FfiPlugin`.
    PluginWrapper,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct StaticEntry {
    pub uri: *const c_char,
    pub kind: EntryKind,
    pub data: *const c_void,
}

/// Reads one entry into a Uri and its binding.
///
/// # Safety
/// `entry.uri` must be a valid C string and `entry.data` must point to the
/// value its `kind` names.
pub(crate) unsafe fn read_entry(entry: &StaticEntry) -> Result<(Uri, wrapcore::resolver::StaticEntry), FfiError> {
    use wrapcore::resolver::StaticEntry as Binding;

    let uri = unsafe { read_uri(entry.uri, "entry uri") }?;
    if entry.data.is_null() {
        return Err(FfiError::invalid_input(format!("entry data for {} is null", uri)));
    }

    let binding = match entry.kind {
        EntryKind::Redirect => Binding::Redirect(unsafe { read_uri(entry.data.cast(), "redirect target") }?),
        EntryKind::WasmPackage => {
            let module = unsafe { (*entry.data.cast::<Buffer>()).as_slice() };
            Binding::Package(Arc::new(WasmPackage::new(module)))
        }
        EntryKind::WasmWrapper => {
            let module = unsafe { (*entry.data.cast::<Buffer>()).as_slice() };
            Binding::Wrapper(Arc::new(WasmWrapper::new(&default_engine(), module)?))
        }
        EntryKind::PluginPackage => {
            let plugin = unsafe { *entry.data.cast::<FfiPlugin>() };
            Binding::Package(Arc::new(PluginPackage::new(plugin)))
        }
        EntryKind::PluginWrapper => {
            let plugin = unsafe { *entry.data.cast::<FfiPlugin>() };
            Binding::Wrapper(Arc::new(PluginWrapper::new(plugin)))
        }
    };
    Ok((uri, binding))
}

/// An owned resolver chain member.
pub struct ResolverHandle {
    pub(crate) entry: ResolverEntry,
}

#[repr(C)]
#[derive(Debug)]
pub struct WrapResolverResult {
    pub code: WrapCode,
    /// Null unless `code` is `Ok`.
    pub resolver: *mut ResolverHandle,
    pub error: Buffer,
}

impl From<Result<ResolverEntry, FfiError>> for WrapResolverResult {
    fn from(result: Result<ResolverEntry, FfiError>) -> Self {
        match result {
            Ok(entry) => Self {
                code: WrapCode::Ok,
                resolver: Box::into_raw(Box::new(ResolverHandle { entry })),
                error: Buffer::empty(),
            },
            Err(e) => Self {
                code: e.code,
                resolver: ptr::null_mut(),
                error: Buffer::from_vec(e.message.into_bytes()),
            },
        }
    }
}

/// Builds a static table from `count` entries. Later entries for the same
/// Uri replace earlier ones.
///
/// # Safety
/// `entries` must point to `count` entries, each valid per `StaticEntry`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_create_static_resolver(entries: *const StaticEntry, count: usize) -> WrapResolverResult {
    guard(|| {
        if entries.is_null() && count > 0 {
            return Err(FfiError::invalid_input("entries is null"));
        }
        let entries = if count == 0 {
            &[][..]
        } else {
            unsafe { slice::from_raw_parts(entries, count) }
        };

        let mut table = StaticResolver::new();
        for entry in entries {
            let (uri, binding) = unsafe { read_entry(entry) }?;
            table.insert(uri, binding);
        }
        tracing::debug!(entries = table.len(), "created static resolver");
        Ok(ResolverEntry::Static(Arc::new(table)))
    })
    .into()
}

/// Builds a resolver that delegates to registered uri-resolver extensions and
/// loads the wasm modules they return.
#[unsafe(no_mangle)]
pub extern "C" fn wrap_create_extendable_resolver() -> WrapResolverResult {
    guard(|| {
        let resolver = ExtendableResolver::new()?.with_loader(WasmPackage::loader());
        Ok(ResolverEntry::Resolver(Arc::new(resolver)))
    })
    .into()
}

/// # Safety
/// `resolver` must be null or a handle from this library that was neither
/// freed nor attached to a builder.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_resolver_free(resolver: *mut ResolverHandle) {
    if resolver.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(resolver) });
}
