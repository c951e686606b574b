//! # Builder Calls
//!
//! A `BuilderConfig` behind an opaque handle. Every call returns a
//! `WrapStatus`; a failed call leaves the builder unchanged.

use std::os::raw::c_char;
use std::sync::Arc;

use wrapcore::builder::BuilderConfig;
use wrapcore::plugin::PluginPackage;
use wrapcore::plugin::PluginWrapper;
use wrapcore::resolver::StaticEntry as Binding;
use wrapwasm::package::WasmPackage;
use wrapwasm::package::default_engine;
use wrapwasm::wrapper::WasmWrapper;

use crate::buffer::Buffer;
use crate::buffer::read_uri;
use crate::plugin::FfiPlugin;
use crate::resolver::ResolverHandle;
use crate::resolver::StaticEntry;
use crate::resolver::read_entry;
use crate::status::FfiError;
use crate::status::WrapStatus;
use crate::status::guard;

#[unsafe(no_mangle)]
pub extern "C" fn wrap_builder_new() -> *mut BuilderConfig {
    Box::into_raw(Box::new(BuilderConfig::new()))
}

/// # Safety
/// `builder` must be null or a handle from `wrap_builder_new` not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_free(builder: *mut BuilderConfig) {
    if builder.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(builder) });
}

/// Runs `f` against the builder behind `builder`.
///
/// # Safety
/// `builder` must be null or a live handle from `wrap_builder_new`.
unsafe fn with_builder(
    builder: *mut BuilderConfig,
    f: impl FnOnce(&mut BuilderConfig) -> Result<(), FfiError>,
) -> WrapStatus {
    guard(|| {
        let builder = unsafe { builder.as_mut() }.ok_or_else(|| FfiError::invalid_input("builder is null"))?;
        f(builder)
    })
    .into()
}

/// Merges `env` (a msgpack map) into the env already registered for `uri`.
///
/// # Safety
/// `builder` must be a live handle, `uri` a valid C string and `env` readable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_env(builder: *mut BuilderConfig, uri: *const c_char, env: Buffer) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.add_env(read_uri(uri, "uri")?, env.as_slice().to_vec());
            Ok(())
        })
    }
}

/// # Safety
/// Same as `wrap_builder_add_env`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_set_env(builder: *mut BuilderConfig, uri: *const c_char, env: Buffer) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.set_env(read_uri(uri, "uri")?, env.as_slice().to_vec());
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle and `uri` a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_remove_env(builder: *mut BuilderConfig, uri: *const c_char) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.remove_env(&read_uri(uri, "uri")?);
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle and both Uris valid C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_interface_implementation(
    builder: *mut BuilderConfig,
    interface: *const c_char,
    implementation: *const c_char,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            let interface = read_uri(interface, "interface")?;
            let implementation = read_uri(implementation, "implementation")?;
            b.add_interface_implementation(interface, implementation);
            Ok(())
        })
    }
}

/// # Safety
/// Same as `wrap_builder_add_interface_implementation`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_remove_interface_implementation(
    builder: *mut BuilderConfig,
    interface: *const c_char,
    implementation: *const c_char,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            let interface = read_uri(interface, "interface")?;
            let implementation = read_uri(implementation, "implementation")?;
            b.remove_interface_implementation(&interface, &implementation);
            Ok(())
        })
    }
}

/// Compiles `module` and binds it to `uri`. Compile failures report `LoadError`.
///
/// # Safety
/// `builder` must be a live handle, `uri` a valid C string and `module` readable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_wasm_wrapper(
    builder: *mut BuilderConfig,
    uri: *const c_char,
    module: Buffer,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            let uri = read_uri(uri, "uri")?;
            let wrapper = WasmWrapper::new(&default_engine(), module.as_slice())?;
            b.add_wrapper(uri, Arc::new(wrapper));
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle, `uri` a valid C string and `plugin`
/// callable per `FfiPlugin`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_plugin_wrapper(
    builder: *mut BuilderConfig,
    uri: *const c_char,
    plugin: FfiPlugin,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.add_wrapper(read_uri(uri, "uri")?, Arc::new(PluginWrapper::new(plugin)));
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle and `uri` a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_remove_wrapper(builder: *mut BuilderConfig, uri: *const c_char) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.remove_wrapper(&read_uri(uri, "uri")?);
            Ok(())
        })
    }
}

/// Binds module bytes to `uri`. They are compiled on first use.
///
/// # Safety
/// `builder` must be a live handle, `uri` a valid C string and `module` readable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_wasm_package(
    builder: *mut BuilderConfig,
    uri: *const c_char,
    module: Buffer,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.add_package(read_uri(uri, "uri")?, Arc::new(WasmPackage::new(module.as_slice())));
            Ok(())
        })
    }
}

/// # Safety
/// Same as `wrap_builder_add_plugin_wrapper`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_plugin_package(
    builder: *mut BuilderConfig,
    uri: *const c_char,
    plugin: FfiPlugin,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.add_package(read_uri(uri, "uri")?, Arc::new(PluginPackage::new(plugin)));
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle and `uri` a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_remove_package(builder: *mut BuilderConfig, uri: *const c_char) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.remove_package(&read_uri(uri, "uri")?);
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle and both Uris valid C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_redirect(
    builder: *mut BuilderConfig,
    from: *const c_char,
    to: *const c_char,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.add_redirect(read_uri(from, "from")?, read_uri(to, "to")?);
            Ok(())
        })
    }
}

/// # Safety
/// `builder` must be a live handle and `from` a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_remove_redirect(builder: *mut BuilderConfig, from: *const c_char) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.remove_redirect(&read_uri(from, "from")?);
            Ok(())
        })
    }
}

/// Appends a resolver for a single wrapper. `entry.kind` must be
/// `WasmWrapper` or `PluginWrapper`.
///
/// # Safety
/// `builder` must be a live handle and `entry` valid per `StaticEntry`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_wrapper_resolver(
    builder: *mut BuilderConfig,
    entry: *const StaticEntry,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| match read_entry_ptr(entry)? {
            (uri, Binding::Wrapper(wrapper)) => {
                b.add_wrapper_resolver(uri, wrapper);
                Ok(())
            }
            (uri, _) => Err(FfiError::invalid_input(format!("entry for {} is not a wrapper", uri))),
        })
    }
}

/// Appends a resolver for a single package. `entry.kind` must be
/// `WasmPackage` or `PluginPackage`.
///
/// # Safety
/// Same as `wrap_builder_add_wrapper_resolver`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_package_resolver(
    builder: *mut BuilderConfig,
    entry: *const StaticEntry,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| match read_entry_ptr(entry)? {
            (uri, Binding::Package(package)) => {
                b.add_package_resolver(uri, package);
                Ok(())
            }
            (uri, _) => Err(FfiError::invalid_input(format!("entry for {} is not a package", uri))),
        })
    }
}

/// # Safety
/// `builder` must be a live handle and both Uris valid C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_redirect_resolver(
    builder: *mut BuilderConfig,
    from: *const c_char,
    to: *const c_char,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            b.add_redirect_resolver(read_uri(from, "from")?, read_uri(to, "to")?);
            Ok(())
        })
    }
}

/// Appends a resolver handle to the chain. The handle is consumed on success
/// and must not be used or freed afterwards.
///
/// # Safety
/// `builder` must be a live handle and `resolver` a live resolver handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wrap_builder_add_resolver(
    builder: *mut BuilderConfig,
    resolver: *mut ResolverHandle,
) -> WrapStatus {
    unsafe {
        with_builder(builder, |b| {
            if resolver.is_null() {
                return Err(FfiError::invalid_input("resolver is null"));
            }
            let handle = Box::from_raw(resolver);
            b.add_resolver(handle.entry);
            Ok(())
        })
    }
}

unsafe fn read_entry_ptr(entry: *const StaticEntry) -> Result<(wrapcore::uri::Uri, Binding), FfiError> {
    let entry = unsafe { entry.as_ref() }.ok_or_else(|| FfiError::invalid_input("entry is null"))?;
    unsafe { read_entry(entry) }
}
