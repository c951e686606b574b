//! # Host Imports
//!
//! Functions a wrap module imports from the `wrap` namespace. Strings and
//! buffers cross as `(ptr, len)` pairs in the module's memory. Results of host
//! calls are parked in `WrapState` and copied out by a second call once the
//! module has allocated room for them.
//!
//! Out-of-bounds pointers trap. Failed subinvokes do not trap: they return 0
//! and leave an error message for the module to fetch. Implementation
//! subinvokes pass the caller's env along.

use wasmtime::Caller;
use wasmtime::Error;
use wasmtime::Linker;
use wasmtime::Memory;
use wrapcore::uri::Uri;

use crate::state::WrapState;

pub const NAMESPACE: &str = "wrap";

/// Every function `link` installs, as `(name, params, results)`. All
/// parameters and results are `i32`.
pub const SUPPORTED: &[(&str, usize, usize)] = &[
    ("__wrap_invoke_args", 2, 0),
    ("__wrap_invoke_result", 2, 0),
    ("__wrap_invoke_error", 2, 0),
    ("__wrap_abort", 6, 0),
    ("__wrap_load_env", 1, 0),
    ("__wrap_debug_log", 2, 0),
    ("__wrap_subinvoke", 6, 1),
    ("__wrap_subinvoke_result_len", 0, 1),
    ("__wrap_subinvoke_result", 1, 0),
    ("__wrap_subinvoke_error_len", 0, 1),
    ("__wrap_subinvoke_error", 1, 0),
    ("__wrap_subinvokeImplementation", 8, 1),
    ("__wrap_subinvokeImplementation_result_len", 0, 1),
    ("__wrap_subinvokeImplementation_result", 1, 0),
    ("__wrap_subinvokeImplementation_error_len", 0, 1),
    ("__wrap_subinvokeImplementation_error", 1, 0),
    ("__wrap_getImplementations", 2, 1),
    ("__wrap_getImplementations_result_len", 0, 1),
    ("__wrap_getImplementations_result", 1, 0),
];

/// Parameter and result counts of a supported import.
pub fn signature(name: &str) -> Option<(usize, usize)> {
    SUPPORTED
        .iter()
        .find(|(supported, _, _)| *supported == name)
        .map(|&(_, params, results)| (params, results))
}

type Result<T> = wasmtime::Result<T>;

fn memory(caller: &Caller<'_, WrapState>) -> Result<Memory> {
    caller
        .data()
        .memory
        .ok_or_else(|| Error::msg("module memory is not available"))
}

fn read_bytes(caller: &Caller<'_, WrapState>, ptr: u32, len: u32) -> Result<Vec<u8>> {
    let data = memory(caller)?.data(caller);
    let start = ptr as usize;
    start
        .checked_add(len as usize)
        .and_then(|end| data.get(start..end))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::msg(format!("out of bounds read of {} bytes at {}", len, ptr)))
}

fn read_string(caller: &Caller<'_, WrapState>, ptr: u32, len: u32) -> Result<String> {
    String::from_utf8(read_bytes(caller, ptr, len)?)
        .map_err(|_| Error::msg("string argument is not valid utf-8"))
}

fn read_uri(caller: &Caller<'_, WrapState>, ptr: u32, len: u32) -> Result<std::result::Result<Uri, String>> {
    let raw = read_string(caller, ptr, len)?;
    Ok(Uri::parse(&raw).map_err(|e| e.to_string()))
}

/// Copies bytes held in the state into module memory without cloning them.
fn copy_out(
    caller: &mut Caller<'_, WrapState>,
    ptr: u32,
    what: &str,
    pick: fn(&WrapState) -> Option<&[u8]>,
) -> Result<()> {
    let memory = memory(caller)?;
    let (data, state) = memory.data_and_store_mut(caller);
    let bytes = pick(state).ok_or_else(|| Error::msg(format!("{}: nothing to copy", what)))?;
    let start = ptr as usize;
    let end = start
        .checked_add(bytes.len())
        .filter(|&end| end <= data.len())
        .ok_or_else(|| Error::msg(format!("{}: out of bounds write", what)))?;
    data[start..end].copy_from_slice(bytes);
    Ok(())
}

fn len_of(what: &str, bytes: Option<&[u8]>) -> Result<i32> {
    let bytes = bytes.ok_or_else(|| Error::msg(format!("{}: nothing to report", what)))?;
    i32::try_from(bytes.len()).map_err(|_| Error::msg(format!("{}: too large", what)))
}

/// Installs the `wrap` namespace into `linker`.
pub fn link(linker: &mut Linker<WrapState>) -> Result<()> {
    link_invoke(linker)?;
    link_subinvoke(linker)?;
    link_implementations(linker)?;
    Ok(())
}

fn link_invoke(linker: &mut Linker<WrapState>) -> Result<()> {
    linker.func_wrap(
        NAMESPACE,
        "__wrap_invoke_args",
        |mut caller: Caller<'_, WrapState>, method_ptr: u32, args_ptr: u32| {
            copy_out(&mut caller, method_ptr, "__wrap_invoke_args", |s| Some(s.method.as_bytes()))?;
            copy_out(&mut caller, args_ptr, "__wrap_invoke_args", |s| Some(s.args.as_slice()))
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_invoke_result",
        |mut caller: Caller<'_, WrapState>, ptr: u32, len: u32| -> Result<()> {
            let result = read_bytes(&caller, ptr, len)?;
            caller.data_mut().invoke.result = Some(result);
            Ok(())
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_invoke_error",
        |mut caller: Caller<'_, WrapState>, ptr: u32, len: u32| -> Result<()> {
            let error = read_string(&caller, ptr, len)?;
            caller.data_mut().invoke.error = Some(error);
            Ok(())
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_abort",
        |mut caller: Caller<'_, WrapState>,
         msg_ptr: u32,
         msg_len: u32,
         file_ptr: u32,
         file_len: u32,
         line: u32,
         column: u32|
         -> Result<()> {
            let msg = read_string(&caller, msg_ptr, msg_len)?;
            let file = read_string(&caller, file_ptr, file_len)?;
            let message = format!("{} ({}:{}:{})", msg, file, line, column);
            caller.data_mut().abort = Some(message.clone());
            Err(Error::msg(format!("__wrap_abort: {}", message)))
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_load_env",
        |mut caller: Caller<'_, WrapState>, ptr: u32| {
            copy_out(&mut caller, ptr, "__wrap_load_env", |s| Some(s.env.as_slice()))
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_debug_log",
        |caller: Caller<'_, WrapState>, ptr: u32, len: u32| -> Result<()> {
            let msg = read_string(&caller, ptr, len)?;
            tracing::debug!(target: "wrapwasm::module", method = %caller.data().method, "{}", msg);
            Ok(())
        },
    )?;

    Ok(())
}

fn link_subinvoke(linker: &mut Linker<WrapState>) -> Result<()> {
    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvoke",
        |mut caller: Caller<'_, WrapState>,
         uri_ptr: u32,
         uri_len: u32,
         method_ptr: u32,
         method_len: u32,
         args_ptr: u32,
         args_len: u32|
         -> Result<i32> {
            let uri = read_uri(&caller, uri_ptr, uri_len)?;
            let method = read_string(&caller, method_ptr, method_len)?;
            let args = read_bytes(&caller, args_ptr, args_len)?;
            tracing::trace!(?uri, %method, "__wrap_subinvoke");

            let outcome = match uri {
                Ok(uri) => caller.data().invoker.invoke(&uri, &method, Some(&args), None),
                Err(reason) => Err(wrapcore::error::Error::execution(reason)),
            };
            Ok(caller.data_mut().subinvoke.set(outcome) as i32)
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvoke_result_len",
        |caller: Caller<'_, WrapState>| {
            len_of("__wrap_subinvoke_result_len", caller.data().subinvoke.result.as_deref())
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvoke_result",
        |mut caller: Caller<'_, WrapState>, ptr: u32| {
            copy_out(&mut caller, ptr, "__wrap_subinvoke_result", |s| s.subinvoke.result.as_deref())
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvoke_error_len",
        |caller: Caller<'_, WrapState>| {
            let error = caller.data().subinvoke.error.as_deref().map(str::as_bytes);
            len_of("__wrap_subinvoke_error_len", error)
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvoke_error",
        |mut caller: Caller<'_, WrapState>, ptr: u32| {
            copy_out(&mut caller, ptr, "__wrap_subinvoke_error", |s| {
                s.subinvoke.error.as_deref().map(str::as_bytes)
            })
        },
    )?;

    Ok(())
}

fn link_implementations(linker: &mut Linker<WrapState>) -> Result<()> {
    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvokeImplementation",
        |mut caller: Caller<'_, WrapState>,
         interface_ptr: u32,
         interface_len: u32,
         impl_ptr: u32,
         impl_len: u32,
         method_ptr: u32,
         method_len: u32,
         args_ptr: u32,
         args_len: u32|
         -> Result<i32> {
            let interface = read_string(&caller, interface_ptr, interface_len)?;
            let implementation = read_uri(&caller, impl_ptr, impl_len)?;
            let method = read_string(&caller, method_ptr, method_len)?;
            let args = read_bytes(&caller, args_ptr, args_len)?;
            tracing::trace!(%interface, ?implementation, %method, "__wrap_subinvokeImplementation");

            let outcome = match implementation {
                Ok(uri) => {
                    let state = caller.data();
                    let env = (!state.env.is_empty()).then_some(state.env.as_slice());
                    state.invoker.invoke(&uri, &method, Some(&args), env)
                }
                Err(reason) => Err(wrapcore::error::Error::execution(reason)),
            }
            .map_err(|e| {
                wrapcore::error::Error::execution(format!(
                    "implementation of {} failed: {}",
                    interface, e
                ))
            });
            Ok(caller.data_mut().subinvoke_implementation.set(outcome) as i32)
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvokeImplementation_result_len",
        |caller: Caller<'_, WrapState>| {
            let result = caller.data().subinvoke_implementation.result.as_deref();
            len_of("__wrap_subinvokeImplementation_result_len", result)
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvokeImplementation_result",
        |mut caller: Caller<'_, WrapState>, ptr: u32| {
            copy_out(&mut caller, ptr, "__wrap_subinvokeImplementation_result", |s| {
                s.subinvoke_implementation.result.as_deref()
            })
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvokeImplementation_error_len",
        |caller: Caller<'_, WrapState>| {
            let error = caller
                .data()
                .subinvoke_implementation
                .error
                .as_deref()
                .map(str::as_bytes);
            len_of("__wrap_subinvokeImplementation_error_len", error)
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_subinvokeImplementation_error",
        |mut caller: Caller<'_, WrapState>, ptr: u32| {
            copy_out(&mut caller, ptr, "__wrap_subinvokeImplementation_error", |s| {
                s.subinvoke_implementation.error.as_deref().map(str::as_bytes)
            })
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_getImplementations",
        |mut caller: Caller<'_, WrapState>, ptr: u32, len: u32| -> Result<i32> {
            let interface = read_uri(&caller, ptr, len)?.map_err(Error::msg)?;
            let implementations = caller.data().invoker.implementations(&interface);
            let found = !implementations.is_empty();
            let encoded = wrappack::to_vec(&implementations)
                .map_err(|e| Error::msg(format!("__wrap_getImplementations: {}", e)))?;
            caller.data_mut().implementations = Some(encoded);
            Ok(found as i32)
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_getImplementations_result_len",
        |caller: Caller<'_, WrapState>| {
            len_of("__wrap_getImplementations_result_len", caller.data().implementations.as_deref())
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "__wrap_getImplementations_result",
        |mut caller: Caller<'_, WrapState>, ptr: u32| {
            copy_out(&mut caller, ptr, "__wrap_getImplementations_result", |s| {
                s.implementations.as_deref()
            })
        },
    )?;

    Ok(())
}
