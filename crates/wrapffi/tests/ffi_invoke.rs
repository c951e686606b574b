//! Drives the C ABI the way a foreign host would: raw pointers, C strings and
//! `extern "C"` plugin callbacks.

use std::collections::HashMap;
use std::ffi::CStr;
use std::ffi::CString;
use std::os::raw::c_char;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use wrapcore::builder::BuilderConfig;
use wrapcore::client::Client;
use wrapcore::resolver::URI_RESOLVER_INTERFACE;
use wrapffi::buffer::Buffer;
use wrapffi::buffer::FfiOption;
use wrapffi::buffer::wrap_buffer_new;
use wrapffi::builder::wrap_builder_add_interface_implementation;
use wrapffi::builder::wrap_builder_add_plugin_package;
use wrapffi::builder::wrap_builder_add_plugin_wrapper;
use wrapffi::builder::wrap_builder_add_redirect;
use wrapffi::builder::wrap_builder_add_resolver;
use wrapffi::builder::wrap_builder_add_wasm_package;
use wrapffi::builder::wrap_builder_add_wasm_wrapper;
use wrapffi::builder::wrap_builder_free;
use wrapffi::builder::wrap_builder_new;
use wrapffi::builder::wrap_builder_remove_env;
use wrapffi::client::wrap_build_client;
use wrapffi::client::wrap_client_free;
use wrapffi::client::wrap_invoke;
use wrapffi::codec::wrap_decode;
use wrapffi::codec::wrap_encode;
use wrapffi::logging::wrap_init_logging;
use wrapffi::plugin::FfiPlugin;
use wrapffi::plugin::wrap_invoker_invoke;
use wrapffi::resolver::EntryKind;
use wrapffi::resolver::StaticEntry;
use wrapffi::resolver::wrap_create_extendable_resolver;
use wrapffi::resolver::wrap_create_static_resolver;
use wrapffi::status::FfiError;
use wrapffi::status::WrapCode;
use wrapffi::status::WrapResult;
use wrapffi::status::WrapStatus;
use wrapffi::status::wrap_status_free;

const ECHO_WAT: &str = r#"
(module
  (import "wrap" "__wrap_invoke_args" (func $args (param i32 i32)))
  (import "wrap" "__wrap_invoke_result" (func $result (param i32 i32)))
  (memory (export "memory") 1)
  (func (export "_wrap_invoke") (param i32 i32 i32) (result i32)
    (call $args (i32.const 0) (i32.const 512))
    (call $result (i32.const 512) (local.get 1))
    (i32.const 1))
)
"#;

fn ok(value: Buffer) -> WrapResult {
    WrapResult {
        code: WrapCode::Ok,
        value,
        error: Buffer::empty(),
    }
}

fn fail(message: &str) -> WrapResult {
    WrapResult {
        code: WrapCode::ModuleExecution,
        value: Buffer::empty(),
        error: unsafe { wrap_buffer_new(message.as_ptr(), message.len()) },
    }
}

fn borrowed(bytes: &[u8]) -> Buffer {
    Buffer {
        data: bytes.as_ptr().cast_mut(),
        len: bytes.len(),
    }
}

/// Methods: `echo` returns its params, `count` bumps the `AtomicUsize` in
/// `user_data`, anything else fails.
unsafe extern "C" fn echo_plugin(
    method_name: *const c_char,
    params: *const u8,
    params_len: usize,
    _invoker: *const c_void,
    user_data: *mut c_void,
) -> WrapResult {
    let method = unsafe { CStr::from_ptr(method_name) }.to_str().unwrap_or_default();
    match method {
        "echo" => ok(unsafe { wrap_buffer_new(params, params_len) }),
        "count" => {
            let counter = unsafe { &*user_data.cast::<AtomicUsize>() };
            counter.fetch_add(1, Ordering::SeqCst);
            ok(Buffer::empty())
        }
        other => fail(&format!("no method {}", other)),
    }
}

/// Forwards its params to `wrap://ns/echo`.`echo` through the invoker.
unsafe extern "C" fn forwarding_plugin(
    _method_name: *const c_char,
    params: *const u8,
    params_len: usize,
    invoker: *const c_void,
    _user_data: *mut c_void,
) -> WrapResult {
    let args = Buffer {
        data: params.cast_mut(),
        len: params_len,
    };
    unsafe { wrap_invoker_invoke(invoker, c"wrap://ns/echo".as_ptr(), c"echo".as_ptr(), FfiOption::some(args)) }
}

/// Uri resolver extension mapping `wrap://ns/alias` to `wrap://ns/echo`.
unsafe extern "C" fn extension_plugin(
    method_name: *const c_char,
    params: *const u8,
    params_len: usize,
    _invoker: *const c_void,
    _user_data: *mut c_void,
) -> WrapResult {
    let method = unsafe { CStr::from_ptr(method_name) }.to_str().unwrap_or_default();
    if method != "tryResolveUri" {
        return fail("unsupported");
    }
    let params = unsafe { std::slice::from_raw_parts(params, params_len) };
    let args: HashMap<String, String> = match wrappack::from_slice(params) {
        Ok(args) => args,
        Err(e) => return fail(&e.to_string()),
    };
    let reply = if args.get("path").map(String::as_str) == Some("alias") {
        r#"{"uri":"wrap://ns/echo"}"#
    } else {
        "null"
    };
    match wrappack::encode(reply) {
        Ok(bytes) => ok(unsafe { wrap_buffer_new(bytes.as_ptr(), bytes.len()) }),
        Err(e) => fail(&e.to_string()),
    }
}

fn plugin(invoke: wrapffi::plugin::PluginFn) -> FfiPlugin {
    FfiPlugin {
        invoke,
        user_data: ptr::null_mut(),
    }
}

fn check(status: WrapStatus) {
    let code = status.code;
    let message = unsafe { Buffer::as_slice(&status.error) }.to_vec();
    unsafe { wrap_status_free(status) };
    assert_eq!(code, WrapCode::Ok, "{}", String::from_utf8_lossy(&message));
}

fn status_code(status: WrapStatus) -> WrapCode {
    let code = status.code;
    unsafe { wrap_status_free(status) };
    code
}

fn build(builder: *mut BuilderConfig) -> *mut Client {
    let result = unsafe { wrap_build_client(builder) };
    unsafe { wrap_builder_free(builder) };
    assert_eq!(result.code, WrapCode::Ok);
    assert!(!result.client.is_null());
    result.client
}

fn invoke(client: *mut Client, uri: &str, method: &str, args: Option<&[u8]>) -> Result<Vec<u8>, FfiError> {
    let uri = CString::new(uri).unwrap();
    let method = CString::new(method).unwrap();
    let args = match args {
        Some(bytes) => FfiOption::some(borrowed(bytes)),
        None => FfiOption::none(),
    };
    let result = unsafe { wrap_invoke(client, uri.as_ptr(), method.as_ptr(), args, FfiOption::none()) };
    unsafe { result.into_result() }
}

#[test]
fn test_plugin_redirect_and_invoke() {
    let builder = wrap_builder_new();
    unsafe {
        check(wrap_builder_add_plugin_wrapper(builder, c"ns/echo".as_ptr(), plugin(echo_plugin)));
        check(wrap_builder_add_redirect(builder, c"ns/old".as_ptr(), c"ns/echo".as_ptr()));
    }
    let client = build(builder);

    assert_eq!(invoke(client, "wrap://ns/old", "echo", Some(b"abc")).unwrap(), b"abc");
    assert_eq!(invoke(client, "ns/echo", "echo", None).unwrap(), b"");

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_error_codes() {
    let builder = wrap_builder_new();
    unsafe {
        check(wrap_builder_add_plugin_wrapper(builder, c"ns/echo".as_ptr(), plugin(echo_plugin)));
    }
    let client = build(builder);

    match invoke(client, "ns/missing", "echo", None) {
        Err(e) => assert_eq!(e.code, WrapCode::UriNotFound),
        v => panic!("Expected UriNotFound, got {:?}", v),
    }
    match invoke(client, "ns/echo", "explode", None) {
        Err(e) => {
            assert_eq!(e.code, WrapCode::ModuleExecution);
            assert!(e.message.contains("no method explode"), "{}", e.message);
        }
        v => panic!("Expected ModuleExecution, got {:?}", v),
    }
    match invoke(client, "wrap://", "echo", None) {
        Err(e) => assert_eq!(e.code, WrapCode::InvalidUri),
        v => panic!("Expected InvalidUri, got {:?}", v),
    }

    let result = unsafe { wrap_invoke(client, c"ns/echo".as_ptr(), ptr::null(), FfiOption::none(), FfiOption::none()) };
    match unsafe { result.into_result() } {
        Err(e) => assert_eq!(e.code, WrapCode::InvalidInput),
        v => panic!("Expected InvalidInput, got {:?}", v),
    }

    let result = unsafe { wrap_invoke(ptr::null(), c"ns/echo".as_ptr(), c"echo".as_ptr(), FfiOption::none(), FfiOption::none()) };
    assert_eq!(result.code, WrapCode::InvalidInput);
    drop(unsafe { result.into_result() });

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_builder_rejects_bad_input() {
    let builder = wrap_builder_new();
    unsafe {
        assert_eq!(
            status_code(wrap_builder_add_redirect(builder, c"".as_ptr(), c"ns/b".as_ptr())),
            WrapCode::InvalidUri
        );
        assert_eq!(
            status_code(wrap_builder_add_wasm_wrapper(builder, c"ns/bad".as_ptr(), borrowed(b"\0asm nope"))),
            WrapCode::LoadError
        );
        assert_eq!(
            status_code(wrap_builder_remove_env(ptr::null_mut(), c"ns/a".as_ptr())),
            WrapCode::InvalidInput
        );
        check(wrap_builder_add_redirect(builder, c"ns/loop".as_ptr(), c"ns/loop".as_ptr()));
    }

    let result = unsafe { wrap_build_client(builder) };
    assert_eq!(result.code, WrapCode::ConfigError);
    assert!(result.client.is_null());
    unsafe {
        wrapffi::buffer::wrap_buffer_free(result.error);
        wrap_builder_free(builder);
    }
}

#[test]
fn test_wasm_wrapper_and_package() {
    let builder = wrap_builder_new();
    unsafe {
        check(wrap_builder_add_wasm_wrapper(builder, c"ns/wasm".as_ptr(), borrowed(ECHO_WAT.as_bytes())));
        check(wrap_builder_add_wasm_package(builder, c"ns/lazy".as_ptr(), borrowed(ECHO_WAT.as_bytes())));
    }
    let client = build(builder);

    let args = {
        let result = unsafe { wrap_encode(c"{\"n\":5}".as_ptr()) };
        unsafe { result.into_result() }.unwrap()
    };
    assert_eq!(invoke(client, "ns/wasm", "anything", Some(&args)).unwrap(), args);
    assert_eq!(invoke(client, "ns/lazy", "anything", Some(&args)).unwrap(), args);

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_nested_invoke_through_invoker() {
    let builder = wrap_builder_new();
    unsafe {
        check(wrap_builder_add_plugin_wrapper(builder, c"ns/echo".as_ptr(), plugin(echo_plugin)));
        check(wrap_builder_add_plugin_wrapper(builder, c"ns/forward".as_ptr(), plugin(forwarding_plugin)));
    }
    let client = build(builder);

    assert_eq!(invoke(client, "ns/forward", "go", Some(b"xyz")).unwrap(), b"xyz");

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_static_resolver_handle() {
    let echo = plugin(echo_plugin);
    let entries = [
        StaticEntry {
            uri: c"ns/a".as_ptr(),
            kind: EntryKind::Redirect,
            data: c"ns/b".as_ptr().cast(),
        },
        StaticEntry {
            uri: c"ns/b".as_ptr(),
            kind: EntryKind::PluginWrapper,
            data: (&echo as *const FfiPlugin).cast(),
        },
    ];

    let created = unsafe { wrap_create_static_resolver(entries.as_ptr(), entries.len()) };
    assert_eq!(created.code, WrapCode::Ok);

    let builder = wrap_builder_new();
    unsafe { check(wrap_builder_add_resolver(builder, created.resolver)) };
    let client = build(builder);

    assert_eq!(invoke(client, "ns/a", "echo", Some(b"hi")).unwrap(), b"hi");

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_static_resolver_rejects_bad_entry() {
    let entries = [StaticEntry {
        uri: c"not a uri".as_ptr(),
        kind: EntryKind::Redirect,
        data: c"ns/b".as_ptr().cast(),
    }];

    let created = unsafe { wrap_create_static_resolver(entries.as_ptr(), entries.len()) };
    assert_eq!(created.code, WrapCode::InvalidUri);
    assert!(created.resolver.is_null());
    unsafe { wrapffi::buffer::wrap_buffer_free(created.error) };
}

#[test]
fn test_plugin_package_loads_once() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    let counting = FfiPlugin {
        invoke: echo_plugin,
        user_data: (&CALLS as *const AtomicUsize).cast_mut().cast(),
    };

    let builder = wrap_builder_new();
    unsafe { check(wrap_builder_add_plugin_package(builder, c"ns/pkg".as_ptr(), counting)) };
    let client = build(builder);

    for _ in 0..3 {
        invoke(client, "ns/pkg", "count", None).unwrap();
    }
    assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    assert_eq!(unsafe { &*client }.cache().len(), 1);

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_extendable_resolver() {
    let extendable = wrap_create_extendable_resolver();
    assert_eq!(extendable.code, WrapCode::Ok);

    let interface = CString::new(URI_RESOLVER_INTERFACE).unwrap();
    let builder = wrap_builder_new();
    unsafe {
        check(wrap_builder_add_plugin_wrapper(builder, c"ns/echo".as_ptr(), plugin(echo_plugin)));
        check(wrap_builder_add_plugin_wrapper(builder, c"ns/ext".as_ptr(), plugin(extension_plugin)));
        check(wrap_builder_add_interface_implementation(builder, interface.as_ptr(), c"ns/ext".as_ptr()));
        check(wrap_builder_add_resolver(builder, extendable.resolver));
    }
    let client = build(builder);

    assert_eq!(invoke(client, "ns/alias", "echo", Some(b"via ext")).unwrap(), b"via ext");
    match invoke(client, "ns/other", "echo", None) {
        Err(e) => assert_eq!(e.code, WrapCode::UriNotFound),
        v => panic!("Expected UriNotFound, got {:?}", v),
    }

    unsafe { wrap_client_free(client) };
}

#[test]
fn test_encode_decode() {
    let encoded = unsafe { wrap_encode(c"{\"a\":1}".as_ptr()).into_result() }.unwrap();
    assert_eq!(encoded, [0x81, 0xa1, b'a', 0x01]);

    let decoded = unsafe { wrap_decode(borrowed(&encoded)).into_result() }.unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), r#"{"a":1}"#);

    match unsafe { wrap_encode(c"{not json".as_ptr()).into_result() } {
        Err(e) => assert_eq!(e.code, WrapCode::Codec),
        v => panic!("Expected Codec, got {:?}", v),
    }
}

#[test]
fn test_init_logging_once() {
    let first = unsafe { wrap_init_logging(c"wrapcore=debug".as_ptr()) };
    assert_eq!(status_code(first), WrapCode::Ok);

    let second = unsafe { wrap_init_logging(ptr::null()) };
    assert_eq!(status_code(second), WrapCode::ConfigError);
}
