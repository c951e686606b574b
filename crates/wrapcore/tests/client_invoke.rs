//! End-to-end tests for Client resolution and invocation with plugin modules.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wrapcore::builder::BuilderConfig;
use wrapcore::client::Client;
use wrapcore::error::Error;
use wrapcore::error::ErrorKind;
use wrapcore::error::Result;
use wrapcore::invoker::Invoker;
use wrapcore::plugin::MethodTable;
use wrapcore::plugin::PluginPackage;
use wrapcore::plugin::PluginWrapper;
use wrapcore::resolver::ExtendableResolver;
use wrapcore::resolver::URI_RESOLVER_INTERFACE;
use wrapcore::uri::Uri;
use wrapcore::wrapper::Package;
use wrapcore::wrapper::Wrapper;

fn uri(s: &str) -> Uri {
    Uri::parse(s).unwrap_or_else(|e| panic!("bad test uri {}: {}", s, e))
}

#[derive(Debug, Serialize, Deserialize)]
struct AddArgs {
    a: i64,
    b: i64,
}

fn math() -> MethodTable {
    MethodTable::new()
        .typed("add", |args: AddArgs, _| Ok(args.a + args.b))
        .method("run", |args, _, _| {
            let mut out = b"ran:".to_vec();
            out.extend_from_slice(args);
            Ok(out)
        })
        .method("env", |_, env, _| Ok(env.map(<[u8]>::to_vec).unwrap_or_default()))
        .method("fail", |_, _, _| Err(Error::execution("division by zero")))
}

fn math_wrapper() -> Arc<dyn Wrapper> {
    Arc::new(PluginWrapper::new(math()))
}

fn build(builder: &BuilderConfig) -> Client {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Client::new(builder.build().expect("config should build"))
}

#[test]
fn test_redirect_old_to_new() {
    let mut builder = BuilderConfig::new();
    builder
        .add_redirect(uri("wrap://ns/old"), uri("wrap://ns/new"))
        .add_wrapper(uri("wrap://ns/new"), math_wrapper());
    let client = build(&builder);

    let via_old = client.invoke(&uri("wrap://ns/old"), "run", Some(b"xyz"), None).unwrap();
    let via_new = client.invoke(&uri("wrap://ns/new"), "run", Some(b"xyz"), None).unwrap();
    assert_eq!(via_old, via_new);
    assert_eq!(via_old, b"ran:xyz");
}

#[test]
fn test_resolve_visits_redirect_path() {
    let mut builder = BuilderConfig::new();
    builder
        .add_redirect(uri("ns/a"), uri("ns/b"))
        .add_redirect(uri("ns/b"), uri("ns/c"))
        .add_wrapper(uri("ns/c"), math_wrapper());
    let client = build(&builder);

    let resolution = client.resolve(&uri("ns/a")).unwrap();
    assert_eq!(resolution.uri, uri("ns/c"));
    assert_eq!(resolution.history, [uri("ns/a"), uri("ns/b"), uri("ns/c")]);
}

#[test]
fn test_circular_redirect_through_resolvers() {
    let mut builder = BuilderConfig::new();
    builder
        .add_redirect_resolver(uri("ns/a"), uri("ns/b"))
        .add_redirect_resolver(uri("ns/b"), uri("ns/a"));
    let client = build(&builder);

    match client.invoke(&uri("ns/a"), "run", None, None) {
        Err(Error::CircularRedirect { .. }) => {}
        v => panic!("Expected CircularRedirect, got {:?}", v),
    }
}

#[test]
fn test_unregistered_uri_not_found() {
    let client = build(&BuilderConfig::new());

    match client.invoke(&uri("ns/nowhere"), "run", None, None) {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::UriNotFound);
            assert!(e.to_string().contains("wrap://ns/nowhere"));
        }
        Ok(bytes) => panic!("Expected UriNotFound, got {} bytes", bytes.len()),
    }
}

#[test]
fn test_module_error_is_attributed() {
    let mut builder = BuilderConfig::new();
    builder.add_wrapper(uri("ns/math"), math_wrapper());
    let client = build(&builder);

    match client.invoke(&uri("ns/math"), "fail", None, None) {
        Err(Error::ModuleExecution {
            uri: Some(at),
            method: Some(method),
            message,
        }) => {
            assert_eq!(at, uri("ns/math"));
            assert_eq!(method, "fail");
            assert_eq!(message, "division by zero");
        }
        v => panic!("Expected ModuleExecution, got {:?}", v),
    }

    match client.invoke(&uri("ns/math"), "missing", None, None) {
        Err(Error::ModuleExecution { message, .. }) => assert!(message.contains("missing")),
        v => panic!("Expected ModuleExecution, got {:?}", v),
    }
}

#[test]
fn test_invoke_typed() {
    let mut builder = BuilderConfig::new();
    builder.add_package(uri("ns/math"), Arc::new(PluginPackage::new(math())));
    let client = build(&builder);

    let sum: i64 = client
        .invoke_typed(&uri("ns/math"), "add", &AddArgs { a: 2, b: 40 }, None)
        .unwrap();
    assert_eq!(sum, 42);
}

#[test]
fn test_env_lookup() {
    let env = wrappack::encode(r#"{"key":"value"}"#).unwrap();
    let mut builder = BuilderConfig::new();
    builder
        .add_wrapper(uri("ns/math"), math_wrapper())
        .add_env(uri("ns/math"), env.clone());
    let client = build(&builder);

    assert_eq!(client.invoke(&uri("ns/math"), "env", None, None).unwrap(), env);

    // An explicit env wins over the registered one.
    let explicit = wrappack::encode(r#"{"key":"other"}"#).unwrap();
    assert_eq!(
        client.invoke(&uri("ns/math"), "env", None, Some(&explicit)).unwrap(),
        explicit
    );
}

#[test]
fn test_env_found_along_redirects() {
    let env = wrappack::encode(r#"{"from":"alias"}"#).unwrap();
    let mut builder = BuilderConfig::new();
    builder
        .add_redirect(uri("ns/alias"), uri("ns/math"))
        .add_wrapper(uri("ns/math"), math_wrapper())
        .add_env(uri("ns/alias"), env.clone());
    let client = build(&builder);

    assert_eq!(client.invoke(&uri("ns/alias"), "env", None, None).unwrap(), env);
    // No env is registered on the path from ns/math itself.
    assert!(client.invoke(&uri("ns/math"), "env", None, None).unwrap().is_empty());
}

#[test]
fn test_plugin_subinvokes_through_invoker() {
    let env = wrappack::encode(r#"{"scale":10}"#).unwrap();
    let caller = MethodTable::new().method("double_env", |_, _, invoker: Arc<dyn Invoker>| {
        let bytes = invoker.invoke(&uri("ns/math"), "env", None, None)?;
        let mut doubled = bytes.clone();
        doubled.extend_from_slice(&bytes);
        Ok(doubled)
    });

    let mut builder = BuilderConfig::new();
    builder
        .add_wrapper(uri("ns/math"), math_wrapper())
        .add_env(uri("ns/math"), env.clone())
        .add_wrapper(uri("ns/caller"), Arc::new(PluginWrapper::new(caller)));
    let client = build(&builder);

    let result = client.invoke(&uri("ns/caller"), "double_env", None, None).unwrap();
    assert_eq!(result, [env.clone(), env].concat());
}

#[test]
fn test_reentrant_invoke_rejected() {
    let looping = MethodTable::new().method("loop", |_, _, invoker: Arc<dyn Invoker>| {
        invoker.invoke(&uri("ns/alias"), "loop", None, None)
    });

    let mut builder = BuilderConfig::new();
    builder
        .add_redirect(uri("ns/alias"), uri("ns/loop"))
        .add_wrapper(uri("ns/loop"), Arc::new(PluginWrapper::new(looping)));
    let client = build(&builder);

    match client.invoke(&uri("ns/loop"), "loop", None, None) {
        Err(Error::ReentrantInvoke { uri: at, stack }) => {
            assert_eq!(at, uri("ns/loop"));
            assert_eq!(stack, [uri("ns/loop")]);
        }
        v => panic!("Expected ReentrantInvoke, got {:?}", v),
    }
}

#[test]
fn test_implementations_visible_to_modules() {
    let lister = MethodTable::new().method("list", |_, _, invoker: Arc<dyn Invoker>| {
        let impls = invoker.implementations(&uri("ns/iface"));
        Ok(wrappack::to_vec(&impls)?)
    });

    let mut builder = BuilderConfig::new();
    builder
        .add_interface_implementations(uri("ns/iface"), [uri("ns/one"), uri("ns/two")])
        .add_wrapper(uri("ns/lister"), Arc::new(PluginWrapper::new(lister)));
    let client = build(&builder);

    let bytes = client.invoke(&uri("ns/lister"), "list", None, None).unwrap();
    let impls: Vec<Uri> = wrappack::from_slice(&bytes).unwrap();
    assert_eq!(impls, [uri("ns/one"), uri("ns/two")]);
}

#[test]
fn test_package_loaded_once_across_invokes() {
    let mut builder = BuilderConfig::new();
    builder.add_package(uri("ns/math"), Arc::new(PluginPackage::new(math())));
    let client = build(&builder);

    assert!(client.cache().is_empty());
    client.invoke(&uri("ns/math"), "run", None, None).unwrap();
    client.invoke(&uri("ns/math"), "run", None, None).unwrap();
    assert_eq!(client.cache().len(), 1);
    assert!(client.cache().contains(&uri("ns/math")));
}

/// Package that sleeps while loading so concurrent callers overlap.
struct SlowPackage {
    loads: AtomicUsize,
}

impl Package for SlowPackage {
    fn create_wrapper(&self) -> Result<Arc<dyn Wrapper>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(50));
        Ok(math_wrapper())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_invokes_instantiate_once() {
    let package = Arc::new(SlowPackage {
        loads: AtomicUsize::new(0),
    });
    let mut builder = BuilderConfig::new();
    builder
        .add_redirect(uri("ns/alias"), uri("ns/slow"))
        .add_package(uri("ns/slow"), package.clone());
    let client = build(&builder);

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let client = client.clone();
        let target = if i % 2 == 0 { "ns/slow" } else { "ns/alias" };
        handles.push(tokio::task::spawn_blocking(move || {
            client.invoke(&uri(target), "run", Some(&[7]), None)
        }));
    }

    for handle in handles {
        let result = handle.await.expect("task panicked").expect("invoke failed");
        assert_eq!(result, b"ran:\x07");
    }
    assert_eq!(package.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_extendable_resolver_redirects_via_extension() {
    #[derive(Deserialize)]
    struct TryResolveArgs {
        authority: String,
        path: String,
    }

    #[derive(Serialize)]
    struct Reply {
        uri: Option<String>,
    }

    let extension = MethodTable::new().typed("tryResolveUri", |args: TryResolveArgs, _| {
        if args.authority != "custom" {
            return Ok(None);
        }
        Ok(Some(Reply {
            uri: Some(format!("wrap://ns/{}", args.path)),
        }))
    });

    let mut builder = BuilderConfig::new();
    builder
        .add_wrapper(uri("ns/math"), math_wrapper())
        .add_wrapper(uri("ns/ext"), Arc::new(PluginWrapper::new(extension)))
        .add_interface_implementation(uri(URI_RESOLVER_INTERFACE), uri("ns/ext"))
        .add_generic_resolver(Arc::new(ExtendableResolver::new().unwrap()));
    let client = build(&builder);

    let resolution = client.resolve(&uri("custom/math")).unwrap();
    assert_eq!(resolution.history, [uri("custom/math"), uri("ns/math")]);
    assert_eq!(
        client.invoke(&uri("custom/math"), "run", Some(b"!"), None).unwrap(),
        b"ran:!"
    );

    match client.invoke(&uri("other/math"), "run", None, None) {
        Err(Error::UriNotFound { .. }) => {}
        v => panic!("Expected UriNotFound, got {:?}", v),
    }
}

#[test]
fn test_extendable_resolver_loads_module() {
    #[derive(Serialize)]
    struct Reply {
        #[serde(with = "serde_bytes")]
        manifest: Vec<u8>,
    }

    let lookups = Arc::new(AtomicUsize::new(0));
    let fetches = Arc::new(AtomicUsize::new(0));
    let (lookup_count, fetch_count) = (lookups.clone(), fetches.clone());
    let extension = MethodTable::new()
        .typed("tryResolveUri", move |_: serde_json::Value, _| {
            lookup_count.fetch_add(1, Ordering::SeqCst);
            Ok(Reply {
                manifest: b"manifest".to_vec(),
            })
        })
        .method("getFile", move |_, _, _| {
            fetch_count.fetch_add(1, Ordering::SeqCst);
            Ok(wrappack::to_vec(&serde_bytes::Bytes::new(b"module"))?)
        });

    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = loaded.clone();
    let resolver = ExtendableResolver::new().unwrap().with_loader(Arc::new(move |bytes: Vec<u8>| -> Result<Arc<dyn Package>> {
        assert_eq!(bytes, b"module");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PluginPackage::new(math())) as Arc<dyn Package>)
    }));

    let mut builder = BuilderConfig::new();
    builder
        .add_wrapper(uri("ns/ext"), Arc::new(PluginWrapper::new(extension)))
        .add_interface_implementation(uri(URI_RESOLVER_INTERFACE), uri("ns/ext"))
        .add_generic_resolver(Arc::new(resolver));
    let client = build(&builder);

    for _ in 0..3 {
        let sum: i64 = client
            .invoke_typed(&uri("ipfs/module"), "add", &AddArgs { a: 1, b: 2 }, None)
            .unwrap();
        assert_eq!(sum, 3);
    }

    // later invokes are served from the load cache without asking the extension
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(loaded.load(Ordering::SeqCst), 1);
}

#[test]
fn test_extendable_resolver_without_loader_fails_load() {
    #[derive(Serialize)]
    struct Reply {
        #[serde(with = "serde_bytes")]
        manifest: Vec<u8>,
    }

    let extension = MethodTable::new().typed("tryResolveUri", |_: serde_json::Value, _| {
        Ok(Reply {
            manifest: vec![1],
        })
    });

    let mut builder = BuilderConfig::new();
    builder
        .add_wrapper(uri("ns/ext"), Arc::new(PluginWrapper::new(extension)))
        .add_interface_implementation(uri(URI_RESOLVER_INTERFACE), uri("ns/ext"))
        .add_generic_resolver(Arc::new(ExtendableResolver::new().unwrap()));
    let client = build(&builder);

    match client.invoke(&uri("ipfs/module"), "run", None, None) {
        Err(Error::Load { uri: at, .. }) => assert_eq!(at, Some(uri("ipfs/module"))),
        v => panic!("Expected Load error, got {:?}", v),
    }
}
