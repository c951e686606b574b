use wrapcore::error::Error;

use crate::imports::SUPPORTED;
use crate::imports::signature;
use crate::state::Outcome;
use crate::wrapper::ENTRY;
use crate::wrapper::WasmWrapper;

#[test]
fn test_outcome_keeps_one_side() {
    let mut outcome = Outcome::default();
    assert!(outcome.set(Ok(vec![1])));
    assert_eq!(outcome.result.as_deref(), Some(&[1][..]));
    assert!(outcome.error.is_none());

    assert!(!outcome.set(Err(Error::execution("nope"))));
    assert!(outcome.result.is_none());
    assert_eq!(outcome.error.as_deref(), Some("Module execution failed: nope"));
}

#[test]
fn test_supported_imports_are_unique() {
    let mut names: Vec<_> = SUPPORTED.iter().map(|(name, _, _)| *name).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), SUPPORTED.len());
    assert!(names.iter().all(|name| name.starts_with("__wrap_")));

    assert_eq!(signature("__wrap_subinvokeImplementation"), Some((8, 1)));
    assert_eq!(signature("__wrap_load_env"), Some((1, 0)));
    assert_eq!(signature("fd_write"), None);
}

#[test]
fn test_entry_signature_is_checked() {
    let engine = crate::package::default_engine();
    let wrong = r#"(module
        (memory (export "memory") 1)
        (func (export "_wrap_invoke") (param i32) (result i32) (i32.const 1)))"#;

    match WasmWrapper::new(&engine, wrong.as_bytes()) {
        Err(Error::Load { message, .. }) => assert!(message.contains(ENTRY), "{}", message),
        Err(e) => panic!("Expected Load, got {:?}", e),
        Ok(_) => panic!("Expected Load, got a wrapper"),
    }
}

#[test]
fn test_import_signature_is_checked() {
    let engine = crate::package::default_engine();
    let wrong = r#"(module
        (import "wrap" "__wrap_invoke_args" (func (param i32)))
        (memory (export "memory") 1)
        (func (export "_wrap_invoke") (param i32 i32 i32) (result i32) (i32.const 1)))"#;

    match WasmWrapper::new(&engine, wrong.as_bytes()) {
        Err(Error::Load { message, .. }) => {
            assert!(message.contains("wrap.__wrap_invoke_args"), "{}", message)
        }
        Err(e) => panic!("Expected Load, got {:?}", e),
        Ok(_) => panic!("Expected Load, got a wrapper"),
    }

    let float = r#"(module
        (import "wrap" "__wrap_subinvoke_result_len" (func (result f32)))
        (memory (export "memory") 1)
        (func (export "_wrap_invoke") (param i32 i32 i32) (result i32) (i32.const 1)))"#;
    assert!(matches!(WasmWrapper::new(&engine, float.as_bytes()), Err(Error::Load { .. })));
}
