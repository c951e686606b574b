//! # Wasm Wrapper
//!
//! A compiled wrap module. Compilation, import validation and host linking
//! happen once, in `from_module`; each `invoke` instantiates the module into a
//! fresh store, runs `_wrap_invoke` and collects whatever the module reported.
//!
//! An imported `env.memory` belongs to a store, so it is defined on a copy of
//! the shared linker per invoke.

use std::sync::Arc;

use wasmtime::Engine;
use wasmtime::ExternType;
use wasmtime::FuncType;
use wasmtime::Linker;
use wasmtime::Memory;
use wasmtime::MemoryType;
use wasmtime::Module;
use wasmtime::Store;
use wasmtime::ValType;
use wrapcore::error::Error;
use wrapcore::error::Result;
use wrapcore::invoker::Invoker;
use wrapcore::wrapper::Wrapper;

use crate::imports;
use crate::state::WrapState;

pub const ENTRY: &str = "_wrap_invoke";

#[derive(Clone)]
pub struct WasmWrapper {
    module: Module,
    /// Host imports, without `env.memory`.
    linker: Linker<WrapState>,
    /// Type of the imported `env.memory`; `None` when the module exports its own.
    memory: Option<MemoryType>,
}

impl WasmWrapper {
    /// Compiles `bytes` (binary wasm, or WAT when wasmtime has the `wat` feature).
    pub fn new(engine: &Engine, bytes: &[u8]) -> Result<Self> {
        let module = Module::new(engine, bytes)
            .map_err(|e| Error::load(format!("failed to compile module: {}", e)))?;
        Self::from_module(module)
    }

    pub fn from_module(module: Module) -> Result<Self> {
        check_entry(&module)?;

        let mut memory = None;
        for import in module.imports() {
            match (import.module(), import.name(), import.ty()) {
                ("env", "memory", ExternType::Memory(ty)) => memory = Some(ty),
                (imports::NAMESPACE, name, ExternType::Func(ty)) => check_import(name, &ty)?,
                (namespace, name, _) => {
                    return Err(Error::load(format!("unsupported import {}.{}", namespace, name)));
                }
            }
        }

        if memory.is_none() && !matches!(module.get_export("memory"), Some(ExternType::Memory(_))) {
            return Err(Error::load("module neither imports env.memory nor exports memory"));
        }

        let mut linker = Linker::new(module.engine());
        imports::link(&mut linker).map_err(|e| Error::load(format!("failed to link host imports: {}", e)))?;

        Ok(Self {
            module,
            linker,
            memory,
        })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn instantiate(&self, state: WrapState) -> wasmtime::Result<(Store<WrapState>, wasmtime::Instance)> {
        let mut store = Store::new(self.module.engine(), state);

        let instance = match &self.memory {
            Some(ty) => {
                let memory = Memory::new(&mut store, ty.clone())?;
                store.data_mut().memory = Some(memory);
                let mut linker = self.linker.clone();
                linker.define(&store, "env", "memory", memory)?;
                linker.instantiate(&mut store, &self.module)?
            }
            None => {
                let instance = self.linker.instantiate(&mut store, &self.module)?;
                store.data_mut().memory = instance.get_memory(&mut store, "memory");
                instance
            }
        };
        Ok((store, instance))
    }
}

fn is_i32_signature(ty: &FuncType, params: usize, results: usize) -> bool {
    ty.params().len() == params
        && ty.results().len() == results
        && ty.params().chain(ty.results()).all(|t| matches!(t, ValType::I32))
}

fn check_entry(module: &Module) -> Result<()> {
    match module.get_export(ENTRY) {
        Some(ExternType::Func(func)) if is_i32_signature(&func, 3, 1) => Ok(()),
        Some(ExternType::Func(_)) => Err(Error::load(format!("{} must have type (i32, i32, i32) -> i32", ENTRY))),
        _ => Err(Error::load(format!("missing function export {}", ENTRY))),
    }
}

fn check_import(name: &str, ty: &FuncType) -> Result<()> {
    let Some((params, results)) = imports::signature(name) else {
        return Err(Error::load(format!("unsupported import {}.{}", imports::NAMESPACE, name)));
    };
    if !is_i32_signature(ty, params, results) {
        return Err(Error::load(format!(
            "import {}.{} must take {} i32 params and return {} i32 results",
            imports::NAMESPACE,
            name,
            params,
            results
        )));
    }
    Ok(())
}

fn len32(what: &str, bytes: &[u8]) -> Result<u32> {
    u32::try_from(bytes.len()).map_err(|_| Error::execution(format!("{} exceeds 4GiB", what)))
}

impl Wrapper for WasmWrapper {
    fn invoke(
        &self,
        method: &str,
        args: &[u8],
        env: Option<&[u8]>,
        invoker: Arc<dyn Invoker>,
    ) -> Result<Vec<u8>> {
        let lens = (
            len32("method", method.as_bytes())?,
            len32("args", args)?,
            len32("env", env.unwrap_or_default())?,
        );

        let state = WrapState::new(method, args, env, invoker);
        let (mut store, instance) = self
            .instantiate(state)
            .map_err(|e| Error::execution(format!("failed to instantiate module: {}", e)))?;
        let entry = instance
            .get_typed_func::<(u32, u32, u32), i32>(&mut store, ENTRY)
            .map_err(|e| Error::execution(e.to_string()))?;

        tracing::trace!(method, args_len = args.len(), "wasm invoke");
        let outcome = entry.call(&mut store, lens);
        let state = store.into_data();

        match outcome {
            Ok(1) => state
                .invoke
                .result
                .ok_or_else(|| Error::execution("module reported success without a result")),
            Ok(_) => Err(Error::execution(
                state
                    .invoke
                    .error
                    .unwrap_or_else(|| "module reported failure without an error".to_string()),
            )),
            Err(trap) => Err(Error::execution(
                state.abort.unwrap_or_else(|| format!("wasm trap: {:#}", trap)),
            )),
        }
    }
}
