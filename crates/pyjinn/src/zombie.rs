//! Exit lifecycle (§4.12): `exit(status)` unwinds like any other exception so
//! `finally` blocks still run, then — once it reaches the top of the script —
//! [`run_exit_lifecycle`] runs script-registered `__atexit_register__`
//! callbacks in reverse order and marks the script halted. Any bound
//! function/lambda called afterward is caught by
//! [`crate::runtime::Runtime::call_bound`]'s generation check, which notifies
//! [`crate::host::ZombieCallbackHandler`] and returns `None` instead of
//! re-running script code.
//!
//! Host-registered exit listeners are plain Rust callbacks owned by
//! `crate::script::Script`, not `Value`s, so running them in reverse order is
//! that file's job once `run_exit_lifecycle` returns.

use crate::exception::RunResult;
use crate::runtime::Runtime;
use crate::value::{py_eq, Value};

/// `__atexit_register__(callback)`: records a callback to run on `exit()`.
pub fn register(rt: &mut Runtime, callback: Value) {
    rt.atexit_callbacks.push(callback);
}

/// `__atexit_unregister__(callback)`: removes the first registration that
/// compares equal by identity, mirroring how `list.remove` finds its target.
pub fn unregister(rt: &mut Runtime, callback: Value) {
    if let Some(pos) = rt.atexit_callbacks.iter().position(|c| py_eq(rt.heap, *c, callback)) {
        rt.atexit_callbacks.remove(pos);
    }
}

/// Runs registered exit callbacks in reverse order and marks the script
/// halted, bumping the generation counter so any closure captured before this
/// point becomes a zombie (§4.12). Called once the `SystemExit` raised by
/// `exit()` has unwound all the way past every `finally` block.
pub fn run_exit_lifecycle(rt: &mut Runtime) -> RunResult<()> {
    let callbacks: Vec<Value> = rt.atexit_callbacks.drain(..).rev().collect();
    for callback in callbacks {
        rt.call_value(callback, &[], &indexmap::IndexMap::new())?;
    }
    *rt.halted = true;
    rt.generation.bump();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Generation;
    use crate::heap::Heap;
    use crate::host::{
        HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle, IoHost,
        ZombieCallbackHandler,
    };
    use crate::intern::{Interns, SymbolCache};
    use crate::namespace::Contexts;
    use crate::proxy::ProxyTable;

    struct NoHost;
    impl HostReflectionProvider for NoHost {
        fn constructors(&self, _: &HostTypeHandle) -> Vec<HostExecutable> {
            Vec::new()
        }
        fn methods(&self, _: &HostTypeHandle, _: &str) -> Vec<HostExecutable> {
            Vec::new()
        }
        fn fields(&self, _: &HostTypeHandle) -> Vec<HostField> {
            Vec::new()
        }
        fn nested_types(&self, _: &HostTypeHandle) -> Vec<HostTypeHandle> {
            Vec::new()
        }
        fn superclass(&self, _: &HostTypeHandle) -> Option<HostTypeHandle> {
            None
        }
        fn superinterfaces(&self, _: &HostTypeHandle) -> Vec<HostTypeHandle> {
            Vec::new()
        }
        fn pretty_field_to_runtime(&self, _: &HostTypeHandle, _: &str) -> Option<String> {
            None
        }
        fn functional_interface_method(&self, _: &HostTypeHandle) -> Option<String> {
            None
        }
        fn abstract_methods(&self, _: &HostTypeHandle) -> Vec<String> {
            Vec::new()
        }
        fn is_assignable(&self, _: &HostTypeHandle, _: &HostTypeHandle) -> bool {
            false
        }
    }
    impl HostClassLoader for NoHost {
        fn load_class(&self, pretty_name: &str) -> RunResult<HostTypeHandle> {
            Ok(HostTypeHandle { runtime_name: pretty_name.to_owned(), pretty_name: pretty_name.to_owned() })
        }
    }
    impl HostInvoker for NoHost {
        fn invoke_constructor(&self, _: &HostExecutable, _: &[Value]) -> RunResult<Value> {
            unreachable!()
        }
        fn invoke_method(&self, _: &HostExecutable, _: &Value, _: &[Value]) -> RunResult<Value> {
            unreachable!()
        }
        fn get_field(&self, _: &HostField, _: Option<&Value>) -> RunResult<Value> {
            unreachable!()
        }
        fn set_field(&self, _: &HostField, _: Option<&Value>, _: Value) -> RunResult<()> {
            unreachable!()
        }
        fn describe_value(&self, _: &Value) -> String {
            String::new()
        }
    }
    impl IoHost for NoHost {
        fn write_stdout(&mut self, _: &str) {}
        fn write_stderr(&mut self, _: &str) {}
        fn read_module(&self, _: &str) -> RunResult<String> {
            unreachable!()
        }
        fn resolve_module(&self, _: &str) -> RunResult<String> {
            unreachable!()
        }
        fn process_exit(&mut self, _: i32) {}
    }
    impl ZombieCallbackHandler for NoHost {
        fn on_zombie_call(&self, _: &str, _: &str, _: u64) {}
    }

    #[test]
    fn exit_lifecycle_runs_callbacks_in_reverse_and_halts() {
        let mut heap = Heap::new();
        let mut contexts = Contexts::new();
        let mut interns = Interns::new();
        let host = HostEnv {
            reflection: std::sync::Arc::new(NoHost),
            class_loader: std::sync::Arc::new(NoHost),
            invoker: std::sync::Arc::new(NoHost),
            zombie: std::sync::Arc::new(NoHost),
        };
        let mut proxies = ProxyTable::new();
        let symbols = SymbolCache::new();
        let generation = Generation::default();
        let mut halted = false;
        let mut io = NoHost;
        let mut modules = indexmap::IndexMap::new();
        let mut atexit_callbacks = Vec::new();
        let mut zombie_calls = 0u64;
        let mut rt = Runtime {
            heap: &mut heap,
            contexts: &mut contexts,
            interns: &mut interns,
            host: &host,
            proxies: &mut proxies,
            symbols: &symbols,
            generation: &generation,
            halted: &mut halted,
            io: &mut io,
            modules: &mut modules,
            atexit_callbacks: &mut atexit_callbacks,
            zombie_calls: &mut zombie_calls,
        };

        // Two exception-class callbacks double as harmless no-arg "callables"
        // whose construction we can tell apart without a real script function.
        let first = Value::ExceptionClass(crate::exception::ExcType::ValueError);
        let second = Value::ExceptionClass(crate::exception::ExcType::TypeError);
        register(&mut rt, first);
        register(&mut rt, second);
        run_exit_lifecycle(&mut rt).unwrap();
        assert!(*rt.halted);
        assert!(rt.atexit_callbacks.is_empty());
        assert_eq!(rt.generation.current(), 1);
    }
}
