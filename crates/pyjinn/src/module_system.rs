//! `import` / `from ... import ...` (§4.9): resolves a dotted module name via
//! the host, loads and evaluates it at most once per script run, and exposes
//! its globals to script code through attribute chains and star-imports.
//!
//! Evaluator-only (§4.2): the compiler statically rejects `Import`/
//! `ImportFrom` and compiles them down to `EvalImport`, so this module is
//! reached only through [`crate::evaluator::exec_statement`].

use indexmap::IndexMap;

use crate::ast::loader::{Loader, NoopObserver};
use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::HeapData;
use crate::intern::StringId;
use crate::namespace::{Context, ContextId};
use crate::runtime::Runtime;
use crate::value::Value;

/// `import foo.bar.baz` / `import foo.bar.baz as qux` for each entry in
/// `names` (a module statement can name several comma-separated imports).
pub fn exec_import(names: &[(String, Option<StringId>)], ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    for (dotted, alias) in names {
        let module_ctx = load_module(dotted, rt)?;
        match alias {
            Some(alias_name) => {
                let leaf = rt.heap.alloc(HeapData::Module { context: module_ctx });
                rt.contexts.write_name(ctx, *alias_name, Value::Module(leaf));
            }
            None => {
                let top = dotted.split('.').next().unwrap_or(dotted.as_str());
                let top_id = rt.interns.intern(top);
                let chain = namespace_chain(dotted, module_ctx, rt);
                rt.contexts.write_name(ctx, top_id, chain);
            }
        }
    }
    Ok(())
}

/// `from foo import a, b as c` / `from foo import *`.
pub fn exec_import_from(module: &str, names: &[(String, Option<StringId>)], is_star: bool, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    let module_ctx = load_module(module, rt)?;
    if is_star {
        for name in rt.contexts.get(module_ctx).local_names() {
            let text = rt.interns.resolve(name);
            if text.starts_with("__") && text.ends_with("__") {
                continue;
            }
            if let Some(value) = rt.contexts.read_name(module_ctx, name) {
                rt.contexts.write_name(ctx, name, value);
            }
        }
        return Ok(());
    }
    for (name, alias) in names {
        let sid = rt.interns.intern(name);
        let value = rt.contexts.read_name(module_ctx, sid).ok_or_else(|| {
            RunError::simple(ExcType::ImportError, format!("cannot import name '{name}' from '{module}'"))
        })?;
        let target = alias.unwrap_or(sid);
        rt.contexts.write_name(ctx, target, value);
    }
    Ok(())
}

/// Resolves, once-loads, and evaluates a dotted module name, returning the
/// `ContextId` holding its globals (§4.9 "once-only loading").
fn load_module(dotted: &str, rt: &mut Runtime) -> RunResult<ContextId> {
    let canonical = rt.io.resolve_module(dotted)?;
    if let Some(&ctx) = rt.modules.get(&canonical) {
        return Ok(ctx);
    }
    let source = rt.io.read_module(&canonical)?;
    let json: serde_json::Value =
        serde_json::from_str(&source).map_err(|e| RunError::simple(ExcType::ParseError, format!("{canonical}: {e}")))?;
    let module_ast = {
        let mut observer = NoopObserver;
        let mut loader = Loader::new(rt.interns, &canonical, &mut observer);
        loader.load_module(&json)?
    };
    let module_ctx = rt.contexts.push(Context::new_global());
    rt.contexts.get_mut(module_ctx).global = module_ctx;
    // Insert before executing the body so a cyclic import sees a (partially
    // populated) module instead of recursing forever.
    rt.modules.insert(canonical, module_ctx);
    crate::evaluator::exec_module(&module_ast, module_ctx, rt)?;
    Ok(module_ctx)
}

/// Wraps a loaded module's globals into the chain of synthetic namespace
/// objects that `foo.bar.baz.x` traverses (§4.9). A plain `import foo` with
/// no dots returns the module object directly.
fn namespace_chain(dotted: &str, module_ctx: ContextId, rt: &mut Runtime) -> Value {
    let segments: Vec<&str> = dotted.split('.').collect();
    let leaf = rt.heap.alloc(HeapData::Module { context: module_ctx });
    let mut value = Value::Module(leaf);
    for i in (1..segments.len()).rev() {
        let child_name = rt.interns.intern(segments[i]);
        let mut children = IndexMap::new();
        children.insert(child_name, value);
        value = Value::Namespace(rt.heap.alloc(HeapData::Namespace(children)));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Generation;
    use crate::heap::Heap;
    use crate::host::{HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle, IoHost};
    use crate::intern::{Interns, SymbolCache};
    use crate::namespace::Contexts;
    use crate::proxy::ProxyTable;

    struct FakeHost {
        source: String,
    }
    impl HostReflectionProvider for FakeHost {
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
    impl HostClassLoader for FakeHost {
        fn load_class(&self, pretty_name: &str) -> RunResult<HostTypeHandle> {
            Ok(HostTypeHandle { runtime_name: pretty_name.to_owned(), pretty_name: pretty_name.to_owned() })
        }
    }
    impl HostInvoker for FakeHost {
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
    impl IoHost for FakeHost {
        fn write_stdout(&mut self, _: &str) {}
        fn write_stderr(&mut self, _: &str) {}
        fn read_module(&self, _: &str) -> RunResult<String> {
            Ok(self.source.clone())
        }
        fn resolve_module(&self, dotted_name: &str) -> RunResult<String> {
            Ok(format!("{dotted_name}.pyjson"))
        }
        fn process_exit(&mut self, _: i32) {}
    }
    impl crate::host::ZombieCallbackHandler for FakeHost {
        fn on_zombie_call(&self, _: &str, _: &str, _: u64) {}
    }

    fn module_json() -> String {
        serde_json::json!({
            "type": "Module",
            "body": [{
                "type": "Assign",
                "lineno": 1,
                "targets": [{"type": "Name", "id": "answer", "lineno": 1}],
                "value": {"type": "Constant", "typename": "int", "value": 42, "lineno": 1},
            }],
        })
        .to_string()
    }

    #[test]
    fn import_exposes_module_attribute() {
        let mut heap = Heap::new();
        let mut contexts = Contexts::new();
        let mut interns = Interns::new();
        let host_impl = FakeHost { source: module_json() };
        let host = HostEnv {
            reflection: std::sync::Arc::new(host_impl),
            class_loader: std::sync::Arc::new(FakeHost { source: module_json() }),
            invoker: std::sync::Arc::new(FakeHost { source: module_json() }),
            zombie: std::sync::Arc::new(FakeHost { source: module_json() }),
        };
        let mut proxies = ProxyTable::new();
        let symbols = SymbolCache::new();
        let generation = Generation::default();
        let mut halted = false;
        let mut io = FakeHost { source: module_json() };
        let mut modules = IndexMap::new();
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
        let top = Contexts::global_id();
        let foo = rt.interns.intern("foo");
        exec_import(&[("foo".to_owned(), None)], top, &mut rt).unwrap();
        let foo_value = rt.contexts.read_name(top, foo).unwrap();
        let answer = rt.get_attr(foo_value, "answer").unwrap();
        assert!(matches!(answer, Value::Num(n) if n.as_i64() == 42));

        // Second import of the same module must hit the once-only cache.
        assert_eq!(rt.modules.len(), 1);
    }
}
