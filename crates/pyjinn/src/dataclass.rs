//! `@dataclass` support (§4.10): field collection from annotated class-body
//! assignments, synthetic `__init__`, and a default `repr`/`str`.
//!
//! Equality for a dataclass instance without its own `__eq__` is handled
//! directly in [`crate::runtime::Runtime::dataclass_eq`] (field-for-field,
//! by `ScriptInstance.attrs`), since that's a general "no override" fallback
//! shared with plain classes, not something specific to this module.

use indexmap::IndexMap;

use crate::ast::{ClassDef, Constant, ExprKind, StatementKind};
use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::{HeapData, HeapId};
use crate::intern::StringId;
use crate::runtime::Runtime;
use crate::value::Value;

/// Walks a `@dataclass` body's top-level `AnnAssign` statements, collecting
/// `(field_name, default_expr)` pairs in declaration order.
///
/// Rejects a non-defaulted field following a defaulted one (§4.10): Python
/// itself raises this as a `TypeError` at class-definition time, so this
/// crate does the same rather than deferring to a confusing instantiation-time
/// `bind_arguments` failure.
pub fn collect_fields(class: &ClassDef, rt: &mut Runtime) -> RunResult<Vec<(StringId, Option<Value>)>> {
    let mut fields = Vec::new();
    let mut saw_default = false;
    for stmt in &class.body {
        let StatementKind::AnnAssign { target, value } = &stmt.kind else { continue };
        let crate::ast::AssignTarget::Name(name) = target else { continue };
        let default = match value {
            Some(expr) => Some(const_default(expr, rt)?),
            None => None,
        };
        if default.is_some() {
            saw_default = true;
        } else if saw_default {
            return Err(RunError::simple(
                ExcType::TypeError,
                format!("non-default argument '{}' follows default argument", rt.interns.resolve(*name)),
            ));
        }
        fields.push((*name, default));
    }
    Ok(fields)
}

fn const_default(expr: &crate::ast::Expr, rt: &mut Runtime) -> RunResult<Value> {
    match &expr.kind {
        ExprKind::Constant(Constant::None) => Ok(Value::None),
        ExprKind::Constant(Constant::Bool(b)) => Ok(Value::Bool(*b)),
        ExprKind::Constant(Constant::Int(i)) => Ok(Value::Num(crate::numeric::Numeric::from_int_literal(*i))),
        ExprKind::Constant(Constant::Float(f)) => Ok(Value::Num(crate::numeric::Numeric::Double(*f))),
        ExprKind::Constant(Constant::Str(s)) => Ok(Value::Str(rt.heap.alloc(HeapData::Str(s.clone())))),
        ExprKind::List(items) if items.is_empty() => Ok(Value::List(rt.heap.alloc(HeapData::List(Vec::new())))),
        ExprKind::Dict { keys, .. } if keys.is_empty() => Ok(Value::Dict(rt.heap.alloc(HeapData::Dict(IndexMap::new())))),
        _ => Err(RunError::simple(ExcType::TypeError, "dataclass field defaults must be literal constants")),
    }
}

/// Synthetic `__init__` for a dataclass with no explicit constructor (§4.10):
/// binds positional/keyword arguments against `dataclass_fields` in
/// declaration order, same rules as a regular function call.
pub fn init_instance(
    rt: &mut Runtime,
    class_id: HeapId,
    instance_id: HeapId,
    positional: &[Value],
    keywords: &IndexMap<StringId, Value>,
) -> RunResult<()> {
    let HeapData::ScriptClass(class) = rt.heap.get(class_id) else { unreachable!() };
    let fields = class.dataclass_fields.clone();
    let mut attrs = IndexMap::new();
    for (i, (name, default)) in fields.iter().enumerate() {
        let value = if let Some(v) = positional.get(i) {
            *v
        } else if let Some(v) = keywords.get(name) {
            *v
        } else if let Some(default) = default {
            *default
        } else {
            return Err(RunError::simple(ExcType::TypeError, format!("missing required argument: '{}'", rt.interns.resolve(*name))));
        };
        attrs.insert(*name, value);
    }
    let HeapData::ScriptInstance(inst) = rt.heap.get_mut(instance_id) else { unreachable!() };
    inst.attrs = attrs;
    Ok(())
}

/// `ClassName(field=value, ...)`-shaped default `repr`, used both as `str()`'s
/// fallback and (conceptually) as `__repr__`'s value when a dataclass doesn't
/// override either (§4.10).
pub fn default_repr(rt: &mut Runtime, instance_id: HeapId) -> String {
    let HeapData::ScriptInstance(inst) = rt.heap.get(instance_id) else { return "<object>".to_owned() };
    let class_id = inst.class;
    let HeapData::ScriptClass(class) = rt.heap.get(class_id) else { return "<object>".to_owned() };
    let class_name = rt.interns.resolve(class.name).to_owned();
    let fields = class.dataclass_fields.clone();
    let HeapData::ScriptInstance(inst) = rt.heap.get(instance_id) else { return "<object>".to_owned() };
    let attrs = inst.attrs.clone();
    let parts: Vec<String> = fields
        .iter()
        .map(|(name, _)| {
            let value = attrs.get(name).copied().unwrap_or(Value::None);
            format!("{}={}", rt.interns.resolve(*name), rt.stringify(value))
        })
        .collect();
    format!("{class_name}({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Generation;
    use crate::heap::{Heap, ScriptClass, ScriptInstance};
    use crate::host::{HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle};
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
    impl crate::host::IoHost for NoHost {
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
    impl crate::host::ZombieCallbackHandler for NoHost {
        fn on_zombie_call(&self, _: &str, _: &str, _: u64) {}
    }

    fn with_runtime(f: impl FnOnce(&mut Runtime)) {
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
        f(&mut rt);
    }

    #[test]
    fn init_instance_applies_defaults_and_overrides() {
        with_runtime(|rt| {
            let x = rt.interns.intern("x");
            let y = rt.interns.intern("y");
            let class = ScriptClass {
                name: rt.interns.intern("Point"),
                frozen: false,
                is_dataclass: true,
                dataclass_fields: vec![(x, None), (y, Some(Value::Num(crate::numeric::Numeric::Int(0))))],
                constructor: None,
                instance_methods: IndexMap::new(),
                class_methods: IndexMap::new(),
                hash_override: None,
                str_override: None,
                base: None,
            };
            let class_id = rt.heap.alloc(HeapData::ScriptClass(class));
            let instance_id = rt.heap.alloc(HeapData::ScriptInstance(ScriptInstance { class: class_id, attrs: IndexMap::new() }));
            init_instance(rt, class_id, instance_id, &[Value::Num(crate::numeric::Numeric::Int(5))], &IndexMap::new()).unwrap();
            let HeapData::ScriptInstance(inst) = rt.heap.get(instance_id) else { unreachable!() };
            assert!(matches!(inst.attrs.get(&x), Some(Value::Num(n)) if n.as_i64() == 5));
            assert!(matches!(inst.attrs.get(&y), Some(Value::Num(n)) if n.as_i64() == 0));
        });
    }
}
