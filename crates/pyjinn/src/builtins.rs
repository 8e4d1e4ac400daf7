//! Built-in functions (§2 "Built-ins"): bound to their bare names at global
//! scope as plain [`Value::Builtin`] values rather than through any dedicated
//! bytecode instruction, so `print(x)` resolves the same way a script-defined
//! function would — `ExprKind::Name` → `Context::read_name` → `call_value`.

use indexmap::IndexMap;

use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::HeapData;
use crate::intern::{Interns, StringId};
use crate::namespace::Contexts;
use crate::numeric::Numeric;
use crate::runtime::Runtime;
use crate::value::{self, Value};

/// One built-in function, resolved by bare name at script setup (§2).
///
/// `JavaClass` is deliberately absent: the loader special-cases it as
/// `ExprKind::JavaClassKeyword` rather than an ordinary call, so it never
/// reaches [`call_builtin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinId {
    Print,
    Len,
    Range,
    Enumerate,
    Min,
    Max,
    Abs,
    Round,
    Ord,
    Chr,
    Hex,
    Int,
    Float,
    Str,
    Bool,
    Tuple,
    List,
    Set,
    Dict,
    IsInstance,
    Type,
    Sum,
    Globals,
    Exit,
    AtexitRegister,
    AtexitUnregister,
    TracebackFormatStack,
    JavaArray,
    JavaString,
    JavaList,
    JavaSet,
    JavaMap,
    JavaInt,
    JavaFloat,
}

const NAMES: &[(&str, BuiltinId)] = &[
    ("print", BuiltinId::Print),
    ("len", BuiltinId::Len),
    ("range", BuiltinId::Range),
    ("enumerate", BuiltinId::Enumerate),
    ("min", BuiltinId::Min),
    ("max", BuiltinId::Max),
    ("abs", BuiltinId::Abs),
    ("round", BuiltinId::Round),
    ("ord", BuiltinId::Ord),
    ("chr", BuiltinId::Chr),
    ("hex", BuiltinId::Hex),
    ("int", BuiltinId::Int),
    ("float", BuiltinId::Float),
    ("str", BuiltinId::Str),
    ("bool", BuiltinId::Bool),
    ("tuple", BuiltinId::Tuple),
    ("list", BuiltinId::List),
    ("set", BuiltinId::Set),
    ("dict", BuiltinId::Dict),
    ("isinstance", BuiltinId::IsInstance),
    ("type", BuiltinId::Type),
    ("sum", BuiltinId::Sum),
    ("globals", BuiltinId::Globals),
    ("exit", BuiltinId::Exit),
    ("__atexit_register__", BuiltinId::AtexitRegister),
    ("__atexit_unregister__", BuiltinId::AtexitUnregister),
    ("__traceback_format_stack__", BuiltinId::TracebackFormatStack),
    ("JavaArray", BuiltinId::JavaArray),
    ("JavaString", BuiltinId::JavaString),
    ("JavaList", BuiltinId::JavaList),
    ("JavaSet", BuiltinId::JavaSet),
    ("JavaMap", BuiltinId::JavaMap),
    ("JavaInt", BuiltinId::JavaInt),
    ("JavaFloat", BuiltinId::JavaFloat),
];

/// Built-in exception type names (§7), bound in global scope alongside the
/// plain built-ins so `raise ValueError(...)`/`except KeyError` resolve a
/// bare `Name` the same way any other global does.
const EXCEPTION_NAMES: &[(&str, ExcType)] = &[
    ("BaseException", ExcType::BaseException),
    ("Exception", ExcType::Exception),
    ("SystemExit", ExcType::SystemExit),
    ("KeyboardInterrupt", ExcType::KeyboardInterrupt),
    ("NameError", ExcType::NameError),
    ("UnboundLocalError", ExcType::UnboundLocalError),
    ("TypeError", ExcType::TypeError),
    ("ValueError", ExcType::ValueError),
    ("LookupError", ExcType::LookupError),
    ("IndexError", ExcType::IndexError),
    ("KeyError", ExcType::KeyError),
    ("ZeroDivisionError", ExcType::ZeroDivisionError),
    ("ArithmeticError", ExcType::ArithmeticError),
    ("AttributeError", ExcType::AttributeError),
    ("FrozenInstanceError", ExcType::FrozenInstanceError),
    ("NotImplementedError", ExcType::NotImplementedError),
    ("RecursionError", ExcType::RecursionError),
    ("RuntimeError", ExcType::RuntimeError),
    ("StopIteration", ExcType::StopIteration),
    ("ImportError", ExcType::ImportError),
];

/// Seeds the global context with every built-in name, bound to
/// `Value::Builtin` (§2), plus every built-in exception type name, bound to
/// `Value::ExceptionClass`. Called once at script setup, before the main
/// module body runs.
pub fn install(contexts: &mut Contexts, interns: &mut Interns) {
    let global = Contexts::global_id();
    for (name, id) in NAMES {
        let sid = interns.intern(name);
        contexts.write_name(global, sid, Value::Builtin(*id));
    }
    for (name, kind) in EXCEPTION_NAMES {
        let sid = interns.intern(name);
        contexts.write_name(global, sid, Value::ExceptionClass(*kind));
    }
}

fn str_value(rt: &mut Runtime, s: String) -> Value {
    Value::Str(rt.heap.alloc(HeapData::Str(s)))
}

fn as_num(v: Value) -> RunResult<Numeric> {
    match v {
        Value::Num(n) => Ok(n),
        Value::Bool(b) => Ok(Numeric::Int(i32::from(b))),
        other => Err(RunError::simple(ExcType::TypeError, format!("expected a number, got {other:?}"))),
    }
}

/// Dispatches a call to any `Value::Builtin` (§2).
pub fn call_builtin(rt: &mut Runtime, id: BuiltinId, positional: &[Value], keywords: &IndexMap<StringId, Value>) -> RunResult<Value> {
    match id {
        BuiltinId::Print => {
            let sep = match keywords.get(&rt.interns.intern("sep")) {
                Some(Value::Str(sid)) => value::as_str(rt.heap, *sid).to_owned(),
                _ => " ".to_owned(),
            };
            let end = match keywords.get(&rt.interns.intern("end")) {
                Some(Value::Str(sid)) => value::as_str(rt.heap, *sid).to_owned(),
                _ => "\n".to_owned(),
            };
            let parts: Vec<String> = positional.iter().map(|v| rt.stringify(*v)).collect();
            rt.io.write_stdout(&parts.join(&sep));
            rt.io.write_stdout(&end);
            Ok(Value::None)
        }
        BuiltinId::Len => {
            let n = match positional.first() {
                Some(Value::Str(id)) => value::as_str(rt.heap, *id).chars().count(),
                Some(Value::List(id) | Value::Tuple(id)) => value::as_seq(rt.heap, *id).len(),
                Some(Value::Set(id)) => value::as_set(rt.heap, *id).len(),
                Some(Value::Dict(id)) => value::as_dict(rt.heap, *id).len(),
                other => return Err(RunError::simple(ExcType::TypeError, format!("object of type '{:?}' has no len()", other))),
            };
            Ok(Value::Num(Numeric::from_int_literal(n as i64)))
        }
        BuiltinId::Range => {
            let (start, stop, step) = match positional {
                [stop] => (0, as_num(*stop)?.as_i64(), 1),
                [start, stop] => (as_num(*start)?.as_i64(), as_num(*stop)?.as_i64(), 1),
                [start, stop, step] => (as_num(*start)?.as_i64(), as_num(*stop)?.as_i64(), as_num(*step)?.as_i64()),
                _ => return Err(RunError::simple(ExcType::TypeError, "range expected 1 to 3 arguments")),
            };
            if step == 0 {
                return Err(RunError::simple(ExcType::ValueError, "range() arg 3 must not be zero"));
            }
            Ok(Value::RangeIter(rt.heap.alloc(HeapData::RangeIter { current: start, stop, step })))
        }
        BuiltinId::Enumerate => {
            let start = match positional.get(1) {
                Some(v) => as_num(*v)?.as_i64(),
                None => 0,
            };
            let items = rt.iterable_items(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "enumerate() missing argument"))?)?;
            let pairs: Vec<Value> = items
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    let idx = Value::Num(Numeric::from_int_literal(start + i as i64));
                    Value::Tuple(rt.heap.alloc(HeapData::Tuple(vec![idx, v])))
                })
                .collect();
            Ok(Value::List(rt.heap.alloc(HeapData::List(pairs))))
        }
        BuiltinId::Min | BuiltinId::Max => {
            let items = min_max_items(rt, positional)?;
            let mut best = *items.first().ok_or_else(|| RunError::simple(ExcType::ValueError, "arg is an empty sequence"))?;
            for &item in &items[1..] {
                let order = value::py_compare(rt.heap, item, best).unwrap_or(std::cmp::Ordering::Equal);
                let take = if id == BuiltinId::Min { order.is_lt() } else { order.is_gt() };
                if take {
                    best = item;
                }
            }
            Ok(best)
        }
        BuiltinId::Abs => {
            let n = as_num(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "abs() missing argument"))?)?;
            Ok(Value::Num(if n.compare(Numeric::Int(0)).is_lt() { n.negate() } else { n }))
        }
        BuiltinId::Round => {
            let n = as_num(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "round() missing argument"))?)?;
            let ndigits = match positional.get(1) {
                Some(v) => as_num(*v)?.as_i64(),
                None => 0,
            };
            let factor = 10f64.powi(ndigits as i32);
            let rounded = (n.as_f64() * factor).round() / factor;
            Ok(if ndigits <= 0 && positional.get(1).is_none() {
                Value::Num(Numeric::from_int_literal(rounded as i64))
            } else {
                Value::Num(Numeric::Double(rounded))
            })
        }
        BuiltinId::Ord => {
            let Some(Value::Str(sid)) = positional.first() else {
                return Err(RunError::simple(ExcType::TypeError, "ord() expected a string of length 1"));
            };
            let s = value::as_str(rt.heap, *sid);
            let c = s.chars().next().ok_or_else(|| RunError::simple(ExcType::TypeError, "ord() expected a character"))?;
            Ok(Value::Num(Numeric::from_int_literal(i64::from(u32::from(c)))))
        }
        BuiltinId::Chr => {
            let n = as_num(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "chr() missing argument"))?)?;
            let c = char::from_u32(n.as_i64() as u32).ok_or_else(|| RunError::simple(ExcType::ValueError, "chr() arg not in range"))?;
            Ok(str_value(rt, c.to_string()))
        }
        BuiltinId::Hex => {
            let n = as_num(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "hex() missing argument"))?)?;
            let v = n.as_i64();
            let s = if v < 0 { format!("-0x{:x}", -v) } else { format!("0x{v:x}") };
            Ok(str_value(rt, s))
        }
        BuiltinId::Int => match positional.first() {
            None => Ok(Value::Num(Numeric::Int(0))),
            Some(Value::Num(n)) => Ok(Value::Num(Numeric::from_int_literal(n.as_i64()))),
            Some(Value::Bool(b)) => Ok(Value::Num(Numeric::Int(i32::from(*b)))),
            Some(Value::Str(sid)) => {
                let s = value::as_str(rt.heap, *sid).trim();
                let v: i64 = s
                    .parse()
                    .map_err(|_| RunError::simple(ExcType::ValueError, format!("invalid literal for int() with base 10: '{s}'")))?;
                Ok(Value::Num(Numeric::from_int_literal(v)))
            }
            Some(other) => Err(RunError::simple(ExcType::TypeError, format!("int() argument must be a string or a number, not {other:?}"))),
        },
        BuiltinId::Float => match positional.first() {
            None => Ok(Value::Num(Numeric::Double(0.0))),
            Some(Value::Num(n)) => Ok(Value::Num(Numeric::Double(n.as_f64()))),
            Some(Value::Bool(b)) => Ok(Value::Num(Numeric::Double(f64::from(i32::from(*b))))),
            Some(Value::Str(sid)) => {
                let s = value::as_str(rt.heap, *sid).trim();
                let v: f64 = s.parse().map_err(|_| RunError::simple(ExcType::ValueError, format!("could not convert string to float: '{s}'")))?;
                Ok(Value::Num(Numeric::Double(v)))
            }
            Some(other) => Err(RunError::simple(ExcType::TypeError, format!("float() argument must be a string or a number, not {other:?}"))),
        },
        BuiltinId::Str => {
            let s = positional.first().map(|v| rt.stringify(*v)).unwrap_or_default();
            Ok(str_value(rt, s))
        }
        BuiltinId::Bool => Ok(Value::Bool(positional.first().is_some_and(|v| v.is_truthy(rt.heap)))),
        BuiltinId::Tuple => {
            let items = match positional.first() {
                Some(v) => rt.iterable_items(*v)?,
                None => Vec::new(),
            };
            Ok(Value::Tuple(rt.heap.alloc(HeapData::Tuple(items))))
        }
        BuiltinId::List => {
            let items = match positional.first() {
                Some(v) => rt.iterable_items(*v)?,
                None => Vec::new(),
            };
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        BuiltinId::Set => {
            let mut items = Vec::new();
            if let Some(v) = positional.first() {
                for item in rt.iterable_items(*v)? {
                    if !items.iter().any(|x| value::py_eq(rt.heap, *x, item)) {
                        items.push(item);
                    }
                }
            }
            Ok(Value::Set(rt.heap.alloc(HeapData::Set(items))))
        }
        BuiltinId::Dict => {
            let mut map = IndexMap::new();
            if let Some(v) = positional.first() {
                for item in rt.iterable_items(*v)? {
                    let Value::Tuple(pid) = item else {
                        return Err(RunError::simple(ExcType::TypeError, "dict() argument must be an iterable of 2-tuples"));
                    };
                    let pair = value::as_seq(rt.heap, pid);
                    if pair.len() != 2 {
                        return Err(RunError::simple(ExcType::ValueError, "dict() update sequence element has wrong length"));
                    }
                    map.insert(pair[0], pair[1]);
                }
            }
            Ok(Value::Dict(rt.heap.alloc(HeapData::Dict(map))))
        }
        BuiltinId::IsInstance => {
            let obj = *positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "isinstance() missing argument"))?;
            let class = *positional.get(1).ok_or_else(|| RunError::simple(ExcType::TypeError, "isinstance() missing argument"))?;
            Ok(Value::Bool(rt.is_instance(obj, class)))
        }
        BuiltinId::Type => {
            let obj = *positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "type() missing argument"))?;
            Ok(match obj {
                Value::ScriptInstance(id) => {
                    let HeapData::ScriptInstance(inst) = rt.heap.get(id) else { unreachable!() };
                    Value::ScriptClass(inst.class)
                }
                Value::Exception(id) => {
                    let HeapData::Exception { kind, .. } = rt.heap.get(id) else { unreachable!() };
                    Value::ExceptionClass(*kind)
                }
                Value::HostObject { class, .. } => Value::HostClass(class),
                other => str_value(rt, other.type_name(rt.heap).to_owned()),
            })
        }
        BuiltinId::Sum => {
            let iterable = *positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "sum() missing argument"))?;
            let start = match positional.get(1) {
                Some(v) => as_num(*v)?,
                None => Numeric::Int(0),
            };
            let mut total = start;
            for item in rt.iterable_items(iterable)? {
                total = total.add(as_num(item)?);
            }
            Ok(Value::Num(total))
        }
        BuiltinId::Globals => {
            // `Runtime::call_value` doesn't thread the calling `ContextId`
            // through to builtin dispatch, so this always reflects the
            // top-level script's globals regardless of calling scope.
            let top = Contexts::global_id();
            let mut map = IndexMap::new();
            for name in rt.contexts.get(top).local_names() {
                if let Some(v) = rt.contexts.read_name(top, name) {
                    let key = str_value(rt, rt.interns.resolve(name).to_owned());
                    map.insert(key, v);
                }
            }
            Ok(Value::Dict(rt.heap.alloc(HeapData::Dict(map))))
        }
        BuiltinId::Exit => {
            let status = match positional.first() {
                Some(v) => as_num(*v)?.as_i64(),
                None => 0,
            };
            Err(RunError::simple(ExcType::SystemExit, status.to_string()))
        }
        BuiltinId::AtexitRegister => {
            let callback = *positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "__atexit_register__() missing argument"))?;
            crate::zombie::register(rt, callback);
            Ok(Value::None)
        }
        BuiltinId::AtexitUnregister => {
            let callback = *positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "__atexit_unregister__() missing argument"))?;
            crate::zombie::unregister(rt, callback);
            Ok(Value::None)
        }
        BuiltinId::TracebackFormatStack => {
            let frames: Vec<String> = rt
                .contexts
                .call_stack()
                .iter()
                .map(|f| format!("  File \"{}\", line {}, in {}", f.filename, f.lineno, f.method_name))
                .collect();
            let items: Vec<Value> = frames.into_iter().map(|s| str_value(rt, s)).collect();
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        // Host-interop coercions (§9 "Host string duality"): this crate
        // chooses one consistent script-side surface rather than tracking a
        // separate host-string/host-collection identity, so these are
        // pass-throughs or plain script-container constructions. See
        // DESIGN.md.
        BuiltinId::JavaString => {
            Ok(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "JavaString() missing argument"))?)
        }
        BuiltinId::JavaArray | BuiltinId::JavaList => {
            let items = match positional.first() {
                Some(v) => rt.iterable_items(*v)?,
                None => Vec::new(),
            };
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        BuiltinId::JavaSet => {
            let mut items = Vec::new();
            if let Some(v) = positional.first() {
                for item in rt.iterable_items(*v)? {
                    if !items.iter().any(|x| value::py_eq(rt.heap, *x, item)) {
                        items.push(item);
                    }
                }
            }
            Ok(Value::Set(rt.heap.alloc(HeapData::Set(items))))
        }
        BuiltinId::JavaMap => {
            let map = match positional.first() {
                Some(Value::Dict(id)) => value::as_dict(rt.heap, *id).clone(),
                _ => IndexMap::new(),
            };
            Ok(Value::Dict(rt.heap.alloc(HeapData::Dict(map))))
        }
        BuiltinId::JavaInt => {
            let n = as_num(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "JavaInt() missing argument"))?)?;
            Ok(Value::Num(Numeric::Int(n.as_i64() as i32)))
        }
        BuiltinId::JavaFloat => {
            let n = as_num(*positional.first().ok_or_else(|| RunError::simple(ExcType::TypeError, "JavaFloat() missing argument"))?)?;
            Ok(Value::Num(Numeric::Float(n.as_f64() as f32)))
        }
    }
}

fn min_max_items(rt: &mut Runtime, positional: &[Value]) -> RunResult<Vec<Value>> {
    if positional.len() == 1 {
        rt.iterable_items(positional[0])
    } else {
        Ok(positional.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Generation;
    use crate::heap::Heap;
    use crate::host::{HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle, IoHost, ZombieCallbackHandler};
    use crate::intern::SymbolCache;

    struct NoHost {
        stdout: std::cell::RefCell<String>,
    }
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
    impl ZombieCallbackHandler for NoHost {
        fn on_zombie_call(&self, _: &str, _: &str, _: u64) {}
    }

    struct StdoutIo<'a>(&'a std::cell::RefCell<String>);
    impl IoHost for StdoutIo<'_> {
        fn write_stdout(&mut self, s: &str) {
            self.0.borrow_mut().push_str(s);
        }
        fn write_stderr(&mut self, _: &str) {}
        fn read_module(&self, _: &str) -> RunResult<String> {
            unreachable!()
        }
        fn resolve_module(&self, _: &str) -> RunResult<String> {
            unreachable!()
        }
        fn process_exit(&mut self, _: i32) {}
    }

    fn with_runtime(f: impl FnOnce(&mut Runtime)) {
        let no_host = std::sync::Arc::new(NoHost { stdout: std::cell::RefCell::new(String::new()) });
        let mut heap = Heap::new();
        let mut contexts = Contexts::new();
        let mut interns = Interns::new();
        let host = HostEnv {
            reflection: no_host.clone(),
            class_loader: no_host.clone(),
            invoker: no_host.clone(),
            zombie: no_host.clone(),
        };
        let mut proxies = crate::proxy::ProxyTable::new();
        let symbols = SymbolCache::new();
        let generation = Generation::default();
        let mut halted = false;
        let stdout = std::cell::RefCell::new(String::new());
        let mut io = StdoutIo(&stdout);
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
    fn len_counts_list_elements() {
        with_runtime(|rt| {
            let items = vec![Value::Num(Numeric::Int(1)), Value::Num(Numeric::Int(2))];
            let list = Value::List(rt.heap.alloc(HeapData::List(items)));
            let result = call_builtin(rt, BuiltinId::Len, &[list], &IndexMap::new()).unwrap();
            assert!(matches!(result, Value::Num(n) if n.as_i64() == 2));
        });
    }

    #[test]
    fn range_builds_range_iter() {
        with_runtime(|rt| {
            let result = call_builtin(rt, BuiltinId::Range, &[Value::Num(Numeric::Int(3))], &IndexMap::new()).unwrap();
            assert!(matches!(result, Value::RangeIter(_)));
        });
    }

    #[test]
    fn exit_raises_system_exit() {
        with_runtime(|rt| {
            let err = call_builtin(rt, BuiltinId::Exit, &[Value::Num(Numeric::Int(1))], &IndexMap::new()).unwrap_err();
            assert!(matches!(&err.payload, crate::exception::ExcPayload::Simple { kind, .. } if *kind == ExcType::SystemExit));
        });
    }

    #[test]
    fn isinstance_matches_exception_class() {
        with_runtime(|rt| {
            let exc = Value::Exception(rt.heap.alloc(HeapData::Exception { kind: ExcType::ValueError, message: String::new() }));
            let result = call_builtin(rt, BuiltinId::IsInstance, &[exc, Value::ExceptionClass(ExcType::ValueError)], &IndexMap::new()).unwrap();
            assert_eq!(result, Value::Bool(true));
        });
    }
}
