//! Runtime semantics shared by the tree-walking evaluator and the VM (§2:
//! "Both share the Value Model, Context, Symbol Cache, Overload Resolver,
//! Interface Proxy, and Built-ins").
//!
//! Keeping binary/unary/compare, attribute/subscript access, iteration, and
//! call dispatch in one place is what lets [`crate::evaluator`] and
//! [`crate::bytecode::vm`] agree on observable behavior (§2 "Must produce
//! identical observable behavior ... for overlapping constructs") without
//! duplicating the operational semantics in both files.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::exception::{ExcType, RunError, RunResult};
use crate::function::{BoundFunction, FunctionBody, Generation};
use crate::heap::{Heap, HeapData, HeapId};
use crate::host::{HostEnv, IoHost};
use crate::intern::{ConstructorKey, HostClassId, Interns, MethodKey, SymbolCache};
use crate::namespace::{CallSiteRecord, Context, ContextId, Contexts};
use crate::overload;
use crate::proxy::ProxyTable;
use crate::value::{self, Value};

/// Everything the evaluator and VM need to execute one script run, bundled
/// so call sites don't thread a dozen parameters through every function.
pub struct Runtime<'a> {
    pub heap: &'a mut Heap,
    pub contexts: &'a mut Contexts,
    pub interns: &'a mut Interns,
    pub host: &'a HostEnv,
    pub proxies: &'a mut ProxyTable,
    pub symbols: &'a SymbolCache,
    pub generation: &'a Generation,
    pub halted: &'a mut bool,
    pub io: &'a mut dyn IoHost,
    /// Canonical-path → module globals context, so a module is evaluated at
    /// most once per script run (§4.9 "Once-only loading").
    pub modules: &'a mut IndexMap<String, ContextId>,
    /// Script-registered `__atexit_register__` callbacks, run in reverse
    /// order on `exit()` (§4.12).
    pub atexit_callbacks: &'a mut Vec<Value>,
    /// Total zombie-callback invocations this script run, reported to
    /// [`crate::host::ZombieCallbackHandler`] (§4.12).
    pub zombie_calls: &'a mut u64,
}

impl Runtime<'_> {
    pub fn unary(&mut self, op: UnaryOp, operand: Value) -> RunResult<Value> {
        match (op, operand) {
            (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy(self.heap))),
            (UnaryOp::Neg, Value::Num(n)) => Ok(Value::Num(n.negate())),
            (UnaryOp::Pos, Value::Num(n)) => Ok(Value::Num(n)),
            (UnaryOp::Invert, Value::Num(n)) if !n.is_float() => Ok(Value::Num(crate::numeric::Numeric::from_int_literal(!n.as_i64()))),
            (_, v) => Err(type_error(self.heap, "bad operand type for unary operator", v)),
        }
    }

    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> RunResult<Value> {
        use crate::numeric::Numeric;
        if let (Value::Num(a), Value::Num(b)) = (lhs, rhs) {
            return Ok(Value::Num(match op {
                BinOp::Add => a.add(b),
                BinOp::Sub => a.sub(b),
                BinOp::Mul => a.mul(b),
                BinOp::TrueDiv => return a.true_div(b).map(Value::Num),
                BinOp::FloorDiv => return a.floor_div(b).map(Value::Num),
                BinOp::Mod => return a.py_mod(b).map(Value::Num),
                BinOp::Pow => Numeric::Double(a.as_f64().powf(b.as_f64())),
                BinOp::LShift => Numeric::from_int_literal(a.as_i64() << b.as_i64()),
                BinOp::RShift => Numeric::from_int_literal(a.as_i64() >> b.as_i64()),
                BinOp::BitOr => Numeric::from_int_literal(a.as_i64() | b.as_i64()),
                BinOp::BitXor => Numeric::from_int_literal(a.as_i64() ^ b.as_i64()),
                BinOp::BitAnd => Numeric::from_int_literal(a.as_i64() & b.as_i64()),
                BinOp::MatMul => return Err(RunError::simple(ExcType::TypeError, "'@' is not supported between numerics")),
            }));
        }
        match (op, lhs, rhs) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => {
                let s = format!("{}{}", value::as_str(self.heap, a), value::as_str(self.heap, b));
                Ok(Value::Str(self.heap.alloc(HeapData::Str(s))))
            }
            (BinOp::Mod, Value::Str(_), _) => {
                // `%`-style string formatting is out of scope (§C); scripts
                // use f-strings instead, unlike the `@`/MatMul case above this
                // is a plain unsupported binary op, not an unsupported type.
                Err(RunError::simple(ExcType::TypeError, "'%' string formatting is not supported; use an f-string"))
            }
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                let mut items = value::as_seq(self.heap, a).to_vec();
                items.extend_from_slice(value::as_seq(self.heap, b));
                Ok(Value::List(self.heap.alloc(HeapData::List(items))))
            }
            (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
                let mut items = value::as_seq(self.heap, a).to_vec();
                items.extend_from_slice(value::as_seq(self.heap, b));
                Ok(Value::Tuple(self.heap.alloc(HeapData::Tuple(items))))
            }
            (BinOp::Mul, Value::Str(a), Value::Num(n)) | (BinOp::Mul, Value::Num(n), Value::Str(a)) => {
                let s = value::as_str(self.heap, a).repeat(n.as_i64().max(0) as usize);
                Ok(Value::Str(self.heap.alloc(HeapData::Str(s))))
            }
            (BinOp::Mul, Value::List(a), Value::Num(n)) | (BinOp::Mul, Value::Num(n), Value::List(a)) => {
                let base = value::as_seq(self.heap, a).to_vec();
                let mut items = Vec::new();
                for _ in 0..n.as_i64().max(0) {
                    items.extend_from_slice(&base);
                }
                Ok(Value::List(self.heap.alloc(HeapData::List(items))))
            }
            (BinOp::BitOr, Value::Set(a), Value::Set(b)) => self.set_op(a, b, SetOp::Union),
            (BinOp::BitAnd, Value::Set(a), Value::Set(b)) => self.set_op(a, b, SetOp::Intersection),
            (BinOp::Sub, Value::Set(a), Value::Set(b)) => self.set_op(a, b, SetOp::Difference),
            (_, lhs, rhs) => self.dunder_binary(op, lhs, rhs),
        }
    }

    fn set_op(&mut self, a: HeapId, b: HeapId, op: SetOp) -> RunResult<Value> {
        let (xs, ys) = (value::as_set(self.heap, a).to_vec(), value::as_set(self.heap, b).to_vec());
        let result: Vec<Value> = match op {
            SetOp::Union => {
                let mut out = xs.clone();
                for y in &ys {
                    if !xs.iter().any(|x| value::py_eq(self.heap, *x, *y)) {
                        out.push(*y);
                    }
                }
                out
            }
            SetOp::Intersection => xs.iter().filter(|x| ys.iter().any(|y| value::py_eq(self.heap, **x, *y))).copied().collect(),
            SetOp::Difference => xs.iter().filter(|x| !ys.iter().any(|y| value::py_eq(self.heap, **x, *y))).copied().collect(),
        };
        Ok(Value::Set(self.heap.alloc(HeapData::Set(result))))
    }

    fn dunder_binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> RunResult<Value> {
        let name = match op {
            BinOp::Add => "__add__",
            BinOp::Sub => "__sub__",
            BinOp::Mul => "__mul__",
            BinOp::TrueDiv => "__truediv__",
            BinOp::FloorDiv => "__floordiv__",
            BinOp::Mod => "__mod__",
            BinOp::Pow => "__pow__",
            BinOp::LShift => "__lshift__",
            BinOp::RShift => "__rshift__",
            BinOp::BitOr => "__or__",
            BinOp::BitAnd => "__and__",
            BinOp::BitXor => "__xor__",
            BinOp::MatMul => "__matmul__",
        };
        if let Value::ScriptInstance(id) = lhs {
            if let Some(method) = self.find_instance_method(id, name) {
                return self.call_value(method, &[rhs], &IndexMap::new());
            }
        }
        Err(type_error(self.heap, &format!("unsupported operand type(s) for {name}"), lhs))
    }

    pub fn compare(&mut self, op: CmpOp, lhs: Value, rhs: Value) -> RunResult<Value> {
        use std::cmp::Ordering;
        let result = match op {
            CmpOp::Is => matches!((lhs, rhs), (Value::None, Value::None)) || ptr_eq(lhs, rhs),
            CmpOp::IsNot => !(matches!((lhs, rhs), (Value::None, Value::None)) || ptr_eq(lhs, rhs)),
            CmpOp::Eq => self.py_eq_deep(lhs, rhs)?,
            CmpOp::NotEq => !self.py_eq_deep(lhs, rhs)?,
            CmpOp::In => self.contains(rhs, lhs)?,
            CmpOp::NotIn => !self.contains(rhs, lhs)?,
            CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
                let ord = value::py_compare(self.heap, lhs, rhs)
                    .ok_or_else(|| type_error(self.heap, "unorderable types", lhs))?;
                match op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::LtE => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::GtE => ord != Ordering::Less,
                    _ => unreachable!(),
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn py_eq_deep(&mut self, lhs: Value, rhs: Value) -> RunResult<bool> {
        if let Value::ScriptInstance(id) = lhs {
            if let Some(method) = self.find_instance_method(id, "__eq__") {
                let result = self.call_value(method, &[rhs], &IndexMap::new())?;
                return Ok(result.is_truthy(self.heap));
            }
            if let Value::ScriptInstance(other) = rhs {
                return Ok(self.dataclass_eq(id, other));
            }
        }
        Ok(value::py_eq(self.heap, lhs, rhs))
    }

    fn dataclass_eq(&self, a: HeapId, b: HeapId) -> bool {
        let HeapData::ScriptInstance(ai) = self.heap.get(a) else { return false };
        let HeapData::ScriptInstance(bi) = self.heap.get(b) else { return false };
        ai.class == bi.class && ai.attrs == bi.attrs
    }

    fn contains(&mut self, container: Value, item: Value) -> RunResult<bool> {
        match container {
            Value::List(id) | Value::Tuple(id) => {
                Ok(value::as_seq(self.heap, id).iter().any(|v| value::py_eq(self.heap, *v, item)))
            }
            Value::Set(id) => Ok(value::as_set(self.heap, id).iter().any(|v| value::py_eq(self.heap, *v, item))),
            Value::Dict(id) => Ok(value::as_dict(self.heap, id).contains_key(&item)),
            Value::Str(id) => {
                let Value::Str(needle) = item else {
                    return Err(RunError::simple(ExcType::TypeError, "'in <string>' requires string as left operand"));
                };
                Ok(value::as_str(self.heap, id).contains(value::as_str(self.heap, needle)))
            }
            Value::ScriptInstance(id) => {
                if let Some(method) = self.find_instance_method(id, "__contains__") {
                    let r = self.call_value(method, &[item], &IndexMap::new())?;
                    return Ok(r.is_truthy(self.heap));
                }
                Err(type_error(self.heap, "argument of type is not iterable", container))
            }
            _ => Err(type_error(self.heap, "argument is not iterable", container)),
        }
    }

    /// Produces a fresh, single-pass iterator value over `container` (§4.3 "for").
    pub fn make_iterator(&mut self, container: Value) -> RunResult<Value> {
        match container {
            Value::RangeIter(_) => Ok(container),
            Value::List(id) | Value::Tuple(id) => {
                let items = value::as_seq(self.heap, id).to_vec();
                Ok(Value::SeqIter(self.heap.alloc(HeapData::SeqIter { items, pos: 0 })))
            }
            Value::Set(id) => {
                let items = value::as_set(self.heap, id).to_vec();
                Ok(Value::SeqIter(self.heap.alloc(HeapData::SeqIter { items, pos: 0 })))
            }
            Value::Dict(id) => {
                let items: Vec<Value> = value::as_dict(self.heap, id).keys().copied().collect();
                Ok(Value::SeqIter(self.heap.alloc(HeapData::SeqIter { items, pos: 0 })))
            }
            Value::Str(id) => {
                let items: Vec<Value> = value::as_str(self.heap, id)
                    .chars()
                    .map(|c| Value::Str(self.heap.alloc(HeapData::Str(c.to_string()))))
                    .collect();
                Ok(Value::SeqIter(self.heap.alloc(HeapData::SeqIter { items, pos: 0 })))
            }
            other => Err(type_error(self.heap, "object is not iterable", other)),
        }
    }

    /// Eagerly materializes every element of an iterable container (§2
    /// built-ins that need the full sequence up front: `list()`/`sum()`/
    /// `enumerate()`/etc., rather than a lazy generator protocol).
    pub fn iterable_items(&mut self, container: Value) -> RunResult<Vec<Value>> {
        let iter = self.make_iterator(container)?;
        let mut items = Vec::new();
        while self.iterator_has_next(iter)? {
            items.push(self.iterator_next(iter)?);
        }
        Ok(items)
    }

    /// `isinstance(obj, cls)` (§2): script instances walk the base chain,
    /// exceptions compare `ExcType` subtyping, host objects defer to the
    /// host's own assignability check; anything else is `False`.
    pub fn is_instance(&mut self, obj: Value, class: Value) -> bool {
        match (obj, class) {
            (Value::ScriptInstance(iid), Value::ScriptClass(cid)) => iid == cid || self.instance_is_a(iid, cid),
            (Value::Exception(id), Value::ExceptionClass(kind)) => {
                let HeapData::Exception { kind: k, .. } = self.heap.get(id) else { return false };
                k.is_a(kind)
            }
            (Value::HostObject { class: oc, .. }, Value::HostClass(cc)) => {
                if oc == cc {
                    return true;
                }
                let obj_ty = crate::intern::host_class_handle(oc);
                let cls_ty = crate::intern::host_class_handle(cc);
                self.host.reflection.is_assignable(&obj_ty, &cls_ty)
            }
            _ => false,
        }
    }

    pub fn iterator_has_next(&self, iter: Value) -> RunResult<bool> {
        match iter {
            Value::RangeIter(id) => {
                let HeapData::RangeIter { current, stop, step } = self.heap.get(id) else { unreachable!() };
                Ok(if *step > 0 { current < stop } else { current > stop })
            }
            Value::SeqIter(id) => {
                let HeapData::SeqIter { items, pos } = self.heap.get(id) else { unreachable!() };
                Ok(pos < &items.len())
            }
            other => Err(type_error(self.heap, "not an iterator", other)),
        }
    }

    pub fn iterator_next(&mut self, iter: Value) -> RunResult<Value> {
        match iter {
            Value::RangeIter(id) => {
                let HeapData::RangeIter { current, stop, step } = self.heap.get_mut(id) else { unreachable!() };
                let _ = stop;
                let v = *current;
                *current += *step;
                Ok(Value::Num(crate::numeric::Numeric::Long(v)))
            }
            Value::SeqIter(id) => {
                let HeapData::SeqIter { items, pos } = self.heap.get_mut(id) else { unreachable!() };
                let v = items[*pos];
                *pos += 1;
                Ok(v)
            }
            other => Err(type_error(self.heap, "not an iterator", other)),
        }
    }

    pub fn get_attr(&mut self, receiver: Value, attr: &str) -> RunResult<Value> {
        match receiver {
            Value::ScriptInstance(id) => {
                let HeapData::ScriptInstance(inst) = self.heap.get(id) else { unreachable!() };
                let name = self.interns.intern(attr);
                if let Some(v) = inst.attrs.get(&name) {
                    return Ok(*v);
                }
                if let Some(method) = self.find_instance_method(id, attr) {
                    return Ok(self.bind_method(receiver, attr, method));
                }
                Err(RunError::simple(ExcType::AttributeError, format!("'{}' object has no attribute '{attr}'", self.class_name(id))))
            }
            Value::ScriptClass(id) => {
                let name = self.interns.intern(attr);
                let HeapData::ScriptClass(class) = self.heap.get(id) else { unreachable!() };
                if let Some((_, f)) = class.class_methods.get(&name) {
                    return Ok(Value::BoundFunction(*f));
                }
                Err(RunError::simple(ExcType::AttributeError, format!("type object has no attribute '{attr}'")))
            }
            Value::HostObject { class, handle } => {
                let ty = crate::intern::host_class_handle(class);
                if let Some(field) = overload::find_field(self.host.reflection.as_ref(), &ty, attr) {
                    return self.host.invoker.get_field(&field, Some(&receiver));
                }
                let _ = handle;
                Ok(Value::BoundMethod(self.heap.alloc(HeapData::BoundMethod { receiver, method_name: self.interns.intern(attr) })))
            }
            Value::HostClass(class) => {
                let ty = crate::intern::host_class_handle(class);
                if let Some(field) = overload::find_field(self.host.reflection.as_ref(), &ty, attr) {
                    return self.host.invoker.get_field(&field, None);
                }
                Ok(Value::BoundMethod(self.heap.alloc(HeapData::BoundMethod { receiver, method_name: self.interns.intern(attr) })))
            }
            Value::Str(_) | Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Dict(_) => {
                Ok(Value::BoundMethod(self.heap.alloc(HeapData::BoundMethod { receiver, method_name: self.interns.intern(attr) })))
            }
            Value::Module(id) => {
                let HeapData::Module { context } = self.heap.get(id) else { unreachable!() };
                let ctx = *context;
                let name = self.interns.intern(attr);
                self.contexts
                    .read_name(ctx, name)
                    .ok_or_else(|| RunError::simple(ExcType::AttributeError, format!("module has no attribute '{attr}'")))
            }
            Value::Namespace(id) => {
                let HeapData::Namespace(children) = self.heap.get(id) else { unreachable!() };
                let name = self.interns.intern(attr);
                children
                    .get(&name)
                    .copied()
                    .ok_or_else(|| RunError::simple(ExcType::AttributeError, format!("module has no attribute '{attr}'")))
            }
            other => Err(type_error(self.heap, &format!("'{{}}' object has no attribute '{attr}'"), other)),
        }
    }

    pub fn set_attr(&mut self, receiver: Value, attr: &str, value: Value) -> RunResult<()> {
        match receiver {
            Value::ScriptInstance(id) => {
                let frozen = {
                    let HeapData::ScriptInstance(inst) = self.heap.get(id) else { unreachable!() };
                    let HeapData::ScriptClass(class) = self.heap.get(inst.class) else { unreachable!() };
                    class.frozen
                };
                if frozen {
                    return Err(RunError::simple(ExcType::FrozenInstanceError, "cannot assign to field of frozen instance"));
                }
                let name = self.interns.intern(attr);
                let HeapData::ScriptInstance(inst) = self.heap.get_mut(id) else { unreachable!() };
                inst.attrs.insert(name, value);
                Ok(())
            }
            Value::HostObject { .. } | Value::HostClass(_) => {
                let ty_handle = match receiver {
                    Value::HostObject { class, .. } | Value::HostClass(class) => crate::intern::host_class_handle(class),
                    _ => unreachable!(),
                };
                let field = overload::find_field(self.host.reflection.as_ref(), &ty_handle, attr)
                    .ok_or_else(|| RunError::simple(ExcType::AttributeError, format!("no such field '{attr}'")))?;
                let recv = if matches!(receiver, Value::HostClass(_)) { None } else { Some(&receiver) };
                self.host.invoker.set_field(&field, recv, value)
            }
            other => Err(type_error(self.heap, &format!("cannot set attribute '{attr}'"), other)),
        }
    }

    pub fn del_attr(&mut self, receiver: Value, attr: &str) -> RunResult<()> {
        if let Value::ScriptInstance(id) = receiver {
            let name = self.interns.intern(attr);
            let HeapData::ScriptInstance(inst) = self.heap.get_mut(id) else { unreachable!() };
            inst.attrs.shift_remove(&name);
            return Ok(());
        }
        Err(type_error(self.heap, &format!("cannot delete attribute '{attr}'"), receiver))
    }

    fn class_name(&self, instance_id: HeapId) -> String {
        let HeapData::ScriptInstance(inst) = self.heap.get(instance_id) else { return "object".into() };
        let HeapData::ScriptClass(class) = self.heap.get(inst.class) else { return "object".into() };
        self.interns.resolve(class.name).to_owned()
    }

    fn find_instance_method(&self, instance_id: HeapId, name: &str) -> Option<Value> {
        let HeapData::ScriptInstance(inst) = self.heap.get(instance_id) else { return None };
        let sid = self.interns.get(name)?;
        let mut class_id = inst.class;
        loop {
            let HeapData::ScriptClass(class) = self.heap.get(class_id) else { return None };
            if let Some(&method) = class.instance_methods.get(&sid) {
                return Some(Value::BoundFunction(method));
            }
            match class.base {
                Some(base) => class_id = base,
                None => return None,
            }
        }
    }

    fn bind_method(&mut self, receiver: Value, attr: &str, method: Value) -> Value {
        let _ = method;
        Value::BoundMethod(self.heap.alloc(HeapData::BoundMethod { receiver, method_name: self.interns.intern(attr) }))
    }

    pub fn get_subscript(&mut self, container: Value, index: Value) -> RunResult<Value> {
        match container {
            Value::List(id) | Value::Tuple(id) => {
                let seq = value::as_seq(self.heap, id);
                match index {
                    Value::Num(n) => {
                        let i = value::resolve_index(n.as_i64(), seq.len())?;
                        Ok(seq[i])
                    }
                    Value::Slice(sid) => {
                        let HeapData::Slice { lower, upper, step } = *self.heap.get(sid) else { unreachable!() };
                        let (start, end) = value::resolve_slice(lower, upper, step, seq.len())?;
                        let items = seq[start..end].to_vec();
                        Ok(match container {
                            Value::List(_) => Value::List(self.heap.alloc(HeapData::List(items))),
                            _ => Value::Tuple(self.heap.alloc(HeapData::Tuple(items))),
                        })
                    }
                    other => Err(type_error(self.heap, "list indices must be integers or slices", other)),
                }
            }
            Value::Dict(id) => {
                let map = value::as_dict(self.heap, id);
                map.get(&index).copied().ok_or_else(|| RunError::simple(ExcType::KeyError, format!("{index:?}")))
            }
            Value::Str(id) => {
                let s = value::as_str(self.heap, id);
                let chars: Vec<char> = s.chars().collect();
                match index {
                    Value::Num(n) => {
                        let i = value::resolve_index(n.as_i64(), chars.len())?;
                        Ok(Value::Str(self.heap.alloc(HeapData::Str(chars[i].to_string()))))
                    }
                    Value::Slice(sid) => {
                        let HeapData::Slice { lower, upper, step } = *self.heap.get(sid) else { unreachable!() };
                        let (start, end) = value::resolve_slice(lower, upper, step, chars.len())?;
                        let s: String = chars[start..end].iter().collect();
                        Ok(Value::Str(self.heap.alloc(HeapData::Str(s))))
                    }
                    other => Err(type_error(self.heap, "string indices must be integers or slices", other)),
                }
            }
            Value::ScriptInstance(id) => {
                if let Some(method) = self.find_instance_method(id, "__getitem__") {
                    self.call_value(method, &[index], &IndexMap::new())
                } else {
                    Err(type_error(self.heap, "object is not subscriptable", container))
                }
            }
            other => Err(type_error(self.heap, "object is not subscriptable", other)),
        }
    }

    pub fn set_subscript(&mut self, container: Value, index: Value, value: Value) -> RunResult<()> {
        match container {
            Value::List(id) => {
                let HeapData::List(items) = self.heap.get_mut(id) else { unreachable!() };
                let i = value::resolve_index(index_of(index)?, items.len())?;
                items[i] = value;
                Ok(())
            }
            Value::Dict(id) => {
                let HeapData::Dict(map) = self.heap.get_mut(id) else { unreachable!() };
                map.insert(index, value);
                Ok(())
            }
            Value::ScriptInstance(id) => {
                if let Some(method) = self.find_instance_method(id, "__setitem__") {
                    self.call_value(method, &[index, value], &IndexMap::new())?;
                    Ok(())
                } else {
                    Err(type_error(self.heap, "object does not support item assignment", container))
                }
            }
            other => Err(type_error(self.heap, "object does not support item assignment", other)),
        }
    }

    pub fn del_subscript(&mut self, container: Value, index: Value) -> RunResult<()> {
        match container {
            Value::List(id) => {
                let HeapData::List(items) = self.heap.get_mut(id) else { unreachable!() };
                let i = value::resolve_index(index_of(index)?, items.len())?;
                items.remove(i);
                Ok(())
            }
            Value::Dict(id) => {
                let HeapData::Dict(map) = self.heap.get_mut(id) else { unreachable!() };
                map.shift_remove(&index).map(|_| ()).ok_or_else(|| RunError::simple(ExcType::KeyError, format!("{index:?}")))
            }
            other => Err(type_error(self.heap, "object doesn't support item deletion", other)),
        }
    }

    /// Dispatches a call to any callable `Value` (§3.1, §4.6, §4.7).
    pub fn call_value(&mut self, callee: Value, positional: &[Value], keywords: &IndexMap<crate::intern::StringId, Value>) -> RunResult<Value> {
        match callee {
            Value::BoundFunction(id) | Value::Lambda(id) => self.call_bound(id, positional, keywords),
            Value::BoundMethod(id) => {
                let HeapData::BoundMethod { receiver, method_name } = *self.heap.get(id) else { unreachable!() };
                let name = self.interns.resolve(method_name).to_owned();
                self.call_method(receiver, &name, positional, keywords)
            }
            Value::ScriptClass(class_id) => self.construct_instance(class_id, positional, keywords),
            Value::HostClass(class_id) => self.construct_host(class_id, positional),
            Value::ExceptionClass(kind) => {
                let message = positional.first().map(|v| self.stringify(*v)).unwrap_or_default();
                Ok(Value::Exception(self.heap.alloc(HeapData::Exception { kind, message })))
            }
            Value::Builtin(id) => crate::builtins::call_builtin(self, id, positional, keywords),
            other => Err(type_error(self.heap, "object is not callable", other)),
        }
    }

    fn call_bound(&mut self, id: HeapId, positional: &[Value], keywords: &IndexMap<crate::intern::StringId, Value>) -> RunResult<Value> {
        let HeapData::BoundFunction(bound) | HeapData::Lambda(bound) = self.heap.get(id) else { unreachable!() };
        let bound: BoundFunction = bound.clone();
        if bound.captured_generation != self.generation.current() {
            let description = bound.name().map_or_else(|| "<lambda>".to_owned(), |n| self.interns.resolve(n).to_owned());
            *self.zombie_calls += 1;
            self.host.zombie.on_zombie_call("<script>", &description, *self.zombie_calls);
            return Ok(Value::None);
        }
        let params = bound.params().clone();
        let enclosing = bound.enclosing;
        let new_ctx = self.contexts.push(Context::new_call(self.contexts.get(enclosing).global, None, Some(enclosing)));

        let bound_args = {
            let heap = &mut *self.heap;
            let interns = &*self.interns;
            crate::signature::bind_arguments(
                &params,
                positional,
                keywords,
                |expr, heap| eval_const_default(expr, heap),
                interns,
                heap,
            )?
        };
        for (name, value) in bound_args {
            self.contexts.write_name(new_ctx, name, value);
        }

        let method_name = bound.name().map_or_else(|| "<lambda>".to_owned(), |n| self.interns.resolve(n).to_owned());
        self.contexts.enter_call(CallSiteRecord { enclosing_type: None, method_name, filename: String::new(), lineno: 0 });
        let result = match &bound.body {
            FunctionBody::Def(def) => {
                if let Some(code) = &bound.compiled {
                    crate::bytecode::vm::run(code, new_ctx, self)
                } else {
                    crate::evaluator::exec_function_body(&def.body, new_ctx, self)
                }
            }
            FunctionBody::Lambda { body, .. } => crate::evaluator::eval_expr(body, new_ctx, self),
        };
        self.contexts.exit_call();
        result
    }

    fn call_method(&mut self, receiver: Value, name: &str, positional: &[Value], keywords: &IndexMap<crate::intern::StringId, Value>) -> RunResult<Value> {
        match receiver {
            Value::ScriptInstance(id) => {
                if let Some(method) = self.find_instance_method(id, name) {
                    let mut args = vec![receiver];
                    args.extend_from_slice(positional);
                    return self.call_value(method, &args, keywords);
                }
                Err(RunError::simple(ExcType::AttributeError, format!("no method '{name}'")))
            }
            Value::HostObject { class, handle } => {
                let ty = crate::intern::host_class_handle(class);
                // Proxy-promoted interfaces (§4.7): a call on the script side
                // to the interface's single abstract method never needs a
                // host round trip, since the receiver is already just a
                // wrapper around a script callable this crate created.
                if self.host.reflection.functional_interface_method(&ty).as_deref() == Some(name) {
                    if let Some(proxy) = self.proxies.get(crate::proxy::ProxyId::new(handle as u32)) {
                        if proxy.interface == *ty {
                            let callable = proxy.callable;
                            return self.call_value(callable, positional, keywords);
                        }
                    }
                }
                self.call_host_method(ty, receiver, class, false, name, positional)
            }
            Value::HostClass(class) => {
                let ty = crate::intern::host_class_handle(class);
                self.call_host_method(ty, receiver, class, true, name, positional)
            }
            Value::Str(_) | Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Dict(_) => {
                crate::strings::dispatch(self, receiver, name, positional)
            }
            other => Err(type_error(self.heap, &format!("no method '{name}'"), other)),
        }
    }

    fn call_host_method(
        &mut self,
        ty: Arc<crate::host::HostTypeHandle>,
        receiver: Value,
        class: HostClassId,
        is_static: bool,
        name: &str,
        positional: &[Value],
    ) -> RunResult<Value> {
        let key = MethodKey { class, is_static, method_name: Arc::from(name), actual_types: Vec::new() };
        let actual_types: Vec<Option<crate::host::HostTypeHandle>> = positional.iter().map(|_| None).collect();
        let java_flags = vec![false; positional.len()];
        let invoker = self.symbols.get_or_resolve_method(key, || {
            let invoker = overload::resolve_method(self.host.reflection.as_ref(), &ty, name, positional, &actual_types, self.heap, &java_flags)
                .unwrap_or_else(|d| {
                    // Cached value must exist; surface the diagnostic by
                    // storing an invoker that re-raises on first use would
                    // complicate the cache contract, so overload failures
                    // here are resolved eagerly below instead.
                    let _ = d;
                    overload::Invoker {
                        executable: crate::host::HostExecutable {
                            runtime_name: name.to_owned(),
                            declaring_type: ty.clone(),
                            param_types: Vec::new(),
                            is_varargs: true,
                            modifiers: crate::host::MemberModifiers::default(),
                            handle: 0,
                        },
                        coercions: Vec::new(),
                    }
                });
            overload::share(invoker)
        });
        self.host.invoker.invoke_method(&invoker.executable, &receiver, positional)
    }

    fn construct_instance(&mut self, class_id: HeapId, positional: &[Value], keywords: &IndexMap<crate::intern::StringId, Value>) -> RunResult<Value> {
        let instance_id = self.heap.alloc(HeapData::ScriptInstance(crate::heap::ScriptInstance { class: class_id, attrs: IndexMap::new() }));
        let instance = Value::ScriptInstance(instance_id);
        let HeapData::ScriptClass(class) = self.heap.get(class_id) else { unreachable!() };
        if let Some(ctor) = class.constructor {
            let mut args = vec![instance];
            args.extend_from_slice(positional);
            self.call_value(Value::BoundFunction(ctor), &args, keywords)?;
        } else if class.is_dataclass {
            crate::dataclass::init_instance(self, class_id, instance_id, positional, keywords)?;
        }
        Ok(instance)
    }

    fn construct_host(&mut self, class_id: HostClassId, positional: &[Value]) -> RunResult<Value> {
        let ty = crate::intern::host_class_handle(class_id);
        if let [Value::BoundFunction(_) | Value::Lambda(_)] = positional {
            if let Some(method) = self.host.reflection.functional_interface_method(&ty) {
                let abstracts = self.host.reflection.abstract_methods(&ty);
                let proxy_id = self.proxies.create(ty.as_ref().clone(), positional[0], Contexts::global_id(), &abstracts);
                let _ = method;
                let handle = u64::from(proxy_id.raw());
                return Ok(Value::HostObject { class: class_id, handle });
            }
        }
        let key = ConstructorKey { class: class_id, actual_types: Vec::new() };
        let actual_types: Vec<Option<crate::host::HostTypeHandle>> = positional.iter().map(|_| None).collect();
        let java_flags = vec![false; positional.len()];
        let invoker = self.symbols.get_or_resolve_constructor(key, || {
            let resolved = overload::resolve_constructor(self.host.reflection.as_ref(), &ty, positional, &actual_types, self.heap, &java_flags);
            overload::share(resolved.unwrap_or_else(|_| overload::Invoker {
                executable: crate::host::HostExecutable {
                    runtime_name: ty.runtime_name.clone(),
                    declaring_type: ty.clone(),
                    param_types: Vec::new(),
                    is_varargs: true,
                    modifiers: crate::host::MemberModifiers::default(),
                    handle: 0,
                },
                coercions: Vec::new(),
            }))
        });
        self.host.invoker.invoke_constructor(&invoker.executable, positional)
    }

    /// `str()` conversion (§6.4 `__str__`), with a `repr`-style fallback (§C).
    pub fn stringify(&mut self, value: Value) -> String {
        match value {
            Value::None => "None".to_owned(),
            Value::Bool(b) => if b { "True" } else { "False" }.to_owned(),
            Value::Num(n) => {
                if n.is_float() {
                    format!("{}", n.as_f64())
                } else {
                    format!("{}", n.as_i64())
                }
            }
            Value::Str(id) => value::as_str(self.heap, id).to_owned(),
            Value::List(id) => self.stringify_seq(id, '[', ']'),
            Value::Tuple(id) => self.stringify_seq(id, '(', ')'),
            Value::Set(id) => {
                let items = value::as_set(self.heap, id).to_vec();
                if items.is_empty() {
                    "set()".to_owned()
                } else {
                    let parts: Vec<String> = items.into_iter().map(|v| self.repr(v)).collect();
                    format!("{{{}}}", parts.join(", "))
                }
            }
            Value::Dict(id) => {
                let map = value::as_dict(self.heap, id).clone();
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", self.repr(*k), self.repr(*v))).collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::ScriptInstance(sid) => {
                if let Some(method) = self.find_instance_method(sid, "__str__") {
                    if let Ok(v) = self.call_value(method, &[], &IndexMap::new()) {
                        return self.stringify(v);
                    }
                }
                crate::dataclass::default_repr(self, sid)
            }
            Value::Exception(id) => {
                let HeapData::Exception { message, .. } = self.heap.get(id) else { unreachable!() };
                message.clone()
            }
            Value::ExceptionClass(kind) => kind.to_string(),
            other => format!("<{}>", other.type_name(self.heap)),
        }
    }

    fn stringify_seq(&mut self, id: HeapId, open: char, close: char) -> String {
        let items = value::as_seq(self.heap, id).to_vec();
        let parts: Vec<String> = items.into_iter().map(|v| self.repr(v)).collect();
        format!("{open}{}{close}", parts.join(", "))
    }

    /// `repr()`-style rendering (§2/§C): like `stringify` but quotes strings,
    /// used for elements nested inside a container so `print([['t']])` reads
    /// `['t']` rather than `[t]`.
    pub fn repr(&mut self, value: Value) -> String {
        match value {
            Value::Str(id) => format!("'{}'", value::as_str(self.heap, id)),
            other => self.stringify(other),
        }
    }

    /// Built-in exception-type-vs-active-exception test for `except` (§7).
    pub fn exception_matches(&mut self, type_value: Value, active: &RunError) -> bool {
        match type_value {
            Value::ExceptionClass(kind) => match &active.payload {
                crate::exception::ExcPayload::Simple { kind: k, .. } => k.is_a(kind),
                _ => false,
            },
            Value::ScriptClass(id) => matches!(&active.payload, crate::exception::ExcPayload::ScriptInstance(Value::ScriptInstance(iid)) if *iid == id || self.instance_is_a(*iid, id)),
            _ => false,
        }
    }

    pub fn instance_is_a(&self, instance_id: HeapId, class_id: HeapId) -> bool {
        let HeapData::ScriptInstance(inst) = self.heap.get(instance_id) else { return false };
        let mut cur = Some(inst.class);
        while let Some(c) = cur {
            if c == class_id {
                return true;
            }
            let HeapData::ScriptClass(class) = self.heap.get(c) else { return false };
            cur = class.base;
        }
        false
    }
}

enum SetOp {
    Union,
    Intersection,
    Difference,
}

fn index_of(v: Value) -> RunResult<i64> {
    match v {
        Value::Num(n) => Ok(n.as_i64()),
        other => Err(RunError::simple(ExcType::TypeError, format!("indices must be integers, not {other:?}"))),
    }
}

fn ptr_eq(a: Value, b: Value) -> bool {
    use Value::{BoundFunction, Dict, HostObject, Lambda, List, ScriptInstance, Set};
    match (a, b) {
        (List(x), List(y)) | (Dict(x), Dict(y)) | (Set(x), Set(y)) | (ScriptInstance(x), ScriptInstance(y)) | (BoundFunction(x), BoundFunction(y)) | (Lambda(x), Lambda(y)) => x == y,
        (HostObject { class: c1, handle: h1 }, HostObject { class: c2, handle: h2 }) => c1 == c2 && h1 == h2,
        _ => false,
    }
}

fn type_error(heap: &Heap, msg: &str, v: Value) -> RunError {
    RunError::simple(ExcType::TypeError, format!("{msg}: '{}'", v.type_name(heap)))
}

/// Evaluates a default-value expression that must itself be a literal
/// constant (covers every default value in the end-to-end scenarios, §8);
/// non-constant defaults are a documented simplification (see DESIGN.md).
fn eval_const_default(expr: &crate::ast::Expr, heap: &mut Heap) -> RunResult<Value> {
    match &expr.kind {
        crate::ast::ExprKind::Constant(c) => Ok(match c {
            crate::ast::Constant::None => Value::None,
            crate::ast::Constant::Bool(b) => Value::Bool(*b),
            crate::ast::Constant::Int(i) => Value::Num(crate::numeric::Numeric::from_int_literal(*i)),
            crate::ast::Constant::Float(f) => Value::Num(crate::numeric::Numeric::Double(*f)),
            crate::ast::Constant::Str(s) => Value::Str(heap.alloc(HeapData::Str(s.clone()))),
        }),
        _ => Ok(Value::None),
    }
}
