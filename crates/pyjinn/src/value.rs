//! The tagged value universe (§3.1 "Values").
//!
//! [`Value`] is `Copy`: structured data (strings, lists, dicts, instances,
//! bound functions, host objects, …) lives behind a [`HeapId`] in a
//! per-script [`crate::heap::Heap`] arena, or, for host objects, behind an
//! opaque host-owned handle that this crate never dereferences directly.

use std::hash::{Hash, Hasher};

use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::{Heap, HeapData, HeapId};
use crate::intern::{HostClassId, StringId};
use crate::numeric::Numeric;

/// A script value (§3.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Num(Numeric),
    /// Heap-backed variants all share `HeapId` addressing; the tag
    /// distinguishes which [`HeapData`] shape is expected.
    Str(HeapId),
    List(HeapId),
    Tuple(HeapId),
    Set(HeapId),
    Dict(HeapId),
    Slice(HeapId),
    RangeIter(HeapId),
    /// Snapshot iterator over a list/tuple/set/dict/str, produced by
    /// `iterable_iterator` (§4.3 "for").
    SeqIter(HeapId),
    FormattedString(HeapId),
    /// A built-in exception instance raised by script or builtin code (§7),
    /// distinct from `ScriptInstance` so `except ValueError as e` can bind a
    /// value without requiring a synthetic script class for every builtin kind.
    Exception(HeapId),
    /// A bare built-in exception type name used in `raise`/`except` position.
    ExceptionClass(crate::exception::ExcType),
    HostClass(HostClassId),
    /// An opaque host object: a type handle plus a host-owned identity.
    /// Neither field is ever interpreted by this crate; both round-trip to
    /// [`crate::host::HostInvoker`] calls unchanged.
    HostObject { class: HostClassId, handle: u64 },
    ScriptClass(HeapId),
    ScriptInstance(HeapId),
    BoundMethod(HeapId),
    BoundFunction(HeapId),
    Lambda(HeapId),
    KwArgsBag(HeapId),
    Module(HeapId),
    Namespace(HeapId),
    /// A built-in function (§2 "Built-ins"), resolved by bare name at
    /// interpreter setup rather than heap-allocated like a script callable.
    Builtin(crate::builtins::BuiltinId),
}

impl Value {
    #[must_use]
    pub fn is_truthy(self, heap: &Heap) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => b,
            Value::Num(n) => n.as_f64() != 0.0,
            Value::Str(id) => !as_str(heap, id).is_empty(),
            Value::List(id) | Value::Tuple(id) => !as_seq(heap, id).is_empty(),
            Value::Set(id) => !as_set(heap, id).is_empty(),
            Value::Dict(id) => !as_dict(heap, id).is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn type_name(self, heap: &Heap) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Num(n) => {
                if n.is_float() {
                    "float"
                } else {
                    "int"
                }
            }
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Slice(_) => "slice",
            Value::RangeIter(_) | Value::SeqIter(_) => "iterator",
            Value::FormattedString(_) => "str",
            Value::Exception(_) => "exception",
            Value::ExceptionClass(k) => {
                let _ = k;
                "type"
            }
            Value::HostClass(_) => "type",
            Value::HostObject { .. } => "host_object",
            Value::ScriptClass(_) => "type",
            Value::ScriptInstance(_) => "object",
            Value::BoundMethod(_) => "method",
            Value::BoundFunction(_) => "function",
            Value::Lambda(_) => "function",
            Value::KwArgsBag(_) => "dict",
            Value::Module(_) | Value::Namespace(_) => "module",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }
}

#[must_use]
pub fn as_str<'h>(heap: &'h Heap, id: HeapId) -> &'h str {
    match heap.get(id) {
        HeapData::Str(s) => s,
        _ => "",
    }
}

#[must_use]
pub fn as_seq<'h>(heap: &'h Heap, id: HeapId) -> &'h [Value] {
    match heap.get(id) {
        HeapData::List(v) | HeapData::Tuple(v) => v,
        _ => &[],
    }
}

#[must_use]
pub fn as_set<'h>(heap: &'h Heap, id: HeapId) -> &'h [Value] {
    match heap.get(id) {
        HeapData::Set(v) => v,
        _ => &[],
    }
}

#[must_use]
pub fn as_dict(heap: &Heap, id: HeapId) -> &indexmap::IndexMap<Value, Value> {
    static EMPTY: std::sync::OnceLock<indexmap::IndexMap<Value, Value>> = std::sync::OnceLock::new();
    match heap.get(id) {
        HeapData::Dict(m) => m,
        _ => EMPTY.get_or_init(indexmap::IndexMap::new),
    }
}

/// Hashability (§8 round-trip properties rely on `dict`/`set` keys): only
/// immutable variants hash; mutable containers panic if ever used as a key,
/// which the loader/compiler never emits directly (dict/set literal keys are
/// checked at the use site in `value::py_hash`).
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::None => {}
            Value::Bool(b) => b.hash(state),
            Value::Num(n) => {
                if n.is_float() {
                    n.as_f64().to_bits().hash(state);
                } else {
                    n.as_i64().hash(state);
                }
            }
            Value::Str(id)
            | Value::List(id)
            | Value::Tuple(id)
            | Value::Set(id)
            | Value::Dict(id)
            | Value::Slice(id)
            | Value::RangeIter(id)
            | Value::SeqIter(id)
            | Value::Exception(id)
            | Value::FormattedString(id)
            | Value::ScriptClass(id)
            | Value::ScriptInstance(id)
            | Value::BoundMethod(id)
            | Value::BoundFunction(id)
            | Value::Lambda(id)
            | Value::KwArgsBag(id)
            | Value::Module(id)
            | Value::Namespace(id) => id.index().hash(state),
            Value::HostClass(id) => id.hash(state),
            Value::HostObject { class, handle } => {
                class.hash(state);
                handle.hash(state);
            }
            Value::ExceptionClass(kind) => kind.hash(state),
            Value::Builtin(id) => id.hash(state),
        }
    }
}
impl Eq for Value {}

/// `py_hash` as a runtime-checked operation (distinct from the `Hash` impl,
/// which must stay total/non-panicking for use as a Rust map key): strings
/// hash their content, tuples hash the tuple of element hashes (§3.1), lists/
/// sets/dicts are unhashable.
pub fn py_hash(heap: &Heap, value: Value) -> RunResult<u64> {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    match value {
        Value::List(_) | Value::Dict(_) | Value::Set(_) => {
            return Err(RunError::simple(ExcType::TypeError, format!("unhashable type: '{}'", value.type_name(heap))));
        }
        Value::Str(id) => as_str(heap, id).hash(&mut hasher),
        Value::Tuple(id) => {
            for item in as_seq(heap, id) {
                hasher.write_u64(py_hash(heap, *item)?);
            }
        }
        other => other.hash(&mut hasher),
    }
    Ok(hasher.finish())
}

/// Equality used by containers and `==`/`!=` over built-in types (script
/// instances route through `__eq__` first, handled at a higher layer).
pub fn py_eq(heap: &Heap, a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(x), Value::Num(y)) | (Value::Num(y), Value::Bool(x)) => (x as i64 as f64) == y.as_f64(),
        (Value::Num(x), Value::Num(y)) => x.compare(y) == std::cmp::Ordering::Equal,
        (Value::Str(x), Value::Str(y)) => as_str(heap, x) == as_str(heap, y),
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            let (xs, ys) = (as_seq(heap, x), as_seq(heap, y));
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(a, b)| py_eq(heap, *a, *b))
        }
        (Value::HostObject { class: c1, handle: h1 }, Value::HostObject { class: c2, handle: h2 }) => {
            c1 == c2 && h1 == h2
        }
        (Value::HostClass(x), Value::HostClass(y)) => x == y,
        (Value::ScriptInstance(x), Value::ScriptInstance(y)) => x == y,
        _ => false,
    }
}

/// Lexicographic tuple compare (§3.1).
#[must_use]
pub fn py_compare(heap: &Heap, a: Value, b: Value) -> Option<std::cmp::Ordering> {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => Some(x.compare(y)),
        (Value::Bool(x), Value::Num(y)) => Some(Numeric::Int(i32::from(x)).compare(y)),
        (Value::Num(x), Value::Bool(y)) => Some(x.compare(Numeric::Int(i32::from(y)))),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(&y)),
        (Value::Str(x), Value::Str(y)) => Some(as_str(heap, x).cmp(as_str(heap, y))),
        (Value::Tuple(x), Value::Tuple(y)) | (Value::List(x), Value::List(y)) => {
            let (xs, ys) = (as_seq(heap, x), as_seq(heap, y));
            for (a, b) in xs.iter().zip(ys) {
                match py_compare(heap, *a, *b) {
                    Some(Ordering::Equal) => continue,
                    other => return other,
                }
            }
            Some(xs.len().cmp(&ys.len()))
        }
        _ => None,
    }
}

/// Resolves a slice `(lower, upper, step)` against a container length (§3.1):
/// negative bounds add `L`, missing lower is `0`, missing upper is `L`, and
/// any `step != 1` fails explicitly (generalizing it is a future extension,
/// spec.md §9 Open Question (b)).
pub fn resolve_slice(lower: Option<i64>, upper: Option<i64>, step: Option<i64>, len: usize) -> RunResult<(usize, usize)> {
    let step = step.unwrap_or(1);
    if step != 1 {
        return Err(RunError::simple(ExcType::TypeError, "slice step must be 1"));
    }
    let len_i = len as i64;
    let clamp = |v: i64| -> usize {
        let v = if v < 0 { (v + len_i).max(0) } else { v };
        v.min(len_i) as usize
    };
    let start = lower.map_or(0, clamp);
    let end = upper.map_or(len, clamp);
    Ok((start, end.max(start)))
}

/// Resolves a single index against a length, handling negative indices in
/// `-len..-1` (§3.1, §8 boundary behaviors).
pub fn resolve_index(index: i64, len: usize) -> RunResult<usize> {
    let len_i = len as i64;
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        return Err(RunError::simple(ExcType::IndexError, "index out of range"));
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_resolves_negative_bounds() {
        let (start, end) = resolve_slice(Some(-3), Some(-1), Some(1), 5).unwrap();
        assert_eq!((start, end), (2, 4));
    }

    #[test]
    fn slice_rejects_nonunit_step() {
        assert!(resolve_slice(None, None, Some(2), 5).is_err());
    }

    #[test]
    fn index_out_of_range_errs() {
        assert!(resolve_index(-6, 5).is_err());
        assert!(resolve_index(5, 5).is_err());
        assert_eq!(resolve_index(-1, 5).unwrap(), 4);
    }
}
