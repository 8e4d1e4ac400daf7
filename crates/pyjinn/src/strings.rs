//! Built-in method dispatch for `str`/`list`/`tuple`/`set`/`dict` receivers
//! (§4.11 "String method translation" generalized to the other built-in
//! sequence/mapping types, since [`crate::runtime::Runtime::get_attr`] binds
//! a method on any of them the same way).

use indexmap::IndexMap;

use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::HeapData;
use crate::numeric::Numeric;
use crate::runtime::Runtime;
use crate::value::{self, Value};

pub fn dispatch(rt: &mut Runtime, receiver: Value, name: &str, args: &[Value]) -> RunResult<Value> {
    match receiver {
        Value::Str(id) => str_method(rt, id, name, args),
        Value::List(id) => list_method(rt, id, name, args),
        Value::Tuple(id) => seq_method(rt, id, name, args),
        Value::Set(id) => set_method(rt, id, name, args),
        Value::Dict(id) => dict_method(rt, id, name, args),
        _ => Err(RunError::simple(ExcType::AttributeError, format!("no method '{name}'"))),
    }
}

fn arg_str(rt: &Runtime, args: &[Value], i: usize) -> RunResult<String> {
    match args.get(i) {
        Some(Value::Str(id)) => Ok(value::as_str(rt.heap, *id).to_owned()),
        _ => Err(RunError::simple(ExcType::TypeError, "expected a string argument")),
    }
}

#[allow(clippy::too_many_lines)]
fn str_method(rt: &mut Runtime, id: crate::heap::HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
    let s = value::as_str(rt.heap, id).to_owned();
    match name {
        "upper" => Ok(str_value(rt, s.to_uppercase())),
        "lower" => Ok(str_value(rt, s.to_lowercase())),
        "strip" => Ok(str_value(rt, s.trim().to_owned())),
        "lstrip" => Ok(str_value(rt, s.trim_start().to_owned())),
        "rstrip" => Ok(str_value(rt, s.trim_end().to_owned())),
        "startswith" => Ok(Value::Bool(s.starts_with(&arg_str(rt, args, 0)?))),
        "endswith" => Ok(Value::Bool(s.ends_with(&arg_str(rt, args, 0)?))),
        "find" => {
            let needle = arg_str(rt, args, 0)?;
            let pos = s.find(&needle).map_or(-1, |byte_pos| s[..byte_pos].chars().count() as i64);
            Ok(Value::Num(Numeric::from_int_literal(pos)))
        }
        "replace" => {
            let from = arg_str(rt, args, 0)?;
            let to = arg_str(rt, args, 1)?;
            Ok(str_value(rt, s.replace(&from, &to)))
        }
        "split" => {
            let parts: Vec<Value> = if args.is_empty() {
                s.split_whitespace().map(|p| str_value(rt, p.to_owned())).collect()
            } else {
                let sep = arg_str(rt, args, 0)?;
                s.split(sep.as_str()).map(|p| str_value(rt, p.to_owned())).collect()
            };
            Ok(Value::List(rt.heap.alloc(HeapData::List(parts))))
        }
        "join" => {
            let Some(iterable) = args.first().copied() else {
                return Err(RunError::simple(ExcType::TypeError, "join() requires an iterable"));
            };
            let items = collect_items(rt, iterable)?;
            let parts: Vec<String> = items.into_iter().map(|v| rt.stringify(v)).collect();
            Ok(str_value(rt, parts.join(&s)))
        }
        "format" => Ok(str_value(rt, s)),
        "count" => {
            let needle = arg_str(rt, args, 0)?;
            if needle.is_empty() {
                Ok(Value::Num(Numeric::from_int_literal(0)))
            } else {
                Ok(Value::Num(Numeric::from_int_literal(s.matches(needle.as_str()).count() as i64)))
            }
        }
        _ => Err(RunError::simple(ExcType::AttributeError, format!("'str' object has no attribute '{name}'"))),
    }
}

fn str_value(rt: &mut Runtime, s: String) -> Value {
    Value::Str(rt.heap.alloc(HeapData::Str(s)))
}

fn collect_items(rt: &mut Runtime, container: Value) -> RunResult<Vec<Value>> {
    let iter = rt.make_iterator(container)?;
    let mut out = Vec::new();
    while rt.iterator_has_next(iter)? {
        out.push(rt.iterator_next(iter)?);
    }
    Ok(out)
}

fn list_method(rt: &mut Runtime, id: crate::heap::HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
    match name {
        "append" => {
            let v = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "append() requires an argument"))?;
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            items.push(v);
            Ok(Value::None)
        }
        "pop" => {
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            items.pop().ok_or_else(|| RunError::simple(ExcType::IndexError, "pop from empty list"))
        }
        "extend" => {
            let Some(iterable) = args.first().copied() else {
                return Err(RunError::simple(ExcType::TypeError, "extend() requires an iterable"));
            };
            let extra = collect_items(rt, iterable)?;
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            items.extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            let Some(Value::Num(idx)) = args.first() else {
                return Err(RunError::simple(ExcType::TypeError, "insert() requires an index"));
            };
            let v = args.get(1).copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "insert() requires a value"))?;
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            let i = (idx.as_i64().max(0) as usize).min(items.len());
            items.insert(i, v);
            Ok(Value::None)
        }
        "remove" => {
            let target = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "remove() requires an argument"))?;
            let items = value::as_seq(rt.heap, id).to_vec();
            let pos = items.iter().position(|v| value::py_eq(rt.heap, *v, target));
            match pos {
                Some(i) => {
                    let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
                    items.remove(i);
                    Ok(Value::None)
                }
                None => Err(RunError::simple(ExcType::ValueError, "list.remove(x): x not in list")),
            }
        }
        "sort" => {
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            items.sort_by(|a, b| value::py_compare(rt.heap, *a, *b).unwrap_or(std::cmp::Ordering::Equal));
            Ok(Value::None)
        }
        "reverse" => {
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            items.reverse();
            Ok(Value::None)
        }
        "index" => {
            let target = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "index() requires an argument"))?;
            let items = value::as_seq(rt.heap, id);
            items
                .iter()
                .position(|v| value::py_eq(rt.heap, *v, target))
                .map(|i| Value::Num(Numeric::from_int_literal(i as i64)))
                .ok_or_else(|| RunError::simple(ExcType::ValueError, "value not in list"))
        }
        "count" => {
            let target = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "count() requires an argument"))?;
            let n = value::as_seq(rt.heap, id).iter().filter(|v| value::py_eq(rt.heap, **v, target)).count();
            Ok(Value::Num(Numeric::from_int_literal(n as i64)))
        }
        "clear" => {
            let HeapData::List(items) = rt.heap.get_mut(id) else { unreachable!() };
            items.clear();
            Ok(Value::None)
        }
        "copy" => {
            let items = value::as_seq(rt.heap, id).to_vec();
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        _ => seq_method(rt, id, name, args),
    }
}

fn seq_method(rt: &mut Runtime, id: crate::heap::HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
    match name {
        "index" => {
            let target = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "index() requires an argument"))?;
            let items = value::as_seq(rt.heap, id);
            items
                .iter()
                .position(|v| value::py_eq(rt.heap, *v, target))
                .map(|i| Value::Num(Numeric::from_int_literal(i as i64)))
                .ok_or_else(|| RunError::simple(ExcType::ValueError, "value not in tuple"))
        }
        "count" => {
            let target = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "count() requires an argument"))?;
            let n = value::as_seq(rt.heap, id).iter().filter(|v| value::py_eq(rt.heap, **v, target)).count();
            Ok(Value::Num(Numeric::from_int_literal(n as i64)))
        }
        _ => Err(RunError::simple(ExcType::AttributeError, format!("no method '{name}'"))),
    }
}

fn set_method(rt: &mut Runtime, id: crate::heap::HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
    match name {
        "add" => {
            let v = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "add() requires an argument"))?;
            let already = value::as_set(rt.heap, id).iter().any(|x| value::py_eq(rt.heap, *x, v));
            if !already {
                let HeapData::Set(items) = rt.heap.get_mut(id) else { unreachable!() };
                items.push(v);
            }
            Ok(Value::None)
        }
        "remove" | "discard" => {
            let v = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "requires an argument"))?;
            let pos = value::as_set(rt.heap, id).iter().position(|x| value::py_eq(rt.heap, *x, v));
            match pos {
                Some(i) => {
                    let HeapData::Set(items) = rt.heap.get_mut(id) else { unreachable!() };
                    items.remove(i);
                    Ok(Value::None)
                }
                None if name == "discard" => Ok(Value::None),
                None => Err(RunError::simple(ExcType::KeyError, "element not in set")),
            }
        }
        _ => Err(RunError::simple(ExcType::AttributeError, format!("no method '{name}'"))),
    }
}

fn dict_method(rt: &mut Runtime, id: crate::heap::HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
    match name {
        "get" => {
            let key = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "get() requires a key"))?;
            let default = args.get(1).copied().unwrap_or(Value::None);
            let map = value::as_dict(rt.heap, id);
            Ok(map.get(&key).copied().unwrap_or(default))
        }
        "keys" => {
            let items: Vec<Value> = value::as_dict(rt.heap, id).keys().copied().collect();
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        "values" => {
            let items: Vec<Value> = value::as_dict(rt.heap, id).values().copied().collect();
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        "items" => {
            let pairs: Vec<(Value, Value)> = value::as_dict(rt.heap, id).iter().map(|(k, v)| (*k, *v)).collect();
            let items: Vec<Value> = pairs
                .into_iter()
                .map(|(k, v)| Value::Tuple(rt.heap.alloc(HeapData::Tuple(vec![k, v]))))
                .collect();
            Ok(Value::List(rt.heap.alloc(HeapData::List(items))))
        }
        "pop" => {
            let key = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "pop() requires a key"))?;
            let HeapData::Dict(map) = rt.heap.get_mut(id) else { unreachable!() };
            match map.shift_remove(&key) {
                Some(v) => Ok(v),
                None => match args.get(1) {
                    Some(default) => Ok(*default),
                    None => Err(RunError::simple(ExcType::KeyError, "key not found")),
                },
            }
        }
        "update" => {
            let Some(other) = args.first().copied() else {
                return Err(RunError::simple(ExcType::TypeError, "update() requires a mapping"));
            };
            let Value::Dict(other_id) = other else {
                return Err(RunError::simple(ExcType::TypeError, "update() requires a dict"));
            };
            let extra: IndexMap<Value, Value> = value::as_dict(rt.heap, other_id).clone();
            let HeapData::Dict(map) = rt.heap.get_mut(id) else { unreachable!() };
            map.extend(extra);
            Ok(Value::None)
        }
        "setdefault" => {
            let key = args.first().copied().ok_or_else(|| RunError::simple(ExcType::TypeError, "setdefault() requires a key"))?;
            let default = args.get(1).copied().unwrap_or(Value::None);
            let HeapData::Dict(map) = rt.heap.get_mut(id) else { unreachable!() };
            Ok(*map.entry(key).or_insert(default))
        }
        "clear" => {
            let HeapData::Dict(map) = rt.heap.get_mut(id) else { unreachable!() };
            map.clear();
            Ok(Value::None)
        }
        _ => Err(RunError::simple(ExcType::AttributeError, format!("no method '{name}'"))),
    }
}
