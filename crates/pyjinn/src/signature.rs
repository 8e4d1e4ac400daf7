//! Argument binding for script calls (positional / keyword / `*args` /
//! `**kwargs` / defaults), shared by the evaluator and VM call paths and by
//! dataclass synthetic `__init__` codegen.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::ParamList;
use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::{Heap, HeapData};
use crate::intern::{Interns, StringId};
use crate::value::Value;

/// Binds `(positional, keywords)` actual arguments against a `ParamList`,
/// evaluating defaults lazily only for parameters left unfilled.
///
/// `eval_default` evaluates a default-value expression already stored on the
/// `ParamList` in the caller's defining context; callers pass a closure since
/// evaluating an `Expr` requires either the evaluator or the VM, both of
/// which depend on this module. It receives the same `heap` passed to this
/// function, reborrowed per call, so a default like `x="a"` can allocate a
/// string onto it.
pub fn bind_arguments(
    params: &ParamList,
    positional: &[Value],
    keywords: &IndexMap<StringId, Value>,
    mut eval_default: impl FnMut(&crate::ast::Expr, &mut Heap) -> RunResult<Value>,
    interns: &Interns,
    heap: &mut Heap,
) -> RunResult<IndexMap<StringId, Value>> {
    let mut bound = IndexMap::new();
    let mut remaining_kw: AHashMap<StringId, Value> = keywords.iter().map(|(k, v)| (*k, *v)).collect();

    let positional_required = params.args.len().saturating_sub(params.defaults.len());
    for (i, &name) in params.args.iter().enumerate() {
        if let Some(v) = positional.get(i) {
            bound.insert(name, *v);
        } else if let Some(v) = remaining_kw.remove(&name) {
            bound.insert(name, v);
        } else if i >= positional_required {
            let default_expr = &params.defaults[i - positional_required];
            bound.insert(name, eval_default(default_expr, heap)?);
        } else {
            return Err(RunError::simple(
                ExcType::TypeError,
                format!("missing required argument: '{}'", interns.resolve(name)),
            ));
        }
    }

    if let Some(vararg) = params.vararg {
        let extra: Vec<Value> = positional.iter().skip(params.args.len()).copied().collect();
        let id = heap.alloc(HeapData::Tuple(extra));
        bound.insert(vararg, Value::Tuple(id));
    } else if positional.len() > params.args.len() {
        return Err(RunError::simple(
            ExcType::TypeError,
            format!("too many positional arguments: expected {}, got {}", params.args.len(), positional.len()),
        ));
    }

    for (i, &name) in params.kwonly.iter().enumerate() {
        if let Some(v) = remaining_kw.remove(&name) {
            bound.insert(name, v);
        } else if let Some(Some(default_expr)) = params.kwonly_defaults.get(i) {
            bound.insert(name, eval_default(default_expr, heap)?);
        } else {
            return Err(RunError::simple(
                ExcType::TypeError,
                format!("missing required keyword-only argument: '{}'", interns.resolve(name)),
            ));
        }
    }

    if let Some(kwarg) = params.kwarg {
        let mut map = IndexMap::new();
        for (k, v) in remaining_kw {
            map.insert(k, v);
        }
        let id = heap.alloc(HeapData::KwArgsBag(map));
        bound.insert(kwarg, Value::KwArgsBag(id));
    } else if let Some((&stray, _)) = remaining_kw.iter().next() {
        return Err(RunError::simple(
            ExcType::TypeError,
            format!("unexpected keyword argument: '{}'", interns.resolve(stray)),
        ));
    }

    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults_and_collects_varargs() {
        let mut interns = Interns::new();
        let a = interns.intern("a");
        let b = interns.intern("b");
        let args_name = interns.intern("rest");
        let params = ParamList {
            args: vec![a, b],
            defaults: vec![crate::ast::Expr { kind: crate::ast::ExprKind::Constant(crate::ast::Constant::Int(9)), line: 1 }],
            vararg: Some(args_name),
            kwonly: vec![],
            kwonly_defaults: vec![],
            kwarg: None,
        };
        let mut heap = Heap::new();
        let positional = vec![Value::Num(crate::numeric::Numeric::Int(1)), Value::Num(crate::numeric::Numeric::Int(2)), Value::Num(crate::numeric::Numeric::Int(3))];
        let bound = bind_arguments(&params, &positional, &IndexMap::new(), |_, _| unreachable!(), &interns, &mut heap).unwrap();
        assert_eq!(bound.len(), 3);
        assert!(matches!(bound[&args_name], Value::Tuple(_)));
    }
}
