//! Tree-walking evaluator (§2 "Parity Evaluator"): executes statements and
//! expressions directly over the AST, sharing [`crate::runtime::Runtime`]
//! with the VM. Used for whole uncompiled modules, and called from compiled
//! code for `ClassDef`, `ListComp`/`JoinedStr`, and `Import`/`ImportFrom` via
//! [`Instruction::EvalClassDef`](crate::bytecode::Instruction::EvalClassDef) /
//! `EvalExpr` / `EvalImport`.

use indexmap::IndexMap;

use crate::ast::{
    AssignTarget, BoolOp, ClassDef, Constant, Expr, ExprKind, FStringPart, Module, Statement, StatementKind,
};
use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::{HeapData, ScriptClass, ScriptInstance};
use crate::namespace::{CallSiteRecord, Context, ContextId, Contexts};
use crate::numeric::Numeric;
use crate::runtime::Runtime;
use crate::value::Value;

/// Signals a non-local jump while walking statements: normal completion,
/// `return`, `break`, or `continue` (the evaluator's analogue of the VM's
/// `Context::has_returned`/`break_flag`/`continue_flag`, used directly here
/// instead of flag polling since the evaluator recurses structurally).
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Executes a whole module's top-level statements directly (uncompiled path).
pub fn exec_module(module: &Module, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    match exec_block(&module.body, ctx, rt)? {
        Flow::Normal | Flow::Return(_) => Ok(()),
        Flow::Break | Flow::Continue => Err(RunError::simple(ExcType::RuntimeError, "'break'/'continue' outside loop")),
    }
}

/// Executes a function body (uncompiled path, called from
/// [`crate::runtime::Runtime::call_value`]).
pub fn exec_function_body(body: &[Statement], ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    match exec_block(body, ctx, rt)? {
        Flow::Return(v) => Ok(v),
        _ => Ok(Value::None),
    }
}

/// Executes one raw statement (used for `Instruction::EvalImport`, and as the
/// general entry point the VM falls back to).
pub fn exec_statement(stmt: &Statement, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    match exec_one(stmt, ctx, rt)? {
        Flow::Normal | Flow::Return(_) => Ok(()),
        Flow::Break | Flow::Continue => Err(RunError::simple(ExcType::RuntimeError, "'break'/'continue' outside loop")),
    }
}

fn exec_block(stmts: &[Statement], ctx: ContextId, rt: &mut Runtime) -> RunResult<Flow> {
    for stmt in stmts {
        match exec_one(stmt, ctx, rt)? {
            Flow::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Flow::Normal)
}

#[allow(clippy::too_many_lines)]
fn exec_one(stmt: &Statement, ctx: ContextId, rt: &mut Runtime) -> RunResult<Flow> {
    match &stmt.kind {
        StatementKind::Pass => Ok(Flow::Normal),
        StatementKind::Expr(expr) => {
            eval_expr(expr, ctx, rt)?;
            Ok(Flow::Normal)
        }
        StatementKind::Global(names) => {
            rt.contexts.get_mut(ctx).declared_global.extend(names.iter().copied());
            Ok(Flow::Normal)
        }
        StatementKind::Nonlocal(names) => {
            rt.contexts.get_mut(ctx).declared_nonlocal.extend(names.iter().copied());
            Ok(Flow::Normal)
        }
        StatementKind::Assign { targets, value } => {
            let v = eval_expr(value, ctx, rt)?;
            for target in targets {
                assign_target(target, v, ctx, rt)?;
            }
            Ok(Flow::Normal)
        }
        StatementKind::AnnAssign { target, value } => {
            if let Some(value) = value {
                let v = eval_expr(value, ctx, rt)?;
                assign_target(target, v, ctx, rt)?;
            }
            Ok(Flow::Normal)
        }
        StatementKind::AugAssign { target, op, value } => {
            let current = read_target(target, ctx, rt)?;
            let rhs = eval_expr(value, ctx, rt)?;
            let result = rt.binary(*op, current, rhs)?;
            assign_target(target, result, ctx, rt)?;
            Ok(Flow::Normal)
        }
        StatementKind::Delete(targets) => {
            for target in targets {
                delete_target(target, ctx, rt)?;
            }
            Ok(Flow::Normal)
        }
        StatementKind::If { test, body, orelse } => {
            if eval_expr(test, ctx, rt)?.is_truthy(rt.heap) {
                exec_block(body, ctx, rt)
            } else {
                exec_block(orelse, ctx, rt)
            }
        }
        StatementKind::While { test, body } => {
            while eval_expr(test, ctx, rt)?.is_truthy(rt.heap) {
                match exec_block(body, ctx, rt)? {
                    Flow::Break => break,
                    Flow::Continue | Flow::Normal => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            }
            Ok(Flow::Normal)
        }
        StatementKind::For { target, iter, body } => {
            let container = eval_expr(iter, ctx, rt)?;
            let seq_iter = rt.make_iterator(container)?;
            while rt.iterator_has_next(seq_iter)? {
                let item = rt.iterator_next(seq_iter)?;
                assign_target(target, item, ctx, rt)?;
                match exec_block(body, ctx, rt)? {
                    Flow::Break => break,
                    Flow::Continue | Flow::Normal => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            }
            Ok(Flow::Normal)
        }
        StatementKind::Break => Ok(Flow::Break),
        StatementKind::Continue => Ok(Flow::Continue),
        StatementKind::Return(value) => {
            let v = match value {
                Some(expr) => eval_expr(expr, ctx, rt)?,
                None => Value::None,
            };
            Ok(Flow::Return(v))
        }
        StatementKind::Raise { exc, cause } => {
            let _ = cause;
            match exc {
                Some(expr) => {
                    let v = eval_expr(expr, ctx, rt)?;
                    Err(raise_value(rt, v))
                }
                None => match rt.contexts.get(ctx).active_exception.clone() {
                    Some(err) => Err(err),
                    None => Err(RunError::simple(ExcType::RuntimeError, "no active exception to re-raise")),
                },
            }
        }
        StatementKind::Try { body, handlers, orelse, finalbody } => exec_try(body, handlers, orelse, finalbody, ctx, rt),
        StatementKind::FunctionDef(def) => {
            let bound = crate::function::BoundFunction {
                body: crate::function::FunctionBody::Def(def.clone()),
                enclosing: ctx,
                compiled: None,
                captured_generation: rt.generation.current(),
            };
            let id = rt.heap.alloc(HeapData::BoundFunction(bound));
            rt.contexts.write_name(ctx, def.name, Value::BoundFunction(id));
            Ok(Flow::Normal)
        }
        StatementKind::ClassDef(class) => {
            exec_class_def(class, ctx, rt)?;
            Ok(Flow::Normal)
        }
        StatementKind::Import { names } => {
            crate::module_system::exec_import(names, ctx, rt)?;
            Ok(Flow::Normal)
        }
        StatementKind::ImportFrom { module, names, is_star } => {
            crate::module_system::exec_import_from(module, names, *is_star, ctx, rt)?;
            Ok(Flow::Normal)
        }
    }
}

fn exec_try(
    body: &[Statement],
    handlers: &[crate::ast::ExceptHandler],
    orelse: &[Statement],
    finalbody: &[Statement],
    ctx: ContextId,
    rt: &mut Runtime,
) -> RunResult<Flow> {
    let result = match exec_block(body, ctx, rt) {
        Ok(flow) => match exec_block(orelse, ctx, rt) {
            Ok(Flow::Normal) => Ok(flow),
            other => other,
        },
        Err(err) => {
            let mut handled = None;
            for handler in handlers {
                let matches = match &handler.types {
                    Some(types) => {
                        let mut any = false;
                        for ty in types {
                            let t = eval_expr(ty, ctx, rt)?;
                            if rt.exception_matches(t, &err) {
                                any = true;
                                break;
                            }
                        }
                        any
                    }
                    None => true,
                };
                if matches {
                    if let Some(name) = handler.name {
                        rt.contexts.get_mut(ctx).active_exception = Some(err.clone());
                        let v = load_active_exception(ctx, rt);
                        rt.contexts.write_name(ctx, name, v);
                    }
                    handled = Some(exec_block(&handler.body, ctx, rt));
                    rt.contexts.get_mut(ctx).active_exception = None;
                    break;
                }
            }
            match handled {
                Some(r) => r,
                None => Err(err),
            }
        }
    };
    let finally_flow = exec_block(finalbody, ctx, rt)?;
    match finally_flow {
        Flow::Normal => result,
        other => Ok(other),
    }
}

fn load_active_exception(ctx: ContextId, rt: &mut Runtime) -> Value {
    let active = rt.contexts.get(ctx).active_exception.clone().expect("active exception set");
    match active.payload {
        crate::exception::ExcPayload::ScriptInstance(v) => v,
        crate::exception::ExcPayload::Simple { kind, message } => Value::Exception(rt.heap.alloc(HeapData::Exception { kind, message })),
        crate::exception::ExcPayload::HostEscaped { host_type_name, message } => {
            Value::Exception(rt.heap.alloc(HeapData::Exception { kind: ExcType::RuntimeError, message: format!("{host_type_name}: {message}") }))
        }
    }
}

fn raise_value(rt: &mut Runtime, exc: Value) -> RunError {
    match exc {
        Value::ExceptionClass(kind) => RunError::simple(kind, kind.to_string()),
        Value::Exception(id) => {
            let HeapData::Exception { kind, message } = rt.heap.get(id) else { unreachable!() };
            RunError::simple(*kind, message.clone())
        }
        Value::ScriptInstance(_) => RunError::script(exc),
        _ => RunError::simple(ExcType::RuntimeError, "exceptions must derive from BaseException"),
    }
}

/// Executes one `ClassDef` (§4.2, §4.10): builds a [`ScriptClass`], splits
/// out the dataclass synthetic members if decorated, and binds the class
/// name in `ctx`.
pub fn exec_class_def(class: &ClassDef, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    let base = match class.bases.first() {
        Some(expr) => match eval_expr(expr, ctx, rt)? {
            Value::ScriptClass(id) => Some(id),
            _ => None,
        },
        None => None,
    };

    let mut instance_methods = IndexMap::new();
    let mut class_methods = IndexMap::new();
    let mut constructor = None;
    for member in &class.body {
        if let StatementKind::FunctionDef(def) = &member.kind {
            let bound = crate::function::BoundFunction {
                body: crate::function::FunctionBody::Def(def.clone()),
                enclosing: ctx,
                compiled: None,
                captured_generation: rt.generation.current(),
            };
            let id = rt.heap.alloc(HeapData::BoundFunction(bound));
            let name_str = rt.interns.resolve(def.name).to_owned();
            if name_str == "__init__" {
                constructor = Some(id);
            } else if def.decorators.classmethod || def.decorators.staticmethod {
                class_methods.insert(def.name, (def.decorators.staticmethod, id));
            } else {
                instance_methods.insert(def.name, id);
            }
        }
    }

    let is_dataclass = class.decorators.dataclass.is_some();
    let frozen = class.decorators.dataclass.map(|d| d.frozen).unwrap_or(false);
    let dataclass_fields = if is_dataclass { crate::dataclass::collect_fields(class, rt)? } else { Vec::new() };

    let script_class = ScriptClass {
        name: class.name,
        frozen,
        is_dataclass,
        dataclass_fields,
        constructor,
        instance_methods,
        class_methods,
        hash_override: None,
        str_override: None,
        base,
    };
    let class_id = rt.heap.alloc(HeapData::ScriptClass(script_class));
    rt.contexts.write_name(ctx, class.name, Value::ScriptClass(class_id));
    Ok(())
}

fn assign_target(target: &AssignTarget, value: Value, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    match target {
        AssignTarget::Name(name) => {
            rt.contexts.write_name(ctx, *name, value);
            Ok(())
        }
        AssignTarget::Attribute { value: recv_expr, attr } => {
            let recv = eval_expr(recv_expr, ctx, rt)?;
            let name_str = rt.interns.resolve(*attr).to_owned();
            rt.set_attr(recv, &name_str, value)
        }
        AssignTarget::Subscript { value: recv_expr, index } => {
            let recv = eval_expr(recv_expr, ctx, rt)?;
            let idx = eval_expr(index, ctx, rt)?;
            rt.set_subscript(recv, idx, value)
        }
        AssignTarget::Tuple(parts) => {
            let items = sequence_items(rt, value)?;
            if items.len() != parts.len() {
                return Err(RunError::simple(ExcType::ValueError, format!("expected {} values to unpack, got {}", parts.len(), items.len())));
            }
            for (part, item) in parts.iter().zip(items) {
                assign_target(part, item, ctx, rt)?;
            }
            Ok(())
        }
        AssignTarget::Starred(_) => Err(RunError::simple(ExcType::RuntimeError, "starred assignment targets are not supported")),
    }
}

fn read_target(target: &AssignTarget, ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    match target {
        AssignTarget::Name(name) => rt
            .contexts
            .read_name(ctx, *name)
            .ok_or_else(|| RunError::simple(ExcType::NameError, format!("name '{}' is not defined", rt.interns.resolve(*name)))),
        AssignTarget::Attribute { value, attr } => {
            let recv = eval_expr(value, ctx, rt)?;
            let name_str = rt.interns.resolve(*attr).to_owned();
            rt.get_attr(recv, &name_str)
        }
        AssignTarget::Subscript { value, index } => {
            let recv = eval_expr(value, ctx, rt)?;
            let idx = eval_expr(index, ctx, rt)?;
            rt.get_subscript(recv, idx)
        }
        AssignTarget::Tuple(_) | AssignTarget::Starred(_) => {
            Err(RunError::simple(ExcType::RuntimeError, "cannot use a compound target in an augmented assignment"))
        }
    }
}

fn delete_target(target: &AssignTarget, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    match target {
        AssignTarget::Name(name) => {
            if !rt.contexts.delete_name(ctx, *name) {
                return Err(RunError::simple(ExcType::NameError, format!("name '{}' is not defined", rt.interns.resolve(*name))));
            }
            Ok(())
        }
        AssignTarget::Attribute { value, attr } => {
            let recv = eval_expr(value, ctx, rt)?;
            let name_str = rt.interns.resolve(*attr).to_owned();
            rt.del_attr(recv, &name_str)
        }
        AssignTarget::Subscript { value, index } => {
            let recv = eval_expr(value, ctx, rt)?;
            let idx = eval_expr(index, ctx, rt)?;
            rt.del_subscript(recv, idx)
        }
        _ => Err(RunError::simple(ExcType::RuntimeError, "unsupported delete target")),
    }
}

fn sequence_items(rt: &mut Runtime, container: Value) -> RunResult<Vec<Value>> {
    let iter = rt.make_iterator(container)?;
    let mut out = Vec::new();
    while rt.iterator_has_next(iter)? {
        out.push(rt.iterator_next(iter)?);
    }
    Ok(out)
}

#[allow(clippy::too_many_lines)]
pub fn eval_expr(expr: &Expr, ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    match &expr.kind {
        ExprKind::Constant(c) => Ok(constant_value(c, rt)),
        ExprKind::Name(name) => rt
            .contexts
            .read_name(ctx, *name)
            .ok_or_else(|| RunError::simple(ExcType::NameError, format!("name '{}' is not defined", rt.interns.resolve(*name)))),
        ExprKind::JavaClassKeyword => Ok(Value::None),
        ExprKind::Starred(inner) => eval_expr(inner, ctx, rt),
        ExprKind::Tuple(items) => {
            let values = eval_list(items, ctx, rt)?;
            Ok(Value::Tuple(rt.heap.alloc(HeapData::Tuple(values))))
        }
        ExprKind::List(items) => {
            let values = eval_list(items, ctx, rt)?;
            Ok(Value::List(rt.heap.alloc(HeapData::List(values))))
        }
        ExprKind::Set(items) => {
            let values = eval_list(items, ctx, rt)?;
            Ok(Value::Set(rt.heap.alloc(HeapData::Set(values))))
        }
        ExprKind::Dict { keys, values } => {
            let mut map = IndexMap::new();
            for (k, v) in keys.iter().zip(values) {
                let Some(k) = k else {
                    return Err(RunError::simple(ExcType::RuntimeError, "'**' dict spread is not supported"));
                };
                let kv = eval_expr(k, ctx, rt)?;
                let vv = eval_expr(v, ctx, rt)?;
                map.insert(kv, vv);
            }
            Ok(Value::Dict(rt.heap.alloc(HeapData::Dict(map))))
        }
        ExprKind::UnaryOp(op, inner) => {
            let v = eval_expr(inner, ctx, rt)?;
            rt.unary(*op, v)
        }
        ExprKind::BinOp(lhs, op, rhs) => {
            let l = eval_expr(lhs, ctx, rt)?;
            let r = eval_expr(rhs, ctx, rt)?;
            rt.binary(*op, l, r)
        }
        ExprKind::BoolOp(op, items) => eval_bool_op(*op, items, ctx, rt),
        ExprKind::Compare(first, rest) => {
            let mut lhs = eval_expr(first, ctx, rt)?;
            let mut result = Value::Bool(true);
            for (op, rhs_expr) in rest {
                let rhs = eval_expr(rhs_expr, ctx, rt)?;
                result = rt.compare(*op, lhs, rhs)?;
                if !result.is_truthy(rt.heap) {
                    return Ok(Value::Bool(false));
                }
                lhs = rhs;
            }
            Ok(result)
        }
        ExprKind::IfExp { test, body, orelse } => {
            if eval_expr(test, ctx, rt)?.is_truthy(rt.heap) {
                eval_expr(body, ctx, rt)
            } else {
                eval_expr(orelse, ctx, rt)
            }
        }
        ExprKind::Call { func, args, keywords } => eval_call(func, args, keywords, ctx, rt),
        ExprKind::Attribute { value, attr, .. } => {
            let recv = eval_expr(value, ctx, rt)?;
            let name_str = rt.interns.resolve(*attr).to_owned();
            rt.get_attr(recv, &name_str)
        }
        ExprKind::Subscript { value, index } => {
            let recv = eval_expr(value, ctx, rt)?;
            let idx = eval_expr(index, ctx, rt)?;
            rt.get_subscript(recv, idx)
        }
        ExprKind::Slice { lower, upper, step } => {
            let lower = eval_slice_bound(lower.as_deref(), ctx, rt)?;
            let upper = eval_slice_bound(upper.as_deref(), ctx, rt)?;
            let step = eval_slice_bound(step.as_deref(), ctx, rt)?;
            Ok(Value::Slice(rt.heap.alloc(HeapData::Slice { lower, upper, step })))
        }
        ExprKind::Lambda { params, body } => {
            let bound = crate::function::BoundFunction {
                body: crate::function::FunctionBody::Lambda { params: params.clone(), body: body.clone() },
                enclosing: ctx,
                compiled: None,
                captured_generation: rt.generation.current(),
            };
            Ok(Value::Lambda(rt.heap.alloc(HeapData::Lambda(bound))))
        }
        ExprKind::ListComp { element, generators } => eval_list_comp(element, generators, ctx, rt),
        ExprKind::JoinedStr(template) => eval_fstring(template, ctx, rt),
        ExprKind::NamedExpr { target, value } => {
            let v = eval_expr(value, ctx, rt)?;
            rt.contexts.write_name(ctx, *target, v);
            Ok(v)
        }
    }
}

fn constant_value(c: &Constant, rt: &mut Runtime) -> Value {
    match c {
        Constant::None => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Num(Numeric::from_int_literal(*i)),
        Constant::Float(f) => Value::Num(Numeric::Double(*f)),
        Constant::Str(s) => Value::Str(rt.heap.alloc(HeapData::Str(s.clone()))),
    }
}

fn eval_list(items: &[Expr], ctx: ContextId, rt: &mut Runtime) -> RunResult<Vec<Value>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let ExprKind::Starred(inner) = &item.kind {
            let v = eval_expr(inner, ctx, rt)?;
            out.extend(sequence_items(rt, v)?);
        } else {
            out.push(eval_expr(item, ctx, rt)?);
        }
    }
    Ok(out)
}

fn eval_slice_bound(expr: Option<&Expr>, ctx: ContextId, rt: &mut Runtime) -> RunResult<Option<i64>> {
    match expr {
        None => Ok(None),
        Some(e) => match eval_expr(e, ctx, rt)? {
            Value::None => Ok(None),
            Value::Num(n) => Ok(Some(n.as_i64())),
            other => Err(RunError::simple(ExcType::TypeError, format!("slice indices must be integers: {}", other.type_name(rt.heap)))),
        },
    }
}

fn eval_bool_op(op: BoolOp, items: &[Expr], ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    let mut last = Value::Bool(op == BoolOp::And);
    for item in items {
        last = eval_expr(item, ctx, rt)?;
        match op {
            BoolOp::And if !last.is_truthy(rt.heap) => return Ok(last),
            BoolOp::Or if last.is_truthy(rt.heap) => return Ok(last),
            _ => {}
        }
    }
    Ok(last)
}

fn eval_call(func: &Expr, args: &[Expr], keywords: &[crate::ast::Keyword], ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    if let ExprKind::JavaClassKeyword = &func.kind {
        let pretty = args.first().map(|a| match &a.kind {
            ExprKind::Constant(Constant::Str(s)) => s.clone(),
            _ => String::new(),
        });
        if let Some(name) = pretty {
            let ty = rt.host.class_loader.load_class(&name)?;
            let class_id = crate::intern::intern_host_class(ty);
            return Ok(Value::HostClass(class_id));
        }
    }
    let callee = eval_expr(func, ctx, rt)?;
    let positional = eval_list(args, ctx, rt)?;
    let mut kw = IndexMap::new();
    for keyword in keywords {
        let v = eval_expr(&keyword.value, ctx, rt)?;
        match keyword.name {
            Some(name) => {
                kw.insert(name, v);
            }
            None => {
                if let Value::Dict(id) = v {
                    let HeapData::Dict(map) = rt.heap.get(id) else { unreachable!() };
                    for (k, val) in map.clone() {
                        if let Value::Str(sid) = k {
                            let s = crate::value::as_str(rt.heap, sid).to_owned();
                            kw.insert(rt.interns.intern(&s), val);
                        }
                    }
                }
            }
        }
    }
    rt.call_value(callee, &positional, &kw)
}

fn eval_list_comp(element: &Expr, generators: &[crate::ast::Comprehension], ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    let comp_ctx = rt.contexts.push(Context::new_call(rt.contexts.get(ctx).global, None, Some(ctx)));
    let mut out = Vec::new();
    eval_comp_level(element, generators, 0, comp_ctx, rt, &mut out)?;
    Ok(Value::List(rt.heap.alloc(HeapData::List(out))))
}

fn eval_comp_level(
    element: &Expr,
    generators: &[crate::ast::Comprehension],
    level: usize,
    ctx: ContextId,
    rt: &mut Runtime,
    out: &mut Vec<Value>,
) -> RunResult<()> {
    let Some(gen) = generators.get(level) else {
        out.push(eval_expr(element, ctx, rt)?);
        return Ok(());
    };
    let container = eval_expr(&gen.iter, ctx, rt)?;
    let iter = rt.make_iterator(container)?;
    while rt.iterator_has_next(iter)? {
        let item = rt.iterator_next(iter)?;
        assign_comp_target(&gen.target, item, ctx, rt)?;
        let mut ok = true;
        for cond in &gen.ifs {
            if !eval_expr(cond, ctx, rt)?.is_truthy(rt.heap) {
                ok = false;
                break;
            }
        }
        if ok {
            eval_comp_level(element, generators, level + 1, ctx, rt, out)?;
        }
    }
    Ok(())
}

fn assign_comp_target(target: &Expr, value: Value, ctx: ContextId, rt: &mut Runtime) -> RunResult<()> {
    match &target.kind {
        ExprKind::Name(name) => {
            rt.contexts.write_name(ctx, *name, value);
            Ok(())
        }
        ExprKind::Tuple(parts) => {
            let items = sequence_items(rt, value)?;
            for (part, item) in parts.iter().zip(items) {
                assign_comp_target(part, item, ctx, rt)?;
            }
            Ok(())
        }
        _ => Err(RunError::simple(ExcType::RuntimeError, "unsupported comprehension target")),
    }
}

fn eval_fstring(template: &crate::ast::FStringTemplate, ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    let mut out = String::new();
    for part in &template.parts {
        match part {
            FStringPart::Literal(s) => out.push_str(s),
            FStringPart::Value { expr, conversion, format_spec } => {
                let v = eval_expr(expr, ctx, rt)?;
                out.push_str(&format_value(rt, v, *conversion, format_spec.as_deref())?);
            }
        }
    }
    Ok(Value::Str(rt.heap.alloc(HeapData::Str(out))))
}

/// Renders one `{expr[!conv][:spec]}` replacement field (§C f-string
/// subset): `!r`/`!s` conversion, then a `[[fill]align][0][width][.precision]
/// [type]` format spec covering `d`/`f`/`x`/`X`/`o`/`b`/`%`/`e`/`s`.
fn format_value(rt: &mut Runtime, value: Value, conversion: Option<char>, format_spec: Option<&str>) -> RunResult<String> {
    let base = match conversion {
        Some('r') => rt.repr(value),
        _ => rt.stringify(value),
    };
    let Some(spec) = format_spec.filter(|s| !s.is_empty()) else {
        return Ok(base);
    };
    let mut chars: Vec<char> = spec.chars().collect();

    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^' | '=') {
        fill = chars[0];
        align = Some(chars[1]);
        chars.drain(0..2);
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^' | '=') {
        align = Some(chars[0]);
        chars.remove(0);
    }

    if !chars.is_empty() && matches!(chars[0], '+' | '-' | ' ') {
        chars.remove(0);
    }

    if !chars.is_empty() && chars[0] == '0' {
        chars.remove(0);
        if align.is_none() {
            align = Some('=');
            fill = '0';
        }
    }

    let mut width_digits = String::new();
    while !chars.is_empty() && chars[0].is_ascii_digit() {
        width_digits.push(chars.remove(0));
    }
    let width: usize = width_digits.parse().unwrap_or(0);

    if !chars.is_empty() && chars[0] == ',' {
        chars.remove(0);
    }

    let mut precision = None;
    if !chars.is_empty() && chars[0] == '.' {
        chars.remove(0);
        let mut digits = String::new();
        while !chars.is_empty() && chars[0].is_ascii_digit() {
            digits.push(chars.remove(0));
        }
        precision = digits.parse().ok();
    }

    let type_char = chars.first().copied();
    let formatted = match type_char {
        Some('f' | 'F') => format!("{:.*}", precision.unwrap_or(6), as_f64(value)?),
        Some('d') => format!("{}", as_i64(value)?),
        Some('x') => format!("{:x}", as_i64(value)?),
        Some('X') => format!("{:X}", as_i64(value)?),
        Some('o') => format!("{:o}", as_i64(value)?),
        Some('b') => format!("{:b}", as_i64(value)?),
        Some('%') => format!("{:.*}%", precision.unwrap_or(6), as_f64(value)? * 100.0),
        Some('e') => format!("{:.*e}", precision.unwrap_or(6), as_f64(value)?),
        _ => match precision {
            Some(p) => base.chars().take(p).collect(),
            None => base,
        },
    };

    let is_numeric_type = matches!(type_char, Some('d' | 'f' | 'F' | 'x' | 'X' | 'o' | 'b' | '%' | 'e'));
    let align = align.unwrap_or(if is_numeric_type { '>' } else { '<' });
    Ok(pad(&formatted, width, fill, align))
}

fn as_f64(value: Value) -> RunResult<f64> {
    match value {
        Value::Num(n) => Ok(n.as_f64()),
        Value::Bool(b) => Ok(f64::from(b)),
        other => Err(RunError::simple(ExcType::TypeError, format!("format spec requires a number, got {other:?}"))),
    }
}

fn as_i64(value: Value) -> RunResult<i64> {
    match value {
        Value::Num(n) => Ok(n.as_i64()),
        Value::Bool(b) => Ok(i64::from(b)),
        other => Err(RunError::simple(ExcType::TypeError, format!("format spec requires a number, got {other:?}"))),
    }
}

fn pad(s: &str, width: usize, fill: char, align: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_owned();
    }
    let gap = width - len;
    match align {
        '<' => format!("{s}{}", fill.to_string().repeat(gap)),
        '^' => {
            let left = gap / 2;
            let right = gap - left;
            format!("{}{s}{}", fill.to_string().repeat(left), fill.to_string().repeat(right))
        }
        _ => format!("{}{s}", fill.to_string().repeat(gap)),
    }
}
