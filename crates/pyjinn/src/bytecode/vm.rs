//! Stack-based virtual machine (§3.2, §4.5): executes one [`Code`] object
//! against a [`Context`]'s data stack, consulting the exception table on a
//! raised error (§4.5 "the VM consults the active `Code` object's exception
//! table for the minimal enclosing range").

use indexmap::IndexMap;

use crate::ast::Constant;
use crate::bytecode::instr::{Code, Instruction};
use crate::exception::{ExcPayload, RunError, RunResult};
use crate::heap::HeapData;
use crate::intern::StringId;
use crate::namespace::ContextId;
use crate::runtime::Runtime;
use crate::value::Value;

/// Runs `code` in `ctx` to completion, returning the function's return value
/// (or `Value::None` for a module-level run that never executes `Return`).
pub fn run(code: &Code, ctx: ContextId, rt: &mut Runtime) -> RunResult<Value> {
    rt.contexts.get_mut(ctx).ip = 0;
    loop {
        let ip = rt.contexts.get(ctx).ip;
        if ip >= code.instructions.len() {
            return Ok(rt.contexts.get_mut(ctx).return_value.take().unwrap_or(Value::None));
        }
        match step(code, ip, ctx, rt) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => {
                if !handle_exception(code, ip, ctx, rt, err)? {
                    // No handler in this frame's `Code`: propagate to the caller.
                    return Err(rt.contexts.get_mut(ctx).active_exception.take().unwrap());
                }
            }
        }
    }
}

/// Truncates the data stack and jumps to a handler, if `code` has one
/// covering `ip`; otherwise records the exception as active and reports
/// "no handler" to the caller via `Ok(false)`.
fn handle_exception(code: &Code, ip: usize, ctx: ContextId, rt: &mut Runtime, err: RunError) -> RunResult<bool> {
    let Some(range) = code.find_handler(ip) else {
        rt.contexts.get_mut(ctx).active_exception = Some(err);
        return Ok(false);
    };
    let c = rt.contexts.get_mut(ctx);
    c.data_stack.truncate(range.initial_stack_depth);
    c.active_exception = Some(err);
    c.ip = range.target_ip;
    let _ = range.clause;
    Ok(true)
}

/// Executes the single instruction at `ip`. Returns `Ok(Some(value))` only
/// when the instruction is `FunctionReturn` (the body is finished); any other
/// instruction advances `ip` and returns `Ok(None)`.
fn step(code: &Code, ip: usize, ctx: ContextId, rt: &mut Runtime) -> RunResult<Option<Value>> {
    let instr = &code.instructions[ip];
    let mut next_ip = ip + 1;

    macro_rules! pop {
        () => {
            rt.contexts.get_mut(ctx).data_stack.pop().expect("stack underflow")
        };
    }
    macro_rules! push {
        ($v:expr) => {
            rt.contexts.get_mut(ctx).data_stack.push($v)
        };
    }

    match instr {
        Instruction::LoadConst(v) => push!(*v),
        Instruction::LoadConstStr(idx) => {
            let s = code.string_constants[*idx].clone();
            let id = rt.heap.alloc(HeapData::Str(s));
            push!(Value::Str(id));
        }
        Instruction::LoadJavaClassKeyword => {
            // Resolved lazily: only meaningful when immediately called, at
            // which point `Call` sees a callable-shaped placeholder here.
            push!(Value::None);
        }
        Instruction::Pop => {
            pop!();
        }
        Instruction::Dup => {
            let top = *rt.contexts.get(ctx).data_stack.last().expect("stack underflow");
            push!(top);
        }
        Instruction::Star => {}
        Instruction::LoadIdentifier(name) => {
            let v = rt.contexts.read_name(ctx, *name).ok_or_else(|| name_error(rt, *name))?;
            push!(v);
        }
        Instruction::AssignVariable(name) => {
            let v = pop!();
            rt.contexts.write_name(ctx, *name, v);
        }
        Instruction::DeleteVariable(name) => {
            if !rt.contexts.delete_name(ctx, *name) {
                return Err(name_error(rt, *name));
            }
        }
        Instruction::UnpackSequence(n) => {
            let container = pop!();
            let items = sequence_items(rt, container)?;
            if items.len() != *n {
                return Err(RunError::simple(
                    crate::exception::ExcType::ValueError,
                    format!("expected {n} values to unpack, got {}", items.len()),
                ));
            }
            for item in items.into_iter().rev() {
                push!(item);
            }
        }
        Instruction::IterableIterator => {
            let container = pop!();
            let iter = rt.make_iterator(container)?;
            push!(iter);
        }
        Instruction::IteratorHasNext => {
            let iter = *rt.contexts.get(ctx).data_stack.last().expect("stack underflow");
            push!(Value::Bool(rt.iterator_has_next(iter)?));
        }
        Instruction::IteratorNext => {
            let iter = *rt.contexts.get(ctx).data_stack.last().expect("stack underflow");
            let v = rt.iterator_next(iter)?;
            push!(v);
        }
        Instruction::Jump(target) => next_ip = *target,
        Instruction::PopJumpIfFalse(target) => {
            let v = pop!();
            if !v.is_truthy(rt.heap) {
                next_ip = *target;
            }
        }
        Instruction::PopJumpIfTrue(target) => {
            let v = pop!();
            if v.is_truthy(rt.heap) {
                next_ip = *target;
            }
        }
        Instruction::JumpIfFalseOrPop(target) => {
            let v = *rt.contexts.get(ctx).data_stack.last().expect("stack underflow");
            if v.is_truthy(rt.heap) {
                pop!();
            } else {
                next_ip = *target;
            }
        }
        Instruction::JumpIfTrueOrPop(target) => {
            let v = *rt.contexts.get(ctx).data_stack.last().expect("stack underflow");
            if v.is_truthy(rt.heap) {
                next_ip = *target;
            } else {
                pop!();
            }
        }
        Instruction::Unary(op) => {
            let v = pop!();
            push!(rt.unary(*op, v)?);
        }
        Instruction::Binary(op) => {
            let rhs = pop!();
            let lhs = pop!();
            push!(rt.binary(*op, lhs, rhs)?);
        }
        Instruction::Compare(op) => {
            let rhs = pop!();
            let lhs = pop!();
            push!(rt.compare(*op, lhs, rhs)?);
        }
        Instruction::LoadTuple(n) => {
            let items = pop_n(rt, ctx, *n);
            let id = rt.heap.alloc(HeapData::Tuple(items));
            push!(Value::Tuple(id));
        }
        Instruction::LoadList(n) => {
            let items = pop_n(rt, ctx, *n);
            let id = rt.heap.alloc(HeapData::List(items));
            push!(Value::List(id));
        }
        Instruction::LoadSet(n) => {
            let items = pop_n(rt, ctx, *n);
            let id = rt.heap.alloc(HeapData::Set(items));
            push!(Value::Set(id));
        }
        Instruction::LoadDict(n) => {
            let mut map = IndexMap::new();
            let flat = pop_n(rt, ctx, n * 2);
            for pair in flat.chunks(2) {
                map.insert(pair[0], pair[1]);
            }
            let id = rt.heap.alloc(HeapData::Dict(map));
            push!(Value::Dict(id));
        }
        Instruction::BuildSlice => {
            let step = pop!();
            let upper = pop!();
            let lower = pop!();
            let id = rt.heap.alloc(HeapData::Slice {
                lower: int_or_none(lower),
                upper: int_or_none(upper),
                step: int_or_none(step),
            });
            push!(Value::Slice(id));
        }
        Instruction::Call { nargs, star_positions, kwarg_names, filename, lineno } => {
            let total_kw = kwarg_names.len();
            let mut kw_values = pop_n(rt, ctx, total_kw);
            let mut positional = pop_n(rt, ctx, *nargs);
            if !star_positions.is_empty() {
                let mut expanded = Vec::new();
                for (i, v) in positional.into_iter().enumerate() {
                    if star_positions.contains(&i) {
                        expanded.extend(sequence_items(rt, v)?);
                    } else {
                        expanded.push(v);
                    }
                }
                positional = expanded;
            }
            let callee = pop!();
            let mut keywords = IndexMap::new();
            for (name, value) in kwarg_names.iter().zip(kw_values.drain(..)) {
                if let Some(n) = name {
                    keywords.insert(*n, value);
                }
            }
            let _ = (filename, lineno);
            let result = rt.call_value(callee, &positional, &keywords)?;
            push!(result);
        }
        Instruction::LoadAttr(name) | Instruction::BoundMethodAttr(name) => {
            let receiver = pop!();
            let name_str = rt.interns.resolve(*name).to_owned();
            let v = rt.get_attr(receiver, &name_str)?;
            push!(v);
        }
        Instruction::StoreAttr(name) => {
            let value = pop!();
            let receiver = pop!();
            let name_str = rt.interns.resolve(*name).to_owned();
            rt.set_attr(receiver, &name_str, value)?;
        }
        Instruction::DeleteAttr(name) => {
            let receiver = pop!();
            let name_str = rt.interns.resolve(*name).to_owned();
            rt.del_attr(receiver, &name_str)?;
        }
        Instruction::LoadSubscript => {
            let index = pop!();
            let container = pop!();
            push!(rt.get_subscript(container, index)?);
        }
        Instruction::StoreSubscript => {
            let value = pop!();
            let index = pop!();
            let container = pop!();
            rt.set_subscript(container, index, value)?;
        }
        Instruction::DeleteSubscript => {
            let index = pop!();
            let container = pop!();
            rt.del_subscript(container, index)?;
        }
        Instruction::BindFunction(idx) => {
            let nested = &code.nested_functions[*idx];
            let body = if nested.is_lambda {
                crate::function::FunctionBody::Lambda {
                    params: nested.params.clone(),
                    body: Box::new(crate::ast::Expr { kind: crate::ast::ExprKind::Constant(Constant::None), line: 0 }),
                }
            } else {
                crate::function::FunctionBody::Def(crate::ast::FunctionDef {
                    name: nested.assign_name.unwrap_or_else(|| rt.interns.intern("<anonymous>")),
                    params: nested.params.clone(),
                    body: Vec::new(),
                    decorators: crate::ast::Decorators::default(),
                    line: 0,
                })
            };
            let bound = crate::function::BoundFunction {
                body,
                enclosing: ctx,
                compiled: Some(nested.body_code.clone()),
                captured_generation: rt.generation.current(),
            };
            let id = rt.heap.alloc(if nested.is_lambda { HeapData::Lambda(bound) } else { HeapData::BoundFunction(bound) });
            let value = if nested.is_lambda { Value::Lambda(id) } else { Value::BoundFunction(id) };
            if let Some(name) = nested.assign_name {
                rt.contexts.write_name(ctx, name, value);
            }
            push!(value);
        }
        Instruction::EvalClassDef(idx) => {
            let class_def = code.class_defs[*idx].clone();
            crate::evaluator::exec_class_def(&class_def, ctx, rt)?;
        }
        Instruction::EvalExpr(idx) => {
            let expr = code.comprehension_exprs[*idx].clone();
            let v = crate::evaluator::eval_expr(&expr, ctx, rt)?;
            push!(v);
        }
        Instruction::EvalImport(idx) => {
            let stmt = code.import_stmts[*idx].clone();
            crate::evaluator::exec_statement(&stmt, ctx, rt)?;
        }
        Instruction::Raise => {
            let exc = pop!();
            return Err(raise_value(rt, exc));
        }
        Instruction::TestExceptMatch(n) => {
            let types = pop_n(rt, ctx, *n);
            let active = rt.contexts.get(ctx).active_exception.clone().expect("TestExceptMatch without active exception");
            let matched = types.into_iter().any(|t| rt.exception_matches(t, &active));
            push!(Value::Bool(matched));
        }
        Instruction::LoadActiveException => {
            let active = rt.contexts.get(ctx).active_exception.clone().expect("LoadActiveException without active exception");
            let v = match active.payload {
                ExcPayload::ScriptInstance(v) => v,
                ExcPayload::Simple { kind, message } => Value::Exception(rt.heap.alloc(HeapData::Exception { kind, message })),
                ExcPayload::HostEscaped { host_type_name, message } => {
                    Value::Exception(rt.heap.alloc(HeapData::Exception { kind: crate::exception::ExcType::RuntimeError, message: format!("{host_type_name}: {message}") }))
                }
            };
            push!(v);
        }
        Instruction::FunctionReturn => {
            let v = pop!();
            return Ok(Some(v));
        }
        Instruction::SwallowException => {
            rt.contexts.get_mut(ctx).active_exception = None;
        }
        Instruction::RethrowException => {
            if let Some(err) = rt.contexts.get_mut(ctx).active_exception.take() {
                return Err(err);
            }
        }
        Instruction::Pass => {}
        Instruction::PopIteratorForReturn => {
            pop!();
        }
        Instruction::DeclareScope => {}
    }
    rt.contexts.get_mut(ctx).ip = next_ip;
    Ok(None)
}

fn pop_n(rt: &mut Runtime, ctx: ContextId, n: usize) -> Vec<Value> {
    let stack = &mut rt.contexts.get_mut(ctx).data_stack;
    let at = stack.len() - n;
    stack.split_off(at)
}

fn sequence_items(rt: &mut Runtime, container: Value) -> RunResult<Vec<Value>> {
    let mut iter = rt.make_iterator(container)?;
    let mut out = Vec::new();
    while rt.iterator_has_next(iter)? {
        out.push(rt.iterator_next(iter)?);
    }
    let _ = &mut iter;
    Ok(out)
}

fn int_or_none(v: Value) -> Option<i64> {
    match v {
        Value::Num(n) => Some(n.as_i64()),
        _ => None,
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
        _ => RunError::simple(crate::exception::ExcType::RuntimeError, "exceptions must derive from BaseException"),
    }
}

fn name_error(rt: &Runtime, name: StringId) -> RunError {
    RunError::simple(crate::exception::ExcType::NameError, format!("name '{}' is not defined", rt.interns.resolve(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Compiler;
    use crate::heap::Heap;
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

    #[test]
    fn runs_simple_arithmetic() {
        use crate::ast::{Constant, Expr, ExprKind, Module, Statement, StatementKind};
        let mut interns = Interns::new();
        let filename = interns.intern("<test>");
        let one = Expr { kind: ExprKind::Constant(Constant::Int(1)), line: 1 };
        let two = Expr { kind: ExprKind::Constant(Constant::Int(2)), line: 1 };
        let sum = Expr { kind: ExprKind::BinOp(Box::new(one), crate::ast::BinOp::Add, Box::new(two)), line: 1 };
        let module = Module { body: vec![Statement { kind: StatementKind::Return(Some(sum)), line: 1 }] };

        let code = Compiler::compile_module(&module, filename).expect("compiles");

        let mut heap = Heap::new();
        let mut contexts = Contexts::new();
        let host = HostEnv {
            reflection: std::sync::Arc::new(NoHost),
            class_loader: std::sync::Arc::new(NoHost),
            invoker: std::sync::Arc::new(NoHost),
            zombie: std::sync::Arc::new(NoHost),
        };
        let mut proxies = ProxyTable::new();
        let symbols = SymbolCache::new();
        let generation = crate::function::Generation::default();
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
        let ctx = Contexts::global_id();
        let result = run(&code, ctx, &mut rt).expect("runs");
        assert!(matches!(result, Value::Num(n) if n.as_i64() == 3));
    }
}
