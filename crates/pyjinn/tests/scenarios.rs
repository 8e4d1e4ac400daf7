//! End-to-end scenarios (§8 "Testable properties"): each one parses a
//! hand-authored JSON AST, runs it through the tree-walking evaluator via the
//! embedding API, and checks the exact stdout `print` produces.

use std::sync::Arc;

use pyjinn::{
    HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle, IoHost,
    RunError, RunResult, Script, Value, ZombieCallbackHandler,
};
use serde_json::json;

/// A host with no reflective types, for the scenarios that never touch host
/// interop. Every reflective query is unreachable: nothing in these fixtures
/// constructs a `JavaClass(...)`.
struct NullHost;
impl HostReflectionProvider for NullHost {
    fn constructors(&self, _ty: &HostTypeHandle) -> Vec<HostExecutable> {
        Vec::new()
    }
    fn methods(&self, _ty: &HostTypeHandle, _pretty_name: &str) -> Vec<HostExecutable> {
        Vec::new()
    }
    fn fields(&self, _ty: &HostTypeHandle) -> Vec<HostField> {
        Vec::new()
    }
    fn nested_types(&self, _ty: &HostTypeHandle) -> Vec<HostTypeHandle> {
        Vec::new()
    }
    fn superclass(&self, _ty: &HostTypeHandle) -> Option<HostTypeHandle> {
        None
    }
    fn superinterfaces(&self, _ty: &HostTypeHandle) -> Vec<HostTypeHandle> {
        Vec::new()
    }
    fn pretty_field_to_runtime(&self, _ty: &HostTypeHandle, _pretty_name: &str) -> Option<String> {
        None
    }
    fn functional_interface_method(&self, _ty: &HostTypeHandle) -> Option<String> {
        None
    }
    fn abstract_methods(&self, _ty: &HostTypeHandle) -> Vec<String> {
        Vec::new()
    }
    fn is_assignable(&self, from: &HostTypeHandle, to: &HostTypeHandle) -> bool {
        from == to
    }
}
impl HostClassLoader for NullHost {
    fn load_class(&self, pretty_name: &str) -> RunResult<HostTypeHandle> {
        Err(RunError::simple(pyjinn::ExcType::NameError, format!("no host class '{pretty_name}'")))
    }
}
impl HostInvoker for NullHost {
    fn invoke_constructor(&self, _ctor: &HostExecutable, _args: &[Value]) -> RunResult<Value> {
        unreachable!("these fixtures never construct a host object")
    }
    fn invoke_method(&self, _method: &HostExecutable, _receiver: &Value, _args: &[Value]) -> RunResult<Value> {
        unreachable!("these fixtures never call a host method")
    }
    fn get_field(&self, _field: &HostField, _receiver: Option<&Value>) -> RunResult<Value> {
        unreachable!()
    }
    fn set_field(&self, _field: &HostField, _receiver: Option<&Value>, _value: Value) -> RunResult<()> {
        unreachable!()
    }
    fn describe_value(&self, _value: &Value) -> String {
        String::new()
    }
}
impl ZombieCallbackHandler for NullHost {
    fn on_zombie_call(&self, _filename: &str, _callable_description: &str, _call_count: u64) {}
}

fn null_host() -> HostEnv {
    let host = Arc::new(NullHost);
    HostEnv { reflection: host.clone(), class_loader: host.clone(), invoker: host.clone(), zombie: host }
}

/// Captures everything written to stdout; these fixtures never write stderr
/// or exit the process.
#[derive(Default)]
struct CaptureIo {
    stdout: String,
}
impl IoHost for CaptureIo {
    fn write_stdout(&mut self, s: &str) {
        self.stdout.push_str(s);
    }
    fn write_stderr(&mut self, _s: &str) {}
    fn read_module(&self, canonical_path: &str) -> RunResult<String> {
        Err(RunError::simple(pyjinn::ExcType::ImportError, format!("no module '{canonical_path}' in this fixture")))
    }
    fn resolve_module(&self, dotted_name: &str) -> RunResult<String> {
        Ok(format!("{}.pyjson", dotted_name.replace('.', "/")))
    }
    fn process_exit(&mut self, _status: i32) {}
}

fn run(body: serde_json::Value) -> String {
    let module = json!({"type": "Module", "body": body});
    let mut script = Script::new(null_host(), indexmap::IndexMap::new());
    script.parse_main("fixture.pyjson", &module).expect("parse");
    let mut io = CaptureIo::default();
    script.execute(&mut io, false).expect("execute");
    io.stdout
}

fn name(id: &str) -> serde_json::Value {
    json!({"type": "Name", "id": id})
}

fn int(v: i64) -> serde_json::Value {
    json!({"type": "Constant", "typename": "int", "value": v})
}

fn str_const(s: &str) -> serde_json::Value {
    json!({"type": "Constant", "typename": "str", "value": s})
}

fn no_args() -> serde_json::Value {
    json!({"args": [], "defaults": [], "vararg": null, "kwonlyargs": [], "kw_defaults": [], "kwarg": null})
}

fn call(func: serde_json::Value, args: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"type": "Call", "func": func, "args": args, "keywords": []})
}

fn expr_stmt(value: serde_json::Value) -> serde_json::Value {
    json!({"type": "Expr", "value": value})
}

fn assign(target: &str, value: serde_json::Value) -> serde_json::Value {
    json!({"type": "Assign", "targets": [name(target)], "value": value})
}

#[test]
fn closures_and_nonlocal() {
    // def mk():
    //   x = 0
    //   def inc():
    //     nonlocal x
    //     x = x + 1
    //     return x
    //   return inc
    // f = mk()
    // print(f(), f(), f())
    let inc = json!({
        "type": "FunctionDef", "name": "inc", "args": no_args(), "decorator_list": [],
        "body": [
            {"type": "Nonlocal", "names": ["x"]},
            assign("x", {"type": "BinOp", "left": name("x"), "op": "Add", "right": int(1)}),
            {"type": "Return", "value": name("x")},
        ],
    });
    let mk = json!({
        "type": "FunctionDef", "name": "mk", "args": no_args(), "decorator_list": [],
        "body": [
            assign("x", int(0)),
            inc,
            {"type": "Return", "value": name("inc")},
        ],
    });
    let body = vec![
        mk,
        assign("f", call(name("mk"), vec![])),
        expr_stmt(call(name("print"), vec![call(name("f"), vec![]), call(name("f"), vec![]), call(name("f"), vec![])])),
    ];
    assert_eq!(run(json!(body)), "1 2 3\n");
}

#[test]
fn dataclass_frozen_equality() {
    // @dataclass(frozen=True)
    // class P:
    //   x: int
    //   y: int
    // print(P(1,2)==P(1,2), P(1,2)==P(1,3))
    let class_def = json!({
        "type": "ClassDef", "name": "P", "bases": [],
        "body": [
            {"type": "AnnAssign", "target": name("x")},
            {"type": "AnnAssign", "target": name("y")},
        ],
        "decorator_list": [{
            "type": "Call",
            "func": name("dataclass"),
            "args": [],
            "keywords": [{"arg": "frozen", "value": {"type": "Constant", "typename": "bool", "value": true}}],
        }],
    });
    let p12 = || call(name("P"), vec![int(1), int(2)]);
    let p13 = || call(name("P"), vec![int(1), int(3)]);
    let body = vec![
        class_def,
        expr_stmt(call(
            name("print"),
            vec![
                json!({"type": "Compare", "left": p12(), "ops": ["Eq"], "comparators": [p12()]}),
                json!({"type": "Compare", "left": p12(), "ops": ["Eq"], "comparators": [p13()]}),
            ],
        )),
    ];
    assert_eq!(run(json!(body)), "True False\n");
}

#[test]
fn try_except_finally_order() {
    // out = []
    // try:
    //   out.append('t')
    //   raise ValueError('x')
    // except ValueError as e:
    //   out.append('e:' + str(e))
    // finally:
    //   out.append('f')
    // print(out)
    let append = |s: serde_json::Value| {
        expr_stmt(json!({
            "type": "Call",
            "func": {"type": "Attribute", "value": name("out"), "attr": "append"},
            "args": [s],
            "keywords": [],
        }))
    };
    let body = vec![
        assign("out", json!({"type": "List", "elts": []})),
        json!({
            "type": "Try",
            "body": [append(str_const("t")), {"type": "Raise", "exc": call(name("ValueError"), vec![str_const("x")])}],
            "handlers": [{
                "type_": name("ValueError"),
                "name": "e",
                "body": [append({
                    "type": "BinOp",
                    "left": str_const("e:"),
                    "op": "Add",
                    "right": call(name("str"), vec![name("e")]),
                })],
            }],
            "orelse": [],
            "finalbody": [append(str_const("f"))],
        }),
        expr_stmt(call(name("print"), vec![name("out")])),
    ];
    assert_eq!(run(json!(body)), "['t', 'e:x', 'f']\n");
}

#[test]
fn for_with_tuple_unpack_and_break() {
    // for i, (a, b) in enumerate([(1,2),(3,4),(5,6)]):
    //   if a == 3: break
    //   print(i, a, b)
    let pairs = json!({"type": "List", "elts": [
        {"type": "Tuple", "elts": [int(1), int(2)]},
        {"type": "Tuple", "elts": [int(3), int(4)]},
        {"type": "Tuple", "elts": [int(5), int(6)]},
    ]});
    let target = json!({"type": "Tuple", "elts": [
        name("i"),
        {"type": "Tuple", "elts": [name("a"), name("b")]},
    ]});
    let body = vec![json!({
        "type": "For",
        "target": target,
        "iter": call(name("enumerate"), vec![pairs]),
        "body": [
            {
                "type": "If",
                "test": {"type": "Compare", "left": name("a"), "ops": ["Eq"], "comparators": [int(3)]},
                "body": [{"type": "Break"}],
                "orelse": [],
            },
            expr_stmt(call(name("print"), vec![name("i"), name("a"), name("b")])),
        ],
    })];
    assert_eq!(run(json!(body)), "0 1 2\n");
}

#[test]
fn short_circuit_or_returns_last_operand() {
    // print(0 or "" or "x" or None)
    let body = vec![expr_stmt(call(
        name("print"),
        vec![json!({
            "type": "BoolOp", "op": "Or",
            "values": [int(0), str_const(""), str_const("x"), {"type": "Constant", "typename": "NoneType", "value": null}],
        })],
    ))];
    assert_eq!(run(json!(body)), "x\n");
}

/// A host exposing one single-abstract-method interface, `Runnable`, with
/// method `run`. Construction from a lone lambda promotes it to a proxy
/// (§4.7); `r.run()` then forwards straight back to that lambda without ever
/// reaching `invoke_method`, so this host never needs a real implementation
/// of it.
struct RunnableHost;
impl HostReflectionProvider for RunnableHost {
    fn constructors(&self, _ty: &HostTypeHandle) -> Vec<HostExecutable> {
        Vec::new()
    }
    fn methods(&self, _ty: &HostTypeHandle, _pretty_name: &str) -> Vec<HostExecutable> {
        Vec::new()
    }
    fn fields(&self, _ty: &HostTypeHandle) -> Vec<HostField> {
        Vec::new()
    }
    fn nested_types(&self, _ty: &HostTypeHandle) -> Vec<HostTypeHandle> {
        Vec::new()
    }
    fn superclass(&self, _ty: &HostTypeHandle) -> Option<HostTypeHandle> {
        None
    }
    fn superinterfaces(&self, _ty: &HostTypeHandle) -> Vec<HostTypeHandle> {
        Vec::new()
    }
    fn pretty_field_to_runtime(&self, _ty: &HostTypeHandle, _pretty_name: &str) -> Option<String> {
        None
    }
    fn functional_interface_method(&self, ty: &HostTypeHandle) -> Option<String> {
        (ty.pretty_name == "Runnable").then(|| "run".to_owned())
    }
    fn abstract_methods(&self, ty: &HostTypeHandle) -> Vec<String> {
        if ty.pretty_name == "Runnable" { vec!["run".to_owned()] } else { Vec::new() }
    }
    fn is_assignable(&self, from: &HostTypeHandle, to: &HostTypeHandle) -> bool {
        from == to
    }
}
impl HostClassLoader for RunnableHost {
    fn load_class(&self, pretty_name: &str) -> RunResult<HostTypeHandle> {
        Ok(HostTypeHandle { runtime_name: pretty_name.to_owned(), pretty_name: pretty_name.to_owned() })
    }
}
impl HostInvoker for RunnableHost {
    fn invoke_constructor(&self, _ctor: &HostExecutable, _args: &[Value]) -> RunResult<Value> {
        unreachable!("Runnable is only ever constructed from a lambda, which short-circuits before a real constructor call")
    }
    fn invoke_method(&self, _method: &HostExecutable, _receiver: &Value, _args: &[Value]) -> RunResult<Value> {
        unreachable!("run() on a proxy-promoted Runnable forwards to the captured lambda directly")
    }
    fn get_field(&self, _field: &HostField, _receiver: Option<&Value>) -> RunResult<Value> {
        unreachable!()
    }
    fn set_field(&self, _field: &HostField, _receiver: Option<&Value>, _value: Value) -> RunResult<()> {
        unreachable!()
    }
    fn describe_value(&self, _value: &Value) -> String {
        String::new()
    }
}
impl ZombieCallbackHandler for RunnableHost {
    fn on_zombie_call(&self, _filename: &str, _callable_description: &str, _call_count: u64) {}
}

#[test]
fn host_interop_and_proxy_promotion() {
    // r = Runnable(lambda: print("hi"))
    // r.run()
    let java_class = json!({"type": "Name", "id": "JavaClass"});
    let runnable_class = call(java_class, vec![str_const("Runnable")]);
    let lambda = json!({"type": "Lambda", "args": no_args(), "body": call(name("print"), vec![str_const("hi")])});
    let body = vec![
        assign("r", call(runnable_class, vec![lambda])),
        expr_stmt(json!({
            "type": "Call",
            "func": {"type": "Attribute", "value": name("r"), "attr": "run"},
            "args": [],
            "keywords": [],
        })),
    ];
    let module = json!({"type": "Module", "body": body});
    let host = Arc::new(RunnableHost);
    let env = HostEnv { reflection: host.clone(), class_loader: host.clone(), invoker: host.clone(), zombie: host };
    let mut script = Script::new(env, indexmap::IndexMap::new());
    script.parse_main("fixture.pyjson", &module).expect("parse");
    let mut io = CaptureIo::default();
    script.execute(&mut io, false).expect("execute");
    assert_eq!(io.stdout, "hi\n");
}
