use std::process::ExitCode;
use std::sync::Arc;
use std::{env, fs};

use pyjinn::{
    HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle, IoHost,
    RunResult, Script, Value, ZombieCallbackHandler,
};

/// A host with no reflective types of its own: every script this binary runs
/// is expected to be pure-Python (no `JavaClass(...)` interop), since this is
/// a demo driver, not an embedding.
struct BareHost;

impl HostReflectionProvider for BareHost {
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

impl HostClassLoader for BareHost {
    fn load_class(&self, pretty_name: &str) -> RunResult<HostTypeHandle> {
        Err(pyjinn::RunError::simple(pyjinn::ExcType::NameError, format!("no host class '{pretty_name}' available in the CLI demo host")))
    }
}

impl HostInvoker for BareHost {
    fn invoke_constructor(&self, _ctor: &HostExecutable, _args: &[Value]) -> RunResult<Value> {
        unreachable!("BareHost exposes no constructors")
    }
    fn invoke_method(&self, _method: &HostExecutable, _receiver: &Value, _args: &[Value]) -> RunResult<Value> {
        unreachable!("BareHost exposes no methods")
    }
    fn get_field(&self, _field: &HostField, _receiver: Option<&Value>) -> RunResult<Value> {
        unreachable!("BareHost exposes no fields")
    }
    fn set_field(&self, _field: &HostField, _receiver: Option<&Value>, _value: Value) -> RunResult<()> {
        unreachable!("BareHost exposes no fields")
    }
    fn describe_value(&self, _value: &Value) -> String {
        String::new()
    }
}

impl ZombieCallbackHandler for BareHost {
    fn on_zombie_call(&self, filename: &str, callable_description: &str, call_count: u64) {
        eprintln!("warning: zombie callback #{call_count} into {callable_description} after {filename} exited");
    }
}

/// Resolves `foo.bar.baz` to `foo/bar/baz.pyjson` relative to the running
/// script's directory, and reads it back as UTF-8.
struct FileIo {
    base_dir: std::path::PathBuf,
}

impl IoHost for FileIo {
    fn write_stdout(&mut self, s: &str) {
        print!("{s}");
    }
    fn write_stderr(&mut self, s: &str) {
        eprint!("{s}");
    }
    fn read_module(&self, canonical_path: &str) -> RunResult<String> {
        fs::read_to_string(self.base_dir.join(canonical_path))
            .map_err(|e| pyjinn::RunError::simple(pyjinn::ExcType::ImportError, format!("{canonical_path}: {e}")))
    }
    fn resolve_module(&self, dotted_name: &str) -> RunResult<String> {
        Ok(format!("{}.pyjson", dotted_name.replace('.', "/")))
    }
    fn process_exit(&mut self, status: i32) {
        std::process::exit(status);
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let path = match args.get(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: pyjinn <script.pyjson>");
            return ExitCode::FAILURE;
        }
    };
    let compile = args.iter().any(|a| a == "--compile");

    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error reading {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let json: serde_json::Value = match serde_json::from_str(&source) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("error parsing {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let base_dir = std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new(".")).to_path_buf();
    let host = Arc::new(BareHost);
    let env = HostEnv { reflection: host.clone(), class_loader: host.clone(), invoker: host.clone(), zombie: host };
    let mut script = Script::new(env, indexmap::IndexMap::new());
    if let Err(err) = script.parse_main(path, &json) {
        eprintln!("{}", err.render_traceback());
        return ExitCode::FAILURE;
    }

    let mut io = FileIo { base_dir };
    match script.execute(&mut io, compile) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.render_traceback());
            ExitCode::FAILURE
        }
    }
}
