//! Embedding API surface (§6.3): a `Script` owns everything a single script
//! run needs — heap, contexts, interns, host collaborators, proxy table,
//! symbol cache, generation counter, and the once-only module cache — for
//! the run's whole lifetime, and exposes the handful of operations an
//! embedder drives a script through.

use indexmap::IndexMap;

use crate::ast::Module;
use crate::ast::loader::{Loader, NoopObserver};
use crate::exception::{ExcPayload, ExcType, RunError, RunResult};
use crate::function::Generation;
use crate::heap::Heap;
use crate::host::HostEnv;
use crate::intern::{Interns, SymbolCache};
use crate::namespace::{ContextId, Contexts};
use crate::proxy::ProxyTable;
use crate::runtime::Runtime;
use crate::value::Value;

/// A host-side at-exit listener: a plain Rust callback, distinct from
/// script-registered `__atexit_register__` callbacks (§4.12), which are
/// `Value`s run by [`crate::zombie::run_exit_lifecycle`] before these.
type ExitListener = Box<dyn FnMut(i32) + Send>;

/// One loaded script run (§6.3). Construct with [`Script::new`], parse and
/// execute the main module, then read results back through `get_global`/
/// `get_bound_function`.
pub struct Script {
    heap: Heap,
    contexts: Contexts,
    interns: Interns,
    host: HostEnv,
    proxies: ProxyTable,
    symbols: SymbolCache,
    generation: Generation,
    halted: bool,
    modules: IndexMap<String, ContextId>,
    atexit_callbacks: Vec<Value>,
    zombie_calls: u64,
    /// Pretty-name → runtime-name overrides supplied at construction. Not
    /// consulted internally: pretty/runtime translation is already fully
    /// owned by the embedder's `HostClassLoader`/`HostReflectionProvider`
    /// implementations, so this is kept only so the embedder can look its
    /// own mappings back up through the `Script` it handed them to (see
    /// DESIGN.md).
    renaming: IndexMap<String, String>,
    exit_listeners: Vec<ExitListener>,
    main: Option<Module>,
}

impl Script {
    /// Constructs an empty script bound to the given host collaborators,
    /// with optional pretty-name renaming mappings (§6.3).
    #[must_use]
    pub fn new(host: HostEnv, renaming: IndexMap<String, String>) -> Self {
        let mut contexts = Contexts::new();
        let mut interns = Interns::new();
        crate::builtins::install(&mut contexts, &mut interns);
        Self {
            heap: Heap::new(),
            contexts,
            interns,
            host,
            proxies: ProxyTable::new(),
            symbols: SymbolCache::new(),
            generation: Generation::default(),
            halted: false,
            modules: IndexMap::new(),
            atexit_callbacks: Vec::new(),
            zombie_calls: 0,
            renaming,
            exit_listeners: Vec::new(),
            main: None,
        }
    }

    /// Parses a JSON AST into the main module (§6.1, §6.3). Does not execute
    /// it; call [`Script::execute`] afterward.
    pub fn parse_main(&mut self, filename: &str, json: &serde_json::Value) -> RunResult<()> {
        let mut observer = NoopObserver;
        let mut loader = Loader::new(&mut self.interns, filename, &mut observer);
        self.main = Some(loader.load_module(json)?);
        Ok(())
    }

    /// Installs a process-wide custom host-class handle (§6.3), used to
    /// specialize construction of primitive wrappers. Returns the id scripts
    /// reach that class through as `Value::HostClass`.
    #[must_use]
    pub fn install_host_class(&self, handle: crate::host::HostTypeHandle) -> Value {
        Value::HostClass(crate::intern::intern_host_class(handle))
    }

    /// Registers a host-side at-exit listener (§6.3), run in reverse order
    /// after script-registered `__atexit_register__` callbacks, once
    /// [`crate::zombie::run_exit_lifecycle`] has finished.
    pub fn register_exit_listener(&mut self, listener: impl FnMut(i32) + Send + 'static) {
        self.exit_listeners.push(Box::new(listener));
    }

    fn runtime(&mut self, io: &mut dyn crate::host::IoHost) -> Runtime<'_> {
        Runtime {
            heap: &mut self.heap,
            contexts: &mut self.contexts,
            interns: &mut self.interns,
            host: &self.host,
            proxies: &mut self.proxies,
            symbols: &self.symbols,
            generation: &self.generation,
            halted: &mut self.halted,
            io,
            modules: &mut self.modules,
            atexit_callbacks: &mut self.atexit_callbacks,
            zombie_calls: &mut self.zombie_calls,
        }
    }

    /// Executes the parsed main module (§6.3), either directly (tree-walking)
    /// or, if `compile` is `true`, through the compiler and VM (§4.3/§4.5).
    ///
    /// A `SystemExit` raised (directly or via `exit()`) unwinds through every
    /// `finally` block as an ordinary exception; once it reaches here,
    /// [`crate::zombie::run_exit_lifecycle`] runs script-registered at-exit
    /// callbacks, then this function runs the host-registered ones in
    /// reverse order and calls [`crate::host::IoHost::process_exit`] (§4.12).
    pub fn execute(&mut self, io: &mut dyn crate::host::IoHost, compile: bool) -> RunResult<()> {
        let module = self.main.clone().ok_or_else(|| RunError::simple(ExcType::RuntimeError, "no main module parsed"))?;
        let top = Contexts::global_id();
        let outcome = if compile {
            let filename = self.interns.intern("__main__");
            let code = crate::bytecode::compiler::Compiler::compile_module(&module, filename)?;
            let mut rt = self.runtime(io);
            crate::bytecode::vm::run(&code, top, &mut rt).map(|_| ())
        } else {
            let mut rt = self.runtime(io);
            crate::evaluator::exec_module(&module, top, &mut rt)
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(err) => self.handle_top_level_error(io, err),
        }
    }

    fn handle_top_level_error(&mut self, io: &mut dyn crate::host::IoHost, err: RunError) -> RunResult<()> {
        let status = match &err.payload {
            ExcPayload::Simple { kind, message } if *kind == ExcType::SystemExit => message.parse().unwrap_or(0),
            _ => return Err(err),
        };
        {
            let mut rt = self.runtime(io);
            crate::zombie::run_exit_lifecycle(&mut rt)?;
        }
        for listener in self.exit_listeners.iter_mut().rev() {
            listener(status);
        }
        io.process_exit(status);
        Ok(())
    }

    /// Reads a top-level global by name (§6.3).
    #[must_use]
    pub fn get_global(&mut self, name: &str) -> Option<Value> {
        let sid = self.interns.intern(name);
        self.contexts.read_name(Contexts::global_id(), sid)
    }

    /// Writes a top-level global by name (§6.3).
    pub fn set_global(&mut self, name: &str, value: Value) {
        let sid = self.interns.intern(name);
        self.contexts.write_name(Contexts::global_id(), sid, value);
    }

    /// Deletes a top-level global by name (§6.3).
    pub fn delete_global(&mut self, name: &str) -> bool {
        let sid = self.interns.intern(name);
        self.contexts.delete_name(Contexts::global_id(), sid)
    }

    /// Looks up a top-level `def`/lambda by name, returning a callable
    /// `Value` the embedder can pass to [`Script::call`] (§6.3).
    #[must_use]
    pub fn get_bound_function(&mut self, name: &str) -> Option<Value> {
        match self.get_global(name)? {
            v @ (Value::BoundFunction(_) | Value::Lambda(_)) => Some(v),
            _ => None,
        }
    }

    /// Calls any callable `Value` obtained from this script (§6.3).
    pub fn call(&mut self, io: &mut dyn crate::host::IoHost, callee: Value, args: &[Value]) -> RunResult<Value> {
        let mut rt = self.runtime(io);
        rt.call_value(callee, args, &IndexMap::new())
    }

    /// The renaming mappings passed to [`Script::new`] (§6.3).
    #[must_use]
    pub fn renaming_mappings(&self) -> &IndexMap<String, String> {
        &self.renaming
    }
}
