//! External collaborator interfaces (§6 of the spec).
//!
//! Everything in this file is a trait the embedding host implements; this
//! crate never constructs a concrete host reflection provider, class loader,
//! or I/O host. The AST-producing parser is likewise external: the host hands
//! this crate a JSON AST (§6.1), not source text.

use std::fmt;
use std::sync::Arc;

use crate::exception::RunResult;
use crate::value::Value;

/// A runtime handle to one host type, as resolved by [`HostClassLoader`].
///
/// `runtime_name` is the fully-qualified name used to key the process-wide
/// host-class intern table (§5); `pretty_name` is what scripts spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTypeHandle {
    pub runtime_name: String,
    pub pretty_name: String,
}

impl fmt::Display for HostTypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_name)
    }
}

/// Modifiers on a reflectively discovered host executable or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberModifiers {
    pub is_static: bool,
    pub is_abstract: bool,
}

/// One reflectively discovered constructor or method.
#[derive(Debug, Clone)]
pub struct HostExecutable {
    pub runtime_name: String,
    pub declaring_type: HostTypeHandle,
    pub param_types: Vec<HostTypeHandle>,
    pub is_varargs: bool,
    pub modifiers: MemberModifiers,
    /// Opaque id the host uses to actually perform the call; round-tripped
    /// back to `invoke_method`/`invoke_constructor` unchanged.
    pub handle: u64,
}

/// One reflectively discovered field.
#[derive(Debug, Clone)]
pub struct HostField {
    pub runtime_name: String,
    pub declaring_type: HostTypeHandle,
    pub field_type: HostTypeHandle,
    pub modifiers: MemberModifiers,
    pub handle: u64,
}

/// Lists constructors/methods/fields/nested types of a host type and applies
/// obfuscation/pretty-name mappings (§6.2).
///
/// The embedder owns reflective discovery; this crate only ever consumes the
/// results through this trait, caching them in the symbol cache (§3.4).
pub trait HostReflectionProvider: Send + Sync {
    fn constructors(&self, ty: &HostTypeHandle) -> Vec<HostExecutable>;
    fn methods(&self, ty: &HostTypeHandle, pretty_name: &str) -> Vec<HostExecutable>;
    fn fields(&self, ty: &HostTypeHandle) -> Vec<HostField>;
    fn nested_types(&self, ty: &HostTypeHandle) -> Vec<HostTypeHandle>;
    fn superclass(&self, ty: &HostTypeHandle) -> Option<HostTypeHandle>;
    fn superinterfaces(&self, ty: &HostTypeHandle) -> Vec<HostTypeHandle>;
    /// Maps a pretty field name to its runtime name, if the type has one.
    fn pretty_field_to_runtime(&self, ty: &HostTypeHandle, pretty_name: &str) -> Option<String>;
    /// True if `ty` is a single-abstract-method interface; returns that method's name.
    fn functional_interface_method(&self, ty: &HostTypeHandle) -> Option<String>;
    /// All abstract method names on an interface, used for the multi-method proxy form (§4.7).
    fn abstract_methods(&self, ty: &HostTypeHandle) -> Vec<String>;
    /// True if `from` is assignable to `to` (identity, subclass, or interface implementation).
    fn is_assignable(&self, from: &HostTypeHandle, to: &HostTypeHandle) -> bool;
}

/// Resolves a class name (pretty → runtime) to a host type handle (§6.2).
pub trait HostClassLoader: Send + Sync {
    fn load_class(&self, pretty_name: &str) -> RunResult<HostTypeHandle>;
}

/// stdout/stderr, module file lookup/reading, and process exit (§6.2 I/O Host).
pub trait IoHost: Send + Sync {
    fn write_stdout(&mut self, s: &str);
    fn write_stderr(&mut self, s: &str);
    /// Reads a module's JSON-AST source given a resolved canonical path.
    fn read_module(&self, canonical_path: &str) -> RunResult<String>;
    /// Resolves a dotted module name (`foo.bar.baz`) to a canonical path.
    fn resolve_module(&self, dotted_name: &str) -> RunResult<String>;
    fn process_exit(&mut self, status: i32);
}

/// Invokes a resolved host constructor or method.
///
/// Kept separate from [`HostReflectionProvider`] because reflection discovery
/// and invocation are different privileges in most host runtimes.
pub trait HostInvoker: Send + Sync {
    fn invoke_constructor(&self, ctor: &HostExecutable, args: &[Value]) -> RunResult<Value>;
    fn invoke_method(&self, method: &HostExecutable, receiver: &Value, args: &[Value]) -> RunResult<Value>;
    fn get_field(&self, field: &HostField, receiver: Option<&Value>) -> RunResult<Value>;
    fn set_field(&self, field: &HostField, receiver: Option<&Value>, value: Value) -> RunResult<()>;
    /// Invokes a single-abstract-method interface proxy's forwarded call,
    /// used by [`crate::proxy::InterfaceProxy`] when the *script* side calls
    /// back into a host callback that itself takes a script-promoted value.
    fn describe_value(&self, value: &Value) -> String;
}

/// Notified when script code calls a bound function/lambda captured before
/// its defining script exited (§4.12 "zombie callbacks"). The call itself
/// still returns `None` to the caller; this is purely a host notification.
pub trait ZombieCallbackHandler: Send + Sync {
    fn on_zombie_call(&self, filename: &str, callable_description: &str, call_count: u64);
}

/// Bundle of host collaborators a [`crate::script::Script`] is constructed with.
pub struct HostEnv {
    pub reflection: Arc<dyn HostReflectionProvider>,
    pub class_loader: Arc<dyn HostClassLoader>,
    pub invoker: Arc<dyn HostInvoker>,
    pub zombie: Arc<dyn ZombieCallbackHandler>,
}
