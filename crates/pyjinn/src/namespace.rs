//! Context / Environment (§3.3, §4.8): the scope chain, call-stack
//! diagnostics, and control-flow signalling shared by the evaluator and VM.
//!
//! Contexts form a DAG through their `enclosing`/`calling` links, and a bound
//! function's captured context may transitively reference the function
//! itself (closures). Per §9 "Cyclic closures", contexts are therefore
//! addressed by stable arena indices (`ContextId`) rather than owned
//! references, and the arena is dropped as a whole when the top-level script
//! exits.

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::exception::RunError;
use crate::intern::StringId;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One call-site record pushed on entry and popped on exit (§4.8), used to
/// materialize stack traces on exception escape.
#[derive(Debug, Clone)]
pub struct CallSiteRecord {
    pub enclosing_type: Option<String>,
    pub method_name: String,
    pub filename: String,
    pub lineno: u32,
}

/// An execution frame: scope plus control-flow flags plus (in compiled mode)
/// a data stack (§3.3).
#[derive(Debug)]
pub struct Context {
    pub global: ContextId,
    pub calling: Option<ContextId>,
    pub enclosing: Option<ContextId>,
    locals: IndexMap<StringId, Value>,
    pub declared_global: AHashSet<StringId>,
    pub declared_nonlocal: AHashSet<StringId>,
    pub return_value: Option<Value>,
    pub has_returned: bool,
    pub loop_depth: u32,
    pub break_flag: bool,
    pub continue_flag: bool,
    /// Present only while executing compiled code (§3.2/§4.5).
    pub data_stack: Vec<Value>,
    pub ip: usize,
    pub active_exception: Option<RunError>,
}

impl Context {
    #[must_use]
    pub fn new_global() -> Self {
        Self {
            global: ContextId(0),
            calling: None,
            enclosing: None,
            locals: IndexMap::new(),
            declared_global: AHashSet::new(),
            declared_nonlocal: AHashSet::new(),
            return_value: None,
            has_returned: false,
            loop_depth: 0,
            break_flag: false,
            continue_flag: false,
            data_stack: Vec::new(),
            ip: 0,
            active_exception: None,
        }
    }

    #[must_use]
    pub fn new_call(global: ContextId, calling: Option<ContextId>, enclosing: Option<ContextId>) -> Self {
        Self {
            global,
            calling,
            enclosing,
            locals: IndexMap::new(),
            declared_global: AHashSet::new(),
            declared_nonlocal: AHashSet::new(),
            return_value: None,
            has_returned: false,
            loop_depth: 0,
            break_flag: false,
            continue_flag: false,
            data_stack: Vec::new(),
            ip: 0,
            active_exception: None,
        }
    }

    fn set_local(&mut self, name: StringId, value: Value) {
        self.locals.insert(name, value);
    }

    fn get_local(&self, name: StringId) -> Option<Value> {
        self.locals.get(&name).copied()
    }

    fn delete_local(&mut self, name: StringId) -> bool {
        self.locals.shift_remove(&name).is_some()
    }

    /// All names bound directly in this context's scope, for `from foo import *` (§4.9).
    #[must_use]
    pub fn local_names(&self) -> Vec<StringId> {
        self.locals.keys().copied().collect()
    }
}

/// Arena of all contexts created while running one script (§9).
#[derive(Debug, Default)]
pub struct Contexts {
    arena: Vec<Context>,
    /// Per-thread-equivalent call-site stack for diagnostics (§4.8). This
    /// crate runs one script per call to `Script::execute`, so a plain `Vec`
    /// bound to that call suffices; the host is responsible for keeping a
    /// whole `Script` (and thus its `Contexts`) confined to one thread (§5).
    call_stack: Vec<CallSiteRecord>,
}

impl Contexts {
    #[must_use]
    pub fn new() -> Self {
        let mut arena = Self::default();
        let global = Context::new_global();
        arena.arena.push(global);
        arena
    }

    #[must_use]
    pub const fn global_id() -> ContextId {
        ContextId(0)
    }

    pub fn push(&mut self, ctx: Context) -> ContextId {
        let id = ContextId(self.arena.len().try_into().expect("context arena exhausted"));
        self.arena.push(ctx);
        id
    }

    #[must_use]
    pub fn get(&self, id: ContextId) -> &Context {
        &self.arena[id.index()]
    }

    pub fn get_mut(&mut self, id: ContextId) -> &mut Context {
        &mut self.arena[id.index()]
    }

    pub fn enter_call(&mut self, record: CallSiteRecord) {
        self.call_stack.push(record);
    }

    pub fn exit_call(&mut self) {
        self.call_stack.pop();
    }

    #[must_use]
    pub fn call_stack(&self) -> &[CallSiteRecord] {
        &self.call_stack
    }

    /// Read resolution order (§4.8): local → enclosing chain → global, except
    /// `global`-declared names short-circuit to the global context and
    /// `nonlocal`-declared names read the nearest enclosing non-global context.
    #[must_use]
    pub fn read_name(&self, ctx: ContextId, name: StringId) -> Option<Value> {
        let c = self.get(ctx);
        if c.declared_global.contains(&name) {
            return self.get(c.global).get_local(name);
        }
        if c.declared_nonlocal.contains(&name) {
            let mut cur = c.enclosing;
            while let Some(id) = cur {
                if id == c.global {
                    break;
                }
                if let Some(v) = self.get(id).get_local(name) {
                    return Some(v);
                }
                cur = self.get(id).enclosing;
            }
            return None;
        }
        if let Some(v) = c.get_local(name) {
            return Some(v);
        }
        let mut cur = c.enclosing;
        while let Some(id) = cur {
            if let Some(v) = self.get(id).get_local(name) {
                return Some(v);
            }
            cur = self.get(id).enclosing;
        }
        self.get(c.global).get_local(name)
    }

    /// Write resolution, following the same `global`/`nonlocal` rules (§4.8).
    pub fn write_name(&mut self, ctx: ContextId, name: StringId, value: Value) {
        let c = self.get(ctx);
        if c.declared_global.contains(&name) {
            let global = c.global;
            self.get_mut(global).set_local(name, value);
            return;
        }
        if c.declared_nonlocal.contains(&name) {
            let global = c.global;
            let mut cur = c.enclosing;
            while let Some(id) = cur {
                if id == global {
                    break;
                }
                if self.get(id).get_local(name).is_some() {
                    self.get_mut(id).set_local(name, value);
                    return;
                }
                cur = self.get(id).enclosing;
            }
            // First write to a captured nonlocal that has no binding yet still
            // targets the nearest enclosing non-global frame (defining scope).
            if let Some(id) = c.enclosing {
                self.get_mut(id).set_local(name, value);
                return;
            }
        }
        self.get_mut(ctx).set_local(name, value);
    }

    /// Deletion respects `global`/`nonlocal` the same way (§4.8).
    pub fn delete_name(&mut self, ctx: ContextId, name: StringId) -> bool {
        let c = self.get(ctx);
        if c.declared_global.contains(&name) {
            let global = c.global;
            return self.get_mut(global).delete_local(name);
        }
        if c.declared_nonlocal.contains(&name) {
            let global = c.global;
            let mut cur = c.enclosing;
            while let Some(id) = cur {
                if id == global {
                    break;
                }
                if self.get_mut(id).delete_local(name) {
                    return true;
                }
                cur = self.get(id).enclosing;
            }
            return false;
        }
        self.get_mut(ctx).delete_local(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interns;

    #[test]
    fn nonlocal_writes_enclosing_frame() {
        let mut interns = Interns::new();
        let x = interns.intern("x");
        let mut contexts = Contexts::new();
        contexts.get_mut(Contexts::global_id()).set_local(x, Value::Num(crate::numeric::Numeric::Int(0)));

        let outer = contexts.push(Context::new_call(Contexts::global_id(), None, Some(Contexts::global_id())));
        contexts.get_mut(outer).set_local(x, Value::Num(crate::numeric::Numeric::Int(0)));

        let inner = contexts.push(Context::new_call(Contexts::global_id(), Some(outer), Some(outer)));
        contexts.get_mut(inner).declared_nonlocal.insert(x);

        contexts.write_name(inner, x, Value::Num(crate::numeric::Numeric::Int(42)));
        let v = contexts.read_name(outer, x);
        assert!(matches!(v, Some(Value::Num(n)) if n.as_i64() == 42));
    }
}
