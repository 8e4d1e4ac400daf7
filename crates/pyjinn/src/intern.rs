//! String interning, host-class-handle interning, and the symbol cache.
//!
//! Three process-wide tables live here, matching §3.4 and §5 "Shared
//! resources" of the spec: interned identifier strings (cheap `Copy` ids used
//! everywhere a name is compared), interned host-class handles (so the same
//! host type always yields the same handle, process-wide), and the symbol
//! cache that memoizes overload-resolution results keyed by call-site shape.

use std::sync::{Arc, Mutex, RwLock};

use ahash::AHashMap;

use crate::host::HostTypeHandle;
use crate::overload::Invoker;

/// Interned identifier. Cheap to copy and compare; the backing string lives
/// in an [`Interns`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

/// Table mapping identifier strings to [`StringId`]s and back.
///
/// Not process-wide: each [`crate::script::Script`] owns one, since two
/// scripts may otherwise-unrelated intern unrelated names (unlike host class
/// handles, which are genuinely shared per §5).
#[derive(Debug, Default)]
pub struct Interns {
    strings: Vec<Box<str>>,
    by_str: AHashMap<Box<str>, StringId>,
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.by_str.get(s) {
            return id;
        }
        let id = StringId(self.strings.len().try_into().expect("too many interned strings"));
        self.strings.push(s.into());
        self.by_str.insert(s.into(), id);
        id
    }

    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    /// Read-only probe: returns the id only if `s` has already been interned,
    /// without growing the table (used for attribute/method-name lookups that
    /// must not intern names that turn out not to exist).
    #[must_use]
    pub fn get(&self, s: &str) -> Option<StringId> {
        self.by_str.get(s).copied()
    }
}

/// Globally interned wrapper around one host type.
///
/// Interning is process-wide: the same host type always yields the same
/// [`HostClassId`], and equality of handles is the identity of the wrapped
/// type (§3.1 "Host class handle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostClassId(u32);

#[derive(Default)]
struct HostClassTable {
    handles: Vec<Arc<HostTypeHandle>>,
    by_name: AHashMap<String, HostClassId>,
}

static HOST_CLASSES: RwLock<Option<HostClassTable>> = RwLock::new(None);

/// Interns a host type by its runtime name, returning a stable process-wide id.
///
/// Compute-if-absent: once created, entries are immutable (§5 "Shared
/// resources").
pub fn intern_host_class(handle: HostTypeHandle) -> HostClassId {
    {
        let guard = HOST_CLASSES.read().unwrap();
        if let Some(table) = guard.as_ref() {
            if let Some(&id) = table.by_name.get(&handle.runtime_name) {
                return id;
            }
        }
    }
    let mut guard = HOST_CLASSES.write().unwrap();
    let table = guard.get_or_insert_with(HostClassTable::default);
    if let Some(&id) = table.by_name.get(&handle.runtime_name) {
        return id;
    }
    let id = HostClassId(table.handles.len().try_into().expect("too many host classes"));
    table.by_name.insert(handle.runtime_name.clone(), id);
    table.handles.push(Arc::new(handle));
    id
}

#[must_use]
pub fn host_class_handle(id: HostClassId) -> Arc<HostTypeHandle> {
    let guard = HOST_CLASSES.read().unwrap();
    guard.as_ref().unwrap().handles[id.0 as usize].clone()
}

/// Key for a method invoker cache entry: `(class, is_static, method, arg types)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub class: HostClassId,
    pub is_static: bool,
    pub method_name: Arc<str>,
    pub actual_types: Vec<HostClassId>,
}

/// Key for a constructor invoker cache entry: `(class, arg types)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorKey {
    pub class: HostClassId,
    pub actual_types: Vec<HostClassId>,
}

/// Key for a field/nested-class lookup: `(is_class_side, class, member)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub is_class_side: bool,
    pub class: HostClassId,
    pub member_name: Arc<str>,
}

/// Process-wide cache from call-site signatures to pre-bound invokers.
///
/// Entries are immutable once created (compute-if-absent), so a repeated
/// resolution returns the same [`Invoker`] instance, satisfying the
/// determinism property in spec.md §8.
#[derive(Default)]
pub struct SymbolCache {
    methods: Mutex<AHashMap<MethodKey, Arc<Invoker>>>,
    constructors: Mutex<AHashMap<ConstructorKey, Arc<Invoker>>>,
}

impl SymbolCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve_method(
        &self,
        key: MethodKey,
        resolve: impl FnOnce() -> Arc<Invoker>,
    ) -> Arc<Invoker> {
        let mut guard = self.methods.lock().unwrap();
        if let Some(invoker) = guard.get(&key) {
            return invoker.clone();
        }
        let invoker = resolve();
        guard.insert(key, invoker.clone());
        invoker
    }

    pub fn get_or_resolve_constructor(
        &self,
        key: ConstructorKey,
        resolve: impl FnOnce() -> Arc<Invoker>,
    ) -> Arc<Invoker> {
        let mut guard = self.constructors.lock().unwrap();
        if let Some(invoker) = guard.get(&key) {
            return invoker.clone();
        }
        let invoker = resolve();
        guard.insert(key, invoker.clone());
        invoker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut interns = Interns::new();
        let a = interns.intern("foo");
        let b = interns.intern("foo");
        let c = interns.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interns.resolve(a), "foo");
    }
}
