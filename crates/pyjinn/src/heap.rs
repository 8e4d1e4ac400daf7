//! Arena for heap-allocated script values.
//!
//! [`Value`](crate::value::Value) itself is `Copy`; anything with structure
//! (lists, dicts, instances, bound functions, …) lives in a per-script
//! [`Heap`] arena and is referenced by a [`HeapId`]. This follows the
//! teacher's `heap.rs` shape, simplified: the teacher additionally reference
//! counts and drops entries for an embedding that returns live values across
//! calls; this crate's [`crate::script::Script`] owns one heap for the
//! lifetime of the whole script run (§9 "drop contexts when the top-level
//! script exits"), so no refcounting is needed.

use indexmap::IndexMap;

use crate::intern::StringId;
use crate::value::Value;

/// Stable index into a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A script class: name, constructor, frozen flag, method tables (§3.1).
#[derive(Debug, Clone)]
pub struct ScriptClass {
    pub name: StringId,
    pub frozen: bool,
    pub is_dataclass: bool,
    pub dataclass_fields: Vec<(StringId, Option<Value>)>,
    pub constructor: Option<HeapId>,
    pub instance_methods: IndexMap<StringId, HeapId>,
    pub class_methods: IndexMap<StringId, (bool, HeapId)>,
    pub hash_override: Option<HeapId>,
    pub str_override: Option<HeapId>,
    pub base: Option<HeapId>,
}

/// A script instance: back-reference to its class and an attribute dict.
#[derive(Debug, Clone)]
pub struct ScriptInstance {
    pub class: HeapId,
    pub attrs: IndexMap<StringId, Value>,
}

/// Data stored in the heap arena, one variant per structured value kind.
#[derive(Debug, Clone)]
pub enum HeapData {
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Dict(IndexMap<Value, Value>),
    Slice { lower: Option<i64>, upper: Option<i64>, step: Option<i64> },
    RangeIter { current: i64, stop: i64, step: i64 },
    SeqIter { items: Vec<Value>, pos: usize },
    FormattedTemplate(crate::ast::FStringTemplate),
    Exception { kind: crate::exception::ExcType, message: String },
    ScriptClass(ScriptClass),
    ScriptInstance(ScriptInstance),
    BoundMethod { receiver: Value, method_name: StringId },
    BoundFunction(crate::function::BoundFunction),
    Lambda(crate::function::BoundFunction),
    KwArgsBag(IndexMap<StringId, Value>),
    /// A loaded module's globals, addressed by the context they were
    /// evaluated into (§4.9 "Module system").
    Module { context: crate::namespace::ContextId },
    /// One link in the synthetic `foo.bar.baz` attribute chain that `import
    /// foo.bar.baz` builds on top of a loaded [`HeapData::Module`] (§4.9).
    Namespace(IndexMap<StringId, Value>),
}

/// Per-script arena of [`HeapData`].
#[derive(Debug, Default)]
pub struct Heap {
    entries: Vec<HeapData>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(self.entries.len().try_into().expect("heap exhausted"));
        self.entries.push(data);
        id
    }

    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entries[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entries[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
