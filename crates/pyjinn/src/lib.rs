//! Embeddable interpreter for a Python-3 subset whose values live in the
//! host object world (§1 PURPOSE & SCOPE). Source parsing is external: the
//! host hands this crate a JSON AST (§6.1) and a set of reflection/I-O
//! collaborators (§6.2); this crate owns the value model, scoping, overload
//! resolution, interface proxies, and the tree-walking evaluator and
//! compiled-bytecode VM that execute it (§2).
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked at the numeric-tower level")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional in width coercions")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors the numeric tower's own wrapping ops")]
#![expect(clippy::unnecessary_wraps, reason = "dispatch signatures stay uniform across builtins/methods")]
#![expect(clippy::too_many_arguments, reason = "host-interop signatures mirror reflective call shapes")]
#![expect(clippy::module_name_repetitions, reason = "matches the teacher's naming")]

pub mod ast;
mod builtins;
mod bytecode;
mod dataclass;
mod evaluator;
mod exception;
mod function;
mod heap;
mod host;
mod intern;
mod module_system;
mod namespace;
mod numeric;
mod overload;
mod proxy;
mod runtime;
mod script;
mod signature;
mod strings;
mod value;
mod zombie;

pub use crate::builtins::BuiltinId;
pub use crate::exception::{ExcPayload, ExcType, RunError, RunResult, StackFrame};
pub use crate::host::{
    HostClassLoader, HostEnv, HostExecutable, HostField, HostInvoker, HostReflectionProvider, HostTypeHandle, IoHost,
    MemberModifiers, ZombieCallbackHandler,
};
pub use crate::intern::{HostClassId, StringId, intern_host_class};
pub use crate::numeric::Numeric;
pub use crate::proxy::ProxyId;
pub use crate::script::Script;
pub use crate::value::Value;
