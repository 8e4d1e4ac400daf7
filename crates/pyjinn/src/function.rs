//! Bound functions and lambdas (§3.1).
//!
//! A bound function captures its enclosing context (for closures), the
//! function definition, compiled code (if the owning module was compiled),
//! and a "zombie" counter (§4.12) used to surface callbacks invoked after
//! their defining script has exited.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::{Expr, FunctionDef, ParamList};
use crate::bytecode::Code;
use crate::intern::StringId;
use crate::namespace::ContextId;

/// Shared, incrementing generation counter. A script's `halted` flag bumps
/// this once (see [`crate::zombie::ZombieGuard`]); a bound function captured
/// before the bump carries the old generation and so can detect staleness
/// without holding a reference back to its owning script.
#[derive(Debug)]
pub struct Generation(AtomicU64);

impl Default for Generation {
    fn default() -> Self {
        Self(AtomicU64::new(0))
    }
}

impl Generation {
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// Either a full function definition or a lambda's single expression body.
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Def(FunctionDef),
    Lambda { params: ParamList, body: Box<Expr> },
}

/// A bound function or lambda: the callable value produced by `def`/`lambda` (§3.1).
#[derive(Debug, Clone)]
pub struct BoundFunction {
    pub body: FunctionBody,
    /// The context active when this function was defined; read/write to
    /// `nonlocal` names and `global`-declared-elsewhere names goes through it.
    pub enclosing: ContextId,
    /// Compiled code, present once the defining module has been compiled (§2).
    pub compiled: Option<Code>,
    /// The module-defined-in generation at capture time, for zombie detection.
    pub captured_generation: u64,
}

impl BoundFunction {
    #[must_use]
    pub fn name(&self) -> Option<StringId> {
        match &self.body {
            FunctionBody::Def(def) => Some(def.name),
            FunctionBody::Lambda { .. } => None,
        }
    }

    #[must_use]
    pub fn params(&self) -> &ParamList {
        match &self.body {
            FunctionBody::Def(def) => &def.params,
            FunctionBody::Lambda { params, .. } => params,
        }
    }
}
