//! Overload resolver (§4.6): picks the best-scoring constructor or method
//! across a host type (and, for methods, its superinterfaces/superclass
//! chain) for a given actual-argument tuple.

use std::sync::Arc;

use crate::exception::{CandidateReport, OverloadDiagnostics, RunResult};
use crate::heap::Heap;
use crate::host::{HostExecutable, HostField, HostReflectionProvider, HostTypeHandle};
use crate::value::Value;

/// A pre-bound, cached callable: the chosen host executable plus the
/// coercions its invocation requires (§4.6 "The invoker is wrapped ...").
#[derive(Debug, Clone)]
pub struct Invoker {
    pub executable: HostExecutable,
    /// Per-parameter: does this argument need `JavaString` unwrap, float
    /// narrowing, or promotion to a functional interface?
    pub coercions: Vec<Coercion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    None,
    UnwrapJavaString,
    NarrowToFloat,
    PromoteToFunctionalInterface,
}

/// Kind of thing being resolved, only matters for where candidates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveKind {
    Constructor,
    Method,
}

fn param_score(
    reflection: &dyn HostReflectionProvider,
    formal: &HostTypeHandle,
    actual: &Value,
    actual_type: Option<&HostTypeHandle>,
    is_java_string: bool,
) -> Option<(i32, Coercion)> {
    if is_java_string && formal.runtime_name == "java.lang.String" {
        return Some((3, Coercion::UnwrapJavaString));
    }
    if matches!(actual, Value::None) {
        return Some(if formal.runtime_name.ends_with("[]") { (2, Coercion::None) } else { (3, Coercion::None) });
    }
    let Some(actual_type) = actual_type else {
        // Script callable passed where any interface is expected: allowed,
        // unscored (§4.6 table), and is promoted at invocation time.
        return Some((0, Coercion::PromoteToFunctionalInterface));
    };
    if actual_type == formal {
        return Some((3, Coercion::None));
    }
    if is_numeric_widening(actual_type, formal) {
        return Some((2, Coercion::None));
    }
    if is_numeric_narrowing(actual_type, formal) {
        return Some((1, Coercion::NarrowToFloat));
    }
    if reflection.is_assignable(actual_type, formal) {
        return Some((0, Coercion::None));
    }
    None
}

fn is_numeric_widening(actual: &HostTypeHandle, formal: &HostTypeHandle) -> bool {
    matches!(
        (actual.runtime_name.as_str(), formal.runtime_name.as_str()),
        ("int", "long")
            | ("int", "float")
            | ("int", "double")
            | ("long", "float")
            | ("long", "double")
            | ("float", "double")
            | ("byte", "short")
            | ("byte", "int")
            | ("short", "int")
    )
}

fn is_numeric_narrowing(actual: &HostTypeHandle, formal: &HostTypeHandle) -> bool {
    matches!((actual.runtime_name.as_str(), formal.runtime_name.as_str()), ("double", "float"))
}

struct Candidate<'a> {
    executable: &'a HostExecutable,
    rendered: String,
}

fn gather_method_candidates<'a>(
    reflection: &'a dyn HostReflectionProvider,
    ty: &HostTypeHandle,
    pretty_name: &str,
    exec: &'a mut Vec<HostExecutable>,
) -> Vec<Candidate<'a>> {
    // Candidates come from the type itself, implemented interfaces, and the
    // superclass chain (§4.6). We materialize everything into one owned
    // vector first so the returned `Candidate`s can borrow from it.
    exec.extend(reflection.methods(ty, pretty_name));
    for iface in reflection.superinterfaces(ty) {
        exec.extend(reflection.methods(&iface, pretty_name));
    }
    let mut cur = reflection.superclass(ty);
    while let Some(super_ty) = cur {
        exec.extend(reflection.methods(&super_ty, pretty_name));
        cur = reflection.superclass(&super_ty);
    }
    exec.iter()
        .map(|e| Candidate { executable: e, rendered: render_signature(e) })
        .collect()
}

fn render_signature(exec: &HostExecutable) -> String {
    let params = exec.param_types.iter().map(|p| p.pretty_name.clone()).collect::<Vec<_>>().join(", ");
    format!("{}({})", exec.runtime_name, params)
}

/// Resolves a method call (§4.6). `actual_types[i]` is `None` when the
/// argument is a script callable being passed to an interface parameter.
pub fn resolve_method(
    reflection: &dyn HostReflectionProvider,
    ty: &HostTypeHandle,
    pretty_name: &str,
    args: &[Value],
    actual_types: &[Option<HostTypeHandle>],
    heap: &Heap,
    java_string_flags: &[bool],
) -> Result<Invoker, OverloadDiagnostics> {
    let mut storage = Vec::new();
    let candidates = gather_method_candidates(reflection, ty, pretty_name, &mut storage);
    resolve_candidates(reflection, candidates, args, actual_types, heap, java_string_flags)
}

/// Resolves a constructor call (§4.6): interface/superclass traversal is not
/// performed for constructors.
pub fn resolve_constructor(
    reflection: &dyn HostReflectionProvider,
    ty: &HostTypeHandle,
    args: &[Value],
    actual_types: &[Option<HostTypeHandle>],
    heap: &Heap,
    java_string_flags: &[bool],
) -> Result<Invoker, OverloadDiagnostics> {
    let execs = reflection.constructors(ty);
    let candidates = execs.iter().map(|e| Candidate { executable: e, rendered: render_signature(e) }).collect();
    resolve_candidates(reflection, candidates, args, actual_types, heap, java_string_flags)
}

fn resolve_candidates(
    reflection: &dyn HostReflectionProvider,
    candidates: Vec<Candidate<'_>>,
    args: &[Value],
    actual_types: &[Option<HostTypeHandle>],
    heap: &Heap,
    java_string_flags: &[bool],
) -> Result<Invoker, OverloadDiagnostics> {
    let mut diagnostics = OverloadDiagnostics::default();
    let mut best: Option<(i32, &HostExecutable, Vec<Coercion>)> = None;

    for candidate in &candidates {
        let exec = candidate.executable;
        if exec.param_types.len() != args.len() && !exec.is_varargs {
            diagnostics.candidates.push(CandidateReport {
                rendered_signature: candidate.rendered.clone(),
                score: 0,
                disqualified_reason: Some(format!(
                    "arity mismatch: expected {}, got {}",
                    exec.param_types.len(),
                    args.len()
                )),
            });
            continue;
        }
        let mut total = 0;
        let mut coercions = Vec::with_capacity(args.len());
        let mut disqualified = None;
        for (i, formal) in exec.param_types.iter().enumerate() {
            let actual = &args[i];
            let actual_ty = actual_types.get(i).and_then(|t| t.as_ref());
            let is_jstr = java_string_flags.get(i).copied().unwrap_or(false);
            match param_score(reflection, formal, actual, actual_ty, is_jstr) {
                Some((score, coercion)) => {
                    total += score;
                    coercions.push(coercion);
                }
                None => {
                    disqualified = Some(format!("parameter {i}: '{formal}' not assignable from actual argument"));
                    break;
                }
            }
        }
        if let Some(reason) = disqualified {
            diagnostics.candidates.push(CandidateReport {
                rendered_signature: candidate.rendered.clone(),
                score: 0,
                disqualified_reason: Some(reason),
            });
            continue;
        }
        diagnostics.candidates.push(CandidateReport {
            rendered_signature: candidate.rendered.clone(),
            score: total,
            disqualified_reason: None,
        });
        // Ties are broken by first-found (§4.6), so only strictly-better
        // candidates replace the incumbent.
        if best.as_ref().map_or(true, |(best_score, ..)| total > *best_score) {
            best = Some((total, exec, coercions));
        }
    }
    let _ = heap;
    match best {
        Some((_, exec, coercions)) => Ok(Invoker { executable: exec.clone(), coercions }),
        None => Err(diagnostics),
    }
}

/// Thin wrapper making an already-cached [`Invoker`] shareable via
/// [`crate::intern::SymbolCache`].
#[must_use]
pub fn share(invoker: Invoker) -> Arc<Invoker> {
    Arc::new(invoker)
}

/// Convenience: does the field lookup's `(is_class_side, class, member)` key
/// resolve to a visible field on `ty`? Used by attribute-read VM/evaluator
/// code before falling back to a method/nested-type lookup.
#[must_use]
pub fn find_field(reflection: &dyn HostReflectionProvider, ty: &HostTypeHandle, pretty_name: &str) -> Option<HostField> {
    let runtime_name = reflection.pretty_field_to_runtime(ty, pretty_name)?;
    reflection.fields(ty).into_iter().find(|f| f.runtime_name == runtime_name)
}

pub fn no_candidates_error(diagnostics: OverloadDiagnostics, member: &str) -> RunResult<Invoker> {
    Err(diagnostics.into_error(member))
}
