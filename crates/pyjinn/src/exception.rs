//! Error taxonomy and propagation (§7), grounded in the teacher's
//! `exception_private.rs` shape: a closed `ExcType` enum for built-in kinds,
//! a script-raised variant carrying a live script instance, and a
//! `HostEscaped` variant for host exceptions surfaced to the script as-is.

use std::fmt;
use std::sync::Arc;

use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias used throughout the compiler, evaluator, and VM.
pub type RunResult<T> = Result<T, RunError>;

/// Built-in exception kinds (§7 "Error taxonomy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcType {
    BaseException,
    Exception,
    SystemExit,
    KeyboardInterrupt,

    ParseError,
    NameError,
    UnboundLocalError,
    TypeError,
    ValueError,
    LookupError,
    IndexError,
    KeyError,
    ZeroDivisionError,
    ArithmeticError,
    OverloadResolutionError,
    AttributeError,
    FrozenInstanceError,
    NotImplementedError,
    RecursionError,
    RuntimeError,
    StopIteration,
    ImportError,
}

impl ExcType {
    /// Built-in subtype relation used for `except T` matching (§7).
    #[must_use]
    pub fn is_a(self, ancestor: ExcType) -> bool {
        if self == ancestor {
            return true;
        }
        use ExcType::{
            ArithmeticError, AttributeError, BaseException, Exception, FrozenInstanceError, ImportError, IndexError,
            KeyError, KeyboardInterrupt, LookupError, NameError, OverloadResolutionError, RecursionError,
            RuntimeError, StopIteration, SystemExit, TypeError, UnboundLocalError, ValueError, ZeroDivisionError,
        };
        match self {
            ZeroDivisionError => ancestor == ArithmeticError || ancestor == Exception || ancestor == BaseException,
            ArithmeticError | LookupError | TypeError | ValueError | NameError | RuntimeError
            | AttributeError | OverloadResolutionError | StopIteration | ImportError => {
                ancestor == Exception || ancestor == BaseException
            }
            IndexError | KeyError => ancestor == LookupError || ancestor == Exception || ancestor == BaseException,
            UnboundLocalError => ancestor == NameError || ancestor == Exception || ancestor == BaseException,
            FrozenInstanceError => ancestor == AttributeError || ancestor == Exception || ancestor == BaseException,
            RecursionError => ancestor == RuntimeError || ancestor == Exception || ancestor == BaseException,
            SystemExit | KeyboardInterrupt => ancestor == BaseException,
            Exception => ancestor == BaseException,
            BaseException => false,
            ExcType::ParseError => ancestor == Exception || ancestor == BaseException,
        }
    }
}

/// One entry in a materialized stack trace: a script or host call site.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub filename: String,
    pub lineno: u32,
    pub is_host: bool,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  File \"{}\", line {}, in {}", self.filename, self.lineno, self.function_name)
    }
}

/// The payload of a raised exception: either a built-in kind with a message,
/// a script-level instance (so `except MyError as e` can bind `e`), or a
/// host exception escaping as-is.
#[derive(Debug, Clone)]
pub enum ExcPayload {
    Simple { kind: ExcType, message: String },
    ScriptInstance(Value),
    HostEscaped { host_type_name: String, message: String },
}

/// An in-flight exception, with the stack trace accumulated as it unwinds.
#[derive(Debug, Clone)]
pub struct RunError {
    pub payload: ExcPayload,
    pub trace: Vec<StackFrame>,
}

impl RunError {
    #[must_use]
    pub fn simple(kind: ExcType, message: impl Into<String>) -> Self {
        Self { payload: ExcPayload::Simple { kind, message: message.into() }, trace: Vec::new() }
    }

    #[must_use]
    pub fn script(instance: Value) -> Self {
        Self { payload: ExcPayload::ScriptInstance(instance), trace: Vec::new() }
    }

    #[must_use]
    pub fn host(host_type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            payload: ExcPayload::HostEscaped { host_type_name: host_type_name.into(), message: message.into() },
            trace: Vec::new(),
        }
    }

    pub fn push_frame(&mut self, frame: StackFrame) {
        self.trace.push(frame);
    }

    #[must_use]
    pub fn message(&self) -> String {
        match &self.payload {
            ExcPayload::Simple { message, .. } => message.clone(),
            ExcPayload::ScriptInstance(v) => format!("{v}"),
            ExcPayload::HostEscaped { message, .. } => message.clone(),
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> String {
        match &self.payload {
            ExcPayload::Simple { kind, .. } => kind.to_string(),
            ExcPayload::ScriptInstance(_) => "<script exception>".to_owned(),
            ExcPayload::HostEscaped { host_type_name, .. } => host_type_name.clone(),
        }
    }

    /// A merged, embedder-facing rendering: script frames above host frames,
    /// innermost last (§7 "Unhandled exceptions ... merged stack trace").
    #[must_use]
    pub fn render_traceback(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.trace {
            out.push_str(&frame.to_string());
            out.push('\n');
        }
        out.push_str(&format!("{}: {}", self.kind_name(), self.message()));
        out
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.message())
    }
}

impl std::error::Error for RunError {}

/// Diagnostics sink populated when overload resolution fails (§7
/// "Diagnostics"): every considered candidate, its score, and the first
/// disqualifying reason, plus name-mapping translations applied.
#[derive(Debug, Clone, Default)]
pub struct OverloadDiagnostics {
    pub candidates: Vec<CandidateReport>,
    pub name_mappings: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub rendered_signature: String,
    pub score: i32,
    pub disqualified_reason: Option<String>,
}

impl OverloadDiagnostics {
    #[must_use]
    pub fn short_message(&self, member: &str) -> String {
        format!("no viable overload for '{member}' ({} candidates considered)", self.candidates.len())
    }

    #[must_use]
    pub fn long_message(&self, member: &str) -> String {
        let mut out = self.short_message(member);
        out.push('\n');
        for c in &self.candidates {
            out.push_str(&format!(
                "  {} -> score {}{}\n",
                c.rendered_signature,
                c.score,
                c.disqualified_reason.as_ref().map(|r| format!(" (disqualified: {r})")).unwrap_or_default()
            ));
        }
        out
    }

    #[must_use]
    pub fn into_error(self, member: &str) -> RunError {
        RunError::simple(ExcType::OverloadResolutionError, self.long_message(member))
    }
}

pub type SharedError = Arc<RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_relation_holds() {
        assert!(ExcType::IndexError.is_a(ExcType::LookupError));
        assert!(ExcType::IndexError.is_a(ExcType::Exception));
        assert!(!ExcType::Exception.is_a(ExcType::IndexError));
        assert!(!ExcType::SystemExit.is_a(ExcType::Exception));
    }
}
