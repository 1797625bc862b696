//! Rejection reporting for the instrumentation planner.
//!
//! The sink is a pure accumulator injected into the planner: it records why
//! a candidate function was not instrumented and never influences control
//! flow. Callers render or persist the entries after planning completes.

use serde::Serialize;

/// Why a candidate function was not instrumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// `constexpr` functions may be evaluated at translation time; a runtime
    /// trace statement would be invalid there.
    ConstexprFunction,
    /// No function_declarator child on the definition node.
    MissingDeclarator,
    /// The declarator carries no identifier, field identifier, or qualified
    /// identifier.
    MissingName,
    /// The declarator has no parameter list.
    MissingParameterList,
    /// The definition has no compound-statement body.
    MissingBody,
    /// The declarator name spans multiple lines, typically a macro or a
    /// comment inside the declarator, and cannot be re-synthesized into a
    /// single trace label.
    MultilineName,
}

impl SkipReason {
    /// Stable string code for reports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::ConstexprFunction => "constexpr-function",
            SkipReason::MissingDeclarator => "missing-declarator",
            SkipReason::MissingName => "missing-name",
            SkipReason::MissingParameterList => "missing-parameter-list",
            SkipReason::MissingBody => "missing-body",
            SkipReason::MultilineName => "multiline-name",
        }
    }
}

/// One rejected candidate: what failed, why, and the offending source text.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Node kind or custom label naming the check that failed.
    pub label: String,
    pub reason: SkipReason,
    /// Source text of the offending node.
    pub snippet: String,
}

/// Accumulates diagnostics in discovery order.
///
/// Already-instrumented functions are counted but produce no diagnostic
/// record: converging to a no-op on re-runs is expected steady state, not a
/// reportable condition.
#[derive(Debug, Default)]
pub struct DiagnosticsSink {
    entries: Vec<Diagnostic>,
    already_instrumented: usize,
}

impl DiagnosticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: impl Into<String>, reason: SkipReason, snippet: &str) {
        self.entries.push(Diagnostic {
            label: label.into(),
            reason,
            snippet: snippet.to_string(),
        });
    }

    /// Count a function whose body already begins with the trace marker.
    pub fn note_already_instrumented(&mut self) {
        self.already_instrumented += 1;
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn already_instrumented(&self) -> usize {
        self.already_instrumented
    }

    /// Consume the sink, yielding the recorded entries and the
    /// already-instrumented count.
    pub fn into_parts(self) -> (Vec<Diagnostic>, usize) {
        (self.entries, self.already_instrumented)
    }
}
