//! Instrumentation planning over a parsed C++ tree.
//!
//! The planner walks named nodes in pre-order, validates every function
//! definition against the eligibility pipeline, and emits one [`Insertion`]
//! per function that can safely receive a trace statement. Rejections go to
//! the injected [`DiagnosticsSink`]; one invalid function never blocks the
//! rest of the file.

use crate::diagnostics::{DiagnosticsSink, SkipReason};
use crate::edit::Insertion;
use tree_sitter::Node;

/// Marker token inserted into function bodies. Idempotency detection keys on
/// this substring, so re-runs converge regardless of the argument text.
pub const TRACE_MARKER: &str = "TRACE_MARKER";

/// The full statement inserted for a function name.
pub fn trace_statement(name: &str) -> String {
    format!("{TRACE_MARKER}({name});")
}

/// What to do with a function whose body has no statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyBodyPolicy {
    /// Leave empty bodies alone.
    #[default]
    Skip,
    /// Insert right after the opening brace, synthesizing a newline and one
    /// indent level from the function's own leading whitespace.
    Instrument,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    pub empty_bodies: EmptyBodyPolicy,
}

/// A function definition that passed all structural checks.
///
/// Lives only long enough to compute its insertion; never escapes the
/// planning pass.
struct Candidate<'t, 's> {
    name: &'s str,
    body: Node<'t>,
}

enum Verdict {
    Insert(Insertion),
    AlreadyInstrumented,
    EmptyBodySkipped,
    Reject(Rejection),
}

struct Rejection {
    label: &'static str,
    reason: SkipReason,
    snippet: String,
}

fn reject(label: &'static str, reason: SkipReason, snippet: &str) -> Verdict {
    Verdict::Reject(Rejection {
        label,
        reason,
        snippet: snippet.to_string(),
    })
}

/// Walk the tree and plan all insertions for one source buffer.
///
/// Traversal is pre-order over named children, driven by an explicit
/// work-list of first-child/next-sibling links. Function definitions are
/// evaluated where they are found, and their subtrees are always descended
/// into afterwards so nested function-like constructs (local classes,
/// member definitions) are caught regardless of the outer verdict.
pub fn plan(
    root: Node<'_>,
    source: &str,
    options: &PlanOptions,
    sink: &mut DiagnosticsSink,
) -> Vec<Insertion> {
    let mut insertions = Vec::new();
    let mut pending = vec![root];

    while let Some(node) = pending.pop() {
        // Sibling below child: the whole subtree is visited first.
        if let Some(sibling) = node.next_named_sibling() {
            pending.push(sibling);
        }
        if let Some(child) = node.named_child(0) {
            pending.push(child);
        }

        if node.kind() == "function_definition" {
            match evaluate_function(node, source, options) {
                Verdict::Insert(insertion) => insertions.push(insertion),
                Verdict::AlreadyInstrumented => sink.note_already_instrumented(),
                Verdict::EmptyBodySkipped => {}
                Verdict::Reject(r) => sink.record(r.label, r.reason, &r.snippet),
            }
        }
    }

    insertions
}

/// Run the eligibility pipeline on one function definition.
///
/// Checks run in a fixed order and the first failure wins, so every
/// function produces exactly one outcome: an insertion, a silent
/// already-instrumented skip, an empty-body skip, or one rejection.
fn evaluate_function(node: Node<'_>, source: &str, options: &PlanOptions) -> Verdict {
    let text = |n: Node<'_>| &source[n.byte_range()];

    // constexpr functions may run at translation time; a runtime trace
    // statement would make them ill-formed there.
    if let Some(qualifier) = first_level_child_of_kind(node, "type_qualifier") {
        if text(qualifier) == "constexpr" {
            return reject(
                "constexpr function",
                SkipReason::ConstexprFunction,
                text(node),
            );
        }
    }

    let Some(declarator) = first_level_child_of_kind(node, "function_declarator") else {
        return reject("function_declarator", SkipReason::MissingDeclarator, text(node));
    };

    let has_name = ["identifier", "field_identifier", "qualified_identifier"]
        .iter()
        .copied()
        .any(|kind| first_level_child_of_kind(declarator, kind).is_some());
    if !has_name {
        return reject("declarator name", SkipReason::MissingName, text(node));
    }

    if first_level_child_of_kind(declarator, "parameter_list").is_none() {
        return reject("parameter_list", SkipReason::MissingParameterList, text(node));
    }

    let Some(body) = first_level_child_of_kind(node, "compound_statement") else {
        return reject("compound_statement", SkipReason::MissingBody, text(node));
    };

    // The declarator field resolves qualified and operator names as one
    // token, unlike the raw identifier child.
    let Some(name_node) = declarator.child_by_field_name("declarator") else {
        return reject("declarator name", SkipReason::MissingName, text(declarator));
    };
    let name = text(name_node);
    if name.contains('\n') {
        return reject("declarator name", SkipReason::MultilineName, name);
    }

    Candidate { name, body }.plan(source, node, options)
}

impl<'t, 's> Candidate<'t, 's> {
    /// Compute the insertion point and text, or classify the skip.
    fn plan(self, source: &'s str, definition: Node<'t>, options: &PlanOptions) -> Verdict {
        match self.body.named_child(0) {
            Some(first_statement) => {
                if source[first_statement.byte_range()].contains(TRACE_MARKER) {
                    return Verdict::AlreadyInstrumented;
                }

                // Reuse the whitespace run between `{` and the first
                // statement so the file's own indentation style carries over.
                let after_open = self.body.start_byte() + 1;
                let gap = &source[after_open..first_statement.start_byte()];

                Verdict::Insert(Insertion::new(
                    first_statement.start_byte(),
                    format!("{}{gap}", trace_statement(self.name)),
                ))
            }
            None => match options.empty_bodies {
                EmptyBodyPolicy::Skip => Verdict::EmptyBodySkipped,
                EmptyBodyPolicy::Instrument => {
                    let indent = leading_indent(source, definition.start_byte());
                    Verdict::Insert(Insertion::new(
                        self.body.start_byte() + 1,
                        format!("\n{indent}    {}\n{indent}", trace_statement(self.name)),
                    ))
                }
            },
        }
    }
}

/// Find a node's first-level named child of the given kind, following
/// next-sibling links.
fn first_level_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut child = node.named_child(0);
    while let Some(candidate) = child {
        if candidate.kind() == kind {
            return Some(candidate);
        }
        child = candidate.next_named_sibling();
    }
    None
}

/// Whitespace prefix of the line containing the given byte offset.
fn leading_indent(source: &str, at: usize) -> &str {
    let line_start = source[..at].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..at];
    let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..indent_len]
}
