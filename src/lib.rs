//! Trace Stamper: source-to-source profiling instrumentation for C++.
//!
//! Parses every file in a source tree with tree-sitter, finds function
//! definitions, and inserts a `TRACE_MARKER(<name>);` statement as the
//! first executable statement of each eligible function body.
//!
//! # Architecture
//!
//! All instrumentation compiles down to a single primitive: [`Insertion`],
//! a text insertion at a byte offset of the original buffer. Intelligence
//! lives in insertion planning (tree traversal, eligibility validation,
//! offset computation), not in the application logic: the applier just
//! replays insertions in descending offset order, which keeps every
//! recorded offset valid without position bookkeeping.
//!
//! # Safety
//!
//! - Eligibility validation per function: constexpr functions, malformed
//!   declarators, and multi-line names are skipped with a diagnostic
//! - Idempotent: re-runs detect the marker and converge to a no-op
//! - Atomic file writes (tempfile + fsync + rename)
//! - Timestamped backup of originals before any write
//! - Source-root boundary enforcement
//!
//! # Example
//!
//! ```no_run
//! use trace_stamper::instrument::{instrument_source, InstrumentError};
//! use trace_stamper::planner::PlanOptions;
//!
//! # fn main() -> Result<(), InstrumentError> {
//! let source = "int add(int a, int b) { return a + b; }";
//! let result = instrument_source(source, &PlanOptions::default())?;
//! assert!(result.output.contains("TRACE_MARKER(add);"));
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod diagnostics;
pub mod edit;
pub mod instrument;
pub mod planner;
pub mod pool;
pub mod report;
pub mod safety;
pub mod ts;

// Re-exports
pub use diagnostics::{Diagnostic, DiagnosticsSink, SkipReason};
pub use edit::{apply_insertions, EditError, Insertion};
pub use instrument::{
    instrument_file, instrument_source, instrument_tree, FileOutcome, FileStatus,
    InstrumentError, InstrumentOptions, RunSummary,
};
pub use planner::{plan, EmptyBodyPolicy, PlanOptions, TRACE_MARKER};
pub use safety::{RootGuard, SafetyError};
pub use ts::{CppParser, ParsedSource, TreeSitterError};
