//! Per-file instrumentation sessions and the tree-level driver.
//!
//! A session is one pass over one file: read, parse, plan, apply, write
//! back. Sessions share nothing, so the tree driver fans out over rayon
//! with a thread-local parser per worker. A failure inside one session is
//! contained to that file's outcome; the run always continues.

use crate::backup::{self, BackupError};
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::edit::{apply_insertions, write_instrumented, EditError};
use crate::planner::{plan, PlanOptions};
use crate::pool::with_parser;
use crate::safety::{RootGuard, SafetyError};
use crate::ts::TreeSitterError;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] TreeSitterError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Options for a whole run.
#[derive(Debug, Clone)]
pub struct InstrumentOptions {
    pub plan: PlanOptions,
    /// File extensions to instrument, without the leading dot.
    pub extensions: Vec<String>,
    /// Plan and report without writing anything back.
    pub dry_run: bool,
    /// Copy originals into a timestamped backup directory before writing.
    pub backup: bool,
    /// Keep before/after buffers on changed outcomes for diff rendering.
    pub capture_contents: bool,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            plan: PlanOptions::default(),
            extensions: vec!["cpp".to_string()],
            dry_run: false,
            backup: true,
            capture_contents: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// At least one trace statement was inserted (or would be, in dry-run).
    Instrumented,
    /// Nothing to do: no eligible function needed a marker.
    Unchanged,
    /// The file could not be processed; it was left untouched.
    Failed,
}

/// Outcome of one file's session.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Functions that received (or would receive) a trace statement.
    pub instrumented: usize,
    /// Functions whose first statement already carried the marker.
    pub already_instrumented: usize,
    /// Per-function rejections, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    /// The parse tree contained ERROR nodes (instrumentation still ran on
    /// the valid parts).
    pub syntax_errors: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub before: Option<String>,
    #[serde(skip)]
    pub after: Option<String>,
}

impl FileOutcome {
    fn failed(path: PathBuf, error: InstrumentError) -> Self {
        Self {
            path,
            status: FileStatus::Failed,
            instrumented: 0,
            already_instrumented: 0,
            diagnostics: Vec::new(),
            syntax_errors: false,
            error: Some(error.to_string()),
            before: None,
            after: None,
        }
    }
}

/// Result of the pure parse → plan → apply pipeline on one buffer.
pub struct InstrumentedSource {
    pub output: String,
    pub instrumented: usize,
    pub already_instrumented: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub syntax_errors: bool,
}

impl InstrumentedSource {
    pub fn changed(&self) -> bool {
        self.instrumented > 0
    }
}

/// Instrument one in-memory buffer.
///
/// I/O never happens here; this is the unit the whole tool is built
/// around, and the unit tests exercise.
pub fn instrument_source(
    source: &str,
    options: &PlanOptions,
) -> Result<InstrumentedSource, InstrumentError> {
    let (insertions, sink, syntax_errors) = with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        let mut sink = DiagnosticsSink::new();
        let insertions = plan(parsed.root_node(), source, options, &mut sink);
        Ok::<_, TreeSitterError>((insertions, sink, parsed.has_errors()))
    })??;

    let instrumented = insertions.len();
    let output = apply_insertions(source, &insertions)?;
    let (diagnostics, already_instrumented) = sink.into_parts();

    Ok(InstrumentedSource {
        output,
        instrumented,
        already_instrumented,
        diagnostics,
        syntax_errors,
    })
}

/// Run one file's session: validate the path, read, instrument, write back.
pub fn instrument_file(
    path: &Path,
    options: &InstrumentOptions,
    guard: &RootGuard,
) -> Result<FileOutcome, InstrumentError> {
    let path = guard.validate_path(path)?;

    let source = fs::read_to_string(&path).map_err(|source| InstrumentError::Read {
        path: path.clone(),
        source,
    })?;

    let result = instrument_source(&source, &options.plan)?;

    let changed = result.changed();
    if changed && !options.dry_run {
        write_instrumented(&path, &result.output)?;
    }

    let (before, after) = if changed && options.capture_contents {
        (Some(source), Some(result.output))
    } else {
        (None, None)
    };

    Ok(FileOutcome {
        path,
        status: if changed {
            FileStatus::Instrumented
        } else {
            FileStatus::Unchanged
        },
        instrumented: result.instrumented,
        already_instrumented: result.already_instrumented,
        diagnostics: result.diagnostics,
        syntax_errors: result.syntax_errors,
        error: None,
        before,
        after,
    })
}

/// Recursively collect files under `root` matching the extension set, in
/// sorted order for reproducible runs.
///
/// Backup directories from earlier runs are pruned from the walk; their
/// contents are the restore path, not instrumentation targets.
pub fn discover_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, InstrumentError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.contains("_bak_")))
    });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want == ext));
        if matches {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Summary of a whole-tree run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub files: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn functions_instrumented(&self) -> usize {
        self.files.iter().map(|f| f.instrumented).sum()
    }

    pub fn functions_already_instrumented(&self) -> usize {
        self.files.iter().map(|f| f.already_instrumented).sum()
    }

    pub fn functions_rejected(&self) -> usize {
        self.files.iter().map(|f| f.diagnostics.len()).sum()
    }

    pub fn files_changed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Instrumented)
            .count()
    }

    pub fn files_failed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
            .count()
    }
}

/// Instrument every matching file under `root`.
///
/// Files are independent: after discovery and backup, sessions run in
/// parallel, one rayon worker and one pooled parser per thread. Outcome
/// order matches discovery order regardless of scheduling.
pub fn instrument_tree(
    root: &Path,
    options: &InstrumentOptions,
) -> Result<RunSummary, InstrumentError> {
    let mut guard = RootGuard::new(root)?;
    let files = discover_files(guard.root(), &options.extensions)?;

    let backup_dir = if options.backup && !options.dry_run && !files.is_empty() {
        let dir = backup::backup_dir_for(guard.root());
        backup::backup_files(&files, guard.root(), &dir)?;
        if let Ok(canonical) = dir.canonicalize() {
            guard.forbid(canonical);
        }
        Some(dir)
    } else {
        None
    };

    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|file| {
            instrument_file(file, options, &guard)
                .unwrap_or_else(|e| FileOutcome::failed(file.clone(), e))
        })
        .collect();

    Ok(RunSummary {
        root: guard.root().to_path_buf(),
        backup_dir,
        files: outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_source_inserts_marker() {
        let source = "int add(int a, int b) { return a + b; }";
        let result = instrument_source(source, &PlanOptions::default()).unwrap();

        assert!(result.changed());
        assert_eq!(result.instrumented, 1);
        assert_eq!(
            result.output,
            "int add(int a, int b) { TRACE_MARKER(add); return a + b; }"
        );
    }

    #[test]
    fn instrument_source_is_idempotent() {
        let source = "void tick() {\n    step();\n}\n";
        let first = instrument_source(source, &PlanOptions::default()).unwrap();
        let second = instrument_source(&first.output, &PlanOptions::default()).unwrap();

        assert!(!second.changed());
        assert_eq!(second.output, first.output);
        assert_eq!(second.already_instrumented, 1);
        assert!(second.diagnostics.is_empty());
    }

    #[test]
    fn syntax_errors_are_flagged_but_not_fatal() {
        let source = "int broken( ;\n\nint ok(int x) { return x; }\n";
        let result = instrument_source(source, &PlanOptions::default()).unwrap();

        assert!(result.syntax_errors);
        assert!(result.output.contains("TRACE_MARKER(ok);"));
    }

    #[test]
    fn discovery_filters_by_extension() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.cpp"), "").unwrap();
        fs::write(temp.path().join("b.h"), "").unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/c.cpp"), "").unwrap();

        let files = discover_files(temp.path(), &["cpp".to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(names, vec![PathBuf::from("a.cpp"), PathBuf::from("sub/c.cpp")]);
    }
}
