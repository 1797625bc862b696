//! Rendering of run outcomes: colored console lines, unified diffs, and a
//! machine-readable JSON report.
//!
//! Rendering is strictly downstream of the diagnostics sink and run
//! summary; nothing here feeds back into planning.

use crate::diagnostics::Diagnostic;
use crate::instrument::{FileOutcome, FileStatus, RunSummary};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Print one file's outcome: a status line, then per-function rejection
/// lines in discovery order.
pub fn print_file_outcome(outcome: &FileOutcome, show_diff: bool) {
    match outcome.status {
        FileStatus::Failed => {
            eprintln!(
                "{} {}: {}",
                "✗".red(),
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            return;
        }
        FileStatus::Instrumented => {
            println!(
                "{} {}: {} instrumented",
                "✓".green(),
                outcome.path.display(),
                format!("{} function(s)", outcome.instrumented).green()
            );
        }
        FileStatus::Unchanged => {
            println!("{}", format!("  {}: unchanged", outcome.path.display()).dimmed());
        }
    }

    if outcome.already_instrumented > 0 {
        println!(
            "  {} {} already instrumented",
            "⊙".yellow(),
            outcome.already_instrumented
        );
    }

    if outcome.syntax_errors {
        println!(
            "  {}",
            "syntax errors present; valid regions were still instrumented".yellow()
        );
    }

    for diagnostic in &outcome.diagnostics {
        print_diagnostic(diagnostic);
    }

    if show_diff {
        if let (Some(before), Some(after)) = (&outcome.before, &outcome.after) {
            display_diff(&outcome.path, before, after);
        }
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    println!(
        "  {} {} ({}): {}",
        "⊘".red(),
        diagnostic.label.red(),
        diagnostic.reason.code(),
        first_line(&diagnostic.snippet).dimmed()
    );
}

/// First line of a snippet, capped so a whole pasted function body does not
/// flood the console. The full text stays in the JSON report.
fn first_line(snippet: &str) -> String {
    let line = snippet.lines().next().unwrap_or("");
    const MAX: usize = 120;
    if line.len() > MAX {
        let cut = line
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}…", &line[..cut])
    } else {
        line.to_string()
    }
}

/// Show a unified diff between the original and instrumented content.
pub fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!(
        "{}",
        format!("+++ {} (instrumented)", file.display()).dimmed()
    );

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Print the run totals.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} functions instrumented",
        format!("{}", summary.functions_instrumented()).green()
    );
    println!(
        "  {} already instrumented",
        format!("{}", summary.functions_already_instrumented()).yellow()
    );
    println!(
        "  {} rejected",
        format!("{}", summary.functions_rejected()).red()
    );
    println!("  {} files changed", summary.files_changed());
    if summary.files_failed() > 0 {
        println!(
            "  {} files failed",
            format!("{}", summary.files_failed()).red()
        );
    }
    if let Some(backup) = &summary.backup_dir {
        println!("  originals preserved in {}", backup.display());
    }
}

/// Persist the whole run summary as pretty-printed JSON.
pub fn write_json_report(summary: &RunSummary, path: &Path) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}
