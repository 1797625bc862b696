use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// The fundamental instrumentation primitive: a text insertion at a byte
/// offset of the original buffer.
///
/// All planning intelligence lives upstream in offset acquisition, not in
/// application. Offsets always address the buffer the planner saw, never an
/// intermediate state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an Insertion does nothing until applied"]
pub struct Insertion {
    /// Byte offset into the original buffer.
    pub offset: usize,
    /// Text to insert at that offset.
    pub text: String,
}

impl Insertion {
    pub fn new(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("insertion offset {offset} exceeds buffer length {buffer_len}")]
    OffsetOutOfBounds { offset: usize, buffer_len: usize },

    #[error("insertion offset {offset} is not a UTF-8 character boundary")]
    OffsetNotCharBoundary { offset: usize },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Apply a batch of insertions to one buffer, producing a new buffer.
///
/// Insertions are applied in descending offset order: inserting at a high
/// offset never shifts the position of a lower, not-yet-applied offset, so
/// every recorded offset stays valid with zero position bookkeeping.
///
/// Insertions sharing an offset are applied in reverse discovery order,
/// which leaves their text in discovery order in the output. The planner
/// emits at most one insertion per function, so ties only arise from
/// hand-built batches, but the result must be deterministic either way.
///
/// All offsets are validated before the first splice; a bad offset fails
/// fast and leaves no partially-edited buffer behind.
pub fn apply_insertions(source: &str, insertions: &[Insertion]) -> Result<String, EditError> {
    for insertion in insertions {
        if insertion.offset > source.len() {
            return Err(EditError::OffsetOutOfBounds {
                offset: insertion.offset,
                buffer_len: source.len(),
            });
        }
        if !source.is_char_boundary(insertion.offset) {
            return Err(EditError::OffsetNotCharBoundary {
                offset: insertion.offset,
            });
        }
    }

    let mut order: Vec<usize> = (0..insertions.len()).collect();
    order.sort_by(|&a, &b| {
        insertions[b]
            .offset
            .cmp(&insertions[a].offset)
            .then(b.cmp(&a))
    });

    let added: usize = insertions.iter().map(|i| i.text.len()).sum();
    let mut output = String::with_capacity(source.len() + added);
    output.push_str(source);

    for index in order {
        let insertion = &insertions[index];
        output.insert_str(insertion.offset, &insertion.text);
    }

    Ok(output)
}

/// Overwrite a file with instrumented content atomically.
///
/// Uses tempfile + fsync + rename so a crash mid-write leaves the original
/// intact, then bumps the mtime so incremental build systems recompile the
/// touched file.
pub fn write_instrumented(path: &Path, content: &str) -> Result<(), EditError> {
    atomic_write(path, content.as_bytes())?;

    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now)?;

    Ok(())
}

/// Atomic file write: tempfile in the same directory, fsync, rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn apply_empty_batch_is_identity() {
        let source = "int main() { return 0; }";
        let result = apply_insertions(source, &[]).unwrap();
        assert_eq!(result, source);
    }

    #[test]
    fn apply_single_insertion() {
        let source = "{ return 0; }";
        let insertions = vec![Insertion::new(2, "TRACE_MARKER(main); ")];
        let result = apply_insertions(source, &insertions).unwrap();
        assert_eq!(result, "{ TRACE_MARKER(main); return 0; }");
    }

    #[test]
    fn descending_application_keeps_offsets_valid() {
        let source = "aa bb cc";
        // Discovery order is ascending; applier must still land each text
        // at the offset recorded against the original buffer.
        let insertions = vec![
            Insertion::new(0, "<"),
            Insertion::new(3, "["),
            Insertion::new(6, "("),
        ];
        let result = apply_insertions(source, &insertions).unwrap();
        assert_eq!(result, "<aa [bb (cc");
    }

    #[test]
    fn output_length_is_sum_of_parts() {
        let source = "void f() {}";
        let insertions = vec![Insertion::new(10, "x"), Insertion::new(0, "yy")];
        let result = apply_insertions(source, &insertions).unwrap();
        let added: usize = insertions.iter().map(|i| i.text.len()).sum();
        assert_eq!(result.len(), source.len() + added);
    }

    #[test]
    fn ties_preserve_discovery_order() {
        let source = "||";
        let insertions = vec![
            Insertion::new(1, "first"),
            Insertion::new(1, "second"),
            Insertion::new(1, "third"),
        ];
        let result = apply_insertions(source, &insertions).unwrap();
        assert_eq!(result, "|firstsecondthird|");
    }

    #[test]
    fn offset_past_end_fails_fast() {
        let source = "short";
        let insertions = vec![Insertion::new(0, "ok"), Insertion::new(99, "bad")];
        let result = apply_insertions(source, &insertions);
        assert!(matches!(
            result,
            Err(EditError::OffsetOutOfBounds {
                offset: 99,
                buffer_len: 5
            })
        ));
    }

    #[test]
    fn offset_inside_multibyte_char_fails() {
        let source = "é";
        let insertions = vec![Insertion::new(1, "x")];
        let result = apply_insertions(source, &insertions);
        assert!(matches!(
            result,
            Err(EditError::OffsetNotCharBoundary { offset: 1 })
        ));
    }

    #[test]
    fn insertion_at_buffer_end_is_allowed() {
        let source = "ab";
        let result = apply_insertions(source, &[Insertion::new(2, "c")]).unwrap();
        assert_eq!(result, "abc");
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.cpp");
        fs::write(&file_path, "original content").unwrap();

        write_instrumented(&file_path, "modified content").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "modified content");
    }
}
