//! Pre-write backup of every file the run may touch.
//!
//! Original bytes are preserved in a timestamped sibling directory that
//! mirrors the relative path structure of the source tree. Instrumentation
//! assumes the backup has already completed; restoring from it and
//! re-running is the recovery path for an interrupted run.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("failed to create backup directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {path} into backup: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file {path} is not under the source root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Compute the backup directory for a run started now:
/// `<rootname>_bak_<YYYY-MM-DD_HH-MM-SS>`, a sibling of the root.
pub fn backup_dir_for(root: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tree".to_string());
    let dir_name = format!("{name}_bak_{stamp}");
    match root.parent() {
        Some(parent) => parent.join(dir_name),
        None => PathBuf::from(dir_name),
    }
}

/// Copy `files` (all under `source_root`) into `backup_root`, mirroring
/// their relative paths.
pub fn backup_files(
    files: &[PathBuf],
    source_root: &Path,
    backup_root: &Path,
) -> Result<(), BackupError> {
    fs::create_dir_all(backup_root).map_err(|source| BackupError::CreateDir {
        path: backup_root.to_path_buf(),
        source,
    })?;

    for file in files {
        let relative = file
            .strip_prefix(source_root)
            .map_err(|_| BackupError::OutsideRoot {
                path: file.clone(),
                root: source_root.to_path_buf(),
            })?;

        let backup_path = backup_root.join(relative);

        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent).map_err(|source| BackupError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::copy(file, &backup_path).map_err(|source| BackupError::Copy {
            path: file.clone(),
            source,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_relative_paths() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("proj");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.cpp"), "int a;").unwrap();
        fs::write(root.join("sub/b.cpp"), "int b;").unwrap();

        let backup_root = temp.path().join("proj_bak_test");
        let files = vec![root.join("a.cpp"), root.join("sub/b.cpp")];
        backup_files(&files, &root, &backup_root).unwrap();

        assert_eq!(
            fs::read_to_string(backup_root.join("a.cpp")).unwrap(),
            "int a;"
        );
        assert_eq!(
            fs::read_to_string(backup_root.join("sub/b.cpp")).unwrap(),
            "int b;"
        );
    }

    #[test]
    fn rejects_files_outside_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("proj");
        fs::create_dir_all(&root).unwrap();
        let stray = temp.path().join("stray.cpp");
        fs::write(&stray, "int s;").unwrap();

        let backup_root = temp.path().join("proj_bak_test");
        let result = backup_files(&[stray], &root, &backup_root);
        assert!(matches!(result, Err(BackupError::OutsideRoot { .. })));
    }

    #[test]
    fn backup_dir_is_timestamped_sibling() {
        let dir = backup_dir_for(Path::new("/work/engine"));
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("engine_bak_"));
        assert_eq!(dir.parent(), Some(Path::new("/work")));
    }
}
