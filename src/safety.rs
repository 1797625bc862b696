use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boundary checks to prevent instrumenting files outside the target root.
///
/// Backup directories from earlier runs sit next to (or under) the root and
/// contain valid C++ sources; writing trace statements into them would
/// destroy the restore path, so they are forbidden alongside anything that
/// escapes the root through symlinks or `..` components.
#[derive(Debug, Clone)]
pub struct RootGuard {
    /// Absolute path to the source root
    root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside source root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl RootGuard {
    /// Create a new guard for the given root.
    ///
    /// The root is canonicalized so symlinked layouts are handled correctly.
    /// Any `*_bak_*` sibling or child directory of the root is registered as
    /// forbidden.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();
        let mut scan_dirs = vec![root.clone()];
        if let Some(parent) = root.parent() {
            scan_dirs.push(parent.to_path_buf());
        }

        for dir in scan_dirs {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_backup = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains("_bak_"));
                if is_backup && path.is_dir() {
                    if let Ok(canonical) = path.canonicalize() {
                        forbidden_paths.push(canonical);
                    }
                }
            }
        }

        Ok(Self {
            root,
            forbidden_paths,
        })
    }

    /// Register an additional forbidden directory (e.g. the backup directory
    /// created for the current run).
    pub fn forbid(&mut self, path: impl Into<PathBuf>) {
        self.forbidden_paths.push(path.into());
    }

    /// Check if a path is safe to instrument.
    ///
    /// Returns the canonicalized absolute path if safe.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        // Canonicalize to resolve symlinks and .. components
        let canonical = absolute.canonicalize()?;

        self.check_canonical(&canonical)?;

        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical.to_path_buf(),
                root: self.root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    /// Get the source root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn validate_path_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let guard = RootGuard::new(root).unwrap();

        let file = root.join("src/widget.cpp");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
    }

    #[test]
    fn validate_path_outside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        let guard = RootGuard::new(&root).unwrap();

        let outside = temp_dir.path().join("outside.cpp");
        fs::write(&outside, b"").unwrap();

        let result = guard.validate_path(&outside);
        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));
    }

    #[test]
    fn backup_dirs_are_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("tree");
        let backup = root.join("tree_bak_2024-01-01_00-00-00");
        fs::create_dir_all(&backup).unwrap();
        let file = backup.join("old.cpp");
        fs::write(&file, b"").unwrap();

        let guard = RootGuard::new(&root).unwrap();
        let result = guard.validate_path(&file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn forbid_registers_new_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let extra = root.join("fresh");
        fs::create_dir_all(&extra).unwrap();
        let file = extra.join("f.cpp");
        fs::write(&file, b"").unwrap();

        let mut guard = RootGuard::new(root).unwrap();
        guard.forbid(extra.canonicalize().unwrap());

        let result = guard.validate_path(&file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn symlink_escape_is_rejected() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();

        let outside = temp_dir.path().join("outside.cpp");
        fs::write(&outside, b"").unwrap();

        let link = root.join("escape.cpp");
        symlink(&outside, &link).unwrap();

        let guard = RootGuard::new(&root).unwrap();
        let result = guard.validate_path(&link);

        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));
    }
}
