//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use walkdir::WalkDir;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
///
/// Used to discard partially-built outputs and partially-extracted toolsets.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Find files matching a glob pattern relative to a base directory.
///
/// Used to discover build artifacts in a target's output directory.
pub fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = base.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut results = Vec::new();
    for entry in glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))? {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    results.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    results.sort();
    Ok(results)
}

/// Check whether a directory exists and contains at least one file.
///
/// A cached toolset is only trusted when its directory has real content; an
/// empty directory left over from an aborted extraction does not count.
pub fn dir_has_files(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("plugin.so"), b"elf").unwrap();
        fs::write(out.join("plugin.d"), b"dep").unwrap();

        let files = glob_files(tmp.path(), "out/*.so").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("plugin.so"));
    }

    #[test]
    fn test_dir_has_files() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        assert!(!dir_has_files(&empty));

        let filled = tmp.path().join("filled/nested");
        fs::create_dir_all(&filled).unwrap();
        fs::write(filled.join("bin"), b"x").unwrap();
        assert!(dir_has_files(&tmp.path().join("filled")));
    }

    #[test]
    fn test_remove_dir_all_if_exists() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("partial");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("half.tar"), b"...").unwrap();

        remove_dir_all_if_exists(&dir).unwrap();
        assert!(!dir.exists());

        // A second removal of a missing directory is fine.
        remove_dir_all_if_exists(&dir).unwrap();
    }
}
