//! Phase 5: Orphan Sweep
//!
//! Keeps the output directory in sync with the site: anything that existed
//! before the write phase and was not touched by it is deleted.
//!
//! ## Process
//!
//! 1.  **Snapshot**: Before writing, every file and directory below the
//!     output root is listed, hidden ones included.
//!
//! 2.  **Orphans**: After a successful write, the orphans are the snapshot
//!     minus the touched paths and their ancestor directories. Paths inside
//!     a configured static directory, and the directories leading to it,
//!     are never orphans.
//!
//! 3.  **Delete**: Orphans are removed deepest first, so directories are
//!     empty by the time they are removed. A failed deletion is logged and
//!     the sweep continues.
//!
//! Paths are relative to the output root throughout.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// What the sweep removed.
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub deleted: Vec<PathBuf>,
    pub failures: usize,
}

/// Every file and directory below `webroot`, relative to it.
pub fn snapshot(webroot: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut entries = BTreeSet::new();
    for entry in WalkDir::new(webroot).min_depth(1) {
        let entry = entry?;
        if let Ok(relative) = entry.path().strip_prefix(webroot) {
            entries.insert(relative.to_path_buf());
        }
    }
    Ok(entries)
}

/// Every directory containing a path of `touched`, the root excluded.
pub fn ancestors(touched: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    touched
        .iter()
        .flat_map(|path| path.ancestors().skip(1))
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect()
}

/// Paths of `before` the current run has no use for.
pub fn orphans(
    before: &BTreeSet<PathBuf>,
    touched: &BTreeSet<PathBuf>,
    static_dirs: &[PathBuf],
) -> BTreeSet<PathBuf> {
    let parents = ancestors(touched);
    let static_parents: BTreeSet<PathBuf> = ancestors(&static_dirs.iter().cloned().collect());

    before
        .iter()
        .filter(|path| !touched.contains(*path) && !parents.contains(*path))
        .filter(|path| !static_dirs.iter().any(|dir| path.starts_with(dir)))
        .filter(|path| !static_parents.contains(*path))
        .cloned()
        .collect()
}

/// Delete `orphans` below `webroot`, children before their directories.
pub fn delete(webroot: &Path, orphans: &BTreeSet<PathBuf>) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    // Components order paths so every child sorts after its parent.
    for relative in orphans.iter().rev() {
        let path = webroot.join(relative);
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                error!("Cannot inspect '{}': {}", path.display(), e);
                outcome.failures += 1;
                continue;
            }
        };

        let result = if metadata.is_dir() {
            debug!("Deleting folder {}", relative.display());
            fs::remove_dir(&path)
        } else {
            debug!("Deleting file {}", relative.display());
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => outcome.deleted.push(relative.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                error!("Cannot delete '{}': {}", path.display(), e);
                outcome.failures += 1;
            }
        }
    }

    outcome.deleted.reverse();
    if !outcome.deleted.is_empty() {
        info!("Deleted {} orphaned paths", outcome.deleted.len());
    }
    outcome
}

/// Write a plain text report of a run's touched and deleted paths.
pub fn write_file_index(
    path: &Path,
    touched: &BTreeSet<PathBuf>,
    deleted: &[PathBuf],
) -> Result<()> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = fs::File::create(path)?;
        writeln!(file, "File index of generation")?;
        writeln!(file, "\nTouched:")?;
        for entry in touched {
            writeln!(file, "  {}", entry.display())?;
        }
        writeln!(file, "\nDeleted files:")?;
        for entry in deleted {
            writeln!(file, "  {}", entry.display())?;
        }
        Ok(())
    };

    write().map_err(|e| Error::Filesystem {
        message: format!("Failed to write file index '{}': {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_orphans_simple() {
        let before = set(&["a.html", "b.html"]);
        let touched = set(&["a.html", "c.html"]);
        assert_eq!(orphans(&before, &touched, &[]), set(&["b.html"]));
    }

    #[test]
    fn test_ancestors_of_touched_are_kept() {
        let before = set(&["docs", "docs/a", "docs/a/index.html", "old", "old/x.html"]);
        let touched = set(&["docs/a/index.html"]);
        assert_eq!(ancestors(&touched), set(&["docs", "docs/a"]));
        assert_eq!(orphans(&before, &touched, &[]), set(&["old", "old/x.html"]));
    }

    #[test]
    fn test_static_dirs_are_never_orphans() {
        let before = set(&["assets", "assets/img", "assets/img/logo.png", "stale.html"]);
        let touched = BTreeSet::new();
        let static_dirs = vec![PathBuf::from("assets/img")];
        assert_eq!(orphans(&before, &touched, &static_dirs), set(&["stale.html"]));
    }

    #[test]
    fn test_snapshot_includes_hidden_entries() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".well-known")).unwrap();
        fs::write(temp.path().join(".well-known/x"), "").unwrap();
        fs::write(temp.path().join("a.html"), "").unwrap();

        assert_eq!(
            snapshot(temp.path()).unwrap(),
            set(&[".well-known", ".well-known/x", "a.html"])
        );
    }

    #[test]
    fn test_delete_removes_children_before_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("old/deep")).unwrap();
        fs::write(temp.path().join("old/deep/x.html"), "").unwrap();
        fs::write(temp.path().join("keep.html"), "").unwrap();

        let before = snapshot(temp.path()).unwrap();
        let orphans = orphans(&before, &set(&["keep.html"]), &[]);
        let outcome = delete(temp.path(), &orphans);

        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.deleted, vec![
            PathBuf::from("old"),
            PathBuf::from("old/deep"),
            PathBuf::from("old/deep/x.html"),
        ]);
        assert!(!temp.path().join("old").exists());
        assert!(temp.path().join("keep.html").exists());
    }

    #[test]
    fn test_delete_failure_does_not_abort() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("busy")).unwrap();
        fs::write(temp.path().join("busy/kept.txt"), "").unwrap();
        fs::write(temp.path().join("z.html"), "").unwrap();

        // "busy" is not empty, so removing it fails
        let outcome = delete(temp.path(), &set(&["busy", "z.html", "gone.html"]));
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.deleted, vec![PathBuf::from("z.html")]);
        assert!(temp.path().join("busy/kept.txt").exists());
    }

    #[test]
    fn test_write_file_index() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reports/files.txt");
        write_file_index(&path, &set(&["a.html"]), &[PathBuf::from("b.html")]).unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("File index of generation"));
        assert!(text.contains("Touched:\n  a.html"));
        assert!(text.contains("Deleted files:\n  b.html"));
    }
}
