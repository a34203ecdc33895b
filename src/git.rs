//! Read-only access to working copies through the system `git` command.
//!
//! Nothing here talks to a remote. Cloning and pulling happen outside of
//! this crate; these helpers only read metadata of what is already checked
//! out.

use std::path::Path;
use std::process::Command;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// Whether `path` is the top of a working copy.
///
/// A `.git` directory, or a `.git` file for worktrees and submodules, marks
/// the top of a working copy.
pub fn is_work_tree(path: &Path) -> bool {
    path.is_dir() && path.join(".git").exists()
}

/// Run `git -C <path> <args>`, failing only if `git` cannot be spawned.
fn run_git(path: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .arg("-C")
        .arg(path)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            path: path.display().to_string(),
            stderr: e.to_string(),
        })
}

/// Commit time of `HEAD`, in the committer's local time.
///
/// The timezone offset is dropped so the value compares directly with the
/// `YYYY-MM-DD HH:MM:SS` checkpoint format.
pub fn head_commit_time(path: &Path) -> Result<NaiveDateTime> {
    let args = ["log", "-1", "--format=%ci", "HEAD"];
    let output = run_git(path, &args)?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            path: path.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_commit_time(stdout.trim()).ok_or_else(|| Error::GitCommand {
        command: args.join(" "),
        path: path.display().to_string(),
        stderr: format!("unexpected commit date '{}'", stdout.trim()),
    })
}

/// Parse `git log --format=%ci` output, e.g. `2020-02-16 04:53:32 +0100`.
pub fn parse_commit_time(text: &str) -> Option<NaiveDateTime> {
    let local = text.get(..19)?;
    NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").ok()
}

/// URL of the `origin` remote, if one is configured.
pub fn remote_url(path: &Path) -> Result<Option<String>> {
    let args = ["config", "--get", "remote.origin.url"];
    let output = run_git(path, &args)?;

    // `git config --get` exits with 1 when the key is not set
    match output.status.code() {
        Some(0) => {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok(if url.is_empty() { None } else { Some(url) })
        }
        Some(1) => Ok(None),
        _ => Err(Error::GitCommand {
            command: args.join(" "),
            path: path.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}
