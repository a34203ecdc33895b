//! # Source Repositories
//!
//! A `SourceRepository` is a handle on one already checked-out working copy,
//! either an author's content repository or a template repository. It answers
//! two questions for the pipeline:
//!
//! - **Is it stale?** The commit time of `HEAD` is compared with a checkpoint
//!   stored next to the working copy in `<path>.status`. A repository without
//!   a checkpoint, or whose `HEAD` is strictly newer, needs regeneration.
//! - **What does it contain?** `files()` lists every regular, non-hidden file
//!   below the working copy, keyed by its `/`-separated relative path. The
//!   listing is computed once per handle.
//!
//! ## Design
//!
//! Version-control access goes through the `VcsOperations` trait. The
//! default implementation, `DefaultVcsOperations`, shells out to `git`
//! through [`crate::git`]; tests and embedders inject their own with
//! [`SourceRepository::open_with`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::NaiveDateTime;
use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// Format of the timestamp stored in a checkpoint file.
pub const CHECKPOINT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix appended to a working copy path to name its checkpoint file.
pub const CHECKPOINT_SUFFIX: &str = ".status";

/// Trait for version-control queries - allows mocking in tests
pub trait VcsOperations: Send + Sync {
    /// Whether `path` is the top of a working copy.
    fn is_repository(&self, path: &Path) -> bool;

    /// Commit time of the checked-out `HEAD`.
    fn commit_timestamp(&self, path: &Path) -> Result<NaiveDateTime>;

    /// URL of the remote the working copy was cloned from, if any.
    fn origin_url(&self, path: &Path) -> Result<Option<String>>;
}

/// The default implementation of `VcsOperations`, which uses the system's
/// `git` command.
pub struct DefaultVcsOperations;

impl VcsOperations for DefaultVcsOperations {
    fn is_repository(&self, path: &Path) -> bool {
        crate::git::is_work_tree(path)
    }

    fn commit_timestamp(&self, path: &Path) -> Result<NaiveDateTime> {
        crate::git::head_commit_time(path)
    }

    fn origin_url(&self, path: &Path) -> Result<Option<String>> {
        crate::git::remote_url(path)
    }
}

/// One checked-out author or template repository.
pub struct SourceRepository {
    id: String,
    path: PathBuf,
    checkpoint_path: PathBuf,
    vcs: Arc<dyn VcsOperations>,
    configured_origin: Option<String>,
    files: OnceLock<BTreeMap<String, PathBuf>>,
}

impl std::fmt::Debug for SourceRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRepository")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("checkpoint_path", &self.checkpoint_path)
            .field("configured_origin", &self.configured_origin)
            .finish_non_exhaustive()
    }
}

impl SourceRepository {
    /// Open the working copy at `path` using the system `git`.
    pub fn open(path: &Path, id: &str) -> Result<Self> {
        Self::open_with(path, id, Arc::new(DefaultVcsOperations))
    }

    /// Open the working copy at `path` with custom `VcsOperations`.
    pub fn open_with(path: &Path, id: &str, vcs: Arc<dyn VcsOperations>) -> Result<Self> {
        if !vcs.is_repository(path) {
            return Err(Error::NotARepository {
                path: path.display().to_string(),
            });
        }

        // Normalising drops a trailing separator, which would otherwise put
        // the checkpoint inside the working copy.
        let path: PathBuf = path.components().collect();
        let mut checkpoint = path.as_os_str().to_owned();
        checkpoint.push(CHECKPOINT_SUFFIX);

        Ok(Self {
            id: id.to_string(),
            checkpoint_path: PathBuf::from(checkpoint),
            path,
            vcs,
            configured_origin: None,
            files: OnceLock::new(),
        })
    }

    /// Use `url` as origin when the working copy has no remote.
    pub fn with_origin(mut self, url: Option<String>) -> Self {
        self.configured_origin = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Commit time of the checked-out `HEAD`.
    pub fn commit_timestamp(&self) -> Result<NaiveDateTime> {
        self.vcs.commit_timestamp(&self.path)
    }

    /// The timestamp stored by the last `mark_processed`, if any.
    pub fn last_processed_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        let text = match fs::read_to_string(&self.checkpoint_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Checkpoint {
                    path: self.checkpoint_path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        NaiveDateTime::parse_from_str(text.trim(), CHECKPOINT_FORMAT)
            .map(Some)
            .map_err(|e| Error::Checkpoint {
                path: self.checkpoint_path.display().to_string(),
                message: format!("'{}': {}", text.trim(), e),
            })
    }

    /// Whether the repository changed since it was last processed.
    ///
    /// An unreadable checkpoint counts as missing.
    pub fn needs_regeneration(&self) -> Result<bool> {
        let last = match self.last_processed_timestamp() {
            Ok(last) => last,
            Err(e) => {
                warn!("{}: {}; regenerating", self.id, e);
                None
            }
        };

        match last {
            None => Ok(true),
            Some(last) => Ok(self.commit_timestamp()? > last),
        }
    }

    /// Store the current commit time as checkpoint.
    ///
    /// The checkpoint is written to a temporary file first and renamed into
    /// place, so readers never see a partial timestamp.
    pub fn mark_processed(&self) -> Result<()> {
        let stamp = self.commit_timestamp()?.format(CHECKPOINT_FORMAT).to_string();

        let mut temp = self.checkpoint_path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let checkpoint_error = |e: std::io::Error| Error::Checkpoint {
            path: self.checkpoint_path.display().to_string(),
            message: e.to_string(),
        };
        fs::write(&temp, &stamp).map_err(checkpoint_error)?;
        fs::rename(&temp, &self.checkpoint_path).map_err(checkpoint_error)?;

        debug!("{}: checkpoint advanced to {}", self.id, stamp);
        Ok(())
    }

    /// Every regular, non-hidden file, keyed by `/`-separated relative path.
    ///
    /// Hidden directories are skipped with everything below them, which
    /// also keeps `.git` out of the listing.
    pub fn files(&self) -> Result<&BTreeMap<String, PathBuf>> {
        if let Some(files) = self.files.get() {
            return Ok(files);
        }

        let mut files = BTreeMap::new();
        let walker = WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.path) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, entry.path().to_path_buf());
        }

        Ok(self.files.get_or_init(|| files))
    }

    /// The remote URL, else the configured URL, else the local path.
    pub fn origin_url(&self) -> String {
        match self.vcs.origin_url(&self.path) {
            Ok(Some(url)) => return url,
            Ok(None) => {}
            Err(e) => debug!("{}: no remote URL: {}", self.id, e),
        }
        self.configured_origin
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
