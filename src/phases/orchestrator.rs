//! Orchestrator for a complete generation run
//!
//! This module opens the configured repositories, decides whether anything
//! needs to be done and chains the phases:
//!
//! 1. Ingest author repositories (with their contents)
//! 2. Merge them into one graph
//! 3. Resolve links
//! 4. Snapshot the output root, write the site
//! 5. Delete orphans, write the file index
//!
//! After a run, successful or not, every repository's checkpoint is
//! advanced. The graph lives only for the duration of [`generate`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde::Serialize;

use super::{authors, layout::Layout, link, merge, sweep, write};
use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::repository::{
    DefaultVcsOperations, SourceRepository, VcsOperations, CHECKPOINT_FORMAT,
};

/// The author and template repositories of a site, by id.
#[derive(Debug, Default)]
pub struct OpenRepositories {
    pub authors: BTreeMap<String, SourceRepository>,
    pub templates: BTreeMap<String, SourceRepository>,
}

impl OpenRepositories {
    /// Authors first, then templates.
    pub fn iter(&self) -> impl Iterator<Item = &SourceRepository> {
        self.authors.values().chain(self.templates.values())
    }

    pub fn len(&self) -> usize {
        self.authors.len() + self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Open every configured repository using the system `git`.
pub fn open_repositories(config: &SiteConfig) -> OpenRepositories {
    open_repositories_with(config, Arc::new(DefaultVcsOperations))
}

/// Open every configured repository with custom `VcsOperations`.
///
/// Repositories that are not checked out are skipped with a warning.
pub fn open_repositories_with(
    config: &SiteConfig,
    vcs: Arc<dyn VcsOperations>,
) -> OpenRepositories {
    OpenRepositories {
        authors: open_kind("author", &config.sources.authors, &vcs, |id| {
            config.author_repository_path(id)
        }),
        templates: open_kind("template", &config.sources.templates, &vcs, |id| {
            config.template_repository_path(id)
        }),
    }
}

fn open_kind(
    kind: &str,
    entries: &BTreeMap<String, String>,
    vcs: &Arc<dyn VcsOperations>,
    path_of: impl Fn(&str) -> PathBuf,
) -> BTreeMap<String, SourceRepository> {
    let mut opened = BTreeMap::new();
    for (id, url) in entries {
        let path = path_of(id);
        match SourceRepository::open_with(&path, id, vcs.clone()) {
            Ok(repository) => {
                opened.insert(id.clone(), repository.with_origin(Some(url.clone())));
            }
            Err(e) => warn!("Skipping {} repository {}: {}", kind, id, e),
        }
    }
    opened
}

/// Staleness of one repository, as reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStatus {
    pub id: String,
    pub kind: &'static str,
    pub path: PathBuf,
    pub commit: Option<String>,
    pub processed: Option<String>,
    pub stale: bool,
}

/// Staleness of every open repository.
pub fn status(repositories: &OpenRepositories) -> Vec<RepositoryStatus> {
    let describe = |kind: &'static str, repository: &SourceRepository| {
        let stamp = |t: NaiveDateTime| t.format(CHECKPOINT_FORMAT).to_string();
        RepositoryStatus {
            id: repository.id().to_string(),
            kind,
            path: repository.path().to_path_buf(),
            commit: repository.commit_timestamp().ok().map(stamp),
            processed: repository.last_processed_timestamp().ok().flatten().map(stamp),
            stale: repository.needs_regeneration().unwrap_or(true),
        }
    };

    repositories
        .authors
        .values()
        .map(|r| describe("author", r))
        .chain(repositories.templates.values().map(|r| describe("template", r)))
        .collect()
}

/// Whether any repository changed since it was last processed.
///
/// A repository whose staleness cannot be determined counts as changed.
pub fn needs_regeneration(repositories: &OpenRepositories) -> bool {
    let mut found = false;
    for repository in repositories.iter() {
        match repository.needs_regeneration() {
            Ok(true) => {
                info!("Repository has updated: {}", repository.id());
                found = true;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Cannot check repository {}: {}", repository.id(), e);
                found = true;
            }
        }
    }
    found
}

/// Summary of one generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub authors: usize,
    pub variants: usize,
    pub rendered: usize,
    pub copied: usize,
    pub collisions: usize,
    pub touched: usize,
    pub deleted: Vec<PathBuf>,
    pub delete_failures: usize,
}

/// Result of [`run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Incremental run without changes; nothing was written.
    UpToDate,
    Generated(GenerationReport),
}

/// Generate the whole site once.
///
/// Checkpoints are not touched here; see [`run`].
pub fn generate(
    config: &SiteConfig,
    repositories: &OpenRepositories,
    renderer: &dyn Renderer,
    now: NaiveDateTime,
) -> Result<GenerationReport> {
    // Phase 1: Ingestion
    let ingested = authors::execute(&repositories.authors, config, now)?;

    // Phase 2: Merging
    let mut graph = merge::execute(ingested, config, now);

    // Phase 3: Linking
    link::execute(
        &mut graph,
        &config.content.lang_default,
        config.features.linking,
    );

    let webroot = config.webroot.as_path();
    if !webroot.is_dir() {
        error!(
            "Output root '{}' is missing. Create it with correct permissions first.",
            webroot.display()
        );
        return Err(Error::OutputRootMissing {
            path: webroot.display().to_string(),
        });
    }

    // Phase 4: Writing
    let layout = Layout::from_config(config)?;
    let before = sweep::snapshot(webroot)?;
    let written = write::execute(
        &mut graph,
        &layout,
        webroot,
        &repositories.templates,
        renderer,
    )?;

    // Phase 5: Sweeping
    let orphans = sweep::orphans(&before, &written.touched, &config.static_dirs);
    let swept = sweep::delete(webroot, &orphans);

    let mut touched = written.touched.clone();
    touched.extend(sweep::ancestors(&written.touched));
    if let Some(index) = &config.features.file_index {
        sweep::write_file_index(index, &touched, &swept.deleted)?;
    }

    Ok(GenerationReport {
        authors: graph.authors.len(),
        variants: graph.variant_count(),
        rendered: written.rendered,
        copied: written.copied,
        collisions: written.collisions,
        touched: touched.len(),
        deleted: swept.deleted,
        delete_failures: swept.failures,
    })
}

/// Generate the site if needed, then advance every checkpoint.
///
/// With `incremental`, nothing happens unless a repository changed. The
/// renderer is only built once a generation is due. A failed generation,
/// including a renderer that cannot be built, still advances the
/// checkpoints; the error is returned after.
pub fn run<R, F>(
    config: &SiteConfig,
    repositories: &OpenRepositories,
    make_renderer: F,
    incremental: bool,
) -> Result<RunOutcome>
where
    R: Renderer,
    F: FnOnce() -> Result<R>,
{
    run_at(
        config,
        repositories,
        make_renderer,
        incremental,
        chrono::Local::now().naive_local(),
    )
}

/// [`run`] with an explicit current time.
pub fn run_at<R, F>(
    config: &SiteConfig,
    repositories: &OpenRepositories,
    make_renderer: F,
    incremental: bool,
    now: NaiveDateTime,
) -> Result<RunOutcome>
where
    R: Renderer,
    F: FnOnce() -> Result<R>,
{
    if incremental && !needs_regeneration(repositories) {
        info!("No changed repositories found. Content is up to date.");
        return Ok(RunOutcome::UpToDate);
    }

    info!("Generating site '{}'", config.site_id);
    let result = make_renderer()
        .and_then(|renderer| generate(config, repositories, &renderer, now));
    if let Err(e) = &result {
        error!("Generation failed: {}", e);
    }

    mark_processed(repositories);

    result.map(RunOutcome::Generated)
}

/// Advance every checkpoint, returning how many could not be written.
pub fn mark_processed(repositories: &OpenRepositories) -> usize {
    let mut failures = 0;
    for repository in repositories.iter() {
        if let Err(e) = repository.mark_processed() {
            error!("Cannot store checkpoint of {}: {}", repository.id(), e);
            failures += 1;
        }
    }
    failures
}

/// Path of the site file: `explicit`, else `site.yaml` in `dir`.
pub fn config_path(explicit: Option<&Path>, dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join(crate::config::DEFAULT_CONFIG_FILE))
}
