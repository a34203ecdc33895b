//! Phase 4: Writing to Disk
//!
//! Writes everything the site consists of into the output root and records
//! each path it touches, relative to the root. The sweep phase deletes
//! whatever was not touched.
//!
//! ## Process
//!
//! 1.  **Template assets**: Every non-HTML file of template repository
//!     `<tid>` is copied to `<tid>/<path>`.
//!
//! 2.  **URLs**: Every variant gets its URL from the [`Layout`] before any
//!     rendering starts, so templates can link to any other variant.
//!
//! 3.  **Render**: The graph-wide template values are built once. Each
//!     variant is then rendered with the `content.html` model and
//!     written to its planned file. Writing the same path twice is logged as
//!     a collision; the last write wins.
//!
//! 4.  **Associated files**: Files collected during ingestion are copied
//!     next to the rendered output: into the variant's own folder in the
//!     index layout, into the folder shared by all languages in the flat
//!     layout.
//!
//! Any I/O or render failure aborts the phase. The sweep phase must not run
//! after an aborted write.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use super::layout::{Layout, OutputPlan};
use crate::error::{Error, Result};
use crate::graph::{Graph, VariantKey};
use crate::render::{is_html, RenderContext, Renderer, SiteContext, CONTENT_MODEL};
use crate::repository::SourceRepository;

/// What the write phase did.
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    /// Every touched path, relative to the output root.
    pub touched: BTreeSet<PathBuf>,
    pub rendered: usize,
    pub copied: usize,
    pub collisions: usize,
}

impl WriteOutcome {
    /// Record a touched path, returning `false` if it was touched before.
    fn touch(&mut self, relative: PathBuf) -> bool {
        self.touched.insert(relative)
    }
}

/// Execute Phase 4: write the site into `webroot`
pub fn execute(
    graph: &mut Graph,
    layout: &Layout,
    webroot: &Path,
    templates: &BTreeMap<String, SourceRepository>,
    renderer: &dyn Renderer,
) -> Result<WriteOutcome> {
    let mut outcome = WriteOutcome::default();

    install_template_assets(templates, webroot, &mut outcome)?;

    let plans = assign_urls(graph, layout)?;
    let graph: &Graph = graph;
    let site = SiteContext::new(graph);

    let mut by_id: BTreeMap<String, Vec<(VariantKey, OutputPlan)>> = BTreeMap::new();
    for (key, plan) in plans {
        by_id.entry(key.id.clone()).or_default().push((key, plan));
    }

    for (id, variants) in &by_id {
        let mut shared_files: BTreeSet<PathBuf> = BTreeSet::new();

        for (key, plan) in variants {
            let Some(variant) = graph.variant(key) else {
                continue;
            };

            let folder = webroot.join(&plan.folder);
            create_dir(&folder)?;

            if !outcome.touch(plan.file.clone()) {
                error!(
                    "File collision at '{}'. Content will be overwritten.",
                    plan.file.display()
                );
                outcome.collisions += 1;
            }

            let ctx = RenderContext {
                graph,
                site: &site,
                variant,
            };
            let html = renderer.render(CONTENT_MODEL, variant.template.as_deref(), &ctx)?;
            write_file(&webroot.join(&plan.file), &html)?;
            outcome.rendered += 1;
            debug!("Rendered {} to {}", key, plan.file.display());

            let mut files: BTreeSet<PathBuf> = variant.files.iter().cloned().collect();
            files.extend(variant.source_file.iter().cloned());

            if layout.is_index_only() {
                copy_flat(&files, webroot, &plan.folder, &mut outcome)?;
            } else {
                shared_files.extend(files);
            }
        }

        if !shared_files.is_empty() {
            let folder = layout.shared_folder(id);
            create_dir(&webroot.join(&folder))?;
            copy_flat(&shared_files, webroot, &folder, &mut outcome)?;
        }
    }

    info!(
        "Rendered {} variants, copied {} files",
        outcome.rendered, outcome.copied
    );
    Ok(outcome)
}

/// Plan every variant and store its URLs in the graph.
fn assign_urls(graph: &mut Graph, layout: &Layout) -> Result<Vec<(VariantKey, OutputPlan)>> {
    let mut plans = Vec::new();
    for key in graph.variant_keys() {
        let plan = layout.plan(&key.id, &key.lang)?;
        if let Some(variant) = graph.variant_mut(&key) {
            variant.url = Some(plan.url.clone());
            variant.absolute_url = plan.absolute_url.clone();
        }
        plans.push((key, plan));
    }
    Ok(plans)
}

/// Copy every non-HTML template file to `<webroot>/<tid>/<path>`.
fn install_template_assets(
    templates: &BTreeMap<String, SourceRepository>,
    webroot: &Path,
    outcome: &mut WriteOutcome,
) -> Result<()> {
    for (id, repository) in templates {
        let root = PathBuf::from(id);
        create_dir(&webroot.join(&root))?;
        outcome.touch(root.clone());

        for (key, source) in repository.files()? {
            if is_html(key) {
                continue;
            }
            let relative: PathBuf = root.join(key.split('/').collect::<PathBuf>());
            let dest = webroot.join(&relative);
            if let Some(parent) = dest.parent() {
                create_dir(parent)?;
            }
            copy_file(source, &dest)?;
            outcome.touch(relative);
            outcome.copied += 1;
        }
    }
    Ok(())
}

/// Copy `files` directly into `folder`, without their own subfolders.
fn copy_flat(
    files: &BTreeSet<PathBuf>,
    webroot: &Path,
    folder: &Path,
    outcome: &mut WriteOutcome,
) -> Result<()> {
    for source in files {
        let Some(name) = source.file_name() else {
            continue;
        };
        let relative = folder.join(name);
        copy_file(source, &webroot.join(&relative))?;
        outcome.touch(relative);
        outcome.copied += 1;
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to create directory '{}': {}", path.display(), e),
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::Filesystem {
        message: format!("Failed to write file '{}': {}", path.display(), e),
    })
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest).map(|_| ()).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to copy '{}' to '{}': {}",
            source.display(),
            dest.display(),
            e
        ),
    })
}
