//! # git2site Library
//!
//! This library turns a set of git working copies, one per author, into a
//! static web site. It is designed to be used by the `git2site` command-line
//! tool, which is typically run from a scheduler after the working copies
//! have been pulled.
//!
//! ## Quick Example
//!
//! ```
//! use git2site::config::SiteConfig;
//! use git2site::phases::layout::Layout;
//!
//! let config = SiteConfig::parse(r#"
//! site_id: my-site.net
//! content:
//!   lang_default: en
//! "#).unwrap();
//!
//! let layout = Layout::from_config(&config).unwrap();
//! let plan = layout.plan("python/learn", "de").unwrap();
//! assert_eq!(plan.url, "/python/learn-de.html");
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The site file: site id, working copy
//!   locations, output root and content layout.
//! - **Source repositories (`repository`, `git`)**: Read-only access to a
//!   working copy plus the checkpoint recording which commit was last
//!   published.
//! - **Front matter (`frontmatter`)**: The YAML header of every markdown
//!   file, parsed into loosely typed values.
//! - **Graph (`graph`)**: Authors, content records and their language
//!   variants, with the tag and language indices.
//! - **Rendering (`render`)**: The `Renderer` seam and its template-based
//!   implementation.
//! - **Phases (`phases`)**: The pipeline itself.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator`, which executes:
//!
//! 1.  **Ingestion**: Read each author repository's metadata and contents.
//! 2.  **Merging**: Combine all repositories into one graph.
//! 3.  **Linking**: Resolve language siblings and `linkto` / `linkwith`.
//! 4.  **Writing**: Render every variant and copy its sibling files.
//! 5.  **Sweeping**: Delete what the previous run left behind.
//!
//! Afterwards every repository's checkpoint is advanced, so an incremental
//! run only regenerates once something was committed.

pub mod config;
pub mod error;
pub mod frontmatter;
pub mod git;
pub mod graph;
pub mod phases;
pub mod render;
pub mod repository;

#[cfg(test)]
mod pipeline_proptest;
