//! Implementation of the phases of one site generation.
//!
//! ## Overview
//!
//! A generation run follows these phases:
//! 1. Ingestion - Read every author repository in parallel: author meta,
//!    self-descriptions and content variants (`authors`, `contents`)
//! 2. Merging - Fold all ingested repositories into one `Graph` (`merge`)
//! 3. Linking - Resolve `linkto` / `linkwith` and sibling languages (`link`)
//! 4. Writing - Install template assets, render every variant to its planned
//!    location and copy associated files (`layout`, `write`)
//! 5. Sweeping - Delete everything in the output directory the write phase
//!    did not touch (`sweep`)
//!
//! The `orchestrator` chains the phases, checks staleness before and
//! advances checkpoints after a run.
//!
//! Each phase depends only on the previous phases and the foundation modules
//! (`config`, `graph`, `repository`, `render`).

use std::collections::BTreeMap;

use crate::graph::{AuthorRecord, ContentVariant};

// Phase modules
pub mod authors;
pub mod contents;
pub mod layout;
pub mod link;
pub mod merge;
pub mod orchestrator;
pub mod sweep;
pub mod write;

// Numbered aliases, in pipeline order
pub use authors as phase1;
pub use link as phase3;
pub use merge as phase2;
pub use sweep as phase5;
pub use write as phase4;

/// Content variants of one repository: content id to language to variant.
pub type ContentMap = BTreeMap<String, BTreeMap<String, ContentVariant>>;

/// Everything read from one accepted author repository.
#[derive(Debug, Clone)]
pub struct IngestedRepository {
    /// Id of the repository in the site configuration
    pub repo_id: String,
    /// Author as declared in `author/meta.md`, before merging
    pub author: AuthorRecord,
    pub contents: ContentMap,
    /// Where the repository came from, recorded on every variant
    pub origin_url: String,
}
