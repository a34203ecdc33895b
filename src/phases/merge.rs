//! Phase 2: Global Merge
//!
//! Folds the ingested repositories into one [`Graph`].
//!
//! ## Process
//!
//! 1.  **Seed**: Start from the site's global strings and format the
//!     generation time with every configured datetime format.
//!
//! 2.  **Authors**: Repositories are visited in repository-id order. The
//!     first repository declaring a nickname provides the author's meta;
//!     later repositories of the same nickname only add their origin URL.
//!
//! 3.  **Contents**: A variant whose `(id, lang)` is already in the graph is
//!     dropped with a warning. Otherwise it is added to the contents, to its
//!     author's contents and to the tag and language indices. Hidden
//!     variants are indexed too; their `publish` state tells listings to
//!     leave them out.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDateTime;
use log::{debug, warn};

use super::IngestedRepository;
use crate::config::SiteConfig;
use crate::graph::{AuthorRecord, Graph};

/// Execute Phase 2: merge all ingested repositories
pub fn execute(
    mut ingested: Vec<IngestedRepository>,
    config: &SiteConfig,
    now: NaiveDateTime,
) -> Graph {
    ingested.sort_by(|a, b| a.repo_id.cmp(&b.repo_id));

    let mut graph = Graph::new();
    graph.globals = config.content.global_strings.clone();
    graph.generation_time = format_datetime_table(&config.datetime_table(), now);

    for repository in ingested {
        merge_repository(&mut graph, repository, config.features.tags);
    }

    debug!(
        "Merged {} authors, {} contents, {} variants",
        graph.authors.len(),
        graph.contents.len(),
        graph.variant_count()
    );
    graph
}

fn merge_repository(graph: &mut Graph, repository: IngestedRepository, use_tags: bool) {
    let IngestedRepository {
        repo_id,
        author,
        contents,
        origin_url,
    } = repository;
    let nickname = author.nickname.clone();

    let author: &mut AuthorRecord = match graph.authors.entry(nickname.clone()) {
        std::collections::btree_map::Entry::Occupied(entry) => {
            debug!("Repository {} is another source of author {}", repo_id, nickname);
            entry.into_mut()
        }
        std::collections::btree_map::Entry::Vacant(entry) => entry.insert(author),
    };
    author.origins.insert(origin_url);

    for (id, languages) in contents {
        for (lang, mut variant) in languages {
            let exists = graph
                .contents
                .get(&id)
                .is_some_and(|record| record.variants.contains_key(&lang));
            if exists {
                warn!(
                    "Duplicate content collision for id '{}', language '{}' from repository {}. Skipped.",
                    id, lang, repo_id
                );
                continue;
            }

            author
                .contents
                .entry(id.clone())
                .or_default()
                .insert(lang.clone());
            variant.author = Some(nickname.clone());

            if use_tags {
                for tag in &variant.tags {
                    graph
                        .tags
                        .entry(tag.clone())
                        .or_default()
                        .entry(id.clone())
                        .or_default()
                        .insert(lang.clone());
                }
            }
            graph
                .langs
                .entry(lang.clone())
                .or_default()
                .insert(id.clone());

            graph
                .contents
                .entry(id.clone())
                .or_default()
                .variants
                .insert(lang, variant);
        }
    }
}

/// Format `now` with every entry of a datetime format table.
///
/// Formats chrono cannot render are logged and left out.
pub fn format_datetime_table(
    table: &BTreeMap<String, String>,
    now: NaiveDateTime,
) -> BTreeMap<String, String> {
    let mut formatted = BTreeMap::new();
    for (key, format) in table {
        let mut text = String::new();
        if write!(text, "{}", now.format(format)).is_err() {
            warn!("Cannot format generation time for '{}' with '{}'", key, format);
            continue;
        }
        formatted.insert(key.clone(), text);
    }
    formatted
}
