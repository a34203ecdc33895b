//! Phase 1b: Content Ingestion
//!
//! Reads the content variants of one author repository.
//!
//! A content variant lives either in `content/<id>.<lang>.md` or in
//! `content/<id>/<lang>.md`, where `<lang>` is a two-letter lowercase code
//! and `<id>` may contain further folders. Its YAML header needs `title`,
//! `date` and `description`; the text comes from either the body or a
//! `content` header, never both.
//!
//! Headers with special meaning are normalised into typed fields:
//!
//! - `publish`: absent or `true` is public, `false` or a date in the future
//!   excludes the variant, a past date schedules it, `hidden` renders
//!   and indexes it but keeps it out of listings.
//! - `tags`: a comma-separated string, a list or the keys of a mapping.
//! - `linkto`, `linkwith`, `sources`: a comma-separated string or a list of
//!   content ids.
//! - `template`: the template set to render with.
//!
//! Every problem skips the single variant with a log entry.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use regex::Regex;

use super::ContentMap;
use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::frontmatter::{read_document, FrontValue, Metadata};
use crate::graph::{ContentVariant, PublishState, SENTINEL_TAG};
use crate::repository::SourceRepository;

const REQUIRED_CONTENT_KEYS: &[&str] = &["title", "date", "description"];

/// Keys the pipeline fills in itself.
const RESERVED_CONTENT_KEYS: &[&str] = &[
    "lang",
    "langs",
    "otherlangs",
    "gitsource",
    "mdsource",
    "author",
    "url",
    "id",
    "links",
    "file",
    "files",
];

/// Keys turned into typed fields of `ContentVariant`.
const CONSUMED_CONTENT_KEYS: &[&str] = &[
    "title",
    "date",
    "description",
    "publish",
    "tags",
    "linkto",
    "linkwith",
    "sources",
    "template",
    "content",
];

/// Recognises content file names in a repository.
#[derive(Debug, Clone)]
pub struct ContentPaths {
    id_lang: Regex,
    folder_lang: Regex,
    markdown: Regex,
}

impl ContentPaths {
    pub fn new() -> Result<Self> {
        Ok(Self {
            id_lang: Regex::new(r"^content/(.+)\.([a-z]{2})\.md$")?,
            folder_lang: Regex::new(r"^content/(.+)/([a-z]{2})\.md$")?,
            markdown: Regex::new(r"^content/.*\.md$")?,
        })
    }

    /// Whether `path` is a markdown file below `content/`.
    pub fn is_markdown(&self, path: &str) -> bool {
        self.markdown.is_match(path)
    }

    /// Content id and language of a content file, if `path` names one.
    pub fn parse(&self, path: &str) -> Option<(String, String)> {
        self.id_lang
            .captures(path)
            .or_else(|| self.folder_lang.captures(path))
            .map(|captures| (captures[1].to_string(), captures[2].to_string()))
    }
}

/// Read all content variants of `repository`.
///
/// Variants are keyed by content id, then language. When two files yield
/// the same `(id, lang)`, the one with the smaller path wins.
pub fn execute(
    repository: &SourceRepository,
    config: &SiteConfig,
    origin_url: &str,
    now: NaiveDateTime,
) -> Result<ContentMap> {
    let paths = ContentPaths::new()?;
    let files = repository.files()?;
    let mut contents = ContentMap::new();

    for (key, path) in files {
        if !paths.is_markdown(key) {
            continue;
        }
        let Some((id, lang)) = paths.parse(key) else {
            warn!(
                "Skipping {}/{}: file name does not match content/<id>.<lang>.md or content/<id>/<lang>.md",
                repository.id(),
                key
            );
            continue;
        };

        debug!("Reading content of {}/{}", repository.id(), key);
        let document = match read_document(path) {
            Ok(document) => document,
            Err(e @ Error::FrontMatter { .. }) => {
                warn!("Skipping {}/{}: {}", repository.id(), key, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let source = Source {
            key,
            id: &id,
            lang: &lang,
        };
        let Some(mut variant) = build_variant(&source, document.metadata, &document.body, config, now)
        else {
            info!("Skipping content file {}/{}", repository.id(), key);
            continue;
        };

        variant.origin_url = origin_url.to_string();
        if config.features.copy_other_files {
            variant.files = sibling_files(key, files, &paths);
        }
        if config.features.copy_source_file {
            variant.source_file = Some(path.clone());
        }

        let languages = contents.entry(id.clone()).or_default();
        if languages.contains_key(&lang) {
            warn!(
                "Duplicate content for id '{}', language '{}' in {}/{}. Skipped.",
                id,
                lang,
                repository.id(),
                key
            );
            continue;
        }
        languages.insert(lang, variant);
    }

    Ok(contents)
}

struct Source<'a> {
    key: &'a str,
    id: &'a str,
    lang: &'a str,
}

/// Validate and normalise one parsed content file.
fn build_variant(
    source: &Source<'_>,
    mut metadata: Metadata,
    body: &str,
    config: &SiteConfig,
    now: NaiveDateTime,
) -> Option<ContentVariant> {
    for key in RESERVED_CONTENT_KEYS {
        if metadata.remove(*key).is_some() {
            warn!("{}: reserved header '{}' is removed", source.key, key);
        }
    }

    let missing: Vec<&str> = REQUIRED_CONTENT_KEYS
        .iter()
        .copied()
        .filter(|key| !metadata.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        error!(
            "{}: required headers missing: {}",
            source.key,
            missing.join(", ")
        );
        return None;
    }

    let publish = normalize_publish(metadata.get("publish"), now, source.key)?;
    let tags = normalize_tags(metadata.get("tags"), &config.content.tag_default, source.key)?;

    let text = match metadata.get("content") {
        Some(header) => {
            if !body.trim().is_empty() {
                warn!(
                    "{}: content given in both body and 'content' header",
                    source.key
                );
                return None;
            }
            header.to_string().trim().to_string()
        }
        None => body.trim().to_string(),
    };
    if text.is_empty() {
        warn!("{}: missing content", source.key);
        return None;
    }

    let field = |key: &str| metadata.get(key).map(|v| v.to_string()).unwrap_or_default();
    let title = field("title");
    let description = field("description");
    let date = metadata.get("date").cloned().unwrap_or(FrontValue::Null);
    let linkto = id_set(metadata.get("linkto"));
    let linkwith = id_set(metadata.get("linkwith"));
    let sources = id_set(metadata.get("sources"));
    let template = metadata
        .get("template")
        .filter(|v| !v.is_null())
        .map(|v| v.to_string().trim().to_string())
        .filter(|t| !t.is_empty());

    for key in CONSUMED_CONTENT_KEYS {
        metadata.remove(*key);
    }

    Some(ContentVariant {
        id: source.id.to_string(),
        lang: source.lang.to_string(),
        title,
        date,
        description,
        metadata,
        body: text,
        publish,
        tags,
        linkto,
        linkwith,
        sources,
        template,
        links: BTreeSet::new(),
        langs: Vec::new(),
        other_langs: Vec::new(),
        origin_url: String::new(),
        source_path: source.key.to_string(),
        author: None,
        files: Vec::new(),
        source_file: None,
        url: None,
        absolute_url: None,
    })
}

/// Interpret the `publish` header. `None` excludes the variant.
pub fn normalize_publish(
    value: Option<&FrontValue>,
    now: NaiveDateTime,
    source: &str,
) -> Option<PublishState> {
    match value {
        None | Some(FrontValue::Bool(true)) => Some(PublishState::Public),
        Some(FrontValue::Bool(false)) => {
            debug!("{}: not published", source);
            None
        }
        Some(FrontValue::DateTime(at)) => {
            if now <= *at {
                info!("{}: publish date not yet reached ({})", source, at);
                None
            } else {
                Some(PublishState::Scheduled(*at))
            }
        }
        Some(FrontValue::String(s)) if s.trim().eq_ignore_ascii_case("hidden") => {
            Some(PublishState::Hidden)
        }
        Some(other) => {
            error!("{}: unrecognized value for 'publish': '{}'", source, other);
            None
        }
    }
}

/// Interpret the `tags` header. `None` excludes the variant.
///
/// An empty result files the variant under the sentinel tag.
pub fn normalize_tags(
    value: Option<&FrontValue>,
    defaults: &[String],
    source: &str,
) -> Option<BTreeSet<String>> {
    let tags: BTreeSet<String> = match value {
        None => clean(defaults.iter().cloned()),
        Some(FrontValue::Null) => BTreeSet::new(),
        Some(FrontValue::String(s)) => clean(s.split(',').map(str::to_string)),
        Some(FrontValue::List(items)) => clean(items.iter().cloned()),
        Some(FrontValue::Mapping(map)) => clean(map.keys().cloned()),
        Some(other) => {
            warn!("{}: unrecognized value for 'tags': '{}'", source, other);
            return None;
        }
    };

    if tags.is_empty() {
        Some([SENTINEL_TAG.to_string()].into_iter().collect())
    } else {
        Some(tags)
    }
}

/// Content ids in a `linkto`, `linkwith` or `sources` header.
pub fn id_set(value: Option<&FrontValue>) -> BTreeSet<String> {
    match value {
        None | Some(FrontValue::Null) => BTreeSet::new(),
        Some(FrontValue::List(items)) => clean(items.iter().cloned()),
        Some(other) => clean(other.to_string().split(',').map(str::to_string)),
    }
}

fn clean(items: impl Iterator<Item = String>) -> BTreeSet<String> {
    items
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Non-content files in the same folder as `key`.
fn sibling_files(
    key: &str,
    files: &std::collections::BTreeMap<String, PathBuf>,
    paths: &ContentPaths,
) -> Vec<PathBuf> {
    let folder = parent_key(key);
    files
        .iter()
        .filter(|(other, _)| parent_key(other) == folder && paths.parse(other).is_none())
        .map(|(_, path)| path.clone())
        .collect()
}

fn parent_key(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(parent, _)| parent)
}
