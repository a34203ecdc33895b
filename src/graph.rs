//! # Content Graph
//!
//! The merged, cross-repository model of one generation run.
//!
//! The `Graph` is the single owner of every author and content variant.
//! Secondary indices (an author's own contents, tags, languages) and the
//! resolved link sets store *keys*, never references: authors are addressed
//! by nickname and variants by [`VariantKey`] `(content id, language)`.
//! Dereferencing always goes through [`Graph::variant`]. Dropping the graph
//! at the end of a run releases everything at once.
//!
//! All maps are ordered so iteration, and therefore output, is reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::frontmatter::{FrontValue, Metadata};

/// Tag every content item without any tag is filed under.
pub const SENTINEL_TAG: &str = "";

/// Whether `code` is a two-letter lowercase language code.
pub fn is_language_code(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_lowercase())
}

/// Identity of one content variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariantKey {
    pub id: String,
    pub lang: String,
}

impl VariantKey {
    pub fn new(id: &str, lang: &str) -> Self {
        Self {
            id: id.to_string(),
            lang: lang.to_string(),
        }
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.lang)
    }
}

/// Publication state after normalisation of the `publish` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    Public,
    /// Public since the given moment.
    Scheduled(NaiveDateTime),
    /// Rendered, linkable and indexed, but left out of listings.
    Hidden,
}

impl PublishState {
    pub fn is_listed(&self) -> bool {
        !matches!(self, PublishState::Hidden)
    }
}

/// One content item in one language.
#[derive(Debug, Clone, Serialize)]
pub struct ContentVariant {
    pub id: String,
    pub lang: String,
    pub title: String,
    pub date: FrontValue,
    pub description: String,
    /// Headers not consumed by normalisation.
    pub metadata: Metadata,
    pub body: String,
    pub publish: PublishState,
    pub tags: BTreeSet<String>,
    pub linkto: BTreeSet<String>,
    pub linkwith: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    /// Template set requested by the author.
    pub template: Option<String>,
    /// Resolved `linkto` / `linkwith` targets.
    pub links: BTreeSet<VariantKey>,
    /// All languages of this content id, including this one.
    pub langs: Vec<String>,
    /// `langs` without this variant's language.
    pub other_langs: Vec<String>,
    pub origin_url: String,
    /// Path of the markdown source relative to its repository.
    pub source_path: String,
    /// Nickname of the owning author, set on merge.
    pub author: Option<String>,
    /// Non-content files next to the source.
    pub files: Vec<PathBuf>,
    /// The markdown source itself, when it is to be published.
    pub source_file: Option<PathBuf>,
    /// Site-relative URL, assigned when the output is planned.
    pub url: Option<String>,
    pub absolute_url: Option<String>,
}

impl ContentVariant {
    /// A public, untagged variant with empty headers and body.
    pub fn new(id: &str, lang: &str) -> Self {
        Self {
            id: id.to_string(),
            lang: lang.to_string(),
            title: String::new(),
            date: FrontValue::Null,
            description: String::new(),
            metadata: Metadata::new(),
            body: String::new(),
            publish: PublishState::Public,
            tags: [SENTINEL_TAG.to_string()].into_iter().collect(),
            linkto: BTreeSet::new(),
            linkwith: BTreeSet::new(),
            sources: BTreeSet::new(),
            template: None,
            links: BTreeSet::new(),
            langs: Vec::new(),
            other_langs: Vec::new(),
            origin_url: String::new(),
            source_path: String::new(),
            author: None,
            files: Vec::new(),
            source_file: None,
            url: None,
            absolute_url: None,
        }
    }

    pub fn key(&self) -> VariantKey {
        VariantKey::new(&self.id, &self.lang)
    }
}

/// All languages of one content id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentRecord {
    pub variants: BTreeMap<String, ContentVariant>,
}

/// A merged author.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorRecord {
    pub nickname: String,
    /// Site ids the author granted content to. `*` grants every site.
    pub content_grant: Vec<String>,
    pub metadata: Metadata,
    /// Origin URLs of every repository that contributed to this author.
    pub origins: BTreeSet<String>,
    /// Content id to the languages this author owns.
    pub contents: BTreeMap<String, BTreeSet<String>>,
    /// Self-description per language.
    pub descriptions: BTreeMap<String, String>,
}

impl AuthorRecord {
    pub fn new(nickname: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            content_grant: Vec::new(),
            metadata: Metadata::new(),
            origins: BTreeSet::new(),
            contents: BTreeMap::new(),
            descriptions: BTreeMap::new(),
        }
    }
}

/// The merged model of one generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    /// Site-wide constant strings.
    pub globals: BTreeMap<String, String>,
    pub authors: BTreeMap<String, AuthorRecord>,
    pub contents: BTreeMap<String, ContentRecord>,
    /// Tag to content id to languages.
    pub tags: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    /// Language to content ids.
    pub langs: BTreeMap<String, BTreeSet<String>>,
    /// Generation time formatted with every configured format.
    pub generation_time: BTreeMap<String, String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &VariantKey) -> bool {
        self.variant(key).is_some()
    }

    pub fn variant(&self, key: &VariantKey) -> Option<&ContentVariant> {
        self.contents
            .get(&key.id)
            .and_then(|record| record.variants.get(&key.lang))
    }

    pub fn variant_mut(&mut self, key: &VariantKey) -> Option<&mut ContentVariant> {
        self.contents
            .get_mut(&key.id)
            .and_then(|record| record.variants.get_mut(&key.lang))
    }

    /// Every variant, ordered by content id then language.
    pub fn variants(&self) -> impl Iterator<Item = &ContentVariant> {
        self.contents
            .values()
            .flat_map(|record| record.variants.values())
    }

    /// Keys of every variant, ordered by content id then language.
    pub fn variant_keys(&self) -> Vec<VariantKey> {
        self.variants().map(ContentVariant::key).collect()
    }

    pub fn variant_count(&self) -> usize {
        self.contents
            .values()
            .map(|record| record.variants.len())
            .sum()
    }

    /// Listed variants filed under `tag`. Hidden ones are left out.
    pub fn tagged(&self, tag: &str) -> Vec<&ContentVariant> {
        self.tags
            .get(tag)
            .into_iter()
            .flat_map(move |ids| {
                ids.iter().flat_map(move |(id, langs)| {
                    langs
                        .iter()
                        .filter_map(move |lang| self.variant(&VariantKey::new(id, lang)))
                })
            })
            .filter(|variant| variant.publish.is_listed())
            .collect()
    }

    /// Listed variants in `lang`.
    pub fn in_language(&self, lang: &str) -> Vec<&ContentVariant> {
        self.langs
            .get(lang)
            .into_iter()
            .flat_map(move |ids| {
                ids.iter()
                    .filter_map(move |id| self.variant(&VariantKey::new(id, lang)))
            })
            .filter(|variant| variant.publish.is_listed())
            .collect()
    }

    /// The author owning a variant.
    pub fn author_of(&self, variant: &ContentVariant) -> Option<&AuthorRecord> {
        variant
            .author
            .as_ref()
            .and_then(|nickname| self.authors.get(nickname))
    }
}
