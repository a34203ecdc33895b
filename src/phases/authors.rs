//! Phase 1: Author Ingestion
//!
//! This phase reads every author repository and decides whether this site
//! may use its content at all.
//!
//! ## Process
//!
//! 1.  **Author meta**: `author/meta.md` must exist. Its header must carry a
//!     `contentgrant` naming this site's id or `*`. Without that grant
//!     nothing from the repository is read.
//!
//! 2.  **Validation**: `nickname` is required. Keys the pipeline fills in
//!     itself (`contents`, `langs`, `gitsources`) are removed.
//!
//! 3.  **Self-descriptions**: The body of `author/meta.md` is the
//!     description in the header's `lang` (or the site's default language);
//!     `author/<lang>.md` files add more languages.
//!
//! 4.  **Contents**: The content variants are read by [`super::contents`].
//!
//! Repositories are read in parallel; the result keeps repository-id order
//! so later phases resolve conflicts deterministically. A repository that
//! fails any check is skipped with a warning and does not affect the others.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;

use super::{contents, IngestedRepository};
use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::frontmatter::{read_document, FrontValue};
use crate::graph::{is_language_code, AuthorRecord};
use crate::repository::SourceRepository;

/// Location of an author's meta file inside the repository.
pub const AUTHOR_META_FILE: &str = "author/meta.md";

/// Grant that allows every site to use the content.
pub const GRANT_ALL: &str = "*";

const REQUIRED_AUTHOR_KEYS: &[&str] = &["nickname", "contentgrant"];

/// Keys the pipeline fills in itself.
const RESERVED_AUTHOR_KEYS: &[&str] = &["contents", "langs", "gitsources"];

/// Execute Phase 1: ingest all author repositories
///
/// Returns one entry per accepted repository, ordered by repository id.
/// Only I/O failures are errors; everything else skips the repository.
pub fn execute(
    repositories: &BTreeMap<String, SourceRepository>,
    config: &SiteConfig,
    now: NaiveDateTime,
) -> Result<Vec<IngestedRepository>> {
    let repositories: Vec<&SourceRepository> = repositories.values().collect();

    let results: Vec<Result<Option<IngestedRepository>>> = repositories
        .par_iter()
        .map(|repository| ingest_repository(repository, config, now))
        .collect();

    let mut ingested = Vec::new();
    for result in results {
        if let Some(repository) = result? {
            ingested.push(repository);
        }
    }
    Ok(ingested)
}

/// Read one author repository, or `None` if it has to be skipped.
pub fn ingest_repository(
    repository: &SourceRepository,
    config: &SiteConfig,
    now: NaiveDateTime,
) -> Result<Option<IngestedRepository>> {
    let repo_id = repository.id();
    let files = repository.files()?;

    let Some(meta_path) = files.get(AUTHOR_META_FILE) else {
        warn!(
            "There is no author meta file '{}' in repository {}. Skipping.",
            AUTHOR_META_FILE, repo_id
        );
        return Ok(None);
    };

    info!("Processing meta of author {}", repo_id);
    let document = match read_document(meta_path) {
        Ok(document) => document,
        Err(e @ Error::FrontMatter { .. }) => {
            warn!("Skipping repository {}: {}", repo_id, e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let mut metadata = document.metadata;

    // Grant gate
    let grant = match metadata.get("contentgrant") {
        None => {
            warn!(
                "Skipping repository {}: missing contentgrant header in {}",
                repo_id, AUTHOR_META_FILE
            );
            return Ok(None);
        }
        Some(FrontValue::Null) => {
            warn!("Skipping repository {}: content not granted to any site", repo_id);
            return Ok(None);
        }
        Some(value) => grant_list(value),
    };
    if !is_granted(&grant, &config.site_id) {
        warn!(
            "Site '{}' is not allowed to use content of repository {}. Skipping.",
            config.site_id, repo_id
        );
        return Ok(None);
    }

    for key in RESERVED_AUTHOR_KEYS {
        if metadata.remove(*key).is_some() {
            warn!(
                "Author meta of {} contains the reserved key '{}'. It is removed.",
                repo_id, key
            );
        }
    }

    let missing: Vec<&str> = REQUIRED_AUTHOR_KEYS
        .iter()
        .copied()
        .filter(|key| metadata.get(*key).map_or(true, FrontValue::is_null))
        .collect();
    if !missing.is_empty() {
        warn!(
            "Skipping repository {}: author meta is missing {}",
            repo_id,
            missing.join(", ")
        );
        return Ok(None);
    }

    let nickname = metadata
        .remove("nickname")
        .map(|value| value.to_string().trim().to_string())
        .unwrap_or_default();
    if nickname.is_empty() {
        warn!("Skipping repository {}: empty nickname", repo_id);
        return Ok(None);
    }
    metadata.remove("contentgrant");

    let mut author = AuthorRecord::new(&nickname);
    author.content_grant = grant;

    // Main self-description
    let body = document.body.trim();
    if !body.is_empty() {
        let main_lang = match metadata.get("lang") {
            Some(value) if !value.is_null() => value.to_string().trim().to_string(),
            _ => config.content.lang_default.clone(),
        };
        if !is_language_code(&main_lang) {
            warn!(
                "Skipping repository {}: '{}' is not a valid language code for the author description",
                repo_id, main_lang
            );
            return Ok(None);
        }
        author.descriptions.insert(main_lang, body.to_string());
    }

    // Additional self-descriptions
    let description_file = Regex::new(r"^author/([a-z]{2})\.md$")?;
    for (key, path) in files {
        let Some(captures) = description_file.captures(key) else {
            continue;
        };
        let lang = captures[1].to_string();
        if author.descriptions.contains_key(&lang) {
            warn!(
                "Duplicate author description for language '{}' in {}/{}. Skipped.",
                lang, repo_id, key
            );
            continue;
        }
        info!("Parsing author description in {}", key);
        let text = std::fs::read_to_string(path)?;
        author.descriptions.insert(lang, text);
    }
    author.metadata = metadata;

    let origin_url = repository.origin_url();
    author.origins.insert(origin_url.clone());

    let contents = contents::execute(repository, config, &origin_url, now)?;

    Ok(Some(IngestedRepository {
        repo_id: repo_id.to_string(),
        author,
        contents,
        origin_url,
    }))
}

/// Site ids in a `contentgrant` header: a comma-separated string or a list.
pub fn grant_list(value: &FrontValue) -> Vec<String> {
    let items: Vec<String> = match value {
        FrontValue::List(items) => items.clone(),
        other => other.to_string().split(',').map(str::to_string).collect(),
    };
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn is_granted(grant: &[String], site_id: &str) -> bool {
    grant.iter().any(|item| item == GRANT_ALL || item == site_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::MockVcsOperations;
    use crate::repository::VcsOperations;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        crate::frontmatter::parse_datetime("2024-01-01 00:00:00").unwrap()
    }

    fn author_repo(root: &Path, id: &str, files: &[(&str, &str)]) -> SourceRepository {
        let path = root.join(id);
        fs::create_dir_all(path.join(".git")).unwrap();
        for (name, text) in files {
            let file = path.join(name);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, text).unwrap();
        }
        let vcs: Arc<dyn VcsOperations> = Arc::new(MockVcsOperations::default());
        SourceRepository::open_with(&path, id, vcs)
            .unwrap()
            .with_origin(Some(format!("https://example.org/{}.git", id)))
    }

    fn ingest(files: &[(&str, &str)]) -> Option<IngestedRepository> {
        let temp = TempDir::new().unwrap();
        let repo = author_repo(temp.path(), "alice", files);
        ingest_repository(&repo, &SiteConfig::new("my-site.net"), now()).unwrap()
    }

    #[test]
    fn test_grant_list_shapes() {
        assert_eq!(
            grant_list(&FrontValue::String("a.org, my-site.net".to_string())),
            vec!["a.org", "my-site.net"]
        );
        assert_eq!(
            grant_list(&FrontValue::List(vec![" * ".to_string()])),
            vec!["*"]
        );
    }

    #[test]
    fn test_is_granted() {
        assert!(is_granted(&["*".to_string()], "my-site.net"));
        assert!(is_granted(&["my-site.net".to_string()], "my-site.net"));
        assert!(!is_granted(&["other-site.org".to_string()], "my-site.net"));
        assert!(!is_granted(&[], "my-site.net"));
    }

    #[test]
    fn test_missing_meta_skips_repository() {
        assert!(ingest(&[("README.md", "hi")]).is_none());
    }

    #[test]
    fn test_foreign_grant_skips_repository() {
        let meta = "---\nnickname: alice\ncontentgrant: other-site.org\n---\n";
        assert!(ingest(&[(AUTHOR_META_FILE, meta)]).is_none());
    }

    #[test]
    fn test_null_or_missing_grant_skips_repository() {
        assert!(ingest(&[(AUTHOR_META_FILE, "---\nnickname: alice\ncontentgrant:\n---\n")]).is_none());
        assert!(ingest(&[(AUTHOR_META_FILE, "---\nnickname: alice\n---\n")]).is_none());
    }

    #[test]
    fn test_missing_nickname_skips_repository() {
        assert!(ingest(&[(AUTHOR_META_FILE, "---\ncontentgrant: '*'\n---\n")]).is_none());
    }

    #[test]
    fn test_wildcard_grant_accepts_and_strips_reserved_keys() {
        let meta = "---\nnickname: alice\ncontentgrant: '*'\nlangs: [en]\nhomepage: https://alice.example\n---\nHello, I write.\n";
        let ingested = ingest(&[(AUTHOR_META_FILE, meta)]).unwrap();

        assert_eq!(ingested.repo_id, "alice");
        assert_eq!(ingested.author.nickname, "alice");
        assert_eq!(ingested.author.content_grant, vec!["*"]);
        assert!(!ingested.author.metadata.contains_key("langs"));
        assert!(ingested.author.metadata.contains_key("homepage"));
        assert_eq!(ingested.author.descriptions["en"], "Hello, I write.");
        assert_eq!(ingested.origin_url, "https://example.org/alice.git");
        assert!(ingested.author.origins.contains("https://example.org/alice.git"));
    }

    #[test]
    fn test_descriptions_per_language_first_wins() {
        let meta = "---\nnickname: alice\ncontentgrant: my-site.net\nlang: de\n---\nHallo.\n";
        let ingested = ingest(&[
            (AUTHOR_META_FILE, meta),
            ("author/de.md", "Doppelt"),
            ("author/fr.md", "Bonjour"),
        ])
        .unwrap();

        assert_eq!(ingested.author.descriptions["de"], "Hallo.");
        assert_eq!(ingested.author.descriptions["fr"], "Bonjour");
        assert_eq!(ingested.author.descriptions.len(), 2);
    }

    #[test]
    fn test_invalid_description_language_skips_repository() {
        let meta = "---\nnickname: alice\ncontentgrant: '*'\nlang: english\n---\nHi\n";
        assert!(ingest(&[(AUTHOR_META_FILE, meta)]).is_none());
    }

    #[test]
    fn test_broken_front_matter_skips_repository() {
        let meta = "---\nnickname: [alice\n---\n";
        assert!(ingest(&[(AUTHOR_META_FILE, meta)]).is_none());
    }

    #[test]
    fn test_execute_keeps_repository_order() {
        let temp = TempDir::new().unwrap();
        let mut repos = BTreeMap::new();
        for id in ["c", "a", "b"] {
            let meta = format!("---\nnickname: {}\ncontentgrant: '*'\n---\n", id);
            repos.insert(
                id.to_string(),
                author_repo(temp.path(), id, &[(AUTHOR_META_FILE, meta.as_str())]),
            );
        }

        let ingested = execute(&repos, &SiteConfig::new("my-site.net"), now()).unwrap();
        let ids: Vec<&str> = ingested.iter().map(|r| r.repo_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_skipped_repository_logs_warning() {
        testing_logger::setup();
        assert!(ingest(&[("README.md", "hi")]).is_none());
        testing_logger::validate(|captured| {
            assert!(captured
                .iter()
                .any(|log| log.level == log::Level::Warn && log.body.contains(AUTHOR_META_FILE)));
        });
    }
}
