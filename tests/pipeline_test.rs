//! Integration tests for the generation pipeline
//!
//! These tests build author working copies in a temporary directory and run
//! the public pipeline against them. `git` is replaced by an in-memory
//! `VcsOperations` so commit times can be moved at will.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use tempfile::TempDir;

use git2site::config::SiteConfig;
use git2site::error::Result;
use git2site::frontmatter::parse_datetime;
use git2site::graph::{Graph, PublishState, VariantKey, SENTINEL_TAG};
use git2site::phases::orchestrator::{self, OpenRepositories, RunOutcome};
use git2site::phases::{authors, link, merge};
use git2site::render::{RenderContext, Renderer};
use git2site::repository::VcsOperations;

#[derive(Default)]
struct FakeVcs {
    commits: Mutex<BTreeMap<PathBuf, NaiveDateTime>>,
}

impl FakeVcs {
    fn commit(&self, path: &Path, when: &str) {
        let when = parse_datetime(when).unwrap();
        self.commits
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), when);
    }
}

impl VcsOperations for FakeVcs {
    fn is_repository(&self, path: &Path) -> bool {
        self.commits.lock().unwrap().contains_key(path)
    }

    fn commit_timestamp(&self, path: &Path) -> Result<NaiveDateTime> {
        Ok(self.commits.lock().unwrap()[path])
    }

    fn origin_url(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

struct TitleRenderer;

impl Renderer for TitleRenderer {
    fn render(&self, _: &str, _: Option<&str>, ctx: &RenderContext<'_>) -> Result<String> {
        Ok(ctx.variant.title.clone())
    }
}

struct Site {
    _temp: TempDir,
    config: SiteConfig,
    vcs: Arc<FakeVcs>,
}

impl Site {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = SiteConfig::new("my-site.net");
        config.resolve_paths(temp.path());
        fs::create_dir_all(&config.webroot).unwrap();
        Self {
            _temp: temp,
            config,
            vcs: Arc::new(FakeVcs::default()),
        }
    }

    /// Add an author repository with the given meta header and files.
    fn author(&mut self, id: &str, meta: &str, files: &[(&str, &str)]) -> &mut Self {
        let root = self.config.author_repository_path(id);
        let mut all = vec![("author/meta.md", meta)];
        all.extend_from_slice(files);
        for (path, text) in all {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        self.config
            .sources
            .authors
            .insert(id.to_string(), format!("https://example.org/{}.git", id));
        self.vcs.commit(&root, "2020-02-16 04:53:32");
        self
    }

    fn open(&self) -> OpenRepositories {
        let vcs: Arc<dyn VcsOperations> = self.vcs.clone();
        orchestrator::open_repositories_with(&self.config, vcs)
    }

    fn graph(&self) -> Graph {
        let repos = self.open();
        let ingested = authors::execute(&repos.authors, &self.config, now()).unwrap();
        let mut graph = merge::execute(ingested, &self.config, now());
        link::execute(&mut graph, &self.config.content.lang_default, true);
        graph
    }
}

fn now() -> NaiveDateTime {
    parse_datetime("2024-01-01").unwrap()
}

fn meta(nickname: &str, grant: &str) -> String {
    format!("---\nnickname: {}\ncontentgrant: '{}'\n---\n", nickname, grant)
}

fn page(title: &str, extra: &str) -> String {
    format!(
        "---\ntitle: {}\ndate: 2020-01-01\ndescription: about {}\n{}---\nText of {}\n",
        title, title, extra, title
    )
}

#[test]
fn test_language_comes_from_path() {
    let mut site = Site::new();
    let hello_en = page("Hello", "");
    let hello_de = page("Hallo", "");
    site.author(
        "alice",
        &meta("alice", "*"),
        &[
            ("content/hello.en.md", &hello_en),
            ("content/hello/de.md", &hello_de),
        ],
    );

    let graph = site.graph();
    let record = &graph.contents["hello"];
    assert_eq!(record.variants.len(), 2);
    for (lang, variant) in &record.variants {
        assert_eq!(&variant.lang, lang);
    }
    assert_eq!(record.variants["de"].title, "Hallo");
    assert_eq!(record.variants["en"].other_langs, vec!["de".to_string()]);
}

#[test]
fn test_nested_ids() {
    let mut site = Site::new();
    let file = page("File", "");
    let folder = page("Folder", "");
    site.author(
        "alice",
        &meta("alice", "*"),
        &[
            ("content/demo/demofile.en.md", &file),
            ("content/demo/de.md", &folder),
        ],
    );

    let graph = site.graph();
    assert!(graph.contains(&VariantKey::new("demo/demofile", "en")));
    assert!(graph.contains(&VariantKey::new("demo", "de")));
}

#[test]
fn test_repositories_with_same_nickname_merge() {
    let mut site = Site::new();
    let one = page("One", "");
    let two = page("Two", "");
    site.author("alice", &meta("alice", "*"), &[("content/one.en.md", &one)])
        .author("alice-work", &meta("alice", "*"), &[("content/two.en.md", &two)]);

    let graph = site.graph();
    assert_eq!(graph.authors.len(), 1);
    let alice = &graph.authors["alice"];
    assert_eq!(alice.origins.len(), 2);
    assert_eq!(alice.contents.len(), 2);
    assert_eq!(graph.contents["two"].variants["en"].author.as_deref(), Some("alice"));
}

#[test]
fn test_content_grant() {
    let mut site = Site::new();
    let mine = page("Mine", "");
    let theirs = page("Theirs", "");
    site.author("alice", &meta("alice", "*"), &[("content/mine.en.md", &mine)])
        .author(
            "bob",
            &meta("bob", "other-site.org"),
            &[("content/theirs.en.md", &theirs)],
        );

    let graph = site.graph();
    assert!(graph.authors.contains_key("alice"));
    assert!(!graph.authors.contains_key("bob"));
    assert!(!graph.contents.contains_key("theirs"));
}

#[test]
fn test_tags_and_sentinel() {
    let mut site = Site::new();
    let tagged = page("X", "tags: [a]\n");
    let untagged = page("X de", "");
    site.author(
        "alice",
        &meta("alice", "*"),
        &[("content/x.en.md", &tagged), ("content/x.de.md", &untagged)],
    );

    let graph = site.graph();
    assert_eq!(graph.tags["a"]["x"].iter().collect::<Vec<_>>(), vec!["en"]);
    assert_eq!(
        graph.tags[SENTINEL_TAG]["x"].iter().collect::<Vec<_>>(),
        vec!["de"]
    );
    assert_eq!(graph.tagged("a")[0].title, "X");
}

#[test]
fn test_tag_index_spans_languages() {
    let mut site = Site::new();
    let en = page("X", "tags: a, b\n");
    let de = page("X de", "tags: [a]\n");
    site.author(
        "alice",
        &meta("alice", "*"),
        &[("content/x.en.md", &en), ("content/x.de.md", &de)],
    );

    let graph = site.graph();
    assert_eq!(graph.tags["a"]["x"].iter().collect::<Vec<_>>(), vec!["de", "en"]);
    assert_eq!(graph.tags["b"]["x"].iter().collect::<Vec<_>>(), vec!["en"]);
    assert!(!graph.tags.contains_key(SENTINEL_TAG));
}

#[test]
fn test_linkwith_is_symmetric() {
    let mut site = Site::new();
    let a = page("A", "linkwith: b\n");
    let b = page("B", "");
    site.author(
        "alice",
        &meta("alice", "*"),
        &[("content/a.en.md", &a), ("content/b.en.md", &b)],
    );

    let graph = site.graph();
    let a_key = VariantKey::new("a", "en");
    let b_key = VariantKey::new("b", "en");
    assert!(graph.variant(&a_key).unwrap().links.contains(&b_key));
    assert!(graph.variant(&b_key).unwrap().links.contains(&a_key));
}

#[test]
fn test_hidden_content_is_linkable() {
    let mut site = Site::new();
    let a = page("A", "linkto: secret\n");
    let secret = page("Secret", "publish: hidden\n");
    site.author(
        "alice",
        &meta("alice", "*"),
        &[("content/a.en.md", &a), ("content/secret.en.md", &secret)],
    );

    let graph = site.graph();
    let secret_key = VariantKey::new("secret", "en");
    let a_variant = graph.variant(&VariantKey::new("a", "en")).unwrap();
    assert!(a_variant.links.contains(&secret_key));
    assert_eq!(
        graph.variant(&secret_key).unwrap().publish,
        PublishState::Hidden
    );
    assert!(graph.langs["en"].contains("secret"));
    assert!(graph.in_language("en").iter().all(|v| v.id != "secret"));

    let repos = site.open();
    let report = orchestrator::generate(&site.config, &repos, &TitleRenderer, now()).unwrap();
    assert_eq!(report.rendered, 2);
    assert_eq!(
        fs::read_to_string(site.config.webroot.join("secret.html")).unwrap(),
        "Secret"
    );
}

#[test]
fn test_generate_removes_orphans() {
    let mut site = Site::new();
    let hello = page("Hello", "");
    site.author("alice", &meta("alice", "*"), &[("content/hello.en.md", &hello)]);

    let webroot = site.config.webroot.clone();
    fs::create_dir_all(webroot.join("old")).unwrap();
    fs::write(webroot.join("old/x.html"), "stale").unwrap();

    let repos = site.open();
    let report = orchestrator::generate(&site.config, &repos, &TitleRenderer, now()).unwrap();

    assert_eq!(fs::read_to_string(webroot.join("hello.html")).unwrap(), "Hello");
    assert!(!webroot.join("old").exists());
    assert_eq!(
        report.deleted,
        vec![PathBuf::from("old"), PathBuf::from("old/x.html")]
    );
}

#[test]
fn test_incremental_second_run_writes_nothing() {
    let mut site = Site::new();
    let hello = page("Hello", "");
    site.author("alice", &meta("alice", "*"), &[("content/hello.en.md", &hello)]);
    let repos = site.open();

    let first = orchestrator::run_at(&site.config, &repos, || Ok(TitleRenderer), true, now()).unwrap();
    assert!(matches!(first, RunOutcome::Generated(_)));

    // Anything written by hand survives a run without changes
    let webroot = site.config.webroot.clone();
    fs::write(webroot.join("hello.html"), "edited").unwrap();
    let second = orchestrator::run_at(&site.config, &repos, || Ok(TitleRenderer), true, now()).unwrap();
    assert!(matches!(second, RunOutcome::UpToDate));
    assert_eq!(fs::read_to_string(webroot.join("hello.html")).unwrap(), "edited");

    // A new commit triggers the next run
    site.vcs
        .commit(&site.config.author_repository_path("alice"), "2020-03-01 00:00:00");
    let third = orchestrator::run_at(&site.config, &repos, || Ok(TitleRenderer), true, now()).unwrap();
    assert!(matches!(third, RunOutcome::Generated(_)));
    assert_eq!(fs::read_to_string(webroot.join("hello.html")).unwrap(), "Hello");
}
