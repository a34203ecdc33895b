//! # Site Configuration
//!
//! This module defines the data structures that represent a site file
//! (`site.yaml` by default) and the logic for loading it.
//!
//! ## Key Components
//!
//! - **`SiteConfig`**: The whole configuration of one generated site: the id
//!   authors grant their content to, where the working copies live, where the
//!   output goes and how it is laid out.
//! - **`SourcesConfig`**: The author and template repositories, keyed by
//!   repository id. Both maps are ordered by id, which fixes the order in
//!   which repositories are ingested and therefore who wins on conflicts.
//! - **`Features`** and **`ContentSettings`**: Toggles and details of the
//!   content pipeline.
//!
//! ## Paths
//!
//! `root` is resolved against the directory containing the site file.
//! `sources.authors_dir`, `sources.templates_dir`, `webroot` and
//! `features.file_index` are resolved against `root`. `static_dirs` stay
//! relative to `webroot`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::is_language_code;

/// File name looked up when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "site.yaml";

/// Date and time formats applied to the generation timestamp.
///
/// Keys without a `:lang` suffix are the ISO defaults. Entries in
/// `SiteConfig::datetime_formats` overwrite or extend this table.
pub const DEFAULT_DATETIME_FORMATS: &[(&str, &str)] = &[
    ("year", "%Y"),
    ("year2", "%y"),
    ("month", "%m"),
    ("day", "%d"),
    ("hour", "%H"),
    ("minute", "%M"),
    ("second", "%S"),
    ("date", "%Y-%m-%d"),
    ("date:en", "%d/%m/%Y"),
    ("date:de", "%d.%m.%Y"),
    ("time", "%H:%M:%S"),
    ("time:en", "%I:%M:%S %p"),
];

/// Configuration of one generated site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Id authors must list in their `contentgrant` header.
    pub site_id: String,

    /// Public address of the site, used to derive absolute URLs.
    #[serde(default)]
    pub base_address: Option<String>,

    /// Working directory of the site. Relative to the configuration file.
    #[serde(default)]
    pub root: PathBuf,

    /// Author and template repositories.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Output directory. Must exist before generation.
    #[serde(default = "default_webroot")]
    pub webroot: PathBuf,

    /// Directories below `webroot` that are never swept.
    #[serde(default)]
    pub static_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub features: Features,

    #[serde(default)]
    pub content: ContentSettings,

    /// Overrides for `DEFAULT_DATETIME_FORMATS`.
    #[serde(default)]
    pub datetime_formats: BTreeMap<String, String>,
}

/// Where working copies live and which ones belong to the site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Parent directory of the author working copies.
    pub authors_dir: PathBuf,
    /// Parent directory of the template working copies.
    pub templates_dir: PathBuf,
    /// Author repository id to remote URL.
    pub authors: BTreeMap<String, String>,
    /// Template id to remote URL.
    pub templates: BTreeMap<String, String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            authors_dir: PathBuf::from("git/authors"),
            templates_dir: PathBuf::from("git/templates"),
            authors: BTreeMap::new(),
            templates: BTreeMap::new(),
        }
    }
}

/// Pipeline toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Resolve `linkto` / `linkwith` headers.
    pub linking: bool,
    /// Build the tag index.
    pub tags: bool,
    /// Copy non-content files next to a content file into the output.
    pub copy_other_files: bool,
    /// Copy the markdown source of each variant into the output.
    pub copy_source_file: bool,
    /// Write a report of touched and deleted paths here after each run.
    pub file_index: Option<PathBuf>,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            linking: true,
            tags: true,
            copy_other_files: true,
            copy_source_file: false,
            file_index: None,
        }
    }
}

/// Content layout and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Main language of the site.
    pub lang_default: String,
    /// Template used when a content item names none or an unknown one.
    pub template_default: Option<String>,
    /// `id/index.html` and `id/lang/index.html` instead of `id.html` and
    /// `id-lang.html`.
    pub index_only: bool,
    pub index_file: String,
    pub file_extension: String,
    /// Replacement for spaces in content ids before URL encoding.
    pub space_replace: Option<String>,
    /// Tags for content without a `tags` header.
    pub tag_default: Vec<String>,
    /// Constant strings exposed to every template.
    pub global_strings: BTreeMap<String, String>,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            lang_default: "en".to_string(),
            template_default: None,
            index_only: false,
            index_file: "index.html".to_string(),
            file_extension: ".html".to_string(),
            space_replace: Some("-".to_string()),
            tag_default: Vec::new(),
            global_strings: BTreeMap::new(),
        }
    }
}

fn default_webroot() -> PathBuf {
    PathBuf::from("webroot")
}

impl SiteConfig {
    /// Create a configuration with defaults for everything but the site id.
    pub fn new(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            base_address: None,
            root: PathBuf::new(),
            sources: SourcesConfig::default(),
            webroot: default_webroot(),
            static_dirs: Vec::new(),
            features: Features::default(),
            content: ContentSettings::default(),
            datetime_formats: BTreeMap::new(),
        }
    }

    /// Parse a configuration from YAML without resolving paths.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            message: e.to_string(),
            hint: if e.to_string().contains("site_id") {
                Some("Add 'site_id:' with the id authors grant their content to".to_string())
            } else {
                None
            },
        })
    }

    /// Load, resolve and validate the configuration at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Cannot read '{}': {}", path.display(), e),
            hint: None,
        })?;
        let mut config = Self::parse(&text)?;

        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        config.resolve_paths(&base);
        config.validate()?;
        Ok(config)
    }

    /// Turn every relative path into one anchored at `base` / `root`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.root = anchor(base, &self.root);
        self.sources.authors_dir = anchor(&self.root, &self.sources.authors_dir);
        self.sources.templates_dir = anchor(&self.root, &self.sources.templates_dir);
        self.webroot = anchor(&self.root, &self.webroot);
        if let Some(index) = self.features.file_index.take() {
            self.features.file_index = Some(anchor(&self.root, &index));
        }

        let webroot = self.webroot.clone();
        self.static_dirs = self
            .static_dirs
            .iter()
            .map(|dir| match dir.strip_prefix(&webroot) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => dir.clone(),
            })
            .collect();
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.site_id.trim().is_empty() {
            return Err(Error::Config {
                message: "site_id must not be empty".to_string(),
                hint: Some("Set 'site_id:' to the id authors grant".to_string()),
            });
        }

        if !is_language_code(&self.content.lang_default) {
            return Err(Error::Config {
                message: format!(
                    "content.lang_default '{}' is not a two-letter language code",
                    self.content.lang_default
                ),
                hint: None,
            });
        }

        for dir in &self.static_dirs {
            if dir.is_absolute() {
                return Err(Error::Config {
                    message: format!(
                        "static dir '{}' is outside of webroot '{}'",
                        dir.display(),
                        self.webroot.display()
                    ),
                    hint: Some("Static dirs are relative to webroot".to_string()),
                });
            }
        }

        for (key, format) in self.datetime_table() {
            if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
                return Err(Error::Config {
                    message: format!("invalid datetime format for '{}': '{}'", key, format),
                    hint: None,
                });
            }
        }

        if let Some(base) = &self.base_address {
            url::Url::parse(base)?;
        }

        Ok(())
    }

    /// The default datetime formats overlaid with the site's overrides.
    pub fn datetime_table(&self) -> BTreeMap<String, String> {
        let mut table: BTreeMap<String, String> = DEFAULT_DATETIME_FORMATS
            .iter()
            .map(|(key, format)| (key.to_string(), format.to_string()))
            .collect();
        table.extend(
            self.datetime_formats
                .iter()
                .map(|(key, format)| (key.clone(), format.clone())),
        );
        table
    }

    /// Working copy directory of an author repository.
    pub fn author_repository_path(&self, id: &str) -> PathBuf {
        self.sources.authors_dir.join(id)
    }

    /// Working copy directory of a template repository.
    pub fn template_repository_path(&self, id: &str) -> PathBuf {
        self.sources.templates_dir.join(id)
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else if path.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(path)
    }
}
