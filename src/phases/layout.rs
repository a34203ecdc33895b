//! Output locations and URLs of content variants.
//!
//! Two layouts are supported, selected by `content.index_only`:
//!
//! | layout | default language | other language |
//! |---|---|---|
//! | index | `id/index.html`, URL `/id` | `id/lang/index.html`, URL `/id/lang` |
//! | flat | `id.html`, URL `/id.html` | `id-lang.html`, URL `/id-lang.html` |
//!
//! In URLs, spaces in content ids are replaced by `content.space_replace` and
//! everything is percent-encoded. With a `base_address`, an absolute URL is
//! derived as well.

use std::path::PathBuf;

use url::Url;

use crate::config::SiteConfig;
use crate::error::Result;

/// Where one variant goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// Folder receiving the rendered file, relative to the output root.
    pub folder: PathBuf,
    /// Rendered file, relative to the output root.
    pub file: PathBuf,
    /// Site-relative URL, starting with `/`.
    pub url: String,
    pub absolute_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Layout {
    lang_default: String,
    index_only: bool,
    index_file: String,
    file_extension: String,
    space_replace: Option<String>,
    base_address: Option<Url>,
}

impl Layout {
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let base_address = match &config.base_address {
            Some(address) => {
                let mut base = Url::parse(address)?;
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                Some(base)
            }
            None => None,
        };

        Ok(Self {
            lang_default: config.content.lang_default.clone(),
            index_only: config.content.index_only,
            index_file: config.content.index_file.clone(),
            file_extension: config.content.file_extension.clone(),
            space_replace: config.content.space_replace.clone(),
            base_address,
        })
    }

    pub fn is_index_only(&self) -> bool {
        self.index_only
    }

    /// Plan the output of variant `(id, lang)`.
    pub fn plan(&self, id: &str, lang: &str) -> Result<OutputPlan> {
        let is_default = lang == self.lang_default;
        let id_path = id_to_path(id);
        let url_id = match &self.space_replace {
            Some(replacement) => id.replace(' ', replacement),
            None => id.to_string(),
        };

        let (folder, file, raw_url) = if self.index_only {
            let (folder, url) = if is_default {
                (id_path, format!("/{}", url_id))
            } else {
                (id_path.join(lang), format!("/{}/{}", url_id, lang))
            };
            let file = folder.join(&self.index_file);
            (folder, file, url)
        } else {
            let folder = self.shared_folder(id);
            let name = id_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let (file_name, url) = if is_default {
                (
                    format!("{}{}", name, self.file_extension),
                    format!("/{}{}", url_id, self.file_extension),
                )
            } else {
                (
                    format!("{}-{}{}", name, lang, self.file_extension),
                    format!("/{}-{}{}", url_id, lang, self.file_extension),
                )
            };
            (folder.clone(), folder.join(file_name), url)
        };

        let url = encode_path(&raw_url)?;
        let absolute_url = match &self.base_address {
            Some(base) => Some(base.join(url.trim_start_matches('/'))?.to_string()),
            None => None,
        };

        Ok(OutputPlan {
            folder,
            file,
            url,
            absolute_url,
        })
    }

    /// Folder shared by all languages of content `id`.
    ///
    /// In the flat layout this is the parent of the rendered files, in the
    /// index layout the folder of the default language.
    pub fn shared_folder(&self, id: &str) -> PathBuf {
        let id_path = id_to_path(id);
        if self.index_only {
            id_path
        } else {
            id_path.parent().map(PathBuf::from).unwrap_or_default()
        }
    }
}

fn id_to_path(id: &str) -> PathBuf {
    id.split('/').filter(|part| !part.is_empty()).collect()
}

/// Percent-encode a `/`-rooted path the way URL paths are encoded.
pub fn encode_path(path: &str) -> Result<String> {
    let mut url = Url::parse("http://localhost/")?;
    url.set_path(path);
    Ok(url.path().to_string())
}
