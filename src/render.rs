//! # Rendering
//!
//! The write phase hands every content variant to a [`Renderer`] together
//! with the merged graph. How HTML is produced is up to the implementation.
//!
//! [`TemplateRenderer`] is the default: every template repository provides
//! a set of `minijinja` templates. Each `*.html` / `*.htm` file is registered
//! as `<template-id>/<path>`, so a variant asking for template `base` is
//! rendered with `base/content.html`. Variants naming no template, or one
//! that does not exist, use the default template set.
//!
//! Templates see:
//!
//! - every global string at the top level,
//! - `authors`, `contents`, `tags`, `langs` and `generationtime` from the
//!   graph,
//! - `index`: every variant by key in short form,
//! - `listings.tags` and `listings.langs`: the listed (not hidden) variants
//!   per tag and per language,
//! - `content`: the variant, with `links`, `langs`, `otherlangs` and
//!   `author` expanded into objects and its text under `content.content`,
//! - `template.head_extras`: a `<base>` tag pointing at the template's
//!   installed assets.
//!
//! A `markdown` filter turns text into HTML.
//!
//! Everything but `content` and `template` is the same for each variant of
//! a run. It is converted once into a [`SiteContext`] and shared by every
//! render.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment};
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::graph::{ContentVariant, Graph, VariantKey};
use crate::repository::SourceRepository;

/// Model used for content variants.
pub const CONTENT_MODEL: &str = "content.html";

/// Everything a renderer may look at for one variant.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub graph: &'a Graph,
    pub site: &'a SiteContext,
    pub variant: &'a ContentVariant,
}

/// Template values derived from the whole graph.
///
/// Build it after the last change to the graph; later changes are not seen.
#[derive(Debug, Clone, Default)]
pub struct SiteContext {
    values: BTreeMap<String, Value>,
}

impl SiteContext {
    pub fn new(graph: &Graph) -> Self {
        let mut values: BTreeMap<String, Value> = graph
            .globals
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.clone())))
            .collect();
        values.insert("authors".to_string(), Value::from_serialize(&graph.authors));
        values.insert("contents".to_string(), Value::from_serialize(&graph.contents));
        values.insert("tags".to_string(), Value::from_serialize(&graph.tags));
        values.insert("langs".to_string(), Value::from_serialize(&graph.langs));
        values.insert(
            "generationtime".to_string(),
            Value::from_serialize(&graph.generation_time),
        );
        values.insert(
            "index".to_string(),
            Value::from_serialize(summaries(graph, graph.variants().map(ContentVariant::key))),
        );
        values.insert("listings".to_string(), Value::from_serialize(listings(graph)));
        Self { values }
    }
}

/// Turns one content variant into a document.
pub trait Renderer: Send + Sync {
    /// Render `model` of template set `template` (or the default set).
    fn render(&self, model: &str, template: Option<&str>, ctx: &RenderContext<'_>)
        -> Result<String>;
}

/// A `minijinja` renderer fed from template repositories.
#[derive(Debug)]
pub struct TemplateRenderer {
    env: Environment<'static>,
    templates: BTreeSet<String>,
    default: Option<String>,
}

impl TemplateRenderer {
    /// Load every HTML file of every template repository.
    ///
    /// `default` must name one of the repositories; without it the first
    /// template id in sorted order is the default.
    pub fn new(
        repositories: &BTreeMap<String, SourceRepository>,
        default: Option<&str>,
    ) -> Result<Self> {
        let mut sources = Vec::new();
        for (id, repository) in repositories {
            for (key, path) in repository.files()? {
                if is_html(key) {
                    sources.push((id.clone(), key.clone(), std::fs::read_to_string(path)?));
                }
            }
        }
        let ids: Vec<String> = repositories.keys().cloned().collect();
        Self::from_sources(ids, sources, default)
    }

    /// Build a renderer from `(template id, path, source)` triples.
    pub fn from_sources(
        ids: impl IntoIterator<Item = String>,
        sources: impl IntoIterator<Item = (String, String, String)>,
        default: Option<&str>,
    ) -> Result<Self> {
        let templates: BTreeSet<String> = ids.into_iter().collect();

        let default = match default {
            Some(id) if templates.contains(id) => Some(id.to_string()),
            Some(id) => {
                return Err(Error::Config {
                    message: format!("default template '{}' is not configured", id),
                    hint: Some("Add it under 'sources.templates' or fix 'content.template_default'".to_string()),
                })
            }
            None => templates.iter().next().cloned(),
        };

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("markdown", markdown);

        for (id, path, source) in sources {
            let name = format!("{}/{}", id, path);
            env.add_template_owned(name.clone(), source)
                .map_err(|e| Error::Render {
                    model: name,
                    message: e.to_string(),
                })?;
        }

        Ok(Self {
            env,
            templates,
            default,
        })
    }

    /// Template set actually used for a requested one.
    pub fn resolve_template<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        match requested {
            Some(id) if self.templates.contains(id) => Some(id),
            Some(id) => {
                warn!("Unknown template '{}', using the default template", id);
                self.default.as_deref()
            }
            None => self.default.as_deref(),
        }
    }
}

impl Renderer for TemplateRenderer {
    fn render(
        &self,
        model: &str,
        template: Option<&str>,
        ctx: &RenderContext<'_>,
    ) -> Result<String> {
        let Some(template_id) = self.resolve_template(template) else {
            return Err(Error::Render {
                model: model.to_string(),
                message: "no template repository is configured".to_string(),
            });
        };

        let name = format!("{}/{}", template_id, model);
        let render_error = |e: minijinja::Error| Error::Render {
            model: name.clone(),
            message: e.to_string(),
        };

        let compiled = self.env.get_template(&name).map_err(render_error)?;
        let context = template_context(ctx, template_id)?;
        compiled.render(context).map_err(render_error)
    }
}

/// Whether a template repository path is a template rather than an asset.
pub fn is_html(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.len() > 5 && (lower.ends_with(".html") || lower.ends_with(".htm"))
}

fn markdown(text: &str) -> Value {
    let options = Options::all().difference(Options::ENABLE_SMART_PUNCTUATION);
    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(text, options));
    Value::from_safe_string(out)
}

#[derive(Serialize)]
struct TemplateVars {
    head_extras: String,
}

/// Short form of a variant used for links and language switches.
#[derive(Serialize)]
struct VariantSummary<'a> {
    id: &'a str,
    lang: &'a str,
    title: &'a str,
    description: &'a str,
    url: Option<&'a str>,
    absolute_url: Option<&'a str>,
}

impl<'a> VariantSummary<'a> {
    fn of(variant: &'a ContentVariant) -> Self {
        Self {
            id: &variant.id,
            lang: &variant.lang,
            title: &variant.title,
            description: &variant.description,
            url: variant.url.as_deref(),
            absolute_url: variant.absolute_url.as_deref(),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Render {
        model: CONTENT_MODEL.to_string(),
        message: e.to_string(),
    })
}

fn summaries<'a>(
    graph: &'a Graph,
    keys: impl Iterator<Item = VariantKey>,
) -> BTreeMap<String, VariantSummary<'a>> {
    keys.filter_map(|key| graph.variant(&key))
        .map(|v| (v.key().to_string(), VariantSummary::of(v)))
        .collect()
}

fn content_view(ctx: &RenderContext<'_>) -> Result<serde_json::Value> {
    let graph = ctx.graph;
    let variant = ctx.variant;

    let mut view = to_json(variant)?;
    let Some(fields) = view.as_object_mut() else {
        return Ok(view);
    };

    let links: Vec<VariantSummary<'_>> = variant
        .links
        .iter()
        .filter_map(|key| graph.variant(key))
        .map(VariantSummary::of)
        .collect();
    let langs = |langs: &[String]| {
        langs
            .iter()
            .filter_map(|lang| {
                graph
                    .variant(&VariantKey::new(&variant.id, lang))
                    .map(|v| (lang.clone(), VariantSummary::of(v)))
            })
            .collect::<BTreeMap<_, _>>()
    };

    fields.insert("content".to_string(), serde_json::Value::String(variant.body.clone()));
    fields.insert("links".to_string(), to_json(&links)?);
    fields.insert("langs".to_string(), to_json(&langs(&variant.langs))?);
    fields.insert("otherlangs".to_string(), to_json(&langs(&variant.other_langs))?);
    fields.insert("author".to_string(), to_json(&graph.author_of(variant))?);
    Ok(view)
}

#[derive(Serialize)]
struct Listings<'a> {
    tags: BTreeMap<&'a str, Vec<VariantSummary<'a>>>,
    langs: BTreeMap<&'a str, Vec<VariantSummary<'a>>>,
}

fn listings(graph: &Graph) -> Listings<'_> {
    fn list(variants: Vec<&ContentVariant>) -> Vec<VariantSummary<'_>> {
        variants.into_iter().map(VariantSummary::of).collect()
    }

    Listings {
        tags: graph
            .tags
            .keys()
            .map(|tag| (tag.as_str(), list(graph.tagged(tag))))
            .collect(),
        langs: graph
            .langs
            .keys()
            .map(|lang| (lang.as_str(), list(graph.in_language(lang))))
            .collect(),
    }
}

fn template_context(ctx: &RenderContext<'_>, template_id: &str) -> Result<Value> {
    // Values are reference counted; cloning the map does not copy the graph
    let mut root = ctx.site.values.clone();
    root.insert(
        "content".to_string(),
        Value::from_serialize(content_view(ctx)?),
    );
    root.insert(
        "template".to_string(),
        Value::from_serialize(TemplateVars {
            head_extras: format!("<base href='/{}/'>", template_id),
        }),
    );

    Ok(Value::from_serialize(root))
}
