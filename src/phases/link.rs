//! Phase 3: Link Resolution
//!
//! Mutates the merged graph in place, once per run:
//!
//! - Every variant learns the languages of its content id (`langs`) and the
//!   ones other than its own (`other_langs`).
//! - When linking is enabled, `linkto` and `linkwith` content ids are
//!   resolved to concrete variants. `linkto` links one way, `linkwith`
//!   links both ways.
//!
//! A target variant is chosen by language: the linking variant's own
//! language, then the site's default language, then the first available
//! language in sorted order. Self references and unknown ids are dropped
//! with a warning. Index membership never changes here.

use log::warn;

use crate::graph::{ContentVariant, Graph, VariantKey};

/// Execute Phase 3: resolve languages and links
pub fn execute(graph: &mut Graph, lang_default: &str, linking: bool) {
    assign_languages(graph);

    if !linking {
        return;
    }

    let mut edges: Vec<(VariantKey, VariantKey, bool)> = Vec::new();
    for variant in graph.variants() {
        let from = variant.key();
        for target in &variant.linkto {
            if let Some(to) = resolve_target(graph, variant, "linkto", target, lang_default) {
                edges.push((from.clone(), to, false));
            }
        }
        for target in &variant.linkwith {
            if let Some(to) = resolve_target(graph, variant, "linkwith", target, lang_default) {
                edges.push((from.clone(), to, true));
            }
        }
    }

    for (from, to, symmetric) in edges {
        if symmetric {
            if let Some(target) = graph.variant_mut(&to) {
                target.links.insert(from.clone());
            }
        }
        if let Some(source) = graph.variant_mut(&from) {
            source.links.insert(to);
        }
    }
}

fn assign_languages(graph: &mut Graph) {
    for record in graph.contents.values_mut() {
        let langs: Vec<String> = record.variants.keys().cloned().collect();
        for (lang, variant) in record.variants.iter_mut() {
            variant.other_langs = langs.iter().filter(|l| *l != lang).cloned().collect();
            variant.langs = langs.clone();
        }
    }
}

/// Pick the variant of content `target` that `variant` should link to.
pub fn resolve_target(
    graph: &Graph,
    variant: &ContentVariant,
    header: &str,
    target: &str,
    lang_default: &str,
) -> Option<VariantKey> {
    if target == variant.id {
        warn!(
            "Self link: header {} of '{}' in language '{}' points to itself. Skipped.",
            header, variant.id, variant.lang
        );
        return None;
    }

    let Some(record) = graph.contents.get(target) else {
        warn!(
            "Unknown content id: header {} of '{}' in language '{}' points to '{}'. Skipped.",
            header, variant.id, variant.lang, target
        );
        return None;
    };

    if record.variants.contains_key(&variant.lang) {
        return Some(VariantKey::new(target, &variant.lang));
    }

    if record.variants.contains_key(lang_default) {
        warn!(
            "Cross language: header {} of '{}' in language '{}' points to default language '{}' of '{}'.",
            header, variant.id, variant.lang, lang_default, target
        );
        return Some(VariantKey::new(target, lang_default));
    }

    match record.variants.keys().next() {
        Some(first) => {
            warn!(
                "Cross language: header {} of '{}' in language '{}' points to first language '{}' of '{}'.",
                header, variant.id, variant.lang, first, target
            );
            Some(VariantKey::new(target, first))
        }
        None => {
            warn!(
                "Invalid link: header {} of '{}' in language '{}' matches no variant of '{}'.",
                header, variant.id, variant.lang, target
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::variant;

    fn graph_of(variants: Vec<ContentVariant>) -> Graph {
        let mut graph = Graph::new();
        for v in variants {
            graph
                .contents
                .entry(v.id.clone())
                .or_default()
                .variants
                .insert(v.lang.clone(), v);
        }
        graph
    }

    fn with_links(id: &str, lang: &str, linkto: &[&str], linkwith: &[&str]) -> ContentVariant {
        let mut v = variant(id, lang);
        v.linkto = linkto.iter().map(|s| s.to_string()).collect();
        v.linkwith = linkwith.iter().map(|s| s.to_string()).collect();
        v
    }

    fn links(graph: &Graph, id: &str, lang: &str) -> Vec<String> {
        graph
            .variant(&VariantKey::new(id, lang))
            .unwrap()
            .links
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    #[test]
    fn test_langs_and_other_langs() {
        let mut graph = graph_of(vec![variant("x", "en"), variant("x", "de"), variant("y", "fr")]);
        execute(&mut graph, "en", true);

        let x = graph.variant(&VariantKey::new("x", "en")).unwrap();
        assert_eq!(x.langs, vec!["de", "en"]);
        assert_eq!(x.other_langs, vec!["de"]);
        let y = graph.variant(&VariantKey::new("y", "fr")).unwrap();
        assert!(y.other_langs.is_empty());
    }

    #[test]
    fn test_linkto_is_one_way() {
        let mut graph = graph_of(vec![with_links("a", "en", &["b"], &[]), variant("b", "en")]);
        execute(&mut graph, "en", true);

        assert_eq!(links(&graph, "a", "en"), vec!["b (en)"]);
        assert!(links(&graph, "b", "en").is_empty());
    }

    #[test]
    fn test_linkwith_is_symmetric() {
        let mut graph = graph_of(vec![with_links("a", "en", &[], &["b"]), variant("b", "en")]);
        execute(&mut graph, "en", true);

        assert_eq!(links(&graph, "a", "en"), vec!["b (en)"]);
        assert_eq!(links(&graph, "b", "en"), vec!["a (en)"]);
    }

    #[test]
    fn test_every_target_is_resolved() {
        let mut graph = graph_of(vec![
            with_links("a", "en", &["b", "c", "missing", "a"], &[]),
            variant("b", "en"),
            variant("c", "en"),
        ]);
        execute(&mut graph, "en", true);
        assert_eq!(links(&graph, "a", "en"), vec!["b (en)", "c (en)"]);
    }

    #[test]
    fn test_language_fallbacks() {
        let mut graph = graph_of(vec![
            with_links("a", "de", &["b", "c"], &[]),
            variant("b", "en"),
            variant("b", "fr"),
            variant("c", "it"),
            variant("c", "fr"),
        ]);
        execute(&mut graph, "en", true);

        // default language first, then the first language in sorted order
        assert_eq!(links(&graph, "a", "de"), vec!["b (en)", "c (fr)"]);
    }

    #[test]
    fn test_linking_disabled() {
        let mut graph = graph_of(vec![with_links("a", "en", &["b"], &["b"]), variant("b", "en")]);
        execute(&mut graph, "en", false);

        assert!(links(&graph, "a", "en").is_empty());
        assert!(links(&graph, "b", "en").is_empty());
        let a = graph.variant(&VariantKey::new("a", "en")).unwrap();
        assert_eq!(a.langs, vec!["en"]);
    }

    #[test]
    fn test_links_never_invent_ids() {
        let mut graph = graph_of(vec![with_links("a", "en", &["ghost"], &["phantom"])]);
        execute(&mut graph, "en", true);
        assert!(links(&graph, "a", "en").is_empty());
        assert_eq!(graph.contents.len(), 1);
    }
}
