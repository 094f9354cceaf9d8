//! Glossary terms: full definitions in place, or a hoverable word with the
//! definition in a tooltip.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{Portal, RenderFn, Tooltip, derive_instance_id, no_portals};
use crate::config::Environment;
use crate::content::{ContentFragment, GlossaryTerm, css_friendly};
use crate::context::RenderContext;
use crate::dom::{Fragment, attr, create_element, has_attr, replace, set_attr, set_text};
use crate::math::html_escape;
use crate::templates::{GlossaryTermTemplate, render_or_log};
use crate::trusted::TrustedContent;

const MARKER_PREFIX: &str = "glossary-term-";
const ANCHOR_PREFIX: &str = "glossary-anchor-";

static BLOCK_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?<lead>^|>)\[glossary:(?<id>[a-z0-9\-|_]+?)\]").expect("valid glossary block regex")
});

static INLINE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[glossary-inline(?<titled>-titled)?:(?<id>[a-z0-9\-|_]+?)\s*(?:"(?<text>[A-Za-z0-9\-()/,'\\. ]+)")?\]"#,
    )
    .expect("valid inline glossary regex")
});

/// Turns glossary tokens left in HTML into marker elements.
pub(crate) fn convert_tokens(html: &str) -> String {
    let html = BLOCK_TOKEN.replace_all(html, |caps: &Captures<'_>| {
        format!(
            r#"{}<div data-type="full" id="{MARKER_PREFIX}{}"></div>"#,
            &caps["lead"],
            css_friendly(&caps["id"])
        )
    });
    INLINE_TOKEN
        .replace_all(&html, |caps: &Captures<'_>| {
            let text = caps
                .name("text")
                .map(|text| format!(r#" data-text="{}""#, html_escape(text.as_str())))
                .unwrap_or_default();
            let titled = if caps.name("titled").is_some() { " data-titled" } else { "" };
            format!(
                r#"<span data-type="inline" class="inline-glossary-term"{text} id="{MARKER_PREFIX}{}"{titled}></span>"#,
                css_friendly(&caps["id"])
            )
        })
        .into_owned()
}

/// A glossary term rendered in full where its marker was.
#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryTermPortal {
    pub anchor_id: String,
    pub value: String,
    pub link: Option<String>,
    pub explanation_html: String,
    /// Tooltips for glossary terms inside the explanation.
    pub tooltips: Vec<Tooltip>,
}

impl GlossaryTermPortal {
    pub fn render_html(&self) -> String {
        render_or_log(
            &GlossaryTermTemplate {
                value: &self.value,
                link: self.link.as_deref(),
                explanation: &self.explanation_html,
            },
            "glossary term",
        )
    }
}

struct FullTerm {
    anchor_id: String,
    term: GlossaryTerm,
}

/// Resolves glossary markers against the loaded glossary. Does nothing until
/// the glossary has been loaded.
pub(crate) fn hook<'a>(html: &str, cx: RenderContext<'a>, instance: &str) -> (String, RenderFn<'a>) {
    let Some(glossary) = cx.glossary else {
        return (html.to_string(), no_portals());
    };

    let fragment = Fragment::parse(&convert_tokens(html));
    let markers = fragment.select(|element| attr(element, "id").is_some_and(|id| id.starts_with(MARKER_PREFIX)));
    if markers.is_empty() {
        return (html.to_string(), no_portals());
    }

    let mut tooltips = Vec::new();
    let mut full_terms = Vec::new();
    for (position, marker) in markers.iter().enumerate() {
        let Some(id) = attr(marker, "id") else {
            continue;
        };
        let term_id = &id[MARKER_PREFIX.len()..];
        let text = attr(marker, "data-text");

        let Some(term) = glossary.resolve_css(term_id, cx.exam_board()) else {
            tracing::error!(term = term_id, "no glossary term found for id");
            match cx.config.environment {
                Environment::Prod => set_text(marker, text.as_deref().unwrap_or_default()),
                Environment::Dev => set_text(marker, &format!("[Invalid glossary term ID: {term_id}]")),
            }
            continue;
        };

        let anchor_id = format!("{ANCHOR_PREFIX}{instance}-{term_id}-{position}");
        match attr(marker, "data-type").as_deref() {
            Some("full") => {
                replace(
                    marker,
                    create_element("div", &[("class", "glossary-term row"), ("id", &anchor_id)]),
                );
                full_terms.push(FullTerm {
                    anchor_id,
                    term: term.clone(),
                });
            }
            Some("inline") => {
                set_text(marker, text.as_deref().unwrap_or(&term.value));
                set_attr(marker, "id", &anchor_id);
                let markdown = if has_attr(marker, "data-titled") {
                    format!("**{}**: {}", term.value, term.explanation.value)
                } else {
                    term.explanation.value.clone()
                };
                tooltips.push(definition_tooltip(&markdown, anchor_id, cx, instance));
            }
            other => {
                tracing::debug!(term = term_id, kind = other, "ignoring glossary marker of unknown type");
            }
        }
    }

    let instance = instance.to_string();
    let render = move |root: Option<&Fragment>| {
        let mut portals: Vec<Portal> = tooltips.iter().cloned().map(Portal::Tooltip).collect();
        if root.is_some() {
            portals.extend(
                full_terms
                    .iter()
                    .map(|full| Portal::GlossaryTerm(full_term_portal(full, cx, &instance))),
            );
        }
        portals
    };
    (fragment.to_html(), Box::new(render))
}

fn definition_tooltip(markdown: &str, target: String, cx: RenderContext<'_>, instance: &str) -> Tooltip {
    let html = TrustedContent::new(cx.nested())
        .with_instance_id(derive_instance_id(instance, &target))
        .class_name("inline-glossary-definition")
        .render_html(&ContentFragment::markdown(markdown));
    Tooltip { target, html }
}

fn full_term_portal(full: &FullTerm, cx: RenderContext<'_>, instance: &str) -> GlossaryTermPortal {
    let explanation = TrustedContent::new(cx.nested())
        .with_instance_id(derive_instance_id(instance, &full.anchor_id))
        .render(&full.term.explanation);
    GlossaryTermPortal {
        anchor_id: full.anchor_id.clone(),
        value: full.term.value.clone(),
        link: Some(format!("/glossary#{}", full.term.css_id())),
        explanation_html: explanation.container,
        tooltips: explanation.tooltips,
    }
}

/// Static markup for a full glossary term, for content that is not mounted.
pub(crate) fn render_static_term(term: &GlossaryTerm, cx: RenderContext<'_>, instance: &str) -> String {
    let explanation = TrustedContent::new(cx.nested())
        .with_instance_id(derive_instance_id(instance, &term.id))
        .render_html(&term.explanation);
    render_or_log(
        &GlossaryTermTemplate {
            value: &term.value,
            link: None,
            explanation: &explanation,
        },
        "glossary term",
    )
}
