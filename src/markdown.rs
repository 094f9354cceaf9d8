use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::config::{RenderConfig, Site};
use crate::content::{GlossaryTerms, css_friendly};
use crate::context::RenderContext;
use crate::math::html_escape;
use crate::portals::Tooltip;
use crate::portals::glossary::render_static_term;
use crate::trusted::TrustedContent;

static GLOSSARY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\[glossary:(?<id>[a-z\-|]+?)\]").expect("valid glossary block regex")
});

static GLOSSARY_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[glossary-inline:(?<id>[a-z\-|]+?)\s*(?:"(?<text>[A-Za-z0-9 ]+)")?\]"#)
        .expect("valid inline glossary regex")
});

static LINK_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\link\{([^}]*)\}\{([^}]*)\}").expect("valid link shorthand regex"));

const CONCEPT_ICON: &str = r#"<i class="icon icon-concept-thick"></i>"#;

/// Markdown rendered to HTML, plus tooltips for the inline glossary terms it
/// contains.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarkdown {
    pub html: String,
    pub tooltips: Vec<Tooltip>,
}

/// Renders `markdown` to HTML, memoised through the context's cache when one
/// is present.
pub fn render_markdown(markdown: &str, cx: RenderContext<'_>, instance: &str) -> RenderedMarkdown {
    match cx.cache {
        Some(cache) => {
            let key = format!("{instance}\u{0}{:016x}\u{0}{markdown}", cx.fingerprint());
            cache.get_or_insert_with(&key, || render_uncached(markdown, cx, instance))
        }
        None => render_uncached(markdown, cx, instance),
    }
}

fn render_uncached(markdown: &str, cx: RenderContext<'_>, instance: &str) -> RenderedMarkdown {
    let mut tooltips = Vec::new();
    let markdown = match cx.glossary {
        Some(glossary) => {
            let markdown = render_glossary_blocks(markdown, glossary, cx, instance);
            render_inline_glossary_terms(&markdown, glossary, cx, instance, &mut tooltips)
        }
        None => markdown.to_string(),
    };
    let markdown = expand_shorthand(&markdown, cx.config);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(&markdown, options).map(|event| rewrite_link(event, cx.config));
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);

    RenderedMarkdown { html, tooltips }
}

fn render_glossary_blocks(markdown: &str, glossary: &GlossaryTerms, cx: RenderContext<'_>, instance: &str) -> String {
    GLOSSARY_BLOCK
        .replace_all(markdown, |caps: &Captures<'_>| {
            let id = &caps["id"];
            match glossary.resolve(id, cx.exam_board()) {
                Some(term) => render_static_term(term, cx, instance),
                None => {
                    tracing::error!(term = id, "no glossary term found for id");
                    String::new()
                }
            }
        })
        .into_owned()
}

fn render_inline_glossary_terms(
    markdown: &str,
    glossary: &GlossaryTerms,
    cx: RenderContext<'_>,
    instance: &str,
    tooltips: &mut Vec<Tooltip>,
) -> String {
    GLOSSARY_INLINE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let id = &caps["id"];
            let Some(term) = glossary.resolve(id, cx.exam_board()) else {
                tracing::error!(term = id, "no glossary term found for id");
                return String::new();
            };
            let offset = caps.get(0).map_or(0, |whole| whole.start());
            let target = format!("glossary-{instance}-{}-{offset}", css_friendly(&term.id));
            let html = TrustedContent::new(cx.nested())
                .with_instance_id(crate::portals::derive_instance_id(instance, &target))
                .class_name("inline-glossary-definition")
                .render_html(&term.explanation);
            let text = caps.name("text").map_or(term.value.as_str(), |text| text.as_str());
            let span = format!(
                r#"<span class="inline-glossary-term" id="{target}">{}</span>"#,
                html_escape(text)
            );
            tooltips.push(Tooltip { target, html });
            span
        })
        .into_owned()
}

/// Expands the LaTeX-style link shorthand and, on the physics site, links the
/// bold words **Glossary** and **Concepts** to the matching pages.
fn expand_shorthand(markdown: &str, config: &RenderConfig) -> String {
    let mut markdown = LINK_SHORTHAND.replace_all(markdown, "[$1]($2)").into_owned();
    if config.site != Site::Phy {
        return markdown;
    }

    let page = &config.page_context;
    let (glossary, concepts) = match (&page.subject, page.is_single_stage()) {
        (Some(subject), false) => (
            format!("/glossary?subjects={subject}"),
            format!("/concepts?types={subject}"),
        ),
        (Some(subject), true) => {
            let stage = page.stage.first().map(String::as_str).unwrap_or_default();
            (
                format!("/{subject}/{stage}/glossary"),
                format!("/{subject}/{stage}/concepts"),
            )
        }
        (None, _) => ("/glossary".to_string(), "/concepts".to_string()),
    };
    markdown = markdown.replace("**Glossary**", &format!("[**Glossary**]({glossary})"));
    markdown.replace("**Concepts**", &format!("[**Concepts**]({concepts})"))
}

fn is_local_link(href: &str, config: &RenderConfig) -> bool {
    href.starts_with('/')
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || config
            .site_origin
            .as_deref()
            .is_some_and(|origin| !origin.is_empty() && href.starts_with(origin))
}

fn rewrite_link<'a>(event: Event<'a>, config: &RenderConfig) -> Event<'a> {
    match event {
        Event::Start(Tag::Link { dest_url, title, .. }) => {
            let href = html_escape(&dest_url);
            let title = if title.is_empty() {
                String::new()
            } else {
                format!(r#" title="{}""#, html_escape(&title))
            };
            let html = if is_local_link(&dest_url, config) {
                let icon = if config.site == Site::Phy && dest_url.contains("/concepts/") {
                    CONCEPT_ICON
                } else {
                    ""
                };
                format!(r#"<a class="a-link" href="{href}"{title}>{icon}"#)
            } else {
                format!(r#"<a class="a-link" href="{href}"{title} target="_blank" rel="noopener nofollow">"#)
            };
            Event::InlineHtml(CowStr::from(html))
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use crate::config::PageContext;
    use crate::content::{FigureNumbers, GlossaryTerm};

    fn render(markdown: &str, config: &RenderConfig) -> RenderedMarkdown {
        let figures = FigureNumbers::new();
        render_markdown(markdown, RenderContext::new(config, &figures), "0badf00d")
    }

    fn glossary() -> GlossaryTerms {
        GlossaryTerms::new(vec![
            GlossaryTerm::new("algo", "Algorithm", "A sequence of steps"),
            GlossaryTerm::new("physics|force", "Force", "A push or a pull"),
        ])
    }

    #[test]
    fn render_markdown__should_render_tables_and_strikethrough() {
        // When
        let rendered = render("| a |\n|---|\n| b |\n\n~~gone~~", &RenderConfig::default());

        // Then
        assert!(rendered.html.contains("<table>"));
        assert!(rendered.html.contains("<del>gone</del>"));
        assert!(rendered.tooltips.is_empty());
    }

    #[test]
    fn render_markdown__should_keep_local_links_in_page() {
        // When
        let rendered = render("[home](/home \"Home\")", &RenderConfig::default());

        // Then
        assert_eq!(
            rendered.html,
            "<p><a class=\"a-link\" href=\"/home\" title=\"Home\">home</a></p>\n"
        );
    }

    #[test]
    fn render_markdown__should_open_external_links_in_new_tab() {
        // When
        let rendered = render("[site](https://example.com)", &RenderConfig::default());

        // Then
        assert!(rendered.html.contains(
            r#"<a class="a-link" href="https://example.com" target="_blank" rel="noopener nofollow">site</a>"#
        ));
    }

    #[test]
    fn render_markdown__should_treat_site_origin_as_local() {
        // Given
        let config = RenderConfig {
            site_origin: Some("https://isaacphysics.org".to_string()),
            ..RenderConfig::default()
        };

        // When
        let rendered = render("[c](https://isaacphysics.org/concepts/cp_force)", &config);

        // Then
        assert!(!rendered.html.contains("target=\"_blank\""));
        assert!(rendered.html.contains(CONCEPT_ICON));
    }

    #[test]
    fn render_markdown__should_expand_link_shorthand() {
        let rendered = render(r"\link{Read more}{/about}", &RenderConfig::default());
        assert!(rendered.html.contains(r#"<a class="a-link" href="/about">Read more</a>"#));
    }

    #[test]
    fn render_markdown__should_link_glossary_shorthand_for_multi_stage_subject() {
        // Given
        let config = RenderConfig {
            page_context: PageContext {
                subject: Some("physics".to_string()),
                stage: vec!["a_level".to_string(), "gcse".to_string()],
            },
            ..RenderConfig::default()
        };

        // When
        let rendered = render("See **Glossary** and **Concepts**.", &config);

        // Then
        assert!(rendered.html.contains(r#"href="/glossary?subjects=physics""#));
        assert!(rendered.html.contains(r#"href="/concepts?types=physics""#));
    }

    #[test]
    fn render_markdown__should_link_glossary_shorthand_for_single_stage_subject() {
        // Given
        let config = RenderConfig {
            page_context: PageContext {
                subject: Some("maths".to_string()),
                stage: vec!["gcse".to_string()],
            },
            ..RenderConfig::default()
        };

        // When
        let rendered = render("**Glossary**", &config);

        // Then
        assert!(rendered.html.contains(r#"href="/maths/gcse/glossary""#));
    }

    #[test]
    fn render_markdown__should_render_inline_glossary_terms_with_tooltips() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let glossary = glossary();
        let cx = RenderContext::new(&config, &figures).with_glossary(&glossary);

        // When
        let rendered = render_markdown(r#"See [glossary-inline:algo "the algorithm"] now."#, cx, "0badf00d");

        // Then
        assert_eq!(
            rendered.html,
            "<p>See <span class=\"inline-glossary-term\" id=\"glossary-0badf00d-algo-4\">the algorithm</span> now.</p>\n"
        );
        assert_eq!(rendered.tooltips.len(), 1);
        assert_eq!(rendered.tooltips[0].target, "glossary-0badf00d-algo-4");
        assert!(rendered.tooltips[0].html.contains("A sequence of steps"));
    }

    #[test]
    fn render_markdown__should_render_glossary_blocks_statically() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let glossary = glossary();
        let cx = RenderContext::new(&config, &figures).with_glossary(&glossary);

        // When
        let rendered = render_markdown("[glossary:physics|force]\n\nAfter.", cx, "0badf00d");

        // Then
        assert!(rendered.html.contains("Force"));
        assert!(rendered.html.contains("A push or a pull"));
        assert!(!rendered.html.contains("[glossary:"));
    }

    #[test]
    fn render_markdown__should_drop_unknown_glossary_terms() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let glossary = glossary();
        let cx = RenderContext::new(&config, &figures).with_glossary(&glossary);

        // When
        let rendered = render_markdown("Before [glossary-inline:missing] after", cx, "0badf00d");

        // Then
        assert_eq!(rendered.html, "<p>Before  after</p>\n");
    }

    #[test]
    fn render_markdown__should_leave_tokens_until_glossary_loads() {
        let rendered = render("[glossary-inline:algo]", &RenderConfig::default());
        assert_eq!(rendered.html, "<p>[glossary-inline:algo]</p>\n");
    }

    #[test]
    fn render_markdown__should_reuse_cached_output() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let cache = ContentCache::new();
        let cx = RenderContext::new(&config, &figures).with_cache(&cache);

        // When
        let first = render_markdown("*hello*", cx, "0badf00d");
        let second = render_markdown("*hello*", cx, "0badf00d");

        // Then
        assert_eq!(first, second);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn render_markdown__should_drop_unknown_glossary_blocks() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let glossary = glossary();
        let cx = RenderContext::new(&config, &figures).with_glossary(&glossary);

        // When
        let rendered = render_markdown("[glossary:missing]\n\nStill here.", cx, "0badf00d");

        // Then
        assert!(!rendered.html.contains("[glossary:"));
        assert!(!rendered.html.contains("missing"));
        assert!(rendered.html.contains("<p>Still here.</p>"));
    }

    #[test]
    fn render_markdown__should_key_cache_entries_by_glossary() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let glossary = glossary();
        let cache = ContentCache::new();
        let plain = RenderContext::new(&config, &figures).with_cache(&cache);
        let markdown = "[glossary-inline:algo]";

        // When
        let before = render_markdown(markdown, plain, "0badf00d");
        let after = render_markdown(markdown, plain.with_glossary(&glossary), "0badf00d");

        // Then
        assert_eq!(cache.hits(), 0);
        assert!(before.html.contains("[glossary-inline:algo]"));
        assert!(after.html.contains("inline-glossary-term"));
        assert_eq!(after.tooltips.len(), 1);
    }
}
