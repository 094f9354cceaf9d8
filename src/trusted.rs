//! Entry point for rendering a content fragment.
//!
//! Rendering happens in two steps. [`TrustedContent::prepare`] turns the
//! fragment into HTML with empty anchors where components belong;
//! [`TrustedContent::mount`] injects that HTML into a container and mounts the
//! components into their anchors.

use regex::Regex;
use std::sync::LazyLock;

use crate::content::{ContentFragment, Encoding};
use crate::context::RenderContext;
use crate::dom::Fragment;
use crate::markdown::render_markdown;
use crate::math::html_escape;
use crate::portals::{
    HookSet, RenderFn, Tooltip, apply_hooks, mount_portals, new_instance_id, no_portals, render_dnd_drop_zone_tokens,
    render_drop_zone_tokens, render_inline_question_tokens,
};
use crate::templates::{ContainerTemplate, render_or_log};

static INSTANCE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-[0-9a-f]{8}-").expect("valid instance id regex"));

/// Masks render instance ids in `html` so output from two instances can be
/// compared.
pub fn normalise_instance_ids(html: &str) -> String {
    INSTANCE_ID.replace_all(html, "-########-").into_owned()
}

/// Renders content fragments under one render instance id.
pub struct TrustedContent<'a> {
    cx: RenderContext<'a>,
    instance_id: String,
    span: bool,
    class_name: Option<String>,
}

/// Output of [`TrustedContent::prepare`]: the HTML to inject and the function
/// that produces its components once injected.
pub struct Prepared<'a> {
    pub html: String,
    render: RenderFn<'a>,
    tooltips: Vec<Tooltip>,
}

/// Rendered container plus the tooltips to emit after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mounted {
    pub container: String,
    pub tooltips: Vec<Tooltip>,
}

impl Mounted {
    pub fn to_html(&self) -> String {
        let mut html = self.container.clone();
        for tooltip in &self.tooltips {
            html.push_str(&tooltip.render_html());
        }
        html
    }
}

impl<'a> TrustedContent<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self {
            cx,
            instance_id: new_instance_id(),
            span: false,
            class_name: None,
        }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Render into a `<span>` rather than a `<div>`.
    pub fn span_level(mut self, span: bool) -> Self {
        self.span = span;
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn prepare(&self, fragment: &ContentFragment) -> Prepared<'a> {
        let cx = self.cx;
        if cx.too_deep() {
            tracing::warn!(depth = cx.depth, "content nested too deeply, rendering as text");
            return Prepared {
                html: html_escape(&fragment.value),
                render: no_portals(),
                tooltips: Vec::new(),
            };
        }

        let scanner = cx.math_scanner();
        let mut tooltips = Vec::new();
        let html = match &fragment.encoding {
            Encoding::Markdown => {
                let deferred = scanner.render_deferred(&fragment.value);
                let rendered = render_markdown(&self.drop_zones(&deferred.text), cx, &self.instance_id);
                tooltips = rendered.tooltips;
                let html = render_inline_question_tokens(&render_dnd_drop_zone_tokens(&rendered.html));
                deferred.restore(&html)
            }
            Encoding::Html => self.drop_zones(&scanner.render(&fragment.value)),
            Encoding::Latex => self.drop_zones(&scanner.render(&html_escape(&fragment.value))),
            Encoding::Plaintext => {
                return Prepared {
                    html: html_escape(&fragment.value),
                    render: no_portals(),
                    tooltips,
                };
            }
            Encoding::Unknown(encoding) => {
                tracing::warn!(encoding = encoding.as_str(), "content has an unknown encoding");
                return Prepared {
                    html: format!(
                        "[CONTENT WITH UNKNOWN ENCODING: <i>{} | {}</i>]",
                        html_escape(encoding),
                        html_escape(&fragment.value)
                    ),
                    render: no_portals(),
                    tooltips,
                };
            }
        };

        let (html, render) = apply_hooks(&html, &HookSet::PORTAL_HOOKS, cx, &self.instance_id);
        Prepared { html, render, tooltips }
    }

    fn drop_zones(&self, text: &str) -> String {
        if self.cx.drop_regions.is_some() {
            render_drop_zone_tokens(text)
        } else {
            text.to_string()
        }
    }

    pub fn mount(&self, prepared: Prepared<'a>) -> Mounted {
        let Prepared {
            html,
            render,
            mut tooltips,
        } = prepared;
        let container = render_or_log(
            &ContainerTemplate {
                tag: if self.span { "span" } else { "div" },
                class_name: self.class_name.as_deref(),
                html: &html,
            },
            "content container",
        );
        let root = Fragment::parse(&container);
        let portals = render(Some(&root));
        tooltips.extend(mount_portals(&root, portals));
        Mounted {
            container: root.to_html(),
            tooltips,
        }
    }

    pub fn render(&self, fragment: &ContentFragment) -> Mounted {
        self.mount(self.prepare(fragment))
    }

    /// Container and tooltips as one HTML string.
    pub fn render_html(&self, fragment: &ContentFragment) -> String {
        self.render(fragment).to_html()
    }
}
