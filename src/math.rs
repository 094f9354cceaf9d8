//! Math expression rendering via LaTeX to MathML conversion.
//!
//! The delimiter scanner in [`scanner`] finds math regions inside an HTML
//! string; each region is expanded with the active [`MathMacroSet`], converted
//! here, and paired with a screen-reader rendering from [`a11y`].

pub(crate) mod a11y;
mod macros;
pub(crate) mod scanner;

pub use macros::{MacroDefinition, MathMacroSet};
pub use scanner::{DeferredMath, MathRegion, MathScanner, find_math_regions, render_math};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathStyle {
    /// `$...$`, `\(...\)` and friends.
    Inline,
    /// `$$...$$`, `\[...\]` and the display environments.
    Display,
}

impl MathStyle {
    pub(crate) fn display_style(self) -> latex2mathml::DisplayStyle {
        match self {
            MathStyle::Inline => latex2mathml::DisplayStyle::Inline,
            MathStyle::Display => latex2mathml::DisplayStyle::Block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathResult {
    MathMl(String),
    Failed { latex: String, reason: String },
}

impl MathResult {
    /// MathML on success, otherwise the raw LaTeX in a `math-error` element.
    pub fn into_html(self, style: MathStyle) -> String {
        let (latex, reason) = match self {
            MathResult::MathMl(mathml) => return mathml,
            MathResult::Failed { latex, reason } => (html_escape(&latex), html_escape(&reason)),
        };
        match style {
            MathStyle::Inline => format!(r#"<code class="math-error" title="{reason}">{latex}</code>"#),
            MathStyle::Display => {
                format!(r#"<pre class="math-error" title="{reason}"><code>{latex}</code></pre>"#)
            }
        }
    }
}

/// Converts one already macro-expanded expression to MathML.
pub fn render_expression(latex: &str, style: MathStyle) -> MathResult {
    latex2mathml::latex_to_mathml(latex, style.display_style()).map_or_else(
        |err| {
            tracing::warn!(latex, error = %err, "failed to render math expression");
            MathResult::Failed {
                latex: latex.to_string(),
                reason: err.to_string(),
            }
        },
        MathResult::MathMl,
    )
}

/// Escape HTML special characters in a string.
pub fn html_escape(s: &str) -> String {
    ::html_escape::encode_quoted_attribute(s).into_owned()
}

/// Decode HTML character references. Unknown named references are kept as
/// written.
pub fn html_unescape(s: &str) -> String {
    ::html_escape::decode_html_entities(s).into_owned()
}
