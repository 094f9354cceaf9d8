//! Finds math regions in an HTML string and replaces each with rendered
//! markup, leaving everything between them untouched.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::a11y::render_a11y_string;
use super::{MathMacroSet, MathResult, MathStyle, html_unescape, render_expression};
use crate::content::FigureNumbers;
use crate::portals::drop_zones::DROP_ZONE_TOKEN;

const REF: &str = "==REF==yzskvUeunVc==";
const END_REF: &str = "==ENDREF==";
const UNSUPPORTED_EQUATION: &str = "[[Unsupported equation]]";
const MATHML_ONLY_TITLE: &str = "Accessible with a screenreader that supports MathML";
const PLACEHOLDER: char = '\u{F8FF}';

static START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\begin\{equation\}|\$\$|\\\(|\\\[|\$|\\begin\{(?<env>[^}]*)\}|\\*\\\$|\\(?:eq)?ref\{(?<ref>[^}]*)\}",
    )
    .expect("math start pattern is valid")
});

static REFERENCE_IN_MATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:eq)?ref\{([^}]*)\}").expect("reference pattern is valid")
});

static SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{}(.*?){}", regex::escape(REF), regex::escape(END_REF)))
        .expect("sentinel pattern is valid")
});

static SPOKEN_SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "start text, {}(.*?){}, end text,?",
        regex::escape(REF),
        regex::escape(END_REF)
    ))
    .expect("spoken sentinel pattern is valid")
});

static PLACEHOLDERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{PLACEHOLDER}([0-9]+){PLACEHOLDER}")).expect("placeholder pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("whitespace pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Text(&'a str),
    Math {
        latex: &'a str,
        style: MathStyle,
        offset: usize,
    },
    /// An escaped `\$`, emitted as a bare dollar sign.
    Dollar,
    Reference(&'a str),
}

struct Delimiter {
    end: String,
    style: MathStyle,
    keep_delimiters: bool,
}

fn delimiter_for(token: &str, caps: &Captures<'_>) -> Option<Delimiter> {
    let (end, style) = match token {
        "$" => ("$".to_string(), MathStyle::Inline),
        r"\(" => (r"\)".to_string(), MathStyle::Inline),
        "$$" => ("$$".to_string(), MathStyle::Display),
        r"\[" => (r"\]".to_string(), MathStyle::Display),
        r"\begin{equation}" => (r"\end{equation}".to_string(), MathStyle::Display),
        _ => {
            let env = caps.name("env")?.as_str();
            return Some(Delimiter {
                end: format!(r"\end{{{env}}}"),
                style: MathStyle::Display,
                keep_delimiters: true,
            });
        }
    };
    Some(Delimiter {
        end,
        style,
        keep_delimiters: false,
    })
}

/// Finds `end` at brace depth zero, skipping escaped pairs. Returns the byte
/// range of the closing delimiter.
fn find_end(html: &str, from: usize, end: &str) -> Option<(usize, usize)> {
    let mut depth = 0i64;
    let mut idx = from;
    while idx < html.len() {
        let rest = &html[idx..];
        if rest.starts_with(end) {
            if depth == 0 {
                return Some((idx, idx + end.len()));
            }
            idx += end.len();
            continue;
        }
        let mut chars = rest.chars();
        let c = chars.next()?;
        idx += c.len_utf8();
        match c {
            '\\' => idx += chars.next().map_or(0, char::len_utf8),
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Splits `html` into text and math segments. An opening delimiter with no
/// matching close is kept as text and scanning resumes right after it.
pub(crate) fn segments(html: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut index = 0;

    while let Some(caps) = START.captures_at(html, index) {
        let Some(token) = caps.get(0) else { break };
        if token.start() > index {
            segments.push(Segment::Text(&html[index..token.start()]));
        }

        if let Some(reference) = caps.name("ref") {
            segments.push(Segment::Reference(reference.as_str()));
            index = token.end();
        } else if let Some(delimiter) = delimiter_for(token.as_str(), &caps) {
            match find_end(html, token.end(), &delimiter.end) {
                Some((end_start, end_end)) => {
                    let (latex, offset) = if delimiter.keep_delimiters {
                        (&html[token.start()..end_end], token.start())
                    } else {
                        (&html[token.end()..end_start], token.end())
                    };
                    segments.push(Segment::Math {
                        latex,
                        style: delimiter.style,
                        offset,
                    });
                    index = end_end;
                }
                None => {
                    segments.push(Segment::Text(token.as_str()));
                    index = token.end();
                }
            }
        } else {
            segments.push(Segment::Dollar);
            index = token.end();
        }
    }

    if index < html.len() {
        segments.push(Segment::Text(&html[index..]));
    }
    segments
}

/// A math expression found in content, before any rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathRegion {
    pub latex: String,
    pub style: MathStyle,
    /// Byte offset of the expression in the scanned string.
    pub offset: usize,
}

impl MathRegion {
    /// Converts the region the same way rendering does and reports why
    /// conversion failed, if it did.
    pub fn conversion_error(&self, macros: MathMacroSet) -> Option<String> {
        let prepared = mathml_compatible(&prepare_latex(&self.latex, macros));
        latex2mathml::latex_to_mathml(&prepared, self.style.display_style())
            .err()
            .map(|err| err.to_string())
    }
}

pub fn find_math_regions(html: &str) -> Vec<MathRegion> {
    segments(html)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Math {
                latex,
                style,
                offset,
            } => Some(MathRegion {
                latex: latex.to_string(),
                style,
                offset,
            }),
            _ => None,
        })
        .collect()
}

fn munge(latex: &str) -> String {
    latex.replace("eqnarray", "aligned").replace(r"\newline", r"\\")
}

/// Spells legacy font switches the way the MathML converter understands.
fn mathml_compatible(latex: &str) -> String {
    latex
        .replace(r"\rm{", r"\mathrm{")
        .replace(r"\sf{", r"\mathsf{")
        .replace(r"\textrm{", r"\text{")
}

fn prepare_latex(latex: &str, macros: MathMacroSet) -> String {
    let munged = munge(&html_unescape(latex));
    let marked = REFERENCE_IN_MATH.replace_all(&munged, |caps: &Captures<'_>| {
        format!(r"\text{{{REF}{}{END_REF}}}", &caps[1])
    });
    macros.expand(&marked)
}

fn attribute_safe(text: &str) -> String {
    text.replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Renders math expressions, escaped dollars and figure references.
#[derive(Debug, Clone, Copy)]
pub struct MathScanner<'a> {
    macros: MathMacroSet,
    figures: &'a FigureNumbers,
    accessible_text: bool,
    prefer_mathml: bool,
}

impl<'a> MathScanner<'a> {
    pub fn new(macros: MathMacroSet, figures: &'a FigureNumbers) -> Self {
        Self {
            macros,
            figures,
            accessible_text: false,
            prefer_mathml: false,
        }
    }

    /// Adds the screen-reader text as a hover title.
    pub fn with_accessible_text(mut self, accessible_text: bool) -> Self {
        self.accessible_text = accessible_text;
        self
    }

    pub fn with_prefer_mathml(mut self, prefer_mathml: bool) -> Self {
        self.prefer_mathml = prefer_mathml;
        self
    }

    pub fn render(&self, html: &str) -> String {
        let mut output = String::with_capacity(html.len());
        for segment in segments(html) {
            match segment {
                Segment::Math { latex, style, .. } => output.push_str(&self.render_region(latex, style)),
                other => self.push_plain(&mut output, other),
            }
        }
        output
    }

    /// Renders math like [`MathScanner::render`] but leaves a private-use
    /// placeholder where each expression goes, so the surrounding text can be
    /// run through another formatter first.
    pub fn render_deferred(&self, html: &str) -> DeferredMath {
        let mut text = String::with_capacity(html.len());
        let mut rendered = Vec::new();
        for segment in segments(html) {
            match segment {
                Segment::Math { latex, style, .. } => {
                    text.push(PLACEHOLDER);
                    text.push_str(&rendered.len().to_string());
                    text.push(PLACEHOLDER);
                    rendered.push(self.render_region(latex, style));
                }
                other => self.push_plain(&mut text, other),
            }
        }
        DeferredMath { text, rendered }
    }

    fn push_plain(&self, output: &mut String, segment: Segment<'_>) {
        match segment {
            Segment::Text(text) => output.push_str(text),
            Segment::Dollar => output.push('$'),
            Segment::Reference(id) => output.push_str(&self.figure_reference(id, true)),
            Segment::Math { latex, .. } => output.push_str(latex),
        }
    }

    fn figure_reference(&self, id: &str, format: bool) -> String {
        match self.figures.get(id) {
            Some(number) if format => {
                format!(r#"<strong class="text-theme figure-reference">Figure&nbsp;{number}</strong>"#)
            }
            Some(number) => format!("Figure&nbsp;{number}"),
            None => format!("unknown reference {id}"),
        }
    }

    fn render_region(&self, latex: &str, style: MathStyle) -> String {
        let prepared = prepare_latex(latex, self.macros);
        let visual = mathml_compatible(&DROP_ZONE_TOKEN.replace_all(&prepared, "clickable drop zone"));
        let mathml = match render_expression(&visual, style) {
            MathResult::MathMl(mathml) => mathml,
            failed => return failed.into_html(style),
        };
        let mathml = SENTINEL.replace_all(&mathml, |caps: &Captures<'_>| self.figure_reference(&caps[1], true));

        let spoken = match render_a11y_string(&prepared) {
            Ok(spoken) => {
                let pause = match style {
                    MathStyle::Inline => ",",
                    MathStyle::Display => ". &nbsp;",
                };
                let spoken = format!("{spoken}{pause}");
                Some(
                    SPOKEN_SENTINEL
                        .replace_all(&spoken, |caps: &Captures<'_>| self.figure_reference(&caps[1], false))
                        .into_owned(),
                )
            }
            Err(err) => {
                tracing::debug!(latex = prepared.as_str(), error = %err, "no screen reader text for math");
                None
            }
        };

        let title = if self.accessible_text {
            let hover = match &spoken {
                Some(spoken) => {
                    let without_commas = spoken.replace(',', "");
                    format!("Screenreader text: {}", WHITESPACE_RUN.replace_all(&without_commas, " "))
                }
                None => MATHML_ONLY_TITLE.to_string(),
            };
            format!(r#" title="{}""#, attribute_safe(&hover))
        } else {
            String::new()
        };

        let katex = if self.prefer_mathml {
            format!(r#"<span class="katex"><span class="katex-html"{title}>{mathml}</span></span>"#)
        } else {
            let label = spoken.as_deref().unwrap_or(UNSUPPORTED_EQUATION);
            format!(
                r#"<span class="katex"><span class="visually-hidden" aria-label="{}" role="text"></span><span class="katex-html" aria-hidden="true"{title}>{mathml}</span></span>"#,
                attribute_safe(label)
            )
        };

        match style {
            MathStyle::Inline => katex,
            MathStyle::Display => format!(r#"<span class="katex-display">{katex}</span>"#),
        }
    }
}

/// Text with math replaced by placeholders, plus the rendered expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredMath {
    pub text: String,
    rendered: Vec<String>,
}

impl DeferredMath {
    /// Puts the rendered expressions back in place of their placeholders.
    pub fn restore(&self, html: &str) -> String {
        PLACEHOLDERS
            .replace_all(html, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.rendered.get(n))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

pub fn render_math(
    html: &str,
    macros: MathMacroSet,
    figure_numbers: &FigureNumbers,
    accessible_text: bool,
) -> String {
    MathScanner::new(macros, figure_numbers)
        .with_accessible_text(accessible_text)
        .render(html)
}
