//! Entry zones of inline questions, written into content as
//! `[inline-question:<id>]`.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{Portal, RenderFn, no_portals};
use crate::context::RenderContext;
use crate::dom::{Fragment, attr, has_attr, set_attr};
use crate::inline_questions::{InlineEntry, InlineQuestionContext, InlineQuestionType};
use crate::math::html_escape;
use crate::templates::{EntryOption, EntryZoneTemplate, render_or_log};

/// `[inline-question:id]`, `[inline-question:id | w-50h-20]` or
/// `[inline-question:id class="a b"]`. Quotes may already be escaped by the
/// markdown renderer.
static INLINE_QUESTION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[inline-question:(?<id>[a-zA-Z0-9_\-]+)(?<params> *\| *(?<width>w-\d+)?(?<height>h-\d+)?| +class=(?:["']|&apos;|&#39;|&[rl]?quot;)(?<classes>[a-zA-Z0-9 _\-]+?)(?:["']|&apos;|&#39;|&[rl]?quot;))?\]"#,
    )
    .expect("valid inline question regex")
});

const MARKER_PREFIX: &str = "inline-question-";
const ANCHOR_PREFIX: &str = "inline-entry-";

/// Replaces inline question tokens with marker spans.
pub fn render_inline_question_tokens(html: &str) -> String {
    INLINE_QUESTION_TOKEN
        .replace_all(html, |caps: &Captures<'_>| {
            let mut dataset = String::new();
            if let Some(width) = caps.name("width") {
                dataset.push_str(&format!(r#" data-width="{}""#, &width.as_str()[2..]));
            }
            if let Some(height) = caps.name("height") {
                dataset.push_str(&format!(r#" data-height="{}""#, &height.as_str()[2..]));
            }
            if let Some(classes) = caps.name("classes") {
                dataset.push_str(&format!(r#" data-classes="{}""#, classes.as_str().trim()));
            }
            format!(
                r#"<span id="{MARKER_PREFIX}{}" class="inline-outer-container"{dataset}></span>"#,
                &caps["id"]
            )
        })
        .into_owned()
}

struct EntryZoneMarker {
    anchor_id: String,
    input_id: String,
    width: Option<String>,
    height: Option<String>,
    classes: Option<String>,
}

/// Claims every unclaimed entry zone marker in `html`. Does nothing outside an
/// inline region.
pub(crate) fn hook<'a>(html: &str, cx: RenderContext<'a>, instance: &str) -> (String, RenderFn<'a>) {
    let Some(questions) = cx.inline_questions else {
        return (html.to_string(), no_portals());
    };

    let fragment = Fragment::parse(html);
    let elements = fragment.select(|element| {
        attr(element, "id").is_some_and(|id| id.starts_with(MARKER_PREFIX)) && !has_attr(element, "data-instance")
    });
    if elements.is_empty() {
        return (html.to_string(), no_portals());
    }

    let mut markers = Vec::with_capacity(elements.len());
    for (position, element) in elements.iter().enumerate() {
        let Some(id) = attr(element, "id") else {
            continue;
        };
        let anchor_id = format!("{ANCHOR_PREFIX}{instance}-{position}");
        set_attr(element, "id", &anchor_id);
        set_attr(element, "data-instance", instance);
        markers.push(EntryZoneMarker {
            anchor_id,
            input_id: format!("{}-input", id.replace('_', "-")),
            width: attr(element, "data-width"),
            height: attr(element, "data-height"),
            classes: attr(element, "data-classes"),
        });
    }

    let render = move |root: Option<&Fragment>| {
        if root.is_none() {
            return Vec::new();
        }
        markers
            .iter()
            .filter_map(|marker| InlineEntryZonePortal::mount(marker, questions))
            .map(Portal::EntryZone)
            .collect()
    };
    (fragment.to_html(), Box::new(render))
}

/// An input (or a select, for multiple choice) bound to one inline question.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineEntryZonePortal {
    pub anchor_id: String,
    pub input_id: String,
    pub entry: InlineEntry,
    /// Size in pixels.
    pub width: Option<String>,
    pub height: Option<String>,
    /// Extra classes written in the content.
    pub classes: Option<String>,
}

impl InlineEntryZonePortal {
    fn mount(marker: &EntryZoneMarker, questions: &dyn InlineQuestionContext) -> Option<Self> {
        let Some(entry) = questions.entry(&marker.input_id) else {
            tracing::debug!(input = marker.input_id.as_str(), "no inline question for entry zone");
            return None;
        };
        Some(Self {
            anchor_id: marker.anchor_id.clone(),
            input_id: marker.input_id.clone(),
            entry,
            width: marker.width.clone(),
            height: marker.height.clone(),
            classes: marker.classes.clone(),
        })
    }

    pub fn render_html(&self) -> String {
        let numeric = self.entry.kind == InlineQuestionType::Numeric;
        let classes = [
            "inline-entry-zone",
            if numeric { "d-flex align-items-center inline-numeric-container" } else { "" },
            self.entry.correctness.css_class(),
            self.classes.as_deref().unwrap_or_default(),
        ]
        .iter()
        .filter(|class| !class.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
        let style = [("width", &self.width), ("height", &self.height)]
            .iter()
            .filter_map(|(name, pixels)| pixels.as_deref().map(|pixels| format!("{name}: {}px", html_escape(pixels))))
            .collect::<Vec<_>>()
            .join("; ");
        let value = self.entry.value.as_deref().unwrap_or_default();
        let options = self
            .entry
            .choices
            .iter()
            .map(|choice| EntryOption {
                value: choice.value.as_str(),
                label: if choice.label.is_empty() { choice.value.as_str() } else { choice.label.as_str() },
                selected: choice.value == value,
            })
            .collect();

        render_or_log(
            &EntryZoneTemplate {
                classes: &classes,
                question_id: &self.entry.question_id,
                input_id: &self.input_id,
                select: self.entry.kind == InlineQuestionType::MultiChoice,
                numeric,
                value,
                style: &style,
                readonly: self.entry.readonly,
                options,
            },
            "entry zone",
        )
    }

    /// Records `value` as the current attempt.
    pub fn enter(&self, questions: &dyn InlineQuestionContext, value: &str) {
        if self.entry.readonly {
            return;
        }
        questions.update_attempt(&self.input_id, value);
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::content::FigureNumbers;
    use crate::inline_questions::{Correctness, InlineChoice, InlineQuestion, InlineRegion};

    fn region() -> InlineRegion {
        InlineRegion::new()
            .with_question(
                "inline-question-speed-1-input",
                InlineQuestion::new("q|speed", InlineQuestionType::Numeric).with_best_attempt("4.2", true),
            )
            .with_question(
                "inline-question-colour-input",
                InlineQuestion::new("q|colour", InlineQuestionType::MultiChoice)
                    .with_choices(vec![InlineChoice::new("red", "Red"), InlineChoice::new("blue", "Blue")]),
            )
    }

    fn entry_zones(portals: &[Portal]) -> Vec<&InlineEntryZonePortal> {
        portals
            .iter()
            .map(|portal| match portal {
                Portal::EntryZone(zone) => zone,
                other => panic!("expected an entry zone portal, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn render_inline_question_tokens__should_create_markers() {
        // Given
        let html = r#"<p>v = [inline-question:speed_1 | w-50h-20] and [inline-question:colour class=&quot;wide red&quot;]</p>"#;

        // When
        let rendered = render_inline_question_tokens(html);

        // Then
        assert_eq!(
            rendered,
            r#"<p>v = <span id="inline-question-speed_1" class="inline-outer-container" data-width="50" data-height="20"></span> and <span id="inline-question-colour" class="inline-outer-container" data-classes="wide red"></span></p>"#
        );
    }

    #[test]
    fn hook__should_do_nothing_outside_inline_regions() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let cx = RenderContext::new(&config, &figures);
        let html = render_inline_question_tokens("[inline-question:speed_1]");

        // When
        let (rewritten, render) = hook(&html, cx, "0badf00d");

        // Then
        assert_eq!(rewritten, html);
        assert!(render(None).is_empty());
    }

    #[test]
    fn hook__should_claim_markers_and_look_up_questions_by_input_id() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let region = region();
        let cx = RenderContext::new(&config, &figures).with_inline_questions(&region);
        let html = render_inline_question_tokens("<p>[inline-question:speed_1|w-80] [inline-question:unknown]</p>");

        // When
        let (rewritten, render) = hook(&html, cx, "0badf00d");
        let portals = render(Some(&Fragment::parse(&rewritten)));

        // Then
        assert!(rewritten.contains(r#"id="inline-entry-0badf00d-0""#));
        assert!(rewritten.contains(r#"id="inline-entry-0badf00d-1""#));
        let zones = entry_zones(&portals);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].input_id, "inline-question-speed-1-input");
        assert_eq!(zones[0].entry.correctness, Correctness::Correct);
        let html = zones[0].render_html();
        assert!(html.contains("inline-numeric-container"));
        assert!(html.contains("is-valid"));
        assert!(html.contains(r#"value="4.2""#));
        assert!(html.contains("width: 80px"));
    }

    #[test]
    fn render_html__should_offer_choices_for_multiple_choice() {
        // Given
        let region = region();
        region.update_attempt("inline-question-colour-input", "blue");
        let zone = InlineEntryZonePortal {
            anchor_id: "inline-entry-0badf00d-0".to_string(),
            input_id: "inline-question-colour-input".to_string(),
            entry: region.entry("inline-question-colour-input").expect("known entry"),
            width: None,
            height: None,
            classes: Some("wide".to_string()),
        };

        // When
        let html = zone.render_html();

        // Then
        assert!(html.contains("<select"));
        assert!(html.contains(r#"<option value="blue" selected>Blue</option>"#));
        assert!(html.contains(r#"<option value="red">Red</option>"#));
        assert!(html.contains("inline-entry-zone wide"));
        assert!(!html.contains("style="));
    }

    #[test]
    fn enter__should_update_the_attempt() {
        // Given
        let region = region();
        let zone = InlineEntryZonePortal {
            anchor_id: "inline-entry-0badf00d-0".to_string(),
            input_id: "inline-question-speed-1-input".to_string(),
            entry: region.entry("inline-question-speed-1-input").expect("known entry"),
            width: None,
            height: None,
            classes: None,
        };

        // When
        zone.enter(&region, "9.8");

        // Then
        let entry = region.entry("inline-question-speed-1-input").expect("known entry");
        assert_eq!(entry.value.as_deref(), Some("9.8"));
        assert_eq!(entry.correctness, Correctness::NotSubmitted);
        assert_eq!(region.modified_question_ids(), vec!["q|speed".to_string()]);
    }
}
