//! Cloze drop zones written inline in question content.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::{Portal, RenderFn, no_portals};
use crate::cloze::{ClozeItem, DropLocation, DropRegionContext, DropResult};
use crate::config::{DeviceSize, Site};
use crate::context::RenderContext;
use crate::dom::{Fragment, attr, has_attr, has_class, set_attr};
use crate::math::html_escape;
use crate::templates::{DropZoneTemplate, render_or_log};
use crate::trusted::TrustedContent;

/// `[drop-zone]`, optionally with parameters: `[drop-zone|i-2w-50h-30]`.
pub(crate) static DROP_ZONE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[drop-zone(?<params>\|(?<index>i-\d+?)?(?<width>w-\d+?)?(?<height>h-\d+?)?)?\]")
        .expect("valid drop zone regex")
});

/// `[drop-zone:id]` of drag and drop questions, optionally sized:
/// `[drop-zone:id|w-50h-30]`.
static DND_DROP_ZONE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[drop-zone:(?<id>[a-zA-Z0-9_\-]+)(?<params>\|(?<width>w-\d+?)?(?<height>h-\d+?)?)?\]")
        .expect("valid dnd drop zone regex")
});

const MARKER_PREFIX: &str = "drop-region-";
const DND_CLASS: &str = "dnd-drop-zone";
const DROPPABLE_PREFIX: &str = "drop-zone-";
const DEFAULT_WIDTH: &str = "100";

fn param<'t>(caps: &Captures<'t>, name: &str, prefix: &str) -> Option<&'t str> {
    caps.name(name).map(|m| &m.as_str()[prefix.len()..])
}

/// Replaces drop zone tokens with marker spans.
///
/// Zones number from zero in order of appearance. A zone may claim an index
/// with `i-N` (if `N` is below the number of zones); automatic numbering skips
/// claimed indices. When several zones claim the same index only the last one
/// keeps it.
pub fn render_drop_zone_tokens(text: &str) -> String {
    let manual_indices: Vec<Option<usize>> = DROP_ZONE_TOKEN
        .captures_iter(text)
        .map(|caps| param(&caps, "index", "i-").and_then(|index| index.parse().ok()))
        .collect();
    if manual_indices.is_empty() {
        return text.to_string();
    }
    let zone_count = manual_indices.len();

    let mut reserved: HashMap<usize, usize> = HashMap::new();
    for index in manual_indices.iter().flatten().filter(|index| **index < zone_count) {
        *reserved.entry(*index).or_default() += 1;
    }

    let mut next_free = 0;
    DROP_ZONE_TOKEN
        .replace_all(text, |caps: &Captures<'_>| {
            let manual = param(caps, "index", "i-")
                .and_then(|index| index.parse::<usize>().ok())
                .filter(|index| *index < zone_count);
            let manual = match manual {
                Some(index) => match reserved.get_mut(&index) {
                    Some(claims) if *claims > 1 => {
                        *claims -= 1;
                        None
                    }
                    _ => Some(index),
                },
                None => None,
            };
            let index = manual.unwrap_or_else(|| {
                while reserved.contains_key(&next_free) {
                    next_free += 1;
                }
                next_free += 1;
                next_free - 1
            });

            let width = param(caps, "width", "w-").unwrap_or(DEFAULT_WIDTH);
            let height = param(caps, "height", "h-")
                .map(|height| format!(r#" data-height="{height}""#))
                .unwrap_or_default();
            format!(
                r#"<span data-index="{index}" id="{MARKER_PREFIX}{index}" data-width="{width}"{height} class="d-inline-block"></span>"#
            )
        })
        .into_owned()
}

/// Replaces drag and drop zone tokens with sized spans. These belong to drag
/// and drop questions and are never claimed by the cloze hook.
pub fn render_dnd_drop_zone_tokens(html: &str) -> String {
    DND_DROP_ZONE_TOKEN
        .replace_all(html, |caps: &Captures<'_>| {
            let width = param(caps, "width", "w-").unwrap_or(DEFAULT_WIDTH);
            let height = param(caps, "height", "h-").map_or_else(|| "auto".to_string(), |height| format!("{height}px"));
            let id = &caps["id"];
            format!(
                r#"<span data-index="{id}" id="{MARKER_PREFIX}{id}" class="{DND_CLASS}" style="min-width: {width}px; min-height: {height}"></span>"#
            )
        })
        .into_owned()
}

struct DropZoneMarker {
    anchor_id: String,
    index: usize,
    width: Option<String>,
    height: Option<String>,
}

/// Claims every unclaimed drop zone marker in `html`. Does nothing outside a
/// cloze question.
pub(crate) fn hook<'a>(html: &str, cx: RenderContext<'a>, instance: &str) -> (String, RenderFn<'a>) {
    let Some(regions) = cx.drop_regions else {
        return (html.to_string(), no_portals());
    };

    let fragment = Fragment::parse(html);
    let elements = fragment.select(|element| {
        attr(element, "id").is_some_and(|id| id.starts_with(MARKER_PREFIX))
            && !has_attr(element, "data-instance")
            && !has_class(element, DND_CLASS)
    });
    if elements.is_empty() {
        return (html.to_string(), no_portals());
    }

    let mut markers = Vec::with_capacity(elements.len());
    for (position, element) in elements.iter().enumerate() {
        let Some(index) = attr(element, "data-index").and_then(|index| index.parse::<usize>().ok()) else {
            tracing::error!(
                id = attr(element, "id").unwrap_or_default(),
                "drop zone element has an invalid index"
            );
            continue;
        };
        let anchor_id = format!("{MARKER_PREFIX}{instance}-{position}");
        set_attr(element, "id", &anchor_id);
        set_attr(element, "data-instance", instance);
        markers.push(DropZoneMarker {
            anchor_id,
            index,
            width: attr(element, "data-width"),
            height: attr(element, "data-height"),
        });
    }

    let render = move |root: Option<&Fragment>| {
        if root.is_none() {
            return Vec::new();
        }
        markers
            .iter()
            .map(|marker| Portal::DropZone(DropZonePortal::mount(marker, regions, cx)))
            .collect()
    };
    (fragment.to_html(), Box::new(render))
}

/// The item currently sitting in a drop zone.
#[derive(Debug, Clone, PartialEq)]
pub struct DropZoneItem {
    pub id: String,
    pub draggable_id: String,
    pub label: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropZonePortal {
    pub anchor_id: String,
    pub droppable_id: String,
    pub index: usize,
    pub item: Option<DropZoneItem>,
    pub border: bool,
    pub readonly: bool,
    /// Minimum size in pixels while empty.
    pub width: Option<String>,
    pub height: Option<String>,
    /// Marking of the placed item, once submitted.
    pub correct: Option<bool>,
    /// Extra small screens pick items from a dropdown rather than dragging.
    pub compact: bool,
    pub site: Site,
    /// Dropdown entries, filled only when compact.
    pub options: Vec<DropdownOption>,
}

/// An item offered by a compact drop zone's dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownOption {
    pub id: String,
    pub html: String,
    /// False while the item sits in another zone.
    pub available: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Feedback {
    pub(crate) class: &'static str,
    pub(crate) mark: &'static str,
}

impl Feedback {
    fn for_marking(correct: bool) -> Self {
        if correct {
            Self {
                class: "correct",
                mark: "\u{2714}",
            }
        } else {
            Self {
                class: "incorrect",
                mark: "\u{2718}",
            }
        }
    }
}

impl DropZonePortal {
    fn mount(marker: &DropZoneMarker, regions: &dyn DropRegionContext, cx: RenderContext<'_>) -> Self {
        let droppable_id = format!("{DROPPABLE_PREFIX}{}", marker.index + 1);
        regions.register(&droppable_id, marker.index);

        // Items never contain drop zones of their own.
        let item_cx = RenderContext {
            drop_regions: None,
            ..cx.nested()
        };
        let render_item = |item: &ClozeItem| TrustedContent::new(item_cx).span_level(true).render_html(&item.content());

        let item = regions.inline_drop_value(&droppable_id).map(|item| {
            let html = render_item(&item);
            DropZoneItem {
                draggable_id: item.draggable_id().to_string(),
                label: item
                    .alt_text
                    .clone()
                    .unwrap_or_else(|| item.value.clone()),
                id: item.id,
                html,
            }
        });

        let correct = regions
            .validation(&droppable_id)
            .filter(|validation| item.as_ref().is_some_and(|item| item.id == validation.item_id))
            .map(|validation| validation.correct);
        let compact = cx.config.device_size == DeviceSize::Xs;
        let options = if compact {
            regions
                .items()
                .iter()
                .map(|option| DropdownOption {
                    id: option.id.clone(),
                    html: render_item(option),
                    available: regions.available(option),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            anchor_id: marker.anchor_id.clone(),
            border: regions.border(&droppable_id),
            readonly: regions.readonly(),
            droppable_id,
            index: marker.index,
            item,
            width: marker.width.clone(),
            height: marker.height.clone(),
            correct,
            compact,
            site: cx.config.site,
            options,
        }
    }

    pub fn render_html(&self) -> String {
        let size = |value: &Option<String>| match (&self.item, value) {
            (None, Some(pixels)) => format!("{}px", html_escape(pixels)),
            _ => "auto".to_string(),
        };
        let width = if self.item.is_none() && self.width.is_none() {
            format!("{DEFAULT_WIDTH}px")
        } else {
            size(&self.width)
        };
        render_or_log(
            &DropZoneTemplate {
                droppable_id: &self.droppable_id,
                item: self.item.as_ref(),
                border: self.border,
                readonly: self.readonly,
                width: &width,
                height: &size(&self.height),
                feedback: self.correct.map(Feedback::for_marking),
                compact: self.compact,
                padding: match self.site {
                    Site::Phy => "p-1",
                    Site::Ada => "p-0",
                },
                ada: self.site == Site::Ada,
                options: &self.options,
            },
            "drop zone",
        )
    }

    /// Picks an item from the dropdown; `None` clears the zone.
    pub fn select(&self, regions: &dyn DropRegionContext, item: Option<&ClozeItem>) {
        match item {
            None => self.clear(regions),
            Some(item) if regions.available(item) => self.place(regions, item),
            Some(item) => tracing::debug!(item = item.id.as_str(), "item is already placed in another zone"),
        }
    }

    /// Drops `item` into this zone.
    pub fn place(&self, regions: &dyn DropRegionContext, item: &ClozeItem) {
        if self.readonly {
            return;
        }
        regions.update_attempt(DropResult {
            draggable_id: item.draggable_id().to_string(),
            source: None,
            destination: Some(DropLocation::new(&self.droppable_id, 0)),
        });
    }

    /// Removes the placed item, if any.
    pub fn clear(&self, regions: &dyn DropRegionContext) {
        let Some(item) = &self.item else {
            return;
        };
        if self.readonly {
            return;
        }
        regions.update_attempt(DropResult {
            draggable_id: item.draggable_id.clone(),
            source: Some(DropLocation::new(&self.droppable_id, 0)),
            destination: None,
        });
    }

    /// Moves the placed item into `target`.
    pub fn move_to(&self, regions: &dyn DropRegionContext, target: &DropZonePortal) {
        let Some(item) = &self.item else {
            return;
        };
        if self.readonly {
            return;
        }
        regions.update_attempt(DropResult {
            draggable_id: item.draggable_id.clone(),
            source: Some(DropLocation::new(&self.droppable_id, 0)),
            destination: Some(DropLocation::new(&target.droppable_id, 0)),
        });
    }
}
