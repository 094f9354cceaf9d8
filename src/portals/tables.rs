use markup5ever_rcdom::Handle;

use super::{HookSet, Portal, RenderFn, apply_hooks, derive_instance_id, no_portals};
use crate::config::DeviceSize;
use crate::context::RenderContext;
use crate::dom::{
    Fragment, add_classes, append_child, attr, closest_ancestor, create_element, has_attr, inner_html,
    insert_before, replace, set_attr, tag_name,
};
use crate::math::html_escape;
use crate::templates::{TableTemplate, render_or_log};

const TABLE_CLASSES: &str = "table table-bordered w-100 text-center bg-white m-0";
const MARKER_PREFIX: &str = "table-";

/// A top-level table, wrapped with scroll shadows and an optional expand
/// control.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePortal {
    pub anchor_id: String,
    pub table_html: String,
    pub expandable: bool,
    /// Only meaningful when expandable.
    pub expanded: bool,
    pub shadows: bool,
    /// Portals for drop zones, entry zones and glossary terms inside the table.
    pub nested: Vec<Portal>,
}

impl TablePortal {
    pub fn render_html(&self) -> String {
        render_or_log(
            &TableTemplate {
                table: &self.table_html,
                expandable: self.expandable,
                expanded: self.expandable && self.expanded,
                shadows: self.shadows,
            },
            "table",
        )
    }

    /// Switches between the inline and the expanded view. Tables without an
    /// expand control stay inline.
    pub fn toggle_expanded(&mut self) {
        if self.expandable {
            self.expanded = !self.expanded;
        }
    }
}

struct TableMarker {
    anchor_id: String,
    html: String,
    classes: String,
}

fn is_table(element: &Handle) -> bool {
    tag_name(element).as_deref() == Some("table")
}

/// Swaps every top-level table for an empty placeholder. Tables nested in
/// other tables stay where they are and are only restyled.
pub(crate) fn hook<'a>(html: &str, cx: RenderContext<'a>, instance: &str) -> (String, RenderFn<'a>) {
    let fragment = Fragment::parse(html);
    let tables = fragment.select(is_table);
    if tables.is_empty() {
        return (html.to_string(), no_portals());
    }

    // Innermost tables first, so an outer table's recorded html already
    // includes its restyled children.
    let mut markers = Vec::new();
    for (position, table) in tables.iter().enumerate().rev() {
        if has_attr(table, "data-ignore") {
            continue;
        }
        if closest_ancestor(table, is_table).is_some() {
            add_classes(table, TABLE_CLASSES);
            set_attr(table, "data-ignore", "true");
            let wrapper = create_element("div", &[("class", "overflow-auto")]);
            insert_before(table, wrapper.clone());
            append_child(&wrapper, table.clone());
        } else {
            let anchor_id = format!("{MARKER_PREFIX}{instance}-{position}");
            markers.push(TableMarker {
                html: inner_html(table),
                classes: attr(table, "class").unwrap_or_default(),
                anchor_id: anchor_id.clone(),
            });
            replace(table, create_element("div", &[("id", &anchor_id)]));
        }
    }
    markers.reverse();

    if markers.is_empty() {
        return (fragment.to_html(), no_portals());
    }

    let instance = instance.to_string();
    let render = move |root: Option<&Fragment>| {
        if root.is_none() {
            return Vec::new();
        }
        markers
            .iter()
            .map(|marker| Portal::Table(render_table(marker, cx, &instance)))
            .collect()
    };
    (fragment.to_html(), Box::new(render))
}

fn render_table(marker: &TableMarker, cx: RenderContext<'_>, instance: &str) -> TablePortal {
    let config = cx.config;
    let expandable = marker.classes.split_whitespace().any(|class| class == "expandable")
        && !config.capabilities.mobile
        && config.device_size >= DeviceSize::Md
        && !cx.expandable_parent;

    let classes = format!("{} {TABLE_CLASSES}", marker.classes);
    let table = format!(r#"<table class="{}">{}</table>"#, html_escape(classes.trim()), marker.html);
    let inner_cx = if expandable { cx.within_expandable() } else { cx };
    let (table, render) = apply_hooks(
        &table,
        &HookSet::TABLE_COMPATIBLE,
        inner_cx,
        &derive_instance_id(instance, &marker.anchor_id),
    );

    let mut portal = TablePortal {
        anchor_id: marker.anchor_id.clone(),
        table_html: table,
        expandable,
        expanded: false,
        shadows: config.capabilities.resize_observer,
        nested: Vec::new(),
    };
    portal.nested = render(Some(&Fragment::parse(&portal.render_html())));
    portal
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::config::{Capabilities, RenderConfig};
    use crate::content::FigureNumbers;

    fn render_tables(html: &str, config: &RenderConfig) -> (String, Vec<Portal>) {
        let figures = FigureNumbers::new();
        let cx = RenderContext::new(config, &figures);
        let (rewritten, render) = hook(html, cx, "0badf00d");
        let portals = render(Some(&Fragment::parse(&rewritten)));
        (rewritten, portals)
    }

    fn table_portal(portal: &Portal) -> &TablePortal {
        match portal {
            Portal::Table(table) => table,
            other => panic!("expected a table portal, got {other:?}"),
        }
    }

    #[test]
    fn hook__should_replace_top_level_tables_with_placeholders() {
        // Given
        let html = "<p>Before</p><table class=\"data\"><tr><td>1</td></tr></table><table><tr><td>2</td></tr></table>";

        // When
        let (rewritten, portals) = render_tables(html, &RenderConfig::default());

        // Then
        assert_eq!(
            rewritten,
            r#"<p>Before</p><div id="table-0badf00d-0"></div><div id="table-0badf00d-1"></div>"#
        );
        assert_eq!(portals.len(), 2);
        let first = table_portal(&portals[0]);
        assert_eq!(first.anchor_id, "table-0badf00d-0");
        assert!(first.render_html().contains(r#"<table class="data table table-bordered w-100 text-center bg-white m-0">"#));
        assert!(first.render_html().contains("<td>1</td>"));
    }

    #[test]
    fn hook__should_restyle_nested_tables_in_place() {
        // Given
        let html = "<table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>";

        // When
        let (rewritten, portals) = render_tables(html, &RenderConfig::default());

        // Then
        assert_eq!(rewritten, r#"<div id="table-0badf00d-0"></div>"#);
        assert_eq!(portals.len(), 1);
        let outer = table_portal(&portals[0]);
        assert!(outer.render_html().contains(
            r#"<div class="overflow-auto"><table class="table table-bordered w-100 text-center bg-white m-0" data-ignore="true">"#
        ));
    }

    #[test]
    fn hook__should_leave_html_without_tables_untouched() {
        let (rewritten, portals) = render_tables("<p>No tables</p>", &RenderConfig::default());
        assert_eq!(rewritten, "<p>No tables</p>");
        assert!(portals.is_empty());
    }

    #[test]
    fn render_table__should_offer_expansion_on_large_screens() {
        // Given
        let html = r#"<table class="expandable"><tr><td>wide</td></tr></table>"#;

        // When
        let (_, portals) = render_tables(html, &RenderConfig::default());

        // Then
        let table = table_portal(&portals[0]);
        assert!(table.render_html().contains("expand-outer"));
        assert!(table.render_html().contains(r#"aria-label="Expand content""#));
    }

    #[test]
    fn render_table__should_not_offer_expansion_on_small_or_mobile_devices() {
        // Given
        let html = r#"<table class="expandable"><tr><td>wide</td></tr></table>"#;
        let small = RenderConfig {
            device_size: DeviceSize::Sm,
            ..RenderConfig::default()
        };
        let mobile = RenderConfig {
            capabilities: Capabilities {
                mobile: true,
                ..Capabilities::default()
            },
            ..RenderConfig::default()
        };

        // When
        let (_, small_portals) = render_tables(html, &small);
        let (_, mobile_portals) = render_tables(html, &mobile);

        // Then
        assert!(!table_portal(&small_portals[0]).render_html().contains("Expand content"));
        assert!(!table_portal(&mobile_portals[0]).render_html().contains("Expand content"));
    }

    #[test]
    fn render_table__should_not_offer_expansion_inside_expandable_parent() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let cx = RenderContext::new(&config, &figures).within_expandable();
        let html = r#"<table class="expandable"><tr><td>wide</td></tr></table>"#;

        // When
        let (rewritten, render) = hook(html, cx, "0badf00d");
        let portals = render(Some(&Fragment::parse(&rewritten)));

        // Then
        assert!(!table_portal(&portals[0]).render_html().contains("Expand content"));
    }

    #[test]
    fn render_table__should_draw_scroll_shadows_only_with_resize_observer() {
        // Given
        let html = "<table><tr><td>x</td></tr></table>";
        let without = RenderConfig {
            capabilities: Capabilities {
                resize_observer: false,
                ..Capabilities::default()
            },
            ..RenderConfig::default()
        };

        // When
        let (_, with_portals) = render_tables(html, &RenderConfig::default());
        let (_, without_portals) = render_tables(html, &without);

        // Then
        assert!(table_portal(&with_portals[0]).render_html().contains("scroll-shadow"));
        assert!(!table_portal(&without_portals[0]).render_html().contains("scroll-shadow"));
    }

    #[test]
    fn hook__should_not_render_portals_before_mounting() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let cx = RenderContext::new(&config, &figures);

        // When
        let (_, render) = hook("<table><tr><td>x</td></tr></table>", cx, "0badf00d");

        // Then
        assert!(render(None).is_empty());
    }

    #[test]
    fn toggle_expanded__should_switch_label_and_spacing() {
        // Given
        let html = r#"<table class="expandable"><tr><td>wide</td></tr></table>"#;
        let (_, portals) = render_tables(html, &RenderConfig::default());
        let mut table = table_portal(&portals[0]).clone();
        let collapsed = table.render_html();

        // When
        table.toggle_expanded();
        let expanded = table.render_html();

        // Then
        assert!(collapsed.contains(" Expand</span>"));
        assert!(collapsed.contains("mb-4 overflow-auto"));
        assert!(!collapsed.contains("isaac-expand-bg"));
        assert!(expanded.contains(" Close</span>"));
        assert!(expanded.contains("isaac-expand-bg"));
        assert!(!expanded.contains("mb-4"));
        assert!(expanded.contains(r#"aria-expanded="true""#));
    }

    #[test]
    fn toggle_expanded__should_ignore_tables_without_expand_control() {
        // Given
        let (_, portals) = render_tables("<table><tr><td>x</td></tr></table>", &RenderConfig::default());
        let mut table = table_portal(&portals[0]).clone();

        // When
        table.toggle_expanded();

        // Then
        assert!(!table.expanded);
        assert!(!table.render_html().contains("isaac-expand-bg"));
        assert!(table.render_html().contains("mb-4"));
    }
}
