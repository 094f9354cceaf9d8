use askama::Template;

use crate::portals::{DropZoneItem, DropdownOption, Feedback};

#[derive(Template)]
#[template(path = "container.html")]
pub(crate) struct ContainerTemplate<'a> {
    pub(crate) tag: &'a str,
    pub(crate) class_name: Option<&'a str>,
    pub(crate) html: &'a str,
}

#[derive(Template)]
#[template(path = "table.html")]
pub(crate) struct TableTemplate<'a> {
    pub(crate) table: &'a str,
    pub(crate) expandable: bool,
    pub(crate) expanded: bool,
    pub(crate) shadows: bool,
}

#[derive(Template)]
#[template(path = "glossary_term.html")]
pub(crate) struct GlossaryTermTemplate<'a> {
    pub(crate) value: &'a str,
    pub(crate) link: Option<&'a str>,
    pub(crate) explanation: &'a str,
}

#[derive(Template)]
#[template(path = "tooltip.html")]
pub(crate) struct TooltipTemplate<'a> {
    pub(crate) target: &'a str,
    pub(crate) html: &'a str,
}

#[derive(Template)]
#[template(path = "drop_zone.html")]
pub(crate) struct DropZoneTemplate<'a> {
    pub(crate) droppable_id: &'a str,
    pub(crate) item: Option<&'a DropZoneItem>,
    pub(crate) border: bool,
    pub(crate) readonly: bool,
    pub(crate) width: &'a str,
    pub(crate) height: &'a str,
    pub(crate) feedback: Option<Feedback>,
    /// Render as a dropdown instead of a drop target.
    pub(crate) compact: bool,
    pub(crate) padding: &'a str,
    pub(crate) ada: bool,
    pub(crate) options: &'a [DropdownOption],
}

pub(crate) struct EntryOption<'a> {
    pub(crate) value: &'a str,
    pub(crate) label: &'a str,
    pub(crate) selected: bool,
}

#[derive(Template)]
#[template(path = "entry_zone.html")]
pub(crate) struct EntryZoneTemplate<'a> {
    pub(crate) classes: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) input_id: &'a str,
    pub(crate) select: bool,
    pub(crate) numeric: bool,
    pub(crate) value: &'a str,
    pub(crate) style: &'a str,
    pub(crate) readonly: bool,
    pub(crate) options: Vec<EntryOption<'a>>,
}

#[derive(Template)]
#[template(path = "document.html")]
pub(crate) struct DocumentTemplate<'a> {
    pub(crate) title: &'a str,
    pub(crate) content: &'a str,
}

/// A standalone HTML page around already rendered content.
pub fn document(title: &str, content: &str) -> String {
    render_or_log(&DocumentTemplate { title, content }, "document")
}

/// Renders `template`, logging and returning an empty string on failure.
pub(crate) fn render_or_log(template: &impl Template, what: &str) -> String {
    template.render().unwrap_or_else(|err| {
        tracing::error!(error = %err, what, "failed to render template");
        String::new()
    })
}
