//! Interactive islands inside rendered content.
//!
//! A hook rewrites the HTML string, leaving an empty anchor element with a
//! unique id wherever a component belongs, and returns a render function.
//! Once the HTML has been injected into its container the render function is
//! called against the parsed container and yields the portals to mount.

pub mod drop_zones;
pub mod entry_zones;
pub mod glossary;
pub mod tables;

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::context::RenderContext;
use crate::dom::{Fragment, set_inner_html};
use crate::templates::{TooltipTemplate, render_or_log};

pub(crate) use drop_zones::Feedback;
pub use drop_zones::{
    DropZoneItem, DropZonePortal, DropdownOption, render_dnd_drop_zone_tokens, render_drop_zone_tokens,
};
pub use entry_zones::{InlineEntryZonePortal, render_inline_question_tokens};
pub use glossary::GlossaryTermPortal;
pub use tables::TablePortal;

/// Produces the portals for one hook pass. Called with `None` before the
/// container exists, in which case only anchorless portals are returned.
pub type RenderFn<'a> = Box<dyn Fn(Option<&Fragment>) -> Vec<Portal> + 'a>;

pub fn no_portals<'a>() -> RenderFn<'a> {
    Box::new(|_| Vec::new())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Portal {
    Table(TablePortal),
    GlossaryTerm(GlossaryTermPortal),
    DropZone(DropZonePortal),
    EntryZone(InlineEntryZonePortal),
    Tooltip(Tooltip),
}

impl Portal {
    /// Id of the element the portal mounts into, or the tooltip's target.
    pub fn anchor_id(&self) -> &str {
        match self {
            Portal::Table(table) => &table.anchor_id,
            Portal::GlossaryTerm(term) => &term.anchor_id,
            Portal::DropZone(zone) => &zone.anchor_id,
            Portal::EntryZone(zone) => &zone.anchor_id,
            Portal::Tooltip(tooltip) => &tooltip.target,
        }
    }

    pub fn render_html(&self) -> String {
        match self {
            Portal::Table(table) => table.render_html(),
            Portal::GlossaryTerm(term) => term.render_html(),
            Portal::DropZone(zone) => zone.render_html(),
            Portal::EntryZone(zone) => zone.render_html(),
            Portal::Tooltip(tooltip) => tooltip.render_html(),
        }
    }
}

/// Hover text attached to the element with id `target`. Rendered after the
/// container rather than inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub target: String,
    pub html: String,
}

impl Tooltip {
    pub fn render_html(&self) -> String {
        render_or_log(
            &TooltipTemplate {
                target: &self.target,
                html: &self.html,
            },
            "tooltip",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    DropZones,
    Tables,
    EntryZones,
    Glossary,
}

impl Hook {
    pub fn apply<'a>(self, html: &str, cx: RenderContext<'a>, instance: &str) -> (String, RenderFn<'a>) {
        match self {
            Hook::DropZones => drop_zones::hook(html, cx, instance),
            Hook::Tables => tables::hook(html, cx, instance),
            Hook::EntryZones => entry_zones::hook(html, cx, instance),
            Hook::Glossary => glossary::hook(html, cx, instance),
        }
    }
}

/// A fixed, ordered list of hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookSet(&'static [Hook]);

impl HookSet {
    pub const PORTAL_HOOKS: HookSet = HookSet(&[Hook::DropZones, Hook::Tables, Hook::EntryZones, Hook::Glossary]);

    /// Hooks allowed inside a table portal.
    pub const TABLE_COMPATIBLE: HookSet = HookSet(&[Hook::DropZones, Hook::EntryZones, Hook::Glossary]);

    pub fn hooks(&self) -> &'static [Hook] {
        self.0
    }
}

/// Runs every hook of `hooks` over `html`, left to right. The combined render
/// function returns the portals of all hooks, in hook order.
pub fn apply_hooks<'a>(
    html: &str,
    hooks: &HookSet,
    cx: RenderContext<'a>,
    instance: &str,
) -> (String, RenderFn<'a>) {
    let mut html = html.to_string();
    let mut renders = Vec::with_capacity(hooks.hooks().len());
    for hook in hooks.hooks() {
        let (next, render) = hook.apply(&html, cx, instance);
        html = next;
        renders.push(render);
    }
    let render = move |root: Option<&Fragment>| renders.iter().flat_map(|render| render(root)).collect();
    (html, Box::new(render))
}

/// Mounts `portals` into their anchors under `root` and returns the tooltips
/// to emit after the container.
///
/// Anchors may live inside another portal's markup, so mounting repeats until
/// no further anchor turns up. Portals whose anchor never appears are skipped.
pub fn mount_portals(root: &Fragment, portals: Vec<Portal>) -> Vec<Tooltip> {
    let mut tooltips = Vec::new();
    let mut pending = Vec::new();
    for portal in portals {
        match portal {
            Portal::Tooltip(tooltip) => tooltips.push(tooltip),
            other => pending.push(other),
        }
    }

    while !pending.is_empty() {
        let before = pending.len();
        let mut waiting = Vec::new();
        for portal in pending {
            match mount_one(root, portal) {
                Ok(nested) => tooltips.extend(nested),
                Err(portal) => waiting.push(portal),
            }
        }
        pending = waiting;
        if pending.len() == before {
            break;
        }
    }

    for portal in &pending {
        tracing::debug!(anchor = portal.anchor_id(), "portal anchor not found, skipping");
    }
    tooltips
}

fn mount_one(root: &Fragment, portal: Portal) -> Result<Vec<Tooltip>, Portal> {
    let Some(anchor) = root.find_by_id(portal.anchor_id()) else {
        return Err(portal);
    };
    set_inner_html(&anchor, &portal.render_html());
    Ok(match portal {
        Portal::Table(table) => mount_portals(root, table.nested),
        Portal::GlossaryTerm(term) => term.tooltips,
        Portal::DropZone(_) | Portal::EntryZone(_) | Portal::Tooltip(_) => Vec::new(),
    })
}

/// Eight hex digits identifying one render instance.
pub fn new_instance_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// Instance id for content rendered inside `parent`, stable for a given salt.
pub fn derive_instance_id(parent: &str, salt: &str) -> String {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    salt.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}
