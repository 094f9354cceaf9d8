//! Parse an HTML fragment into a detached tree, query and rewrite it, and
//! serialise it back to a string.

use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed fragment. The fragment's content lives under [`Fragment::root`].
pub struct Fragment {
    _dom: RcDom,
    root: Handle,
}

impl Fragment {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        let root = find_element(&dom.document, "body").unwrap_or_else(|| dom.document.clone());
        Self { _dom: dom, root }
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// Every element under the root, in document order.
    pub fn elements(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_elements(&self.root, &mut found);
        found
    }

    pub fn select(&self, predicate: impl Fn(&Handle) -> bool) -> Vec<Handle> {
        self.elements().into_iter().filter(|handle| predicate(handle)).collect()
    }

    /// The element with `id`, provided exactly one carries it.
    pub fn find_by_id(&self, id: &str) -> Option<Handle> {
        let mut matches = self.select(|handle| attr(handle, "id").as_deref() == Some(id));
        match matches.len() {
            1 => matches.pop(),
            0 => None,
            count => {
                tracing::debug!(id, count, "element id is not unique");
                None
            }
        }
    }

    pub fn to_html(&self) -> String {
        inner_html(&self.root)
    }
}

fn find_element(node: &Handle, name: &str) -> Option<Handle> {
    if tag_name(node).as_deref() == Some(name) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, name))
}

fn collect_elements(node: &Handle, found: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) {
            found.push(child.clone());
        }
        collect_elements(child, found);
    }
}

pub fn tag_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn attr(handle: &Handle, name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.local.as_ref() == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn has_attr(handle: &Handle, name: &str) -> bool {
    attr(handle, name).is_some()
}

fn attribute_name(name: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(name))
}

pub fn set_attr(handle: &Handle, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &handle.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    match attrs.iter_mut().find(|attr| attr.name.local.as_ref() == name) {
        Some(existing) => existing.value = StrTendril::from_slice(value),
        None => attrs.push(Attribute {
            name: attribute_name(name),
            value: StrTendril::from_slice(value),
        }),
    }
}

pub fn has_class(handle: &Handle, class: &str) -> bool {
    attr(handle, "class").is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// Appends `classes` to the element's class list, skipping ones already there.
pub fn add_classes(handle: &Handle, classes: &str) {
    let mut current: Vec<String> = attr(handle, "class")
        .map(|existing| existing.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    for class in classes.split_whitespace() {
        if !current.iter().any(|c| c == class) {
            current.push(class.to_string());
        }
    }
    set_attr(handle, "class", &current.join(" "));
}

pub fn parent_of(handle: &Handle) -> Option<Handle> {
    let weak = handle.parent.take();
    let parent = weak.as_ref().and_then(|weak| weak.upgrade());
    handle.parent.set(weak);
    parent
}

pub fn closest_ancestor(handle: &Handle, predicate: impl Fn(&Handle) -> bool) -> Option<Handle> {
    let mut current = parent_of(handle);
    while let Some(node) = current {
        if predicate(&node) {
            return Some(node);
        }
        current = parent_of(&node);
    }
    None
}

pub fn create_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: attribute_name(name),
            value: StrTendril::from_slice(value),
        })
        .collect();
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

pub fn append_child(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Inserts `node` immediately before `reference` under the same parent.
pub fn insert_before(reference: &Handle, node: Handle) {
    let Some(parent) = parent_of(reference) else {
        return;
    };
    detach(&node);
    let mut children = parent.children.borrow_mut();
    let position = children
        .iter()
        .position(|child| Rc::ptr_eq(child, reference))
        .unwrap_or(children.len());
    node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(position, node);
}

pub fn detach(handle: &Handle) {
    if let Some(parent) = parent_of(handle) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, handle));
    }
    handle.parent.set(None);
}

pub fn replace(old: &Handle, new: Handle) {
    insert_before(old, new);
    detach(old);
}

fn clear_children(handle: &Handle) {
    for child in handle.children.take() {
        child.parent.set(None);
    }
}

pub fn set_text(handle: &Handle, text: &str) {
    clear_children(handle);
    append_child(handle, create_text(text));
}

/// Replaces the element's children with the parsed `html`.
pub fn set_inner_html(handle: &Handle, html: &str) {
    clear_children(handle);
    let fragment = Fragment::parse(html);
    for child in fragment.root().children.take() {
        child.parent.set(Some(Rc::downgrade(handle)));
        handle.children.borrow_mut().push(child);
    }
}

pub fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => text.push_str(&contents.borrow()),
            NodeData::Element { .. } => text.push_str(&text_content(child)),
            _ => {}
        }
    }
    text
}

fn serialize_handle(handle: &Handle, traversal_scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    if let Err(err) = serialize(&mut bytes, &SerializableHandle::from(handle.clone()), opts) {
        tracing::error!(error = %err, "failed to serialise html");
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn inner_html(handle: &Handle) -> String {
    serialize_handle(handle, TraversalScope::ChildrenOnly(None))
}

pub fn outer_html(handle: &Handle) -> String {
    serialize_handle(handle, TraversalScope::IncludeNode)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn parse__should_round_trip_simple_markup() {
        // Given
        let html = r#"<p>Hello <b>world</b></p><div id="x">y</div>"#;

        // When
        let fragment = Fragment::parse(html);

        // Then
        assert_eq!(fragment.to_html(), html);
    }

    #[test]
    fn parse__should_keep_plain_text() {
        assert_eq!(Fragment::parse("just text").to_html(), "just text");
    }

    #[test]
    fn find_by_id__should_ignore_duplicate_ids() {
        // Given
        let fragment = Fragment::parse(r#"<span id="a"></span><span id="a"></span><i id="b"></i>"#);

        // Then
        assert!(fragment.find_by_id("a").is_none());
        assert!(fragment.find_by_id("b").is_some());
        assert!(fragment.find_by_id("c").is_none());
    }

    #[test]
    fn replace__should_swap_element_in_place() {
        // Given
        let fragment = Fragment::parse(r#"<p>a<em id="old">b</em>c</p>"#);
        let old = fragment.find_by_id("old").expect("old element");

        // When
        let new = create_element("div", &[("id", "new")]);
        replace(&old, new);

        // Then
        assert_eq!(fragment.to_html(), r#"<p>a<div id="new"></div>c</p>"#);
    }

    #[test]
    fn set_inner_html__should_parse_new_children() {
        // Given
        let fragment = Fragment::parse(r#"<div id="target">old</div>"#);
        let target = fragment.find_by_id("target").expect("target");

        // When
        set_inner_html(&target, "<b>new</b> text");

        // Then
        assert_eq!(inner_html(&target), "<b>new</b> text");
        assert_eq!(text_content(&target), "new text");
    }

    #[test]
    fn closest_ancestor__should_walk_up_the_tree() {
        // Given
        let fragment = Fragment::parse("<table><tr><td><table id=\"inner\"></table></td></tr></table>");
        let inner = fragment.find_by_id("inner").expect("inner table");

        // When
        let outer = closest_ancestor(&inner, |node| tag_name(node).as_deref() == Some("table"));

        // Then
        assert!(outer.is_some_and(|outer| !Rc::ptr_eq(&outer, &inner)));
    }

    #[test]
    fn set_attr__should_overwrite_existing_values() {
        // Given
        let fragment = Fragment::parse(r#"<span id="s" class="a"></span>"#);
        let span = fragment.find_by_id("s").expect("span");

        // When
        set_attr(&span, "id", "t");
        add_classes(&span, "a b");

        // Then
        assert_eq!(outer_html(&span), r#"<span id="t" class="a b"></span>"#);
    }

    #[test]
    fn to_html__should_serialise_non_breaking_spaces_as_entities() {
        assert_eq!(Fragment::parse("Figure&nbsp;3").to_html(), "Figure&nbsp;3");
    }
}
