//! The write channel between inline drop zones and the cloze question that
//! owns them.

use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::content::{ContentFragment, Encoding};

/// An item a student can drag into a drop zone.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClozeItem {
    pub id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub encoding: Option<Encoding>,
    #[serde(default)]
    pub alt_text: Option<String>,
    /// Id the item carries while it sits in a drop zone; items may be
    /// duplicated so this differs from `id`.
    #[serde(default)]
    pub replacement_id: Option<String>,
}

impl ClozeItem {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            replacement_id: Some(format!("{id}-0")),
            id,
            value: value.into(),
            encoding: None,
            alt_text: None,
        }
    }

    pub fn content(&self) -> ContentFragment {
        ContentFragment::new(
            self.value.clone(),
            self.encoding.clone().unwrap_or(Encoding::Html),
        )
    }

    pub fn draggable_id(&self) -> &str {
        self.replacement_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropLocation {
    pub droppable_id: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(droppable_id: impl Into<String>, index: usize) -> Self {
        Self {
            droppable_id: droppable_id.into(),
            index,
        }
    }
}

/// A completed drag. A missing destination means the item was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropResult {
    pub draggable_id: String,
    pub source: Option<DropLocation>,
    pub destination: Option<DropLocation>,
}

/// Marking of the item submitted in one drop zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropZoneValidation {
    pub item_id: String,
    pub correct: bool,
}

/// State a cloze question shares with the drop zones inside its content.
pub trait DropRegionContext {
    fn question_part_id(&self) -> &str;

    fn readonly(&self) -> bool;

    /// Item currently placed in the drop zone `droppable_id`.
    fn inline_drop_value(&self, droppable_id: &str) -> Option<ClozeItem>;

    /// Whether the drop zone should be highlighted with a border.
    fn border(&self, droppable_id: &str) -> bool;

    /// Announces a drop zone to the question. Called once when the zone mounts.
    fn register(&self, droppable_id: &str, index: usize);

    fn update_attempt(&self, result: DropResult);

    /// Marking of the last submitted answer for `droppable_id`.
    fn validation(&self, _droppable_id: &str) -> Option<DropZoneValidation> {
        None
    }

    /// Every item of the question, in display order.
    fn items(&self) -> Vec<ClozeItem> {
        Vec::new()
    }

    /// Whether `item` can still be placed, i.e. is not in any zone.
    fn available(&self, _item: &ClozeItem) -> bool {
        true
    }
}

/// In-memory drop region state for a single question part.
#[derive(Debug, Default)]
pub struct ClozeDropRegions {
    question_part_id: String,
    readonly: bool,
    items: Vec<ClozeItem>,
    registered: RefCell<HashMap<String, usize>>,
    placed: RefCell<HashMap<String, ClozeItem>>,
    borders: RefCell<HashMap<String, bool>>,
    validations: RefCell<HashMap<String, DropZoneValidation>>,
    attempts: RefCell<Vec<DropResult>>,
}

impl ClozeDropRegions {
    pub fn new(question_part_id: impl Into<String>, items: Vec<ClozeItem>) -> Self {
        Self {
            question_part_id: question_part_id.into(),
            items,
            ..Self::default()
        }
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn set_border(&self, droppable_id: &str, border: bool) {
        self.borders.borrow_mut().insert(droppable_id.to_string(), border);
    }

    /// Records the marking of `item_id` in `droppable_id`.
    pub fn set_validation(&self, droppable_id: &str, item_id: &str, correct: bool) {
        self.validations.borrow_mut().insert(
            droppable_id.to_string(),
            DropZoneValidation {
                item_id: item_id.to_string(),
                correct,
            },
        );
    }

    /// Index registered for a drop zone, if it has mounted.
    pub fn registered_index(&self, droppable_id: &str) -> Option<usize> {
        self.registered.borrow().get(droppable_id).copied()
    }

    pub fn registered_count(&self) -> usize {
        self.registered.borrow().len()
    }

    pub fn attempts(&self) -> Vec<DropResult> {
        self.attempts.borrow().clone()
    }

    /// Current answer: for each registered index, the id of the placed item.
    pub fn answer(&self) -> Vec<Option<String>> {
        let registered = self.registered.borrow();
        let placed = self.placed.borrow();
        let len = registered.values().map(|index| index + 1).max().unwrap_or(0);
        let mut answer = vec![None; len];
        for (droppable_id, index) in registered.iter() {
            answer[*index] = placed.get(droppable_id).map(|item| item.id.clone());
        }
        answer
    }

    fn item_by_draggable_id(&self, draggable_id: &str) -> Option<ClozeItem> {
        self.placed
            .borrow()
            .values()
            .find(|item| item.draggable_id() == draggable_id)
            .cloned()
            .or_else(|| {
                self.items
                    .iter()
                    .find(|item| item.draggable_id() == draggable_id || item.id == draggable_id)
                    .cloned()
            })
    }
}

impl DropRegionContext for ClozeDropRegions {
    fn question_part_id(&self) -> &str {
        &self.question_part_id
    }

    fn readonly(&self) -> bool {
        self.readonly
    }

    fn inline_drop_value(&self, droppable_id: &str) -> Option<ClozeItem> {
        self.placed.borrow().get(droppable_id).cloned()
    }

    fn border(&self, droppable_id: &str) -> bool {
        self.borders.borrow().get(droppable_id).copied().unwrap_or(false)
    }

    fn register(&self, droppable_id: &str, index: usize) {
        self.registered
            .borrow_mut()
            .entry(droppable_id.to_string())
            .or_insert(index);
    }

    fn update_attempt(&self, result: DropResult) {
        if self.readonly {
            tracing::debug!(question = self.question_part_id.as_str(), "ignoring drop on readonly question");
            return;
        }
        let item = self.item_by_draggable_id(&result.draggable_id);
        {
            let mut placed = self.placed.borrow_mut();
            if let Some(source) = &result.source {
                placed.remove(&source.droppable_id);
            }
            match (&result.destination, item) {
                (Some(destination), Some(item)) => {
                    placed.insert(destination.droppable_id.clone(), item);
                }
                (Some(destination), None) => {
                    tracing::warn!(
                        draggable = result.draggable_id.as_str(),
                        droppable = destination.droppable_id.as_str(),
                        "dropped item is not part of this question"
                    );
                }
                (None, _) => {}
            }
        }
        self.attempts.borrow_mut().push(result);
    }

    fn validation(&self, droppable_id: &str) -> Option<DropZoneValidation> {
        self.validations.borrow().get(droppable_id).cloned()
    }

    fn items(&self) -> Vec<ClozeItem> {
        self.items.clone()
    }

    fn available(&self, item: &ClozeItem) -> bool {
        !self.placed.borrow().values().any(|placed| placed.id == item.id)
    }
}
